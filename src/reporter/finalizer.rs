use crate::reporter::error::Error;
use crate::reporter::resolver::{location_path, resolve_suite_path};
use crate::reporter::tree::{NodeKind, TestOutcome, TestStatus, Tree};
use crate::source::registry::{Registry, TestEntry};

pub const SYNC_NOT_REPORTED: &str = "[internal error] the test runner did not report the test status";
pub const ASYNC_NOT_CALLED: &str = "likely cause: an asynchronous test callback was never invoked";
pub const UNTRAVERSABLE_REGISTRY: &str =
    "[IDE integration] run ended without an end event and the test registry cannot be traversed";

/// Closes every node still open under the root, children before parents.
pub fn finish_tree(tree: &mut Tree) -> Result<(), Error> {
    let mut first_error = None;
    for child in tree.root().children().to_vec() {
        if let Err(err) = tree.close_subtree(child) {
            first_error.get_or_insert(err);
        }
    }
    if let Err(err) = tree.flush() {
        first_error.get_or_insert(err);
    }
    first_error.map_or(Ok(()), Err)
}

/// Reports a failure for every registered test the runner never resolved.
///
/// Returns how many tests were synthesized. Without a registry root only a
/// diagnostic line is written.
pub fn heal_unreported(tree: &mut Tree, registry: &Registry) -> Result<usize, Error> {
    let mut healed = 0;
    let mut first_error = None;
    let traversed = registry.for_each_test(|_, test| match heal_test(tree, registry, test) {
        Ok(true) => healed += 1,
        Ok(false) => {}
        Err(err) => {
            first_error.get_or_insert(err);
        }
    });
    if !traversed {
        warn!("Test registry has no root, unreported tests cannot be recovered");
        tree.write_line(UNTRAVERSABLE_REGISTRY)?;
    }
    first_error.map_or(Ok(healed), Err)
}

fn heal_test(tree: &mut Tree, registry: &Registry, test: &TestEntry) -> Result<bool, Error> {
    let suite = resolve_suite_path(tree, &registry.ancestor_titles(test))?;
    if tree.find_test(suite, &test.title).is_some() {
        return Ok(false);
    }
    let (status, message) = if test.sync {
        (TestStatus::Errored, SYNC_NOT_REPORTED)
    } else {
        (TestStatus::Failed, ASYNC_NOT_CALLED)
    };
    let outcome = TestOutcome::builder()
        .status(status)
        .duration_ms(test.duration_ms)
        .message(message.to_owned())
        .build()
        .map_err(|err| Error::Outcome(err.to_string()))?;
    let location = location_path(tree, suite, &test.title);
    let node = tree.create_child(suite, &test.title, false, NodeKind::Test, Some(location))?;
    tree.set_outcome(node, outcome)?;
    debug!("Healing unreported test '{}' as node {}", test.title, node);
    tree.write_open(node)?;
    tree.write_close(node)?;
    Ok(true)
}
