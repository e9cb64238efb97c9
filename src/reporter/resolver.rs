use crate::reporter::error::Error;
use crate::reporter::tree::{NodeId, NodeKind, Tree, ROOT_ID};

/// Walks `chain` (outermost suite first) from the root, opening every suite
/// that does not exist yet, and returns the innermost one.
pub fn resolve_suite_path<S: AsRef<str>>(tree: &mut Tree, chain: &[S]) -> Result<NodeId, Error> {
    let mut current = ROOT_ID;
    for name in chain {
        let name = name.as_ref();
        current = match tree.find_suite(current, name) {
            Some(suite) => suite,
            None => {
                let location_path = location_path(tree, current, name);
                let suite =
                    tree.create_child(current, name, true, NodeKind::Suite, Some(location_path))?;
                trace!("Opened suite '{}' as node {}", name, suite);
                tree.write_open(suite)?;
                suite
            }
        };
    }
    Ok(current)
}

/// Dot-joined names from the outermost real suite down to `child_name`.
pub fn location_path(tree: &Tree, parent: NodeId, child_name: &str) -> String {
    let mut names = Vec::new();
    let mut current = parent;
    while current != ROOT_ID {
        let node = tree.node(current);
        names.push(node.name());
        current = node.parent_id();
    }
    names.reverse();
    names.push(child_name);
    names.join(".")
}
