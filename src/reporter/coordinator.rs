use crate::reporter::error::Error;
use crate::reporter::failure::TestFailure;
use crate::reporter::finalizer::{finish_tree, heal_unreported};
use crate::reporter::message::{Command, ServiceMessage};
use crate::reporter::resolver::{location_path, resolve_suite_path};
use crate::reporter::tree::{NodeKind, TestOutcome, TestStatus, Tree};
use crate::source::registry::{Registry, TestEntry};
use derivative::*;
use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};

/// Where handler faults go. They never reach the event source.
pub trait ErrorChannel: Send {
    fn report(&mut self, event: &str, error: &Error);
}

/// Default channel: an error record through the `log` facade.
#[derive(Debug, Default)]
pub struct LogChannel;

impl ErrorChannel for LogChannel {
    fn report(&mut self, event: &str, error: &Error) {
        error!("Failed to handle '{}' event: {}", event, error);
    }
}

enum Verdict<'a> {
    Pending,
    Passed,
    Failed(&'a TestFailure),
}

/// Receives the run events and keeps the report tree of the current run.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Reporter {
    tree: Tree,
    /// Set between a run start and its end or abort.
    running: bool,
    #[derivative(Debug = "ignore")]
    errors: Box<dyn ErrorChannel>,
    heal_unreported: bool,
}

impl Reporter {
    pub fn new(out: Box<dyn Write + Send>, errors: Box<dyn ErrorChannel>) -> Self {
        Self {
            tree: Tree::new(out),
            running: false,
            errors,
            heal_unreported: true,
        }
    }

    pub fn heal_unreported(mut self, heal: bool) -> Self {
        self.heal_unreported = heal;
        self
    }

    pub fn flush_each_line(mut self, flush: bool) -> Self {
        self.tree = self.tree.with_line_flush(flush);
        self
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn run_started(&mut self) {
        self.execute_safely("start", Reporter::start_run);
    }

    pub fn test_pending(&mut self, registry: &Registry, test: u64) {
        self.execute_safely("pending", |reporter| {
            reporter.report_test(registry, test, Verdict::Pending)
        });
    }

    pub fn test_passed(&mut self, registry: &Registry, test: u64) {
        self.execute_safely("pass", |reporter| {
            reporter.report_test(registry, test, Verdict::Passed)
        });
    }

    pub fn test_failed(&mut self, registry: &Registry, test: u64, failure: &TestFailure) {
        self.execute_safely("fail", |reporter| {
            reporter.report_test(registry, test, Verdict::Failed(failure))
        });
    }

    pub fn run_ended(&mut self) {
        self.execute_safely("end", Reporter::end_run);
    }

    /// The run stopped without an end event. No-op when no run is in progress.
    pub fn run_aborted(&mut self, registry: &Registry) {
        if self.is_running() {
            self.execute_safely("exit", |reporter| reporter.abort_run(registry));
        }
    }

    fn execute_safely<F>(&mut self, event: &'static str, handler: F)
    where
        F: FnOnce(&mut Self) -> Result<(), Error>,
    {
        let result = panic::catch_unwind(AssertUnwindSafe(|| handler(&mut *self)));
        let error = match result {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err,
            Err(payload) => Error::Panicked(panic_message(&*payload)),
        };
        self.errors.report(event, &error);
    }

    fn start_run(&mut self) -> Result<(), Error> {
        if self.running {
            warn!("Run started while the previous one is still open, closing it");
            if let Err(err) = finish_tree(&mut self.tree) {
                warn!("Failed to close the previous run: {}", err);
            }
        }
        self.tree.reset();
        self.running = true;
        debug!("Run started");
        self.tree
            .write_line(&ServiceMessage::new(Command::EnteredTheMatrix).to_string())
    }

    fn report_test(&mut self, registry: &Registry, key: u64, verdict: Verdict) -> Result<(), Error> {
        if !self.running {
            return Err(Error::NoActiveRun);
        }
        let tree = &mut self.tree;
        let test = registry.test(key).ok_or(Error::UnknownTest(key))?;
        let outcome = build_outcome(test, verdict)?;
        let suite = resolve_suite_path(tree, &registry.ancestor_titles(test))?;
        let location = location_path(tree, suite, &test.title);
        let node = tree.create_child(suite, &test.title, false, NodeKind::Test, Some(location))?;
        tree.set_outcome(node, outcome)?;
        tree.write_open(node)?;
        tree.write_close(node)
    }

    fn end_run(&mut self) -> Result<(), Error> {
        if !self.running {
            return Err(Error::NoActiveRun);
        }
        self.running = false;
        debug!("Run ended");
        finish_tree(&mut self.tree)
    }

    fn abort_run(&mut self, registry: &Registry) -> Result<(), Error> {
        if !self.running {
            return Err(Error::NoActiveRun);
        }
        self.running = false;
        warn!("Run ended without an end event, closing the report");
        let healed = if self.heal_unreported {
            heal_unreported(&mut self.tree, registry).map(|count| {
                if count > 0 {
                    warn!("Reported {} tests whose result never arrived", count);
                }
            })
        } else {
            Ok(())
        };
        healed.and(finish_tree(&mut self.tree))
    }
}

fn build_outcome(test: &TestEntry, verdict: Verdict) -> Result<TestOutcome, Error> {
    let mut builder = TestOutcome::builder();
    builder.duration_ms(test.duration_ms);
    match verdict {
        Verdict::Passed => {
            builder.status(TestStatus::Passed);
        }
        Verdict::Pending => {
            builder
                .status(TestStatus::Skipped)
                .message(format!("Pending test '{}'", test.title));
        }
        Verdict::Failed(failure) => {
            let info = failure.info();
            let status = if failure.uncaught {
                TestStatus::Errored
            } else {
                TestStatus::Failed
            };
            builder
                .status(status)
                .message(info.message)
                .details(info.details)
                .actual(info.actual)
                .expected(info.expected);
        }
    }
    builder.build().map_err(|err| Error::Outcome(err.to_string()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::escape::unescape;
    use crate::reporter::failure::Comparand;
    use crate::reporter::finalizer::ASYNC_NOT_CALLED;
    use crate::reporter::testing::SharedBuffer;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingChannel(Arc<Mutex<Vec<String>>>);

    impl ErrorChannel for RecordingChannel {
        fn report(&mut self, event: &str, error: &Error) {
            self.0.lock().unwrap().push(format!("{}: {}", event, error));
        }
    }

    fn reporter() -> (Reporter, SharedBuffer, RecordingChannel) {
        let buffer = SharedBuffer::new();
        let errors = RecordingChannel::default();
        let reporter = Reporter::new(Box::new(buffer.clone()), Box::new(errors.clone()));
        (reporter, buffer, errors)
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.declare_suite(0, None, String::new(), true).unwrap();
        registry
    }

    fn command(line: &str) -> &str {
        let body = line.trim_start_matches("##teamcity[");
        body.split(|c: char| c == ' ' || c == ']').next().unwrap()
    }

    fn attribute(line: &str, key: &str) -> Option<String> {
        let start = line.find(&format!(" {}='", key))? + key.len() + 3;
        let rest = &line[start..];
        let mut end = 0;
        let bytes = rest.as_bytes();
        while end < bytes.len() {
            match bytes[end] {
                b'|' => end += 2,
                b'\'' => break,
                _ => end += 1,
            }
        }
        Some(unescape(&rest[..end]).into_owned())
    }

    #[test]
    fn test_single_top_level_test() {
        let (mut reporter, buffer, errors) = reporter();
        let mut registry = registry();
        registry.declare_test(1, 0, "works".into(), true).unwrap();
        registry.test_mut(1).unwrap().duration_ms = Some(3);

        reporter.run_started();
        reporter.test_passed(&registry, 1);
        reporter.run_ended();

        assert_eq!(
            buffer.lines(),
            vec![
                "##teamcity[enteredTheMatrix]",
                "##teamcity[testStarted nodeId='1' parentNodeId='0' name='works' nodeType='test' locationHint='test://works']",
                "##teamcity[testFinished nodeId='1' duration='3']",
            ]
        );
        assert!(errors.0.lock().unwrap().is_empty());
        assert!(!reporter.is_running());
    }

    #[test]
    fn test_nested_suites_open_once_and_close_child_first() {
        let (mut reporter, buffer, _) = reporter();
        let mut registry = registry();
        registry.declare_suite(1, Some(0), "A".into(), false).unwrap();
        registry.declare_suite(2, Some(1), "A.B".into(), false).unwrap();
        registry.declare_test(10, 2, "test1".into(), true).unwrap();
        registry.declare_test(11, 2, "test2".into(), true).unwrap();

        reporter.run_started();
        reporter.test_passed(&registry, 10);
        reporter.test_passed(&registry, 11);
        reporter.run_ended();

        let lines = buffer.lines();
        let commands: Vec<_> = lines.iter().map(|line| command(line)).collect();
        assert_eq!(
            commands,
            vec![
                "enteredTheMatrix",
                "testSuiteStarted",
                "testSuiteStarted",
                "testStarted",
                "testFinished",
                "testStarted",
                "testFinished",
                "testSuiteFinished",
                "testSuiteFinished",
            ]
        );
        assert_eq!(attribute(&lines[2], "parentNodeId").as_deref(), Some("1"));
        assert_eq!(attribute(&lines[3], "parentNodeId").as_deref(), Some("2"));
        assert_eq!(attribute(&lines[5], "parentNodeId").as_deref(), Some("2"));
        assert_eq!(attribute(&lines[7], "nodeId").as_deref(), Some("2"));
        assert_eq!(attribute(&lines[8], "nodeId").as_deref(), Some("1"));
    }

    #[test]
    fn test_failure_message_is_split_from_stack() {
        let (mut reporter, buffer, _) = reporter();
        let mut registry = registry();
        registry.declare_test(1, 0, "fails".into(), true).unwrap();
        let failure = TestFailure {
            message: Some("expected true to be false".to_owned()),
            stack: Some(
                "expected true to be false\n    at Context.<anonymous> (test.js:5:12)".to_owned(),
            ),
            ..TestFailure::default()
        };

        reporter.run_started();
        reporter.test_failed(&registry, 1, &failure);

        let lines = buffer.lines();
        assert_eq!(command(&lines[2]), "testFailed");
        assert_eq!(
            attribute(&lines[2], "message").as_deref(),
            Some("expected true to be false")
        );
        assert_eq!(
            attribute(&lines[2], "details").as_deref(),
            Some("    at Context.<anonymous> (test.js:5:12)")
        );
        assert_eq!(attribute(&lines[2], "error"), None);
    }

    #[test]
    fn test_comparison_values_need_both_sides() {
        let (mut reporter, buffer, _) = reporter();
        let mut registry = registry();
        registry.declare_test(1, 0, "both".into(), true).unwrap();
        registry.declare_test(2, 0, "one".into(), true).unwrap();
        let both = TestFailure {
            message: Some("deep".to_owned()),
            actual: Some(Comparand::from(json!({"a": 1}))),
            expected: Some(Comparand::from(json!({"a": 2}))),
            ..TestFailure::default()
        };
        let one = TestFailure {
            message: Some("deep".to_owned()),
            actual: Some(Comparand::from(json!({"a": 1}))),
            ..TestFailure::default()
        };

        reporter.run_started();
        reporter.test_failed(&registry, 1, &both);
        reporter.test_failed(&registry, 2, &one);

        let lines = buffer.lines();
        assert_eq!(attribute(&lines[2], "actual").as_deref(), Some("{\n  \"a\": 1\n}"));
        assert_eq!(attribute(&lines[2], "expected").as_deref(), Some("{\n  \"a\": 2\n}"));
        assert_eq!(attribute(&lines[4], "actual"), None);
        assert_eq!(attribute(&lines[4], "expected"), None);
    }

    #[test]
    fn test_uncaught_failure_is_an_error() {
        let (mut reporter, buffer, _) = reporter();
        let mut registry = registry();
        registry.declare_test(1, 0, "throws".into(), true).unwrap();
        let failure = TestFailure {
            message: Some("boom".to_owned()),
            uncaught: true,
            ..TestFailure::default()
        };

        reporter.run_started();
        reporter.test_failed(&registry, 1, &failure);

        assert_eq!(
            buffer.lines()[2],
            "##teamcity[testFailed nodeId='1' error='yes' message='boom']"
        );
    }

    #[test]
    fn test_pending_test_is_ignored_with_message() {
        let (mut reporter, buffer, _) = reporter();
        let mut registry = registry();
        registry.declare_test(1, 0, "later".into(), true).unwrap();

        reporter.run_started();
        reporter.test_pending(&registry, 1);

        assert_eq!(
            buffer.lines()[2],
            "##teamcity[testIgnored nodeId='1' message='Pending test |'later|'']"
        );
    }

    #[test]
    fn test_faulty_event_does_not_stop_the_run() {
        let (mut reporter, buffer, errors) = reporter();
        let mut registry = registry();
        registry.declare_test(1, 0, "works".into(), true).unwrap();

        reporter.test_passed(&registry, 1);
        reporter.run_started();
        reporter.test_passed(&registry, 42);
        reporter.test_passed(&registry, 1);
        reporter.run_ended();
        reporter.run_ended();

        let reported = errors.0.lock().unwrap().clone();
        assert_eq!(reported.len(), 3);
        assert!(reported[0].starts_with("pass:"));
        assert!(reported[1].contains("42"));
        assert!(reported[2].starts_with("end:"));
        let commands: Vec<_> = buffer.lines().iter().map(|l| command(l).to_owned()).collect();
        assert_eq!(commands, vec!["enteredTheMatrix", "testStarted", "testFinished"]);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let (mut reporter, _, errors) = reporter();

        reporter.execute_safely("custom", |_| panic!("broken handler"));
        reporter.run_started();

        let reported = errors.0.lock().unwrap().clone();
        assert_eq!(reported, vec!["custom: Handler panicked: broken handler"]);
        assert!(reporter.is_running());
    }

    #[test]
    fn test_abort_heals_hanging_async_test() {
        let (mut reporter, buffer, _) = reporter();
        let mut registry = registry();
        registry.declare_suite(1, Some(0), "outer".into(), false).unwrap();
        registry.declare_suite(2, Some(1), "inner".into(), false).unwrap();
        registry.declare_test(10, 2, "fine".into(), true).unwrap();
        registry.declare_test(11, 2, "waits".into(), false).unwrap();

        reporter.run_started();
        reporter.test_passed(&registry, 10);
        reporter.run_aborted(&registry);
        reporter.run_aborted(&registry);

        let lines = buffer.lines();
        let commands: Vec<_> = lines.iter().map(|line| command(line)).collect();
        assert_eq!(
            commands,
            vec![
                "enteredTheMatrix",
                "testSuiteStarted",
                "testSuiteStarted",
                "testStarted",
                "testFinished",
                "testStarted",
                "testFailed",
                "testSuiteFinished",
                "testSuiteFinished",
            ]
        );
        assert_eq!(attribute(&lines[5], "name").as_deref(), Some("waits"));
        assert_eq!(attribute(&lines[6], "message").as_deref(), Some(ASYNC_NOT_CALLED));
        assert!(!reporter.is_running());
    }

    #[test]
    fn test_abort_keeps_passed_test_shadowed_by_suite_name() {
        let (mut reporter, buffer, errors) = reporter();
        let mut registry = registry();
        registry.declare_test(10, 0, "X".into(), true).unwrap();
        registry.declare_suite(1, Some(0), "X".into(), false).unwrap();
        registry.declare_test(11, 1, "y".into(), true).unwrap();

        reporter.run_started();
        reporter.test_passed(&registry, 10);
        reporter.test_passed(&registry, 11);
        reporter.run_aborted(&registry);

        let lines = buffer.lines();
        let commands: Vec<_> = lines.iter().map(|line| command(line)).collect();
        assert_eq!(
            commands,
            vec![
                "enteredTheMatrix",
                "testStarted",
                "testFinished",
                "testSuiteStarted",
                "testStarted",
                "testFinished",
                "testSuiteFinished",
            ]
        );
        assert_eq!(attribute(&lines[6], "nodeId").as_deref(), Some("2"));
        assert!(errors.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_abort_without_healing_only_closes() {
        let (reporter, buffer, _) = reporter();
        let mut reporter = reporter.heal_unreported(false);
        let mut registry = registry();
        registry.declare_suite(1, Some(0), "A".into(), false).unwrap();
        registry.declare_test(10, 1, "fine".into(), true).unwrap();
        registry.declare_test(11, 1, "waits".into(), false).unwrap();

        reporter.run_started();
        reporter.test_passed(&registry, 10);
        reporter.run_aborted(&registry);

        let commands: Vec<_> = buffer.lines().iter().map(|l| command(l).to_owned()).collect();
        assert_eq!(
            commands,
            vec![
                "enteredTheMatrix",
                "testSuiteStarted",
                "testStarted",
                "testFinished",
                "testSuiteFinished",
            ]
        );
    }

    #[test]
    fn test_every_run_starts_a_fresh_tree() {
        let (mut reporter, buffer, _) = reporter();
        let mut registry = registry();
        registry.declare_test(1, 0, "t".into(), true).unwrap();

        reporter.run_started();
        reporter.test_passed(&registry, 1);
        reporter.run_ended();
        reporter.run_started();
        reporter.test_passed(&registry, 1);
        reporter.run_ended();

        let lines = buffer.lines();
        assert_eq!(lines.len(), 6);
        assert_eq!(attribute(&lines[4], "nodeId").as_deref(), Some("1"));
    }

    #[test]
    fn test_restart_closes_the_open_run() {
        let (mut reporter, buffer, errors) = reporter();
        let mut registry = registry();
        registry.declare_suite(1, Some(0), "A".into(), false).unwrap();
        registry.declare_test(10, 1, "t".into(), true).unwrap();

        reporter.run_started();
        reporter.test_passed(&registry, 10);
        reporter.run_started();
        reporter.test_passed(&registry, 10);
        reporter.run_ended();

        let lines = buffer.lines();
        let commands: Vec<_> = lines.iter().map(|line| command(line)).collect();
        assert_eq!(
            commands,
            vec![
                "enteredTheMatrix",
                "testSuiteStarted",
                "testStarted",
                "testFinished",
                "testSuiteFinished",
                "enteredTheMatrix",
                "testSuiteStarted",
                "testStarted",
                "testFinished",
                "testSuiteFinished",
            ]
        );
        assert_eq!(attribute(&lines[6], "nodeId").as_deref(), Some("1"));
        assert!(errors.0.lock().unwrap().is_empty());
    }
}
