use crate::reporter::coordinator::Reporter;
use crate::source::error::Error;
use crate::source::event::RunEvent;
use crate::source::registry::Registry;

/// Applies the runner's events to its registry and forwards the lifecycle
/// ones to the reporter.
#[derive(Debug)]
pub struct Driver {
    registry: Registry,
    reporter: Reporter,
}

impl Driver {
    pub fn new(reporter: Reporter) -> Self {
        Self {
            registry: Registry::new(),
            reporter,
        }
    }

    pub fn is_running(&self) -> bool {
        self.reporter.is_running()
    }

    /// Feeds one line of the event stream. Blank lines are skipped, malformed
    /// ones are logged and dropped.
    pub fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match serde_json::from_str::<RunEvent>(line).map_err(Error::from) {
            Ok(event) => self.dispatch(event),
            Err(err) => warn!("Skipping event line: {}", err),
        }
    }

    pub fn dispatch(&mut self, event: RunEvent) {
        trace!("Received '{}' event", event.name());
        match event {
            RunEvent::Suite {
                id,
                parent,
                title,
                root,
            } => {
                if let Err(err) = self.registry.declare_suite(id, parent, title, root) {
                    warn!("Ignoring suite declaration: {}", err);
                }
            }
            RunEvent::Test {
                id,
                parent,
                title,
                sync,
            } => {
                if let Err(err) = self.registry.declare_test(id, parent, title, sync) {
                    warn!("Ignoring test declaration: {}", err);
                }
            }
            RunEvent::Start => self.reporter.run_started(),
            RunEvent::Pending { test } => self.reporter.test_pending(&self.registry, test),
            RunEvent::Pass { test, duration } => {
                self.record_duration(test, duration);
                self.reporter.test_passed(&self.registry, test);
            }
            RunEvent::Fail {
                test,
                duration,
                error,
            } => {
                self.record_duration(test, duration);
                self.reporter.test_failed(&self.registry, test, &error);
            }
            RunEvent::End => self.reporter.run_ended(),
        }
    }

    /// The stream stopped for good. Closes the report if the run never ended.
    pub fn terminate(&mut self) {
        if self.is_running() {
            info!("Event stream stopped before the run ended");
        }
        self.reporter.run_aborted(&self.registry);
    }

    fn record_duration(&mut self, test: u64, duration: Option<u64>) {
        if let (Some(entry), Some(_)) = (self.registry.test_mut(test), duration) {
            entry.duration_ms = duration;
        }
    }
}
