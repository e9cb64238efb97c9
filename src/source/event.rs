use crate::reporter::failure::TestFailure;
use serde_derive::Deserialize;

fn synchronous() -> bool {
    true
}

/// One line of the runner's event stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum RunEvent {
    Suite {
        id: u64,
        #[serde(default)]
        parent: Option<u64>,
        title: String,
        #[serde(default)]
        root: bool,
    },
    Test {
        id: u64,
        parent: u64,
        title: String,
        #[serde(default = "synchronous")]
        sync: bool,
    },
    Start,
    Pending {
        test: u64,
    },
    Pass {
        test: u64,
        #[serde(default, deserialize_with = "crate::configuration::deserialize::millis::deserialize")]
        duration: Option<u64>,
    },
    Fail {
        test: u64,
        #[serde(default, deserialize_with = "crate::configuration::deserialize::millis::deserialize")]
        duration: Option<u64>,
        #[serde(default)]
        error: TestFailure,
    },
    End,
}

impl RunEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::Suite { .. } => "suite",
            RunEvent::Test { .. } => "test",
            RunEvent::Start => "start",
            RunEvent::Pending { .. } => "pending",
            RunEvent::Pass { .. } => "pass",
            RunEvent::Fail { .. } => "fail",
            RunEvent::End => "end",
        }
    }
}
