use crate::reporter::error::Error;
use crate::reporter::escape::escape;
use crate::reporter::tree::{Node, NodeBody, TestStatus};
use std::fmt;

/// Literal prefix the IDE looks for at the start of each protocol line.
pub const MARKER: &str = "##teamcity[";
const TERMINATOR: char = ']';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    EnteredTheMatrix,
    TestSuiteStarted,
    TestSuiteFinished,
    TestStarted,
    TestFinished,
    TestIgnored,
    TestFailed,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::EnteredTheMatrix => "enteredTheMatrix",
            Command::TestSuiteStarted => "testSuiteStarted",
            Command::TestSuiteFinished => "testSuiteFinished",
            Command::TestStarted => "testStarted",
            Command::TestFinished => "testFinished",
            Command::TestIgnored => "testIgnored",
            Command::TestFailed => "testFailed",
        }
    }
}

/// One protocol line. Attributes render in insertion order, values escaped.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceMessage {
    command: Command,
    attributes: Vec<(&'static str, String)>,
}

impl ServiceMessage {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            attributes: Vec::new(),
        }
    }

    pub fn attr<V: ToString>(mut self, key: &'static str, value: V) -> Self {
        self.attributes.push((key, value.to_string()));
        self
    }

    fn attr_opt<V: ToString>(self, key: &'static str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.attr(key, value),
            None => self,
        }
    }
}

impl fmt::Display for ServiceMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(MARKER)?;
        f.write_str(self.command.as_str())?;
        for (key, value) in &self.attributes {
            write!(f, " {}='{}'", key, escape(value))?;
        }
        write!(f, "{}", TERMINATOR)
    }
}

impl Node {
    pub fn open_command(&self) -> Command {
        match self.body() {
            NodeBody::Suite { .. } => Command::TestSuiteStarted,
            NodeBody::Test { .. } => Command::TestStarted,
        }
    }

    pub fn close_command(&self) -> Result<Command, Error> {
        match self.body() {
            NodeBody::Suite { .. } => Ok(Command::TestSuiteFinished),
            NodeBody::Test { outcome } => match outcome.as_ref().map(|o| o.status) {
                Some(TestStatus::Passed) => Ok(Command::TestFinished),
                Some(TestStatus::Skipped) => Ok(Command::TestIgnored),
                Some(TestStatus::Failed) | Some(TestStatus::Errored) => Ok(Command::TestFailed),
                None => Err(Error::StatusNotReported(self.id())),
            },
        }
    }

    pub fn extra_close_attributes(&self) -> Vec<(&'static str, String)> {
        let outcome = match self.outcome() {
            Some(outcome) => outcome,
            None => return Vec::new(),
        };
        let mut attributes = Vec::new();
        if let Some(duration) = outcome.duration_ms {
            attributes.push(("duration", duration.to_string()));
        }
        if outcome.status == TestStatus::Errored {
            attributes.push(("error", "yes".to_owned()));
        }
        let optional = [
            ("message", &outcome.message),
            ("details", &outcome.details),
            ("actual", &outcome.actual),
            ("expected", &outcome.expected),
        ];
        for (key, value) in optional.iter() {
            if let Some(value) = value {
                attributes.push((*key, value.clone()));
            }
        }
        attributes
    }
}

pub fn open_message(node: &Node) -> ServiceMessage {
    let mut message = ServiceMessage::new(node.open_command())
        .attr("nodeId", node.id())
        .attr("parentNodeId", node.parent_id())
        .attr("name", node.name());
    if let Some(kind) = node.kind() {
        message = message.attr("nodeType", kind);
        message = message.attr_opt(
            "locationHint",
            node.location_path()
                .map(|path| format!("{}://{}", kind, path)),
        );
    }
    message
}

pub fn close_message(node: &Node) -> Result<ServiceMessage, Error> {
    let mut message = ServiceMessage::new(node.close_command()?).attr("nodeId", node.id());
    for (key, value) in node.extra_close_attributes() {
        message = message.attr(key, value);
    }
    Ok(message)
}
