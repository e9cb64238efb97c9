use std::fmt;
use std::io;

use crate::reporter::tree::NodeId;

/// A fault raised while turning a run event into protocol messages.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A child was requested for a suite whose close message is already out.
    SuiteFinished(NodeId),
    /// A child was requested for a test node.
    NotASuite(NodeId),
    /// A node was asked to close twice.
    AlreadyFinished(NodeId),
    /// A test node reached its close message without an outcome.
    StatusNotReported(NodeId),
    /// A test event arrived while no run is in progress.
    NoActiveRun,
    /// The event source referred to a test it never declared.
    UnknownTest(u64),
    /// A test outcome was assembled from inconsistent parts.
    Outcome(String),
    /// A handler panicked; the payload message is kept when it is a string.
    Panicked(String),
    Io(io::Error),
}

impl ::std::error::Error for Error {
    fn source(&self) -> Option<&(dyn ::std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::SuiteFinished(id) => {
                write!(f, "Child node could not be created for finished node {}", id)
            }
            Error::NotASuite(id) => write!(f, "Node {} is a test and cannot have children", id),
            Error::AlreadyFinished(id) => write!(f, "Node {} has already been finished", id),
            Error::StatusNotReported(id) => write!(f, "Test node {} has no status", id),
            Error::NoActiveRun => write!(f, "No run is in progress"),
            Error::UnknownTest(id) => write!(f, "Test {} was never declared by the runner", id),
            Error::Outcome(ref err) => write!(f, "Invalid test outcome: {}", err),
            Error::Panicked(ref msg) => write!(f, "Handler panicked: {}", msg),
            Error::Io(ref err) => write!(f, "Failed to write message: {}", err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}
