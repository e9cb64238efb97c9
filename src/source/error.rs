use std::fmt;

/// A line of the event stream that could not be applied.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    Parse(serde_json::Error),
    DuplicateSuite(u64),
    DuplicateTest(u64),
    UnknownSuite(u64),
    /// A second suite claimed to be the runner's root; holds the first one.
    DuplicateRoot(u64),
    /// A non-root suite without a parent, unreachable from the root.
    DetachedSuite(u64),
}

impl ::std::error::Error for Error {
    fn source(&self) -> Option<&(dyn ::std::error::Error + 'static)> {
        match *self {
            Error::Parse(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Parse(ref err) => write!(f, "Malformed event: {}", err),
            Error::DuplicateSuite(id) => write!(f, "Suite {} declared twice", id),
            Error::DuplicateTest(id) => write!(f, "Test {} declared twice", id),
            Error::UnknownSuite(id) => write!(f, "Suite {} was never declared", id),
            Error::DuplicateRoot(id) => write!(f, "Root suite is already declared as {}", id),
            Error::DetachedSuite(id) => write!(f, "Suite {} has no parent and is not the root", id),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err)
    }
}
