use regex::Regex;
use serde_derive::Deserialize;
use serde_json::Value;

/// Error object attached to a failed test by the runner.
#[derive(Debug, Default, Deserialize)]
pub struct TestFailure {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default, deserialize_with = "crate::configuration::deserialize::present::deserialize")]
    pub actual: Option<Comparand>,
    #[serde(default, deserialize_with = "crate::configuration::deserialize::present::deserialize")]
    pub expected: Option<Comparand>,
    /// Set when the failure escaped the test instead of failing an assertion.
    #[serde(default)]
    pub uncaught: bool,
}

/// One side of a failed comparison.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Comparand {
    Pattern(PatternValue),
    Json(Value),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternValue {
    #[serde(with = "serde_regex")]
    regex: Regex,
}

impl From<Regex> for Comparand {
    fn from(regex: Regex) -> Self {
        Comparand::Pattern(PatternValue { regex })
    }
}

impl From<Value> for Comparand {
    fn from(value: Value) -> Self {
        Comparand::Json(value)
    }
}

impl Comparand {
    /// Text shown in the IDE diff view; objects are pretty-printed with two spaces.
    pub fn stringify(&self) -> Option<String> {
        match self {
            Comparand::Pattern(pattern) => Some(format!("/{}/", pattern.regex.as_str())),
            Comparand::Json(value) => serde_json::to_string_pretty(value).ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailureInfo {
    pub message: String,
    pub details: Option<String>,
    pub actual: Option<String>,
    pub expected: Option<String>,
}

impl TestFailure {
    pub fn info(&self) -> FailureInfo {
        let (message, details) =
            split_failure(self.message.as_deref().unwrap_or(""), self.stack.as_deref());
        let (actual, expected) = match (&self.actual, &self.expected) {
            (Some(actual), Some(expected)) => match (actual.stringify(), expected.stringify()) {
                (Some(actual), Some(expected)) => (Some(actual), Some(expected)),
                _ => (None, None),
            },
            _ => (None, None),
        };
        FailureInfo {
            message,
            details,
            actual,
            expected,
        }
    }
}

/// Splits a stack that repeats the error message into a summary and the frames.
///
/// Everything up to and including the first occurrence of `message` becomes
/// the summary; the rest, without one leading line break, becomes the details.
pub fn split_failure(message: &str, stack: Option<&str>) -> (String, Option<String>) {
    let stack = match stack {
        Some(stack) if !stack.trim().is_empty() => stack,
        _ => return (message.to_owned(), None),
    };
    match stack.find(message) {
        Some(index) => {
            let end = index + message.len();
            let details = &stack[end..];
            let details = details.strip_prefix('\n').unwrap_or(details);
            (stack[..end].to_owned(), Some(details.to_owned()))
        }
        None => (message.to_owned(), Some(stack.to_owned())),
    }
}
