//! Turns run events into the IDE's service message stream.
//!
//! The [`coordinator::Reporter`] owns one [`tree::Tree`] per run. Suites are
//! materialized by the [`resolver`] the first time a test below them is
//! reported, tests are opened and closed in one go, and the [`finalizer`]
//! closes whatever is still open when the run ends, normally or not.

pub mod coordinator;
pub mod error;
pub mod escape;
pub mod failure;
pub mod finalizer;
pub mod message;
pub mod resolver;
pub mod tree;
