//! The runner side of the boundary: what it declared and what it fires.

pub mod driver;
pub mod error;
pub mod event;
pub mod registry;
