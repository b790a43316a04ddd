//! Data models for the notices service.
//!
//! Wire names are camelCase to match the documents the website reads.

mod alert;
mod banner;
mod document;

pub use alert::*;
pub use banner::*;
pub use document::*;
