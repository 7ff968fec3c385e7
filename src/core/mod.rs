// Public modules
pub mod auth;
pub mod bundle;
pub mod command;
pub mod env;
pub mod error;
pub mod http;
pub mod jamf;
pub mod package;
pub mod paths;
pub mod pipeline;
pub mod predicate;
pub mod prefs;
pub mod recipe;
pub mod step;
pub mod steps;
pub mod title_editor;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
