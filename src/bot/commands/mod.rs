//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Administration commands
pub mod admin;

/// General utility commands
pub mod general;

/// Order commands
pub mod order;

// Export commands
pub use admin::*;
pub use general::*;
pub use order::*;
