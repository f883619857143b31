//! Core definitions (error type, result alias and argument checks), relied upon by all cutils-* crates.

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
