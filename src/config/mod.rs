//! Session configuration and argument encoding.
//!
//! This module provides:
//!
//! - [`SessionConfig`] and [`SessionBuilder`] for configuring a session
//! - [`ArgumentEncoder`] for turning path lists into debugger arguments
//! - [`EncodedArguments`], the inline or `@file` form of a class path
//!
//! # Example
//!
//! ```ignore
//! use libjdb::config::SessionConfig;
//!
//! let session = SessionConfig::builder()
//!     .working_directory(&classes)
//!     .class_path([&classes])
//!     .source_path(["../../src/test/java"])
//!     .class_signature("pkg.Calc")
//!     .build()?;
//! ```

pub mod args;
pub mod builder;

pub use args::{
    escape_whitespace, relativize, write_argument_file, ArgumentEncoder, EncodedArguments,
    ARGUMENT_FILE_PREFIX, DEFAULT_ARGUMENT_FILE_THRESHOLD, PATH_SEPARATOR,
};
pub use builder::{SessionBuilder, SessionConfig};
