//! # libjdb
//!
//! Async Rust driver for the Java debugger (`jdb`) and other line-oriented
//! REPL subprocesses.
//!
//! This library runs the debugger as a child process and supports:
//! - Class path / source path argument construction, with `@argfile`
//!   spill-over for long class paths
//! - Sending commands and reading output line by line
//! - A non-blocking readiness check and drain over buffered output
//! - Graceful quit, forced kill, and wait-for-exit
//!
//! ## Quick Start
//!
//! ```ignore
//! use libjdb::{Result, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut jdb = SessionConfig::builder()
//!         .working_directory("/work/target/test-classes")
//!         .class_path(["/work/target/test-classes"])
//!         .source_path(["../../src/test/java"])
//!         .build()?;
//!
//!     let _shutdown = jdb.run()?;
//!     jdb.send_all(["clear", "run pkg.Calc", "stop at pkg.Calc:8"]).await?;
//!
//!     let mut line = jdb.read().await;
//!     while !line.contains("Breakpoint") && jdb.is_running() {
//!         line = jdb.read().await;
//!     }
//!     jdb.send("cont").await?;
//!     println!("{}", jdb.read().await);
//!
//!     jdb.quit().await
//! }
//! ```
//!
//! ## Polling without blocking
//!
//! ```ignore
//! while jdb.is_running() {
//!     if jdb.is_ready() {
//!         for line in jdb.read_all()? {
//!             println!("{line}");
//!         }
//!     }
//!     tokio::time::sleep(std::time::Duration::from_millis(50)).await;
//! }
//! ```

pub mod config;
mod error;
pub mod process;
mod session;

pub use error::{Error, Result};

// Re-export the main session types at crate root
pub use session::{ProcessSession, SessionState, ShutdownHandle};

// Re-export commonly used config types at crate root
pub use config::{ArgumentEncoder, EncodedArguments, SessionBuilder, SessionConfig};

// Re-export commonly used process types at crate root
pub use process::{ChildProcess, CommandSpec, Spawner, TokioChild, TokioSpawner};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}
    fn assert_send<T: Send>() {}

    /// Public types must be usable across async tasks.
    #[test]
    fn public_types_are_send_sync() {
        // Configuration types
        assert_send_sync::<SessionConfig>();
        assert_send_sync::<SessionBuilder>();
        assert_send_sync::<ArgumentEncoder>();
        assert_send_sync::<EncodedArguments>();

        // Session types
        assert_send_sync::<ShutdownHandle>();
        assert_send_sync::<SessionState>();

        // Process types
        assert_send_sync::<CommandSpec>();
        assert_send_sync::<TokioSpawner>();
        assert_send_sync::<TokioChild>();

        // Error type
        assert_send_sync::<Error>();
    }

    /// A session can be moved into a spawned task.
    #[test]
    fn session_is_send() {
        assert_send::<ProcessSession>();
    }
}
