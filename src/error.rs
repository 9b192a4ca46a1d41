/// Errors that can occur when driving a debugger session.
///
/// Errors are organized by category:
/// - Configuration errors: detected at `build()` time
/// - Spawn errors: failed to start the debugger process
/// - IO errors: communication failures with the subprocess
/// - Lifecycle errors: an operation was called in the wrong session state
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    // -------------------------------------------------------------------------
    // Configuration errors (detected at build() time)
    // -------------------------------------------------------------------------
    /// Invalid configuration provided to the builder.
    ///
    /// Raised when a resolved class path or source path cannot be passed
    /// to the child process as a string.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -------------------------------------------------------------------------
    // Spawn errors
    // -------------------------------------------------------------------------
    /// Debugger binary not found in PATH.
    #[error("debugger program not found (searched: {searched})")]
    CliNotFound { searched: String },

    /// Failed to spawn the debugger subprocess.
    #[error("failed to spawn debugger process: {0}")]
    ProcessSpawn(#[source] std::io::Error),

    // -------------------------------------------------------------------------
    // IO errors
    // -------------------------------------------------------------------------
    /// IO error communicating with the debugger subprocess.
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    // -------------------------------------------------------------------------
    // Lifecycle errors
    // -------------------------------------------------------------------------
    /// The session's input stream was never opened or has been closed.
    #[error("input is closed")]
    InputClosed,

    /// The operation is not valid in the session's current state.
    #[error("illegal state: {0}")]
    IllegalState(String),
}

/// A specialized Result type for libjdb operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an IO error.
    pub fn io(source: std::io::Error) -> Self {
        Self::Io(source)
    }

    /// Map a spawn failure, singling out a missing program.
    pub(crate) fn spawn(source: std::io::Error, program: &str) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::CliNotFound {
                searched: program.to_string(),
            }
        } else {
            Self::ProcessSpawn(source)
        }
    }

    /// Check if this error reports misuse of the session lifecycle
    /// (illegal-state conditions) rather than an I/O problem.
    pub fn is_lifecycle_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_) | Error::InputClosed | Error::IllegalState(_)
        )
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }

    #[test]
    fn lifecycle_error_detection() {
        assert!(Error::InputClosed.is_lifecycle_error());
        assert!(Error::IllegalState("already started".into()).is_lifecycle_error());
        assert!(Error::InvalidConfig("class path".into()).is_lifecycle_error());
        assert!(!Error::ProcessSpawn(std::io::Error::other("boom")).is_lifecycle_error());
        assert!(!Error::CliNotFound {
            searched: "jdb".into()
        }
        .is_lifecycle_error());
    }

    #[test]
    fn is_retryable_detection() {
        assert!(Error::Io(std::io::Error::other("broken pipe")).is_retryable());
        assert!(!Error::InputClosed.is_retryable());
        assert!(!Error::CliNotFound {
            searched: "jdb".into()
        }
        .is_retryable());
    }

    #[test]
    fn spawn_not_found_maps_to_cli_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = Error::spawn(io_err, "jdb");
        assert!(matches!(err, Error::CliNotFound { ref searched } if searched == "jdb"));
        assert_eq!(
            err.to_string(),
            "debugger program not found (searched: jdb)"
        );
    }

    #[test]
    fn spawn_other_failure_maps_to_process_spawn() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(Error::spawn(io_err, "jdb"), Error::ProcessSpawn(_)));
    }

    #[test]
    fn question_mark_operator_io() {
        fn fallible_io() -> Result<()> {
            let _file = std::fs::File::open("/nonexistent/path/that/does/not/exist")?;
            Ok(())
        }
        let result = fallible_io();
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
