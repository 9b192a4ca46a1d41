//! Process management for the debugger subprocess.
//!
//! Spawning goes through the [`Spawner`] capability so sessions can run
//! against real OS processes ([`TokioSpawner`]) or an in-memory fake.
//!
//! # Architecture
//!
//! ```text
//! libjdb                                  jdb
//! ┌──────────────┐                      ┌─────────────┐
//! │ SessionInput │───stdin (commands)──▶│             │
//! │ SessionOutput│◀──stdout (lines)─────│             │
//! │              │   stderr discarded   │             │
//! └──────────────┘                      └─────────────┘
//! ```
//!
//! # Output Protocol
//!
//! Output is plain text split on `\n`. Prompts the debugger prints
//! without a trailing newline are delivered as the prefix of the next
//! line.

mod io;
mod spawn;

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncWrite};

pub use io::{SessionInput, SessionOutput, OUTPUT_QUEUE_CAPACITY};
pub use spawn::{force_kill_pid, TokioChild, TokioSpawner};

/// Debugger executable used when none is configured.
pub const DEFAULT_PROGRAM: &str = "jdb";

/// A program invocation: executable, arguments, directory, environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub inherit_env: bool,
}

impl CommandSpec {
    /// Create a spec for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_directory: None,
            env: HashMap::new(),
            inherit_env: true,
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Whether the parent environment is inherited.
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }
}

/// A running child process with piped standard streams.
pub trait ChildProcess: Send + 'static {
    /// Writable end of the child's stdin.
    type Stdin: AsyncWrite + Send + Unpin + 'static;
    /// Readable end of the child's stdout.
    type Stdout: AsyncRead + Send + Unpin + 'static;

    /// Take the stdin pipe. Returns `None` after the first call.
    fn take_stdin(&mut self) -> Option<Self::Stdin>;

    /// Take the stdout pipe. Returns `None` after the first call.
    fn take_stdout(&mut self) -> Option<Self::Stdout>;

    /// OS process id, or `None` once the process has been reaped.
    fn id(&self) -> Option<u32>;

    /// Whether the process has not exited yet.
    fn is_alive(&mut self) -> bool;

    /// Ask the process to exit (SIGTERM on unix). A process that already
    /// exited is not an error.
    fn terminate(&mut self) -> std::io::Result<()>;

    /// Kill the process by id without giving it a chance to clean up
    /// (SIGKILL on unix). A process that already exited is not an error.
    fn force_terminate(&mut self) -> std::io::Result<()>;

    /// Wait for the process to exit and return its exit code, if any.
    fn wait(&mut self) -> impl Future<Output = std::io::Result<Option<i32>>> + Send;
}

/// Capability to start child processes.
pub trait Spawner: Send + Sync + 'static {
    /// The process type this spawner produces.
    type Child: ChildProcess;

    /// Start `spec` with stdin and stdout piped.
    fn spawn(&self, spec: &CommandSpec) -> std::io::Result<Self::Child>;
}
