//! Debugger sessions.
//!
//! This module provides [`ProcessSession`], one run of the debugger from
//! spawn to termination, and [`ShutdownHandle`], the cleanup action a host
//! program runs on its own exit path.
//!
//! # Example
//!
//! ```ignore
//! use libjdb::{Result, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut jdb = SessionConfig::builder()
//!         .class_path(["target/classes"])
//!         .source_path(["src/main/java"])
//!         .build()?;
//!
//!     let shutdown = jdb.run()?;
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.cleanup();
//!     });
//!
//!     jdb.send_all(["stop at pkg.Calc:8", "run pkg.Calc"]).await?;
//!     while jdb.is_running() {
//!         let line = jdb.read().await;
//!         if line.contains("Breakpoint") {
//!             break;
//!         }
//!     }
//!
//!     jdb.quit().await
//! }
//! ```

use std::fmt;
use std::future::{poll_fn, Future};
use std::io;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Poll;

use tokio_util::sync::CancellationToken;

use crate::process::{
    force_kill_pid, ChildProcess, CommandSpec, SessionInput, SessionOutput, Spawner, TokioSpawner,
};
use crate::{Error, Result};

/// Lifecycle state of a [`ProcessSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Built, process not spawned yet.
    Unstarted,
    /// Process spawned and streams open.
    Running,
    /// Quit, killed, or observed to have exited. Not restartable.
    ///
    /// [`ProcessSession::is_running`] returning `false` after a start
    /// moves the session here.
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unstarted => write!(f, "unstarted"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

type Stdin<S> = <<S as Spawner>::Child as ChildProcess>::Stdin;

/// One run of the debugger subprocess.
///
/// Created unstarted by [`SessionBuilder::build`](crate::SessionBuilder::build).
/// [`run`](Self::run) spawns the process and opens both streams together;
/// they are never reopened. Termination closes the streams first, then
/// stops the process.
///
/// # Error policy
///
/// - [`read`](Self::read), [`is_ready`](Self::is_ready) and
///   [`is_running`](Self::is_running) never fail; broken pipes show up as
///   empty lines and `false`.
/// - [`read_all`](Self::read_all) reports I/O failures.
/// - [`send`](Self::send) and [`send_all`](Self::send_all) fail with
///   [`Error::InputClosed`] when the input stream is not open, and swallow
///   write failures.
///
/// # Cancellation
///
/// Dropping a session backed by [`TokioSpawner`] kills the subprocess if
/// it's still running.
pub struct ProcessSession<S: Spawner = TokioSpawner> {
    spec: CommandSpec,
    spawner: S,
    state: SessionState,
    child: Option<S::Child>,
    input: Option<SessionInput<Stdin<S>>>,
    output: Option<SessionOutput>,
    unreaped: ChildSlot,
}

impl<S: Spawner> ProcessSession<S> {
    /// Create an unstarted session for `spec`.
    pub fn new(spec: CommandSpec, spawner: S) -> Self {
        Self {
            spec,
            spawner,
            state: SessionState::Unstarted,
            child: None,
            input: None,
            output: None,
            unreaped: ChildSlot::default(),
        }
    }

    /// The command line this session runs.
    pub fn command(&self) -> &CommandSpec {
        &self.spec
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// OS process id while the process has not been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(ChildProcess::id)
    }

    /// Spawn the debugger and open its streams.
    ///
    /// Returns the session's [`ShutdownHandle`]; the host program should
    /// call [`ShutdownHandle::cleanup`] on its own exit path.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalState`] if the session was already started.
    /// - [`Error::CliNotFound`] / [`Error::ProcessSpawn`] if the process
    ///   cannot be started; the session stays unstarted.
    pub fn run(&mut self) -> Result<ShutdownHandle> {
        if self.state != SessionState::Unstarted {
            return Err(Error::IllegalState(format!(
                "session cannot be started when {}",
                self.state
            )));
        }

        let mut child = self
            .spawner
            .spawn(&self.spec)
            .map_err(|e| Error::spawn(e, &self.spec.program))?;

        let (Some(stdin), Some(stdout)) = (child.take_stdin(), child.take_stdout()) else {
            // Nothing is reading or writing; do not leave it running.
            let _ = child.force_terminate();
            return Err(Error::ProcessSpawn(std::io::Error::other(
                "debugger process has no stdin/stdout pipes",
            )));
        };

        let output = SessionOutput::spawn(stdout);
        let input = SessionInput::new(stdin);
        self.unreaped.hold(child.id());
        let handle = ShutdownHandle {
            child: self.unreaped.clone(),
            input: input.close_token(),
            output: output.close_token(),
        };

        tracing::info!(
            pid = child.id().unwrap_or(0),
            program = %self.spec.program,
            "debugger session started"
        );

        self.child = Some(child);
        self.output = Some(output);
        self.input = Some(input);
        self.state = SessionState::Running;

        Ok(handle)
    }

    /// Send a command.
    ///
    /// The command is only queued on the debugger's stdin; call
    /// [`read`](Self::read) to collect what it prints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InputClosed`] if the session is not running or its
    /// input has been closed.
    pub async fn send(&mut self, command: &str) -> Result<&mut Self> {
        self.open_input()?.send(command).await;
        Ok(self)
    }

    /// Send several commands, in order.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn send_all<I, T>(&mut self, commands: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.open_input()?.send_all(commands).await;
        Ok(self)
    }

    /// Read the next line of output, waiting until one is available.
    ///
    /// Returns an empty string if there is no output stream, at end of
    /// stream, or on an I/O error.
    pub async fn read(&mut self) -> String {
        let Some(output) = self.output.as_mut() else {
            return String::new();
        };
        match output.read().await {
            Ok(Some(line)) => line,
            Ok(None) => String::new(),
            Err(e) => {
                tracing::debug!(error = %e, "debugger output read failed");
                String::new()
            }
        }
    }

    /// Take all output lines that have already arrived, without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if reading the debugger's stdout failed.
    pub fn read_all(&mut self) -> Result<Vec<String>> {
        match self.output.as_mut() {
            Some(output) => output.read_all().map_err(Error::io),
            None => Ok(Vec::new()),
        }
    }

    /// Whether [`read`](Self::read) is guaranteed to return without
    /// waiting.
    pub fn is_ready(&mut self) -> bool {
        self.output.as_mut().is_some_and(SessionOutput::is_ready)
    }

    /// Stop the debugger: close both streams, ask the process to exit and
    /// wait until it has.
    ///
    /// Quitting a process that already exited, or quitting twice, is fine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the process cannot be signalled or waited on.
    pub async fn quit(&mut self) -> Result<()> {
        self.close_streams();
        self.state = SessionState::Stopped;

        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        {
            let _unreaped = self.unreaped.lock();
            child.terminate().map_err(Error::io)?;
        }
        let code = reap(&self.unreaped, child.wait()).await.map_err(Error::io)?;

        tracing::info!(exit_code = ?code, "debugger session stopped");
        Ok(())
    }

    /// Kill the debugger immediately: close both streams, then kill the
    /// process by id without waiting for it.
    ///
    /// Use when [`quit`](Self::quit) is stuck or expected to be.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the kill signal cannot be delivered.
    pub fn force_quit(&mut self) -> Result<()> {
        self.close_streams();
        self.state = SessionState::Stopped;

        if let Some(child) = self.child.as_mut() {
            let _unreaped = self.unreaped.lock();
            tracing::info!(pid = child.id().unwrap_or(0), "force-killing debugger");
            child.force_terminate().map_err(Error::io)?;
        }
        Ok(())
    }

    /// Wait until the debugger exits and return its exit code.
    ///
    /// Returns immediately with `None` if the session was never started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if waiting on the process fails.
    pub async fn wait_for(&mut self) -> Result<Option<i32>> {
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };
        let code = reap(&self.unreaped, child.wait()).await.map_err(Error::io)?;
        self.state = SessionState::Stopped;
        Ok(code)
    }

    /// Whether the debugger process exists and has not exited.
    ///
    /// Observing the exit moves the session to [`SessionState::Stopped`].
    pub fn is_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };

        let mut unreaped = self.unreaped.lock();
        if child.is_alive() {
            return true;
        }
        // is_alive may have reaped the child; its pid is no longer ours.
        *unreaped = None;
        drop(unreaped);

        if self.state == SessionState::Running {
            tracing::debug!("debugger exited on its own");
            self.state = SessionState::Stopped;
        }
        false
    }

    fn open_input(&mut self) -> Result<&mut SessionInput<Stdin<S>>> {
        match self.input.as_mut() {
            Some(input) if !input.is_closed() => Ok(input),
            _ => Err(Error::InputClosed),
        }
    }

    fn close_streams(&mut self) {
        if let Some(input) = self.input.as_mut() {
            input.close();
        }
        if let Some(output) = self.output.as_mut() {
            output.close();
        }
    }
}

impl<S: Spawner> Drop for ProcessSession<S> {
    fn drop(&mut self) {
        // The child is about to be dropped and possibly reaped.
        self.unreaped.release();
    }
}

/// A started child that has not been reaped, shared between a session and
/// its [`ShutdownHandle`].
///
/// An unreaped child keeps its pid reserved. The session only reaps while
/// holding the lock and empties the slot when it does, so a pid read under
/// the lock is always safe to signal.
#[derive(Debug, Clone, Default)]
struct ChildSlot(Arc<Mutex<Option<Unreaped>>>);

#[derive(Debug, Clone, Copy)]
struct Unreaped {
    pid: Option<u32>,
}

impl ChildSlot {
    fn lock(&self) -> MutexGuard<'_, Option<Unreaped>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hold(&self, pid: Option<u32>) {
        *self.lock() = Some(Unreaped { pid });
    }

    fn release(&self) {
        *self.lock() = None;
    }

    fn is_empty(&self) -> bool {
        self.lock().is_none()
    }
}

/// Drive `wait` to completion, polling it only while holding `slot` and
/// emptying the slot in the same critical section the child is reaped in.
async fn reap<F>(slot: &ChildSlot, wait: F) -> io::Result<Option<i32>>
where
    F: Future<Output = io::Result<Option<i32>>>,
{
    let mut wait = pin!(wait);
    poll_fn(|cx| {
        let mut unreaped = slot.lock();
        let poll = wait.as_mut().poll(cx);
        if poll.is_ready() {
            *unreaped = None;
        }
        poll
    })
    .await
}

impl<S: Spawner> fmt::Debug for ProcessSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSession")
            .field("program", &self.spec.program)
            .field("args", &self.spec.args)
            .field("state", &self.state)
            .field("pid", &self.pid())
            .finish()
    }
}

/// Cleanup action for a running session, returned by
/// [`ProcessSession::run`].
///
/// [`cleanup`](Self::cleanup) closes both streams and kills the debugger
/// unless it has already been reaped. It can run concurrently with or
/// after any session operation, from any thread, any number of times.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    child: ChildSlot,
    input: CancellationToken,
    output: CancellationToken,
}

impl ShutdownHandle {
    /// Close the session's streams and kill its process.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn cleanup(&self) {
        self.input.cancel();
        self.output.cancel();

        // Kill while holding the slot so the session cannot reap meanwhile.
        let mut unreaped = self.child.lock();
        let Some(Unreaped { pid: Some(pid) }) = unreaped.take() else {
            return;
        };
        if let Err(e) = force_kill_pid(pid) {
            tracing::warn!(pid, error = %e, "shutdown cleanup could not kill debugger");
        } else {
            tracing::debug!(pid, "shutdown cleanup killed debugger");
        }
    }

    /// Whether the process has been reaped or killed, so cleanup has
    /// nothing left to kill.
    pub fn is_released(&self) -> bool {
        self.child.is_empty()
    }
}
