//! Process spawning and termination backed by `tokio::process`.

use std::future::Future;
use std::io;
use std::process::Stdio;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::{ChildProcess, CommandSpec, Spawner};

/// Spawns real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl Spawner for TokioSpawner {
    type Child = TokioChild;

    fn spawn(&self, spec: &CommandSpec) -> io::Result<TokioChild> {
        let child = build_command(spec).spawn()?;
        tracing::debug!(
            pid = child.id().unwrap_or(0),
            program = %spec.program,
            "spawned debugger process"
        );
        Ok(TokioChild { child })
    }
}

/// A debugger process started by [`TokioSpawner`].
///
/// # Cancellation
///
/// Dropping a `TokioChild` kills the subprocess if it's still running.
#[derive(Debug)]
pub struct TokioChild {
    child: Child,
}

impl ChildProcess for TokioChild {
    type Stdin = ChildStdin;
    type Stdout = ChildStdout;

    fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn terminate(&mut self) -> io::Result<()> {
        if !self.is_alive() {
            return Ok(());
        }
        match self.child.id() {
            Some(pid) => terminate_pid(pid, &mut self.child),
            None => Ok(()),
        }
    }

    fn force_terminate(&mut self) -> io::Result<()> {
        if !self.is_alive() {
            return Ok(());
        }
        match self.child.id() {
            Some(pid) => force_kill_pid(pid),
            None => Ok(()),
        }
    }

    fn wait(&mut self) -> impl Future<Output = io::Result<Option<i32>>> + Send {
        async move { self.child.wait().await.map(|status| status.code()) }
    }
}

/// Build a tokio Command from the spec.
fn build_command(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args);

    if let Some(ref dir) = spec.working_directory {
        cmd.current_dir(dir);
    }

    if !spec.inherit_env {
        cmd.env_clear();
    }
    cmd.envs(&spec.env);

    // stderr is never read.
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    cmd
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid pid {pid}")))?;

    match nix::sys::signal::kill(Pid::from_raw(raw), signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

#[cfg(unix)]
fn terminate_pid(pid: u32, _child: &mut Child) -> io::Result<()> {
    tracing::debug!(pid, "sending SIGTERM");
    send_signal(pid, nix::sys::signal::Signal::SIGTERM)
}

#[cfg(not(unix))]
fn terminate_pid(pid: u32, child: &mut Child) -> io::Result<()> {
    tracing::debug!(pid, "terminating process");
    child.start_kill()
}

/// Kill a process by id, immediately and without cleanup.
///
/// A process that no longer exists is not an error.
#[cfg(unix)]
pub fn force_kill_pid(pid: u32) -> io::Result<()> {
    tracing::debug!(pid, "sending SIGKILL");
    send_signal(pid, nix::sys::signal::Signal::SIGKILL)
}

/// Kill a process by id, immediately and without cleanup.
#[cfg(not(unix))]
pub fn force_kill_pid(pid: u32) -> io::Result<()> {
    tracing::debug!(pid, "running taskkill");
    let status = std::process::Command::new("taskkill")
        .args(["/F", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {status}")))
    }
}
