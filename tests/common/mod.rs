//! Test utilities for libjdb integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use libjdb::{ChildProcess, CommandSpec, Spawner};
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Exit code reported after a cooperative terminate.
pub const TERMINATED_CODE: i32 = 143;
/// Exit code reported after a forced kill.
pub const KILLED_CODE: i32 = 137;

type Responder = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Everything the fake debugger saw.
#[derive(Debug, Default, Clone)]
pub struct FakeLog {
    pub spawned: Vec<CommandSpec>,
    pub received: Vec<String>,
    pub signals: Vec<&'static str>,
}

/// Spawns in-memory debuggers that answer each command line through a
/// responder function.
///
/// The fake exits with code 0 on the `exit` command or when its stdin is
/// closed.
#[derive(Clone)]
pub struct FakeSpawner {
    banner: Vec<String>,
    responder: Responder,
    failure: Option<io::ErrorKind>,
    log: Arc<Mutex<FakeLog>>,
}

impl FakeSpawner {
    /// Create a fake debugger answering with `responder`.
    pub fn new(responder: impl Fn(&str) -> Vec<String> + Send + Sync + 'static) -> Self {
        Self {
            banner: Vec::new(),
            responder: Arc::new(responder),
            failure: None,
            log: Arc::new(Mutex::new(FakeLog::default())),
        }
    }

    /// A fake that answers every command with `> <command>`.
    pub fn echo() -> Self {
        Self::new(|command| vec![format!("> {command}")])
    }

    /// A fake that never prints anything.
    pub fn silent() -> Self {
        Self::new(|_| Vec::new())
    }

    /// A fake that mimics jdb stopping at `pkg.Calc:8`.
    pub fn calculator() -> Self {
        Self::new(|command| match command {
            "clear" => vec!["No breakpoints set.".to_string()],
            "run pkg.Calc" => vec![
                "run pkg.Calc".to_string(),
                "Set uncaught java.lang.Throwable".to_string(),
                "> ".to_string(),
                "VM Started: ".to_string(),
            ],
            "stop at pkg.Calc:8" => vec![
                "Set breakpoint pkg.Calc:8".to_string(),
                "Breakpoint hit: \"thread=main\", pkg.Calc.main(), line=8 bci=0".to_string(),
                "8    \t\tsum(2, 3);".to_string(),
            ],
            "cont" => vec![
                "> ".to_string(),
                "The application exited".to_string(),
            ],
            _ => Vec::new(),
        })
        .with_banner(["Initializing jdb ..."])
    }

    /// Lines printed right after start.
    pub fn with_banner<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.banner = lines.into_iter().map(Into::into).collect();
        self
    }

    /// A spawner whose spawns always fail with `kind`.
    pub fn failing(kind: io::ErrorKind) -> Self {
        let mut spawner = Self::silent();
        spawner.failure = Some(kind);
        spawner
    }

    /// Snapshot of what the fake has seen so far.
    pub fn log(&self) -> FakeLog {
        self.log.lock().unwrap().clone()
    }
}

impl Spawner for FakeSpawner {
    type Child = FakeChild;

    fn spawn(&self, spec: &CommandSpec) -> io::Result<FakeChild> {
        if let Some(kind) = self.failure {
            return Err(io::Error::new(kind, "fake spawn failure"));
        }
        self.log.lock().unwrap().spawned.push(spec.clone());

        let (stdin_client, stdin_repl) = duplex(4096);
        let (stdout_repl, stdout_client) = duplex(64 * 1024);
        let (exit_tx, exit_rx) = watch::channel(None);
        let exit_tx = Arc::new(exit_tx);

        let task = tokio::spawn(run_repl(
            stdin_repl,
            stdout_repl,
            self.banner.clone(),
            Arc::clone(&self.responder),
            Arc::clone(&self.log),
            Arc::clone(&exit_tx),
        ));

        Ok(FakeChild {
            stdin: Some(stdin_client),
            stdout: Some(stdout_client),
            exit_tx,
            exit_rx,
            task,
            log: Arc::clone(&self.log),
        })
    }
}

async fn run_repl(
    stdin: DuplexStream,
    mut stdout: DuplexStream,
    banner: Vec<String>,
    responder: Responder,
    log: Arc<Mutex<FakeLog>>,
    exit: Arc<watch::Sender<Option<i32>>>,
) {
    for line in banner {
        if write_line(&mut stdout, &line).await.is_err() {
            return;
        }
    }

    let mut lines = BufReader::new(stdin).lines();
    while let Ok(Some(command)) = lines.next_line().await {
        log.lock().unwrap().received.push(command.clone());
        if command == "exit" {
            break;
        }
        for line in responder(&command) {
            if write_line(&mut stdout, &line).await.is_err() {
                break;
            }
        }
    }

    exit.send_if_modified(|code| {
        if code.is_none() {
            *code = Some(0);
            true
        } else {
            false
        }
    });
}

async fn write_line(stdout: &mut DuplexStream, line: &str) -> io::Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

/// An in-memory debugger process.
pub struct FakeChild {
    stdin: Option<DuplexStream>,
    stdout: Option<DuplexStream>,
    exit_tx: Arc<watch::Sender<Option<i32>>>,
    exit_rx: watch::Receiver<Option<i32>>,
    task: JoinHandle<()>,
    log: Arc<Mutex<FakeLog>>,
}

impl FakeChild {
    fn stop(&mut self, signal: &'static str, code: i32) {
        self.log.lock().unwrap().signals.push(signal);
        if self.is_alive() {
            self.exit_tx.send_replace(Some(code));
            self.task.abort();
        }
    }
}

impl ChildProcess for FakeChild {
    type Stdin = DuplexStream;
    type Stdout = DuplexStream;

    fn take_stdin(&mut self) -> Option<DuplexStream> {
        self.stdin.take()
    }

    fn take_stdout(&mut self) -> Option<DuplexStream> {
        self.stdout.take()
    }

    fn id(&self) -> Option<u32> {
        // Never hand out a pid; a real process could own it.
        None
    }

    fn is_alive(&mut self) -> bool {
        self.exit_rx.borrow().is_none()
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.stop("TERM", TERMINATED_CODE);
        Ok(())
    }

    fn force_terminate(&mut self) -> io::Result<()> {
        self.stop("KILL", KILLED_CODE);
        Ok(())
    }

    fn wait(&mut self) -> impl std::future::Future<Output = io::Result<Option<i32>>> + Send {
        let mut exit = self.exit_rx.clone();
        async move {
            let code = *exit
                .wait_for(Option::is_some)
                .await
                .map_err(|_| io::Error::other("fake process vanished"))?;
            Ok(code)
        }
    }
}

/// Route `tracing` output to the test harness. Honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
