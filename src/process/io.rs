//! I/O primitives for communicating with the debugger subprocess.

use std::collections::VecDeque;
use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Writes commands to the debugger's stdin.
///
/// Every command is written as one `\n`-terminated line and flushed right
/// away. Write failures are logged and swallowed: a broken pipe shows up
/// through the process state and the output stream instead.
pub struct SessionInput<W> {
    writer: Option<W>,
    closed: CancellationToken,
}

impl<W: AsyncWrite + Unpin> SessionInput<W> {
    /// Create a new input stream from a child process stdin.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
            closed: CancellationToken::new(),
        }
    }

    /// Whether [`close`](Self::close) has been called, here or through
    /// the close token.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token that closes this stream when cancelled.
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Send one command.
    pub async fn send(&mut self, command: &str) {
        let Some(writer) = self.open_writer() else {
            return;
        };
        if let Err(e) = write_line(writer, command).await {
            tracing::debug!(error = %e, command, "write to debugger stdin failed");
        }
    }

    /// Send several commands, in order.
    pub async fn send_all<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for command in commands {
            self.send(command.as_ref()).await;
        }
    }

    /// Release the underlying pipe. Safe to call more than once.
    pub fn close(&mut self) {
        self.closed.cancel();
        self.writer = None;
    }

    fn open_writer(&mut self) -> Option<&mut W> {
        if self.closed.is_cancelled() {
            // Closed through the token; drop the pipe now.
            self.writer = None;
        }
        self.writer.as_mut()
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Lines of debugger output queued ahead of the caller.
///
/// When the queue is full the reader stops pulling from the pipe, so an
/// undrained debugger blocks on its own stdout.
pub const OUTPUT_QUEUE_CAPACITY: usize = 1024;

/// Reads lines from the debugger's stdout.
///
/// A background task reads stdout as data arrives and queues complete
/// lines, up to [`OUTPUT_QUEUE_CAPACITY`]. [`read`](Self::read) waits on that queue, while
/// [`is_ready`](Self::is_ready) and [`read_all`](Self::read_all) only look
/// at what is already queued, so the three always agree on what is
/// available.
///
/// Requires a tokio runtime to construct.
pub struct SessionOutput {
    lines: mpsc::Receiver<io::Result<String>>,
    pending: VecDeque<io::Result<String>>,
    closed: CancellationToken,
    pump: Option<JoinHandle<()>>,
}

impl SessionOutput {
    /// Start reading `stdout` in the background.
    pub fn spawn<R>(stdout: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::with_capacity(stdout, OUTPUT_QUEUE_CAPACITY)
    }

    /// Start reading `stdout` in the background, queueing at most
    /// `capacity` lines.
    pub fn with_capacity<R>(stdout: R, capacity: usize) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let closed = CancellationToken::new();
        let pump = tokio::spawn(pump_lines(stdout, tx, closed.clone()));

        Self {
            lines: rx,
            pending: VecDeque::new(),
            closed,
            pump: Some(pump),
        }
    }

    /// Whether [`close`](Self::close) has been called, here or through
    /// the close token.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token that closes this stream when cancelled.
    ///
    /// Cancelling it also wakes a pending [`read`](Self::read), which then
    /// returns end of stream.
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Wait for the next line.
    ///
    /// Returns `Ok(None)` at end of stream or once the stream is closed.
    ///
    /// # Errors
    ///
    /// Returns the I/O error the reader hit, in stream order.
    pub async fn read(&mut self) -> io::Result<Option<String>> {
        if self.closed.is_cancelled() {
            return Ok(None);
        }
        if let Some(item) = self.pending.pop_front() {
            return item.map(Some);
        }

        tokio::select! {
            biased;

            item = self.lines.recv() => match item {
                Some(item) => item.map(Some),
                None => Ok(None),
            },
            () = self.closed.cancelled() => Ok(None),
        }
    }

    /// Take every line that is already buffered, without waiting.
    ///
    /// # Errors
    ///
    /// Returns the reader's I/O error if it is the first buffered item.
    /// An error queued behind lines is kept for the next call so no line
    /// is lost.
    pub fn read_all(&mut self) -> io::Result<Vec<String>> {
        if self.closed.is_cancelled() {
            return Ok(Vec::new());
        }
        self.fill_pending();

        let mut lines = Vec::with_capacity(self.pending.len());
        while let Some(item) = self.pending.pop_front() {
            match item {
                Ok(line) => lines.push(line),
                Err(e) if lines.is_empty() => return Err(e),
                Err(e) => {
                    self.pending.push_front(Err(e));
                    break;
                }
            }
        }
        Ok(lines)
    }

    /// Whether a line is buffered, i.e. [`read`](Self::read) will return
    /// without waiting. Does not consume anything.
    pub fn is_ready(&mut self) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }
        if self.pending.is_empty() {
            if let Ok(item) = self.lines.try_recv() {
                self.pending.push_back(item);
            }
        }
        !self.pending.is_empty()
    }

    /// Stop reading and discard buffered output. Safe to call more than
    /// once.
    pub fn close(&mut self) {
        self.closed.cancel();
        self.pending.clear();
        self.lines.close();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }

    fn fill_pending(&mut self) {
        while let Ok(item) = self.lines.try_recv() {
            self.pending.push_back(item);
        }
    }
}

impl Drop for SessionOutput {
    fn drop(&mut self) {
        self.closed.cancel();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Read `stdout` line by line into `tx` until end of stream, an I/O
/// error, or cancellation.
async fn pump_lines<R>(
    stdout: R,
    tx: mpsc::Sender<io::Result<String>>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    let mut buffer = Vec::with_capacity(4096);

    loop {
        buffer.clear();

        let read = tokio::select! {
            biased;

            () = cancel.cancelled() => break,
            read = reader.read_until(b'\n', &mut buffer) => read,
        };

        match read {
            Ok(0) => {
                tracing::debug!("debugger stdout reached end of stream");
                break;
            }
            Ok(_) => {
                if !queue(&tx, &cancel, Ok(decode_line(&buffer))).await {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "reading debugger stdout failed");
                queue(&tx, &cancel, Err(e)).await;
                break;
            }
        }
    }
}

/// Queue one item, waiting for room. Returns `false` once nobody is
/// listening any more.
async fn queue(
    tx: &mpsc::Sender<io::Result<String>>,
    cancel: &CancellationToken,
    item: io::Result<String>,
) -> bool {
    tokio::select! {
        biased;

        () = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

/// Strip the line terminator and decode, replacing invalid UTF-8.
fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    if end > 0 && raw[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && raw[end - 1] == b'\r' {
        end -= 1;
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
