//! R process session
//!
//! [`RProcess`] owns one running interpreter. Its stdout (and optionally
//! stderr) is decoded by background reader tasks and appended to a shared
//! [`OutputBuffer`]; commands go to stdin through a single writer task, so
//! concurrent submissions are written whole and in call order.
//!
//! Lifecycle: `Created -> Running -> Closed`. The session closes on
//! [`RProcess::close`], when the process exits, when stdout reaches EOF, or
//! when a read or write fails. Closing is idempotent.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use rbridge_core::prelude::*;
use rbridge_core::{AtomicSessionState, SessionState};

use crate::buffer::OutputBuffer;
use crate::decoder::Utf8Decoder;

/// Size of a single pipe read
const READ_CHUNK: usize = 4096;

/// How long readers may keep draining after the process is gone
const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// How long a process that closed stdout has to exit before it is killed
const EOF_EXIT_GRACE: Duration = Duration::from_millis(200);

/// Options for [`RProcess::start`]
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// Append stderr to the output buffer as well as stdout
    pub capture_stderr: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            capture_stderr: true,
        }
    }
}

/// State shared between the session handle and its background tasks
#[derive(Debug)]
struct Shared {
    state: AtomicSessionState,
    /// Flips to `true` when the session is asked to close
    close_tx: watch::Sender<bool>,
    /// Flips to `true` once the process is reaped and readers are done
    terminated_tx: watch::Sender<bool>,
    exit_code: OnceLock<Option<i32>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicSessionState::default(),
            close_tx: watch::channel(false).0,
            terminated_tx: watch::channel(false).0,
            exit_code: OnceLock::new(),
        }
    }

    /// Move to `Closed` and signal the background tasks. Only the first call
    /// has any effect.
    fn close(&self, reason: &str) -> bool {
        if self.state.mark_closed() {
            info!("Closing R session: {}", reason);
            self.close_tx.send_replace(true);
            true
        } else {
            false
        }
    }
}

/// Resolves once `rx` holds `true` (or its sender is gone).
async fn wait_true(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|flag| *flag).await;
}

/// A running R interpreter bound to an output buffer.
pub struct RProcess {
    /// Queue feeding the stdin writer task. `None` once stdin was released.
    stdin_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pid: Option<u32>,
    buffer: Arc<OutputBuffer>,
    shared: Arc<Shared>,
}

impl RProcess {
    /// Spawn `path` with `args` and start capturing its output into `buffer`.
    ///
    /// Fails with [`Error::Launch`] if the executable does not exist or the
    /// OS refuses to start it. Must be called from within a Tokio runtime.
    pub async fn start(
        path: &Path,
        args: &[String],
        buffer: Arc<OutputBuffer>,
        options: StartOptions,
    ) -> Result<Self> {
        if !path.exists() {
            return Err(Error::launch(path, "executable does not exist"));
        }

        info!("Spawning R: {} {}", path.display(), args.join(" "));

        let mut child = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if options.capture_stderr {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::launch(path, e.to_string()))?;

        let pid = child.id();
        info!("R process started with PID: {:?}", pid);

        let shared = Arc::new(Shared::new());
        shared.state.mark_running();

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(Error::launch(path, "process pipes were not created"));
        };

        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(Self::stdin_writer(stdin, stdin_rx, Arc::clone(&shared)));

        let stdout_reader = tokio::spawn(Self::output_reader(
            stdout,
            "stdout",
            Arc::clone(&buffer),
            Arc::clone(&shared),
        ));
        let stderr_reader = child.stderr.take().map(|stderr| {
            tokio::spawn(Self::output_reader(
                stderr,
                "stderr",
                Arc::clone(&buffer),
                Arc::clone(&shared),
            ))
        });

        tokio::spawn(Self::wait_for_exit(
            child,
            stdout_reader,
            stderr_reader,
            Arc::clone(&shared),
        ));

        Ok(Self {
            stdin_tx: Mutex::new(Some(stdin_tx)),
            pid,
            buffer,
            shared,
        })
    }

    /// Background task: drains one output pipe into the buffer.
    ///
    /// The exit task watches the stdout reader: its EOF ends the session.
    async fn output_reader<R>(
        mut stream: R,
        label: &'static str,
        buffer: Arc<OutputBuffer>,
        shared: Arc<Shared>,
    ) where
        R: AsyncRead + Unpin,
    {
        let mut decoder = Utf8Decoder::new();
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => {
                    buffer.append(&decoder.finish());
                    debug!("{} reached EOF", label);
                    break;
                }
                Ok(n) => {
                    trace!("{}: {} bytes", label, n);
                    buffer.append(&decoder.decode(&chunk[..n]));
                }
                Err(e) => {
                    error!("Failed to read R {}: {}", label, e);
                    shared.close(&Error::session_io(e.to_string()).to_string());
                    break;
                }
            }
        }

        debug!("{} reader finished", label);
    }

    /// Background task: writes queued commands to stdin, one at a time.
    ///
    /// Stops when the session closes or the queue's sender is released,
    /// dropping stdin so the interpreter sees EOF.
    async fn stdin_writer(
        mut stdin: ChildStdin,
        mut rx: mpsc::UnboundedReceiver<String>,
        shared: Arc<Shared>,
    ) {
        let mut close_rx = shared.close_tx.subscribe();

        loop {
            let command = tokio::select! {
                command = rx.recv() => command,
                _ = wait_true(&mut close_rx) => None,
            };
            let Some(command) = command else { break };

            debug!("Sending to R: {}", command);

            let written = async {
                stdin.write_all(command.as_bytes()).await?;
                stdin.write_all(b"\n").await?;
                stdin.flush().await
            }
            .await;

            if let Err(e) = written {
                error!("Failed to write to R stdin: {}", e);
                shared.close(&Error::session_io(e.to_string()).to_string());
                break;
            }
        }

        debug!("stdin writer finished");
    }

    /// Background task: owns `child`, reaps it, then finishes the session.
    ///
    /// Three ways the process can end:
    /// 1. It exits on its own.
    /// 2. It closes stdout; it gets a short grace period to exit, then is killed.
    /// 3. The session is closed; the process is killed, then reaped.
    ///
    /// Readers get a short window to drain what the process wrote before it
    /// died; stragglers (e.g. a grandchild still holding the pipe) are aborted.
    async fn wait_for_exit(
        mut child: Child,
        mut stdout_reader: JoinHandle<()>,
        stderr_reader: Option<JoinHandle<()>>,
        shared: Arc<Shared>,
    ) {
        let mut close_rx = shared.close_tx.subscribe();
        let mut stdout_done = false;

        let code: Option<i32> = tokio::select! {
            biased;
            result = child.wait() => Self::status_code(result),
            _ = &mut stdout_reader => {
                stdout_done = true;
                debug!("stdout closed, waiting for R to exit");
                match tokio::time::timeout(EOF_EXIT_GRACE, child.wait()).await {
                    Ok(result) => Self::status_code(result),
                    Err(_) => {
                        warn!("R closed stdout but kept running, killing it");
                        Self::kill(&mut child).await
                    }
                }
            }
            _ = wait_true(&mut close_rx) => {
                info!("Close requested, killing R process");
                Self::kill(&mut child).await
            }
        };

        let readers = (!stdout_done)
            .then_some(stdout_reader)
            .into_iter()
            .chain(stderr_reader);

        for reader in readers {
            let abort = reader.abort_handle();
            if tokio::time::timeout(READER_DRAIN_TIMEOUT, reader).await.is_err() {
                warn!("Output reader still busy after exit, aborting");
                abort.abort();
            }
        }

        shared.close("process exited");
        let _ = shared.exit_code.set(code);

        debug!("R session terminated (code {:?})", code);
        shared.terminated_tx.send_replace(true);
    }

    fn status_code(result: std::io::Result<std::process::ExitStatus>) -> Option<i32> {
        match result {
            Ok(status) => {
                info!("R process exited with status: {:?}", status);
                status.code()
            }
            Err(e) => {
                error!("Error waiting for R process: {}", e);
                None
            }
        }
    }

    async fn kill(child: &mut Child) -> Option<i32> {
        if let Err(e) = child.kill().await {
            error!("Failed to kill R process: {}", e);
        }
        match child.wait().await {
            Ok(status) => {
                info!("R process killed, exit status: {:?}", status);
                status.code()
            }
            Err(e) => {
                error!("Error waiting after kill: {}", e);
                None
            }
        }
    }

    /// Queue `command` for the interpreter's stdin.
    ///
    /// A trailing line break is normalized to a single `\n`. Nothing is
    /// returned: if the session is closed the command is dropped and the
    /// failure shows up as the session's closed signal.
    pub fn submit(&self, command: &str) {
        let command = command.trim_end_matches(['\r', '\n']);

        if self.shared.state.is_closed() {
            warn!("R session closed, dropping command: {}", command);
            return;
        }

        let stdin_tx = self.stdin_tx.lock();
        let Some(tx) = stdin_tx.as_ref() else {
            // Released by shutdown; R is on its way out
            warn!("R stdin released for shutdown, dropping command: {}", command);
            return;
        };

        if tx.send(command.to_string()).is_err() {
            warn!("R stdin writer stopped, dropping command: {}", command);
            drop(stdin_tx);
            self.shared.close("stdin writer stopped");
        }
    }

    /// Terminate the process and stop the readers. Safe to call repeatedly.
    pub fn close(&self) {
        if !self.shared.close("close requested") {
            debug!("R session already closed");
        }
    }

    /// Graceful shutdown.
    ///
    /// Releases stdin so the interpreter can exit on EOF, waits up to
    /// `grace`, then kills it. Returns once the session has terminated.
    pub async fn shutdown(&self, grace: Duration) {
        if self.has_exited() {
            info!("R process already exited, skipping shutdown");
            return;
        }

        info!("Initiating R process shutdown");
        // Dropping the sender ends the writer after queued commands
        self.stdin_tx.lock().take();

        if tokio::time::timeout(grace, self.wait_terminated()).await.is_ok() {
            info!("R process exited gracefully");
            return;
        }

        warn!("Timeout waiting for graceful exit, force killing");
        self.close();
        self.wait_terminated().await;
    }

    /// Resolves once the process has been reaped and the readers are done
    pub async fn wait_terminated(&self) {
        wait_true(&mut self.terminated()).await;
    }

    /// Receiver that flips to `true` when the session has fully terminated
    pub fn terminated(&self) -> watch::Receiver<bool> {
        self.shared.terminated_tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.load()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// True once the process has been reaped
    pub fn has_exited(&self) -> bool {
        *self.shared.terminated_tx.borrow()
    }

    /// Exit code, once the process has exited. `None` inside when the
    /// process was killed by a signal.
    pub fn exit_code(&self) -> Option<Option<i32>> {
        self.shared.exit_code.get().copied()
    }

    /// Get the process ID
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    pub fn buffer(&self) -> &Arc<OutputBuffer> {
        &self.buffer
    }
}

impl Drop for RProcess {
    fn drop(&mut self) {
        if self.shared.close("session handle dropped") {
            warn!("RProcess dropped while the process may still be running");
        }
        // kill_on_drop(true) on the Child is the final safety net
        debug!("RProcess dropped");
    }
}

impl std::fmt::Debug for RProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RProcess")
            .field("pid", &self.pid)
            .field("state", &self.state())
            .field("has_exited", &self.has_exited())
            .finish()
    }
}
