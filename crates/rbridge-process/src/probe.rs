//! Permission probing for candidate executables
//!
//! A file that exists is not necessarily runnable. The probe spawns the
//! candidate with a harmless argument and kills it straight away; if the OS
//! lets us spawn it, we can launch it for real later.

use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace, warn};

/// Argument passed to the probe process
pub const PROBE_ARGS: &[&str] = &["--vanilla"];

/// How long to wait for the probe process to die after each kill
const KILL_WAIT: Duration = Duration::from_millis(250);

/// Kill attempts before the probe is handed to a reaper thread
const KILL_ATTEMPTS: u32 = 3;

/// Poll interval while waiting for the probe process to die
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Why a single candidate was rejected.
///
/// Returned as data; discovery moves on to the next candidate.
#[derive(Debug, Error)]
pub enum ProbeFailure {
    #[error("file does not exist")]
    Missing,

    #[error("cannot resolve path: {0}")]
    Canonicalize(#[source] io::Error),

    #[error("cannot spawn: {0}")]
    Spawn(#[source] io::Error),
}

/// Checks whether an executable can be launched
#[cfg_attr(test, mockall::automock)]
pub trait Prober: Send + Sync {
    fn probe(&self, executable: &Path) -> Result<(), ProbeFailure>;
}

/// Probes by actually spawning the executable and terminating it immediately
#[derive(Debug, Clone)]
pub struct SpawnProbe {
    args: Vec<String>,
}

impl SpawnProbe {
    pub fn new() -> Self {
        Self::with_args(PROBE_ARGS.iter().map(|a| a.to_string()).collect())
    }

    pub fn with_args(args: Vec<String>) -> Self {
        Self { args }
    }
}

impl Default for SpawnProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for SpawnProbe {
    fn probe(&self, executable: &Path) -> Result<(), ProbeFailure> {
        let child = Command::new(executable)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(ProbeFailure::Spawn)?;

        trace!("Probe spawned {:?} (pid {})", executable, child.id());
        terminate(child);
        Ok(())
    }
}

/// Kill and reap `child`, retrying if it survives a kill.
///
/// Never blocks indefinitely: a process that outlives every attempt is left
/// to a detached reaper thread.
pub(crate) fn terminate(mut child: Child) {
    let pid = child.id();

    for attempt in 1..=KILL_ATTEMPTS {
        if let Ok(Some(status)) = child.try_wait() {
            trace!("Probe process {} exited with {}", pid, status);
            return;
        }

        if let Err(e) = child.kill() {
            debug!("Kill attempt {} for probe {} failed: {}", attempt, pid, e);
        }

        let deadline = Instant::now() + KILL_WAIT;
        while Instant::now() < deadline {
            match child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    debug!("Waiting on probe {} failed: {}", pid, e);
                    break;
                }
            }
        }

        warn!("Probe process {} survived kill attempt {}", pid, attempt);
    }

    std::thread::spawn(move || {
        let _ = child.kill();
        let _ = child.wait();
    });
}
