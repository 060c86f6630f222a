//! A bridged R session
//!
//! Ties one [`RProcess`], its [`OutputBuffer`] and a [`ChangeNotifier`]
//! together. The consumer gets back the notification receiver and drains it
//! on its own context.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rbridge_core::prelude::*;
use rbridge_core::{Platform, SessionState};
use rbridge_process::{invocation_args, OutputBuffer, RProcess, StartOptions};

use crate::config::Settings;
use crate::notifier::{ChangeNotifier, NotificationReceiver};

/// One running interpreter with its output buffer and notifier
#[derive(Debug)]
pub struct Session {
    process: RProcess,
    notifier: ChangeNotifier,
    shutdown_grace: Duration,
}

impl Session {
    /// Launch `executable` with the platform's invocation flags.
    ///
    /// Settings are validated before anything is spawned. A launch failure is
    /// returned as [`Error::Launch`].
    pub async fn launch(
        executable: &Path,
        platform: Platform,
        settings: &Settings,
    ) -> Result<(Self, NotificationReceiver)> {
        settings.validate()?;

        let buffer = Arc::new(OutputBuffer::new(settings.buffer.capacity)?);
        let args: Vec<String> = invocation_args(platform, executable)
            .into_iter()
            .skip(1)
            .collect();
        let options = StartOptions {
            capture_stderr: settings.interpreter.capture_stderr,
        };

        let process = RProcess::start(executable, &args, Arc::clone(&buffer), options).await?;

        let (notifier, rx) =
            ChangeNotifier::spawn(buffer, process.terminated(), settings.notifier.delay())?;

        info!(
            "R session started (pid {:?}, buffer {} chars)",
            process.id(),
            settings.buffer.capacity
        );

        Ok((
            Self {
                process,
                notifier,
                shutdown_grace: settings.session.shutdown_grace(),
            },
            rx,
        ))
    }

    /// Send one line of input to R
    pub fn submit(&self, command: &str) {
        self.process.submit(command);
    }

    /// Kill R immediately. Idempotent.
    pub fn close(&self) {
        self.process.close();
    }

    /// Let R exit on end of input, killing it after the configured grace.
    pub async fn shutdown(&self) {
        self.process.shutdown(self.shutdown_grace).await;
    }

    /// Resolves once R has been reaped
    pub async fn wait_terminated(&self) {
        self.process.wait_terminated().await;
    }

    /// Wait for the notifier to deliver its last message
    pub async fn finish(self) {
        self.process.wait_terminated().await;
        self.notifier.join().await;
    }

    pub fn state(&self) -> SessionState {
        self.process.state()
    }

    pub fn exit_code(&self) -> Option<Option<i32>> {
        self.process.exit_code()
    }

    pub fn buffer(&self) -> &Arc<OutputBuffer> {
        self.process.buffer()
    }

    pub fn process(&self) -> &RProcess {
        &self.process
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::observer::{deliver, SessionObserver};
    use rbridge_process::test_utils::write_fake_interpreter;
    use rbridge_process::OutputSnapshot;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        latest: String,
        changes: usize,
        closes: usize,
    }

    impl SessionObserver for Recorder {
        fn on_change(&mut self, snapshot: &OutputSnapshot) {
            self.latest = snapshot.text().to_string();
            self.changes += 1;
        }

        fn on_close(&mut self) {
            self.closes += 1;
        }
    }

    /// Echoes each input line back, prefixed, and exits on `q()`.
    fn echo_interpreter(dir: &TempDir) -> std::path::PathBuf {
        write_fake_interpreter(
            dir.path(),
            "R",
            r#"printf '> '
while read -r line; do
  if [ "$line" = "q()" ]; then exit 0; fi
  echo "[1] $line"
  printf '> '
done"#,
        )
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let exe = echo_interpreter(&dir);

        let (session, mut rx) = Session::launch(&exe, Platform::Unix, &Settings::default())
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Running);

        session.submit("1 + 1");
        session.submit("q()");

        let mut recorder = Recorder::default();
        tokio::time::timeout(Duration::from_secs(5), deliver(&mut rx, &mut recorder))
            .await
            .expect("session did not close");

        assert!(recorder.latest.contains("[1] 1 + 1"));
        assert!(recorder.changes >= 1);
        assert_eq!(recorder.closes, 1);
        assert_eq!(session.exit_code(), Some(Some(0)));
    }

    #[tokio::test]
    async fn test_close_delivers_on_close_once() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_fake_interpreter(dir.path(), "R", "exec sleep 30");

        let (session, mut rx) = Session::launch(&exe, Platform::Unix, &Settings::default())
            .await
            .unwrap();

        session.close();
        session.close();
        session.submit("ignored");

        let mut recorder = Recorder::default();
        tokio::time::timeout(Duration::from_secs(5), deliver(&mut rx, &mut recorder))
            .await
            .expect("session did not close");

        assert_eq!(recorder.closes, 1);
        assert_eq!(session.state(), SessionState::Closed);
        session.finish().await;
    }

    #[tokio::test]
    async fn test_shutdown_lets_r_exit_on_eof() {
        let dir = tempfile::tempdir().unwrap();
        let exe = echo_interpreter(&dir);

        let (session, _rx) = Session::launch(&exe, Platform::Unix, &Settings::default())
            .await
            .unwrap();

        session.shutdown().await;
        assert_eq!(session.exit_code(), Some(Some(0)));
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let exe = echo_interpreter(&dir);

        let mut settings = Settings::default();
        settings.buffer.capacity = 0;

        let result = Session::launch(&exe, Platform::Unix, &settings).await;
        assert!(matches!(result, Err(Error::ConfigInvalid { .. })));
    }

    #[tokio::test]
    async fn test_missing_executable_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            Session::launch(&dir.path().join("R"), Platform::Unix, &Settings::default()).await;
        assert!(matches!(result, Err(Error::Launch { .. })));
    }
}
