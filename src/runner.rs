//! Session runner - the consumer's event loop
//!
//! The async loop forwards input lines to R and reacts to end of input and
//! Ctrl+C. The views write to stdout with blocking calls, so in `run` they
//! are driven on a blocking-pool thread via [`deliver_blocking`] and never
//! stall the loop. [`run_session`] keeps everything on the loop for
//! observers that do not block.

use std::future::Future;
use std::path::PathBuf;

use tokio::sync::mpsc;

use rbridge_app::{
    deliver, deliver_blocking, find_interpreter_async, Lookup, LookupRequest,
    NotificationReceiver, Session, SessionObserver, Settings,
};
use rbridge_core::prelude::*;
use rbridge_core::Platform;

use crate::console::ConsoleView;
use crate::headless::{HeadlessEvent, HeadlessView};
use crate::input::spawn_stdin_reader;

/// Everything `run` needs, resolved from CLI and config
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub settings: Settings,
    /// Folder to search instead of the default locations
    pub r_home: Option<PathBuf>,
    pub headless: bool,
}

/// Find R, run one session against stdin/stdout, and return R's exit code.
pub async fn run(options: RunOptions) -> Result<Option<i32>> {
    options.settings.validate()?;

    let platform = Platform::current()?;
    info!("Platform: {}", platform);

    let request =
        LookupRequest::from_settings(&options.settings.interpreter).with_folder(options.r_home);

    let executable = match find_interpreter_async(platform, request).await? {
        Lookup::Found(path) => path,
        Lookup::NotFound { searched } => {
            if options.headless {
                HeadlessEvent::interpreter_not_found(searched).emit();
            }
            return Err(Error::InterpreterNotFound {
                candidates: searched,
            });
        }
    };

    if options.headless {
        HeadlessEvent::interpreter_found(&executable, &platform.to_string()).emit();
    }

    let (session, notifications) =
        match Session::launch(&executable, platform, &options.settings).await {
            Ok(started) => started,
            Err(e) => {
                if options.headless {
                    HeadlessEvent::error(e.to_string(), true).emit();
                }
                return Err(e);
            }
        };

    let input = spawn_stdin_reader();

    if options.headless {
        HeadlessEvent::session_started(session.process().id()).emit();
        let rendered = render_on_thread(notifications, HeadlessView::stdout());
        drive_input(&session, input, rendered).await;
        HeadlessEvent::exited(session.exit_code().flatten()).emit();
    } else {
        let rendered = render_on_thread(notifications, ConsoleView::stdout());
        drive_input(&session, input, rendered).await;
    }

    let code = session.exit_code().flatten();
    info!("R session finished with exit code {:?}", code);
    Ok(code)
}

/// Drive one session until the observer has seen `on_close`, running the
/// observer on the calling task.
pub async fn run_session<O>(
    session: &Session,
    mut notifications: NotificationReceiver,
    input: mpsc::UnboundedReceiver<String>,
    observer: &mut O,
) where
    O: SessionObserver + ?Sized,
{
    drive_input(session, input, deliver(&mut notifications, observer)).await;
}

/// Hand `observer` to a blocking-pool thread that drains `notifications`.
///
/// The returned future resolves once the observer has seen `on_close`.
pub fn render_on_thread<O>(
    notifications: NotificationReceiver,
    mut observer: O,
) -> impl Future<Output = ()>
where
    O: SessionObserver + Send + 'static,
{
    let handle =
        tokio::task::spawn_blocking(move || deliver_blocking(notifications, &mut observer));
    async move {
        if let Err(e) = handle.await {
            error!("Output thread failed: {}", e);
        }
    }
}

/// Forward input to `session` until `rendered` resolves.
///
/// Input lines are submitted in order. End of input triggers a graceful
/// shutdown; Ctrl+C kills R.
async fn drive_input<F>(
    session: &Session,
    mut input: mpsc::UnboundedReceiver<String>,
    rendered: F,
) where
    F: Future<Output = ()>,
{
    tokio::pin!(rendered);

    let shutdown = session.shutdown();
    tokio::pin!(shutdown);

    let mut input_open = true;
    let mut shutting_down = false;
    let mut interrupted = false;

    loop {
        tokio::select! {
            () = &mut rendered => break,

            line = input.recv(), if input_open => match line {
                Some(line) => session.submit(&line),
                None => {
                    info!("End of input, shutting down R");
                    input_open = false;
                    shutting_down = true;
                }
            },

            _ = &mut shutdown, if shutting_down => {
                shutting_down = false;
            }

            result = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                match result {
                    Ok(()) => {
                        info!("Interrupted, closing R session");
                        session.close();
                    }
                    Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use rbridge_process::test_utils::write_fake_interpreter;
    use rbridge_process::OutputSnapshot;
    use std::sync::{Arc, Mutex};
    use std::thread::ThreadId;
    use std::time::Duration;

    #[derive(Default)]
    struct Transcript {
        text: String,
        closes: usize,
    }

    impl SessionObserver for Transcript {
        fn on_change(&mut self, snapshot: &OutputSnapshot) {
            self.text = snapshot.text().to_string();
        }

        fn on_close(&mut self) {
            self.closes += 1;
        }
    }

    async fn echo_session(dir: &tempfile::TempDir) -> (Session, NotificationReceiver) {
        let exe = write_fake_interpreter(
            dir.path(),
            "R",
            r#"while read -r line; do echo "got: $line"; done"#,
        );
        Session::launch(&exe, Platform::Unix, &Settings::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_input_forwarded_in_order_then_eof_shuts_down() {
        let dir = tempfile::tempdir().unwrap();
        let (session, notifications) = echo_session(&dir).await;

        let (tx, input) = mpsc::unbounded_channel();
        for line in ["one", "two", "three"] {
            tx.send(line.to_string()).unwrap();
        }
        drop(tx);

        let mut transcript = Transcript::default();
        tokio::time::timeout(
            Duration::from_secs(5),
            run_session(&session, notifications, input, &mut transcript),
        )
        .await
        .expect("runner did not finish");

        assert_eq!(transcript.text, "got: one\ngot: two\ngot: three\n");
        assert_eq!(transcript.closes, 1);
        assert_eq!(session.exit_code(), Some(Some(0)));
    }

    #[tokio::test]
    async fn test_close_ends_runner_with_input_still_open() {
        let dir = tempfile::tempdir().unwrap();
        let (session, notifications) = echo_session(&dir).await;

        let (_tx, input) = mpsc::unbounded_channel::<String>();
        session.close();

        let mut transcript = Transcript::default();
        tokio::time::timeout(
            Duration::from_secs(5),
            run_session(&session, notifications, input, &mut transcript),
        )
        .await
        .expect("runner did not finish");

        assert_eq!(transcript.closes, 1);
    }

    #[derive(Clone, Default)]
    struct SharedTranscript(Arc<Mutex<(String, Vec<ThreadId>, usize)>>);

    impl SessionObserver for SharedTranscript {
        fn on_change(&mut self, snapshot: &OutputSnapshot) {
            let mut inner = self.0.lock().unwrap();
            inner.0 = snapshot.text().to_string();
            inner.1.push(std::thread::current().id());
        }

        fn on_close(&mut self) {
            self.0.lock().unwrap().2 += 1;
        }
    }

    #[tokio::test]
    async fn test_render_on_thread_keeps_output_off_the_event_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (session, notifications) = echo_session(&dir).await;

        let (tx, input) = mpsc::unbounded_channel();
        tx.send("ping".to_string()).unwrap();
        drop(tx);

        let transcript = SharedTranscript::default();
        let rendered = render_on_thread(notifications, transcript.clone());
        tokio::time::timeout(
            Duration::from_secs(5),
            drive_input(&session, input, rendered),
        )
        .await
        .expect("runner did not finish");

        let inner = transcript.0.lock().unwrap();
        assert_eq!(inner.0, "got: ping\n");
        assert!(!inner.1.is_empty());
        // current_thread runtime: the loop runs on the test thread
        let loop_thread = std::thread::current().id();
        assert!(inner.1.iter().all(|id| *id != loop_thread));
        assert_eq!(inner.2, 1);
        assert_eq!(session.exit_code(), Some(Some(0)));
    }
}
