//! Console mode - prints R output as it arrives
//!
//! The buffer holds the whole visible transcript; the console only needs
//! what is new since the last change, so it tracks the stream position it
//! has already printed.

use std::io::{self, Write};

use tracing::error;

use rbridge_app::SessionObserver;
use rbridge_process::OutputSnapshot;

/// Observer that writes new output to a terminal (or any writer)
///
/// Writes and flushes block, so drive it from a dedicated thread
/// (see [`crate::render_on_thread`]) rather than from an async task.
pub struct ConsoleView<W: Write> {
    out: W,
    printed_end: u64,
    closed: bool,
}

impl ConsoleView<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed_end: 0,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SessionObserver for ConsoleView<W> {
    fn on_change(&mut self, snapshot: &OutputSnapshot) {
        let new = snapshot.new_since(self.printed_end);
        self.printed_end = snapshot.end();

        // Prompts have no trailing newline, so flush every time
        if let Err(e) = self
            .out
            .write_all(new.as_bytes())
            .and_then(|()| self.out.flush())
        {
            error!("Failed to write console output: {}", e);
        }
    }

    fn on_close(&mut self) {
        self.closed = true;
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbridge_process::OutputBuffer;

    #[test]
    fn test_prints_each_change_once() {
        let buffer = OutputBuffer::new(1_000).unwrap();
        let mut view = ConsoleView::new(Vec::new());

        buffer.append("R version 4.4.1\n> ");
        view.on_change(&buffer.snapshot_with_position());
        buffer.append("x <- 1\n> ");
        view.on_change(&buffer.snapshot_with_position());
        view.on_close();

        assert!(view.is_closed());
        assert_eq!(
            String::from_utf8(view.into_inner()).unwrap(),
            "R version 4.4.1\n> x <- 1\n> "
        );
    }

    #[test]
    fn test_repeated_snapshot_prints_nothing() {
        let buffer = OutputBuffer::new(1_000).unwrap();
        let mut view = ConsoleView::new(Vec::new());

        buffer.append("> ");
        let snapshot = buffer.snapshot_with_position();
        view.on_change(&snapshot);
        view.on_change(&snapshot);

        assert_eq!(view.into_inner(), b"> ");
    }
}
