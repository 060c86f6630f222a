//! Stdin line reader
//!
//! Reading stdin blocks, so it runs on its own thread and forwards lines
//! over a channel the runner selects on. The channel closes at end of input.

use std::io::BufRead;

use tokio::sync::mpsc;
use tracing::{error, info};

/// Spawn a thread that forwards stdin lines until EOF or read error
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || forward_lines(std::io::stdin().lock(), tx));
    rx
}

/// Forward every line of `reader` to `tx`, without the line terminator
pub fn forward_lines(reader: impl BufRead, tx: mpsc::UnboundedSender<String>) {
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if tx.send(line).is_err() {
                    // Runner is gone
                    break;
                }
            }
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }

    info!("Stdin reader exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_lines_until_eof() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_lines("1 + 1\r\nsummary(x)\n\nq()".as_bytes(), tx);

        assert_eq!(rx.try_recv().unwrap(), "1 + 1");
        assert_eq!(rx.try_recv().unwrap(), "summary(x)");
        assert_eq!(rx.try_recv().unwrap(), "");
        assert_eq!(rx.try_recv().unwrap(), "q()");
        // Sender dropped at EOF
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
