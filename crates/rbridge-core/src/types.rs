//! Session lifecycle types shared across crates

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a process session.
///
/// `Created -> Running -> Closed`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Created = 0,
    Running = 1,
    Closed = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Created,
            1 => SessionState::Running,
            _ => SessionState::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Created => write!(f, "created"),
            SessionState::Running => write!(f, "running"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Atomically updated [`SessionState`].
///
/// Shared between the session owner, its background tasks and the notifier.
#[derive(Debug)]
pub struct AtomicSessionState(AtomicU8);

impl AtomicSessionState {
    pub fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `Created -> Running`. Returns false if the session already moved on.
    pub fn mark_running(&self) -> bool {
        self.0
            .compare_exchange(
                SessionState::Created as u8,
                SessionState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `Closed`. Returns true only for the call that performed the
    /// transition, so callers can run close side effects exactly once.
    pub fn mark_closed(&self) -> bool {
        self.0.swap(SessionState::Closed as u8, Ordering::AcqRel) != SessionState::Closed as u8
    }

    pub fn is_closed(&self) -> bool {
        self.load().is_closed()
    }
}

impl Default for AtomicSessionState {
    fn default() -> Self {
        Self::new(SessionState::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_lifecycle_forward_only() {
        let state = AtomicSessionState::default();
        assert_eq!(state.load(), SessionState::Created);

        assert!(state.mark_running());
        assert_eq!(state.load(), SessionState::Running);
        assert!(!state.mark_running());

        assert!(state.mark_closed());
        assert_eq!(state.load(), SessionState::Closed);

        // No way back
        assert!(!state.mark_running());
        assert_eq!(state.load(), SessionState::Closed);
    }

    #[test]
    fn test_mark_closed_reports_first_caller_only() {
        let state = AtomicSessionState::new(SessionState::Running);
        assert!(state.mark_closed());
        assert!(!state.mark_closed());
        assert!(!state.mark_closed());
    }

    #[test]
    fn test_close_from_created() {
        let state = AtomicSessionState::default();
        assert!(state.mark_closed());
        assert!(state.is_closed());
    }

    #[test]
    fn test_concurrent_close_has_single_winner() {
        let state = Arc::new(AtomicSessionState::new(SessionState::Running));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || state.mark_closed())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
