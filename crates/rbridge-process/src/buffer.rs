//! Bounded output buffer
//!
//! Holds the most recent interpreter output, measured in characters. When an
//! append pushes the length over capacity the oldest characters are dropped,
//! so the buffer always holds the last `capacity` characters of the stream.

use parking_lot::Mutex;

use rbridge_core::prelude::*;

/// Default capacity in characters
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// A point-in-time copy of the buffer contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSnapshot {
    text: String,
    /// Characters ever appended when the snapshot was taken
    end: u64,
    revision: u64,
}

impl OutputSnapshot {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Logical stream position of the last character in the snapshot
    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Text appended after stream position `previous_end`.
    ///
    /// Capped at the snapshot contents when older output was already evicted.
    pub fn new_since(&self, previous_end: u64) -> &str {
        let added = self.end.saturating_sub(previous_end);
        let len = self.text.chars().count() as u64;
        if added >= len {
            return &self.text;
        }
        let skip = (len - added) as usize;
        &self.text[byte_offset(&self.text, skip)..]
    }
}

#[derive(Debug, Default)]
struct Inner {
    text: String,
    /// `text.chars().count()`, tracked to avoid rescanning
    chars: usize,
    end: u64,
    revision: u64,
}

/// Thread-safe, capacity-bounded text store with FIFO eviction
#[derive(Debug)]
pub struct OutputBuffer {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl OutputBuffer {
    /// Create a buffer holding at most `capacity` characters.
    ///
    /// A zero capacity is a configuration error.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config_invalid("output buffer capacity must be > 0"));
        }

        Ok(Self {
            capacity,
            inner: Mutex::new(Inner {
                text: String::with_capacity(capacity),
                ..Inner::default()
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `text`, evicting the oldest characters beyond capacity.
    pub fn append(&self, text: &str) {
        if text.is_empty() {
            return;
        }

        let incoming = text.chars().count();

        // Only the tail of an oversized chunk can survive
        let (kept, kept_chars) = if incoming > self.capacity {
            let skip = incoming - self.capacity;
            (&text[byte_offset(text, skip)..], self.capacity)
        } else {
            (text, incoming)
        };

        let mut inner = self.inner.lock();
        inner.end += incoming as u64;
        inner.revision += 1;

        let total = inner.chars + kept_chars;
        if total > self.capacity {
            let excess = total - self.capacity;
            if excess >= inner.chars {
                inner.text.clear();
            } else {
                let cut = byte_offset(&inner.text, excess);
                inner.text.drain(..cut);
            }
            inner.chars = inner.chars.saturating_sub(excess);
        }

        inner.text.push_str(kept);
        inner.chars += kept_chars;
        trace!("Buffer append: {} chars, now {}", incoming, inner.chars);
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> String {
        self.inner.lock().text.clone()
    }

    /// Copy of the current contents with its stream position
    pub fn snapshot_with_position(&self) -> OutputSnapshot {
        let inner = self.inner.lock();
        OutputSnapshot {
            text: inner.text.clone(),
            end: inner.end,
            revision: inner.revision,
        }
    }

    /// Incremented by every non-empty append
    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    /// Current length in characters
    pub fn len(&self) -> usize {
        self.inner.lock().chars
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Byte index of the `n`th character of `s` (or `s.len()`).
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}
