//! Window policy: last-K retention with summarize-before-trim.
//!
//! Compaction is evaluated once per completed turn, after the assistant
//! message has been appended. A capacity of zero is legal and means every
//! turn is summarized and nothing stays live.

use recall_ai::Message;

/// The stored messages that go into the next prompt
pub fn prompt_window(recent: &[Message], capacity: usize) -> &[Message] {
    &recent[recent.len().saturating_sub(capacity)..]
}

/// Whether the window has overflowed and must be compacted
pub fn needs_compaction(len: usize, capacity: usize) -> bool {
    len > capacity
}

/// Keep only the newest `capacity` messages, returning the evicted ones in order
pub fn trim(recent: &mut Vec<Message>, capacity: usize) -> Vec<Message> {
    let excess = recent.len().saturating_sub(capacity);
    recent.drain(..excess).collect()
}
