//! Append-only session output buffer.

/// Accumulates decoded fragments in arrival order.
///
/// No deduplication and no truncation: the buffer is always the exact
/// concatenation of every appended fragment.
#[derive(Debug, Clone, Default)]
pub struct OutputAggregator {
    buffer: String,
}

impl OutputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one fragment and return the updated buffer.
    pub fn append(&mut self, fragment: &str) -> &str {
        self.buffer.push_str(fragment);
        &self.buffer
    }

    pub fn snapshot(&self) -> &str {
        &self.buffer
    }
}
