//! Event block parser.
//!
//! Turns framed lines into `(event type, raw data)` pairs. A block is one
//! `event:` line and one `data:` line closed by a blank line.

const EVENT_PREFIX: &str = "event:";
const DATA_PREFIX: &str = "data:";

/// A finished event block, payload still undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub event: String,
    pub data: String,
}

/// Accumulates `event:`/`data:` fields until a blank line closes the block.
#[derive(Debug, Default)]
pub struct EventBlockParser {
    event: String,
    data: String,
}

impl EventBlockParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one complete line. Returns an event when the line closes a
    /// block carrying both fields.
    pub fn push_line(&mut self, line: &str) -> Option<RawEvent> {
        if line.trim().is_empty() {
            let event = std::mem::take(&mut self.event);
            let data = std::mem::take(&mut self.data);
            if event.is_empty() || data.is_empty() {
                if !event.is_empty() || !data.is_empty() {
                    tracing::debug!(event = %event, "Dropping incomplete event block");
                }
                return None;
            }
            return Some(RawEvent { event, data });
        }

        if let Some(value) = line.strip_prefix(EVENT_PREFIX) {
            self.event = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix(DATA_PREFIX) {
            // Only the single separator space goes; the payload is pre-serialized.
            self.data = value.strip_prefix(' ').unwrap_or(value).to_string();
        }
        // Anything else (comments, id:, retry:) is ignored.

        None
    }

    /// Feed several lines, collecting finished events in order.
    pub fn push_lines<I, S>(&mut self, lines: I) -> Vec<RawEvent>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        lines
            .into_iter()
            .filter_map(|line| self.push_line(line.as_ref()))
            .collect()
    }

    /// Check if a block is partially accumulated.
    pub fn has_pending(&self) -> bool {
        !self.event.is_empty() || !self.data.is_empty()
    }

    /// Discard a block left open at end of stream.
    pub fn finish(&mut self) {
        self.event.clear();
        self.data.clear();
    }
}
