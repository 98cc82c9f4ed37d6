//! Line framing over a chunked byte stream.

/// Accumulates raw body chunks and yields complete lines.
///
/// Lines are split on `\n`; a trailing `\r` is stripped so CRLF bodies frame
/// the same way. Splitting happens on bytes, so a multi-byte UTF-8 character
/// cut across two chunks is reassembled before it is decoded.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buffer: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, in order.
    ///
    /// The unterminated tail stays buffered for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete[..last_newline]
            .split(|&b| b == b'\n')
            .map(|line| {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                String::from_utf8_lossy(line).into_owned()
            })
            .collect()
    }

    /// Check if there's an unterminated line in the buffer.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Drop any unterminated tail. Called at end of stream: a partial line
    /// never belongs to a committed event.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_lines() {
        let mut frames = FrameBuffer::new();
        let lines = frames.push(b"event: progress\ndata: {}\n\n");
        assert_eq!(lines, vec!["event: progress", "data: {}", ""]);
        assert!(!frames.has_pending());
    }

    #[test]
    fn test_partial_line_held_back() {
        let mut frames = FrameBuffer::new();
        assert!(frames.push(b"event: comp").is_empty());
        assert!(frames.has_pending());

        let lines = frames.push(b"lete\ndata: {\"a\"");
        assert_eq!(lines, vec!["event: complete"]);

        let lines = frames.push(b":1}\n");
        assert_eq!(lines, vec!["data: {\"a\":1}"]);
        assert!(!frames.has_pending());
    }

    #[test]
    fn test_crlf_stripped() {
        let mut frames = FrameBuffer::new();
        let lines = frames.push(b"event: error\r\ndata: {}\r\n\r\n");
        assert_eq!(lines, vec!["event: error", "data: {}", ""]);
    }

    #[test]
    fn test_cr_split_from_lf() {
        let mut frames = FrameBuffer::new();
        assert!(frames.push(b"data: x\r").is_empty());
        assert_eq!(frames.push(b"\n"), vec!["data: x"]);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let mut frames = FrameBuffer::new();
        let text = "data: {\"message\":\"Généré\"}\n";
        let bytes = text.as_bytes();
        // Split inside the two-byte 'é'
        let split = text.find('é').unwrap() + 1;
        assert!(frames.push(&bytes[..split]).is_empty());
        assert_eq!(frames.push(&bytes[split..]), vec![text.trim_end()]);
    }

    #[test]
    fn test_finish_discards_tail() {
        let mut frames = FrameBuffer::new();
        frames.push(b"data: {\"incomplete\":");
        assert_eq!(frames.finish(), "data: {\"incomplete\":".len());
        assert!(!frames.has_pending());
    }
}
