//! Line framing for the attach stream
//!
//! The container host delivers output in arbitrary chunks: one message
//! may hold several lines or only part of one. The decoder buffers
//! fragments until a newline arrives.

/// Splits a chunked text stream into lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: String,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every line it completed
    ///
    /// Returned lines have their `\n` (and any `\r` before it) removed.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);

        let mut lines = Vec::new();
        while let Some(idx) = self.pending.find('\n') {
            let mut line: String = self.pending.drain(..=idx).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Returns the unterminated remainder, if any, once the stream ends
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let mut rest = std::mem::take(&mut self.pending);
        if rest.ends_with('\r') {
            rest.pop();
        }
        Some(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_lines() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push("a\nb\n"), vec!["a", "b"]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_partial_lines_are_buffered() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push("hel").is_empty());
        assert_eq!(decoder.push("lo\nwor"), vec!["hello"]);
        assert_eq!(decoder.push("ld\n"), vec!["world"]);
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push("a\r\nb\r"), vec!["a"]);
        assert_eq!(decoder.push("\n"), vec!["b"]);
    }

    #[test]
    fn test_empty_lines_are_kept() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push("\n\nx\n"), vec!["", "", "x"]);
    }

    #[test]
    fn test_finish_flushes_remainder() {
        let mut decoder = LineDecoder::new();
        decoder.push("tail");
        assert_eq!(decoder.finish(), Some("tail".to_string()));
        assert_eq!(decoder.finish(), None);
    }
}
