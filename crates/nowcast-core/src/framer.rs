/// Longest line accepted by default. Album art rides inline as base64, so
/// lines are large, but a stream that never sends a newline must not grow
/// the buffer forever.
pub const DEFAULT_MAX_LINE: usize = 16 * 1024 * 1024;

/// Splits a byte stream into newline-delimited records.
///
/// Pipe reads can split or coalesce lines arbitrarily, so the framer keeps
/// the trailing partial fragment until the next `feed`. Bytes are buffered
/// undecoded; a multi-byte UTF-8 character cut across chunks survives.
/// Lines longer than the limit are dropped whole and counted.
#[derive(Debug)]
pub struct LineFramer {
    pending: Vec<u8>,
    max_line: usize,
    /// Inside an oversized line whose head was already dropped.
    discarding: bool,
    overflows: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_LINE)
    }
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line,
            discarding: false,
            overflows: 0,
        }
    }

    /// Append `chunk` and return every line it completes, trimmed.
    /// Blank and oversized lines are skipped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if self.discarding {
                self.discarding = false;
            } else if end - start > self.max_line {
                self.overflows += 1;
            } else {
                let line = String::from_utf8_lossy(&self.pending[start..end]);
                let line = line.trim();
                if !line.is_empty() {
                    lines.push(line.to_string());
                }
            }
            start = end + 1;
        }
        self.pending.drain(..start);

        if self.pending.len() > self.max_line {
            self.pending.clear();
            if !self.discarding {
                self.discarding = true;
                self.overflows += 1;
            }
        }
        lines
    }

    /// Bytes buffered but not yet terminated by a newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of oversized lines dropped since the last call.
    pub fn take_overflows(&mut self) -> usize {
        std::mem::take(&mut self.overflows)
    }

    /// Take the unterminated remainder, e.g. once the stream hit EOF.
    pub fn take_remainder(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        let rest = String::from_utf8_lossy(&rest).trim().to_string();
        (!rest.is_empty()).then_some(rest)
    }
}
