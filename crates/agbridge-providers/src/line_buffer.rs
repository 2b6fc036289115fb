/// Accumulates raw output chunks and yields complete lines.
///
/// Bytes after the last `\n` stay pending until a later chunk terminates them.
/// Decoding happens only on complete lines, so a multi-byte UTF-8 character
/// split across two chunks is reassembled before it is decoded.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, in order.
    ///
    /// Empty lines are returned as empty strings; dropping them is the
    /// caller's decision. A trailing `\r` is stripped.
    pub fn append(&mut self, chunk: &[u8]) -> Vec<String> {
        // `pending` never holds a newline, so only the new bytes need a scan.
        let Some(in_chunk) = chunk.iter().rposition(|b| *b == b'\n') else {
            self.pending.extend_from_slice(chunk);
            return Vec::new();
        };
        let last_newline = self.pending.len() + in_chunk;
        self.pending.extend_from_slice(chunk);

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        let text = String::from_utf8_lossy(&complete[..complete.len() - 1]);

        text.split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect()
    }

    /// Unterminated remainder, decoded lossily.
    pub fn pending(&self) -> String {
        String::from_utf8_lossy(&self.pending).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take the unterminated remainder at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&rest).into_owned();
        let line = line.strip_suffix('\r').map(str::to_string).unwrap_or(line);
        Some(line)
    }
}
