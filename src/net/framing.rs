use log::*;

// a remainder longer than this without a CRLF is not an IRC line, drop it rather than buffering
// forever
const MAX_OVERFLOW: usize = 64 * 1024;

/// reassembles CRLF terminated lines from arbitrarily split reads
#[derive(Debug, Default)]
pub struct LineFramer {
    /// the start of a line that was cut off by the end of a previous read
    overflow: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// feeds one read worth of bytes, returning every line completed by it in order. lines are
    /// returned without their CRLF, empty lines are skipped, and invalid UTF-8 is replaced.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        if !self.overflow.is_empty() {
            // the CR was the last byte of the previous read and the LF is the first of this one
            if self.overflow.last() == Some(&b'\r') && rest.first() == Some(&b'\n') {
                self.overflow.pop();
                let line = core::mem::take(&mut self.overflow);
                push_line(&mut lines, &line);
                rest = &rest[1..];
            } else {
                match find_crlf(rest) {
                    Some(idx) => {
                        self.overflow.extend_from_slice(&rest[..idx]);
                        let line = core::mem::take(&mut self.overflow);
                        push_line(&mut lines, &line);
                        rest = &rest[idx + 2..];
                    }
                    None => {
                        self.carry(rest);
                        return lines;
                    }
                }
            }
        }

        while let Some(idx) = find_crlf(rest) {
            push_line(&mut lines, &rest[..idx]);
            rest = &rest[idx + 2..];
        }
        self.carry(rest);

        lines
    }

    /// the bytes of the incomplete line waiting for more input
    pub fn overflow(&self) -> &[u8] {
        &self.overflow
    }

    pub fn clear(&mut self) {
        self.overflow.clear();
    }

    fn carry(&mut self, bytes: &[u8]) {
        self.overflow.extend_from_slice(bytes);
        if self.overflow.len() > MAX_OVERFLOW {
            warn!(
                "dropping {} bytes received without a line ending",
                self.overflow.len()
            );
            self.overflow.clear();
        }
    }
}

fn find_crlf(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == b"\r\n")
}

fn push_line(lines: &mut Vec<String>, bytes: &[u8]) {
    // clients should ignore 0 length messages
    if bytes.is_empty() {
        return;
    }
    lines.push(String::from_utf8_lossy(bytes).into_owned());
}
