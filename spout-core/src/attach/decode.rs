use std::collections::HashMap;

/// A partial line longer than this is emitted without waiting for its newline.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// Splits raw chunks into lines, keeping a separate partial-line buffer per stream.
#[derive(Debug, Default)]
pub(super) struct LineDecoder {
    pending: HashMap<&'static str, Vec<u8>>,
}

impl LineDecoder {
    /// Feeds a chunk and returns every line it completed.
    pub fn push(&mut self, stream: &'static str, data: &[u8]) -> Vec<String> {
        let buf = self.pending.entry(stream).or_default();
        let mut lines = Vec::new();
        for &b in data {
            buf.push(b);
            if b == b'\n' {
                lines.push(decode_line(buf));
                buf.clear();
            } else if buf.len() >= MAX_LINE_BYTES {
                let cut = char_boundary(buf);
                let rest = buf.split_off(cut);
                lines.push(decode_line(buf));
                *buf = rest;
            }
        }
        lines
    }

    /// Drains unterminated trailing data, one entry per stream.
    pub fn finish(&mut self) -> Vec<(&'static str, String)> {
        let mut rest: Vec<_> = self
            .pending
            .drain()
            .filter(|(_, buf)| !buf.is_empty())
            .map(|(stream, buf)| (stream, decode_line(&buf)))
            .collect();
        rest.sort_by_key(|(stream, _)| *stream);
        rest
    }
}

/// Where to cut an oversized UTF-8 line so no character is split; the
/// tail of an incomplete trailing character carries over to the next piece.
fn char_boundary(buf: &[u8]) -> usize {
    match std::str::from_utf8(buf) {
        Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => e.valid_up_to(),
        _ => buf.len(),
    }
}

/// Decodes as UTF-8, falling back to GB18030, and strips the line ending.
fn decode_line(raw: &[u8]) -> String {
    let mut s = match std::str::from_utf8(raw) {
        Ok(v) => v.to_string(),
        Err(_) => {
            let (cow, _, had_errors) = encoding_rs::GB18030.decode(raw);
            if had_errors {
                String::from_utf8_lossy(raw).to_string()
            } else {
                cow.to_string()
            }
        }
    };
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
    s
}
