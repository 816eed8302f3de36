//! Text sample decoding for the two device wire formats.

/// Outcome of decoding one line or datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Value(f64),
    /// Input that was not a finite number, kept for logging.
    Rejected(String),
}

/// Longest partial line kept between reads before it is discarded as garbage.
pub const MAX_LINE_BYTES: usize = 1024;

/// Parse one trimmed textual value. Non-finite numbers are refused.
pub fn parse_value(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn decode_text(bytes: &[u8]) -> Option<Decoded> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.trim(),
        Err(_) => return Some(Decoded::Rejected(String::from_utf8_lossy(bytes).into_owned())),
    };
    if text.is_empty() {
        return None;
    }
    Some(match parse_value(text) {
        Some(v) => Decoded::Value(v),
        None => Decoded::Rejected(text.to_string()),
    })
}

/// One value per datagram, surrounding whitespace ignored.
pub fn decode_datagram(bytes: &[u8]) -> Decoded {
    decode_text(bytes).unwrap_or_else(|| Decoded::Rejected(String::new()))
}

/// Splits a TCP byte stream into newline-terminated values.
///
/// A value cut across two reads is held back until its newline arrives.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8], out: &mut Vec<Decoded>) {
        for &byte in bytes {
            if byte == b'\n' {
                if let Some(decoded) = decode_text(&self.pending) {
                    out.push(decoded);
                }
                self.pending.clear();
            } else if self.pending.len() >= MAX_LINE_BYTES {
                let junk = String::from_utf8_lossy(&self.pending).into_owned();
                out.push(Decoded::Rejected(junk));
                self.pending.clear();
                self.pending.push(byte);
            } else {
                self.pending.push(byte);
            }
        }
    }

    /// Flush an unterminated trailing value, e.g. when the peer closes.
    pub fn finish(&mut self) -> Option<Decoded> {
        let decoded = decode_text(&self.pending);
        self.pending.clear();
        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(decoded: &[Decoded]) -> Vec<f64> {
        decoded
            .iter()
            .filter_map(|d| match d {
                Decoded::Value(v) => Some(*v),
                Decoded::Rejected(_) => None,
            })
            .collect()
    }

    #[test]
    fn reassembles_values_split_across_reads() {
        let mut dec = LineDecoder::new();
        let mut out = Vec::new();
        dec.feed(b"512\n51", &mut out);
        assert_eq!(values(&out), vec![512.0]);
        dec.feed(b"8.5\r\n520\n", &mut out);
        assert_eq!(values(&out), vec![512.0, 518.5, 520.0]);
        assert_eq!(dec.finish(), None);
    }

    #[test]
    fn garbage_lines_do_not_drop_neighbours() {
        let mut dec = LineDecoder::new();
        let mut out = Vec::new();
        dec.feed(b"600\nIR:oops\n\n601\nnan\n", &mut out);
        assert_eq!(
            out,
            vec![
                Decoded::Value(600.0),
                Decoded::Rejected("IR:oops".into()),
                Decoded::Value(601.0),
                Decoded::Rejected("nan".into()),
            ]
        );
    }

    #[test]
    fn finish_flushes_unterminated_value() {
        let mut dec = LineDecoder::new();
        let mut out = Vec::new();
        dec.feed(b"1\n2", &mut out);
        assert_eq!(dec.finish(), Some(Decoded::Value(2.0)));
        assert_eq!(dec.finish(), None);
    }

    #[test]
    fn overlong_line_is_rejected() {
        let mut dec = LineDecoder::new();
        let mut out = Vec::new();
        let junk = vec![b'x'; MAX_LINE_BYTES + 10];
        dec.feed(&junk, &mut out);
        dec.feed(b"\n7\n", &mut out);
        assert!(matches!(out[0], Decoded::Rejected(_)));
        assert_eq!(values(&out), vec![7.0]);
    }

    #[test]
    fn datagrams_hold_one_value() {
        assert_eq!(decode_datagram(b" 0.125\n"), Decoded::Value(0.125));
        assert_eq!(decode_datagram(b"-1.5"), Decoded::Value(-1.5));
        assert_eq!(decode_datagram(b"1.0,2.0"), Decoded::Rejected("1.0,2.0".into()));
        assert_eq!(decode_datagram(b""), Decoded::Rejected(String::new()));
    }
}
