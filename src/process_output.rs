//! Line reading over child process output.
//!
//! Agents and the engine may print arbitrary bytes. Lines are split on `\n` and decoded
//! lossily so that a stray invalid byte never ends the stream early.

use std::io::{self, BufRead};

/// Lines of `reader`, without their line terminator, invalid UTF-8 replaced by `U+FFFD`.
///
/// Ends at EOF. An I/O error is yielded once; callers are expected to stop there.
pub(crate) fn lossy_lines<R: BufRead>(reader: R) -> LossyLines<R> {
    LossyLines {
        reader,
        buf: Vec::new(),
    }
}

pub(crate) struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}


#[cfg(test)]
mod process_output_tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn invalid_bytes_are_replaced() {
        let stream: &[u8] = b"first\n\xff\xfe board\r\nlast";
        let lines: Vec<String> = lossy_lines(Cursor::new(stream)).map(Result::unwrap).collect();
        assert_eq!(lines, vec!["first", "\u{fffd}\u{fffd} board", "last"]);
    }

    #[test]
    fn empty_stream_has_no_line() {
        assert_eq!(lossy_lines(Cursor::new(b"")).count(), 0);
    }
}
