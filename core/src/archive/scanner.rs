use crate::error::{ValidateError, ValidateResult};
use std::io::{BufRead, BufReader, Read};

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Counts lines the same way `LineScanner` yields them: a trailing newline
/// does not start another line, a final unterminated line counts.
pub fn count_lines<R: Read>(reader: R) -> ValidateResult<u64> {
    let mut reader = BufReader::with_capacity(READ_BUFFER_BYTES, reader);
    let mut lines = 0u64;
    let mut unterminated = false;
    loop {
        let buf = reader.fill_buf().map_err(ValidateError::ManifestRead)?;
        if buf.is_empty() {
            break;
        }
        let len = buf.len();
        lines += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        unterminated = buf[len - 1] != b'\n';
        reader.consume(len);
    }
    if unterminated {
        lines += 1;
    }
    Ok(lines)
}

/// Streams manifest lines without their line terminator. A line longer
/// than `max_line_bytes` is fatal; it is never truncated.
pub struct LineScanner<R> {
    reader: BufReader<R>,
    max_line_bytes: usize,
    line_number: u64,
    buf: Vec<u8>,
}

impl<R: Read> LineScanner<R> {
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_BYTES, reader),
            max_line_bytes,
            line_number: 0,
            buf: Vec::new(),
        }
    }

    /// Lines read so far.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Returns the next line with its 1-based line number. The limit
    /// applies to the content; neither `\n` nor a `\r\n` pair counts.
    pub fn next_line(&mut self) -> ValidateResult<Option<(u64, &[u8])>> {
        self.buf.clear();
        // Content plus "\r\n".
        let limit = self.max_line_bytes as u64 + 2;
        let n = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .map_err(ValidateError::ManifestRead)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        if self.buf.len() > self.max_line_bytes {
            return Err(ValidateError::LineTooLong {
                line: self.line_number,
                limit: self.max_line_bytes,
            });
        }
        Ok(Some((self.line_number, &self.buf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &[u8], max: usize) -> ValidateResult<Vec<String>> {
        let mut scanner = LineScanner::new(input, max);
        let mut out = Vec::new();
        while let Some((_, line)) = scanner.next_line()? {
            out.push(String::from_utf8_lossy(line).to_string());
        }
        Ok(out)
    }

    #[test]
    fn yields_lines_without_terminators() {
        let lines = collect(b"a\r\nbb\n\nccc", 16).unwrap();
        assert_eq!(lines, vec!["a", "bb", "", "ccc"]);
    }

    #[test]
    fn count_matches_scanner() {
        for input in [&b""[..], b"a", b"a\n", b"a\nb", b"a\n\n", b"\n"] {
            let counted = count_lines(input).unwrap();
            let scanned = collect(input, 16).unwrap().len() as u64;
            assert_eq!(counted, scanned, "input {:?}", input);
        }
    }

    #[test]
    fn line_at_limit_is_accepted() {
        let lines = collect(b"abcd\nef", 4).unwrap();
        assert_eq!(lines, vec!["abcd", "ef"]);
        let lines = collect(b"abcd", 4).unwrap();
        assert_eq!(lines, vec!["abcd"]);
    }

    #[test]
    fn crlf_line_at_limit_is_accepted() {
        let lines = collect(b"abcd\r\nef\r\n", 4).unwrap();
        assert_eq!(lines, vec!["abcd", "ef"]);
        assert!(matches!(
            collect(b"abcde\r\n", 4),
            Err(ValidateError::LineTooLong { line: 1, limit: 4 })
        ));
        assert!(matches!(
            collect(b"abcd\rx\n", 4),
            Err(ValidateError::LineTooLong { line: 1, limit: 4 })
        ));
    }

    #[test]
    fn line_over_limit_is_fatal() {
        match collect(b"ok\nabcde\n", 4) {
            Err(ValidateError::LineTooLong { line, limit }) => {
                assert_eq!(line, 2);
                assert_eq!(limit, 4);
            }
            other => panic!("expected LineTooLong, got {:?}", other),
        }
    }
}
