//! Logical line reader shared by the OBJ, MTL and BVH grammars.
//!
//! Physical lines ending in `\` are joined with the following line. Comment
//! and blank lines are returned as-is; each grammar decides how to treat them.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::error::{ImportError, ImportResult};

/// COFF machine types that mark a compiled object file sharing the `.obj` extension.
const COFF_MACHINE_TYPES: [u16; 5] = [0x0000, 0x8664, 0x01c0, 0x014c, 0x0200];

/// Reads logically joined, trimmed lines from a buffered stream.
pub struct LineReader<R> {
    inner: R,
    source: PathBuf,
    physical_line: usize,
    logical_start: usize,
    buf: String,
}

impl<R: BufRead> LineReader<R> {
    /// Wrap a stream. `source` is used to qualify error messages.
    pub fn new(inner: R, source: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            source: source.into(),
            physical_line: 0,
            logical_start: 0,
            buf: String::new(),
        }
    }

    /// Path reported in errors.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// 1-based line number where the last returned logical line started.
    pub fn line_number(&self) -> usize {
        self.logical_start
    }

    /// Reject streams whose first two bytes look like a COFF object header.
    ///
    /// Does not consume anything from the stream.
    pub fn check_text_header(&mut self) -> ImportResult<()> {
        let head = self.inner.fill_buf()?;
        if looks_binary(head) {
            return Err(ImportError::FileCorrupt {
                path: self.source.clone(),
                line: 0,
                message: "couldn't read OBJ file, it may be binary, corrupted, or empty".to_string(),
            });
        }
        Ok(())
    }

    /// Return the next logical line with surrounding whitespace stripped,
    /// or `None` at end of stream.
    pub fn next_line(&mut self) -> ImportResult<Option<String>> {
        let mut joined = String::new();
        let mut started = false;

        loop {
            self.buf.clear();
            if self.inner.read_line(&mut self.buf)? == 0 {
                break;
            }
            self.physical_line += 1;
            if !started {
                self.logical_start = self.physical_line;
                started = true;
            }

            let physical = self.buf.trim_end();
            if let Some(head) = physical.strip_suffix('\\') {
                joined.push_str(head);
                joined.push(' ');
                continue;
            }
            // An empty physical line also ends a continuation.
            joined.push_str(physical);
            break;
        }

        if !started {
            return Ok(None);
        }
        Ok(Some(joined.trim().to_string()))
    }

    /// Build a [`ImportError::FileCorrupt`] pointing at the current line.
    pub fn corrupt(&self, message: impl Into<String>) -> ImportError {
        ImportError::FileCorrupt {
            path: self.source.clone(),
            line: self.logical_start,
            message: message.into(),
        }
    }

    /// Build a [`ImportError::InvalidData`] pointing at the current line.
    pub fn invalid(&self, message: impl Into<String>) -> ImportError {
        ImportError::InvalidData {
            path: self.source.clone(),
            line: self.logical_start,
            message: message.into(),
        }
    }
}

/// Returns true if `head` starts with a known COFF machine type, or is too
/// short to hold one (an empty file).
pub fn looks_binary(head: &[u8]) -> bool {
    match head {
        [lo, hi, ..] => COFF_MACHINE_TYPES.contains(&u16::from_le_bytes([*lo, *hi])),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(text: &str) -> Vec<(usize, String)> {
        let mut reader = LineReader::new(text.as_bytes(), "test.obj");
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().unwrap() {
            lines.push((reader.line_number(), line));
        }
        lines
    }

    #[test]
    fn test_lines_are_trimmed() {
        let lines = read_all("  v 1 2 3  \r\n\n# comment\n");
        assert_eq!(
            lines,
            vec![
                (1, "v 1 2 3".to_string()),
                (2, String::new()),
                (3, "# comment".to_string()),
            ]
        );
    }

    #[test]
    fn test_backslash_continuation() {
        let lines = read_all("f 1 2 \\\n  3 4\nv 0 0 0\n");
        assert_eq!(lines[0], (1, "f 1 2    3 4".to_string()));
        assert_eq!(lines[1], (3, "v 0 0 0".to_string()));
    }

    #[test]
    fn test_continuation_at_eof() {
        let lines = read_all("vt 0.5 \\");
        assert_eq!(lines, vec![(1, "vt 0.5".to_string())]);
    }

    #[test]
    fn test_binary_header_sniff() {
        // x86-64 COFF object
        assert!(looks_binary(&[0x64, 0x86, 0x03, 0x00]));
        // i386
        assert!(looks_binary(&[0x4c, 0x01]));
        // Empty or truncated
        assert!(looks_binary(&[]));
        assert!(looks_binary(b"v"));
        // Plain text
        assert!(!looks_binary(b"v 0 0 0"));
        assert!(!looks_binary(b"# exported"));
    }

    #[test]
    fn test_check_text_header_does_not_consume() {
        let mut reader = LineReader::new("o Cube\n".as_bytes(), "cube.obj");
        reader.check_text_header().unwrap();
        assert_eq!(reader.next_line().unwrap().as_deref(), Some("o Cube"));

        let mut reader = LineReader::new(&[0x64u8, 0x86, 0, 0][..], "compiled.obj");
        let err = reader.check_text_header().unwrap_err();
        assert!(err.is_corrupt());
    }
}
