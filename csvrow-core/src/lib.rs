/*!
`csvrow-core` splits a single line of delimited text into cells and escapes
cells back into a line.

It is the tokenizer underneath `csvrow`, but has no knowledge of records,
converters or schemas. A [`Reader`](struct.Reader.html) isolates one cell at
a time using a small quote state machine, and a
[`Writer`](struct.Writer.html) applies the inverse escaping.

# Quoting

A cell that starts with the quote byte is *quoted*. Inside a quoted cell, a
doubled quote stands for one literal quote, and the closing quote must be
followed by either the delimiter or the end of the line. Anything else is an
error. Every line is meant to map onto a fixed set of typed columns, so a
malformed cell is rejected rather than guessed at.

Cells that do not start with a quote run up to the next delimiter verbatim.

# Dialect

The delimiter and the quote are single ASCII bytes. Since lines are UTF-8
`str`s, an ASCII byte can never occur inside a multi-byte sequence, which
means every cell boundary is also a `char` boundary.

# Example

```
use csvrow_core::{Reader, Writer};

let rdr = Reader::new();
let cells: Vec<String> = rdr
    .fields(r#"1,"a ""quoted"" word",x"#)
    .map(|f| f.map(|f| f.into_text().into_owned()))
    .collect::<Result<_, _>>()
    .unwrap();
assert_eq!(cells, vec!["1", r#"a "quoted" word"#, "x"]);

let wtr = Writer::new();
let mut line = String::new();
wtr.write_record(&cells, &mut line);
assert_eq!(line, r#"1,"a ""quoted"" word",x"#);
```
*/

#![deny(missing_docs)]

use std::error;
use std::fmt;

pub use crate::reader::{
    Field, Fields, ReadError, ReadErrorKind, Reader, ReaderBuilder,
};
pub use crate::writer::{QuoteStyle, Writer, WriterBuilder};

mod reader;
mod writer;

/// A line terminator.
///
/// The terminator is only ever written on request. When reading, one trailing
/// terminator is stripped from a line before it is split into cells.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Terminator {
    /// Writes `\r\n`. When reading, strips a trailing `\r\n`, `\n` or `\r`.
    CRLF,
    /// Writes the byte given. When reading, strips that byte. If the byte is
    /// `\n`, a preceding `\r` is stripped as well.
    Any(u8),
}

impl Default for Terminator {
    fn default() -> Terminator {
        Terminator::Any(b'\n')
    }
}

impl Terminator {
    /// Append this terminator to `out`.
    pub fn write(&self, out: &mut String) {
        match *self {
            Terminator::CRLF => out.push_str("\r\n"),
            Terminator::Any(b) => out.push(char::from(b)),
        }
    }

    /// Remove at most one trailing terminator from `line`.
    pub fn strip<'a>(&self, line: &'a str) -> &'a str {
        match *self {
            Terminator::CRLF => {
                if let Some(rest) = strip_byte(line, b'\n') {
                    strip_byte(rest, b'\r').unwrap_or(rest)
                } else {
                    strip_byte(line, b'\r').unwrap_or(line)
                }
            }
            Terminator::Any(b'\n') => match strip_byte(line, b'\n') {
                Some(rest) => strip_byte(rest, b'\r').unwrap_or(rest),
                None => line,
            },
            Terminator::Any(b) => strip_byte(line, b).unwrap_or(line),
        }
    }
}

fn strip_byte(line: &str, byte: u8) -> Option<&str> {
    if line.as_bytes().last() == Some(&byte) {
        Some(&line[..line.len() - 1])
    } else {
        None
    }
}

/// An error that occurs when a reader or writer is configured with an
/// unusable delimiter, quote or terminator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DialectError {
    /// The named byte is not ASCII.
    NotAscii {
        /// Which setting was rejected: `delimiter`, `quote` or `terminator`.
        what: &'static str,
        /// The rejected byte.
        byte: u8,
    },
    /// The delimiter or the quote is a line break.
    LineBreak {
        /// Which setting was rejected: `delimiter` or `quote`.
        what: &'static str,
    },
    /// The delimiter and the quote are the same byte.
    QuoteIsDelimiter(u8),
}

impl fmt::Display for DialectError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DialectError::NotAscii { what, byte } => {
                write!(f, "{} must be an ASCII byte, got \\x{:02x}", what, byte)
            }
            DialectError::LineBreak { what } => {
                write!(f, "{} cannot be a line break", what)
            }
            DialectError::QuoteIsDelimiter(b) => write!(
                f,
                "quote and delimiter must differ, both are {:?}",
                char::from(b)
            ),
        }
    }
}

impl error::Error for DialectError {}

/// Checks the bytes shared by readers and writers.
fn check_dialect(
    delimiter: u8,
    quote: u8,
    term: Terminator,
) -> Result<(), DialectError> {
    for &(what, byte) in &[("delimiter", delimiter), ("quote", quote)] {
        if !byte.is_ascii() {
            return Err(DialectError::NotAscii { what, byte });
        }
        if byte == b'\r' || byte == b'\n' {
            return Err(DialectError::LineBreak { what });
        }
    }
    if delimiter == quote {
        return Err(DialectError::QuoteIsDelimiter(quote));
    }
    if let Terminator::Any(byte) = term {
        if !byte.is_ascii() {
            return Err(DialectError::NotAscii { what: "terminator", byte });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{check_dialect, DialectError, Terminator};

    #[test]
    fn strip_lf() {
        let t = Terminator::Any(b'\n');
        assert_eq!(t.strip("a,b\n"), "a,b");
        assert_eq!(t.strip("a,b\r\n"), "a,b");
        assert_eq!(t.strip("a,b\n\n"), "a,b\n");
        assert_eq!(t.strip("a,b"), "a,b");
        assert_eq!(t.strip(""), "");
    }

    #[test]
    fn strip_crlf() {
        let t = Terminator::CRLF;
        assert_eq!(t.strip("a\r\n"), "a");
        assert_eq!(t.strip("a\n"), "a");
        assert_eq!(t.strip("a\r"), "a");
        assert_eq!(t.strip("a\r\r"), "a\r");
    }

    #[test]
    fn strip_any() {
        let t = Terminator::Any(b';');
        assert_eq!(t.strip("a,b;"), "a,b");
        assert_eq!(t.strip("a,b\n"), "a,b\n");
    }

    #[test]
    fn write_terminators() {
        let mut out = String::new();
        Terminator::CRLF.write(&mut out);
        Terminator::Any(b'|').write(&mut out);
        assert_eq!(out, "\r\n|");
    }

    #[test]
    fn dialect_checks() {
        assert!(check_dialect(b',', b'"', Terminator::CRLF).is_ok());
        assert_eq!(
            check_dialect(b',', b',', Terminator::CRLF),
            Err(DialectError::QuoteIsDelimiter(b',')),
        );
        assert_eq!(
            check_dialect(b'\n', b'"', Terminator::CRLF),
            Err(DialectError::LineBreak { what: "delimiter" }),
        );
        assert_eq!(
            check_dialect(b',', 0xC3, Terminator::CRLF),
            Err(DialectError::NotAscii { what: "quote", byte: 0xC3 }),
        );
        assert_eq!(
            check_dialect(b',', b'"', Terminator::Any(0xFF)),
            Err(DialectError::NotAscii { what: "terminator", byte: 0xFF }),
        );
    }
}
