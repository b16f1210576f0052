use std::borrow::Cow;
use std::error;
use std::fmt;

use memchr::memchr;

use crate::{check_dialect, DialectError, Terminator};

/// Builds a line reader with various configuration knobs.
///
/// This builder can be used to tweak the delimiter, quote and terminator.
/// Once a `Reader` is built, its configuration cannot be changed.
#[derive(Debug, Default)]
pub struct ReaderBuilder {
    rdr: Reader,
}

impl ReaderBuilder {
    /// Create a new builder.
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Build a reader from this configuration.
    ///
    /// This fails if the delimiter and quote are equal, are not ASCII or are
    /// line breaks.
    pub fn build(&self) -> Result<Reader, DialectError> {
        check_dialect(self.rdr.delimiter, self.rdr.quote, self.rdr.term)?;
        Ok(self.rdr.clone())
    }

    /// The delimiter that separates cells.
    ///
    /// The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut ReaderBuilder {
        self.rdr.delimiter = delimiter;
        self
    }

    /// The quote character that wraps cells.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut ReaderBuilder {
        self.rdr.quote = quote;
        self
    }

    /// The terminator stripped from the end of a line by
    /// [`Reader::strip_terminator`](struct.Reader.html#method.strip_terminator).
    ///
    /// The default is `Terminator::Any(b'\n')`.
    pub fn terminator(&mut self, term: Terminator) -> &mut ReaderBuilder {
        self.rdr.term = term;
        self
    }
}

/// A reader for the cells of a single line.
///
/// A reader carries no state between calls. Every call to `read_field`
/// starts at the byte offset given and returns where the next cell begins,
/// so a single reader may be shared freely.
#[derive(Clone, Debug)]
pub struct Reader {
    /// The delimiter that separates cells.
    delimiter: u8,
    /// The quotation byte.
    quote: u8,
    /// The terminator stripped from lines.
    term: Terminator,
}

impl Default for Reader {
    fn default() -> Reader {
        Reader { delimiter: b',', quote: b'"', term: Terminator::default() }
    }
}

impl Reader {
    /// Create a new reader with the default configuration.
    pub fn new() -> Reader {
        Reader::default()
    }

    /// The delimiter used by this reader.
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// The quote used by this reader.
    pub fn quote(&self) -> u8 {
        self.quote
    }

    /// The terminator used by this reader.
    pub fn terminator(&self) -> Terminator {
        self.term
    }

    /// Remove at most one trailing terminator from `line`.
    pub fn strip_terminator<'a>(&self, line: &'a str) -> &'a str {
        self.term.strip(line)
    }

    /// Returns an iterator over every cell in `line`.
    ///
    /// The iterator stops after the last cell, or after the first error.
    /// An empty line has exactly one empty cell.
    pub fn fields<'r, 'a>(&'r self, line: &'a str) -> Fields<'r, 'a> {
        Fields { rdr: self, line, pos: 0, done: false }
    }

    /// Read the cell starting at byte offset `pos` in `line`.
    ///
    /// `pos` must be `0` or the `end` of a previously read cell that was not
    /// at the end of the record. If `pos` is equal to the length of the line,
    /// then an empty cell that ends the record is returned.
    pub fn read_field<'a>(
        &self,
        line: &'a str,
        pos: usize,
    ) -> Result<Field<'a>, ReadError> {
        debug_assert!(pos <= line.len());
        if line.as_bytes().get(pos) == Some(&self.quote) {
            self.read_quoted(line, pos)
        } else {
            Ok(self.read_unquoted(line, pos))
        }
    }

    fn read_unquoted<'a>(&self, line: &'a str, start: usize) -> Field<'a> {
        match memchr(self.delimiter, &line.as_bytes()[start..]) {
            Some(i) => Field {
                text: Cow::Borrowed(&line[start..start + i]),
                start,
                end: start + i + 1,
                quoted: false,
                record_end: false,
            },
            None => Field {
                text: Cow::Borrowed(&line[start..]),
                start,
                end: line.len(),
                quoted: false,
                record_end: true,
            },
        }
    }

    fn read_quoted<'a>(
        &self,
        line: &'a str,
        start: usize,
    ) -> Result<Field<'a>, ReadError> {
        let bytes = line.as_bytes();
        // The start of the current run of literal text. Every doubled quote
        // starts a new run.
        let mut run = start + 1;
        // Only allocated once a doubled quote is seen.
        let mut unescaped: Option<String> = None;
        loop {
            let close = match memchr(self.quote, &bytes[run..]) {
                Some(i) => run + i,
                None => {
                    return Err(ReadError {
                        kind: ReadErrorKind::UnclosedQuote,
                        offset: line.len(),
                    });
                }
            };
            let next = close + 1;
            let (end, record_end) = if next == bytes.len() {
                (next, true)
            } else if bytes[next] == self.delimiter {
                (next + 1, false)
            } else if bytes[next] == self.quote {
                unescaped
                    .get_or_insert_with(String::new)
                    .push_str(&line[run..next]);
                run = next + 1;
                continue;
            } else {
                let found = line[next..]
                    .chars()
                    .next()
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                return Err(ReadError {
                    kind: ReadErrorKind::CharAfterQuote(found),
                    offset: next,
                });
            };
            let text = match unescaped {
                None => Cow::Borrowed(&line[run..close]),
                Some(mut buf) => {
                    buf.push_str(&line[run..close]);
                    Cow::Owned(buf)
                }
            };
            return Ok(Field { text, start, end, quoted: true, record_end });
        }
    }
}

/// A single cell read from a line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Field<'a> {
    text: Cow<'a, str>,
    start: usize,
    end: usize,
    quoted: bool,
    record_end: bool,
}

impl<'a> Field<'a> {
    /// The unescaped text of this cell, without any surrounding quotes.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consume this cell and return its unescaped text.
    ///
    /// The text borrows from the line unless the cell contained a doubled
    /// quote.
    pub fn into_text(self) -> Cow<'a, str> {
        self.text
    }

    /// The byte offset at which this cell starts, including its opening
    /// quote if it has one.
    pub fn start(&self) -> usize {
        self.start
    }

    /// The byte offset at which the next cell starts.
    ///
    /// When this is the last cell of the line, this is the length of the
    /// line.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Whether this cell was quoted.
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// Whether this cell was terminated by the end of the line rather than
    /// by a delimiter.
    pub fn is_record_end(&self) -> bool {
        self.record_end
    }
}

/// An iterator over the cells of a line.
///
/// This is created by [`Reader::fields`](struct.Reader.html#method.fields).
#[derive(Debug)]
pub struct Fields<'r, 'a> {
    rdr: &'r Reader,
    line: &'a str,
    pos: usize,
    done: bool,
}

impl<'r, 'a> Iterator for Fields<'r, 'a> {
    type Item = Result<Field<'a>, ReadError>;

    fn next(&mut self) -> Option<Result<Field<'a>, ReadError>> {
        if self.done {
            return None;
        }
        match self.rdr.read_field(self.line, self.pos) {
            Ok(field) => {
                self.pos = field.end;
                self.done = field.record_end;
                Some(Ok(field))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// An error that occurs when a quoted cell is malformed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadError {
    kind: ReadErrorKind,
    offset: usize,
}

/// The kind of a [`ReadError`](struct.ReadError.html).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadErrorKind {
    /// A quoted cell has no closing quote before the end of the line.
    UnclosedQuote,
    /// A closing quote is followed by this character instead of a
    /// delimiter, a second quote or the end of the line.
    CharAfterQuote(char),
}

impl ReadError {
    /// The kind of this error.
    pub fn kind(&self) -> &ReadErrorKind {
        &self.kind
    }

    /// The byte offset in the line at which this error was detected.
    ///
    /// For an unclosed quote, this is the length of the line.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ReadErrorKind::UnclosedQuote => {
                write!(f, "quoted field is not terminated by a quote")
            }
            ReadErrorKind::CharAfterQuote(ch) => write!(
                f,
                "closing quote is followed by {:?} at byte {}, \
                 expected a delimiter",
                ch, self.offset
            ),
        }
    }
}

impl error::Error for ReadError {}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use proptest::prelude::*;

    use super::{ReadErrorKind, Reader, ReaderBuilder};
    use crate::{Terminator, Writer, WriterBuilder};

    fn read(rdr: &Reader, line: &str) -> Vec<String> {
        rdr.fields(line)
            .map(|f| f.map(|f| f.into_text().into_owned()))
            .collect::<Result<_, _>>()
            .unwrap()
    }

    macro_rules! parses_to {
        ($name:ident, $line:expr, $cells:expr) => {
            parses_to!($name, $line, $cells, |_: &mut ReaderBuilder| {});
        };
        ($name:ident, $line:expr, $cells:expr, $config:expr) => {
            #[test]
            fn $name() {
                let mut builder = ReaderBuilder::new();
                $config(&mut builder);
                let rdr = builder.build().unwrap();
                let expected: Vec<&str> = $cells;
                assert_eq!(read(&rdr, $line), expected);
            }
        };
    }

    macro_rules! fails_at {
        ($name:ident, $line:expr, $kind:expr, $offset:expr) => {
            #[test]
            fn $name() {
                let rdr = Reader::new();
                let err = rdr
                    .fields($line)
                    .collect::<Result<Vec<_>, _>>()
                    .unwrap_err();
                assert_eq!(err.kind(), &$kind);
                assert_eq!(err.offset(), $offset);
            }
        };
    }

    parses_to!(empty, "", vec![""]);
    parses_to!(one_field, "a", vec!["a"]);
    parses_to!(many_fields, "a,b,c", vec!["a", "b", "c"]);
    parses_to!(trailing_comma, "a,b,", vec!["a", "b", ""]);
    parses_to!(leading_comma, ",a", vec!["", "a"]);
    parses_to!(only_commas, ",,,", vec!["", "", "", ""]);
    parses_to!(spaces_kept, " a , b ", vec![" a ", " b "]);
    parses_to!(quote_in_unquoted, r#"a"b,c"#, vec![r#"a"b"#, "c"]);

    parses_to!(quote_empty, r#""""#, vec![""]);
    parses_to!(quote_simple, r#""a",b"#, vec!["a", "b"]);
    parses_to!(quote_delimiter, r#""a,b",c"#, vec!["a,b", "c"]);
    parses_to!(quote_space, r#"" a ""#, vec![" a "]);
    parses_to!(quote_doubled, r#""a""b""#, vec![r#"a"b"#]);
    parses_to!(quote_only_quote, r#""""""#, vec![r#"""#]);
    parses_to!(quote_two_quotes, r#""""""",x"#, vec![r#""""#, "x"]);
    parses_to!(quote_wrapped_word, r#""""wow""",x"#, vec![r#""wow""#, "x"]);
    parses_to!(quote_line_breaks, "\"a\r\nb\",c", vec!["a\r\nb", "c"]);
    parses_to!(quote_unicode, "\"é,ü\",ñ", vec!["é,ü", "ñ"]);

    parses_to!(
        delimiter_pipe,
        r#"a|"b|c"|d"#,
        vec!["a", "b|c", "d"],
        |b: &mut ReaderBuilder| {
            b.delimiter(b'|');
        }
    );
    parses_to!(
        quote_change,
        "'it''s',x",
        vec!["it's", "x"],
        |b: &mut ReaderBuilder| {
            b.quote(b'\'');
        }
    );

    fails_at!(unclosed, r#""abc"#, ReadErrorKind::UnclosedQuote, 4);
    fails_at!(
        unclosed_after_doubled,
        r#"x,"a"""#,
        ReadErrorKind::UnclosedQuote,
        6
    );
    fails_at!(
        unclosed_later_cell,
        r#"0,"string,1,unquoted"#,
        ReadErrorKind::UnclosedQuote,
        20
    );
    fails_at!(
        char_after_quote,
        r#""abc"def,x"#,
        ReadErrorKind::CharAfterQuote('d'),
        5
    );
    fails_at!(
        mid_field_quote,
        r#"0,"str"ing",1,unquoted"#,
        ReadErrorKind::CharAfterQuote('i'),
        7
    );

    #[test]
    fn no_allocation_without_doubled_quote() {
        let rdr = Reader::new();
        let field = rdr.read_field(r#""abc",d"#, 0).unwrap();
        assert!(matches!(field.into_text(), Cow::Borrowed("abc")));

        let field = rdr.read_field(r#""a""c",d"#, 0).unwrap();
        assert!(matches!(field.into_text(), Cow::Owned(_)));
    }

    #[test]
    fn field_positions() {
        let rdr = Reader::new();
        let line = r#"ab,"c",d"#;

        let f = rdr.read_field(line, 0).unwrap();
        assert_eq!((f.start(), f.end()), (0, 3));
        assert!(!f.is_quoted() && !f.is_record_end());

        let f = rdr.read_field(line, 3).unwrap();
        assert_eq!((f.start(), f.end()), (3, 7));
        assert!(f.is_quoted() && !f.is_record_end());

        let f = rdr.read_field(line, 7).unwrap();
        assert_eq!((f.start(), f.end()), (7, 8));
        assert!(!f.is_quoted() && f.is_record_end());
    }

    #[test]
    fn read_at_end_of_line() {
        let rdr = Reader::new();
        let f = rdr.read_field("a,", 2).unwrap();
        assert_eq!(f.text(), "");
        assert!(f.is_record_end());
        assert_eq!(f.end(), 2);
    }

    #[test]
    fn iterator_stops_after_error() {
        let rdr = Reader::new();
        let mut it = rdr.fields(r#"a,"b"c,d"#);
        assert_eq!(it.next().unwrap().unwrap().text(), "a");
        assert!(it.next().unwrap().is_err());
        assert!(it.next().is_none());
    }

    #[test]
    fn builder_rejects_bad_dialect() {
        assert!(ReaderBuilder::new().quote(b',').build().is_err());
        assert!(ReaderBuilder::new().delimiter(b'\r').build().is_err());
        assert!(ReaderBuilder::new()
            .terminator(Terminator::Any(0x80))
            .build()
            .is_err());
    }

    proptest! {
        #[test]
        fn write_then_read(cells in prop::collection::vec(".*", 1..6)) {
            let wtr = Writer::new();
            let mut line = String::new();
            wtr.write_record(&cells, &mut line);
            prop_assert_eq!(read(&Reader::new(), &line), cells);
        }

        #[test]
        fn write_then_read_always_quoted(
            cells in prop::collection::vec("[a-z\";|]*", 1..6),
        ) {
            let wtr = WriterBuilder::new()
                .delimiter(b';')
                .quote_style(crate::QuoteStyle::Always)
                .build()
                .unwrap();
            let rdr = ReaderBuilder::new().delimiter(b';').build().unwrap();
            let mut line = String::new();
            wtr.write_record(&cells, &mut line);
            prop_assert_eq!(read(&rdr, &line), cells);
        }
    }
}
