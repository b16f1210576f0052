use memchr::memchr;

use crate::{check_dialect, DialectError, Terminator};

/// The quoting style to use when writing cells.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QuoteStyle {
    /// This puts quotes around every cell. Always.
    Always,
    /// This puts quotes around cells only when necessary, or when the caller
    /// asks for it on a particular cell.
    ///
    /// They are necessary when a cell contains a quote, the delimiter, or one
    /// of `\r`, `\n`, `\t` or `\x08`.
    ///
    /// This is the default.
    Necessary,
}

impl Default for QuoteStyle {
    fn default() -> QuoteStyle {
        QuoteStyle::Necessary
    }
}

/// A builder for configuring a line writer.
///
/// This builder permits specifying the delimiter, terminator, quote and
/// quoting style.
#[derive(Debug, Default)]
pub struct WriterBuilder {
    wtr: Writer,
}

impl WriterBuilder {
    /// Create a new builder for configuring a line writer.
    pub fn new() -> WriterBuilder {
        WriterBuilder::default()
    }

    /// Build a writer from this configuration.
    ///
    /// This fails if the delimiter and quote are equal, are not ASCII or are
    /// line breaks.
    pub fn build(&self) -> Result<Writer, DialectError> {
        check_dialect(self.wtr.delimiter, self.wtr.quote, self.wtr.term)?;
        Ok(self.wtr.clone())
    }

    /// The delimiter to write between cells.
    ///
    /// The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut WriterBuilder {
        self.wtr.delimiter = delimiter;
        self
    }

    /// The terminator written by
    /// [`Writer::write_terminator`](struct.Writer.html#method.write_terminator).
    ///
    /// The default is `Terminator::Any(b'\n')`.
    pub fn terminator(&mut self, term: Terminator) -> &mut WriterBuilder {
        self.wtr.term = term;
        self
    }

    /// The quoting style to use.
    ///
    /// By default, this is set to `QuoteStyle::Necessary`, which will only
    /// use quotes when they are necessary to preserve the integrity of data.
    pub fn quote_style(&mut self, style: QuoteStyle) -> &mut WriterBuilder {
        self.wtr.style = style;
        self
    }

    /// The quote character to use.
    ///
    /// The default value is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut WriterBuilder {
        self.wtr.quote = quote;
        self
    }
}

/// A writer for cells of a single line.
///
/// Quotes inside a cell are always escaped by doubling them, which is what
/// [`Reader`](struct.Reader.html) expects. The writer does not track how
/// many cells were written; callers write the delimiter between cells
/// themselves, or use `write_record`.
#[derive(Clone, Debug)]
pub struct Writer {
    delimiter: u8,
    quote: u8,
    term: Terminator,
    style: QuoteStyle,
}

impl Default for Writer {
    fn default() -> Writer {
        Writer {
            delimiter: b',',
            quote: b'"',
            term: Terminator::default(),
            style: QuoteStyle::default(),
        }
    }
}

impl Writer {
    /// Creates a new writer with the default configuration.
    pub fn new() -> Writer {
        Writer::default()
    }

    /// The delimiter used by this writer.
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// The quote used by this writer.
    pub fn quote(&self) -> u8 {
        self.quote
    }

    /// The terminator used by this writer.
    pub fn terminator(&self) -> Terminator {
        self.term
    }

    /// Append a single cell to `out`.
    ///
    /// A cell containing the quote is wrapped in quotes with every quote
    /// doubled. Otherwise, the cell is wrapped in quotes (without any
    /// escaping) if `force_quotes` is set, the quoting style is
    /// `QuoteStyle::Always` or the cell contains the delimiter or a control
    /// character. Any other cell is written verbatim.
    pub fn write_field(&self, field: &str, force_quotes: bool, out: &mut String) {
        if memchr(self.quote, field.as_bytes()).is_some() {
            self.write_escaped(field, out);
        } else if force_quotes
            || self.style == QuoteStyle::Always
            || self.should_quote(field)
        {
            let quote = char::from(self.quote);
            out.reserve(field.len() + 2);
            out.push(quote);
            out.push_str(field);
            out.push(quote);
        } else {
            out.push_str(field);
        }
    }

    /// Append the delimiter to `out`.
    pub fn write_delimiter(&self, out: &mut String) {
        out.push(char::from(self.delimiter));
    }

    /// Append the line terminator to `out`.
    pub fn write_terminator(&self, out: &mut String) {
        self.term.write(out);
    }

    /// Append every cell yielded by `fields` to `out`, separated by the
    /// delimiter. No terminator is written.
    pub fn write_record<I, F>(&self, fields: I, out: &mut String)
    where
        I: IntoIterator<Item = F>,
        F: AsRef<str>,
    {
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                self.write_delimiter(out);
            }
            self.write_field(field.as_ref(), false, out);
        }
    }

    /// Whether `field` contains a byte that would be misread if the field
    /// were written unquoted. Quotes are not considered here, since they
    /// always cause escaping. A custom terminator byte counts, since readers
    /// strip it from the end of a line.
    fn should_quote(&self, field: &str) -> bool {
        let term = match self.term {
            Terminator::Any(b) => Some(b),
            Terminator::CRLF => None,
        };
        field.bytes().any(|b| {
            b == self.delimiter
                || Some(b) == term
                || matches!(b, b'\r' | b'\n' | b'\t' | b'\x08')
        })
    }

    fn write_escaped(&self, field: &str, out: &mut String) {
        let quote = char::from(self.quote);
        let bytes = field.as_bytes();
        out.push(quote);
        let mut start = 0;
        while let Some(i) = memchr(self.quote, &bytes[start..]) {
            let end = start + i + 1;
            out.push_str(&field[start..end]);
            out.push(quote);
            start = end;
        }
        out.push_str(&field[start..]);
        out.push(quote);
    }
}

#[cfg(test)]
mod tests {
    use super::{QuoteStyle, Writer, WriterBuilder};
    use crate::Terminator;

    fn field(wtr: &Writer, s: &str, force: bool) -> String {
        let mut out = String::new();
        wtr.write_field(s, force, &mut out);
        out
    }

    macro_rules! writes_to {
        ($name:ident, $field:expr, $expected:expr) => {
            writes_to!($name, $field, false, $expected);
        };
        ($name:ident, $field:expr, $force:expr, $expected:expr) => {
            #[test]
            fn $name() {
                assert_eq!(field(&Writer::new(), $field, $force), $expected);
            }
        };
    }

    writes_to!(plain, "abc", "abc");
    writes_to!(empty, "", "");
    writes_to!(empty_forced, "", true, r#""""#);
    writes_to!(forced, "abc", true, r#""abc""#);
    writes_to!(delimiter, "has,comma", r#""has,comma""#);
    writes_to!(single_quote, r#"""#, r#""""""#);
    writes_to!(two_quotes, r#""""#, r#""""""""#);
    writes_to!(wrapped_word, r#""wow""#, r#""""wow""""#);
    writes_to!(inner_quote, r#"str"wow"#, r#""str""wow""#);
    writes_to!(line_feed, "a\nb", "\"a\nb\"");
    writes_to!(carriage_return, "a\rb", "\"a\rb\"");
    writes_to!(tab, "a\tb", "\"a\tb\"");
    writes_to!(backspace, "a\x08b", "\"a\x08b\"");
    writes_to!(spaces_unquoted, " a ", " a ");

    #[test]
    fn quote_and_delimiter_change() {
        let wtr = WriterBuilder::new()
            .delimiter(b'|')
            .quote(b'\'')
            .build()
            .unwrap();
        assert_eq!(field(&wtr, "a,b", false), "a,b");
        assert_eq!(field(&wtr, "a|b", false), "'a|b'");
        assert_eq!(field(&wtr, "it's", false), "'it''s'");
        assert_eq!(field(&wtr, r#"say "hi""#, false), r#"say "hi""#);
    }

    #[test]
    fn always_quote() {
        let wtr = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .build()
            .unwrap();
        assert_eq!(field(&wtr, "abc", false), r#""abc""#);
        assert_eq!(field(&wtr, "", false), r#""""#);
    }

    #[test]
    fn record_and_terminator() {
        let wtr = WriterBuilder::new()
            .terminator(Terminator::CRLF)
            .build()
            .unwrap();
        let mut out = String::new();
        wtr.write_record(&["1", "has,comma", "x"], &mut out);
        wtr.write_terminator(&mut out);
        assert_eq!(out, "1,\"has,comma\",x\r\n");
    }

    #[test]
    fn custom_terminator_is_quoted() {
        let wtr = WriterBuilder::new()
            .terminator(Terminator::Any(b';'))
            .build()
            .unwrap();
        assert_eq!(field(&wtr, "a;", false), r#""a;""#);
        assert_eq!(field(&wtr, "a;b", false), r#""a;b""#);
        assert_eq!(field(&wtr, "a,b", false), r#""a,b""#);
        assert_eq!(field(&wtr, "ab", false), "ab");
    }

    #[test]
    fn builder_rejects_bad_dialect() {
        assert!(WriterBuilder::new().delimiter(b'"').build().is_err());
        assert!(WriterBuilder::new().quote(b'\n').build().is_err());
    }
}
