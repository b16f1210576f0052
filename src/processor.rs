use std::fmt;
use std::result;
use std::sync::Arc;

use csvrow_core::{
    QuoteStyle, ReadError, ReadErrorKind, Reader, ReaderBuilder, Terminator,
    Writer, WriterBuilder,
};
use tracing::{debug, trace};

use crate::column::{Column, FieldDescriptor, PendingColumn};
use crate::converter::{Converter, ConverterRegistry};
use crate::error::{
    ConfigError, ConfigErrorKind, DecodeErrorKind, Error, ParseError,
    ParseErrorKind, Result,
};

type Factory<R> = Arc<dyn Fn() -> result::Result<R, String> + Send + Sync>;

/// Builds a [`Processor`](struct.Processor.html) for records of type `R`.
///
/// Columns are added in the order in which they appear in a line. Every
/// other option has a default, so the smallest useful builder only adds
/// columns.
///
/// # Example
///
/// ```
/// use csvrow::{Column, Processor};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct City {
///     name: String,
///     population: u64,
/// }
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let processor = Processor::builder()
///     .column(Column::new("name", |c: &City| &c.name, |c: &mut City, v| c.name = v))
///     .column(Column::new(
///         "population",
///         |c: &City| &c.population,
///         |c: &mut City, v| c.population = v,
///     ))
///     .separator(b';')
///     .build()?;
///
/// let city = processor.parse_line("Boston;4628910")?;
/// assert_eq!(city, City { name: "Boston".to_string(), population: 4628910 });
/// assert_eq!(processor.write_line(&city, false)?, "\"Boston\";4628910");
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct ProcessorBuilder<R> {
    columns: Vec<Box<dyn PendingColumn<R>>>,
    registry: ConverterRegistry,
    separator: u8,
    quote: u8,
    terminator: Terminator,
    quote_style: QuoteStyle,
    allow_partial_lines: bool,
    always_trim_input: bool,
    first_line_header: bool,
    validate_header: bool,
    factory: Option<Factory<R>>,
}

impl<R: 'static> Default for ProcessorBuilder<R> {
    fn default() -> ProcessorBuilder<R> {
        ProcessorBuilder::new()
    }
}

impl<R> fmt::Debug for ProcessorBuilder<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let columns: Vec<&str> = self.columns.iter().map(|c| c.name()).collect();
        f.debug_struct("ProcessorBuilder")
            .field("columns", &columns)
            .field("registry", &self.registry)
            .field("separator", &char::from(self.separator))
            .field("quote", &char::from(self.quote))
            .field("terminator", &self.terminator)
            .field("quote_style", &self.quote_style)
            .field("allow_partial_lines", &self.allow_partial_lines)
            .field("always_trim_input", &self.always_trim_input)
            .field("first_line_header", &self.first_line_header)
            .field("validate_header", &self.validate_header)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

impl<R: 'static> ProcessorBuilder<R> {
    /// Create a new builder without any columns or record factory.
    ///
    /// Records can still be decoded with
    /// [`Processor::parse_line_into`](struct.Processor.html#method.parse_line_into).
    pub fn new() -> ProcessorBuilder<R> {
        ProcessorBuilder {
            columns: vec![],
            registry: ConverterRegistry::new(),
            separator: b',',
            quote: b'"',
            terminator: Terminator::default(),
            quote_style: QuoteStyle::default(),
            allow_partial_lines: false,
            always_trim_input: false,
            first_line_header: false,
            validate_header: false,
            factory: None,
        }
    }

    /// Build a processor from this configuration.
    ///
    /// Every column is bound to its converter here, so a bad format string
    /// or a type without a converter is reported now rather than on the
    /// first line. The processor takes a copy of the converter registry.
    pub fn build(&self) -> result::Result<Processor<R>, ConfigError> {
        if self.columns.is_empty() {
            return Err(ConfigError::new(ConfigErrorKind::NoColumns));
        }
        let rdr = ReaderBuilder::new()
            .delimiter(self.separator)
            .quote(self.quote)
            .terminator(self.terminator)
            .build()?;
        let wtr = WriterBuilder::new()
            .delimiter(self.separator)
            .quote(self.quote)
            .terminator(self.terminator)
            .quote_style(self.quote_style)
            .build()?;
        let registry = self.registry.clone();
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| col.bind(i, &registry, self.always_trim_input))
            .collect::<result::Result<Vec<_>, _>>()?;
        debug!(
            columns = columns.len(),
            separator = %char::from(self.separator),
            quote = %char::from(self.quote),
            partial_lines = self.allow_partial_lines,
            "built record processor"
        );
        Ok(Processor {
            columns,
            registry,
            rdr,
            wtr,
            allow_partial_lines: self.allow_partial_lines,
            first_line_header: self.first_line_header,
            validate_header: self.validate_header,
            factory: self.factory.clone(),
        })
    }

    /// Add a column after the ones already added.
    ///
    /// If a column with the same name was added before, it is replaced in
    /// place by this one, for both reading and writing.
    pub fn column<T: 'static>(
        &mut self,
        column: Column<R, T>,
    ) -> &mut ProcessorBuilder<R> {
        let column: Box<dyn PendingColumn<R>> = Box::new(column);
        match self.columns.iter().position(|c| c.name() == column.name()) {
            Some(i) => self.columns[i] = column,
            None => self.columns.push(column),
        }
        self
    }

    /// Use `converter` for every column of type `T` that does not name a
    /// converter of its own. This replaces any built-in converter for `T`.
    pub fn converter<T, C>(&mut self, converter: C) -> &mut ProcessorBuilder<R>
    where
        T: 'static,
        C: Converter<T>,
    {
        self.registry.register::<T, C>(converter);
        self
    }

    /// Replace the whole converter registry.
    pub fn converters(
        &mut self,
        registry: ConverterRegistry,
    ) -> &mut ProcessorBuilder<R> {
        self.registry = registry;
        self
    }

    /// The separator between cells.
    ///
    /// The default is `b','`.
    pub fn separator(&mut self, separator: u8) -> &mut ProcessorBuilder<R> {
        self.separator = separator;
        self
    }

    /// The quote character.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut ProcessorBuilder<R> {
        self.quote = quote;
        self
    }

    /// The line terminator, appended when writing on request and stripped
    /// before parsing.
    ///
    /// The default is `Terminator::Any(b'\n')`.
    pub fn terminator(&mut self, term: Terminator) -> &mut ProcessorBuilder<R> {
        self.terminator = term;
        self
    }

    /// When to quote cells on write.
    ///
    /// The default is `QuoteStyle::Necessary`, which still quotes every
    /// column whose converter or definition asks for it.
    pub fn quote_style(
        &mut self,
        style: QuoteStyle,
    ) -> &mut ProcessorBuilder<R> {
        self.quote_style = style;
        self
    }

    /// Whether lines with fewer cells than columns are accepted. Columns
    /// past the end of such a line are left untouched.
    ///
    /// Disabled by default.
    pub fn allow_partial_lines(&mut self, yes: bool) -> &mut ProcessorBuilder<R> {
        self.allow_partial_lines = yes;
        self
    }

    /// Whether every cell is trimmed of surrounding whitespace before it is
    /// decoded.
    ///
    /// Disabled by default.
    pub fn always_trim_input(&mut self, yes: bool) -> &mut ProcessorBuilder<R> {
        self.always_trim_input = yes;
        self
    }

    /// Whether the first line of a stream read with
    /// [`Processor::read_all`](struct.Processor.html#method.read_all) is a
    /// header.
    ///
    /// Disabled by default.
    pub fn first_line_header(&mut self, yes: bool) -> &mut ProcessorBuilder<R> {
        self.first_line_header = yes;
        self
    }

    /// Whether a header read by `read_all` must match the column names.
    ///
    /// Disabled by default. This has no effect unless `first_line_header`
    /// is enabled.
    pub fn validate_header(&mut self, yes: bool) -> &mut ProcessorBuilder<R> {
        self.validate_header = yes;
        self
    }

    /// The function that creates a fresh record for every parsed line.
    pub fn factory<F>(&mut self, factory: F) -> &mut ProcessorBuilder<R>
    where
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(move || Ok::<R, String>(factory())));
        self
    }

    /// Like `factory`, but creating a record may fail. A failure is
    /// reported as an internal error for the line being parsed.
    pub fn try_factory<F, E>(&mut self, factory: F) -> &mut ProcessorBuilder<R>
    where
        F: Fn() -> result::Result<R, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        self.factory =
            Some(Arc::new(move || factory().map_err(|err| err.to_string())));
        self
    }
}

/// Converts between lines of delimited text and records of type `R`.
///
/// A processor is immutable once built. Every method takes `&self`, and a
/// processor can be shared between threads as long as its columns can.
/// Each line is processed independently: a failure never affects any other
/// line.
pub struct Processor<R> {
    columns: Vec<FieldDescriptor<R>>,
    registry: ConverterRegistry,
    rdr: Reader,
    wtr: Writer,
    allow_partial_lines: bool,
    first_line_header: bool,
    validate_header: bool,
    factory: Option<Factory<R>>,
}

impl<R: Default + 'static> Processor<R> {
    /// Create a builder that uses `R::default` as the record factory.
    pub fn builder() -> ProcessorBuilder<R> {
        let mut builder = ProcessorBuilder::new();
        builder.factory(R::default);
        builder
    }
}

impl<R> fmt::Debug for Processor<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Processor")
            .field("columns", &self.columns)
            .field("registry", &self.registry)
            .field("separator", &char::from(self.rdr.delimiter()))
            .field("quote", &char::from(self.rdr.quote()))
            .field("terminator", &self.rdr.terminator())
            .field("allow_partial_lines", &self.allow_partial_lines)
            .field("first_line_header", &self.first_line_header)
            .field("validate_header", &self.validate_header)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

impl<R> Processor<R> {
    /// Parse a line into a new record, as line number 1.
    ///
    /// This requires a record factory. A trailing line terminator is
    /// ignored.
    pub fn parse_line(&self, line: &str) -> Result<R> {
        self.parse_line_at(1, line)
    }

    /// Parse a line into a new record, reporting `line_number` in any
    /// error.
    pub fn parse_line_at(&self, line_number: u64, line: &str) -> Result<R> {
        let factory = self.factory.as_ref().ok_or_else(|| Error::State {
            column: None,
            message: "no record factory configured".to_string(),
        })?;
        let mut record = factory().map_err(|msg| {
            ParseError::new(
                ParseErrorKind::InternalError,
                format!("could not create record: {}", msg),
                line_number,
                0,
            )
        })?;
        self.parse_line_into(line_number, line, &mut record)?;
        Ok(record)
    }

    /// Decode a line into an existing record.
    ///
    /// Cells that decode to nothing (e.g. empty cells), and columns past
    /// the end of a partial line, leave the record's values untouched. On
    /// failure, the record may have been partially updated.
    pub fn parse_line_into(
        &self,
        line_number: u64,
        line: &str,
        record: &mut R,
    ) -> result::Result<(), ParseError> {
        let result = self.decode_line(line_number, line, record);
        if let Err(ref err) = result {
            trace!(
                line = line_number,
                offset = err.offset(),
                kind = %err.kind(),
                "could not parse line"
            );
        }
        result
    }

    fn decode_line(
        &self,
        line_number: u64,
        line: &str,
        record: &mut R,
    ) -> result::Result<(), ParseError> {
        let line = self.rdr.strip_terminator(line);
        let mut pos = 0;
        let mut exhausted = false;
        for (i, col) in self.columns.iter().enumerate() {
            if exhausted {
                if self.allow_partial_lines {
                    return Ok(());
                }
                return Err(ParseError::new(
                    ParseErrorKind::InsufficientColumns,
                    format!(
                        "expected {} columns but the line has {}",
                        self.columns.len(),
                        i
                    ),
                    line_number,
                    line.len(),
                )
                .at_column(i));
            }
            let field = self
                .rdr
                .read_field(line, pos)
                .map_err(|err| read_error(err, line_number, i))?;
            pos = field.end();
            exhausted = field.is_record_end();
            self.decode_cell(col, i, field.start(), field.text(), line_number, record)?;
        }
        if pos < line.len() {
            return Err(ParseError::new(
                ParseErrorKind::ExtraData,
                format!(
                    "unexpected data after the last of {} columns",
                    self.columns.len()
                ),
                line_number,
                pos,
            ));
        }
        Ok(())
    }

    fn decode_cell(
        &self,
        col: &FieldDescriptor<R>,
        index: usize,
        offset: usize,
        cell: &str,
        line_number: u64,
        record: &mut R,
    ) -> result::Result<(), ParseError> {
        let mut cell = if col.is_trim_input() { cell.trim() } else { cell };
        if cell.is_empty() {
            if let Some(default) = col.default_value() {
                cell = default;
            }
        }
        if cell.is_empty() && col.is_required() {
            return Err(ParseError::new(
                ParseErrorKind::RequiredValue,
                format!("column {} requires a value", col.name()),
                line_number,
                offset,
            )
            .at_column(index));
        }
        col.decode_into(cell, record).map_err(|err| {
            let kind = match err.kind() {
                DecodeErrorKind::InvalidFormat => ParseErrorKind::InvalidFormat,
                DecodeErrorKind::Internal => ParseErrorKind::InternalError,
            };
            ParseError::new(
                kind,
                format!("column {}: {}", col.name(), err),
                line_number,
                offset,
            )
            .at_column(index)
        })
    }

    /// Write a record as a line, optionally followed by the terminator.
    ///
    /// This fails only when a value cannot be read from the record.
    pub fn write_line(&self, record: &R, append_terminator: bool) -> Result<String> {
        let mut out = String::new();
        self.write_line_into(record, append_terminator, &mut out)?;
        Ok(out)
    }

    /// Like `write_line`, but appends the line to `out`.
    ///
    /// If writing fails, `out` may have been partially extended.
    pub fn write_line_into(
        &self,
        record: &R,
        append_terminator: bool,
        out: &mut String,
    ) -> Result<()> {
        let mut cell = String::new();
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                self.wtr.write_delimiter(out);
            }
            cell.clear();
            col.encode_from(record, &mut cell).map_err(|err| Error::State {
                column: Some(col.name().to_string()),
                message: err.to_string(),
            })?;
            self.wtr.write_field(&cell, col.is_must_be_quoted(), out);
        }
        if append_terminator {
            self.wtr.write_terminator(out);
        }
        Ok(())
    }

    /// Split a header line into column names.
    ///
    /// Every cell is taken as plain text. Nothing is decoded.
    pub fn parse_header(&self, line: &str) -> result::Result<Vec<String>, ParseError> {
        self.parse_header_at(1, line)
    }

    pub(crate) fn parse_header_at(
        &self,
        line_number: u64,
        line: &str,
    ) -> result::Result<Vec<String>, ParseError> {
        self.rdr
            .fields(self.rdr.strip_terminator(line))
            .enumerate()
            .map(|(i, field)| {
                field
                    .map(|f| f.into_text().into_owned())
                    .map_err(|err| read_error(err, line_number, i))
            })
            .collect()
    }

    /// Check that a header line names exactly the configured columns, in
    /// order.
    pub fn validate_header(&self, line: &str) -> result::Result<(), ParseError> {
        self.validate_header_at(1, line)
    }

    pub(crate) fn validate_header_at(
        &self,
        line_number: u64,
        line: &str,
    ) -> result::Result<(), ParseError> {
        let names = self.parse_header_at(line_number, line)?;
        let matches = names.len() == self.columns.len()
            && names.iter().zip(&self.columns).all(|(n, c)| n == c.name());
        if matches {
            return Ok(());
        }
        let expected: Vec<&str> = self.columns.iter().map(|c| c.name()).collect();
        Err(ParseError::new(
            ParseErrorKind::InvalidHeader,
            format!("expected header {:?}, found {:?}", expected, names),
            line_number,
            0,
        ))
    }

    /// Write the column names as a line, optionally followed by the
    /// terminator.
    pub fn write_header(&self, append_terminator: bool) -> String {
        let mut out = String::new();
        self.wtr.write_record(self.columns.iter().map(|c| c.name()), &mut out);
        if append_terminator {
            self.wtr.write_terminator(&mut out);
        }
        out
    }

    /// The bound columns, in line order.
    pub fn columns(&self) -> &[FieldDescriptor<R>] {
        &self.columns
    }

    /// The converters this processor was built with.
    pub fn converters(&self) -> &ConverterRegistry {
        &self.registry
    }

    /// The separator between cells.
    pub fn separator(&self) -> u8 {
        self.rdr.delimiter()
    }

    /// The quote character.
    pub fn quote(&self) -> u8 {
        self.rdr.quote()
    }

    /// The line terminator.
    pub fn terminator(&self) -> Terminator {
        self.rdr.terminator()
    }

    /// Whether lines with fewer cells than columns are accepted.
    pub fn is_allow_partial_lines(&self) -> bool {
        self.allow_partial_lines
    }

    /// Whether `read_all` treats the first line as a header.
    pub fn is_first_line_header(&self) -> bool {
        self.first_line_header
    }

    /// Whether `read_all` checks the header against the column names.
    pub fn is_validate_header(&self) -> bool {
        self.validate_header
    }
}

fn read_error(err: ReadError, line_number: u64, column: usize) -> ParseError {
    let kind = match *err.kind() {
        ReadErrorKind::UnclosedQuote => ParseErrorKind::TruncatedValue,
        ReadErrorKind::CharAfterQuote(_) => ParseErrorKind::InvalidFormat,
    };
    ParseError::new(kind, err.to_string(), line_number, err.offset())
        .at_column(column)
}
