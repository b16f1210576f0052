use std::char;
use std::error;
use std::fmt;
use std::io;
use std::num;
use std::result;
use std::str;

use csvrow_core::DialectError;

/// A type alias for `Result<T, csvrow::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when building a processor or when processing
/// lines with it.
#[derive(Debug)]
pub enum Error {
    /// An I/O error that occurred while reading or writing a line stream.
    Io(io::Error),
    /// The processor could not be built from its configuration.
    Config(ConfigError),
    /// A line could not be turned into a record.
    Parse(ParseError),
    /// A record could not be read or created outside of parsing, e.g. a
    /// column value could not be fetched while writing, or no record
    /// factory was configured.
    State {
        /// The column involved, if any.
        column: Option<String>,
        /// A description of what went wrong.
        message: String,
    },
}

impl Error {
    /// Returns the parse error, if this is one.
    pub fn parse_error(&self) -> Option<&ParseError> {
        match *self {
            Error::Parse(ref err) => Some(err),
            _ => None,
        }
    }

    /// Returns the kind of the parse error, if this is one.
    pub fn parse_kind(&self) -> Option<ParseErrorKind> {
        self.parse_error().map(|err| err.kind())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Error {
        Error::Config(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::Config(ref err) => Some(err),
            Error::Parse(ref err) => Some(err),
            Error::State { .. } => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref err) => err.fmt(f),
            Error::Config(ref err) => err.fmt(f),
            Error::Parse(ref err) => err.fmt(f),
            Error::State { column: None, ref message } => {
                write!(f, "record state error: {}", message)
            }
            Error::State { column: Some(ref column), ref message } => {
                write!(f, "record state error: column {}: {}", column, message)
            }
        }
    }
}

/// The kind of a [`ParseError`](struct.ParseError.html).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParseErrorKind {
    /// A quoted cell was never closed.
    TruncatedValue,
    /// A closing quote was followed by something other than a separator, or
    /// a converter rejected the cell text.
    InvalidFormat,
    /// A required cell was empty and the column has no default.
    RequiredValue,
    /// A converter, accessor or record factory failed unexpectedly.
    InternalError,
    /// A header line was expected but the input was empty.
    NoHeader,
    /// The header line does not match the configured columns.
    InvalidHeader,
    /// The line has fewer cells than there are columns.
    InsufficientColumns,
    /// The line has text past the last column.
    ExtraData,
}

impl ParseErrorKind {
    fn description(&self) -> &'static str {
        match *self {
            ParseErrorKind::TruncatedValue => "truncated value",
            ParseErrorKind::InvalidFormat => "invalid format",
            ParseErrorKind::RequiredValue => "required value",
            ParseErrorKind::InternalError => "internal error",
            ParseErrorKind::NoHeader => "no header",
            ParseErrorKind::InvalidHeader => "invalid header",
            ParseErrorKind::InsufficientColumns => "insufficient columns",
            ParseErrorKind::ExtraData => "extra data",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// An error describing why a single line could not be parsed.
///
/// A parse error never affects anything beyond the line it was raised for.
/// Callers processing many lines may collect these and carry on, or stop at
/// the first one.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParseError {
    kind: ParseErrorKind,
    message: String,
    line: u64,
    offset: usize,
    column: Option<usize>,
}

impl ParseError {
    pub(crate) fn new<S: Into<String>>(
        kind: ParseErrorKind,
        message: S,
        line: u64,
        offset: usize,
    ) -> ParseError {
        ParseError { kind, message: message.into(), line, offset, column: None }
    }

    pub(crate) fn at_column(mut self, column: usize) -> ParseError {
        self.column = Some(column);
        self
    }

    /// The kind of this error.
    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// A human readable description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The line number that was being parsed, starting at 1.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// The approximate byte offset within the line at which the failure
    /// was detected.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The index (starting at 0) of the column being decoded, if the
    /// failure is tied to one.
    pub fn column(&self) -> Option<usize> {
        self.column
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.column {
            None => write!(
                f,
                "parse error: line {} (byte {}): {}: {}",
                self.line, self.offset, self.kind, self.message
            ),
            Some(column) => write!(
                f,
                "parse error: line {} (byte {}, column {}): {}: {}",
                self.line, self.offset, column, self.kind, self.message
            ),
        }
    }
}

impl error::Error for ParseError {}

/// An error raised while building a processor.
///
/// These are configuration errors: they are raised once, before any line
/// is processed, and never while parsing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigError {
    column: Option<String>,
    kind: ConfigErrorKind,
}

/// The kind of a [`ConfigError`](struct.ConfigError.html).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigErrorKind {
    /// No columns were configured.
    NoColumns,
    /// No converter is registered for the declared type of a column.
    NoConverter {
        /// The name of the declared type.
        type_name: &'static str,
    },
    /// A converter rejected its format string or flags.
    InvalidFormat(String),
    /// The separator, quote or terminator is unusable.
    Dialect(DialectError),
}

impl ConfigError {
    /// Create an error for a malformed converter format.
    ///
    /// This is meant to be returned from
    /// [`Converter::configure`](trait.Converter.html#tymethod.configure).
    pub fn invalid_format<S: Into<String>>(message: S) -> ConfigError {
        ConfigError {
            column: None,
            kind: ConfigErrorKind::InvalidFormat(message.into()),
        }
    }

    pub(crate) fn new(kind: ConfigErrorKind) -> ConfigError {
        ConfigError { column: None, kind }
    }

    pub(crate) fn for_column(mut self, column: &str) -> ConfigError {
        if self.column.is_none() {
            self.column = Some(column.to_string());
        }
        self
    }

    /// The column being configured when this error occurred, if any.
    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    /// The kind of this error.
    pub fn kind(&self) -> &ConfigErrorKind {
        &self.kind
    }
}

impl From<DialectError> for ConfigError {
    fn from(err: DialectError) -> ConfigError {
        ConfigError::new(ConfigErrorKind::Dialect(err))
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "configuration error: ")?;
        if let Some(ref column) = self.column {
            write!(f, "column {}: ", column)?;
        }
        match self.kind {
            ConfigErrorKind::NoColumns => write!(f, "no columns configured"),
            ConfigErrorKind::NoConverter { type_name } => {
                write!(f, "no converter registered for type {}", type_name)
            }
            ConfigErrorKind::InvalidFormat(ref msg) => write!(f, "{}", msg),
            ConfigErrorKind::Dialect(ref err) => err.fmt(f),
        }
    }
}

impl error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.kind {
            ConfigErrorKind::Dialect(ref err) => Some(err),
            _ => None,
        }
    }
}

/// An error returned by a converter that could not decode a cell.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodeError {
    kind: DecodeErrorKind,
    message: String,
}

/// The kind of a [`DecodeError`](struct.DecodeError.html).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecodeErrorKind {
    /// The cell text is not a valid representation of the value. This
    /// becomes a `ParseErrorKind::InvalidFormat`.
    InvalidFormat,
    /// The converter failed for reasons unrelated to the cell text. This
    /// becomes a `ParseErrorKind::InternalError`.
    Internal,
}

impl DecodeError {
    /// The cell text is not a valid value.
    pub fn invalid<S: Into<String>>(message: S) -> DecodeError {
        DecodeError { kind: DecodeErrorKind::InvalidFormat, message: message.into() }
    }

    /// The converter failed unexpectedly.
    pub fn internal<S: Into<String>>(message: S) -> DecodeError {
        DecodeError { kind: DecodeErrorKind::Internal, message: message.into() }
    }

    /// The kind of this error.
    pub fn kind(&self) -> DecodeErrorKind {
        self.kind
    }

    /// A description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl error::Error for DecodeError {}

macro_rules! invalid_from {
    ($err:ty) => {
        impl From<$err> for DecodeError {
            fn from(err: $err) -> DecodeError {
                DecodeError::invalid(err.to_string())
            }
        }
    };
}

invalid_from!(num::ParseIntError);
invalid_from!(num::ParseFloatError);
invalid_from!(str::ParseBoolError);
invalid_from!(char::ParseCharError);

/// An error returned by a [`FieldAccess`](trait.FieldAccess.html) that could
/// not read or write a record's field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccessError {
    message: String,
}

impl AccessError {
    /// Create a new access error.
    pub fn new<S: Into<String>>(message: S) -> AccessError {
        AccessError { message: message.into() }
    }

    /// A description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl error::Error for AccessError {}
