use std::any;
use std::fmt;
use std::sync::Arc;

use crate::converter::{
    erase, Codec, Configure, Converter, ConverterRegistry, FieldMeta,
};
use crate::error::{AccessError, ConfigError, ConfigErrorKind, DecodeError};

/// Reads and writes one field of a record of type `R`.
///
/// Most columns never need to implement this directly:
/// [`Column::new`](struct.Column.html#method.new) and
/// [`Column::optional`](struct.Column.html#method.optional) adapt a pair of
/// closures. Implement it when reading or writing the field can fail, e.g.
/// when records are backed by a map.
pub trait FieldAccess<R, T>: Send + Sync + 'static {
    /// Borrow the field's value. `Ok(None)` means the value is missing and
    /// is written as an empty cell.
    fn get<'r>(&self, record: &'r R) -> Result<Option<&'r T>, AccessError>;

    /// Store a decoded value into the field.
    fn set(&self, record: &mut R, value: T) -> Result<(), AccessError>;
}

struct Plain<G, S> {
    get: G,
    set: S,
}

impl<R, T, G, S> FieldAccess<R, T> for Plain<G, S>
where
    G: Fn(&R) -> &T + Send + Sync + 'static,
    S: Fn(&mut R, T) + Send + Sync + 'static,
{
    fn get<'r>(&self, record: &'r R) -> Result<Option<&'r T>, AccessError> {
        Ok(Some((self.get)(record)))
    }

    fn set(&self, record: &mut R, value: T) -> Result<(), AccessError> {
        (self.set)(record, value);
        Ok(())
    }
}

struct Optional<G, S> {
    get: G,
    set: S,
}

impl<R, T, G, S> FieldAccess<R, T> for Optional<G, S>
where
    G: Fn(&R) -> Option<&T> + Send + Sync + 'static,
    S: Fn(&mut R, T) + Send + Sync + 'static,
{
    fn get<'r>(&self, record: &'r R) -> Result<Option<&'r T>, AccessError> {
        Ok((self.get)(record))
    }

    fn set(&self, record: &mut R, value: T) -> Result<(), AccessError> {
        (self.set)(record, value);
        Ok(())
    }
}

/// The definition of one column of a record type `R`, holding values of
/// type `T`.
///
/// Columns are added to a
/// [`ProcessorBuilder`](struct.ProcessorBuilder.html) in the order in which
/// they appear in a line. When the processor is built, each column is bound
/// to a converter and becomes an immutable
/// [`FieldDescriptor`](struct.FieldDescriptor.html).
///
/// # Example
///
/// ```
/// use csvrow::{BoolConverter, Column};
///
/// #[derive(Default)]
/// struct Account {
///     id: u64,
///     owner: Option<String>,
///     active: bool,
/// }
///
/// let id = Column::new("id", |a: &Account| &a.id, |a: &mut Account, v| a.id = v)
///     .required(true);
/// let owner = Column::optional(
///     "owner",
///     |a: &Account| a.owner.as_ref(),
///     |a: &mut Account, v| a.owner = Some(v),
/// );
/// let active =
///     Column::new("active", |a: &Account| &a.active, |a: &mut Account, v| a.active = v)
///         .format("Y,N")
///         .flags(BoolConverter::PARSE_ERROR_ON_INVALID_VALUE)
///         .default_value("N");
/// ```
pub struct Column<R, T> {
    name: String,
    access: Arc<dyn FieldAccess<R, T>>,
    converter: Option<Arc<dyn Configure<T>>>,
    format: Option<String>,
    flags: u64,
    required: bool,
    default_value: Option<String>,
    trim_input: bool,
    must_be_quoted: bool,
}

impl<R: 'static, T: 'static> Column<R, T> {
    /// A column for a field that always holds a value.
    pub fn new<G, S>(name: &str, get: G, set: S) -> Column<R, T>
    where
        G: Fn(&R) -> &T + Send + Sync + 'static,
        S: Fn(&mut R, T) + Send + Sync + 'static,
    {
        Column::with_access(name, Plain { get, set })
    }

    /// A column for a field whose value may be missing. Missing values are
    /// written as empty cells.
    pub fn optional<G, S>(name: &str, get: G, set: S) -> Column<R, T>
    where
        G: Fn(&R) -> Option<&T> + Send + Sync + 'static,
        S: Fn(&mut R, T) + Send + Sync + 'static,
    {
        Column::with_access(name, Optional { get, set })
    }

    /// A column using a custom accessor.
    pub fn with_access<A>(name: &str, access: A) -> Column<R, T>
    where
        A: FieldAccess<R, T>,
    {
        Column {
            name: name.to_string(),
            access: Arc::new(access),
            converter: None,
            format: None,
            flags: 0,
            required: false,
            default_value: None,
            trim_input: false,
            must_be_quoted: false,
        }
    }

    /// The format string handed to the converter's `configure`.
    pub fn format(mut self, format: &str) -> Column<R, T> {
        self.format = Some(format.to_string());
        self
    }

    /// The flags handed to the converter's `configure`.
    pub fn flags(mut self, flags: u64) -> Column<R, T> {
        self.flags = flags;
        self
    }

    /// Whether an empty cell is an error when no default is set.
    ///
    /// Disabled by default.
    pub fn required(mut self, yes: bool) -> Column<R, T> {
        self.required = yes;
        self
    }

    /// Text to decode in place of an empty cell.
    pub fn default_value(mut self, value: &str) -> Column<R, T> {
        self.default_value = Some(value.to_string());
        self
    }

    /// Whether to trim surrounding whitespace from cells before decoding.
    ///
    /// Disabled by default, although some converters always trim.
    pub fn trim_input(mut self, yes: bool) -> Column<R, T> {
        self.trim_input = yes;
        self
    }

    /// Whether to always quote this column's cells when writing.
    ///
    /// Disabled by default, although some converters ask for quotes.
    pub fn must_be_quoted(mut self, yes: bool) -> Column<R, T> {
        self.must_be_quoted = yes;
        self
    }

    /// Use `converter` for this column instead of the one registered for
    /// `T`.
    pub fn converter<C: Converter<T>>(mut self, converter: C) -> Column<R, T> {
        self.converter = Some(erase::<T, C>(converter));
        self
    }
}

impl<R, T> fmt::Debug for Column<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("type", &any::type_name::<T>())
            .field("format", &self.format)
            .field("flags", &self.flags)
            .field("required", &self.required)
            .field("default_value", &self.default_value)
            .field("trim_input", &self.trim_input)
            .field("must_be_quoted", &self.must_be_quoted)
            .finish()
    }
}

/// A column that has not been bound to a converter yet, with its value type
/// erased.
pub(crate) trait PendingColumn<R>: Send + Sync {
    fn name(&self) -> &str;

    fn bind(
        &self,
        index: usize,
        registry: &ConverterRegistry,
        always_trim_input: bool,
    ) -> Result<FieldDescriptor<R>, ConfigError>;
}

impl<R: 'static, T: 'static> PendingColumn<R> for Column<R, T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind(
        &self,
        index: usize,
        registry: &ConverterRegistry,
        always_trim_input: bool,
    ) -> Result<FieldDescriptor<R>, ConfigError> {
        let type_name = any::type_name::<T>();
        let converter = match self.converter {
            Some(ref converter) => Arc::clone(converter),
            None => registry.get::<T>().ok_or_else(|| {
                ConfigError::new(ConfigErrorKind::NoConverter { type_name })
                    .for_column(&self.name)
            })?,
        };
        let meta = FieldMeta { name: &self.name, type_name, index };
        let codec = converter
            .configure(self.format.as_deref(), self.flags, &meta)
            .map_err(|err| err.for_column(&self.name))?;
        Ok(FieldDescriptor {
            name: self.name.clone(),
            type_name,
            format: self.format.clone(),
            flags: self.flags,
            required: self.required,
            default_value: self.default_value.clone(),
            trim_input: self.trim_input
                || always_trim_input
                || codec.always_trim_input(),
            must_be_quoted: self.must_be_quoted || codec.needs_quotes(),
            binding: Box::new(Bound { codec, access: Arc::clone(&self.access) }),
        })
    }
}

/// A column's converter and accessor, with the value type erased.
trait Binding<R>: Send + Sync {
    fn decode_into(&self, cell: &str, record: &mut R) -> Result<(), DecodeError>;
    fn encode_from(&self, record: &R, out: &mut String) -> Result<(), AccessError>;
}

struct Bound<R, T> {
    codec: Box<dyn Codec<T>>,
    access: Arc<dyn FieldAccess<R, T>>,
}

impl<R: 'static, T: 'static> Binding<R> for Bound<R, T> {
    fn decode_into(&self, cell: &str, record: &mut R) -> Result<(), DecodeError> {
        match self.codec.decode(cell)? {
            None => Ok(()),
            Some(value) => self.access.set(record, value).map_err(|err| {
                DecodeError::internal(format!("could not set field: {}", err))
            }),
        }
    }

    fn encode_from(&self, record: &R, out: &mut String) -> Result<(), AccessError> {
        if let Some(value) = self.access.get(record)? {
            self.codec.encode(value, out);
        }
        Ok(())
    }
}

/// The immutable, fully configured form of a column.
///
/// Descriptors are created when a processor is built. Their order is the
/// column order for both reading and writing, and never changes for the
/// lifetime of the processor.
pub struct FieldDescriptor<R> {
    name: String,
    type_name: &'static str,
    format: Option<String>,
    flags: u64,
    required: bool,
    default_value: Option<String>,
    trim_input: bool,
    must_be_quoted: bool,
    binding: Box<dyn Binding<R>>,
}

impl<R> FieldDescriptor<R> {
    /// The column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name of the declared value type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The format string given to the converter, if any.
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// The flags given to the converter.
    pub fn flags(&self) -> u64 {
        self.flags
    }

    /// Whether an empty cell without a default is an error.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The text substituted for an empty cell, if any.
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Whether cells are trimmed before decoding. This accounts for the
    /// column, the processor and the converter.
    pub fn is_trim_input(&self) -> bool {
        self.trim_input
    }

    /// Whether cells are always quoted when written. This accounts for the
    /// column and the converter.
    pub fn is_must_be_quoted(&self) -> bool {
        self.must_be_quoted
    }

    pub(crate) fn decode_into(
        &self,
        cell: &str,
        record: &mut R,
    ) -> Result<(), DecodeError> {
        self.binding.decode_into(cell, record)
    }

    pub(crate) fn encode_from(
        &self,
        record: &R,
        out: &mut String,
    ) -> Result<(), AccessError> {
        self.binding.encode_from(record, out)
    }
}

impl<R> fmt::Debug for FieldDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("format", &self.format)
            .field("flags", &self.flags)
            .field("required", &self.required)
            .field("default_value", &self.default_value)
            .field("trim_input", &self.trim_input)
            .field("must_be_quoted", &self.must_be_quoted)
            .finish()
    }
}
