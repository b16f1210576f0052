use std::any::{self, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::converters;
use crate::error::{ConfigError, DecodeError};

/// A codec between the text of a cell and a value of type `T`.
///
/// A converter is stateless apart from its `Config`, which is computed once
/// per column by `configure` when a processor is built and then handed back
/// on every call. Converters must not keep mutable state of their own, since
/// a processor may be used from several threads at once.
///
/// # Example
///
/// A converter that stores percentages as fractions:
///
/// ```
/// use csvrow::{ConfigError, Converter, DecodeError, FieldMeta};
///
/// struct Percent;
///
/// impl Converter<f64> for Percent {
///     type Config = ();
///
///     fn configure(
///         &self,
///         format: Option<&str>,
///         _flags: u64,
///         _meta: &FieldMeta,
///     ) -> Result<(), ConfigError> {
///         match format {
///             None => Ok(()),
///             Some(_) => Err(ConfigError::invalid_format("no format allowed")),
///         }
///     }
///
///     fn decode(&self, _: &(), cell: &str) -> Result<Option<f64>, DecodeError> {
///         let digits = cell.trim_end_matches('%');
///         Ok(Some(digits.parse::<f64>()? / 100.0))
///     }
///
///     fn encode(&self, _: &(), value: &f64, out: &mut String) {
///         out.push_str(&format!("{}%", value * 100.0));
///     }
///
///     fn needs_quotes(&self, _: &()) -> bool {
///         false
///     }
/// }
/// ```
pub trait Converter<T>: Send + Sync + 'static {
    /// Per-column configuration derived from the format string and flags.
    type Config: Send + Sync + 'static;

    /// Build the configuration for one column.
    ///
    /// `format` and `flags` come from the column definition. A malformed
    /// format should be reported with
    /// [`ConfigError::invalid_format`](struct.ConfigError.html#method.invalid_format).
    fn configure(
        &self,
        format: Option<&str>,
        flags: u64,
        meta: &FieldMeta,
    ) -> Result<Self::Config, ConfigError>;

    /// Decode a cell.
    ///
    /// The cell has already been unquoted, trimmed (if requested) and had
    /// the column default substituted when empty. Returning `Ok(None)`
    /// leaves the record's existing value untouched.
    fn decode(
        &self,
        config: &Self::Config,
        cell: &str,
    ) -> Result<Option<T>, DecodeError>;

    /// Append the textual form of `value` to `out`.
    ///
    /// Missing values never reach the converter: they are written as empty
    /// cells.
    fn encode(&self, config: &Self::Config, value: &T, out: &mut String);

    /// Whether cells written by this converter should always be quoted.
    ///
    /// This is a static hint. Cells containing a quote, the separator or a
    /// control character are quoted regardless.
    fn needs_quotes(&self, _config: &Self::Config) -> bool {
        true
    }

    /// Whether cells should be trimmed of surrounding whitespace before
    /// they are decoded.
    fn always_trim_input(&self) -> bool {
        false
    }
}

/// Metadata about the column a converter is being configured for.
#[derive(Clone, Copy, Debug)]
pub struct FieldMeta<'a> {
    pub(crate) name: &'a str,
    pub(crate) type_name: &'static str,
    pub(crate) index: usize,
}

impl<'a> FieldMeta<'a> {
    /// The column name.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// The name of the declared value type of the column.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The position of the column, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A converter paired with the configuration of one column.
pub(crate) trait Codec<T>: Send + Sync {
    fn decode(&self, cell: &str) -> Result<Option<T>, DecodeError>;
    fn encode(&self, value: &T, out: &mut String);
    fn needs_quotes(&self) -> bool;
    fn always_trim_input(&self) -> bool;
}

/// A converter that has not been configured for a column yet.
pub(crate) trait Configure<T>: Send + Sync {
    fn configure(
        &self,
        format: Option<&str>,
        flags: u64,
        meta: &FieldMeta,
    ) -> Result<Box<dyn Codec<T>>, ConfigError>;
}

struct Configured<C: Converter<T>, T> {
    converter: Arc<C>,
    config: C::Config,
    _value: PhantomData<fn() -> T>,
}

impl<C: Converter<T>, T> Codec<T> for Configured<C, T> {
    fn decode(&self, cell: &str) -> Result<Option<T>, DecodeError> {
        self.converter.decode(&self.config, cell)
    }

    fn encode(&self, value: &T, out: &mut String) {
        self.converter.encode(&self.config, value, out)
    }

    fn needs_quotes(&self) -> bool {
        self.converter.needs_quotes(&self.config)
    }

    fn always_trim_input(&self) -> bool {
        self.converter.always_trim_input()
    }
}

impl<C: Converter<T>, T: 'static> Configure<T> for Arc<C> {
    fn configure(
        &self,
        format: Option<&str>,
        flags: u64,
        meta: &FieldMeta,
    ) -> Result<Box<dyn Codec<T>>, ConfigError> {
        let config =
            <C as Converter<T>>::configure(&**self, format, flags, meta)?;
        Ok(Box::new(Configured::<C, T> {
            converter: Arc::clone(self),
            config,
            _value: PhantomData,
        }))
    }
}

/// Erase a converter so that it can be stored by value type.
pub(crate) fn erase<T, C>(converter: C) -> Arc<dyn Configure<T>>
where
    T: 'static,
    C: Converter<T>,
{
    Arc::new(Arc::new(converter))
}

/// A map from declared value type to the converter used for columns of that
/// type.
///
/// `ConverterRegistry::new` starts out with the built-in converters for
/// `String`, `bool`, `char` and the primitive numeric types. Registering a
/// converter for a type replaces whatever was registered before it.
///
/// A processor takes a copy of its builder's registry when it is built, so
/// changes to a registry never affect processors that already exist.
#[derive(Clone)]
pub struct ConverterRegistry {
    converters: HashMap<TypeId, Entry>,
}

#[derive(Clone)]
struct Entry {
    type_name: &'static str,
    /// Always an `Arc<dyn Configure<T>>` for the `T` of the key.
    converter: Arc<dyn Any + Send + Sync>,
}

impl Default for ConverterRegistry {
    fn default() -> ConverterRegistry {
        ConverterRegistry::new()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut names: Vec<&str> =
            self.converters.values().map(|e| e.type_name).collect();
        names.sort();
        f.debug_struct("ConverterRegistry").field("types", &names).finish()
    }
}

impl ConverterRegistry {
    /// Create a registry holding the built-in converters.
    pub fn new() -> ConverterRegistry {
        let mut registry = ConverterRegistry::empty();
        converters::register_builtins(&mut registry);
        registry
    }

    /// Create a registry without any converters.
    pub fn empty() -> ConverterRegistry {
        ConverterRegistry { converters: HashMap::new() }
    }

    /// Use `converter` for every column whose declared type is `T` and that
    /// does not name a converter of its own.
    pub fn register<T, C>(&mut self, converter: C) -> &mut ConverterRegistry
    where
        T: 'static,
        C: Converter<T>,
    {
        let entry = Entry {
            type_name: any::type_name::<T>(),
            converter: Arc::new(erase::<T, C>(converter)),
        };
        self.converters.insert(TypeId::of::<T>(), entry);
        self
    }

    /// Whether a converter is registered for `T`.
    pub fn contains<T: 'static>(&self) -> bool {
        self.converters.contains_key(&TypeId::of::<T>())
    }

    /// The number of registered types.
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    /// Whether no converter is registered.
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    pub(crate) fn get<T: 'static>(&self) -> Option<Arc<dyn Configure<T>>> {
        let entry = self.converters.get(&TypeId::of::<T>())?;
        (*entry.converter)
            .downcast_ref::<Arc<dyn Configure<T>>>()
            .map(Arc::clone)
    }
}
