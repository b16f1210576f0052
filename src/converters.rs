/*!
The built-in converters.

Every converter here is registered by `ConverterRegistry::new`, except
`FromStrConverter`, which has to be attached to a column explicitly.

Empty cells never produce a value: every built-in converter leaves the
record's existing value untouched when given an empty cell.
*/

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use crate::converter::{Converter, ConverterRegistry, FieldMeta};
use crate::error::{ConfigError, DecodeError};

pub(crate) fn register_builtins(registry: &mut ConverterRegistry) {
    registry
        .register::<String, _>(StringConverter)
        .register::<bool, _>(BoolConverter)
        .register::<char, _>(CharConverter)
        .register::<i8, _>(IntegerConverter)
        .register::<i16, _>(IntegerConverter)
        .register::<i32, _>(IntegerConverter)
        .register::<i64, _>(IntegerConverter)
        .register::<isize, _>(IntegerConverter)
        .register::<u8, _>(IntegerConverter)
        .register::<u16, _>(IntegerConverter)
        .register::<u32, _>(IntegerConverter)
        .register::<u64, _>(IntegerConverter)
        .register::<usize, _>(IntegerConverter)
        .register::<f32, _>(FloatConverter)
        .register::<f64, _>(FloatConverter);
}

fn no_format(format: Option<&str>, meta: &FieldMeta) -> Result<(), ConfigError> {
    match format {
        None => Ok(()),
        Some(format) => Err(ConfigError::invalid_format(format!(
            "columns of type {} take no format, got {:?}",
            meta.type_name(),
            format
        ))),
    }
}

/// Converts `String` cells verbatim.
///
/// Strings are always written quoted. An empty cell decodes to no value, so
/// an empty string is written as `""` but reads back as missing.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringConverter;

impl Converter<String> for StringConverter {
    type Config = ();

    fn configure(
        &self,
        format: Option<&str>,
        _flags: u64,
        meta: &FieldMeta,
    ) -> Result<(), ConfigError> {
        no_format(format, meta)
    }

    fn decode(&self, _: &(), cell: &str) -> Result<Option<String>, DecodeError> {
        if cell.is_empty() {
            return Ok(None);
        }
        Ok(Some(cell.to_string()))
    }

    fn encode(&self, _: &(), value: &String, out: &mut String) {
        out.push_str(value);
    }
}

/// Converts `bool` cells.
///
/// The format is `"<true text>,<false text>"`, and defaults to
/// `"true,false"`. A cell matching neither text decodes to `false`, unless
/// the column sets the `PARSE_ERROR_ON_INVALID_VALUE` flag.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoolConverter;

impl BoolConverter {
    /// Flag that turns unrecognized cells into decode errors.
    pub const PARSE_ERROR_ON_INVALID_VALUE: u64 = 1 << 1;
}

/// The configuration of a [`BoolConverter`](struct.BoolConverter.html)
/// column.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BoolConfig {
    true_text: String,
    false_text: String,
    error_on_invalid: bool,
}

impl Converter<bool> for BoolConverter {
    type Config = BoolConfig;

    fn configure(
        &self,
        format: Option<&str>,
        flags: u64,
        _meta: &FieldMeta,
    ) -> Result<BoolConfig, ConfigError> {
        let (true_text, false_text) = match format {
            None => ("true", "false"),
            Some(format) => match format.split_once(',') {
                Some((t, f)) if !t.is_empty() && !f.is_empty() && t != f => {
                    (t, f)
                }
                _ => {
                    return Err(ConfigError::invalid_format(format!(
                        "boolean format must look like \"true,false\" with \
                         two different texts, got {:?}",
                        format
                    )));
                }
            },
        };
        Ok(BoolConfig {
            true_text: true_text.to_string(),
            false_text: false_text.to_string(),
            error_on_invalid: flags & BoolConverter::PARSE_ERROR_ON_INVALID_VALUE
                != 0,
        })
    }

    fn decode(
        &self,
        config: &BoolConfig,
        cell: &str,
    ) -> Result<Option<bool>, DecodeError> {
        if cell.is_empty() {
            Ok(None)
        } else if cell == config.true_text {
            Ok(Some(true))
        } else if cell == config.false_text || !config.error_on_invalid {
            Ok(Some(false))
        } else {
            Err(DecodeError::invalid(format!(
                "{:?} is neither {:?} nor {:?}",
                cell, config.true_text, config.false_text
            )))
        }
    }

    fn encode(&self, config: &BoolConfig, value: &bool, out: &mut String) {
        if *value {
            out.push_str(&config.true_text);
        } else {
            out.push_str(&config.false_text);
        }
    }

    fn needs_quotes(&self, _: &BoolConfig) -> bool {
        false
    }
}

/// Converts `char` cells. A cell must hold exactly one character.
#[derive(Clone, Copy, Debug, Default)]
pub struct CharConverter;

impl Converter<char> for CharConverter {
    type Config = ();

    fn configure(
        &self,
        format: Option<&str>,
        _flags: u64,
        meta: &FieldMeta,
    ) -> Result<(), ConfigError> {
        no_format(format, meta)
    }

    fn decode(&self, _: &(), cell: &str) -> Result<Option<char>, DecodeError> {
        let mut chars = cell.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Ok(None),
            (Some(ch), None) => Ok(Some(ch)),
            (Some(_), Some(_)) => Err(DecodeError::invalid(format!(
                "{:?} is not a single character",
                cell
            ))),
        }
    }

    fn encode(&self, _: &(), value: &char, out: &mut String) {
        out.push(*value);
    }

    fn needs_quotes(&self, _: &()) -> bool {
        false
    }
}

/// Converts the primitive integer types as decimal text.
///
/// Surrounding whitespace is always trimmed before decoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntegerConverter;

macro_rules! integer_converter {
    ($($ty:ty),*) => {$(
        impl Converter<$ty> for IntegerConverter {
            type Config = ();

            fn configure(
                &self,
                format: Option<&str>,
                _flags: u64,
                meta: &FieldMeta,
            ) -> Result<(), ConfigError> {
                no_format(format, meta)
            }

            fn decode(
                &self,
                _: &(),
                cell: &str,
            ) -> Result<Option<$ty>, DecodeError> {
                if cell.is_empty() {
                    return Ok(None);
                }
                cell.parse::<$ty>().map(Some).map_err(|err| {
                    DecodeError::invalid(format!(
                        "{:?} is not a valid {}: {}",
                        cell, stringify!($ty), err
                    ))
                })
            }

            fn encode(&self, _: &(), value: &$ty, out: &mut String) {
                out.push_str(itoa::Buffer::new().format(*value));
            }

            fn needs_quotes(&self, _: &()) -> bool {
                false
            }

            fn always_trim_input(&self) -> bool {
                true
            }
        }
    )*}
}

integer_converter!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Converts `f32` and `f64`.
///
/// Without a format, values are written in their shortest form that reads
/// back to the same value. A format such as `"0.00"` writes a fixed number
/// of decimals instead (two, in this case).
#[derive(Clone, Copy, Debug, Default)]
pub struct FloatConverter;

/// Parses a fixed decimal pattern: `0`, `0.0`, `0.00` and so on.
fn decimal_places(format: &str) -> Result<usize, ConfigError> {
    let decimals = match format.split_once('.') {
        None if format == "0" => return Ok(0),
        Some(("0", decimals)) => decimals,
        _ => "",
    };
    if decimals.is_empty() || decimals.bytes().any(|b| b != b'0') {
        return Err(ConfigError::invalid_format(format!(
            "float format must look like \"0.00\", got {:?}",
            format
        )));
    }
    Ok(decimals.len())
}

macro_rules! float_converter {
    ($($ty:ty),*) => {$(
        impl Converter<$ty> for FloatConverter {
            /// The number of fixed decimals, if any.
            type Config = Option<usize>;

            fn configure(
                &self,
                format: Option<&str>,
                _flags: u64,
                _meta: &FieldMeta,
            ) -> Result<Option<usize>, ConfigError> {
                format.map(decimal_places).transpose()
            }

            fn decode(
                &self,
                _: &Option<usize>,
                cell: &str,
            ) -> Result<Option<$ty>, DecodeError> {
                if cell.is_empty() {
                    return Ok(None);
                }
                cell.parse::<$ty>().map(Some).map_err(|err| {
                    DecodeError::invalid(format!(
                        "{:?} is not a valid {}: {}",
                        cell, stringify!($ty), err
                    ))
                })
            }

            fn encode(
                &self,
                places: &Option<usize>,
                value: &$ty,
                out: &mut String,
            ) {
                match *places {
                    None => out.push_str(ryu::Buffer::new().format(*value)),
                    Some(places) => {
                        out.push_str(&format!("{:.*}", places, value))
                    }
                }
            }

            fn needs_quotes(&self, _: &Option<usize>) -> bool {
                false
            }

            fn always_trim_input(&self) -> bool {
                true
            }
        }
    )*}
}

float_converter!(f32, f64);

/// Converts any type that implements `FromStr` and `Display`.
///
/// This is handy for enums and newtypes. It is not registered by default:
/// attach it to a column with
/// [`Column::converter`](struct.Column.html#method.converter) or register
/// it for the type.
pub struct FromStrConverter<T> {
    _value: PhantomData<fn() -> T>,
}

impl<T> FromStrConverter<T> {
    /// Create a new converter for `T`.
    pub fn new() -> FromStrConverter<T> {
        FromStrConverter { _value: PhantomData }
    }
}

impl<T> Default for FromStrConverter<T> {
    fn default() -> FromStrConverter<T> {
        FromStrConverter::new()
    }
}

impl<T> fmt::Debug for FromStrConverter<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FromStrConverter").finish()
    }
}

impl<T> Converter<T> for FromStrConverter<T>
where
    T: FromStr + fmt::Display + 'static,
    T::Err: fmt::Display,
{
    type Config = ();

    fn configure(
        &self,
        format: Option<&str>,
        _flags: u64,
        meta: &FieldMeta,
    ) -> Result<(), ConfigError> {
        no_format(format, meta)
    }

    fn decode(&self, _: &(), cell: &str) -> Result<Option<T>, DecodeError> {
        if cell.is_empty() {
            return Ok(None);
        }
        cell.parse::<T>()
            .map(Some)
            .map_err(|err| DecodeError::invalid(err.to_string()))
    }

    fn encode(&self, _: &(), value: &T, out: &mut String) {
        out.push_str(&value.to_string());
    }

    fn needs_quotes(&self, _: &()) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::str::FromStr;

    use super::{
        BoolConverter, CharConverter, FloatConverter, FromStrConverter,
        IntegerConverter, StringConverter,
    };
    use crate::converter::{Converter, FieldMeta};
    use crate::error::{ConfigErrorKind, DecodeErrorKind};

    fn meta() -> FieldMeta<'static> {
        FieldMeta { name: "col", type_name: "test", index: 0 }
    }

    fn encode<T, C: Converter<T>>(conv: &C, config: &C::Config, value: &T) -> String {
        let mut out = String::new();
        conv.encode(config, value, &mut out);
        out
    }

    /// Encodes `value` and checks that it decodes back to itself.
    fn round_trip<T, C>(conv: &C, config: &C::Config, value: T)
    where
        T: PartialEq + fmt::Debug,
        C: Converter<T>,
    {
        let text = encode(conv, config, &value);
        assert_eq!(conv.decode(config, &text).unwrap(), Some(value));
    }

    #[test]
    fn bool_defaults() {
        let config = BoolConverter.configure(None, 0, &meta()).unwrap();
        round_trip(&BoolConverter, &config, true);
        round_trip(&BoolConverter, &config, false);
        assert_eq!(BoolConverter.decode(&config, "").unwrap(), None);
        assert!(!BoolConverter.needs_quotes(&config));
    }

    #[test]
    fn bool_custom_format() {
        let config = BoolConverter.configure(Some("1,0"), 0, &meta()).unwrap();
        assert_eq!(encode(&BoolConverter, &config, &true), "1");
        assert_eq!(encode(&BoolConverter, &config, &false), "0");
        round_trip(&BoolConverter, &config, true);
        round_trip(&BoolConverter, &config, false);
    }

    #[test]
    fn bool_bad_formats() {
        assert!(BoolConverter.configure(Some("1"), 0, &meta()).is_err());
        assert!(BoolConverter.configure(Some(",F"), 0, &meta()).is_err());
        assert!(BoolConverter.configure(Some("T,"), 0, &meta()).is_err());
        let err = BoolConverter.configure(Some("x,x"), 0, &meta()).unwrap_err();
        assert!(matches!(*err.kind(), ConfigErrorKind::InvalidFormat(_)));
    }

    #[test]
    fn bool_invalid_value() {
        let config = BoolConverter.configure(None, 0, &meta()).unwrap();
        assert_eq!(BoolConverter.decode(&config, "unknown").unwrap(), Some(false));

        let config = BoolConverter
            .configure(None, BoolConverter::PARSE_ERROR_ON_INVALID_VALUE, &meta())
            .unwrap();
        let err = BoolConverter.decode(&config, "unknown").unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::InvalidFormat);
    }

    #[test]
    fn string_empty_keeps_existing() {
        assert_eq!(StringConverter.decode(&(), "").unwrap(), None);
        assert_eq!(
            StringConverter.decode(&(), " a ").unwrap(),
            Some(" a ".to_string())
        );
        assert!(StringConverter.configure(Some("x"), 0, &meta()).is_err());
        assert!(StringConverter.needs_quotes(&()));
    }

    #[test]
    fn integers() {
        assert_eq!(encode(&IntegerConverter, &(), &-12_i32), "-12");
        assert_eq!(encode(&IntegerConverter, &(), &u64::MAX), "18446744073709551615");
        let got: Option<i64> = IntegerConverter.decode(&(), "12321321321321312").unwrap();
        assert_eq!(got, Some(12321321321321312));
        let got: Option<u8> = IntegerConverter.decode(&(), "").unwrap();
        assert_eq!(got, None);

        let err = Converter::<u8>::decode(&IntegerConverter, &(), "256").unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::InvalidFormat);
        assert!(err.message().contains("u8"));
        assert!(Converter::<i32>::always_trim_input(&IntegerConverter));
        assert!(Converter::<i32>::configure(&IntegerConverter, Some("#"), 0, &meta())
            .is_err());
    }

    #[test]
    fn floats() {
        round_trip(&FloatConverter, &None, 0.1_f64);
        round_trip(&FloatConverter, &None, -3.5e300_f64);
        round_trip(&FloatConverter, &None, 1.25_f32);

        let places: Option<usize> =
            Converter::<f64>::configure(&FloatConverter, Some("0.00"), 0, &meta())
                .unwrap();
        assert_eq!(places, Some(2));
        assert_eq!(encode(&FloatConverter, &places, &3.14159_f64), "3.14");

        let places: Option<usize> =
            Converter::<f64>::configure(&FloatConverter, Some("0"), 0, &meta()).unwrap();
        assert_eq!(encode(&FloatConverter, &places, &2.5_f64), "2");

        for bad in &["", "0.", "#.##", "00.0", "0.0x"] {
            assert!(
                Converter::<f64>::configure(&FloatConverter, Some(*bad), 0, &meta())
                    .is_err(),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn chars() {
        round_trip(&CharConverter, &(), 'é');
        assert_eq!(CharConverter.decode(&(), "").unwrap(), None);
        assert!(CharConverter.decode(&(), "ab").is_err());
    }

    #[derive(Debug, PartialEq)]
    enum Color {
        Red,
        Green,
    }

    impl FromStr for Color {
        type Err = String;

        fn from_str(s: &str) -> Result<Color, String> {
            match s {
                "red" => Ok(Color::Red),
                "green" => Ok(Color::Green),
                _ => Err(format!("unknown color {:?}", s)),
            }
        }
    }

    impl fmt::Display for Color {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            match *self {
                Color::Red => write!(f, "red"),
                Color::Green => write!(f, "green"),
            }
        }
    }

    #[test]
    fn from_str() {
        let conv = FromStrConverter::<Color>::new();
        round_trip(&conv, &(), Color::Red);
        round_trip(&conv, &(), Color::Green);
        let err = conv.decode(&(), "blue").unwrap_err();
        assert_eq!(err.message(), "unknown color \"blue\"");
    }
}
