/*!
The `csvrow` crate converts between lines of delimited, quote-escaped text
and typed records.

Each record type is described by an ordered list of
[`Column`](struct.Column.html)s. A column names a field, says how to read
and write it, and carries its decoding policy: whether a value is required,
what to use when a cell is empty, whether to trim whitespace and whether to
always quote it on output. Cells are turned into values by
[`Converter`](trait.Converter.html)s, looked up by the column's value type
in a [`ConverterRegistry`](struct.ConverterRegistry.html). Built-in
converters cover strings, booleans, characters and the primitive numeric
types.

A [`Processor`](struct.Processor.html) binds every column to its converter
once, when it is built, and then parses and writes single lines. Every line
is independent: a malformed line produces a
[`ParseError`](struct.ParseError.html) carrying the line number, the byte
offset and the column, and never affects any other line.

# Example

```
use csvrow::{Column, ParseErrorKind, Processor};

#[derive(Debug, Default, PartialEq)]
struct Track {
    title: String,
    seconds: u32,
    rating: Option<f32>,
}

# fn example() -> csvrow::Result<()> {
let processor = Processor::builder()
    .column(
        Column::new("title", |t: &Track| &t.title, |t: &mut Track, v| t.title = v)
            .required(true),
    )
    .column(Column::new(
        "seconds",
        |t: &Track| &t.seconds,
        |t: &mut Track, v| t.seconds = v,
    ))
    .column(Column::optional(
        "rating",
        |t: &Track| t.rating.as_ref(),
        |t: &mut Track, v| t.rating = Some(v),
    ))
    .build()?;

let track = processor.parse_line(r#""Say ""Hello""",215,4.5"#)?;
assert_eq!(track.title, r#"Say "Hello""#);
assert_eq!(track.rating, Some(4.5));

let line = processor.write_line(&track, false)?;
assert_eq!(processor.parse_line(&line)?, track);

let err = processor.parse_line(",215,").unwrap_err();
assert_eq!(err.parse_kind(), Some(ParseErrorKind::RequiredValue));
# Ok(())
# }
# example().unwrap();
```

# Quoting

A cell that starts with the quote character runs up to a closing quote,
which must be followed by the separator or the end of the line. Inside, two
quotes stand for one. When writing, a cell is quoted if it contains the
quote, the separator or a control character, or if its column or converter
asks for quotes. Quotes are doubled only when present, so parsing a written
line always yields the values that were written.
*/

#![deny(missing_docs)]

pub use csvrow_core::{DialectError, QuoteStyle, Terminator};

pub use crate::column::{Column, FieldAccess, FieldDescriptor};
pub use crate::converter::{Converter, ConverterRegistry, FieldMeta};
pub use crate::converters::{
    BoolConfig, BoolConverter, CharConverter, FloatConverter,
    FromStrConverter, IntegerConverter, StringConverter,
};
pub use crate::error::{
    AccessError, ConfigError, ConfigErrorKind, DecodeError, DecodeErrorKind,
    Error, ParseError, ParseErrorKind, Result,
};
pub use crate::processor::{Processor, ProcessorBuilder};

mod column;
mod converter;
mod converters;
mod error;
mod processor;
mod stream;
