use std::borrow::Borrow;
use std::io::{self, BufRead, Write};

use tracing::debug;

use crate::error::{Error, ParseError, ParseErrorKind, Result};
use crate::processor::Processor;

impl<R> Processor<R> {
    /// Parse every line of `rdr` into a record.
    ///
    /// Lines are split on `\n` (with an optional preceding `\r`) and
    /// numbered from 1. Blank lines are skipped. If the processor was built
    /// with `first_line_header`, the first non-blank line is taken as the
    /// header, and checked against the column names when
    /// `validate_header` is also set.
    ///
    /// When `errors` is `None`, the first parse error is returned. When it
    /// is `Some`, parse errors are pushed onto it and the offending line is
    /// skipped. A bad or missing header is collected too, in which case no
    /// records are returned. I/O errors, and errors that are not about a
    /// single line (like a missing record factory), are always returned.
    ///
    /// # Example
    ///
    /// ```
    /// use csvrow::{Column, ParseErrorKind, Processor};
    ///
    /// # fn example() -> csvrow::Result<()> {
    /// let processor = Processor::builder()
    ///     .column(Column::new("n", |n: &u32| n, |n: &mut u32, v| *n = v))
    ///     .first_line_header(true)
    ///     .build()?;
    ///
    /// let input = "n\n1\n\nx\n3\n";
    /// let mut errors = vec![];
    /// let numbers = processor.read_all(input.as_bytes(), Some(&mut errors))?;
    /// assert_eq!(numbers, vec![1, 3]);
    /// assert_eq!(errors.len(), 1);
    /// assert_eq!(errors[0].kind(), ParseErrorKind::InvalidFormat);
    /// assert_eq!(errors[0].line(), 4);
    /// # Ok(())
    /// # }
    /// # example().unwrap();
    /// ```
    pub fn read_all<B: BufRead>(
        &self,
        rdr: B,
        mut errors: Option<&mut Vec<ParseError>>,
    ) -> Result<Vec<R>> {
        let mut records = vec![];
        let mut header_pending = self.is_first_line_header();
        for (i, line) in rdr.lines().enumerate() {
            let line = line?;
            let line_number = i as u64 + 1;
            if line.trim().is_empty() {
                continue;
            }
            if header_pending {
                header_pending = false;
                if !self.is_validate_header() {
                    continue;
                }
                match self.validate_header_at(line_number, &line) {
                    Ok(()) => continue,
                    Err(err) => return header_failure(err, errors),
                }
            }
            match self.parse_line_at(line_number, &line) {
                Ok(record) => records.push(record),
                Err(Error::Parse(err)) => match errors.as_deref_mut() {
                    None => return Err(Error::Parse(err)),
                    Some(errors) => {
                        debug!(
                            line = line_number,
                            kind = %err.kind(),
                            "skipping line that could not be parsed"
                        );
                        errors.push(err);
                    }
                },
                Err(err) => return Err(err),
            }
        }
        if header_pending {
            let err = ParseError::new(
                ParseErrorKind::NoHeader,
                "expected a header line but the input is empty",
                1,
                0,
            );
            return header_failure(err, errors);
        }
        Ok(records)
    }

    /// Write every record to `wtr`, one per line, each followed by the
    /// terminator. When `write_header` is set, the column names are written
    /// first.
    ///
    /// `wtr` is buffered internally and flushed before returning.
    pub fn write_all<W, I>(
        &self,
        wtr: W,
        records: I,
        write_header: bool,
    ) -> Result<()>
    where
        W: Write,
        I: IntoIterator,
        I::Item: Borrow<R>,
    {
        let mut wtr = io::BufWriter::new(wtr);
        if write_header {
            wtr.write_all(self.write_header(true).as_bytes())?;
        }
        let mut line = String::new();
        for record in records {
            line.clear();
            self.write_line_into(record.borrow(), true, &mut line)?;
            wtr.write_all(line.as_bytes())?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn header_failure<R>(
    err: ParseError,
    errors: Option<&mut Vec<ParseError>>,
) -> Result<Vec<R>> {
    match errors {
        None => Err(Error::Parse(err)),
        Some(errors) => {
            debug!(kind = %err.kind(), "skipping input with a bad header");
            errors.push(err);
            Ok(vec![])
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use crate::column::Column;
    use crate::error::{Error, ParseErrorKind};
    use crate::processor::{Processor, ProcessorBuilder};

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Pair {
        key: String,
        value: i64,
    }

    fn builder() -> ProcessorBuilder<Pair> {
        let mut builder = Processor::builder();
        builder
            .column(Column::new(
                "key",
                |p: &Pair| &p.key,
                |p: &mut Pair, v| p.key = v,
            ))
            .column(Column::new(
                "value",
                |p: &Pair| &p.value,
                |p: &mut Pair, v| p.value = v,
            ));
        builder
    }

    fn pair(key: &str, value: i64) -> Pair {
        Pair { key: key.to_string(), value }
    }

    #[test]
    fn read_skips_blank_lines() {
        let processor = builder().build().unwrap();
        let input = "a,1\r\n\r\n  \nb,2\n";
        let got = processor.read_all(input.as_bytes(), None).unwrap();
        assert_eq!(got, vec![pair("a", 1), pair("b", 2)]);
    }

    #[test]
    fn read_stops_at_first_error() {
        let processor = builder().build().unwrap();
        let err = processor.read_all("a,1\nb\nc,3\n".as_bytes(), None).unwrap_err();
        let err = err.parse_error().unwrap();
        assert_eq!(err.kind(), ParseErrorKind::InsufficientColumns);
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn read_collects_errors() {
        let processor = builder().build().unwrap();
        let mut errors = vec![];
        let input = "a,1\nb\nc,\"3\nd,4,5\ne,5\n";
        let got = processor.read_all(input.as_bytes(), Some(&mut errors)).unwrap();
        assert_eq!(got, vec![pair("a", 1), pair("e", 5)]);
        let kinds: Vec<(u64, ParseErrorKind)> =
            errors.iter().map(|e| (e.line(), e.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                (2, ParseErrorKind::InsufficientColumns),
                (3, ParseErrorKind::TruncatedValue),
                (4, ParseErrorKind::ExtraData),
            ]
        );
    }

    #[test]
    fn header_is_skipped() {
        let processor = builder().first_line_header(true).build().unwrap();
        let got = processor.read_all("whatever\na,1\n".as_bytes(), None).unwrap();
        assert_eq!(got, vec![pair("a", 1)]);
    }

    #[test]
    fn header_is_validated() {
        let processor = builder()
            .first_line_header(true)
            .validate_header(true)
            .build()
            .unwrap();
        let got = processor.read_all("key,value\na,1\n".as_bytes(), None).unwrap();
        assert_eq!(got, vec![pair("a", 1)]);

        let err = processor.read_all("value,key\na,1\n".as_bytes(), None).unwrap_err();
        assert_eq!(err.parse_kind(), Some(ParseErrorKind::InvalidHeader));

        let mut errors = vec![];
        let got = processor
            .read_all("key\na,1\n".as_bytes(), Some(&mut errors))
            .unwrap();
        assert!(got.is_empty());
        assert_eq!(errors[0].kind(), ParseErrorKind::InvalidHeader);
    }

    #[test]
    fn missing_header() {
        let processor = builder().first_line_header(true).build().unwrap();
        let err = processor.read_all("\n\n".as_bytes(), None).unwrap_err();
        assert_eq!(err.parse_kind(), Some(ParseErrorKind::NoHeader));
    }

    struct Broken;

    impl io::Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
    }

    #[test]
    fn io_errors_are_returned() {
        let processor = builder().build().unwrap();
        let mut errors = vec![];
        let rdr = io::BufReader::new(Broken);
        match processor.read_all(rdr, Some(&mut errors)) {
            Err(Error::Io(_)) => {}
            other => panic!("expected an I/O error, got {:?}", other),
        }
    }

    #[test]
    fn write_all_with_header() {
        let processor = builder().build().unwrap();
        let mut out = vec![];
        let records = vec![pair("a", 1), pair("b,c", -2)];
        processor.write_all(&mut out, &records, true).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "key,value\n\"a\",1\n\"b,c\",-2\n"
        );
    }

    #[test]
    fn write_then_read() {
        let processor = builder().first_line_header(true).validate_header(true).build().unwrap();
        let records = vec![pair("x \"y\"", 10), pair("", 0), pair("z", i64::MIN)];
        let mut out = vec![];
        processor.write_all(&mut out, records.iter(), true).unwrap();
        let got = processor.read_all(&out[..], None).unwrap();
        assert_eq!(got, records);
    }
}
