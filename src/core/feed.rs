//! Pull parser for the central bank daily rate feed.
//!
//! The document looks like
//!
//! ```xml
//! <ValCurs Date="02.03.2024" name="Foreign Currency Market">
//!     <Valute ID="R01235">
//!         <NumCode>840</NumCode>
//!         <CharCode>USD</CharCode>
//!         <Nominal>1</Nominal>
//!         <Name>Доллар США</Name>
//!         <Value>91,3336</Value>
//!     </Valute>
//! </ValCurs>
//! ```
//!
//! Numeric fields use a comma as decimal separator. Children of a `Valute` may come in
//! any order and unknown children are ignored. A malformed number aborts the whole parse;
//! a record missing its value, code or name is skipped.

use crate::core::currency::{CurrencyRecord, FeedSnapshot};
use crate::core::error::{RateError, Result};
use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use std::fmt::Display;
use std::io::BufRead;
use tracing::{debug, warn};

const ROOT_TAG: &[u8] = b"ValCurs";
const RECORD_TAG: &[u8] = b"Valute";
const DATE_ATTR: &str = "Date";
const DATE_FORMAT: &str = "%d.%m.%Y";

/// Child elements of a record that carry data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Nominal,
    Value,
    Code,
    Name,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"Nominal" => Some(Field::Nominal),
            b"Value" => Some(Field::Value),
            b"CharCode" => Some(Field::Code),
            b"Name" => Some(Field::Name),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Field::Nominal => "Nominal",
            Field::Value => "Value",
            Field::Code => "CharCode",
            Field::Name => "Name",
        }
    }
}

/// Fields collected so far for the record being read.
#[derive(Debug, Default)]
struct RecordDraft {
    nominal: Option<f64>,
    value: Option<f64>,
    code: Option<String>,
    name: Option<String>,
}

impl RecordDraft {
    fn apply(&mut self, field: Field, text: &str) -> Result<(), String> {
        let text = text.trim();
        match field {
            Field::Nominal => self.nominal = Some(parse_quantity(field, text)?),
            Field::Value => self.value = Some(parse_quantity(field, text)?),
            Field::Code => self.code = Some(text.to_string()),
            Field::Name => self.name = Some(text.to_string()),
        }
        Ok(())
    }

    /// Validates completeness once the record is closed. The error is the skip reason.
    fn finish(self) -> Result<CurrencyRecord, String> {
        let code = self.code.ok_or("no CharCode")?;
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("CharCode '{code}' is not alphabetic"));
        }
        let value = self.value.ok_or_else(|| format!("{code} has no Value"))?;
        let name = self.name.ok_or_else(|| format!("{code} has no Name"))?;

        Ok(CurrencyRecord {
            code: code.to_ascii_uppercase(),
            name,
            nominal: self.nominal.unwrap_or(1.0),
            value,
        })
    }
}

/// Parses a strictly positive decimal that may use a comma separator.
fn parse_quantity(field: Field, text: &str) -> Result<f64, String> {
    let number: f64 = text
        .replace(',', ".")
        .parse()
        .map_err(|_| format!("{} '{}' is not a number", field.tag(), text))?;
    if !number.is_finite() {
        return Err(format!("{} '{}' is not a finite number", field.tag(), text));
    }
    if number <= 0.0 {
        return Err(format!("{} '{}' must be positive", field.tag(), text));
    }
    Ok(number)
}

fn syntax_error(err: impl Display, position: impl Display) -> RateError {
    RateError::Parse(format!("{err} at byte {position}"))
}

fn root_date(start: &BytesStart<'_>, decoder: Decoder) -> Option<NaiveDate> {
    let attr = start.try_get_attribute(DATE_ATTR).ok().flatten()?;
    let text = decoder.decode(&attr.value).ok()?;
    match NaiveDate::parse_from_str(text.trim(), DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            warn!("Ignoring unparsable feed date '{}': {}", text, e);
            None
        }
    }
}

enum Step {
    Record,
    Skip,
    Eof,
}

/// Lazily yields the records of a feed document, one per `Valute` element.
///
/// After the first error the reader is exhausted.
pub struct FeedReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    date: Option<NaiveDate>,
    seen: usize,
    finished: bool,
}

impl<R: BufRead> FeedReader<R> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);
        FeedReader {
            reader,
            buf: Vec::new(),
            date: None,
            seen: 0,
            finished: false,
        }
    }

    /// Effective date of the feed, available once the root element has been read.
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    fn next_record(&mut self) -> Result<Option<CurrencyRecord>> {
        loop {
            self.buf.clear();
            let step = match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == ROOT_TAG => {
                    self.date = root_date(&e, self.reader.decoder());
                    Step::Skip
                }
                Ok(Event::Start(e)) if e.name().as_ref() == RECORD_TAG => Step::Record,
                Ok(Event::Empty(e)) if e.name().as_ref() == RECORD_TAG => {
                    self.seen += 1;
                    warn!("Skipping empty Valute #{}", self.seen);
                    Step::Skip
                }
                Ok(Event::Eof) => Step::Eof,
                Ok(_) => Step::Skip,
                Err(e) => return Err(syntax_error(e, self.reader.buffer_position())),
            };

            match step {
                Step::Record => {
                    if let Some(record) = self.read_record()? {
                        return Ok(Some(record));
                    }
                }
                Step::Skip => {}
                Step::Eof => return Ok(None),
            }
        }
    }

    /// Reads the children of a `Valute` whose start tag was just consumed.
    fn read_record(&mut self) -> Result<Option<CurrencyRecord>> {
        self.seen += 1;
        let index = self.seen;
        let invalid = |msg: String| RateError::Parse(format!("Valute #{index}: {msg}"));

        let mut draft = RecordDraft::default();
        let mut field: Option<Field> = None;
        let mut text = String::new();
        let mut depth = 0usize;

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) => {
                    depth += 1;
                    if depth == 1 {
                        field = Field::from_tag(e.name().as_ref());
                        text.clear();
                    }
                }
                Ok(Event::Empty(e)) => {
                    if depth == 0
                        && let Some(empty) = Field::from_tag(e.name().as_ref())
                    {
                        draft.apply(empty, "").map_err(invalid)?;
                    }
                }
                Ok(Event::Text(e)) => {
                    if depth == 1 && field.is_some() {
                        let unescaped = e.unescape().map_err(|e| invalid(e.to_string()))?;
                        text.push_str(&unescaped);
                    }
                }
                Ok(Event::CData(e)) => {
                    if depth == 1 && field.is_some() {
                        let decoded = self
                            .reader
                            .decoder()
                            .decode(&e)
                            .map_err(|e| invalid(e.to_string()))?;
                        text.push_str(&decoded);
                    }
                }
                Ok(Event::End(_)) => {
                    if depth == 0 {
                        break;
                    }
                    if depth == 1
                        && let Some(done) = field.take()
                    {
                        draft.apply(done, &text).map_err(invalid)?;
                    }
                    depth -= 1;
                }
                Ok(Event::Eof) => {
                    return Err(invalid("document ended inside the record".to_string()));
                }
                Ok(_) => {}
                Err(e) => return Err(syntax_error(e, self.reader.buffer_position())),
            }
        }

        match draft.finish() {
            Ok(record) => {
                debug!(code = %record.code, nominal = record.nominal, value = record.value, "Parsed record");
                Ok(Some(record))
            }
            Err(reason) => {
                warn!("Skipping Valute #{}: {}", index, reason);
                Ok(None)
            }
        }
    }
}

impl<R: BufRead> Iterator for FeedReader<R> {
    type Item = Result<CurrencyRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Reads a whole feed document. Fails on the first malformed record.
pub fn parse_feed<R: BufRead>(source: R) -> Result<FeedSnapshot> {
    let mut reader = FeedReader::new(source);
    let records = reader.by_ref().collect::<Result<Vec<_>>>()?;
    debug!(
        count = records.len(),
        date = ?reader.date(),
        "Parsed rate feed"
    );
    Ok(FeedSnapshot {
        date: reader.date(),
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAILY_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ValCurs Date="02.03.2024" name="Foreign Currency Market">
    <Valute ID="R01235">
        <NumCode>840</NumCode>
        <CharCode>USD</CharCode>
        <Nominal>1</Nominal>
        <Name>Доллар США</Name>
        <Value>91,3336</Value>
        <VunitRate>91,3336</VunitRate>
    </Valute>
    <Valute ID="R01239">
        <NumCode>978</NumCode>
        <CharCode>EUR</CharCode>
        <Nominal>1</Nominal>
        <Name>Евро</Name>
        <Value>98,7705</Value>
    </Valute>
    <Valute ID="R01820">
        <NumCode>392</NumCode>
        <CharCode>JPY</CharCode>
        <Nominal>100</Nominal>
        <Name>Японских иен</Name>
        <Value>60,8442</Value>
    </Valute>
</ValCurs>"#;

    fn wrap(body: &str) -> String {
        format!(r#"<ValCurs Date="01.01.2024">{body}</ValCurs>"#)
    }

    #[test]
    fn test_parse_daily_feed() {
        let snapshot = parse_feed(DAILY_FEED.as_bytes()).unwrap();

        assert_eq!(snapshot.date, NaiveDate::from_ymd_opt(2024, 3, 2));
        assert_eq!(snapshot.records.len(), 3);

        let usd = &snapshot.records[0];
        assert_eq!(usd.code, "USD");
        assert_eq!(usd.name, "Доллар США");
        assert_eq!(usd.nominal, 1.0);
        assert_eq!(usd.value, 91.3336);

        let jpy = &snapshot.records[2];
        assert_eq!(jpy.code, "JPY");
        assert_eq!(jpy.nominal, 100.0);
        assert!((jpy.unit_rate() - 0.608442).abs() < 1e-9);
    }

    #[test]
    fn test_missing_nominal_defaults_to_one() {
        let xml = wrap("<Valute><Value>75,5</Value><CharCode>XYZ</CharCode><Name>Test</Name></Valute>");
        let snapshot = parse_feed(xml.as_bytes()).unwrap();

        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].nominal, 1.0);
        assert_eq!(snapshot.records[0].unit_rate(), 75.5);
    }

    #[test]
    fn test_fields_in_any_order_and_unknown_children_ignored() {
        let xml = wrap(
            r#"<Valute>
                <Name>Фунт стерлингов</Name>
                <Extra><Value>1</Value><Name>nested</Name></Extra>
                <Value>115,2</Value>
                <Comment/>
                <Nominal>10</Nominal>
                <CharCode>GBP</CharCode>
            </Valute>"#,
        );
        let snapshot = parse_feed(xml.as_bytes()).unwrap();

        assert_eq!(
            snapshot.records,
            vec![CurrencyRecord {
                code: "GBP".to_string(),
                name: "Фунт стерлингов".to_string(),
                nominal: 10.0,
                value: 115.2,
            }]
        );
    }

    #[test]
    fn test_incomplete_records_are_skipped() {
        let xml = wrap(
            r#"<Valute><Value>10</Value><Name>No code</Name></Valute>
               <Valute><CharCode>AAA</CharCode><Name>No value</Name></Valute>
               <Valute><CharCode>BBB</CharCode><Value>1</Value></Valute>
               <Valute><CharCode>U2</CharCode><Value>1</Value><Name>Digits</Name></Valute>
               <Valute/>
               <Valute><CharCode>CCC</CharCode><Value>2,5</Value><Name>Complete</Name></Valute>"#,
        );
        let snapshot = parse_feed(xml.as_bytes()).unwrap();

        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].code, "CCC");
        assert_eq!(snapshot.records[0].value, 2.5);
    }

    #[test]
    fn test_malformed_value_fails_the_whole_feed() {
        let xml = wrap(
            r#"<Valute><CharCode>USD</CharCode><Value>90</Value><Name>Dollar</Name></Valute>
               <Valute><CharCode>EUR</CharCode><Value>abc</Value><Name>Euro</Name></Valute>
               <Valute><CharCode>GBP</CharCode><Value>110</Value><Name>Pound</Name></Valute>"#,
        );
        let err = parse_feed(xml.as_bytes()).unwrap_err();

        assert_eq!(
            err,
            RateError::Parse("Valute #2: Value 'abc' is not a number".to_string())
        );
    }

    #[test]
    fn test_reader_stops_after_first_error() {
        let xml = wrap(
            r#"<Valute><CharCode>USD</CharCode><Value>90</Value><Name>Dollar</Name></Valute>
               <Valute><CharCode>EUR</CharCode><Nominal>x</Nominal><Value>100</Value><Name>Euro</Name></Valute>
               <Valute><CharCode>GBP</CharCode><Value>110</Value><Name>Pound</Name></Valute>"#,
        );
        let mut reader = FeedReader::new(xml.as_bytes());

        assert_eq!(reader.next().unwrap().unwrap().code, "USD");
        assert!(matches!(reader.next(), Some(Err(RateError::Parse(_)))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_non_positive_and_non_finite_numbers_are_rejected() {
        for (nominal, value) in [("0", "90"), ("1", "-5"), ("1", "NaN"), ("1", "inf"), ("", "90")] {
            let xml = wrap(&format!(
                "<Valute><CharCode>USD</CharCode><Nominal>{nominal}</Nominal><Value>{value}</Value><Name>Dollar</Name></Valute>"
            ));
            let result = parse_feed(xml.as_bytes());
            assert!(
                matches!(result, Err(RateError::Parse(_))),
                "nominal={nominal} value={value} gave {result:?}"
            );
        }

        let xml = wrap("<Valute><CharCode>USD</CharCode><Nominal/><Value>90</Value><Name>Dollar</Name></Valute>");
        assert!(matches!(parse_feed(xml.as_bytes()), Err(RateError::Parse(_))));
    }

    #[test]
    fn test_duplicates_are_emitted_in_feed_order() {
        let xml = wrap(
            r#"<Valute><CharCode>USD</CharCode><Value>90</Value><Name>Dollar</Name></Valute>
               <Valute><CharCode>usd</CharCode><Value>95</Value><Name>Dollar</Name></Valute>"#,
        );
        let snapshot = parse_feed(xml.as_bytes()).unwrap();

        let values: Vec<_> = snapshot
            .records
            .iter()
            .map(|r| (r.code.as_str(), r.value))
            .collect();
        assert_eq!(values, vec![("USD", 90.0), ("USD", 95.0)]);
    }

    #[test]
    fn test_empty_feed_has_no_records() {
        let snapshot = parse_feed(r#"<ValCurs Date="bogus" name="x"></ValCurs>"#.as_bytes()).unwrap();
        assert!(snapshot.records.is_empty());
        assert!(snapshot.date.is_none());

        let snapshot = parse_feed(r#"<ValCurs Date="05.07.2023"/>"#.as_bytes()).unwrap();
        assert!(snapshot.records.is_empty());
        assert_eq!(snapshot.date, NaiveDate::from_ymd_opt(2023, 7, 5));
    }

    #[test]
    fn test_truncated_document_is_a_parse_error() {
        let xml = r#"<ValCurs><Valute><CharCode>USD</CharCode><Value>90</Value>"#;
        assert!(matches!(parse_feed(xml.as_bytes()), Err(RateError::Parse(_))));
    }

    #[test]
    fn test_mismatched_tags_are_a_parse_error() {
        let xml = r#"<ValCurs><Valute><CharCode>USD</Value></Valute></ValCurs>"#;
        assert!(matches!(parse_feed(xml.as_bytes()), Err(RateError::Parse(_))));
    }

    #[test]
    fn test_declared_windows_1251_encoding_is_honored() {
        let mut xml: Vec<u8> = Vec::new();
        xml.extend_from_slice(
            br#"<?xml version="1.0" encoding="windows-1251"?><ValCurs Date="02.03.2024"><Valute ID="R01235"><CharCode>USD</CharCode><Nominal>1</Nominal><Name>"#,
        );
        // "Доллар США"
        xml.extend_from_slice(&[0xC4, 0xEE, 0xEB, 0xEB, 0xE0, 0xF0, 0x20, 0xD1, 0xD8, 0xC0]);
        xml.extend_from_slice(b"</Name><Value>91,3336</Value></Valute></ValCurs>");

        let snapshot = parse_feed(xml.as_slice()).unwrap();
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].name, "Доллар США");
    }

    #[test]
    fn test_escaped_text_is_unescaped() {
        let xml = wrap("<Valute><CharCode>XDR</CharCode><Value>120</Value><Name>SDR &amp; Co</Name></Valute>");
        let snapshot = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(snapshot.records[0].name, "SDR & Co");
    }
}
