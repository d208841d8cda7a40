//! Date search value parsing
//!
//! Accepted forms (FHIR 3.2.1.5.9, "date" parameter type):
//! - `YYYY`
//! - `YYYY-MM`
//! - `YYYY-MM-DD`
//! - `YYYY-MM-DDThh:mm(:ss(.sss)?)?(Z|±hh:mm)?`
//!
//! each optionally preceded by a comparison prefix. A partially specified value
//! denotes the whole span of its finest unit, so `2020-02` is
//! `[2020-02-01T00:00:00.000, 2020-02-29T23:59:59.999]`.

use chrono::{
    DateTime, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Timelike, Utc,
};
use serde::Serialize;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::prefix::SearchPrefix;

/// Finest calendar/time unit present in a date search value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Year,
    YearMonth,
    YearMonthDay,
    DateTimeMinute,
    DateTimeSecond,
    DateTimeMillisecond,
}

/// A date search value as written, one case per precision level.
///
/// Every case is calendar-valid by construction. Time-bearing cases keep their
/// civil time together with the literal offset, if one was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialDateTime {
    Year(i32),
    YearMonth { year: i32, month: u32 },
    YearMonthDay(NaiveDate),
    Minute {
        local: NaiveDateTime,
        offset: Option<FixedOffset>,
    },
    Second {
        local: NaiveDateTime,
        offset: Option<FixedOffset>,
    },
    Millisecond {
        local: NaiveDateTime,
        offset: Option<FixedOffset>,
    },
}

impl PartialDateTime {
    pub fn precision(&self) -> Precision {
        match self {
            Self::Year(_) => Precision::Year,
            Self::YearMonth { .. } => Precision::YearMonth,
            Self::YearMonthDay(_) => Precision::YearMonthDay,
            Self::Minute { .. } => Precision::DateTimeMinute,
            Self::Second { .. } => Precision::DateTimeSecond,
            Self::Millisecond { .. } => Precision::DateTimeMillisecond,
        }
    }

    /// Literal offset of the value, if it carried one.
    pub fn offset(&self) -> Option<FixedOffset> {
        match self {
            Self::Minute { offset, .. }
            | Self::Second { offset, .. }
            | Self::Millisecond { offset, .. } => *offset,
            _ => None,
        }
    }

    /// Resolves the value to absolute instants.
    ///
    /// `default_offset` applies when the value has no literal offset; date-only
    /// values never have one.
    pub fn to_range(&self, default_offset: FixedOffset) -> Option<DateRange> {
        let (start, end) = self.local_bounds()?;
        let offset = self.offset().unwrap_or(default_offset);
        Some(DateRange {
            start: offset.from_local_datetime(&start).single()?.with_timezone(&Utc),
            end: offset.from_local_datetime(&end).single()?.with_timezone(&Utc),
        })
    }

    fn local_bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let midnight = NaiveTime::from_hms_opt(0, 0, 0)?;
        let last_instant = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?;
        match *self {
            Self::Year(year) => Some((
                NaiveDate::from_ymd_opt(year, 1, 1)?.and_time(midnight),
                NaiveDate::from_ymd_opt(year, 12, 31)?.and_time(last_instant),
            )),
            Self::YearMonth { year, month } => {
                let first = NaiveDate::from_ymd_opt(year, month, 1)?;
                let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
                Some((
                    first.and_time(midnight),
                    last.and_time(last_instant),
                ))
            }
            Self::YearMonthDay(date) => {
                Some((date.and_time(midnight), date.and_time(last_instant)))
            }
            Self::Minute { local, .. } => Some((
                local,
                local.with_second(59)?.with_nanosecond(999_000_000)?,
            )),
            Self::Second { local, .. } => Some((local, local.with_nanosecond(999_000_000)?)),
            Self::Millisecond { local, .. } => Some((local, local)),
        }
    }
}

impl FromStr for PartialDateTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        scan_partial(s).map_err(|reason| Error::invalid(s, reason))
    }
}

/// Closed interval of absolute instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// A fully parsed date search value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDateParam {
    pub prefix: SearchPrefix,
    pub range: DateRange,
    pub value: PartialDateTime,
}

impl ParsedDateParam {
    pub fn precision(&self) -> Precision {
        self.value.precision()
    }
}

/// Parses a date search value, reading offset-less values as UTC.
pub fn parse_date_param(raw: &str) -> Result<ParsedDateParam> {
    parse_date_param_with_offset(raw, utc())
}

/// Parses a date search value, reading offset-less values in `default_offset`.
pub fn parse_date_param_with_offset(
    raw: &str,
    default_offset: FixedOffset,
) -> Result<ParsedDateParam> {
    // If no prefix is present, the prefix eq is assumed (FHIR 3.2.1.5.6).
    let (prefix, rest) = SearchPrefix::parse_prefix(raw);
    let prefix = prefix.unwrap_or_default();

    let value = scan_partial(rest).map_err(|reason| {
        tracing::debug!(value = raw, reason, "rejected date search value");
        Error::invalid(raw, reason)
    })?;
    let range = value
        .to_range(default_offset)
        .ok_or_else(|| Error::invalid(raw, "date is outside the supported range"))?;

    tracing::trace!(
        %prefix,
        precision = ?value.precision(),
        start = %range.start,
        end = %range.end,
        "parsed date search value"
    );

    Ok(ParsedDateParam {
        prefix,
        range,
        value,
    })
}

pub(crate) fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parses a literal `Z` or `±hh:mm` offset.
pub(crate) fn parse_offset(s: &str) -> Option<FixedOffset> {
    let mut scanner = Scanner::new(s);
    let offset = scanner.offset().ok()?;
    scanner.is_done().then_some(offset)
}

fn scan_partial(s: &str) -> std::result::Result<PartialDateTime, &'static str> {
    let mut sc = Scanner::new(s);

    let year = sc.digits(4).ok_or("expected a four-digit year")? as i32;
    if sc.is_done() {
        return Ok(PartialDateTime::Year(year));
    }

    sc.expect(b'-', "expected '-' after the year")?;
    let month = sc.digits(2).ok_or("expected a two-digit month")?;
    if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
        return Err("month out of range");
    }
    if sc.is_done() {
        return Ok(PartialDateTime::YearMonth { year, month });
    }

    sc.expect(b'-', "expected '-' after the month")?;
    let day = sc.digits(2).ok_or("expected a two-digit day")?;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or("day out of range for month")?;
    if sc.is_done() {
        return Ok(PartialDateTime::YearMonthDay(date));
    }

    sc.expect(b'T', "expected 'T' after the date")?;
    let hour = sc.digits(2).ok_or("expected a two-digit hour")?;
    sc.expect(b':', "expected ':' after the hour")?;
    let minute = sc.digits(2).ok_or("expected two-digit minutes")?;

    let mut second = None;
    let mut millis = None;
    if sc.eat(b':') {
        second = Some(sc.digits(2).ok_or("expected two-digit seconds")?);
        if sc.eat(b'.') {
            millis = Some(sc.digits(3).ok_or("expected three-digit milliseconds")?);
        }
    }

    let offset = if sc.is_done() { None } else { Some(sc.offset()?) };
    if !sc.is_done() {
        return Err("unexpected trailing characters");
    }

    let time = NaiveTime::from_hms_milli_opt(
        hour,
        minute,
        second.unwrap_or(0),
        millis.unwrap_or(0),
    )
    .ok_or("time out of range")?;
    let local = date.and_time(time);

    Ok(match (second, millis) {
        (None, _) => PartialDateTime::Minute { local, offset },
        (Some(_), None) => PartialDateTime::Second { local, offset },
        (Some(_), Some(_)) => PartialDateTime::Millisecond { local, offset },
    })
}

/// Byte cursor over fixed-width ASCII fields.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn is_done(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, b: u8, reason: &'static str) -> std::result::Result<(), &'static str> {
        if self.eat(b) {
            Ok(())
        } else {
            Err(reason)
        }
    }

    /// Reads exactly `width` ASCII digits.
    fn digits(&mut self, width: usize) -> Option<u32> {
        let field = self.bytes.get(self.pos..self.pos + width)?;
        if !field.iter().all(u8::is_ascii_digit) {
            return None;
        }
        self.pos += width;
        Some(
            field
                .iter()
                .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0')),
        )
    }

    fn offset(&mut self) -> std::result::Result<FixedOffset, &'static str> {
        let sign = match self.peek() {
            Some(b'Z') => {
                self.pos += 1;
                return Ok(utc());
            }
            Some(b'+') => 1,
            Some(b'-') => -1,
            _ => return Err("expected 'Z' or a ±hh:mm offset"),
        };
        self.pos += 1;
        let hours = self.digits(2).ok_or("expected a two-digit offset hour")?;
        self.expect(b':', "expected ':' in the offset")?;
        let minutes = self.digits(2).ok_or("expected two-digit offset minutes")?;
        if hours >= 24 || minutes >= 60 {
            return Err("offset out of range");
        }
        let seconds = sign * (hours * 3600 + minutes * 60) as i32;
        FixedOffset::east_opt(seconds).ok_or("offset out of range")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc_ms(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn scans_each_precision() {
        let cases = [
            ("2020", Precision::Year),
            ("2020-06", Precision::YearMonth),
            ("2020-06-15", Precision::YearMonthDay),
            ("2020-06-15T10:30", Precision::DateTimeMinute),
            ("2020-06-15T10:30Z", Precision::DateTimeMinute),
            ("2020-06-15T10:30:15", Precision::DateTimeSecond),
            ("2020-06-15T10:30:15+02:00", Precision::DateTimeSecond),
            ("2020-06-15T10:30:15.250", Precision::DateTimeMillisecond),
            ("2020-06-15T10:30:15.250-05:30", Precision::DateTimeMillisecond),
        ];
        for (input, expected) in cases {
            let value: PartialDateTime = input.parse().unwrap();
            assert_eq!(value.precision(), expected, "{input}");
        }
    }

    #[test]
    fn rejects_malformed_groups() {
        let cases = [
            "",
            "20",
            "202",
            "20201",
            "2020-1",
            "2020-01-1",
            "2020/01",
            "2020-01-01T1:00",
            "2020-01-01T10",
            "2020-01-01T10:00:0",
            "2020-01-01T10:00:00.12",
            "2020-01-01T10:00:00.1234",
            "2020-01-01T10:00+0200",
            "2020-01-01T10:00+02",
            "2020-01-01 10:00",
            "2020-01-01T10:00:00Zjunk",
            " 2020",
            "2020 ",
        ];
        for input in cases {
            assert!(input.parse::<PartialDateTime>().is_err(), "{input:?}");
        }
    }

    #[test]
    fn rejects_calendar_invalid_values() {
        let cases = [
            "2020-00",
            "2020-13",
            "2021-02-29",
            "2020-04-31",
            "2020-01-32",
            "2020-01-01T24:00",
            "2020-01-01T10:60",
            "2020-01-01T10:00:60",
            "2020-01-01T10:00+24:00",
            "2020-01-01T10:00+01:60",
        ];
        for input in cases {
            assert!(input.parse::<PartialDateTime>().is_err(), "{input:?}");
        }
    }

    #[test]
    fn month_end_follows_calendar() {
        let end = |s: &str| s.parse::<PartialDateTime>().unwrap().to_range(utc()).unwrap().end;
        assert_eq!(end("2020-02"), utc_ms("2020-02-29T23:59:59.999Z"));
        assert_eq!(end("2021-02"), utc_ms("2021-02-28T23:59:59.999Z"));
        assert_eq!(end("1900-02"), utc_ms("1900-02-28T23:59:59.999Z"));
        assert_eq!(end("2000-02"), utc_ms("2000-02-29T23:59:59.999Z"));
        assert_eq!(end("2020-04"), utc_ms("2020-04-30T23:59:59.999Z"));
        assert_eq!(end("2020-12"), utc_ms("2020-12-31T23:59:59.999Z"));
    }

    #[test]
    fn literal_offset_wins_over_default() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let value: PartialDateTime = "2020-06-15T10:30Z".parse().unwrap();
        let range = value.to_range(plus_two).unwrap();
        assert_eq!(range.start, utc_ms("2020-06-15T10:30:00Z"));

        let value: PartialDateTime = "2020-06-15".parse().unwrap();
        let range = value.to_range(plus_two).unwrap();
        assert_eq!(range.start, utc_ms("2020-06-14T22:00:00Z"));
        assert_eq!(range.end, utc_ms("2020-06-15T21:59:59.999Z"));
    }

    #[test]
    fn end_is_derived_in_the_literal_offset() {
        let parsed = parse_date_param("2020-06-15T10:30-05:00").unwrap();
        assert_eq!(parsed.range.start, utc_ms("2020-06-15T15:30:00Z"));
        assert_eq!(parsed.range.end, utc_ms("2020-06-15T15:30:59.999Z"));
    }

    #[test]
    fn second_precision_fills_milliseconds() {
        let parsed = parse_date_param("2020-06-15T10:30:15").unwrap();
        assert_eq!(parsed.range.start, utc_ms("2020-06-15T10:30:15Z"));
        assert_eq!(parsed.range.end, utc_ms("2020-06-15T10:30:15.999Z"));
    }

    #[test]
    fn parses_offsets() {
        assert_eq!(parse_offset("Z"), Some(utc()));
        assert_eq!(parse_offset("+05:30"), FixedOffset::east_opt(5 * 3600 + 1800));
        assert_eq!(parse_offset("-01:00"), FixedOffset::west_opt(3600));
        assert_eq!(parse_offset("+5:30"), None);
        assert_eq!(parse_offset("Z "), None);
    }

    #[test]
    fn range_helpers() {
        let range = parse_date_param("2020-06-15").unwrap().range;
        assert!(range.contains(utc_ms("2020-06-15T12:00:00Z")));
        assert!(!range.contains(utc_ms("2020-06-16T00:00:00Z")));
        assert_eq!(
            range.duration(),
            Duration::days(1) - Duration::milliseconds(1)
        );
    }

    #[test]
    fn error_carries_raw_value() {
        let err = parse_date_param("ge2020-13").unwrap_err();
        assert!(err.to_string().contains("ge2020-13"));
        assert!(err.is_client_error());
    }
}
