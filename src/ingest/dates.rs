//! Best-effort timestamp parsing for exported tables.
//!
//! Exports mix several layouts. Each candidate is tried in a fixed order and
//! the first match wins; naive timestamps are taken as UTC.

use lazy_static::lazy_static;
use regex::Regex;
use time::{
    format_description::{well_known::Rfc3339, FormatItem},
    macros::format_description,
    Date, Month, OffsetDateTime, PrimitiveDateTime, Time,
};
use tracing::warn;

const YMD_HMS: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const YMD: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DMY_HMS: &[FormatItem<'static>] =
    format_description!("[day]/[month]/[year] [hour]:[minute]:[second]");
const YMD_HM: &[FormatItem<'static>] = format_description!("[year]-[month]-[day] [hour]:[minute]");

/// True for cells that mean "no value" in the exports.
pub fn is_missing(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty() || raw.eq_ignore_ascii_case("NA") || raw.eq_ignore_ascii_case("nan")
}

pub fn parse_datetime(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if is_missing(raw) {
        return None;
    }

    let parsed = PrimitiveDateTime::parse(raw, YMD_HMS)
        .ok()
        .or_else(|| parse_short_day_first(raw))
        .or_else(|| {
            Date::parse(raw, YMD)
                .ok()
                .map(|d| PrimitiveDateTime::new(d, Time::MIDNIGHT))
        })
        .or_else(|| PrimitiveDateTime::parse(raw, DMY_HMS).ok())
        .or_else(|| PrimitiveDateTime::parse(raw, YMD_HM).ok())
        .map(PrimitiveDateTime::assume_utc);

    match parsed.or_else(|| OffsetDateTime::parse(raw, &Rfc3339).ok()) {
        Some(ts) => Some(ts),
        None => {
            warn!(value = raw, "could not parse datetime");
            None
        }
    }
}

/// `dd/mm/yy HH:MM` with a two-digit year (69-99 are 1900s, 00-68 are 2000s).
fn parse_short_day_first(raw: &str) -> Option<PrimitiveDateTime> {
    lazy_static! {
        static ref SHORT_DMY_HM: Regex =
            Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2}) (\d{1,2}):(\d{2})$").unwrap();
    }
    let caps = SHORT_DMY_HM.captures(raw)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u8>().ok());

    let yy = i32::from(field(3)?);
    let year = if yy >= 69 { 1900 + yy } else { 2000 + yy };
    let month = Month::try_from(field(2)?).ok()?;
    let date = Date::from_calendar_date(year, month, field(1)?).ok()?;
    let time = Time::from_hms(field(4)?, field(5)?, 0).ok()?;
    Some(PrimitiveDateTime::new(date, time))
}
