//! Strict event-date parsing over a fixed, ordered list of pattern groups.
//!
//! Each group is a total extractor: it either returns a complete
//! [`EventDate`] or fails and is skipped. The ISO family is attempted first,
//! then the non-ISO family. A group result that violates the year
//! invariants is discarded and fall-through continues, so e.g. a future
//! ISO date still gets a chance as a day-first non-ISO date before the
//! caller sees `None`.
//!
//! There is no lenient coercion: out-of-range days and months fail the
//! group rather than rolling into an adjacent period.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

use crate::event_date::{EventDate, MIN_EVENT_YEAR};

/// Parse a single date or date range with the default year window
/// (1600 ..= current year).
pub fn parse_date(input: &str) -> Option<EventDate> {
    parse_date_bounded(input, None, None)
}

/// Parse with an explicit year window. `min_year` bounds the end year from
/// below, `max_year` bounds the start year from above.
pub fn parse_date_bounded(
    input: &str,
    min_year: Option<i32>,
    max_year: Option<i32>,
) -> Option<EventDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let min_year = min_year.unwrap_or(MIN_EVENT_YEAR);
    let max_year = max_year.unwrap_or_else(|| chrono::Utc::now().year());

    let normalized = strip_subseconds(trimmed);

    const ISO_GROUPS: &[fn(&str) -> Option<EventDate>] = &[
        iso_single_date,
        iso_single_year,
        iso_month_name_date,
        iso_date_range,
        iso_day_date_range,
        iso_day_month_range,
        iso_date_time_range,
        iso_month_date,
        iso_month_date_range,
        iso_month_year_date_range,
        iso_year_range,
        iso_verbose_date_time,
        iso_verbose_date_time_range,
    ];
    const NON_ISO_GROUPS: &[fn(&str) -> Option<EventDate>] =
        &[non_iso_date_time, non_iso_single_date];

    for family in [ISO_GROUPS, NON_ISO_GROUPS] {
        for group in family {
            if let Some(ed) = group(&normalized) {
                if ed.is_valid_within(min_year, max_year) {
                    return Some(ed);
                }
                // invalid result: abandon this family, not just this group
                break;
            }
        }
    }
    None
}

fn subsecond_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // full ISO date-time with fractional seconds; zone suffix kept
        Regex::new(r"(\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2})\.\d+").unwrap()
    })
}

/// Strip sub-second precision from anything matching a full ISO date-time,
/// keeping any zone designator.
fn strip_subseconds(s: &str) -> String {
    subsecond_re().replace_all(s, "$1").into_owned()
}

fn offset_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:Z|[+-]\d{2}:\d{2})$").unwrap())
}

/// `yyyy-MM-dd` / `yyyy/MM/dd`, optional `T HH:mm[:ss]`, optional zone
/// suffix (stripped before parsing).
fn iso_single_date(s: &str) -> Option<EventDate> {
    parse_iso_instant(s).map(EventDate::single)
}

fn parse_iso_instant(s: &str) -> Option<NaiveDateTime> {
    let s = offset_re().replace(s, "").into_owned();
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y/%m/%dT%H:%M:%S",
        "%Y/%m/%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(dt);
        }
    }
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(&s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// `yyyy` and `yyyy-00-00`.
fn iso_single_year(s: &str) -> Option<EventDate> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(\d{4})(?:-00-00)?$").unwrap());
    let caps = re.captures(s)?;
    EventDate::year_precision(caps[1].parse().ok()?)
}

/// `yyyy-MMMM-dd` with the month spelled out (or abbreviated), plus time
/// variants.
fn iso_month_name_date(s: &str) -> Option<EventDate> {
    const FORMATS: &[&str] = &[
        "%Y-%B-%d",
        "%Y-%b-%d",
        "%Y-%B-%dT%H:%M:%S",
        "%Y-%b-%dT%H:%M:%S",
        "%Y-%B-%dT%H:%M",
        "%Y-%b-%dT%H:%M",
    ];
    let s = offset_re().replace(s, "").into_owned();
    for fmt in FORMATS {
        if fmt.contains("%H") {
            if let Ok(dt) = NaiveDateTime::parse_from_str(&s, fmt) {
                return Some(EventDate::single(dt));
            }
        } else if let Ok(d) = NaiveDate::parse_from_str(&s, fmt) {
            return Some(EventDate::single(d.and_hms_opt(0, 0, 0)?));
        }
    }
    None
}

/// `D1/D2` where both sides match the ISO single-date group.
fn iso_date_range(s: &str) -> Option<EventDate> {
    let (left, right) = s.split_once('/')?;
    // avoid eating yyyy/MM/dd forms: both sides must themselves parse
    let start = parse_iso_instant(left.trim())?;
    let end = parse_iso_instant(right.trim())?;
    Some(EventDate::range(start, end))
}

/// `yyyy-MM-dd/dd`.
fn iso_day_date_range(s: &str) -> Option<EventDate> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})/(\d{2})$").unwrap());
    let caps = re.captures(s)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let start = NaiveDate::from_ymd_opt(year, month, caps[3].parse().ok()?)?;
    let end = NaiveDate::from_ymd_opt(year, month, caps[4].parse().ok()?)?;
    Some(EventDate::range(
        start.and_hms_opt(0, 0, 0)?,
        end.and_hms_opt(0, 0, 0)?,
    ))
}

/// `yyyy-MM-dd/MM-dd`.
fn iso_day_month_range(s: &str) -> Option<EventDate> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re =
        RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})/(\d{2})-(\d{2})$").unwrap());
    let caps = re.captures(s)?;
    let year: i32 = caps[1].parse().ok()?;
    let start = NaiveDate::from_ymd_opt(year, caps[2].parse().ok()?, caps[3].parse().ok()?)?;
    let end = NaiveDate::from_ymd_opt(year, caps[4].parse().ok()?, caps[5].parse().ok()?)?;
    Some(EventDate::range(
        start.and_hms_opt(0, 0, 0)?,
        end.and_hms_opt(0, 0, 0)?,
    ))
}

/// `yyyy-MM-dd HH:mm:ss/yyyy-MM-dd HH:mm:ss` (space-separated date-times;
/// sub-seconds already stripped).
fn iso_date_time_range(s: &str) -> Option<EventDate> {
    let (left, right) = s.split_once('/')?;
    let fmt = "%Y-%m-%d %H:%M:%S";
    let start = NaiveDateTime::parse_from_str(left.trim(), fmt).ok()?;
    let end = NaiveDateTime::parse_from_str(right.trim(), fmt).ok()?;
    Some(EventDate::range(start, end))
}

/// `yyyy-MM`, `MMM-yyyy` and `yyyy-MM-00`.
fn iso_month_date(s: &str) -> Option<EventDate> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})(?:-00)?$").unwrap());
    if let Some(caps) = re.captures(s) {
        return EventDate::month_precision(caps[1].parse().ok()?, caps[2].parse().ok()?);
    }
    // MMM-yyyy, e.g. "Jun-1906"
    if let Ok(d) = NaiveDate::parse_from_str(&format!("01-{s}"), "%d-%b-%Y") {
        return EventDate::month_precision(d.year(), d.month());
    }
    None
}

/// `yyyy-MM/MM`.
fn iso_month_date_range(s: &str) -> Option<EventDate> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})/(\d{2})$").unwrap());
    let caps = re.captures(s)?;
    let year: i32 = caps[1].parse().ok()?;
    EventDate::month_range(year, caps[2].parse().ok()?, year, caps[3].parse().ok()?)
}

/// `yyyy-MM/yyyy-MM`.
fn iso_month_year_date_range(s: &str) -> Option<EventDate> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})/(\d{4})-(\d{2})$").unwrap());
    let caps = re.captures(s)?;
    EventDate::month_range(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
        caps[4].parse().ok()?,
    )
}

/// `yyyy/yyyy`, `yyyy/yy`, `yyyy/y`: short end-year suffixes inherit the
/// leading digits (decade, century, millennium) from the start year.
fn iso_year_range(s: &str) -> Option<EventDate> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(\d{4})/(\d{1,4})$").unwrap());
    let caps = re.captures(s)?;
    let start: i32 = caps[1].parse().ok()?;
    let suffix = &caps[2];
    let end = if suffix.len() == 4 {
        suffix.parse().ok()?
    } else {
        let modulus = 10_i32.pow(suffix.len() as u32);
        (start / modulus) * modulus + suffix.parse::<i32>().ok()?
    };
    EventDate::year_range(start, end)
}

/// `EEE MMM dd HH:mm:ss zzz yyyy`, e.g. `Thu Mar 01 13:00:00 UTC 2007`.
/// The zone token is dropped; times are taken as-is.
fn parse_verbose(s: &str) -> Option<NaiveDateTime> {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    if tokens.len() != 6 {
        return None;
    }
    let without_zone = format!(
        "{} {} {} {} {}",
        tokens[0], tokens[1], tokens[2], tokens[3], tokens[5]
    );
    NaiveDateTime::parse_from_str(&without_zone, "%a %b %d %H:%M:%S %Y").ok()
}

fn iso_verbose_date_time(s: &str) -> Option<EventDate> {
    parse_verbose(s).map(EventDate::single)
}

fn iso_verbose_date_time_range(s: &str) -> Option<EventDate> {
    let (left, right) = s.split_once('/')?;
    let start = parse_verbose(left.trim())?;
    let end = parse_verbose(right.trim())?;
    Some(EventDate::range(start, end))
}

/// `yyyy-MM-dd HH:mm:ss` with `-`, `/` or `.` date separators
/// (sub-seconds already stripped).
fn non_iso_date_time(s: &str) -> Option<EventDate> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y.%m.%d %H:%M:%S",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(EventDate::single(dt));
        }
    }
    None
}

/// Day-first forms: `dd-MM-yyyy`, `dd/MM/yyyy`, `dd-MMM-yyyy`,
/// `dd/MMM/yyyy`, `dd MMM yyyy`.
fn non_iso_single_date(s: &str) -> Option<EventDate> {
    const FORMATS: &[&str] = &[
        "%d-%m-%Y",
        "%d/%m/%Y",
        "%d-%b-%Y",
        "%d/%b/%Y",
        "%d %b %Y",
        "%d %B %Y",
    ];
    for fmt in FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(EventDate::single(d.and_hms_opt(0, 0, 0)?));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_iso_datetime_range_with_zone() {
        let ed = parse_date("2007-03-01T13:00:00Z/2008-05-11T15:30:00Z").unwrap();
        assert_eq!(ed.start_year, "2007");
        assert_eq!(ed.end_year, "2008");
        assert_eq!(ed.start_month, "03");
        assert_eq!(ed.end_month, "05");
        assert!(!ed.single_date);
    }

    #[test]
    fn test_month_precision() {
        let ed = parse_date("1906-06").unwrap();
        assert_eq!(ed.start_month, "06");
        assert_eq!(ed.start_year, "1906");
        assert_eq!(ed.start_day, "");
        assert!(ed.single_date);
    }

    #[test]
    fn test_day_date_range() {
        let ed = parse_date("2007-11-13/15").unwrap();
        assert_eq!(
            ed.parsed_start_date.unwrap().date(),
            NaiveDate::from_ymd_opt(2007, 11, 13).unwrap()
        );
        assert_eq!(
            ed.parsed_end_date.unwrap().date(),
            NaiveDate::from_ymd_opt(2007, 11, 15).unwrap()
        );
        assert!(!ed.single_date);
    }

    #[test]
    fn test_future_start_year_rejected() {
        assert_eq!(parse_date("2999-01-01"), None);
    }

    #[test]
    fn test_single_dates() {
        let ed = parse_date("2012-02-29").unwrap();
        assert_eq!(ed.start_day, "29");
        assert!(ed.single_date);

        let ed = parse_date("2012/02/29").unwrap();
        assert_eq!(ed.start_day, "29");

        // strict: no day rollover
        assert_eq!(parse_date("2013-02-29"), None);
    }

    #[test]
    fn test_time_suffixes_and_offsets() {
        let ed = parse_date("2019-09-05T10:22").unwrap();
        assert_eq!(ed.start_day, "05");
        let ed = parse_date("2019-09-05T10:22:33+10:00").unwrap();
        assert_eq!(ed.start_year, "2019");
        assert_eq!(
            ed.parsed_start_date.unwrap(),
            NaiveDate::from_ymd_opt(2019, 9, 5)
                .unwrap()
                .and_hms_opt(10, 22, 33)
                .unwrap()
        );
    }

    #[test]
    fn test_subsecond_stripping() {
        let ed = parse_date("2019-09-05T10:22:33.123Z").unwrap();
        assert_eq!(
            ed.parsed_start_date.unwrap(),
            NaiveDate::from_ymd_opt(2019, 9, 5)
                .unwrap()
                .and_hms_opt(10, 22, 33)
                .unwrap()
        );
    }

    #[test]
    fn test_single_year_forms() {
        let ed = parse_date("1978").unwrap();
        assert_eq!(ed.start_year, "1978");
        assert_eq!(ed.start_month, "");
        assert!(ed.single_date);

        let ed = parse_date("1978-00-00").unwrap();
        assert_eq!(ed.start_year, "1978");
    }

    #[test]
    fn test_month_name_date() {
        let ed = parse_date("2020-March-05").unwrap();
        assert_eq!(ed.start_month, "03");
        assert_eq!(ed.start_day, "05");
    }

    #[test]
    fn test_month_zero_day_form() {
        let ed = parse_date("1906-06-00").unwrap();
        assert_eq!(ed.start_month, "06");
        assert_eq!(ed.start_day, "");
    }

    #[test]
    fn test_mmm_yyyy() {
        let ed = parse_date("Jun-1906").unwrap();
        assert_eq!(ed.start_month, "06");
        assert_eq!(ed.start_year, "1906");
    }

    #[test]
    fn test_day_month_range() {
        let ed = parse_date("2007-11-28/12-02").unwrap();
        assert_eq!(ed.start_month, "11");
        assert_eq!(ed.end_month, "12");
        assert_eq!(ed.end_day, "02");
        assert!(!ed.single_date);
    }

    #[test]
    fn test_datetime_space_range() {
        let ed = parse_date("2007-11-28 13:00:00.123/2007-11-28 15:30:00.456").unwrap();
        assert_eq!(ed.start_year, "2007");
        assert_eq!(
            ed.parsed_end_date.unwrap(),
            NaiveDate::from_ymd_opt(2007, 11, 28)
                .unwrap()
                .and_hms_opt(15, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_month_range_forms() {
        let ed = parse_date("2007-02/04").unwrap();
        assert_eq!(ed.start_month, "02");
        assert_eq!(ed.end_month, "04");
        assert_eq!(ed.start_day, "");
        assert!(!ed.single_date);

        let ed = parse_date("2007-11/2008-02").unwrap();
        assert_eq!(ed.start_year, "2007");
        assert_eq!(ed.end_year, "2008");
    }

    #[test]
    fn test_year_range_suffix_inheritance() {
        let ed = parse_date("1995/1996").unwrap();
        assert_eq!(ed.end_year, "1996");

        let ed = parse_date("2005/6").unwrap();
        assert_eq!(ed.start_year, "2005");
        assert_eq!(ed.end_year, "2006");

        let ed = parse_date("1995/96").unwrap();
        assert_eq!(ed.end_year, "1996");

        let ed = parse_date("1895/902").unwrap();
        assert_eq!(ed.end_year, "1902");
    }

    #[test]
    fn test_verbose_datetime() {
        let ed = parse_date("Thu Mar 01 13:00:00 UTC 2007").unwrap();
        assert_eq!(ed.start_year, "2007");
        assert_eq!(ed.start_month, "03");
        assert_eq!(ed.start_day, "01");

        let ed =
            parse_date("Thu Mar 01 13:00:00 UTC 2007/Fri Mar 02 13:00:00 UTC 2007").unwrap();
        assert!(!ed.single_date);
        assert_eq!(ed.end_day, "02");
    }

    #[test]
    fn test_non_iso_day_first() {
        let ed = parse_date("13-11-2007").unwrap();
        assert_eq!(ed.start_day, "13");
        assert_eq!(ed.start_month, "11");
        assert_eq!(ed.start_year, "2007");

        let ed = parse_date("13/11/2007").unwrap();
        assert_eq!(ed.start_day, "13");

        let ed = parse_date("13-Nov-2007").unwrap();
        assert_eq!(ed.start_month, "11");

        let ed = parse_date("13 Nov 2007").unwrap();
        assert_eq!(ed.start_month, "11");
    }

    #[test]
    fn test_non_iso_datetime_dots() {
        let ed = parse_date("2007.11.13 08:09:10").unwrap();
        assert_eq!(ed.start_day, "13");
    }

    #[test]
    fn test_garbage_and_empty() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("13-13-2007"), None);
    }

    #[test]
    fn test_explicit_bounds() {
        assert!(parse_date_bounded("1500", Some(1400), None).is_some());
        assert_eq!(parse_date_bounded("1500", None, None), None);
    }

    #[test]
    fn test_round_trip_start_year() {
        // every group's representative form yields startYear = year(d)
        let cases = [
            ("2007-03-01", "2007"),
            ("2007", "2007"),
            ("2020-March-05", "2020"),
            ("2007-03-01/2007-03-11", "2007"),
            ("2007-11-13/15", "2007"),
            ("2007-11-28/12-02", "2007"),
            ("2007-11-28 13:00:00.000/2007-11-29 13:00:00.000", "2007"),
            ("2007-11", "2007"),
            ("2007-02/04", "2007"),
            ("2007-11/2008-02", "2007"),
            ("2007/2008", "2007"),
            ("Thu Mar 01 13:00:00 UTC 2007", "2007"),
            ("2007-11-13 08:09:10", "2007"),
            ("13-11-2007", "2007"),
        ];
        for (input, year) in cases {
            let ed = parse_date(input)
                .unwrap_or_else(|| panic!("failed to parse {input}"));
            assert_eq!(ed.start_year, year, "input {input}");
        }
    }
}
