//! Parsed temporal envelope for an occurrence event.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// Earliest plausible collection year.
pub const MIN_EVENT_YEAR: i32 = 1600;

/// A parsed event date or date range.
///
/// Day/month/year components are kept as zero-padded strings; year-only and
/// month-only forms leave the finer components empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventDate {
    pub parsed_start_date: Option<NaiveDateTime>,
    pub start_day: String,
    pub start_month: String,
    pub start_year: String,

    pub parsed_end_date: Option<NaiveDateTime>,
    pub end_day: String,
    pub end_month: String,
    pub end_year: String,

    /// True when the input denotes a single date (possibly at reduced
    /// precision), false for ranges.
    pub single_date: bool,
}

impl EventDate {
    /// Day-precision single date.
    pub fn single(dt: NaiveDateTime) -> Self {
        let d = dt.date();
        Self {
            parsed_start_date: Some(dt),
            start_day: format!("{:02}", d.day()),
            start_month: format!("{:02}", d.month()),
            start_year: d.year().to_string(),
            parsed_end_date: Some(dt),
            end_day: format!("{:02}", d.day()),
            end_month: format!("{:02}", d.month()),
            end_year: d.year().to_string(),
            single_date: true,
        }
    }

    /// Day-precision range.
    pub fn range(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let s = start.date();
        let e = end.date();
        Self {
            parsed_start_date: Some(start),
            start_day: format!("{:02}", s.day()),
            start_month: format!("{:02}", s.month()),
            start_year: s.year().to_string(),
            parsed_end_date: Some(end),
            end_day: format!("{:02}", e.day()),
            end_month: format!("{:02}", e.month()),
            end_year: e.year().to_string(),
            single_date: false,
        }
    }

    /// Month-precision single date; day components stay empty.
    pub fn month_precision(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = last_day_of_month(year, month)?;
        Some(Self {
            parsed_start_date: Some(start.and_hms_opt(0, 0, 0)?),
            start_day: String::new(),
            start_month: format!("{month:02}"),
            start_year: year.to_string(),
            parsed_end_date: Some(end.and_hms_opt(0, 0, 0)?),
            end_day: String::new(),
            end_month: format!("{month:02}"),
            end_year: year.to_string(),
            single_date: true,
        })
    }

    /// Month-precision range within or across years.
    pub fn month_range(
        start_year: i32,
        start_month: u32,
        end_year: i32,
        end_month: u32,
    ) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(start_year, start_month, 1)?;
        let end = last_day_of_month(end_year, end_month)?;
        Some(Self {
            parsed_start_date: Some(start.and_hms_opt(0, 0, 0)?),
            start_day: String::new(),
            start_month: format!("{start_month:02}"),
            start_year: start_year.to_string(),
            parsed_end_date: Some(end.and_hms_opt(0, 0, 0)?),
            end_day: String::new(),
            end_month: format!("{end_month:02}"),
            end_year: end_year.to_string(),
            single_date: false,
        })
    }

    /// Year-precision single date; day and month components stay empty.
    pub fn year_precision(year: i32) -> Option<Self> {
        let mut ed = Self::year_range(year, year)?;
        ed.single_date = true;
        Some(ed)
    }

    /// Year-precision range; day and month components stay empty.
    pub fn year_range(start_year: i32, end_year: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(start_year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(end_year, 12, 31)?;
        Some(Self {
            parsed_start_date: Some(start.and_hms_opt(0, 0, 0)?),
            start_day: String::new(),
            start_month: String::new(),
            start_year: start_year.to_string(),
            parsed_end_date: Some(end.and_hms_opt(0, 0, 0)?),
            end_day: String::new(),
            end_month: String::new(),
            end_year: end_year.to_string(),
            single_date: false,
        })
    }

    pub fn start_year_num(&self) -> Option<i32> {
        self.start_year.parse().ok()
    }

    pub fn end_year_num(&self) -> Option<i32> {
        self.end_year.parse().ok()
    }

    /// Invariant check: `start_year <= end_year`, `end_year >= min_year`
    /// and `start_year <= max_year`.
    pub fn is_valid_within(&self, min_year: i32, max_year: i32) -> bool {
        let (start, end) = match (self.start_year_num(), self.end_year_num()) {
            (Some(s), Some(e)) => (s, e),
            _ => return false,
        };
        start <= end && end >= min_year && start <= max_year
    }

    /// Invariant check against the defaults: 1600 and the current year.
    pub fn is_valid(&self) -> bool {
        self.is_valid_within(MIN_EVENT_YEAR, chrono::Utc::now().year())
    }
}

/// Last calendar day of a month.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    first_of_next.pred_opt()
}
