// 🔁 Recurrence - replicate an expenditure over the following months

use chrono::{Datelike, NaiveDate};
use std::fmt;

/// Message attached to the occurrences field when a month lacks the day
pub const INVALID_DATES_MESSAGE: &str = "All expenditures must occur on valid dates.";

// ============================================================================
// OCCURRENCES
// ============================================================================

/// How many times an expenditure occurs, starting with its own date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Occurrences {
    #[default]
    Unique,
    NextTwoMonths,
    NextThreeMonths,
    NextFourMonths,
    NextFiveMonths,
    NextSixMonths,
    ForthcomingYear,
}

impl Occurrences {
    pub const ALL: [Occurrences; 7] = [
        Occurrences::Unique,
        Occurrences::NextTwoMonths,
        Occurrences::NextThreeMonths,
        Occurrences::NextFourMonths,
        Occurrences::NextFiveMonths,
        Occurrences::NextSixMonths,
        Occurrences::ForthcomingYear,
    ];

    pub fn count(&self) -> u32 {
        match self {
            Occurrences::Unique => 1,
            Occurrences::NextTwoMonths => 2,
            Occurrences::NextThreeMonths => 3,
            Occurrences::NextFourMonths => 4,
            Occurrences::NextFiveMonths => 5,
            Occurrences::NextSixMonths => 6,
            Occurrences::ForthcomingYear => 12,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Occurrences::Unique => "unique",
            Occurrences::NextTwoMonths => "next two months",
            Occurrences::NextThreeMonths => "next three months",
            Occurrences::NextFourMonths => "next four months",
            Occurrences::NextFiveMonths => "next five months",
            Occurrences::NextSixMonths => "next six months",
            Occurrences::ForthcomingYear => "forthcoming year",
        }
    }

    pub fn from_count(count: u32) -> Option<Self> {
        Occurrences::ALL.into_iter().find(|o| o.count() == count)
    }
}

impl fmt::Display for Occurrences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// DATE GENERATION
// ============================================================================

/// The same day of the next month; December rolls over to January.
///
/// `None` when the next month has no such day (31st, Feb 29...).
pub fn next_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, date.day())
}

/// Dates of the copies following `start`: one per extra occurrence, each
/// a month after the previous one.
///
/// Fails with [`INVALID_DATES_MESSAGE`] as soon as one date does not
/// exist; no partial list is returned.
pub fn following_dates(
    start: NaiveDate,
    occurrences: Occurrences,
) -> Result<Vec<NaiveDate>, &'static str> {
    let extra = occurrences.count().saturating_sub(1) as usize;
    let mut dates = Vec::with_capacity(extra);
    let mut current = start;

    for _ in 0..extra {
        current = next_month(current).ok_or(INVALID_DATES_MESSAGE)?;
        dates.push(current);
    }

    Ok(dates)
}
