//! Rule-based US equity market holidays (NYSE / NASDAQ share the schedule).

use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::collections::BTreeSet;

/// One-off closures that no rule produces.
const SPECIAL_CLOSURES: &[(i32, u32, u32)] = &[
    (2001, 9, 11), // September 11
    (2001, 9, 12),
    (2001, 9, 13),
    (2001, 9, 14),
    (2004, 6, 11),  // Reagan national day of mourning
    (2007, 1, 2),   // Ford national day of mourning
    (2012, 10, 29), // Hurricane Sandy
    (2012, 10, 30),
    (2018, 12, 5), // G.H.W. Bush national day of mourning
    (2025, 1, 9),  // Carter national day of mourning
];

/// All full-day closures for the given year.
pub fn us_equity_holidays(year: i32) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(10);

    // New Year's Day: Sunday rolls to Monday, Saturday is not made up.
    if let Some(jan1) = ymd(year, 1, 1) {
        match jan1.weekday() {
            Weekday::Sat => {}
            Weekday::Sun => out.extend(ymd(year, 1, 2)),
            _ => out.push(jan1),
        }
    }

    if year >= 1998 {
        out.extend(nth_weekday(year, 1, Weekday::Mon, 3)); // Martin Luther King Jr. Day
    }
    out.extend(nth_weekday(year, 2, Weekday::Mon, 3)); // Washington's Birthday
    out.extend(easter_sunday(year).and_then(|e| e.checked_sub_days(Days::new(2)))); // Good Friday
    out.extend(last_weekday(year, 5, Weekday::Mon)); // Memorial Day
    if year >= 2022 {
        out.extend(ymd(year, 6, 19).map(observed)); // Juneteenth
    }
    out.extend(ymd(year, 7, 4).map(observed)); // Independence Day
    out.extend(nth_weekday(year, 9, Weekday::Mon, 1)); // Labor Day
    out.extend(nth_weekday(year, 11, Weekday::Thu, 4)); // Thanksgiving
    out.extend(ymd(year, 12, 25).map(observed)); // Christmas

    out.extend(
        SPECIAL_CLOSURES
            .iter()
            .filter(|(y, _, _)| *y == year)
            .filter_map(|&(y, m, d)| ymd(y, m, d)),
    );

    out.sort_unstable();
    out
}

pub fn us_equity_holidays_between(first_year: i32, last_year: i32) -> BTreeSet<NaiveDate> {
    (first_year..=last_year).flat_map(us_equity_holidays).collect()
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Saturday holidays are observed on Friday, Sunday ones on Monday.
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date.pred_opt().unwrap_or(date),
        Weekday::Sun => date.succ_opt().unwrap_or(date),
        _ => date,
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        ymd(year + 1, 1, 1)?
    } else {
        ymd(year, month + 1, 1)?
    };
    let mut day = first_of_next.pred_opt()?;
    while day.weekday() != weekday {
        day = day.pred_opt()?;
    }
    Some(day)
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm).
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    ymd(year, month as u32, day as u32)
}
