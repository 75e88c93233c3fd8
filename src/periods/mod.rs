//! Period specifiers → concrete calendar dates.

use crate::error::InputError;
use crate::models::Period;
use chrono::{Months, NaiveDate, TimeDelta};

/// Parse a single specifier: `N` is days, `Ny` is calendar years.
pub fn parse_period(s: &str) -> Result<Period, InputError> {
    let s = s.trim();
    let invalid = || InputError::InvalidPeriod(s.to_string());

    match s.strip_suffix('y') {
        Some(years) => years.parse().map(Period::Years).map_err(|_| invalid()),
        None => s.parse().map(Period::Days).map_err(|_| invalid()),
    }
}

pub fn parse_periods<S: AsRef<str>>(specs: &[S]) -> Result<Vec<Period>, InputError> {
    if specs.is_empty() {
        return Err(InputError::NoPeriods);
    }
    specs.iter().map(|s| parse_period(s.as_ref())).collect()
}

/// `today` minus the period. Year steps are calendar-aware: Feb 29 clamps to
/// Feb 28 in a non-leap target year.
pub fn resolve_date(today: NaiveDate, period: Period) -> Result<NaiveDate, InputError> {
    let out_of_range = || InputError::DateOutOfRange(period.to_string());

    match period {
        Period::Days(n) => {
            let delta = TimeDelta::try_days(n).ok_or_else(out_of_range)?;
            today.checked_sub_signed(delta).ok_or_else(out_of_range)
        }
        Period::Years(n) => {
            let months = n
                .unsigned_abs()
                .checked_mul(12)
                .map(Months::new)
                .ok_or_else(out_of_range)?;
            let shifted = if n >= 0 {
                today.checked_sub_months(months)
            } else {
                today.checked_add_months(months)
            };
            shifted.ok_or_else(out_of_range)
        }
    }
}

/// Resolve every period and order the dates most recent first. Periods that
/// land on the same day share one slot.
pub fn resolve_dates(today: NaiveDate, periods: &[Period]) -> Result<Vec<NaiveDate>, InputError> {
    let mut dates = periods
        .iter()
        .map(|&p| resolve_date(today, p))
        .collect::<Result<Vec<_>, _>>()?;

    dates.sort_unstable_by(|a, b| b.cmp(a));
    dates.dedup();
    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_period() {
        assert_eq!(parse_period("30").unwrap(), Period::Days(30));
        assert_eq!(parse_period("2y").unwrap(), Period::Years(2));
        assert_eq!(parse_period("-7").unwrap(), Period::Days(-7));
        assert_eq!(parse_period(" 90 ").unwrap(), Period::Days(90));
    }

    #[test]
    fn test_parse_period_rejects_non_integers() {
        for bad in ["3m", "1.5", "y", "abc", "", "2.5y"] {
            assert!(
                matches!(parse_period(bad), Err(InputError::InvalidPeriod(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_periods_requires_at_least_one() {
        let empty: [&str; 0] = [];
        assert!(matches!(parse_periods(&empty), Err(InputError::NoPeriods)));
        assert_eq!(parse_periods(&["30", "1y"]).unwrap().len(), 2);
    }

    #[test]
    fn test_resolve_days_and_years() {
        let today = d(2024, 6, 14);
        assert_eq!(resolve_date(today, Period::Days(30)).unwrap(), d(2024, 5, 15));
        assert_eq!(resolve_date(today, Period::Days(0)).unwrap(), today);
        assert_eq!(resolve_date(today, Period::Years(5)).unwrap(), d(2019, 6, 14));
        assert_eq!(resolve_date(today, Period::Days(-1)).unwrap(), d(2024, 6, 15));
    }

    #[test]
    fn test_year_step_from_leap_day() {
        let leap_day = d(2024, 2, 29);
        assert_eq!(resolve_date(leap_day, Period::Years(1)).unwrap(), d(2023, 2, 28));
        assert_eq!(resolve_date(leap_day, Period::Years(4)).unwrap(), d(2020, 2, 29));
    }

    #[test]
    fn test_resolve_dates_sorted_most_recent_first() {
        let today = d(2024, 6, 14);
        let periods = [Period::Days(365), Period::Days(30), Period::Years(2)];
        let dates = resolve_dates(today, &periods).unwrap();
        assert_eq!(dates, vec![d(2024, 5, 15), d(2023, 6, 15), d(2022, 6, 14)]);
    }

    #[test]
    fn test_resolve_dates_collapses_duplicates() {
        let today = d(2025, 3, 1);
        // 365 days back from 2025-03-01 is the same day as one year back.
        let periods = [Period::Years(1), Period::Days(365)];
        assert_eq!(resolve_dates(today, &periods).unwrap(), vec![d(2024, 3, 1)]);
    }

    #[test]
    fn test_resolve_out_of_range() {
        let today = d(2024, 1, 1);
        assert!(matches!(
            resolve_date(today, Period::Days(i64::MAX)),
            Err(InputError::DateOutOfRange(_))
        ));
    }
}
