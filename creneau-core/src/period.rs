use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::ReserveError;

/// Calendar month used as the availability query and cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        // month is validated at construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("valid year-month")
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn next(&self) -> YearMonth {
        if self.month == 12 {
            YearMonth { year: self.year + 1, month: 1 }
        } else {
            YearMonth { year: self.year, month: self.month + 1 }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ReserveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ReserveError::Validation(format!("invalid month: {s:?}, expected YYYY-MM"));
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(Self { year, month })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let ym: YearMonth = "2026-03".parse().unwrap();
        assert_eq!(ym, YearMonth { year: 2026, month: 3 });
        assert_eq!(ym.to_string(), "2026-03");
        assert_eq!(ym.first_day(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("2026".parse::<YearMonth>().is_err());
        assert!("2026-13".parse::<YearMonth>().is_err());
        assert!("2026-0".parse::<YearMonth>().is_err());
        assert!("march".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_next_rolls_over_december() {
        let ym = YearMonth { year: 2026, month: 12 };
        assert_eq!(ym.next(), YearMonth { year: 2027, month: 1 });
        let ym = YearMonth { year: 2026, month: 3 };
        assert_eq!(ym.next(), YearMonth { year: 2026, month: 4 });
    }

    #[test]
    fn test_contains() {
        let ym: YearMonth = "2026-03".parse().unwrap();
        assert!(ym.contains(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()));
        assert!(!ym.contains(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()));
    }
}
