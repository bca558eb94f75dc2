//! Temporal types.
//!
//! All absolute and civil timestamps count microseconds from
//! 2000-01-01T00:00:00 (the Postgres epoch); dates count days from
//! 2000-01-01. Sub-microsecond input rounds to nearest, ties to even.

use std::time::SystemTime;

use crate::model::OutOfRangeError;

/// Microseconds between the Unix epoch and 2000-01-01T00:00:00Z.
const POSTGRES_EPOCH_UNIX_MICROS: i64 = 946_684_800_000_000;

/// A point in time, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Datetime {
    pub(crate) micros: i64,
}

/// A calendar date and wall-clock time, without timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalDatetime {
    pub(crate) micros: i64,
}

/// A calendar date without timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalDate {
    pub(crate) days: i32,
}

/// A wall-clock time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalTime {
    pub(crate) micros: u64,
}

/// An exact quantity of time, independent of the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    pub(crate) micros: i64,
}

/// A calendar-aware span: months, days and microseconds are carried
/// separately and never normalized into each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelativeDuration {
    pub(crate) micros: i64,
    pub(crate) days: i32,
    pub(crate) months: i32,
}

/// A span of whole months and days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateDuration {
    pub(crate) days: i32,
    pub(crate) months: i32,
}

/// Round a nanosecond count to microseconds, half to even.
#[allow(dead_code)] // used by the chrono conversions
pub(crate) fn round_nanos_to_micros(nanos: i64) -> i64 {
    let micros = nanos.div_euclid(1000);
    let rem = nanos.rem_euclid(1000);
    match rem.cmp(&500) {
        std::cmp::Ordering::Less => micros,
        std::cmp::Ordering::Greater => micros + 1,
        std::cmp::Ordering::Equal => micros + (micros & 1),
    }
}

impl Datetime {
    pub const MIN: Datetime = Datetime { micros: i64::MIN };
    pub const MAX: Datetime = Datetime { micros: i64::MAX };

    pub fn from_postgres_micros(micros: i64) -> Datetime {
        Datetime { micros }
    }
    pub fn postgres_micros(self) -> i64 {
        self.micros
    }
    pub fn from_unix_micros(micros: i64) -> Result<Datetime, OutOfRangeError> {
        micros
            .checked_sub(POSTGRES_EPOCH_UNIX_MICROS)
            .map(|micros| Datetime { micros })
            .ok_or(OutOfRangeError)
    }
    pub fn unix_micros(self) -> Result<i64, OutOfRangeError> {
        self.micros
            .checked_add(POSTGRES_EPOCH_UNIX_MICROS)
            .ok_or(OutOfRangeError)
    }
}

impl TryFrom<SystemTime> for Datetime {
    type Error = OutOfRangeError;
    fn try_from(value: SystemTime) -> Result<Datetime, Self::Error> {
        let micros = match value.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(dur) => i64::try_from(dur.as_micros()).map_err(|_| OutOfRangeError)?,
            Err(e) => {
                let micros = i64::try_from(e.duration().as_micros()).map_err(|_| OutOfRangeError)?;
                micros.checked_neg().ok_or(OutOfRangeError)?
            }
        };
        Datetime::from_unix_micros(micros)
    }
}

impl TryFrom<Datetime> for SystemTime {
    type Error = OutOfRangeError;
    fn try_from(value: Datetime) -> Result<SystemTime, Self::Error> {
        let unix = value.unix_micros()?;
        let dur = std::time::Duration::from_micros(unix.unsigned_abs());
        let time = if unix >= 0 {
            SystemTime::UNIX_EPOCH.checked_add(dur)
        } else {
            SystemTime::UNIX_EPOCH.checked_sub(dur)
        };
        time.ok_or(OutOfRangeError)
    }
}

impl LocalDatetime {
    pub fn from_postgres_micros(micros: i64) -> LocalDatetime {
        LocalDatetime { micros }
    }
    pub fn postgres_micros(self) -> i64 {
        self.micros
    }
}

impl LocalDate {
    pub fn from_days(days: i32) -> LocalDate {
        LocalDate { days }
    }
    /// Days since 2000-01-01 (may be negative).
    pub fn days(self) -> i32 {
        self.days
    }
}

impl LocalTime {
    pub const MIDNIGHT: LocalTime = LocalTime { micros: 0 };

    pub fn try_from_micros(micros: u64) -> Result<LocalTime, OutOfRangeError> {
        if micros < 86_400_000_000 {
            Ok(LocalTime { micros })
        } else {
            Err(OutOfRangeError)
        }
    }
    pub fn micros(self) -> u64 {
        self.micros
    }
}

impl Duration {
    pub const MIN: Duration = Duration { micros: i64::MIN };
    pub const MAX: Duration = Duration { micros: i64::MAX };

    pub fn from_micros(micros: i64) -> Duration {
        Duration { micros }
    }
    pub fn micros(self) -> i64 {
        self.micros
    }
    pub fn abs_duration(self) -> std::time::Duration {
        std::time::Duration::from_micros(self.micros.unsigned_abs())
    }
    pub fn is_negative(self) -> bool {
        self.micros < 0
    }
}

impl TryFrom<std::time::Duration> for Duration {
    type Error = OutOfRangeError;
    fn try_from(value: std::time::Duration) -> Result<Duration, Self::Error> {
        let micros = i64::try_from(value.as_micros()).map_err(|_| OutOfRangeError)?;
        Ok(Duration { micros })
    }
}

impl RelativeDuration {
    pub fn try_new(micros: i64, days: i32, months: i32) -> RelativeDuration {
        RelativeDuration {
            micros,
            days,
            months,
        }
    }
    pub fn from_micros(micros: i64) -> RelativeDuration {
        RelativeDuration {
            micros,
            days: 0,
            months: 0,
        }
    }
    pub fn from_days(days: i32) -> RelativeDuration {
        RelativeDuration {
            micros: 0,
            days,
            months: 0,
        }
    }
    pub fn from_months(months: i32) -> RelativeDuration {
        RelativeDuration {
            micros: 0,
            days: 0,
            months,
        }
    }
    pub fn micros(self) -> i64 {
        self.micros
    }
    pub fn days(self) -> i32 {
        self.days
    }
    pub fn months(self) -> i32 {
        self.months
    }
}

impl DateDuration {
    pub fn from_days(days: i32) -> DateDuration {
        DateDuration { days, months: 0 }
    }
    pub fn from_months(months: i32) -> DateDuration {
        DateDuration { days: 0, months }
    }
    pub fn days(self) -> i32 {
        self.days
    }
    pub fn months(self) -> i32 {
        self.months
    }
}

#[cfg(feature = "with-chrono")]
mod chrono_interop {
    use super::*;
    use chrono::naive::{NaiveDate, NaiveDateTime, NaiveTime};
    use chrono::{DateTime, Utc};

    const POSTGRES_EPOCH_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2000, 1, 1) {
        Some(date) => date,
        None => panic!("invalid epoch date"),
    };

    impl TryFrom<DateTime<Utc>> for Datetime {
        type Error = OutOfRangeError;
        fn try_from(value: DateTime<Utc>) -> Result<Datetime, Self::Error> {
            let secs = value.timestamp();
            let nanos = value.timestamp_subsec_nanos();
            let unix = secs
                .checked_mul(1_000_000)
                .and_then(|micros| {
                    micros.checked_add(round_nanos_to_micros(nanos as i64))
                })
                .ok_or(OutOfRangeError)?;
            Datetime::from_unix_micros(unix)
        }
    }

    impl TryFrom<Datetime> for DateTime<Utc> {
        type Error = OutOfRangeError;
        fn try_from(value: Datetime) -> Result<DateTime<Utc>, Self::Error> {
            DateTime::from_timestamp_micros(value.unix_micros()?).ok_or(OutOfRangeError)
        }
    }

    impl TryFrom<NaiveDateTime> for LocalDatetime {
        type Error = OutOfRangeError;
        fn try_from(value: NaiveDateTime) -> Result<LocalDatetime, Self::Error> {
            let delta = value.signed_duration_since(POSTGRES_EPOCH_DATE.and_time(NaiveTime::MIN));
            let micros = delta
                .num_seconds()
                .checked_mul(1_000_000)
                .and_then(|micros| {
                    micros.checked_add(round_nanos_to_micros(delta.subsec_nanos() as i64))
                })
                .ok_or(OutOfRangeError)?;
            Ok(LocalDatetime { micros })
        }
    }

    impl TryFrom<LocalDatetime> for NaiveDateTime {
        type Error = OutOfRangeError;
        fn try_from(value: LocalDatetime) -> Result<NaiveDateTime, Self::Error> {
            POSTGRES_EPOCH_DATE
                .and_time(NaiveTime::MIN)
                .checked_add_signed(chrono::TimeDelta::microseconds(value.micros))
                .ok_or(OutOfRangeError)
        }
    }

    impl TryFrom<NaiveDate> for LocalDate {
        type Error = OutOfRangeError;
        fn try_from(value: NaiveDate) -> Result<LocalDate, Self::Error> {
            let days = value.signed_duration_since(POSTGRES_EPOCH_DATE).num_days();
            Ok(LocalDate {
                days: i32::try_from(days)?,
            })
        }
    }

    impl TryFrom<LocalDate> for NaiveDate {
        type Error = OutOfRangeError;
        fn try_from(value: LocalDate) -> Result<NaiveDate, Self::Error> {
            POSTGRES_EPOCH_DATE
                .checked_add_signed(chrono::TimeDelta::days(value.days as i64))
                .ok_or(OutOfRangeError)
        }
    }

    impl TryFrom<NaiveTime> for LocalTime {
        type Error = OutOfRangeError;
        fn try_from(value: NaiveTime) -> Result<LocalTime, Self::Error> {
            let delta = value.signed_duration_since(NaiveTime::MIN);
            let micros =
                delta.num_seconds() * 1_000_000 + round_nanos_to_micros(delta.subsec_nanos() as i64);
            let micros = u64::try_from(micros)?;
            // leap second representation folds into the last second
            LocalTime::try_from_micros(micros.min(86_399_999_999))
        }
    }

    impl TryFrom<LocalTime> for NaiveTime {
        type Error = OutOfRangeError;
        fn try_from(value: LocalTime) -> Result<NaiveTime, Self::Error> {
            NaiveTime::from_num_seconds_from_midnight_opt(
                (value.micros / 1_000_000) as u32,
                ((value.micros % 1_000_000) * 1000) as u32,
            )
            .ok_or(OutOfRangeError)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_epoch_offset() {
        let dt = Datetime::from_unix_micros(0).unwrap();
        assert_eq!(dt.postgres_micros(), -POSTGRES_EPOCH_UNIX_MICROS);
        let back = dt.unix_micros().unwrap();
        assert_eq!(back, 0);
    }

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(round_nanos_to_micros(1_500), 2);
        assert_eq!(round_nanos_to_micros(2_500), 2);
        assert_eq!(round_nanos_to_micros(2_501), 3);
        assert_eq!(round_nanos_to_micros(2_499), 2);
        assert_eq!(round_nanos_to_micros(-500), 0);
    }

    #[test]
    fn local_time_bounds() {
        assert!(LocalTime::try_from_micros(86_400_000_000).is_err());
        assert_eq!(
            LocalTime::try_from_micros(86_399_999_999).unwrap().micros(),
            86_399_999_999
        );
    }

    #[cfg(feature = "with-chrono")]
    #[test]
    fn chrono_date_offsets() {
        use chrono::naive::NaiveDate;
        let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert_eq!(LocalDate::try_from(date).unwrap().days(), 0);
        let date = NaiveDate::from_ymd_opt(2000, 1, 2).unwrap();
        assert_eq!(LocalDate::try_from(date).unwrap().days(), 1);
        let date = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        assert_eq!(LocalDate::try_from(date).unwrap().days(), -1);
    }
}
