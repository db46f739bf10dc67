//! The one-hour correction window on a day's attendance.
//!
//! The first save of the day starts the window. Once it has passed, the teacher path treats the
//! sheet as closed; administrator corrections ignore it.

use chrono::{Local, NaiveDateTime, TimeDelta, TimeZone};

/// How long a day's sheet stays editable after its first recorded entry.
pub const LOCK_WINDOW: TimeDelta = TimeDelta::minutes(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockInfo {
    pub locked: bool,
    /// When the sheet closes (or closed). `None` while nothing has been recorded.
    pub lock_at: Option<NaiveDateTime>,
}

impl LockInfo {
    /// Computes the lock state from the `recorded_at` timestamps of a day's existing records.
    pub fn from_recorded_at<I>(recorded_at: I, now: NaiveDateTime) -> Self
    where
        I: IntoIterator<Item = NaiveDateTime>,
    {
        match recorded_at.into_iter().min() {
            None => Self::default(),
            Some(earliest) => {
                let lock_at = earliest + LOCK_WINDOW;
                Self {
                    locked: now > lock_at,
                    lock_at: Some(lock_at),
                }
            }
        }
    }
}

/// Formats a UTC `lock_at` as the wall-clock time in `tz`, e.g. "09:00".
pub fn clock_time_in<Tz>(lock_at: NaiveDateTime, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    tz.from_utc_datetime(&lock_at).format("%H:%M").to_string()
}

/// Formats a UTC `lock_at` in the local time zone.
pub fn local_clock_time(lock_at: NaiveDateTime) -> String {
    clock_time_in(lock_at, &Local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn no_records_means_unlocked() {
        let info = LockInfo::from_recorded_at(Vec::new(), at("2024-05-13 23:59:00"));
        assert_eq!(
            info,
            LockInfo {
                locked: false,
                lock_at: None
            }
        );
    }

    #[test]
    fn window_starts_at_the_earliest_record() {
        let records = [
            at("2024-05-13 08:20:00"),
            at("2024-05-13 08:05:00"),
            at("2024-05-13 08:45:00"),
        ];

        let info = LockInfo::from_recorded_at(records, at("2024-05-13 08:50:00"));
        assert_eq!(info.lock_at, Some(at("2024-05-13 09:05:00")));
        assert!(!info.locked);
    }

    #[test]
    fn lock_is_strictly_after_the_deadline() {
        let records = [at("2024-05-13 08:00:00")];

        assert!(!LockInfo::from_recorded_at(records, at("2024-05-13 09:00:00")).locked);
        assert!(LockInfo::from_recorded_at(records, at("2024-05-13 09:00:01")).locked);
        assert!(LockInfo::from_recorded_at(records, at("2024-05-13 09:01:00")).locked);
    }

    #[test]
    fn deadline_is_shown_in_the_users_time_zone() {
        let lock_at = at("2024-05-13 12:00:00");

        let brasilia = FixedOffset::west_opt(3 * 3600).unwrap();
        assert_eq!(clock_time_in(lock_at, &brasilia), "09:00");
        assert_eq!(clock_time_in(lock_at, &chrono::Utc), "12:00");
    }
}
