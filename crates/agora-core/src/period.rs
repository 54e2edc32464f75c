//! Time-window facet for events.
//!
//! `periodOfTime` does not map to a join table. Each value is turned into a
//! concrete window relative to the current instant, anchored to local
//! midnights in the configured time zone, and compared against the event's
//! own start/end timestamps.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::Error;

// =============================================================================
// PERIOD VALUES
// =============================================================================

/// Enumerated values of the time-window facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Period {
    /// Ongoing or upcoming (applied when the facet is absent).
    #[default]
    Now,
    ThisWeek,
    NextWeek,
    ThisMonth,
    NextMonth,
    /// Already ended.
    Past,
}

impl Period {
    pub const ALL: [Period; 6] = [
        Period::Now,
        Period::ThisWeek,
        Period::NextWeek,
        Period::ThisMonth,
        Period::NextMonth,
        Period::Past,
    ];

    /// Wire slug.
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Now => "now",
            Self::ThisWeek => "thisWeek",
            Self::NextWeek => "nextWeek",
            Self::ThisMonth => "thisMonth",
            Self::NextMonth => "nextMonth",
            Self::Past => "past",
        }
    }

    /// Default English title, used when no label catalog entry exists.
    pub fn default_title(&self) -> &'static str {
        match self {
            Self::Now => "Now and upcoming",
            Self::ThisWeek => "This week",
            Self::NextWeek => "Next week",
            Self::ThisMonth => "This month",
            Self::NextMonth => "Next month",
            Self::Past => "Past",
        }
    }

    /// Concrete window for this value at instant `now` in time zone `tz`.
    pub fn window(&self, now: DateTime<Utc>, tz: Tz) -> PeriodWindow {
        let today = now.with_timezone(&tz).date_naive();
        match self {
            Self::Now => PeriodWindow::EndsAfter(now),
            Self::Past => PeriodWindow::EndedBy(now),
            Self::ThisWeek => PeriodWindow::Intersects {
                start: now,
                end: local_midnight(tz, next_monday(today)),
            },
            Self::NextWeek => {
                let monday = next_monday(today);
                PeriodWindow::Intersects {
                    start: local_midnight(tz, monday),
                    end: local_midnight(tz, monday + Days::new(7)),
                }
            }
            Self::ThisMonth => PeriodWindow::Intersects {
                start: now,
                end: local_midnight(tz, first_of_next_month(today)),
            },
            Self::NextMonth => {
                let first = first_of_next_month(today);
                PeriodWindow::Intersects {
                    start: local_midnight(tz, first),
                    end: local_midnight(tz, first_of_next_month(first)),
                }
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_slug())
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .into_iter()
            .find(|p| p.as_slug() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown periodOfTime value: {}", s)))
    }
}

// =============================================================================
// WINDOWS
// =============================================================================

/// Condition a period imposes on an event's `[start_time, end_time]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodWindow {
    /// `end_time >= at`
    EndsAfter(DateTime<Utc>),
    /// `end_time <= at`
    EndedBy(DateTime<Utc>),
    /// Event interval intersects `[start, end)`:
    /// `start_time < end AND end_time >= start`.
    Intersects {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl PeriodWindow {
    /// Evaluate the window against an event's timestamps.
    pub fn matches(&self, event_start: DateTime<Utc>, event_end: DateTime<Utc>) -> bool {
        match *self {
            Self::EndsAfter(at) => event_end >= at,
            Self::EndedBy(at) => event_end <= at,
            Self::Intersects { start, end } => event_start < end && event_end >= start,
        }
    }
}

/// The Monday strictly after `date` (a Monday maps to the following one).
fn next_monday(date: NaiveDate) -> NaiveDate {
    let offset = 7 - u64::from(date.weekday().num_days_from_monday());
    date + Days::new(offset)
}

fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .unwrap_or(NaiveDate::MAX)
}

/// 00:00 local time on `date`, as UTC.
///
/// Falls back to the first instant after a DST gap, then to UTC midnight.
fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            let one_am = date.and_hms_opt(1, 0, 0)?;
            tz.from_local_datetime(&one_am).earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Berlin;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_period_slugs_round_trip() {
        for p in Period::ALL {
            assert_eq!(p.as_slug().parse::<Period>().unwrap(), p);
        }
        assert!("yesterday".parse::<Period>().is_err());
    }

    #[test]
    fn test_default_is_now() {
        assert_eq!(Period::default(), Period::Now);
    }

    #[test]
    fn test_now_and_past() {
        let now = utc(2026, 10, 14, 12, 0);
        assert_eq!(Period::Now.window(now, Berlin), PeriodWindow::EndsAfter(now));
        assert_eq!(Period::Past.window(now, Berlin), PeriodWindow::EndedBy(now));
    }

    #[test]
    fn test_this_week_ends_next_monday_local_midnight() {
        // Wednesday 2026-10-14, Berlin is UTC+2 (CEST).
        let now = utc(2026, 10, 14, 12, 0);
        let window = Period::ThisWeek.window(now, Berlin);
        assert_eq!(
            window,
            PeriodWindow::Intersects {
                start: now,
                end: utc(2026, 10, 18, 22, 0),
            }
        );
    }

    #[test]
    fn test_monday_this_week_runs_a_full_week() {
        // Monday 2026-10-12 10:00 local.
        let now = utc(2026, 10, 12, 8, 0);
        match Period::ThisWeek.window(now, Berlin) {
            PeriodWindow::Intersects { end, .. } => assert_eq!(end, utc(2026, 10, 18, 22, 0)),
            other => panic!("unexpected window {other:?}"),
        }
    }

    #[test]
    fn test_next_week_spans_dst_change() {
        // DST ends 2026-10-25; next week starts Monday 2026-10-26 (CET, UTC+1).
        let now = utc(2026, 10, 21, 12, 0);
        assert_eq!(
            Period::NextWeek.window(now, Berlin),
            PeriodWindow::Intersects {
                start: utc(2026, 10, 25, 23, 0),
                end: utc(2026, 11, 1, 23, 0),
            }
        );
    }

    #[test]
    fn test_month_windows_wrap_year() {
        let now = utc(2026, 12, 10, 9, 0);
        assert_eq!(
            Period::ThisMonth.window(now, Berlin),
            PeriodWindow::Intersects {
                start: now,
                end: utc(2026, 12, 31, 23, 0),
            }
        );
        assert_eq!(
            Period::NextMonth.window(now, Berlin),
            PeriodWindow::Intersects {
                start: utc(2026, 12, 31, 23, 0),
                end: utc(2027, 1, 31, 23, 0),
            }
        );
    }

    #[test]
    fn test_local_date_differs_from_utc_date() {
        // 23:30 UTC on Sunday is already Monday in Berlin.
        let now = utc(2026, 10, 18, 23, 30);
        match Period::ThisWeek.window(now, Berlin) {
            PeriodWindow::Intersects { end, .. } => assert_eq!(end, utc(2026, 10, 25, 23, 0)),
            other => panic!("unexpected window {other:?}"),
        }
    }

    #[test]
    fn test_window_matches() {
        let now = utc(2026, 10, 14, 12, 0);
        let week = Period::ThisWeek.window(now, Berlin);

        // Started last week, still running.
        assert!(week.matches(utc(2026, 10, 1, 0, 0), utc(2026, 10, 15, 0, 0)));
        // Starts after the window closes.
        assert!(!week.matches(utc(2026, 10, 19, 0, 0), utc(2026, 10, 19, 2, 0)));
        // Ended before now.
        assert!(!week.matches(utc(2026, 10, 1, 0, 0), utc(2026, 10, 2, 0, 0)));

        let past = Period::Past.window(now, Berlin);
        assert!(past.matches(utc(2026, 10, 1, 0, 0), utc(2026, 10, 2, 0, 0)));
        assert!(!past.matches(utc(2026, 10, 1, 0, 0), utc(2026, 10, 20, 0, 0)));
    }
}
