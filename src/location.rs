//! The fixed observer location of the bike-share network.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// A named place on Earth with its civil time zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub name: &'static str,
    pub region: &'static str,
    pub timezone: Tz,
    /// Degrees, north positive.
    pub latitude: f64,
    /// Degrees, east positive.
    pub longitude: f64,
}

impl Location {
    pub const fn london() -> Self {
        Self {
            name: "London",
            region: "England",
            timezone: chrono_tz::Europe::London,
            latitude: 51.507351,
            longitude: -0.127758,
        }
    }

    /// The instant local midnight starts `date`, or `None` when a time-zone
    /// transition skips it.
    pub fn day_start(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .earliest()
            .map(|t| t.with_timezone(&Utc))
    }

    /// The local calendar date `instant` falls on.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.timezone)
    }
}
