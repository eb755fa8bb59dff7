//! Solar event times for the observer's location.
//!
//! Dawn, sunrise, sunset and dusk come from the `sunrise` crate; solar noon
//! is taken as the midpoint of sunrise and sunset, which is well inside the
//! 15-minute cadence the gradient is sampled at.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sunrise::{Coordinates, DawnType, SolarDay, SolarEvent};
use thiserror::Error;

use crate::location::Location;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolarError {
    #[error("{event} does not occur on {date} at latitude {latitude}")]
    NoEvent {
        event: &'static str,
        date: NaiveDate,
        latitude: f64,
    },
    #[error("invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
    #[error("local midnight does not exist on {0}")]
    NoLocalMidnight(NaiveDate),
    #[error("solar events on {0} are not strictly increasing")]
    OutOfOrder(NaiveDate),
}

/// The five solar events of one day, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolarEvents {
    pub dawn: DateTime<Utc>,
    pub sunrise: DateTime<Utc>,
    pub noon: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub dusk: DateTime<Utc>,
}

/// Normalizes `SolarDay::event_time` results; some releases return the
/// instant directly even when the sun never reaches the altitude.
trait EventInstant {
    fn instant(self) -> Option<DateTime<Utc>>;
}

impl EventInstant for DateTime<Utc> {
    fn instant(self) -> Option<DateTime<Utc>> {
        Some(self)
    }
}

impl EventInstant for Option<DateTime<Utc>> {
    fn instant(self) -> Option<DateTime<Utc>> {
        self
    }
}

/// Computes dawn, sunrise, solar noon, sunset and dusk on `date` at `location`.
pub fn solar_events(date: NaiveDate, location: &Location) -> Result<SolarEvents, SolarError> {
    let invalid = || SolarError::InvalidCoordinates {
        latitude: location.latitude,
        longitude: location.longitude,
    };
    Coordinates::new(location.latitude, location.longitude).ok_or_else(invalid)?;

    // An event that does not occur comes back as NaN-derived garbage or
    // `None`; anything outside the surrounding days is treated as missing.
    let midnight = date.and_time(NaiveTime::MIN).and_utc();
    let plausible = midnight - Duration::days(1)..midnight + Duration::days(2);

    let event = |name: &'static str, kind: SolarEvent| {
        Coordinates::new(location.latitude, location.longitude)
            .and_then(|coord| SolarDay::new(coord, date).event_time(kind).instant())
            .filter(|t| plausible.contains(t))
            .ok_or(SolarError::NoEvent {
                event: name,
                date,
                latitude: location.latitude,
            })
    };

    let dawn = event("dawn", SolarEvent::Dawn(DawnType::Civil))?;
    let sunrise = event("sunrise", SolarEvent::Sunrise)?;
    let sunset = event("sunset", SolarEvent::Sunset)?;
    let dusk = event("dusk", SolarEvent::Dusk(DawnType::Civil))?;

    Ok(SolarEvents {
        dawn,
        sunrise,
        noon: sunrise + (sunset - sunrise) / 2,
        sunset,
        dusk,
    })
}

/// The seven ordered boundaries splitting a local day into six intervals:
/// day start, dawn, sunrise, noon, sunset, dusk and next day start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolarEventSet {
    pub date: NaiveDate,
    boundaries: [DateTime<Utc>; 7],
}

impl SolarEventSet {
    pub fn new(date: NaiveDate, location: &Location) -> Result<Self, SolarError> {
        let day_start = location
            .day_start(date)
            .ok_or(SolarError::NoLocalMidnight(date))?;
        let next_date = date.succ_opt().ok_or(SolarError::OutOfOrder(date))?;
        let next_day_start = location
            .day_start(next_date)
            .ok_or(SolarError::NoLocalMidnight(next_date))?;
        let events = solar_events(date, location)?;

        let boundaries = [
            day_start,
            events.dawn,
            events.sunrise,
            events.noon,
            events.sunset,
            events.dusk,
            next_day_start,
        ];
        if boundaries.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(SolarError::OutOfOrder(date));
        }

        Ok(Self { date, boundaries })
    }

    pub fn boundaries(&self) -> &[DateTime<Utc>; 7] {
        &self.boundaries
    }

    pub fn day_start(&self) -> DateTime<Utc> {
        self.boundaries[0]
    }

    pub fn next_day_start(&self) -> DateTime<Utc> {
        self.boundaries[6]
    }

    pub fn sunrise(&self) -> DateTime<Utc> {
        self.boundaries[2]
    }

    pub fn noon(&self) -> DateTime<Utc> {
        self.boundaries[3]
    }

    pub fn sunset(&self) -> DateTime<Utc> {
        self.boundaries[4]
    }

    /// Length of each interval in minutes, rounded up from whole seconds.
    pub fn interval_minutes(&self) -> [usize; 6] {
        let mut minutes = [0; 6];
        for (slot, pair) in minutes.iter_mut().zip(self.boundaries.windows(2)) {
            let seconds = (pair[1] - pair[0]).num_seconds().max(0) as usize;
            *slot = seconds.div_ceil(60);
        }
        minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn assert_near(actual: DateTime<Utc>, expected: DateTime<Utc>, tolerance_minutes: i64) {
        let diff = (actual - expected).num_minutes().abs();
        assert!(
            diff <= tolerance_minutes,
            "{actual} is {diff} minutes away from {expected}"
        );
    }

    #[test]
    fn test_london_summer_solstice() {
        let events = solar_events(date(2022, 6, 21), &Location::london()).unwrap();
        let utc = |h, m| Utc.with_ymd_and_hms(2022, 6, 21, h, m, 0).unwrap();

        assert_near(events.dawn, utc(2, 56), 4);
        assert_near(events.sunrise, utc(3, 43), 3);
        assert_near(events.noon, utc(12, 2), 2);
        assert_near(events.sunset, utc(20, 21), 3);
        assert_near(events.dusk, utc(21, 8), 4);
    }

    #[test]
    fn test_london_winter_solstice() {
        let events = solar_events(date(2022, 12, 21), &Location::london()).unwrap();
        let utc = |h, m| Utc.with_ymd_and_hms(2022, 12, 21, h, m, 0).unwrap();

        assert_near(events.sunrise, utc(8, 4), 3);
        assert_near(events.noon, utc(11, 58), 2);
        assert_near(events.sunset, utc(15, 53), 3);
    }

    #[test]
    fn test_event_set_is_strictly_increasing() {
        let set = SolarEventSet::new(date(2022, 5, 7), &Location::london()).unwrap();
        assert!(set.boundaries().windows(2).all(|p| p[0] < p[1]));
        let total: usize = set.interval_minutes().iter().sum();
        assert!((1440..=1446).contains(&total));
    }

    #[test]
    fn test_polar_day_is_a_solar_fault() {
        let svalbard = Location {
            name: "Longyearbyen",
            region: "Svalbard",
            timezone: chrono_tz::Arctic::Longyearbyen,
            latitude: 78.2232,
            longitude: 15.6267,
        };
        let err = SolarEventSet::new(date(2022, 6, 21), &svalbard).unwrap_err();
        // the sun never sets, so there is no ordered day to split
        assert!(matches!(
            err,
            SolarError::NoEvent { .. } | SolarError::OutOfOrder(_)
        ));
    }

    #[test]
    fn test_out_of_range_latitude_is_rejected() {
        let nowhere = Location {
            latitude: 123.0,
            ..Location::london()
        };
        let err = solar_events(date(2022, 6, 21), &nowhere).unwrap_err();
        assert!(matches!(err, SolarError::InvalidCoordinates { .. }));
    }
}
