//! Per-day background colours driven by the position of the sun.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;

use super::color::Color;
use super::solar::{SolarError, SolarEventSet};
use crate::location::Location;
use crate::regularize::{CADENCE_MINUTES, floor_to};

/// Reference colours of the daylight cycle, darkest first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub night: Color,
    pub twilight: Color,
    pub daylight: Color,
    pub noon: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            night: Color::from_rgb8(0x5d, 0x5d, 0x5e),
            twilight: Color::from_rgb8(0x7f, 0x7f, 0x7f),
            daylight: Color::from_rgb8(0xa2, 0xa2, 0xa2),
            noon: Color::from_rgb8(0xc7, 0xc7, 0xc7),
        }
    }
}

impl Palette {
    /// Start and end colour of each of the six solar intervals.
    fn transitions(&self) -> [(Color, Color); 6] {
        [
            (self.night, self.twilight),
            (self.twilight, self.daylight),
            (self.daylight, self.noon),
            (self.noon, self.daylight),
            (self.daylight, self.twilight),
            (self.twilight, self.night),
        ]
    }
}

/// Colour for every cadence step of one local day, keyed by instant.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorGradient {
    pub date: NaiveDate,
    colors: BTreeMap<DateTime<Utc>, String>,
}

impl ColorGradient {
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, instant: &DateTime<Utc>) -> Option<&str> {
        self.colors.get(instant).map(String::as_str)
    }

    /// Colour of the cadence step `instant` falls in.
    pub fn color_at(&self, instant: DateTime<Utc>) -> Option<&str> {
        self.get(&floor_to(instant, Duration::minutes(CADENCE_MINUTES)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Utc>, &str)> {
        self.colors.iter().map(|(t, c)| (t, c.as_str()))
    }

    pub fn first(&self) -> Option<(&DateTime<Utc>, &str)> {
        self.iter().next()
    }
}

/// One colour per minute from the start of the day, each solar interval
/// blending between its two reference colours.
pub fn minute_timeline(events: &SolarEventSet, palette: &Palette) -> Vec<Color> {
    events
        .interval_minutes()
        .iter()
        .zip(palette.transitions())
        .flat_map(|(&minutes, (from, to))| from.range_to(&to, minutes))
        .collect()
}

/// Samples `timeline` every cadence step from the day's start through the
/// next day's start inclusive.
///
/// Entries are keyed by real instants, so a standard day has 97 entries
/// while a clock-change day has 93 (spring) or 101 (autumn).
///
/// Steps past the end of the timeline reuse its last colour; that only
/// happens when the interval lengths sum to exactly the day's length.
pub fn sample_timeline(events: &SolarEventSet, timeline: &[Color]) -> ColorGradient {
    let day_start = events.day_start();
    let day_minutes = (events.next_day_start() - day_start).num_minutes().max(0) as usize;

    let colors = (0..=day_minutes)
        .step_by(CADENCE_MINUTES as usize)
        .filter_map(|minute| {
            let color = timeline.get(minute).or(timeline.last())?;
            Some((day_start + Duration::minutes(minute as i64), color.to_hex()))
        })
        .collect();

    ColorGradient {
        date: events.date,
        colors,
    }
}

/// Computes the daylight gradient of `date` at `location`.
pub fn gradient_for_date(
    date: NaiveDate,
    location: &Location,
    palette: &Palette,
) -> Result<ColorGradient, SolarError> {
    let events = SolarEventSet::new(date, location)?;
    let timeline = minute_timeline(&events, palette);
    Ok(sample_timeline(&events, &timeline))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn channels(hex: &str) -> [u8; 3] {
        Color::from_hex(hex).unwrap().rgb8()
    }

    fn daylight_slots(d: NaiveDate) -> usize {
        let london = Location::london();
        let events = SolarEventSet::new(d, &london).unwrap();
        let gradient = gradient_for_date(d, &london, &Palette::default()).unwrap();
        gradient
            .iter()
            .filter(|(t, _)| **t >= events.sunrise() && **t < events.sunset())
            .count()
    }

    #[test]
    fn test_standard_day_has_97_entries() {
        let gradient =
            gradient_for_date(date(2022, 6, 21), &Location::london(), &Palette::default()).unwrap();
        assert_eq!(gradient.len(), 97);

        let keys: Vec<_> = gradient.iter().map(|(t, _)| *t).collect();
        assert!(keys.windows(2).all(|w| w[1] - w[0] == Duration::minutes(15)));
        assert_eq!(keys[96] - keys[0], Duration::days(1));
    }

    #[test]
    fn test_first_entry_is_night() {
        let palette = Palette::default();
        let gradient = gradient_for_date(date(2022, 5, 7), &Location::london(), &palette).unwrap();
        let (first, color) = gradient.first().unwrap();
        assert_eq!(*first, Location::london().day_start(date(2022, 5, 7)).unwrap());
        assert_eq!(color, palette.night.to_hex());
    }

    #[test]
    fn test_solar_noon_is_noon_colour() {
        let london = Location::london();
        let palette = Palette::default();
        let d = date(2022, 9, 1);
        let events = SolarEventSet::new(d, &london).unwrap();
        let gradient = gradient_for_date(d, &london, &palette).unwrap();

        let (_, nearest) = gradient
            .iter()
            .min_by_key(|(t, _)| (**t - events.noon()).num_seconds().abs())
            .unwrap();

        let expected = palette.noon.rgb8();
        for (actual, expected) in channels(nearest).iter().zip(expected) {
            assert!(actual.abs_diff(expected) <= 2, "{nearest} vs {}", palette.noon);
        }
    }

    #[test]
    fn test_winter_has_fewer_daylight_slots_than_summer() {
        assert!(daylight_slots(date(2022, 12, 21)) < daylight_slots(date(2022, 6, 21)));
    }

    #[test]
    fn test_color_at_floors_to_step() {
        let london = Location::london();
        let gradient = gradient_for_date(date(2022, 5, 7), &london, &Palette::default()).unwrap();
        let step = london.day_start(date(2022, 5, 7)).unwrap() + Duration::hours(13);

        let expected = gradient.get(&step).unwrap();
        assert_eq!(gradient.color_at(step + Duration::minutes(14)), Some(expected));
    }

    #[test]
    fn test_short_day_at_clock_change() {
        // clocks go forward on 2022-03-27, so the local day lasts 23 hours
        let gradient =
            gradient_for_date(date(2022, 3, 27), &Location::london(), &Palette::default()).unwrap();
        assert_eq!(gradient.len(), 93);
    }

    #[test]
    fn test_long_day_at_clock_change() {
        let gradient =
            gradient_for_date(date(2022, 10, 30), &Location::london(), &Palette::default()).unwrap();
        assert_eq!(gradient.len(), 101);
        assert_eq!(gradient.date, date(2022, 10, 30));
    }

    #[test]
    fn test_timeline_covers_the_whole_day() {
        let london = Location::london();
        let events = SolarEventSet::new(date(2022, 6, 21), &london).unwrap();
        let timeline = minute_timeline(&events, &Palette::default());
        assert!(timeline.len() >= 1440);
    }
}
