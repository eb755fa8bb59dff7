//! Background colours that follow the daylight of the observer's location.
//!
//! [`solar`] locates dawn, sunrise, noon, sunset and dusk for a date;
//! [`gradient`] blends the [`Palette`] between those events and samples the
//! result at the animation cadence.

pub mod color;
pub mod gradient;
pub mod solar;

pub use color::Color;
pub use gradient::{ColorGradient, Palette, gradient_for_date};
pub use solar::{SolarError, SolarEventSet, solar_events};
