//! RGB colours with HSL interpolation.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Differences below this are treated as zero when converting to HSL.
const FLOAT_ERROR: f64 = 5e-7;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hex colour {0:?}")]
pub struct ColorError(pub String);

/// An RGB colour with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    r: f64,
    g: f64,
    b: f64,
}

/// Hue, saturation and lightness, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl Color {
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f64 / 255.0,
            g: g as f64 / 255.0,
            b: b as f64 / 255.0,
        }
    }

    /// Parses `#rrggbb` or `#rgb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Result<Self, ColorError> {
        let digits = hex.trim().trim_start_matches('#');
        let invalid = || ColorError(hex.to_string());
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        match digits.len() {
            6 => Ok(Self::from_rgb8(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            3 => {
                let short = |i: usize| channel(&digits[i..i + 1]).map(|v| v * 17);
                Ok(Self::from_rgb8(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(invalid()),
        }
    }

    pub fn rgb8(&self) -> [u8; 3] {
        let to_u8 = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [to_u8(self.r), to_u8(self.g), to_u8(self.b)]
    }

    /// Lowercase `#rrggbb`.
    pub fn to_hex(&self) -> String {
        let [r, g, b] = self.rgb8();
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    pub fn to_hsl(&self) -> Hsl {
        let (r, g, b) = (self.r, self.g, self.b);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let diff = max - min;
        let sum = max + min;
        let l = sum / 2.0;

        if diff < FLOAT_ERROR {
            return Hsl { h: 0.0, s: 0.0, l };
        }

        let s = if l < 0.5 { diff / sum } else { diff / (2.0 - sum) };

        let dr = ((max - r) / 6.0 + diff / 2.0) / diff;
        let dg = ((max - g) / 6.0 + diff / 2.0) / diff;
        let db = ((max - b) / 6.0 + diff / 2.0) / diff;

        let mut h = if r == max {
            db - dg
        } else if g == max {
            1.0 / 3.0 + dr - db
        } else {
            2.0 / 3.0 + dg - dr
        };
        if h < 0.0 {
            h += 1.0;
        }
        if h > 1.0 {
            h -= 1.0;
        }

        Hsl { h, s, l }
    }

    pub fn from_hsl(hsl: Hsl) -> Self {
        let Hsl { h, s, l } = hsl;
        if s == 0.0 {
            return Self { r: l, g: l, b: l };
        }

        let v2 = if l < 0.5 { l * (1.0 + s) } else { (l + s) - s * l };
        let v1 = 2.0 * l - v2;

        Self {
            r: hue_to_rgb(v1, v2, h + 1.0 / 3.0),
            g: hue_to_rgb(v1, v2, h),
            b: hue_to_rgb(v1, v2, h - 1.0 / 3.0),
        }
    }

    /// `steps` colours going from `self` to `end` through HSL space, both
    /// ends included.
    pub fn range_to(&self, end: &Color, steps: usize) -> Vec<Color> {
        match steps {
            0 => Vec::new(),
            1 => vec![*self],
            _ => {
                let from = self.to_hsl();
                let to = end.to_hsl();
                let n = (steps - 1) as f64;
                (0..steps)
                    .map(|i| {
                        let t = i as f64 / n;
                        Color::from_hsl(Hsl {
                            h: from.h + (to.h - from.h) * t,
                            s: from.s + (to.s - from.s) * t,
                            l: from.l + (to.l - from.l) * t,
                        })
                    })
                    .collect()
            }
        }
    }
}

fn hue_to_rgb(v1: f64, v2: f64, hue: f64) -> f64 {
    let h = hue.rem_euclid(1.0);
    if 6.0 * h < 1.0 {
        v1 + (v2 - v1) * 6.0 * h
    } else if 2.0 * h < 1.0 {
        v2
    } else if 3.0 * h < 2.0 {
        v1 + (v2 - v1) * (2.0 / 3.0 - h) * 6.0
    } else {
        v1
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::from_hex(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
