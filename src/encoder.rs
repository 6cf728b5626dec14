use serde::{Deserialize, Serialize};

use crate::constants::{BASE_SIZE_METERS, REFERENCE_SCALE};

/// 8-bit RGBA color as handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const YELLOW: Rgba = Rgba::opaque(255, 255, 0);
    pub const ORANGE: Rgba = Rgba::opaque(255, 165, 0);
    pub const ORANGE_RED: Rgba = Rgba::opaque(255, 69, 0);
    pub const RED: Rgba = Rgba::opaque(255, 0, 0);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// `#rrggbb`, for legends and popups
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Magnitude bands used for coloring. Each band includes its lower bound
/// and excludes its upper bound, so 5.0 is `Strong`, not `Light`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnitudeBand {
    Minor,
    Light,
    Strong,
    Major,
}

impl MagnitudeBand {
    pub const ALL: [MagnitudeBand; 4] = [
        MagnitudeBand::Minor,
        MagnitudeBand::Light,
        MagnitudeBand::Strong,
        MagnitudeBand::Major,
    ];

    pub fn of(magnitude: f64) -> Self {
        if magnitude < 3.0 {
            MagnitudeBand::Minor
        } else if magnitude < 5.0 {
            MagnitudeBand::Light
        } else if magnitude < 7.0 {
            MagnitudeBand::Strong
        } else {
            MagnitudeBand::Major
        }
    }

    pub fn color(self) -> Rgba {
        match self {
            MagnitudeBand::Minor => Rgba::YELLOW,
            MagnitudeBand::Light => Rgba::ORANGE,
            MagnitudeBand::Strong => Rgba::ORANGE_RED,
            MagnitudeBand::Major => Rgba::RED,
        }
    }

    pub fn lower_bound(self) -> Option<f64> {
        match self {
            MagnitudeBand::Minor => None,
            MagnitudeBand::Light => Some(3.0),
            MagnitudeBand::Strong => Some(5.0),
            MagnitudeBand::Major => Some(7.0),
        }
    }

    pub fn upper_bound(self) -> Option<f64> {
        match self {
            MagnitudeBand::Minor => Some(3.0),
            MagnitudeBand::Light => Some(5.0),
            MagnitudeBand::Strong => Some(7.0),
            MagnitudeBand::Major => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MagnitudeBand::Minor => "M < 3",
            MagnitudeBand::Light => "3 ≤ M < 5",
            MagnitudeBand::Strong => "5 ≤ M < 7",
            MagnitudeBand::Major => "M ≥ 7",
        }
    }
}

/// Marker color for a magnitude. Fixed for the lifetime of a marker.
pub fn color_for(magnitude: f64) -> Rgba {
    MagnitudeBand::of(magnitude).color()
}

/// Marker edge length in meters for a magnitude at the given viewing scale.
///
/// Scales with the inverse square root of the viewing scale relative to
/// `REFERENCE_SCALE`, so apparent size stays roughly constant across zoom
/// levels while larger quakes remain larger. Anything below magnitude 1
/// gets the base size.
///
/// `viewing_scale` must be positive; callers guard before calling.
pub fn size_for(magnitude: f64, viewing_scale: f64) -> f64 {
    let nominal = BASE_SIZE_METERS.max(magnitude * BASE_SIZE_METERS);
    nominal / (viewing_scale / REFERENCE_SCALE).sqrt()
}

/// True when `scale` can be fed to [`size_for`]
pub fn is_usable_scale(scale: f64) -> bool {
    scale.is_finite() && scale > 0.0
}
