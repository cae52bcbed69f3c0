//! SSTV mode catalog
//!
//! Immutable, process-wide timing tables for the six supported modes. The
//! encoder and the decoder both walk the same segment layouts, so their
//! timing assumptions cannot diverge.
//!
//! A transmission is a sequence of *line groups*. Each group is a list of
//! timed segments and paints `rows_per_group` image rows (two for PD90, one
//! for everything else). Robot 36 alternates between two layouts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SstvError};

// ============================================================================
// Frequencies (Hz)
// ============================================================================

/// Sync pulse tone
pub const SYNC_FREQ: f64 = 1200.0;

/// Tone for intensity 0
pub const BLACK_FREQ: f64 = 1500.0;

/// Tone for intensity 255
pub const WHITE_FREQ: f64 = 2300.0;

/// Default porch/separator tone
pub const PORCH_FREQ: f64 = 1500.0;

/// Map an 8-bit intensity to its tone frequency
#[inline]
pub fn intensity_to_freq(value: u8) -> f64 {
    BLACK_FREQ + value as f64 * (WHITE_FREQ - BLACK_FREQ) / 255.0
}

/// Map a tone frequency back to an 8-bit intensity, clamped to [0, 255]
#[inline]
pub fn freq_to_intensity(freq: f64) -> u8 {
    let value = (freq - BLACK_FREQ) / (WHITE_FREQ - BLACK_FREQ) * 255.0;
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

// ============================================================================
// Types
// ============================================================================

/// Identifier of a supported mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModeId {
    MartinM1,
    MartinM2,
    ScottieS1,
    ScottieS2,
    Robot36,
    Pd90,
}

impl ModeId {
    /// Every supported mode, in catalog order
    pub const ALL: [ModeId; 6] = [
        ModeId::MartinM1,
        ModeId::MartinM2,
        ModeId::ScottieS1,
        ModeId::ScottieS2,
        ModeId::Robot36,
        ModeId::Pd90,
    ];

    /// Canonical mode name
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// The catalog entry for this mode
    pub fn spec(self) -> &'static ModeSpec {
        match self {
            ModeId::MartinM1 => &MARTIN_M1,
            ModeId::MartinM2 => &MARTIN_M2,
            ModeId::ScottieS1 => &SCOTTIE_S1,
            ModeId::ScottieS2 => &SCOTTIE_S2,
            ModeId::Robot36 => &ROBOT_36,
            ModeId::Pd90 => &PD_90,
        }
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ModeId {
    type Err = SstvError;

    fn from_str(s: &str) -> Result<Self> {
        lookup(s).map(|spec| spec.id)
    }
}

/// Color component carried by a scan segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Red,
    Green,
    Blue,
    Luma,
    ChromaR,
    ChromaB,
}

/// How a mode encodes color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Separate red, green and blue scans
    Rgb,
    /// Full-range luma plus red/blue color difference
    YCrCb,
}

/// One timed piece of a line group
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    /// Sync pulse at [`SYNC_FREQ`]
    Sync { ms: f64 },
    /// Constant tone (porch, separator)
    Porch { ms: f64, freq: f64 },
    /// Pixel scan of one component; `rows` are group-relative rows it paints
    Scan {
        ms: f64,
        component: Component,
        rows: &'static [usize],
    },
}

impl Segment {
    /// Duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        match *self {
            Segment::Sync { ms } | Segment::Porch { ms, .. } | Segment::Scan { ms, .. } => ms,
        }
    }
}

/// Immutable timing record of one mode
#[derive(Debug)]
pub struct ModeSpec {
    pub id: ModeId,
    pub name: &'static str,
    pub width: usize,
    pub height: usize,
    /// 7-bit VIS code announcing the mode
    pub vis_code: u8,
    pub color_space: ColorSpace,
    pub rows_per_group: usize,
    /// Group layouts, cycled by group index
    pub layouts: &'static [&'static [Segment]],
}

impl ModeSpec {
    /// Number of line groups in a full transmission
    pub fn groups(&self) -> usize {
        self.height / self.rows_per_group
    }

    /// Segment layout used by group `group`
    pub fn layout(&self, group: usize) -> &'static [Segment] {
        self.layouts[group % self.layouts.len()]
    }

    /// Duration of one line group in milliseconds
    pub fn group_duration_ms(&self) -> f64 {
        self.layouts[0].iter().map(Segment::duration_ms).sum()
    }

    /// Average duration of one image row in milliseconds
    pub fn line_duration_ms(&self) -> f64 {
        self.group_duration_ms() / self.rows_per_group as f64
    }

    /// Duration of the image part of a transmission in milliseconds
    pub fn transmission_duration_ms(&self) -> f64 {
        (0..self.groups())
            .map(|g| self.layout(g).iter().map(Segment::duration_ms).sum::<f64>())
            .sum()
    }

    /// Duration of the sync pulse in milliseconds
    pub fn sync_duration_ms(&self) -> f64 {
        self.layouts[0]
            .iter()
            .find_map(|s| match *s {
                Segment::Sync { ms } => Some(ms),
                _ => None,
            })
            .unwrap_or(0.0)
    }

    /// Offset of the sync pulse from the start of group `group`, in ms
    ///
    /// Zero for every family except Scottie, whose sync sits before the
    /// red scan.
    pub fn sync_offset_ms(&self, group: usize) -> f64 {
        let mut offset = 0.0;
        for segment in self.layout(group) {
            if let Segment::Sync { .. } = segment {
                return offset;
            }
            offset += segment.duration_ms();
        }
        0.0
    }

    /// Check the catalog invariants for this mode
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.width == 0 || self.height == 0 || self.rows_per_group == 0 {
            return Err(format!("{}: empty geometry", self.name));
        }
        if self.height % self.rows_per_group != 0 {
            return Err(format!("{}: height not a multiple of group rows", self.name));
        }
        let nominal = self.group_duration_ms();
        for layout in self.layouts {
            let mut syncs = 0;
            let mut total = 0.0;
            for segment in layout.iter() {
                if segment.duration_ms() <= 0.0 {
                    return Err(format!("{}: non-positive segment duration", self.name));
                }
                total += segment.duration_ms();
                match segment {
                    Segment::Sync { .. } => syncs += 1,
                    Segment::Scan { rows, .. } => {
                        if rows.is_empty() || rows.iter().any(|&r| r >= self.rows_per_group) {
                            return Err(format!("{}: scan row out of group", self.name));
                        }
                    }
                    Segment::Porch { .. } => {}
                }
            }
            if syncs != 1 {
                return Err(format!("{}: layout needs exactly one sync", self.name));
            }
            if (total - nominal).abs() > 1e-9 {
                return Err(format!("{}: layouts differ in duration", self.name));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Catalog
// ============================================================================

const R0: &[usize] = &[0];
const R1: &[usize] = &[1];
const R01: &[usize] = &[0, 1];

const fn sync(ms: f64) -> Segment {
    Segment::Sync { ms }
}

const fn porch(ms: f64, freq: f64) -> Segment {
    Segment::Porch { ms, freq }
}

const fn scan(ms: f64, component: Component, rows: &'static [usize]) -> Segment {
    Segment::Scan {
        ms,
        component,
        rows,
    }
}

const MARTIN_SEP: f64 = 0.572;

const MARTIN_M1_LINE: &[Segment] = &[
    sync(4.862),
    porch(MARTIN_SEP, PORCH_FREQ),
    scan(146.432, Component::Green, R0),
    porch(MARTIN_SEP, PORCH_FREQ),
    scan(146.432, Component::Blue, R0),
    porch(MARTIN_SEP, PORCH_FREQ),
    scan(146.432, Component::Red, R0),
    porch(MARTIN_SEP, PORCH_FREQ),
];

const MARTIN_M2_LINE: &[Segment] = &[
    sync(4.862),
    porch(MARTIN_SEP, PORCH_FREQ),
    scan(73.216, Component::Green, R0),
    porch(MARTIN_SEP, PORCH_FREQ),
    scan(73.216, Component::Blue, R0),
    porch(MARTIN_SEP, PORCH_FREQ),
    scan(73.216, Component::Red, R0),
    porch(MARTIN_SEP, PORCH_FREQ),
];

const SCOTTIE_SEP: f64 = 1.5;

const SCOTTIE_S1_LINE: &[Segment] = &[
    porch(SCOTTIE_SEP, PORCH_FREQ),
    scan(138.24, Component::Green, R0),
    porch(SCOTTIE_SEP, PORCH_FREQ),
    scan(138.24, Component::Blue, R0),
    sync(9.0),
    porch(SCOTTIE_SEP, PORCH_FREQ),
    scan(138.24, Component::Red, R0),
];

const SCOTTIE_S2_LINE: &[Segment] = &[
    porch(SCOTTIE_SEP, PORCH_FREQ),
    scan(88.064, Component::Green, R0),
    porch(SCOTTIE_SEP, PORCH_FREQ),
    scan(88.064, Component::Blue, R0),
    sync(9.0),
    porch(SCOTTIE_SEP, PORCH_FREQ),
    scan(88.064, Component::Red, R0),
];

const ROBOT_36_EVEN: &[Segment] = &[
    sync(9.0),
    porch(3.0, PORCH_FREQ),
    scan(88.0, Component::Luma, R0),
    porch(4.5, 1500.0),
    porch(1.5, 1900.0),
    scan(44.0, Component::ChromaR, R0),
];

const ROBOT_36_ODD: &[Segment] = &[
    sync(9.0),
    porch(3.0, PORCH_FREQ),
    scan(88.0, Component::Luma, R0),
    porch(4.5, 2300.0),
    porch(1.5, 1900.0),
    scan(44.0, Component::ChromaB, R0),
];

const PD_90_GROUP: &[Segment] = &[
    sync(20.0),
    porch(2.08, PORCH_FREQ),
    scan(170.24, Component::Luma, R0),
    scan(170.24, Component::ChromaR, R01),
    scan(170.24, Component::ChromaB, R01),
    scan(170.24, Component::Luma, R1),
];

pub static MARTIN_M1: ModeSpec = ModeSpec {
    id: ModeId::MartinM1,
    name: "MartinM1",
    width: 320,
    height: 256,
    vis_code: 44,
    color_space: ColorSpace::Rgb,
    rows_per_group: 1,
    layouts: &[MARTIN_M1_LINE],
};

pub static MARTIN_M2: ModeSpec = ModeSpec {
    id: ModeId::MartinM2,
    name: "MartinM2",
    width: 160,
    height: 256,
    vis_code: 40,
    color_space: ColorSpace::Rgb,
    rows_per_group: 1,
    layouts: &[MARTIN_M2_LINE],
};

pub static SCOTTIE_S1: ModeSpec = ModeSpec {
    id: ModeId::ScottieS1,
    name: "ScottieS1",
    width: 320,
    height: 256,
    vis_code: 60,
    color_space: ColorSpace::Rgb,
    rows_per_group: 1,
    layouts: &[SCOTTIE_S1_LINE],
};

pub static SCOTTIE_S2: ModeSpec = ModeSpec {
    id: ModeId::ScottieS2,
    name: "ScottieS2",
    width: 160,
    height: 256,
    vis_code: 56,
    color_space: ColorSpace::Rgb,
    rows_per_group: 1,
    layouts: &[SCOTTIE_S2_LINE],
};

pub static ROBOT_36: ModeSpec = ModeSpec {
    id: ModeId::Robot36,
    name: "Robot36",
    width: 320,
    height: 240,
    vis_code: 8,
    color_space: ColorSpace::YCrCb,
    rows_per_group: 1,
    layouts: &[ROBOT_36_EVEN, ROBOT_36_ODD],
};

pub static PD_90: ModeSpec = ModeSpec {
    id: ModeId::Pd90,
    name: "PD90",
    width: 320,
    height: 256,
    vis_code: 99,
    color_space: ColorSpace::YCrCb,
    rows_per_group: 2,
    layouts: &[PD_90_GROUP],
};

/// The whole catalog in display order
pub static MODES: [&ModeSpec; 6] = [
    &MARTIN_M1,
    &MARTIN_M2,
    &SCOTTIE_S1,
    &SCOTTIE_S2,
    &ROBOT_36,
    &PD_90,
];

/// Look up a mode by name
///
/// Matching ignores case, spaces, dashes and underscores, and accepts the
/// short forms `m1`, `m2`, `s1`, `s2`, `r36`.
///
/// # Errors
/// * `UnknownMode` - If no catalog entry matches
pub fn lookup(name: &str) -> Result<&'static ModeSpec> {
    let key: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let id = match key.as_str() {
        "martinm1" | "martin1" | "m1" => ModeId::MartinM1,
        "martinm2" | "martin2" | "m2" => ModeId::MartinM2,
        "scotties1" | "scottie1" | "s1" => ModeId::ScottieS1,
        "scottie2" | "scotties2" | "s2" => ModeId::ScottieS2,
        "robot36" | "r36" => ModeId::Robot36,
        "pd90" => ModeId::Pd90,
        _ => {
            return Err(SstvError::UnknownMode {
                name: name.to_string(),
            })
        }
    };
    Ok(id.spec())
}
