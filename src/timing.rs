//! Transition time encoding.
//!
//! Mesh models carry durations as a single byte: the upper two bits select a
//! step resolution and the lower six bits count steps. The all-ones step
//! pattern (`0x3F`) is reserved and means "unknown".
//!
//! Conversions are pure functions. Encoding is coarser than milliseconds,
//! so the round trip is lossy in one direction only:
//!
//! ```rust
//! use meshstate::timing::{encoded_to_millis, millis_to_encoded};
//!
//! // 2 steps of 100 ms
//! assert_eq!(encoded_to_millis(0x02), 200);
//! assert_eq!(millis_to_encoded(200), 0x02);
//!
//! // 250 ms cannot be represented exactly and rounds down
//! assert_eq!(millis_to_encoded(250), 0x02);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Step count reserved for "unknown".
pub const UNKNOWN_STEPS: u8 = 0x3F;

/// Largest usable step count.
pub const MAX_STEPS: u8 = 0x3E;

const STEPS_MASK: u8 = 0x3F;
const RESOLUTION_SHIFT: u8 = 6;

/// Step resolution selected by the two most significant bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// 100 milliseconds per step
    Millis100,
    /// 1 second per step
    Second,
    /// 10 seconds per step
    TenSeconds,
    /// 10 minutes per step
    TenMinutes,
}

impl Resolution {
    /// Duration of one step in milliseconds.
    pub const fn step_ms(self) -> u32 {
        match self {
            Self::Millis100 => 100,
            Self::Second => 1_000,
            Self::TenSeconds => 10_000,
            Self::TenMinutes => 600_000,
        }
    }

    /// Longest duration representable at this resolution.
    pub const fn max_ms(self) -> u32 {
        self.step_ms() * MAX_STEPS as u32
    }

    const fn bits(self) -> u8 {
        match self {
            Self::Millis100 => 0,
            Self::Second => 1,
            Self::TenSeconds => 2,
            Self::TenMinutes => 3,
        }
    }

    const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Millis100,
            1 => Self::Second,
            2 => Self::TenSeconds,
            _ => Self::TenMinutes,
        }
    }
}

/// Encoded transition time.
///
/// Wraps the raw byte so that encoded and millisecond durations cannot be
/// confused at call sites.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionTime(u8);

impl TransitionTime {
    /// Zero steps: the change is immediate.
    pub const IMMEDIATE: Self = Self(0);

    /// Reserved step pattern, duration not known.
    pub const UNKNOWN: Self = Self(UNKNOWN_STEPS);

    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn steps(self) -> u8 {
        self.0 & STEPS_MASK
    }

    pub const fn resolution(self) -> Resolution {
        Resolution::from_bits(self.0 >> RESOLUTION_SHIFT)
    }

    pub const fn is_unknown(self) -> bool {
        self.steps() == UNKNOWN_STEPS
    }

    /// Duration in milliseconds, `None` for the reserved pattern.
    pub const fn as_millis(self) -> Option<u32> {
        if self.is_unknown() {
            None
        } else {
            Some(self.steps() as u32 * self.resolution().step_ms())
        }
    }

    /// Encode a duration, choosing the finest resolution whose range holds it.
    ///
    /// Durations beyond the ten-minute range saturate to [`TransitionTime::UNKNOWN`].
    pub const fn from_millis(ms: u32) -> Self {
        let resolution = if ms > Resolution::TenMinutes.max_ms() {
            return Self::UNKNOWN;
        } else if ms > Resolution::TenSeconds.max_ms() {
            Resolution::TenMinutes
        } else if ms > Resolution::Second.max_ms() {
            Resolution::TenSeconds
        } else if ms > Resolution::Millis100.max_ms() {
            Resolution::Second
        } else {
            Resolution::Millis100
        };

        let steps = (ms / resolution.step_ms()) as u8;
        Self((resolution.bits() << RESOLUTION_SHIFT) | steps)
    }

    /// True when [`TransitionTime::from_millis`] would produce exactly this byte.
    pub const fn is_canonical(self) -> bool {
        match self.as_millis() {
            Some(ms) => Self::from_millis(ms).0 == self.0,
            None => false,
        }
    }
}

impl fmt::Debug for TransitionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_millis() {
            Some(ms) => write!(f, "TransitionTime({:#04x}, {}ms)", self.0, ms),
            None => write!(f, "TransitionTime({:#04x}, unknown)", self.0),
        }
    }
}

impl From<u8> for TransitionTime {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

/// Decode an encoded transition time. The reserved pattern decodes to 0.
pub const fn encoded_to_millis(encoded: u8) -> u32 {
    match TransitionTime::from_raw(encoded).as_millis() {
        Some(ms) => ms,
        None => 0,
    }
}

/// Encode milliseconds, rounding down to the chosen resolution.
pub const fn millis_to_encoded(ms: u32) -> u8 {
    TransitionTime::from_millis(ms).raw()
}

/// Wall-clock length of a delay expressed in 5 ms units.
pub const fn delay_units_to_millis(delay_units: u8) -> u32 {
    delay_units as u32 * 5
}
