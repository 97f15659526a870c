use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Inclusion
///
/// Which range bounds are inclusive. Two-bit mask: LOW = 1, HIGH = 2.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Inclusion(u8);

impl Inclusion {
    pub const NEITHER: Self = Self(0);
    pub const LOW: Self = Self(1);
    pub const HIGH: Self = Self(2);
    pub const BOTH: Self = Self(3);

    #[must_use]
    pub const fn new(low: bool, high: bool) -> Self {
        Self((low as u8) | ((high as u8) << 1))
    }

    #[must_use]
    pub const fn low(self) -> bool {
        self.0 & Self::LOW.0 != 0
    }

    #[must_use]
    pub const fn high(self) -> bool {
        self.0 & Self::HIGH.0 != 0
    }

    #[must_use]
    pub const fn with_low(self, low: bool) -> Self {
        Self::new(low, self.high())
    }

    #[must_use]
    pub const fn with_high(self, high: bool) -> Self {
        Self::new(self.low(), high)
    }

    /// Swap the low and high bits (descending collation).
    #[must_use]
    pub const fn reversed(self) -> Self {
        Self::new(self.high(), self.low())
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Inclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match (self.low(), self.high()) {
            (false, false) => "NEITHER",
            (true, false) => "LOW",
            (false, true) => "HIGH",
            (true, true) => "BOTH",
        };
        f.write_str(label)
    }
}
