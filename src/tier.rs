//! Abstract parameter requests: bit tiers for polynomial arithmetic,
//! security tiers for full schemes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Target total modulus size for polynomial scenarios. A target, not a
/// guarantee: backends may reach it only through several CRT primes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BitTier {
    B14,
    B30,
    B60,
    B62,
}

impl BitTier {
    pub const ALL: [BitTier; 4] = [BitTier::B14, BitTier::B30, BitTier::B60, BitTier::B62];

    pub fn bits(self) -> u32 {
        match self {
            BitTier::B14 => 14,
            BitTier::B30 => 30,
            BitTier::B60 => 60,
            BitTier::B62 => 62,
        }
    }
}

impl TryFrom<u32> for BitTier {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self, Error> {
        BitTier::ALL
            .into_iter()
            .find(|t| t.bits() == bits)
            .ok_or_else(|| Error::Config(format!("unknown bit tier {bits} (expected 14, 30, 60 or 62)")))
    }
}

impl From<BitTier> for u32 {
    fn from(t: BitTier) -> u32 {
        t.bits()
    }
}

/// Classical security target of a scheme scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SecurityTier {
    S128,
    S192,
    S256,
}

impl SecurityTier {
    pub const ALL: [SecurityTier; 3] = [SecurityTier::S128, SecurityTier::S192, SecurityTier::S256];

    pub fn bits(self) -> u32 {
        match self {
            SecurityTier::S128 => 128,
            SecurityTier::S192 => 192,
            SecurityTier::S256 => 256,
        }
    }
}

impl TryFrom<u32> for SecurityTier {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self, Error> {
        SecurityTier::ALL
            .into_iter()
            .find(|t| t.bits() == bits)
            .ok_or_else(|| Error::Config(format!("unknown security tier {bits} (expected 128, 192 or 256)")))
    }
}

impl From<SecurityTier> for u32 {
    fn from(t: SecurityTier) -> u32 {
        t.bits()
    }
}

macro_rules! tier_from_str {
    ($ty:ty) => {
        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Error> {
                let bits: u32 = s
                    .trim()
                    .parse()
                    .map_err(|_| Error::Config(format!("not a tier: {s:?}")))?;
                <$ty>::try_from(bits)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.bits())
            }
        }
    };
}

tier_from_str!(BitTier);
tier_from_str!(SecurityTier);

/// Either kind of request, as seen by the parameter mapper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    Bits(BitTier),
    Security(SecurityTier),
}

impl Tier {
    /// Value written in the tier column of the nominal request.
    pub fn nominal(self) -> u32 {
        match self {
            Tier::Bits(t) => t.bits(),
            Tier::Security(t) => t.bits(),
        }
    }
}

impl From<BitTier> for Tier {
    fn from(t: BitTier) -> Self {
        Tier::Bits(t)
    }
}

impl From<SecurityTier> for Tier {
    fn from(t: SecurityTier) -> Self {
        Tier::Security(t)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Bits(t) => write!(f, "{t}-bit"),
            Tier::Security(t) => write!(f, "sec-{t}"),
        }
    }
}
