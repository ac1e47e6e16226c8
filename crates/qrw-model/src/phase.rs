//! Phase keys
//!
//! A template phase is addressed by a key of the form `stage<N>` with
//! `1 <= N <= 99`. Keys form a sparse set: deleting `stage2` leaves `stage1`
//! and `stage3` valid, and cloned projects keep whatever sequence the
//! template had at clone time.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Highest phase number a template may carry
pub const MAX_PHASE: u8 = 99;

/// Validated `stage<N>` phase key, ordered by phase number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhaseKey(u8);

impl PhaseKey {
    /// Build a key from a phase number
    ///
    /// # Errors
    /// Returns [`PhaseKeyError::OutOfRange`] unless `1 <= number <= 99`.
    pub fn from_number(number: u8) -> Result<Self, PhaseKeyError> {
        if number == 0 || number > MAX_PHASE {
            return Err(PhaseKeyError::OutOfRange(number));
        }
        Ok(Self(number))
    }

    /// Phase number (1-based)
    #[inline]
    #[must_use]
    pub fn number(&self) -> u8 {
        self.0
    }

    /// Key of the following phase, if one can exist
    #[inline]
    #[must_use]
    pub fn next(&self) -> Option<PhaseKey> {
        (self.0 < MAX_PHASE).then(|| PhaseKey(self.0 + 1))
    }

    /// Default human display name (`Phase <N>`)
    #[inline]
    #[must_use]
    pub fn default_display_name(&self) -> String {
        format!("Phase {}", self.0)
    }
}

impl FromStr for PhaseKey {
    type Err = PhaseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("stage")
            .ok_or_else(|| PhaseKeyError::InvalidFormat(s.to_string()))?;
        if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PhaseKeyError::InvalidFormat(s.to_string()));
        }
        let number: u8 = digits
            .parse()
            .map_err(|_| PhaseKeyError::InvalidFormat(s.to_string()))?;
        Self::from_number(number)
    }
}

impl std::fmt::Display for PhaseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stage{}", self.0)
    }
}

impl Serialize for PhaseKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PhaseKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Phase key validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhaseKeyError {
    /// Key does not match `stage<N>`
    #[error("invalid phase key {0:?}, expected stage<1-99>")]
    InvalidFormat(String),

    /// Phase number outside 1..=99
    #[error("phase number {0} out of range 1..=99")]
    OutOfRange(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_keys() {
        assert_eq!("stage1".parse::<PhaseKey>().unwrap().number(), 1);
        assert_eq!("stage99".parse::<PhaseKey>().unwrap().number(), 99);
    }

    #[test]
    fn rejects_malformed_keys() {
        for bad in ["stage0", "stage100", "stage", "phase1", "stage1a", "Stage1", "stage 1"] {
            assert!(bad.parse::<PhaseKey>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn orders_numerically() {
        let a: PhaseKey = "stage2".parse().unwrap();
        let b: PhaseKey = "stage10".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn next_stops_at_max() {
        let last = PhaseKey::from_number(MAX_PHASE).unwrap();
        assert!(last.next().is_none());
        assert_eq!(
            PhaseKey::from_number(1).unwrap().next(),
            Some(PhaseKey::from_number(2).unwrap())
        );
    }

    #[test]
    fn display_round_trips() {
        let key: PhaseKey = "stage7".parse().unwrap();
        assert_eq!(key.to_string(), "stage7");
        assert_eq!(key.default_display_name(), "Phase 7");
    }

    proptest::proptest! {
        #[test]
        fn prop_every_valid_number_round_trips(n in 1u8..=99) {
            let key = PhaseKey::from_number(n).unwrap();
            let parsed: PhaseKey = key.to_string().parse().unwrap();
            proptest::prop_assert_eq!(parsed, key);
        }
    }
}
