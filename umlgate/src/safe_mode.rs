//! # Safe Mode Policy
//!
//! Three trust levels that decide which inclusion directives survive sanitization.
//! The levels are totally ordered by an explicit rank:
//!
//! | level    | rank | effect                                                   |
//! |----------|------|----------------------------------------------------------|
//! | `Unsafe` | 0    | every directive is kept                                  |
//! | `Safe`   | 1    | local files only when whitelisted, no remote includes    |
//! | `Secure` | 2    | no local files, no remote includes, whitelist is ignored |
//!
//! Comparisons go through [`SafeMode::rank`], never through declaration order.

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeMode {
    Unsafe,
    Safe,
    #[default]
    Secure,
}

impl SafeMode {
    /// Strictness rank: higher is stricter.
    pub const fn rank(self) -> u8 {
        match self {
            SafeMode::Unsafe => 0,
            SafeMode::Safe => 1,
            SafeMode::Secure => 2,
        }
    }

    /// True when `self` is at least as strict as `other`.
    pub fn is_at_least(self, other: SafeMode) -> bool {
        self.rank() >= other.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SafeMode::Unsafe => "unsafe",
            SafeMode::Safe => "safe",
            SafeMode::Secure => "secure",
        }
    }
}

impl PartialOrd for SafeMode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SafeMode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for SafeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown safe mode '{0}' (expected one of: unsafe, safe, secure)")]
pub struct ParseSafeModeError(pub String);

impl FromStr for SafeMode {
    type Err = ParseSafeModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unsafe" => Ok(SafeMode::Unsafe),
            "safe" => Ok(SafeMode::Safe),
            "secure" => Ok(SafeMode::Secure),
            _ => Err(ParseSafeModeError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks_are_strictly_increasing() {
        assert!(SafeMode::Unsafe.rank() < SafeMode::Safe.rank());
        assert!(SafeMode::Safe.rank() < SafeMode::Secure.rank());
    }

    #[test]
    fn test_ordering_follows_rank() {
        assert!(SafeMode::Unsafe < SafeMode::Safe);
        assert!(SafeMode::Safe < SafeMode::Secure);
        assert_eq!(
            [SafeMode::Secure, SafeMode::Unsafe, SafeMode::Safe]
                .iter()
                .max()
                .copied(),
            Some(SafeMode::Secure)
        );
    }

    #[test]
    fn test_is_at_least() {
        assert!(SafeMode::Secure.is_at_least(SafeMode::Safe));
        assert!(SafeMode::Safe.is_at_least(SafeMode::Safe));
        assert!(!SafeMode::Unsafe.is_at_least(SafeMode::Safe));
    }

    #[test]
    fn test_parse_is_case_insensitive_and_trimmed() {
        assert_eq!(" SECURE ".parse::<SafeMode>(), Ok(SafeMode::Secure));
        assert_eq!("Safe".parse::<SafeMode>(), Ok(SafeMode::Safe));
        assert_eq!("unsafe".parse::<SafeMode>(), Ok(SafeMode::Unsafe));
        assert!("paranoid".parse::<SafeMode>().is_err());
    }

    #[test]
    fn test_default_is_secure() {
        assert_eq!(SafeMode::default(), SafeMode::Secure);
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for mode in [SafeMode::Unsafe, SafeMode::Safe, SafeMode::Secure] {
            assert_eq!(mode.to_string().parse::<SafeMode>(), Ok(mode));
        }
    }
}
