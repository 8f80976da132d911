use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Durable 64-bit identity of a referenceable object.
///
/// `0` means unset: the object has not been registered yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(u64);

impl Uid {
    pub const UNSET: Uid = Uid(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }

    /// The reference token written into documents: the raw bits as a signed
    /// 64-bit integer.
    pub const fn to_token(self) -> i64 {
        self.0 as i64
    }

    pub const fn from_token(token: i64) -> Self {
        Self(token as u64)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Uid {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Uid)
    }
}

impl From<u64> for Uid {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_preserves_all_bits() {
        let uid = Uid::new(u64::MAX - 3);
        assert!(uid.to_token() < 0);
        assert_eq!(Uid::from_token(uid.to_token()), uid);
    }

    #[test]
    fn decimal_text_form() {
        let uid: Uid = "18446744073709551615".parse().unwrap();
        assert_eq!(uid.get(), u64::MAX);
        assert_eq!(uid.to_string(), "18446744073709551615");
        assert!("12a".parse::<Uid>().is_err());
    }
}
