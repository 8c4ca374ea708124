use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of digits in a national taxpayer number (CPF).
pub const EXTERNAL_ID_LEN: usize = 11;

/// Number of leading digits that the check digits are computed over.
const BASE_LEN: usize = 9;

/// Why a candidate external ID was rejected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum ExternalIdError {
    #[error("expected 11 digits, found {0}")]
    WrongLength(usize),
    #[error("all digits are identical")]
    RepeatedDigits,
    #[error("check digits do not match")]
    BadCheckDigits,
}

/// A validated, normalised national identity number.
///
/// Always exactly eleven ASCII digits: punctuation such as `529.982.247-25`
/// is stripped before validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalId(String);

impl ExternalId {
    /// Normalise and validate a candidate identity string.
    pub fn parse(raw: &str) -> Result<Self, ExternalIdError> {
        let digits: Vec<u32> = raw.chars().filter_map(|c| c.to_digit(10)).collect();
        if digits.len() != EXTERNAL_ID_LEN {
            return Err(ExternalIdError::WrongLength(digits.len()));
        }
        if digits.iter().all(|&d| d == digits[0]) {
            return Err(ExternalIdError::RepeatedDigits);
        }

        let mut base = [0; BASE_LEN];
        base.copy_from_slice(&digits[..BASE_LEN]);
        let [first, second] = check_digits(&base);
        if digits[9] != first || digits[10] != second {
            return Err(ExternalIdError::BadCheckDigits);
        }

        Ok(Self(digits.iter().map(|d| char::from(b'0' + *d as u8)).collect()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Compute both check digits for a nine-digit base.
pub fn check_digits(base: &[u32; BASE_LEN]) -> [u32; 2] {
    let first = check_digit(base.iter().copied(), 10);
    let second = check_digit(base.iter().copied().chain([first]), 11);
    [first, second]
}

/// Weighted mod-11 check digit. Weights count down from `top_weight`.
fn check_digit(digits: impl Iterator<Item = u32>, top_weight: u32) -> u32 {
    let sum: u32 = digits
        .zip((2..=top_weight).rev())
        .map(|(digit, weight)| digit * weight)
        .sum();
    match 11 - sum % 11 {
        d if d >= 10 => 0,
        d => d,
    }
}

impl Display for ExternalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ExternalId {
    type Err = ExternalIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ExternalId {
    type Error = ExternalIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ExternalId> for String {
    fn from(id: ExternalId) -> Self {
        id.0
    }
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use rand::Rng;

    use super::*;

    impl ExternalId {
        pub fn example() -> Self {
            Self::parse("52998224725").unwrap()
        }

        pub fn example2() -> Self {
            Self::parse("11144477735").unwrap()
        }

        pub fn example3() -> Self {
            Self::parse("39053344705").unwrap()
        }

        /// A random valid identity, for tests that need many distinct voters.
        pub fn random() -> Self {
            let mut rng = rand::thread_rng();
            loop {
                let mut base = [0; BASE_LEN];
                for digit in base.iter_mut() {
                    *digit = rng.gen_range(0..10);
                }
                let digits = base
                    .iter()
                    .chain(check_digits(&base).iter())
                    .map(|d| d.to_string())
                    .collect::<String>();
                if let Ok(id) = Self::parse(&digits) {
                    return id;
                }
            }
        }
    }
}
