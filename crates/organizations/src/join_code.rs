//! Self-service join codes.

use rand::Rng;
use serde::{Deserialize, Serialize};

use clubhouse_core::{DomainError, DomainResult, ValueObject};

/// Letters taken from the organization name.
pub const PREFIX_LEN: usize = 3;

/// Shortest code that still carries a random part.
pub const MIN_CODE_LEN: usize = PREFIX_LEN + 1;

const FILLER: char = 'X';
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// An organization's join code, e.g. `ROB7Q2`.
///
/// Always uppercase ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JoinCode(String);

impl ValueObject for JoinCode {}

impl JoinCode {
    /// Generate a code of `length` characters for an organization named `name`.
    ///
    /// The first three characters are the first three ASCII letters of the
    /// name, uppercased and filled with `X` when the name has fewer; the rest
    /// is drawn from `[A-Z0-9]`.
    pub fn generate<R: Rng + ?Sized>(name: &str, length: usize, rng: &mut R) -> DomainResult<Self> {
        if length < MIN_CODE_LEN {
            return Err(DomainError::validation(format!(
                "join code length must be at least {MIN_CODE_LEN}"
            )));
        }

        let mut code: String = name
            .chars()
            .filter(char::is_ascii_alphabetic)
            .take(PREFIX_LEN)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        while code.len() < PREFIX_LEN {
            code.push(FILLER);
        }

        for _ in PREFIX_LEN..length {
            let idx = rng.gen_range(0..SUFFIX_ALPHABET.len());
            code.push(char::from(SUFFIX_ALPHABET[idx]));
        }

        Ok(Self(code))
    }

    /// Normalize user input (trim + uppercase) into a code.
    pub fn parse(input: &str) -> DomainResult<Self> {
        let code = input.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(DomainError::validation("organization code is required"));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::validation("organization code must be alphanumeric"));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn prefix(&self) -> &str {
        &self.0[..PREFIX_LEN.min(self.0.len())]
    }
}

impl core::fmt::Display for JoinCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn prefix_comes_from_name_letters() {
        let code = JoinCode::generate("Robotics Club", 8, &mut rng()).unwrap();
        assert_eq!(code.prefix(), "ROB");
        assert_eq!(code.as_str().len(), 8);
        assert!(code.as_str()[3..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn digits_and_symbols_are_skipped_in_prefix() {
        let code = JoinCode::generate("3D & Art", 6, &mut rng()).unwrap();
        assert_eq!(code.prefix(), "DAR");
    }

    #[test]
    fn short_names_are_filled() {
        let code = JoinCode::generate("A1", 6, &mut rng()).unwrap();
        assert_eq!(code.prefix(), "AXX");
        let code = JoinCode::generate("42", 4, &mut rng()).unwrap();
        assert_eq!(code.prefix(), "XXX");
        assert_eq!(code.as_str().len(), 4);
    }

    #[test]
    fn too_short_length_is_rejected() {
        assert!(JoinCode::generate("Robotics", 3, &mut rng()).is_err());
    }

    #[test]
    fn same_seed_same_code() {
        let a = JoinCode::generate("Robotics", 6, &mut rng()).unwrap();
        let b = JoinCode::generate("Robotics", 6, &mut rng()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        assert_eq!(JoinCode::parse("  rob7q2 ").unwrap().as_str(), "ROB7Q2");
        assert!(JoinCode::parse("   ").is_err());
        assert!(JoinCode::parse("ROB-12").is_err());
    }
}
