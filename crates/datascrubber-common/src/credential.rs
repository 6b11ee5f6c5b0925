//! Generated master password for a scrub workspace

use rand::Rng;
use std::fmt;

/// Number of hex characters in a generated password
const PASSWORD_LEN: usize = 41;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Master password for a restored workspace.
///
/// Lives only in memory for the lifetime of the process. `Debug` and
/// `Display` are redacted; use [`Password::expose`] to read the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Generate a fresh random password of lowercase hex characters.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let value = (0..PASSWORD_LEN)
            .map(|_| HEX_DIGITS[rng.gen_range(0..HEX_DIGITS.len())] as char)
            .collect();
        Self(value)
    }

    /// The plain-text password, for the modify request and the SQL driver.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

/// Wrap a password that is already known, e.g. for a database not restored by the scrubber.
impl From<String> for Password {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(****)")
    }
}

impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_format() {
        let password = Password::generate();
        assert_eq!(password.expose().len(), PASSWORD_LEN);
        assert!(password.expose().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generate_unique() {
        assert_ne!(Password::generate(), Password::generate());
    }

    #[test]
    fn test_redacted_formatting() {
        let password = Password::generate();
        let debug = format!("{:?}", password);
        let display = password.to_string();

        assert!(!debug.contains(password.expose()));
        assert!(!display.contains(password.expose()));
        assert_eq!(display, "****");
    }
}
