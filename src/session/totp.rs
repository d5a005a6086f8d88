//! Time-based one-time passcodes for the venue login (RFC 6238, SHA-1, 6 digits, 30 s).

use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::AuthError;

const DIGITS: usize = 6;
const STEP_SECS: u64 = 30;

/// Derives login passcodes from the shared base32 secret
#[derive(Clone)]
pub struct PasscodeGenerator {
    totp: TOTP,
}

impl std::fmt::Debug for PasscodeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasscodeGenerator").finish_non_exhaustive()
    }
}

impl PasscodeGenerator {
    /// Accepts the secret the way authenticator apps display it: spaces, lowercase
    /// and trailing padding are tolerated.
    pub fn from_base32(secret: &str) -> Result<Self, AuthError> {
        let normalized: String = secret
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '=')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let bytes = Secret::Encoded(normalized)
            .to_bytes()
            .map_err(|e| AuthError::Totp(format!("secret is not valid base32: {e:?}")))?;

        if bytes.is_empty() {
            return Err(AuthError::Totp("secret is empty".to_string()));
        }

        // Venue-issued secrets may be shorter than the 128 bits `TOTP::new` insists on.
        let totp = TOTP::new_unchecked(Algorithm::SHA1, DIGITS, 1, STEP_SECS, bytes);
        Ok(Self { totp })
    }

    /// Passcode for the current wall-clock time
    pub fn current(&self) -> Result<String, AuthError> {
        self.totp
            .generate_current()
            .map_err(|e| AuthError::Totp(format!("system clock error: {e}")))
    }

    /// Passcode for an explicit unix timestamp
    pub fn generate_at(&self, unix_secs: u64) -> String {
        self.totp.generate(unix_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // base32("12345678901234567890"), the RFC 6238 SHA-1 seed
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn rfc6238_vectors_truncated_to_six_digits() {
        let generator = PasscodeGenerator::from_base32(RFC_SECRET).unwrap();
        assert_eq!(generator.generate_at(59), "287082");
        assert_eq!(generator.generate_at(1_111_111_109), "081804");
        assert_eq!(generator.generate_at(1_234_567_890), "005924");
    }

    #[test]
    fn same_window_same_code() {
        let generator = PasscodeGenerator::from_base32(RFC_SECRET).unwrap();
        assert_eq!(generator.generate_at(60), generator.generate_at(89));
        assert_ne!(generator.generate_at(89), generator.generate_at(90));
    }

    #[test]
    fn tolerates_display_formatting() {
        let spaced = PasscodeGenerator::from_base32("gezd gnbv gy3t qojq gezd gnbv gy3t qojq").unwrap();
        assert_eq!(spaced.generate_at(59), "287082");
    }

    #[test]
    fn current_code_is_six_digits() {
        let generator = PasscodeGenerator::from_base32(RFC_SECRET).unwrap();
        let code = generator.current().unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn rejects_non_base32() {
        assert!(matches!(
            PasscodeGenerator::from_base32("not-base32!"),
            Err(AuthError::Totp(_))
        ));
        assert!(PasscodeGenerator::from_base32("   ").is_err());
    }
}
