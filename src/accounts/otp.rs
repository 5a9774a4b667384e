//! One-time passcodes for password reset.
//!
//! A user holds at most one pending code. Issuing a new one overwrites the
//! old one, and a successful confirmation clears it.

use rand::Rng;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

pub const OTP_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("Invalid OTP")]
    Invalid,
    #[error("OTP expired")]
    Expired,
}

/// Uniformly random, zero-padded six digit code.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

pub fn is_well_formed(code: &str) -> bool {
    code.len() == OTP_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

/// Checks a submitted code against the stored one.
///
/// Existence and equality are checked before expiry, so a matching but stale
/// code reports `Expired`. Expiry is only evaluated when an issuance time was
/// recorded.
pub fn check(
    stored: Option<&str>,
    issued_at: Option<OffsetDateTime>,
    submitted: &str,
    now: OffsetDateTime,
    window: Duration,
) -> Result<(), OtpError> {
    // TODO: cap failed verifications per issued code.
    match stored {
        Some(code) if code == submitted => {}
        _ => return Err(OtpError::Invalid),
    }
    if let Some(issued_at) = issued_at {
        if now - issued_at > window {
            return Err(OtpError::Expired);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::seconds(900);

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert!(is_well_formed(&code), "bad code {code}");
        }
    }

    #[test]
    fn well_formed_rejects_non_digits_and_wrong_length() {
        assert!(is_well_formed("000123"));
        assert!(!is_well_formed("12345"));
        assert!(!is_well_formed("1234567"));
        assert!(!is_well_formed("12a456"));
    }

    #[test]
    fn missing_code_is_invalid() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(check(None, None, "123456", now, WINDOW), Err(OtpError::Invalid));
    }

    #[test]
    fn mismatch_is_invalid_for_every_other_code() {
        let now = OffsetDateTime::now_utc();
        for submitted in ["000000", "123455", "123457", "654321", "999999"] {
            assert_eq!(
                check(Some("123456"), Some(now), submitted, now, WINDOW),
                Err(OtpError::Invalid)
            );
        }
    }

    #[test]
    fn matching_code_past_window_is_expired() {
        let now = OffsetDateTime::now_utc();
        let issued = now - Duration::seconds(901);
        assert_eq!(
            check(Some("123456"), Some(issued), "123456", now, WINDOW),
            Err(OtpError::Expired)
        );
    }

    #[test]
    fn mismatch_wins_over_expiry() {
        let now = OffsetDateTime::now_utc();
        let issued = now - Duration::hours(2);
        assert_eq!(
            check(Some("123456"), Some(issued), "111111", now, WINDOW),
            Err(OtpError::Invalid)
        );
    }

    #[test]
    fn boundary_of_window_is_still_valid() {
        let now = OffsetDateTime::now_utc();
        let issued = now - WINDOW;
        assert_eq!(check(Some("042042"), Some(issued), "042042", now, WINDOW), Ok(()));
    }

    #[test]
    fn missing_timestamp_skips_expiry() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(check(Some("042042"), None, "042042", now, WINDOW), Ok(()));
    }
}
