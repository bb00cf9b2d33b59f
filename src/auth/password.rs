//! Password hashing for management users.
//!
//! New hashes use `pbkdf2_sha256$<iterations>$<salt b64>$<hash b64>`. Hashes
//! written by the older Flask tooling are still accepted for verification:
//! `pbkdf2:sha256:<iterations>$<salt>$<hex>` and, the werkzeug 3 default,
//! `scrypt:<n>:<r>:<p>$<salt>$<hex>`.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

pub const SCHEME: &str = "pbkdf2_sha256";
const LEGACY_PBKDF2: &str = "pbkdf2:sha256:";
const LEGACY_SCRYPT: &str = "scrypt:";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const SCRYPT_KEY_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashFormatError {
    #[error("unsupported password hash scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("password hash is malformed")]
    Malformed,
    #[error("password hash has an invalid iteration count")]
    Iterations,
    #[error("password hash has invalid scrypt parameters")]
    ScryptParams,
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

pub fn hash_password(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let hash = derive(password, &salt, iterations);
    format!(
        "{SCHEME}${iterations}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    )
}

/// Checks `password` against a stored hash. `Ok(false)` means a wrong
/// password; `Err` means the stored value could not be understood.
pub fn verify_password(password: &str, encoded: &str) -> Result<bool, HashFormatError> {
    if let Some(rest) = encoded.strip_prefix(LEGACY_PBKDF2) {
        return verify_legacy_pbkdf2(password, rest);
    }
    if let Some(rest) = encoded.strip_prefix(LEGACY_SCRYPT) {
        return verify_legacy_scrypt(password, rest);
    }

    let mut parts = encoded.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(HashFormatError::Malformed);
    };
    if scheme != SCHEME {
        return Err(HashFormatError::UnsupportedScheme(scheme.to_string()));
    }
    let iterations = parse_iterations(iterations)?;
    let salt = STANDARD_NO_PAD
        .decode(salt)
        .map_err(|_| HashFormatError::Malformed)?;
    let expected = STANDARD_NO_PAD
        .decode(expected)
        .map_err(|_| HashFormatError::Malformed)?;

    let actual = derive(password, &salt, iterations);
    Ok(constant_time_eq(&actual, &expected))
}

/// Splits werkzeug's `<params>$<salt>$<hex digest>` tail.
fn split_legacy(rest: &str) -> Result<(&str, &str, &str), HashFormatError> {
    let mut parts = rest.split('$');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(params), Some(salt), Some(digest), None) => Ok((params, salt, digest)),
        _ => Err(HashFormatError::Malformed),
    }
}

fn hex_eq(actual: &[u8], expected: &str) -> bool {
    let actual: String = actual.iter().map(|b| format!("{b:02x}")).collect();
    constant_time_eq(actual.as_bytes(), expected.to_ascii_lowercase().as_bytes())
}

// werkzeug feeds the salt to the KDF as text, not decoded bytes.
fn verify_legacy_pbkdf2(password: &str, rest: &str) -> Result<bool, HashFormatError> {
    let (iterations, salt, expected) = split_legacy(rest)?;
    let iterations = parse_iterations(iterations)?;
    let actual = derive(password, salt.as_bytes(), iterations);
    Ok(hex_eq(&actual, expected))
}

fn verify_legacy_scrypt(password: &str, rest: &str) -> Result<bool, HashFormatError> {
    let (params, salt, expected) = split_legacy(rest)?;
    let mut cost = params.split(':').map(str::parse::<u32>);
    let (Some(Ok(n)), Some(Ok(r)), Some(Ok(p)), None) =
        (cost.next(), cost.next(), cost.next(), cost.next())
    else {
        return Err(HashFormatError::ScryptParams);
    };
    if n < 2 || !n.is_power_of_two() {
        return Err(HashFormatError::ScryptParams);
    }
    let log_n = u8::try_from(n.trailing_zeros()).map_err(|_| HashFormatError::ScryptParams)?;
    let params = scrypt::Params::new(log_n, r, p, SCRYPT_KEY_LEN)
        .map_err(|_| HashFormatError::ScryptParams)?;

    let mut actual = [0u8; SCRYPT_KEY_LEN];
    scrypt::scrypt(password.as_bytes(), salt.as_bytes(), &params, &mut actual)
        .map_err(|_| HashFormatError::ScryptParams)?;
    Ok(hex_eq(&actual, expected))
}

fn parse_iterations(raw: &str) -> Result<u32, HashFormatError> {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(HashFormatError::Iterations),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: u32 = 1_000;

    #[test]
    fn hash_then_verify() {
        let stored = hash_password("correct horse", FAST);
        assert!(stored.starts_with("pbkdf2_sha256$1000$"));
        assert_eq!(verify_password("correct horse", &stored), Ok(true));
        assert_eq!(verify_password("wrong horse", &stored), Ok(false));
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash_password("pw", FAST), hash_password("pw", FAST));
    }

    // Produced by werkzeug 3.1.8 `generate_password_hash("correct horse", ...)`.
    const WERKZEUG_PBKDF2: &str = "pbkdf2:sha256:1000$HEnPd2UOFmcTea3d$1b95556852da2c5b145e51cbff616063b610decf513483db7d7f4777b8a393d1";
    const WERKZEUG_SCRYPT_DEFAULT: &str = "scrypt:32768:8:1$8cy8Ib5LS79oZIZG$43759e51eedaa339f1778a53e4d1b9cb59d53485a9eaeea861feb68b99ef797eac6dc690aa67603787ce9b0efa3c58781b10dca2fe58d2572f5d1851e7ef6f05";
    const WERKZEUG_SCRYPT_SMALL: &str = "scrypt:1024:8:1$bGdOdC6Q05hjHWUq$54e78456b3b6a402ef19d23138da14a0a6cef722471eab04ed2f097e1371e56bcbbd783942436d123fb806cf92a6d4f00bcecca82245b5be491dba4072485f35";

    #[test]
    fn verifies_werkzeug_pbkdf2_hash() {
        assert_eq!(verify_password("correct horse", WERKZEUG_PBKDF2), Ok(true));
        assert_eq!(verify_password("wrong horse", WERKZEUG_PBKDF2), Ok(false));
    }

    #[test]
    fn verifies_werkzeug_scrypt_hashes() {
        assert_eq!(verify_password("correct horse", WERKZEUG_SCRYPT_SMALL), Ok(true));
        assert_eq!(verify_password("wrong horse", WERKZEUG_SCRYPT_SMALL), Ok(false));
        assert_eq!(verify_password("correct horse", WERKZEUG_SCRYPT_DEFAULT), Ok(true));
    }

    #[test]
    fn rejects_bad_scrypt_parameters() {
        assert_eq!(
            verify_password("pw", "scrypt:1000:8:1$salt$00"),
            Err(HashFormatError::ScryptParams)
        );
        assert_eq!(
            verify_password("pw", "scrypt:1024:8$salt$00"),
            Err(HashFormatError::ScryptParams)
        );
        assert_eq!(
            verify_password("pw", "scrypt:1024:8:1$salt"),
            Err(HashFormatError::Malformed)
        );
    }

    #[test]
    fn rejects_unknown_or_broken_hashes() {
        assert_eq!(
            verify_password("pw", "bcrypt$1$a$b"),
            Err(HashFormatError::UnsupportedScheme("bcrypt".into()))
        );
        assert_eq!(verify_password("pw", "plain"), Err(HashFormatError::Malformed));
        assert_eq!(
            verify_password("pw", "pbkdf2_sha256$0$AAAA$AAAA"),
            Err(HashFormatError::Iterations)
        );
        assert_eq!(
            verify_password("pw", "pbkdf2_sha256$1000$!!$AAAA"),
            Err(HashFormatError::Malformed)
        );
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
