// Admin password hashing (PBKDF2-HMAC-SHA256)
//
// Encoded form: `pbkdf2-sha256$<iterations>$<salt b64>$<hash b64>`

use base64::engine::general_purpose::STANDARD_NO_PAD as B64;
use base64::Engine;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_BYTES: usize = 16;
const HASH_BYTES: usize = 32;

static ALGORITHM: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

pub fn hash_password(password: &str, iterations: u32) -> anyhow::Result<String> {
    let iterations =
        NonZeroU32::new(iterations).ok_or_else(|| anyhow::anyhow!("PBKDF2 iterations must be > 0"))?;

    let mut salt = [0u8; SALT_BYTES];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| anyhow::anyhow!("Failed to generate password salt"))?;

    let mut hash = [0u8; HASH_BYTES];
    pbkdf2::derive(ALGORITHM, iterations, &salt, password.as_bytes(), &mut hash);

    Ok(format!(
        "{}${}${}${}",
        SCHEME,
        iterations,
        B64.encode(salt),
        B64.encode(hash)
    ))
}

/// Constant-time check of `candidate` against an encoded hash. Malformed hashes never verify.
pub fn verify_password(encoded: &str, candidate: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(SCHEME), Some(iter), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    let Some(iterations) = iter.parse::<u32>().ok().and_then(NonZeroU32::new) else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (B64.decode(salt), B64.decode(hash)) else {
        return false;
    };
    pbkdf2::verify(ALGORITHM, iterations, &salt, candidate.as_bytes(), &hash).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low iteration count keeps the tests fast; production uses the configured value.
    const ITER: u32 = 1_000;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let encoded = hash_password("password", ITER).unwrap();
        assert!(encoded.starts_with("pbkdf2-sha256$1000$"));
        assert!(!encoded.contains("password$"));
        assert!(verify_password(&encoded, "password"));
        assert!(!verify_password(&encoded, "drowssap"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = hash_password("password", ITER).unwrap();
        let b = hash_password("password", ITER).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hashes_never_verify() {
        for bad in [
            "",
            "plain",
            "md5$1000$abc$def",
            "pbkdf2-sha256$0$abc$def",
            "pbkdf2-sha256$1000$!!$def",
            "pbkdf2-sha256$1000$abc$def$extra",
        ] {
            assert!(!verify_password(bad, "password"), "{} verified", bad);
        }
    }

    #[test]
    fn zero_iterations_is_rejected() {
        assert!(hash_password("password", 0).is_err());
    }
}
