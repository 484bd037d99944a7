use std::num::NonZeroU32;

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use ring::pbkdf2;
use shopfront_common::{Error, Result};
use tracing::warn;

/// Prefix of every stored hash: `pbkdf2_sha256$<iterations>$<salt>$<hash>`.
const SCHEME: &str = "pbkdf2_sha256";
const DEFAULT_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

static ALGORITHM: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

pub fn hash_password(password: &str) -> Result<String> {
    hash_password_with_iterations(password, DEFAULT_ITERATIONS)
}

pub fn hash_password_with_iterations(password: &str, iterations: u32) -> Result<String> {
    if password.is_empty() {
        return Err(Error::Validation("password cannot be empty".into()));
    }
    let rounds = NonZeroU32::new(iterations)
        .ok_or_else(|| Error::Security("iteration count must be positive".into()))?;

    let salt: [u8; SALT_LEN] = rand::random();
    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(ALGORITHM, rounds, &salt, password.as_bytes(), &mut hash);

    Ok(format!(
        "{SCHEME}${iterations}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    ))
}

/// Check `password` against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match decode(stored) {
        Some((rounds, salt, hash)) => {
            pbkdf2::verify(ALGORITHM, rounds, &salt, password.as_bytes(), &hash).is_ok()
        }
        None => {
            warn!("stored password hash is malformed");
            false
        }
    }
}

fn decode(stored: &str) -> Option<(NonZeroU32, Vec<u8>, Vec<u8>)> {
    let mut parts = stored.split('$');
    if parts.next()? != SCHEME {
        return None;
    }
    let rounds = NonZeroU32::new(parts.next()?.parse().ok()?)?;
    let salt = STANDARD_NO_PAD.decode(parts.next()?).ok()?;
    let hash = STANDARD_NO_PAD.decode(parts.next()?).ok()?;
    if parts.next().is_some() || hash.is_empty() {
        return None;
    }
    Some((rounds, salt, hash))
}
