use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};

/// Number of random bytes behind session ids and CSRF tokens.
pub const TOKEN_BYTES: usize = 32;

/// URL-safe random token drawn from the OS RNG.
pub fn random_token() -> Result<String, anyhow::Error> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| anyhow::anyhow!("OS random source failed: {}", e))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
