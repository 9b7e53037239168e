mod errors;
pub mod rsa;

pub use errors::Error;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use errors::CryptoResult;
use openssl::hash::{Hasher, MessageDigest};

/// Compute the SHA-256 digest of the given data
pub fn sha256(data: impl AsRef<[u8]>) -> CryptoResult<Vec<u8>> {
    let mut hasher = Hasher::new(MessageDigest::sha256())?;
    hasher.update(data.as_ref())?;
    Ok(hasher.finish()?.to_vec())
}

/// Compute the SHA-256 digest of the given data and encode it as standard base64
pub fn sha256_base64(data: impl AsRef<[u8]>) -> CryptoResult<String> {
    Ok(BASE64.encode(sha256(data)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vectors() {
        assert_eq!(
            sha256_base64(b"").unwrap(),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
        assert_eq!(
            sha256_base64(b"abc").unwrap(),
            "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0="
        );
    }

    #[test]
    fn test_sha256_output_size() {
        assert_eq!(sha256("<Body Id=\"x1\">V</Body>").unwrap().len(), 32);
    }
}
