//! # Signature Algorithms
//!
//! The server trusts exactly one thing about a key: the [`Algorithm`] recorded
//! when it was registered. Incoming verify requests never name an algorithm,
//! so there is nothing for a caller to confuse.
//!
//! A registered key is parsed once into the tagged [`PublicKey`] variant and
//! verification dispatches on that variant.

use crate::error::AuthError;
use base64::prelude::*;
use ed25519_dalek::pkcs8::DecodePublicKey as _;
use p256::ecdsa::signature::Verifier as _;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Length of a challenge nonce in bytes (256 bits).
pub const NONCE_LEN: usize = 32;

/// Length of the random part of a session token in bytes.
pub const TOKEN_LEN: usize = 32;

/// Number of hex characters of the key digest used in a handle.
const HANDLE_DIGEST_CHARS: usize = 10;

/// Supported signature schemes.
///
/// Serialized with the wire names used by `key_type`: `"ed25519"` and `"ecdsa"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "ed25519")]
    Ed25519,
    /// ECDSA over NIST P-256 with a SHA-256 digest.
    #[serde(rename = "ecdsa")]
    EcdsaP256Sha256,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::Ed25519, Algorithm::EcdsaP256Sha256];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Ed25519 => "ed25519",
            Algorithm::EcdsaP256Sha256 => "ecdsa",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ed25519" => Ok(Algorithm::Ed25519),
            "ecdsa" | "ecdsa-p256" | "p256" => Ok(Algorithm::EcdsaP256Sha256),
            other => Err(AuthError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// A validated public key, tagged with its algorithm.
#[derive(Debug, Clone)]
pub enum PublicKey {
    Ed25519(ed25519_dalek::VerifyingKey),
    EcdsaP256(p256::ecdsa::VerifyingKey),
}

impl PublicKey {
    /// Parse key bytes for the declared algorithm.
    ///
    /// Ed25519 accepts raw 32-byte keys or SubjectPublicKeyInfo DER.
    /// P-256 accepts SEC1 points (compressed or uncompressed) or SubjectPublicKeyInfo DER.
    pub fn parse(algorithm: Algorithm, bytes: &[u8]) -> Result<Self, AuthError> {
        match algorithm {
            Algorithm::Ed25519 => parse_ed25519(bytes).map(PublicKey::Ed25519),
            Algorithm::EcdsaP256Sha256 => parse_p256(bytes).map(PublicKey::EcdsaP256),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            PublicKey::Ed25519(_) => Algorithm::Ed25519,
            PublicKey::EcdsaP256(_) => Algorithm::EcdsaP256Sha256,
        }
    }

    /// Canonical storage form: raw 32 bytes (Ed25519) or uncompressed SEC1 (P-256).
    pub fn to_normalized_bytes(&self) -> Vec<u8> {
        match self {
            PublicKey::Ed25519(key) => key.to_bytes().to_vec(),
            PublicKey::EcdsaP256(key) => key.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    /// Verify `signature` over exactly `message`.
    ///
    /// Any failure, including a signature that does not even parse for this
    /// key's algorithm, is `SignatureInvalid`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), AuthError> {
        match self {
            PublicKey::Ed25519(key) => {
                let sig = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|_| AuthError::SignatureInvalid)?;
                key.verify_strict(message, &sig)
                    .map_err(|_| AuthError::SignatureInvalid)
            }
            PublicKey::EcdsaP256(key) => {
                // WebCrypto emits r||s, Go and OpenSSL emit DER
                let sig = if signature.len() == 64 {
                    p256::ecdsa::Signature::from_slice(signature)
                } else {
                    p256::ecdsa::Signature::from_der(signature)
                }
                .map_err(|_| AuthError::SignatureInvalid)?;
                key.verify(message, &sig)
                    .map_err(|_| AuthError::SignatureInvalid)
            }
        }
    }
}

fn parse_ed25519(bytes: &[u8]) -> Result<ed25519_dalek::VerifyingKey, AuthError> {
    if let Ok(raw) = <[u8; 32]>::try_from(bytes) {
        return ed25519_dalek::VerifyingKey::from_bytes(&raw)
            .map_err(|_| AuthError::InvalidKeyEncoding("not a valid Ed25519 point".to_string()));
    }

    ed25519_dalek::VerifyingKey::from_public_key_der(bytes).map_err(|_| {
        AuthError::InvalidKeyEncoding(format!(
            "expected 32-byte Ed25519 key or SPKI DER, got {} bytes",
            bytes.len()
        ))
    })
}

fn parse_p256(bytes: &[u8]) -> Result<p256::ecdsa::VerifyingKey, AuthError> {
    let looks_like_sec1 = matches!(
        (bytes.len(), bytes.first()),
        (65, Some(0x04)) | (33, Some(0x02)) | (33, Some(0x03))
    );

    let parsed = if looks_like_sec1 {
        p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes).ok()
    } else {
        <p256::ecdsa::VerifyingKey as p256::pkcs8::DecodePublicKey>::from_public_key_der(bytes).ok()
    };

    parsed.ok_or_else(|| {
        AuthError::InvalidKeyEncoding(format!(
            "expected P-256 SEC1 point or SPKI DER, got {} bytes",
            bytes.len()
        ))
    })
}

/// Derive the handle for a normalized public key: `<10 hex of sha256>@<domain>`.
pub fn derive_handle(normalized_key: &[u8], domain: &str) -> String {
    let digest = hex::encode(Sha256::digest(normalized_key));
    format!("{}@{}", &digest[..HANDLE_DIGEST_CHARS], domain)
}

/// Fresh 256-bit challenge nonce from the OS CSPRNG.
pub fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Fresh opaque session token (base64url, no padding).
pub fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    OsRng.fill_bytes(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Storage key for a session token. Tokens themselves are never persisted.
pub fn token_hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::pkcs8::EncodePublicKey as _;
    use ed25519_dalek::Signer as _;

    fn ed25519_pair() -> ed25519_dalek::SigningKey {
        ed25519_dalek::SigningKey::generate(&mut OsRng)
    }

    fn p256_pair() -> p256::ecdsa::SigningKey {
        p256::ecdsa::SigningKey::random(&mut OsRng)
    }

    #[test]
    fn algorithm_wire_names() {
        assert_eq!("ed25519".parse::<Algorithm>().unwrap(), Algorithm::Ed25519);
        assert_eq!("ECDSA".parse::<Algorithm>().unwrap(), Algorithm::EcdsaP256Sha256);
        assert!(matches!(
            "rsa".parse::<Algorithm>(),
            Err(AuthError::UnsupportedAlgorithm(name)) if name == "rsa"
        ));
        assert_eq!(
            serde_json::to_string(&Algorithm::EcdsaP256Sha256).unwrap(),
            "\"ecdsa\""
        );
    }

    #[test]
    fn ed25519_raw_and_spki_normalize_identically() {
        let sk = ed25519_pair();
        let raw = sk.verifying_key().to_bytes();
        let spki = sk.verifying_key().to_public_key_der().unwrap();

        let a = PublicKey::parse(Algorithm::Ed25519, &raw).unwrap();
        let b = PublicKey::parse(Algorithm::Ed25519, spki.as_bytes()).unwrap();
        assert_eq!(a.to_normalized_bytes(), b.to_normalized_bytes());
        assert_eq!(a.to_normalized_bytes(), raw.to_vec());
    }

    #[test]
    fn p256_sec1_forms_and_spki_normalize_identically() {
        use p256::pkcs8::EncodePublicKey as _;

        let sk = p256_pair();
        let vk = sk.verifying_key();
        let uncompressed = vk.to_encoded_point(false);
        let compressed = vk.to_encoded_point(true);
        let spki = vk.to_public_key_der().unwrap();

        let forms: [&[u8]; 3] = [uncompressed.as_bytes(), compressed.as_bytes(), spki.as_bytes()];
        for form in forms {
            let key = PublicKey::parse(Algorithm::EcdsaP256Sha256, form).unwrap();
            assert_eq!(key.to_normalized_bytes(), uncompressed.as_bytes());
        }
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(matches!(
            PublicKey::parse(Algorithm::Ed25519, &[1, 2, 3]),
            Err(AuthError::InvalidKeyEncoding(_))
        ));
        assert!(matches!(
            PublicKey::parse(Algorithm::EcdsaP256Sha256, &[0x04; 65]),
            Err(AuthError::InvalidKeyEncoding(_))
        ));
        // An Ed25519 key is not a P-256 key
        let raw = ed25519_pair().verifying_key().to_bytes();
        assert!(PublicKey::parse(Algorithm::EcdsaP256Sha256, &raw).is_err());
    }

    #[test]
    fn ed25519_verifies_exact_message_only() {
        let sk = ed25519_pair();
        let key = PublicKey::parse(Algorithm::Ed25519, &sk.verifying_key().to_bytes()).unwrap();
        let nonce = random_nonce();
        let sig = sk.sign(&nonce).to_bytes();

        assert!(key.verify(&nonce, &sig).is_ok());
        let mut other = nonce;
        other[0] ^= 1;
        assert!(matches!(key.verify(&other, &sig), Err(AuthError::SignatureInvalid)));
    }

    #[test]
    fn ecdsa_accepts_fixed_and_der_signatures() {
        use p256::ecdsa::signature::Signer as _;

        let sk = p256_pair();
        let key = PublicKey::parse(
            Algorithm::EcdsaP256Sha256,
            sk.verifying_key().to_encoded_point(false).as_bytes(),
        )
        .unwrap();
        let nonce = random_nonce();
        let sig: p256::ecdsa::Signature = sk.sign(&nonce);

        assert!(key.verify(&nonce, &sig.to_bytes()).is_ok());
        assert!(key.verify(&nonce, sig.to_der().as_bytes()).is_ok());
    }

    #[test]
    fn wrong_algorithm_signature_fails_cleanly() {
        let ed = ed25519_pair();
        let ec = p256_pair();
        let nonce = random_nonce();
        let ed_sig = ed.sign(&nonce).to_bytes();

        // Ed25519 signature checked as ECDSA
        let ec_key = PublicKey::parse(
            Algorithm::EcdsaP256Sha256,
            ec.verifying_key().to_encoded_point(false).as_bytes(),
        )
        .unwrap();
        assert!(matches!(ec_key.verify(&nonce, &ed_sig), Err(AuthError::SignatureInvalid)));

        // Garbage of every plausible length never panics
        let ed_key = PublicKey::parse(Algorithm::Ed25519, &ed.verifying_key().to_bytes()).unwrap();
        for len in [0usize, 1, 63, 64, 65, 72, 128] {
            let junk = vec![0xA5u8; len];
            assert!(ed_key.verify(&nonce, &junk).is_err());
            assert!(ec_key.verify(&nonce, &junk).is_err());
        }
    }

    #[test]
    fn handle_is_deterministic_per_key() {
        let key = ed25519_pair().verifying_key().to_bytes();
        let a = derive_handle(&key, "authgrid.net");
        let b = derive_handle(&key, "authgrid.net");
        assert_eq!(a, b);
        assert_eq!(a.len(), HANDLE_DIGEST_CHARS + "@authgrid.net".len());
        assert_eq!(&a[HANDLE_DIGEST_CHARS..], "@authgrid.net");
    }

    #[test]
    fn nonces_and_tokens_are_unique() {
        let nonces: std::collections::HashSet<_> = (0..100).map(|_| random_nonce()).collect();
        assert_eq!(nonces.len(), 100);
        let tokens: std::collections::HashSet<_> = (0..100).map(|_| random_token()).collect();
        assert_eq!(tokens.len(), 100);
        assert_ne!(token_hash("a"), token_hash("b"));
    }
}
