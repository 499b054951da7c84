//! Private keys held by the client.

use super::ClientError;
use crate::crypto::Algorithm;
// One `signature::Signer` trait serves both schemes
use ed25519_dalek::Signer as _;
use rand::rngs::OsRng;

/// A signing keypair for one of the supported algorithms.
pub enum Keypair {
    Ed25519(ed25519_dalek::SigningKey),
    EcdsaP256(p256::ecdsa::SigningKey),
}

impl Keypair {
    /// Fresh keypair from the OS CSPRNG.
    pub fn generate(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Ed25519 => Keypair::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng)),
            Algorithm::EcdsaP256Sha256 => Keypair::EcdsaP256(p256::ecdsa::SigningKey::random(&mut OsRng)),
        }
    }

    /// Rebuild a keypair from the bytes returned by [`Keypair::private_key_bytes`].
    pub fn from_private_bytes(algorithm: Algorithm, bytes: &[u8]) -> Result<Self, ClientError> {
        match algorithm {
            Algorithm::Ed25519 => {
                let raw = <[u8; 32]>::try_from(bytes).map_err(|_| {
                    ClientError::CorruptKey(format!("Ed25519 secret must be 32 bytes, got {}", bytes.len()))
                })?;
                Ok(Keypair::Ed25519(ed25519_dalek::SigningKey::from_bytes(&raw)))
            }
            Algorithm::EcdsaP256Sha256 => p256::ecdsa::SigningKey::from_slice(bytes)
                .map(Keypair::EcdsaP256)
                .map_err(|_| ClientError::CorruptKey("not a valid P-256 scalar".to_string())),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Keypair::Ed25519(_) => Algorithm::Ed25519,
            Keypair::EcdsaP256(_) => Algorithm::EcdsaP256Sha256,
        }
    }

    /// Public key in the form the server stores: raw 32 bytes or uncompressed SEC1.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        match self {
            Keypair::Ed25519(key) => key.verifying_key().to_bytes().to_vec(),
            Keypair::EcdsaP256(key) => key.verifying_key().to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    pub fn private_key_bytes(&self) -> Vec<u8> {
        match self {
            Keypair::Ed25519(key) => key.to_bytes().to_vec(),
            Keypair::EcdsaP256(key) => key.to_bytes().to_vec(),
        }
    }

    /// Sign exactly `message`, with no framing.
    ///
    /// Both schemes are deterministic per key (RFC 8032 and RFC 6979). ECDSA
    /// signatures come out in the fixed 64-byte `r||s` form.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Keypair::Ed25519(key) => key.sign(message).to_bytes().to_vec(),
            Keypair::EcdsaP256(key) => {
                let signature: p256::ecdsa::Signature = key.sign(message);
                signature.to_bytes().to_vec()
            }
        }
    }
}
