//! Subresource Integrity hashes.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
    /// SHA-384 (used for banner assets).
    #[default]
    Sha384,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Some(Self::Sha256),
            "sha384" | "sha-384" => Some(Self::Sha384),
            "sha512" | "sha-512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Hash `content`.
    pub fn digest(&self, content: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(content).to_vec(),
            Self::Sha384 => Sha384::digest(content).to_vec(),
            Self::Sha512 => Sha512::digest(content).to_vec(),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Sha384 => write!(f, "sha384"),
            Self::Sha512 => write!(f, "sha512"),
        }
    }
}

/// A content digest with its algorithm, serialized in SRI form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct IntegrityHash {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl IntegrityHash {
    /// Hash `content` with `algorithm`.
    pub fn compute(algorithm: HashAlgorithm, content: &[u8]) -> Self {
        Self {
            algorithm,
            digest: algorithm.digest(content),
        }
    }

    /// Hash `content` with SHA-384.
    pub fn sha384(content: &[u8]) -> Self {
        Self::compute(HashAlgorithm::Sha384, content)
    }

    /// Parse from SRI format.
    ///
    /// Example: `sha384-oqVuAfXRKap7fdgcCY5uykM6+R9GqQ8K/uxy9rx7HNQlGYl1kPzQho1wx4JwY8wC`
    pub fn from_sri(sri: &str) -> Result<Self, IntegrityError> {
        let (algo, encoded) = sri
            .trim()
            .split_once('-')
            .ok_or_else(|| IntegrityError::InvalidFormat("missing algorithm prefix".into()))?;

        let algorithm = HashAlgorithm::from_str(algo)
            .ok_or_else(|| IntegrityError::UnsupportedAlgorithm(algo.into()))?;

        let digest = STANDARD
            .decode(encoded)
            .map_err(|e| IntegrityError::InvalidFormat(format!("bad base64: {}", e)))?;

        if digest.len() != algorithm.digest_len() {
            return Err(IntegrityError::InvalidHashLength {
                expected: algorithm.digest_len(),
                actual: digest.len(),
            });
        }

        Ok(Self { algorithm, digest })
    }

    /// Convert to SRI format.
    pub fn to_sri(&self) -> String {
        format!("{}-{}", self.algorithm, STANDARD.encode(&self.digest))
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Check `content` against this hash in constant time.
    pub fn verify(&self, content: &[u8]) -> Result<(), IntegrityError> {
        let actual = self.algorithm.digest(content);
        if bool::from(actual.as_slice().ct_eq(self.digest.as_slice())) {
            Ok(())
        } else {
            Err(IntegrityError::Mismatch {
                expected: self.to_sri(),
                actual: Self {
                    algorithm: self.algorithm,
                    digest: actual,
                }
                .to_sri(),
            })
        }
    }
}

impl std::fmt::Display for IntegrityHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_sri())
    }
}

impl From<IntegrityHash> for String {
    fn from(hash: IntegrityHash) -> Self {
        hash.to_sri()
    }
}

impl TryFrom<String> for IntegrityHash {
    type Error = IntegrityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_sri(&value)
    }
}

/// Integrity errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid hash length: expected {expected} bytes, got {actual}")]
    InvalidHashLength { expected: usize, actual: usize },

    #[error("integrity mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },
}
