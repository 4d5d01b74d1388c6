// Hash algorithms used for segment hashing
//
// The set is closed: MD5, SHA-1 and the four SHA-2 variants. Digest lengths
// are pairwise distinct, which lets verification identify the algorithm of a
// manifest from the byte length of its first digest.

use std::fmt;
use std::str::FromStr;

use md5::Md5;
use serde::Serialize;
use sha1::{Digest, Sha1};
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::error::{Result, SeghashError};

// =============================================================================
// Hash Algorithm Enum
// =============================================================================

/// Supported segment hash algorithms
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Every supported algorithm, in help-text order
    pub const ALL: [HashAlgorithm; 6] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ];

    /// Parse algorithm name (case-insensitive, `sha-256` style accepted)
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" | "sha-1" => Ok(HashAlgorithm::Sha1),
            "sha224" | "sha-224" => Ok(HashAlgorithm::Sha224),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha384" | "sha-384" => Ok(HashAlgorithm::Sha384),
            "sha512" | "sha-512" => Ok(HashAlgorithm::Sha512),
            _ => Err(SeghashError::UnknownAlgorithm(name.to_string())),
        }
    }

    /// Identify the algorithm from a raw digest length in bytes
    pub fn from_digest_len(len: usize) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.digest_len() == len)
            .ok_or(SeghashError::UnknownDigestLength(len))
    }

    /// Canonical display name
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha224 => "SHA-224",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Lowercase tag used on the command line and in output file names
    pub fn tag(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Digest length in bytes
    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for HashAlgorithm {
    type Err = SeghashError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

// =============================================================================
// Streaming Hasher - Unified interface for incremental hashing
// =============================================================================

/// A streaming hasher over the supported algorithms.
/// `update` copies and compresses the input immediately, so callers never
/// need to keep the input slice alive after the call returns.
#[derive(Clone)]
pub enum StreamingHasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl StreamingHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => StreamingHasher::Md5(Md5::new()),
            HashAlgorithm::Sha1 => StreamingHasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha224 => StreamingHasher::Sha224(Sha224::new()),
            HashAlgorithm::Sha256 => StreamingHasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha384 => StreamingHasher::Sha384(Sha384::new()),
            HashAlgorithm::Sha512 => StreamingHasher::Sha512(Sha512::new()),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            StreamingHasher::Md5(_) => HashAlgorithm::Md5,
            StreamingHasher::Sha1(_) => HashAlgorithm::Sha1,
            StreamingHasher::Sha224(_) => HashAlgorithm::Sha224,
            StreamingHasher::Sha256(_) => HashAlgorithm::Sha256,
            StreamingHasher::Sha384(_) => HashAlgorithm::Sha384,
            StreamingHasher::Sha512(_) => HashAlgorithm::Sha512,
        }
    }

    /// Update the hash with more data
    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamingHasher::Md5(h) => Digest::update(h, data),
            StreamingHasher::Sha1(h) => Digest::update(h, data),
            StreamingHasher::Sha224(h) => Digest::update(h, data),
            StreamingHasher::Sha256(h) => Digest::update(h, data),
            StreamingHasher::Sha384(h) => Digest::update(h, data),
            StreamingHasher::Sha512(h) => Digest::update(h, data),
        }
    }

    /// Read out the raw digest and reset the hasher to its initial state
    pub fn finalize_reset(&mut self) -> Vec<u8> {
        match self {
            StreamingHasher::Md5(h) => h.finalize_reset().to_vec(),
            StreamingHasher::Sha1(h) => h.finalize_reset().to_vec(),
            StreamingHasher::Sha224(h) => h.finalize_reset().to_vec(),
            StreamingHasher::Sha256(h) => h.finalize_reset().to_vec(),
            StreamingHasher::Sha384(h) => h.finalize_reset().to_vec(),
            StreamingHasher::Sha512(h) => h.finalize_reset().to_vec(),
        }
    }
}

/// Compute the hex digest of `data` in one shot
pub fn compute_hash(data: &[u8], algorithm: HashAlgorithm) -> String {
    let mut hasher = StreamingHasher::new(algorithm);
    hasher.update(data);
    hex::encode(hasher.finalize_reset())
}
