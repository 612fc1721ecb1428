//! Digest functions the tree can be built with.
//!
//! A digest is the lower-case hex encoding of the raw hash output. Parents are
//! hashed over the raw concatenation of their children's hex digests.

use sha3::{Digest, Keccak256, Sha3_256, Sha3_512};

/// Maps an arbitrary byte sequence to a digest.
///
/// Must be deterministic and defined for the empty input.
pub trait HashFunction {
    fn digest(&self, data: &[u8]) -> String;
}

impl<F> HashFunction for F
where
    F: Fn(&[u8]) -> String,
{
    fn digest(&self, data: &[u8]) -> String {
        self(data)
    }
}

pub fn sha3_256_hex(data: &[u8]) -> String {
    faster_hex::hex_string(Sha3_256::digest(data).as_slice())
}

pub fn sha3_512_hex(data: &[u8]) -> String {
    faster_hex::hex_string(Sha3_512::digest(data).as_slice())
}

pub fn keccak256_hex(data: &[u8]) -> String {
    faster_hex::hex_string(Keccak256::digest(data).as_slice())
}

/// The hash function a tree uses when none is supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sha3_256Hex;

impl HashFunction for Sha3_256Hex {
    fn digest(&self, data: &[u8]) -> String {
        sha3_256_hex(data)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    #[default]
    Sha3_256,
    Sha3_512,
    Keccak256,
}

impl HashFunction for HashAlgorithm {
    fn digest(&self, data: &[u8]) -> String {
        match self {
            HashAlgorithm::Sha3_256 => sha3_256_hex(data),
            HashAlgorithm::Sha3_512 => sha3_512_hex(data),
            HashAlgorithm::Keccak256 => keccak256_hex(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha3_hash() {
        assert_eq!(
            sha3_256_hex("Some random data".as_bytes()),
            "5b054cb1c47ebc3e0bd156e474a36ab2068807eb14bbe609639fc1f9bf53261a"
        )
    }

    #[test]
    fn empty_input_is_hashed() {
        assert_eq!(
            sha3_256_hex(&[]),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
        assert_eq!(
            keccak256_hex(&[]),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn digest_widths() {
        assert_eq!(sha3_256_hex(b"x").len(), 64);
        assert_eq!(sha3_512_hex(b"x").len(), 128);
        assert_eq!(keccak256_hex(b"x").len(), 64);
    }

    #[test]
    fn closures_are_hash_functions() {
        let upper = |data: &[u8]| sha3_256_hex(data).to_uppercase();
        assert_eq!(upper.digest(b"abc"), sha3_256_hex(b"abc").to_uppercase());
        assert_eq!(Sha3_256Hex.digest(b"abc"), HashAlgorithm::Sha3_256.digest(b"abc"));
        assert_ne!(
            HashAlgorithm::Sha3_256.digest(b"abc"),
            HashAlgorithm::Keccak256.digest(b"abc")
        );
    }
}
