//! Binary Merkle tree with audit trails.
//!
//! ```
//! use merkle_audit::{sha3_256_hex, MerkleTree};
//!
//! let tree = MerkleTree::from_data(sha3_256_hex, ["a", "b", "c", "d"]).unwrap();
//! let leaf = sha3_256_hex(b"c");
//! let trail = tree.audit_proof(&leaf).unwrap();
//! assert!(tree.verify_audit(&trail, &leaf).unwrap());
//! ```

pub mod audit;
pub mod error;
pub mod hash;
pub mod merkletree;
mod render;

pub use audit::{verify_trail, Audit, AuditNode, Side};
pub use error::{MerkleError, Result};
pub use hash::{keccak256_hex, sha3_256_hex, sha3_512_hex, HashAlgorithm, HashFunction, Sha3_256Hex};
pub use merkletree::{MerkleTree, Node, NodeKind};
