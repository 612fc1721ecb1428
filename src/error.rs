use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("Tree is empty: no data blocks have been inserted")]
    EmptyTree,

    #[error("A branch node needs one or two children, got {0}")]
    InvalidChildCount(usize),

    #[error("Audit trail cannot be empty")]
    EmptyTrail,

    /// The parent chain of a leaf does not describe a tree. Always a bug in
    /// tree construction, never a property of the input.
    #[error("Broken parent link: {0}")]
    BrokenParentLink(String),
}

pub type Result<T> = std::result::Result<T, MerkleError>;
