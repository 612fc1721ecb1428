//! Inclusion proofs ("audit trails") for leaves of a [`MerkleTree`].

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MerkleError, Result};
use crate::hash::HashFunction;
use crate::merkletree::{MerkleTree, Node, NodeKind};

/// Which side of the running digest a trail step attaches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Side {
    /// `hash(sibling ++ running)`
    Left,
    /// `hash(running ++ sibling)`
    Right,
    /// No sibling at this level, `hash(running)`
    Lone,
}

/// One step of an audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditNode {
    /// Sibling digest, empty for [`Side::Lone`].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,
    pub side: Side,
}

impl AuditNode {
    pub fn new(digest: impl Into<String>, side: Side) -> Self {
        AuditNode {
            digest: digest.into(),
            side,
        }
    }

    pub fn lone() -> Self {
        AuditNode {
            digest: String::new(),
            side: Side::Lone,
        }
    }

    /// Digest of the sibling this step concatenates, if any.
    pub fn sibling(&self) -> Option<&str> {
        match self.side {
            Side::Lone => None,
            Side::Left | Side::Right => Some(self.digest.as_str()),
        }
    }

    fn apply<H: HashFunction + ?Sized>(&self, hasher: &H, running: &str) -> String {
        let joined = match self.side {
            Side::Left => [self.digest.as_str(), running].concat(),
            Side::Right => [running, self.digest.as_str()].concat(),
            Side::Lone => running.to_owned(),
        };
        hasher.digest(joined.as_bytes())
    }
}

/// Outcome of looking up a leaf for an audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audit {
    /// Leaf found; steps in leaf-to-root order.
    Trail(Vec<AuditNode>),
    /// Leaf found, but it is the root of a single-leaf tree.
    Root,
    NotFound,
}

impl Audit {
    pub fn into_trail(self) -> Vec<AuditNode> {
        match self {
            Audit::Trail(trail) => trail,
            Audit::Root | Audit::NotFound => Vec::new(),
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, Audit::NotFound)
    }
}

impl<H: HashFunction> MerkleTree<H> {
    /// Builds the audit trail of the first leaf whose digest is `leaf_digest`.
    pub fn audit(&self, leaf_digest: &str) -> Result<Audit> {
        let root = self.root().ok_or(MerkleError::EmptyTree)?;

        let leaf = match self.leaves().iter().find(|leaf| leaf.digest() == leaf_digest) {
            Some(leaf) => leaf,
            None => {
                debug!(leaf = leaf_digest, "audit of unknown leaf");
                return Ok(Audit::NotFound);
            }
        };
        if leaf.is_root() {
            return Ok(Audit::Root);
        }

        let mut trail = Vec::new();
        let mut child = Rc::clone(leaf);
        while let Some(parent) = child.parent() {
            trail.push(audit_step(&parent, &child)?);
            child = parent;
        }

        // the walk only stops early if a parent was dropped under us
        if !Rc::ptr_eq(&child, root) {
            return Err(MerkleError::BrokenParentLink(format!(
                "walk from leaf {} ended at {} instead of the root",
                leaf_digest,
                child.digest()
            )));
        }

        debug!(leaf = leaf_digest, steps = trail.len(), "built audit trail");
        Ok(Audit::Trail(trail))
    }

    /// Audit trail of `leaf_digest`, empty if the leaf is unknown or is the
    /// only node of the tree.
    pub fn audit_proof(&self, leaf_digest: &str) -> Result<Vec<AuditNode>> {
        self.audit(leaf_digest).map(Audit::into_trail)
    }

    /// Replays `trail` from `leaf_digest` and compares against this tree's root.
    pub fn verify_audit(&self, trail: &[AuditNode], leaf_digest: &str) -> Result<bool> {
        let root = self.root_hash()?;
        verify_trail(self.hasher(), trail, leaf_digest, root)
    }
}

fn audit_step(parent: &Node, child: &Rc<Node>) -> Result<AuditNode> {
    match parent.kind() {
        NodeKind::Branch { left, right } if Rc::ptr_eq(left, child) => Ok(match right {
            Some(right) => AuditNode::new(right.digest(), Side::Right),
            None => AuditNode::lone(),
        }),
        NodeKind::Branch { left, right: Some(right) } if Rc::ptr_eq(right, child) => {
            Ok(AuditNode::new(left.digest(), Side::Left))
        }
        _ => Err(MerkleError::BrokenParentLink(format!(
            "{} is not a child of its recorded parent {}",
            child.digest(),
            parent.digest()
        ))),
    }
}

/// Checks `trail` against a known root digest without the rest of the tree.
///
/// A mismatch is `Ok(false)`; only an empty trail is an error.
pub fn verify_trail<H: HashFunction + ?Sized>(
    hasher: &H,
    trail: &[AuditNode],
    leaf_digest: &str,
    root_digest: &str,
) -> Result<bool> {
    if trail.is_empty() {
        return Err(MerkleError::EmptyTrail);
    }

    let computed = trail
        .iter()
        .fold(leaf_digest.to_owned(), |running, step| step.apply(hasher, &running));

    let verified = computed == root_digest;
    debug!(leaf = leaf_digest, verified, "verified audit trail");
    Ok(verified)
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;
    use crate::hash::{keccak256_hex, sha3_256_hex, Sha3_256Hex};

    fn h(data: &str) -> String {
        sha3_256_hex(data.as_bytes())
    }

    fn hash_pair(left: &str, right: &str) -> String {
        sha3_256_hex([left, right].concat().as_bytes())
    }

    fn random_data(amount: usize) -> Vec<Vec<u8>> {
        let mut rng = rand::thread_rng();
        (0..amount)
            .map(|_| {
                let len: usize = rng.gen_range(0..64);
                let block: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
                block
            })
            .collect()
    }

    #[test]
    fn four_leaf_trail() {
        let tree = MerkleTree::from_data(Sha3_256Hex, ["a", "b", "c", "d"]).unwrap();
        let p1 = hash_pair(&h("a"), &h("b"));

        let trail = tree.audit_proof(&h("c")).unwrap();

        assert_eq!(
            trail,
            vec![AuditNode::new(h("d"), Side::Right), AuditNode::new(p1, Side::Left)]
        );
        assert!(tree.verify_audit(&trail, &h("c")).unwrap());
    }

    #[test]
    fn every_leaf_verifies() {
        for amount in 2..=33 {
            let tree = MerkleTree::from_data(Sha3_256Hex, random_data(amount)).unwrap();
            for leaf in tree.leaves() {
                let trail = tree.audit_proof(leaf.digest()).unwrap();
                assert!(!trail.is_empty());
                assert!(
                    tree.verify_audit(&trail, leaf.digest()).unwrap(),
                    "leaf {} of {}",
                    leaf.digest(),
                    amount
                );
            }
        }
    }

    #[test]
    fn lone_node_is_rehashed() {
        let tree = MerkleTree::from_data(Sha3_256Hex, ["a", "b", "c"]).unwrap();
        let p1 = hash_pair(&h("a"), &h("b"));

        let trail = tree.audit_proof(&h("c")).unwrap();

        assert_eq!(trail, vec![AuditNode::lone(), AuditNode::new(p1, Side::Left)]);
        assert_eq!(trail[0].sibling(), None);
        assert!(tree.verify_audit(&trail, &h("c")).unwrap());

        // a trail that skips the lone level does not reach the root
        assert!(!tree.verify_audit(&trail[1..], &h("c")).unwrap());
    }

    #[test]
    fn tampered_leaf_fails() {
        let tree = MerkleTree::from_data(Sha3_256Hex, ["a", "b", "c", "d", "e"]).unwrap();
        let trail = tree.audit_proof(&h("b")).unwrap();

        assert!(tree.verify_audit(&trail, &h("b")).unwrap());
        assert!(!tree.verify_audit(&trail, &h("a")).unwrap());
        assert!(!tree.verify_audit(&trail, &h("x")).unwrap());
    }

    #[test]
    fn tampered_trail_fails() {
        let tree = MerkleTree::from_data(Sha3_256Hex, ["a", "b", "c", "d"]).unwrap();
        let mut trail = tree.audit_proof(&h("a")).unwrap();

        trail[0].side = Side::Left;
        assert!(!tree.verify_audit(&trail, &h("a")).unwrap());

        trail[0].side = Side::Right;
        trail[1].digest = h("z");
        assert!(!tree.verify_audit(&trail, &h("a")).unwrap());
    }

    #[test]
    fn single_leaf_has_no_trail() {
        let tree = MerkleTree::from_data(Sha3_256Hex, ["a"]).unwrap();

        assert_eq!(tree.audit(&h("a")).unwrap(), Audit::Root);
        assert!(tree.audit_proof(&h("a")).unwrap().is_empty());
        assert_eq!(tree.root_hash().unwrap(), h("a"));
    }

    #[test]
    fn unknown_leaf_is_not_found() {
        let tree = MerkleTree::from_data(Sha3_256Hex, ["a", "b"]).unwrap();

        let audit = tree.audit(&h("q")).unwrap();
        assert_eq!(audit, Audit::NotFound);
        assert!(!audit.is_found());
        assert!(tree.audit_proof(&h("q")).unwrap().is_empty());
    }

    #[test]
    fn duplicate_blocks_use_first_leaf() {
        let tree = MerkleTree::from_data(Sha3_256Hex, ["a", "b", "a"]).unwrap();

        let trail = tree.audit_proof(&h("a")).unwrap();
        assert_eq!(trail[0], AuditNode::new(h("b"), Side::Right));
        assert!(tree.verify_audit(&trail, &h("a")).unwrap());
    }

    #[test]
    fn empty_tree_errors() {
        let tree = MerkleTree::default();

        assert_eq!(tree.audit("00"), Err(MerkleError::EmptyTree));
        assert_eq!(
            tree.verify_audit(&[AuditNode::lone()], "00"),
            Err(MerkleError::EmptyTree)
        );
    }

    #[test]
    fn empty_trail_errors() {
        let tree = MerkleTree::from_data(Sha3_256Hex, ["a", "b"]).unwrap();

        assert_eq!(tree.verify_audit(&[], &h("a")), Err(MerkleError::EmptyTrail));
    }

    #[test]
    fn verifies_without_tree() {
        let tree = MerkleTree::from_data(keccak256_hex, ["a", "b", "c", "d", "e", "f"]).unwrap();
        let leaf = keccak256_hex(b"e");
        let trail = tree.audit_proof(&leaf).unwrap();
        let root = tree.root_hash().unwrap().to_owned();
        drop(tree);

        assert!(verify_trail(&keccak256_hex, &trail, &leaf, &root).unwrap());
        assert!(!verify_trail(&sha3_256_hex, &trail, &leaf, &root).unwrap());
    }

    #[test]
    fn broken_parent_link_is_reported() {
        let tree = MerkleTree::from_data(Sha3_256Hex, ["a", "b", "c", "d"]).unwrap();
        let leaves = tree.leaves();

        // "c" hangs under the parent of "a" and "b"
        let parent = leaves[0].parent().unwrap();
        assert!(matches!(
            audit_step(&parent, &leaves[2]),
            Err(MerkleError::BrokenParentLink(_))
        ));
        assert_eq!(
            audit_step(&parent, &leaves[1]).unwrap(),
            AuditNode::new(h("a"), Side::Left)
        );
    }

    #[test]
    fn trail_serializes_as_json() {
        let tree = MerkleTree::from_data(Sha3_256Hex, ["a", "b", "c"]).unwrap();
        let trail = tree.audit_proof(&h("c")).unwrap();

        let json = serde_json::to_value(&trail).unwrap();
        assert_eq!(json[0], serde_json::json!({ "side": "lone" }));
        assert_eq!(json[1]["side"], "left");

        let parsed: Vec<AuditNode> = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, trail);
    }
}
