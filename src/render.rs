use std::fmt;

use crate::hash::HashFunction;
use crate::merkletree::{MerkleTree, Node};

const INDENT: usize = 2;

/// Sideways dump: left subtree above a node, right subtree below it.
impl<H: HashFunction> fmt::Display for MerkleTree<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.root() {
            Some(root) => write_node(f, root, 0, ""),
            None => writeln!(f, "(empty)"),
        }
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &Node, depth: usize, marker: &str) -> fmt::Result {
    if let Some(left) = node.left() {
        write_node(f, left, depth + 1, "/")?;
    }

    write!(f, "{:width$}{}{}", "", marker, node.digest(), width = depth * INDENT)?;
    if let Some(payload) = node.payload() {
        write!(f, " - {}", faster_hex::hex_string(payload))?;
    }
    writeln!(f)?;

    if let Some(right) = node.right() {
        write_node(f, right, depth + 1, "\\")?;
    }
    Ok(())
}
