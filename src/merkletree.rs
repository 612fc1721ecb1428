use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::error::{MerkleError, Result};
use crate::hash::{HashFunction, Sha3_256Hex};

#[derive(Debug)]
pub enum NodeKind {
    Branch {
        left: Rc<Node>,
        // absent when the node was the odd one out of its level
        right: Option<Rc<Node>>,
    },
    Leaf {
        payload: Vec<u8>,
    },
}

#[derive(Debug)]
pub struct Node {
    kind: NodeKind,
    digest: String,
    parent: RefCell<Weak<Node>>, // non-owning, only used to walk up
}

impl Node {
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Original data block, `None` for branches.
    pub fn payload(&self) -> Option<&[u8]> {
        match &self.kind {
            NodeKind::Leaf { payload } => Some(payload),
            NodeKind::Branch { .. } => None,
        }
    }

    pub fn left(&self) -> Option<&Rc<Node>> {
        match &self.kind {
            NodeKind::Branch { left, .. } => Some(left),
            NodeKind::Leaf { .. } => None,
        }
    }

    pub fn right(&self) -> Option<&Rc<Node>> {
        match &self.kind {
            NodeKind::Branch { right, .. } => right.as_ref(),
            NodeKind::Leaf { .. } => None,
        }
    }

    pub fn parent(&self) -> Option<Rc<Node>> {
        self.parent.borrow().upgrade()
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }
}

/**
 * Binary Merkle tree over an ordered sequence of data blocks.
 *
 * Nodes of a level are paired left to right. The odd node out of a level is
 * promoted by hashing its digest alone. Every insertion rebuilds the whole
 * tree from the data inserted so far.
 */
#[derive(Debug)]
pub struct MerkleTree<H = Sha3_256Hex> {
    root: Option<Rc<Node>>,
    leaves: Vec<Rc<Node>>,
    data: Vec<Vec<u8>>,
    hasher: H,
}

impl Default for MerkleTree<Sha3_256Hex> {
    fn default() -> Self {
        MerkleTree::new(Sha3_256Hex)
    }
}

impl<H: HashFunction> MerkleTree<H> {
    pub fn new(hasher: H) -> Self {
        MerkleTree {
            root: None,
            leaves: Vec::new(),
            data: Vec::new(),
            hasher,
        }
    }

    pub fn from_data<I, B>(hasher: H, blocks: I) -> Result<Self>
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let mut tree = MerkleTree::new(hasher);
        tree.insert(blocks)?;
        Ok(tree)
    }

    /**
     * Appends `blocks` and rebuilds leaves and branches from all data.
     * The tree is left untouched if the rebuild fails.
     *
     * Time complexity wrt data items: n + log2(n)
     */
    pub fn insert<I, B>(&mut self, blocks: I) -> Result<()>
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let blocks: Vec<Vec<u8>> = blocks.into_iter().map(Into::into).collect();

        let leaves: Vec<Rc<Node>> = self
            .data
            .iter()
            .chain(blocks.iter())
            .map(|block| self.make_leaf(block))
            .collect();
        let root = self.build(&leaves)?;

        self.data.extend(blocks);
        self.leaves = leaves;
        self.root = root;

        debug!(
            leaves = self.leaves.len(),
            height = self.height(),
            root = self.root.as_ref().map(|r| r.digest()).unwrap_or_default(),
            "rebuilt merkle tree"
        );
        Ok(())
    }

    pub fn root_hash(&self) -> Result<&str> {
        self.root
            .as_ref()
            .map(|root| root.digest())
            .ok_or(MerkleError::EmptyTree)
    }

    pub fn root(&self) -> Option<&Rc<Node>> {
        self.root.as_ref()
    }

    /// Leaves in insertion order of their data blocks.
    pub fn leaves(&self) -> &[Rc<Node>] {
        &self.leaves
    }

    pub fn data(&self) -> &[Vec<u8>] {
        &self.data
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of branch levels above the leaves. A lone leaf has height 0.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut node = self.root.as_ref();
        while let Some(left) = node.and_then(|n| n.left()) {
            height += 1;
            node = Some(left);
        }
        height
    }

    pub fn count_nodes(&self) -> usize {
        self.root.as_ref().map_or(0, |root| count_descendants(root))
    }

    pub fn count_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, |root| count_descendant_leaves(root))
    }

    fn make_leaf(&self, data: &[u8]) -> Rc<Node> {
        Rc::new(Node {
            kind: NodeKind::Leaf {
                payload: data.to_vec(),
            },
            digest: self.hasher.digest(data),
            parent: RefCell::new(Weak::new()),
        })
    }

    fn make_branch(&self, children: &[Rc<Node>]) -> Result<Rc<Node>> {
        let (left, right) = match children {
            [left] => (Rc::clone(left), None),
            [left, right] => (Rc::clone(left), Some(Rc::clone(right))),
            _ => return Err(MerkleError::InvalidChildCount(children.len())),
        };

        let digest = match &right {
            Some(right) => {
                let label: String = [left.digest.as_str(), right.digest.as_str()].concat();
                self.hasher.digest(label.as_bytes())
            }
            None => self.hasher.digest(left.digest.as_bytes()),
        };

        // Rc needed to be able to create a weak reference for its children
        let branch = Rc::new(Node {
            kind: NodeKind::Branch { left, right },
            digest,
            parent: RefCell::new(Weak::new()),
        });

        if let NodeKind::Branch { left, right } = &branch.kind {
            *left.parent.borrow_mut() = Rc::downgrade(&branch);
            if let Some(right) = right {
                *right.parent.borrow_mut() = Rc::downgrade(&branch);
            }
        }

        Ok(branch)
    }

    // Reduces one level at a time until a single node is left.
    fn build(&self, leaves: &[Rc<Node>]) -> Result<Option<Rc<Node>>> {
        let mut nodes: Vec<Rc<Node>> = leaves.to_vec();
        let mut level = 0;

        while nodes.len() > 1 {
            let parents = nodes
                .chunks(2)
                .map(|pair| self.make_branch(pair))
                .collect::<Result<Vec<_>>>()?;
            level += 1;
            trace!(level, nodes = parents.len(), odd = nodes.len() % 2 == 1, "reduced level");
            nodes = parents;
        }

        Ok(nodes.pop())
    }
}

fn count_descendants(node: &Node) -> usize {
    1 + match &node.kind {
        NodeKind::Branch { left, right } => {
            count_descendants(left) + right.as_deref().map_or(0, count_descendants)
        }
        NodeKind::Leaf { .. } => 0,
    }
}

fn count_descendant_leaves(node: &Node) -> usize {
    match &node.kind {
        NodeKind::Branch { left, right } => {
            count_descendant_leaves(left) + right.as_deref().map_or(0, count_descendant_leaves)
        }
        NodeKind::Leaf { .. } => 1,
    }
}
