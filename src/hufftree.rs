use crate::error::{HuffmanError, Result};
use crate::frequency::FrequencyTable;
use crate::min_heap::MinHeap;

/// Index of a node inside [`HuffmanTree`]'s arena.
pub type NodeId = usize;

/// One node of the merge forest. Leaves carry a symbol, internal nodes don't.
///
/// A node is created without a parent and gets one at most once; the
/// `branch_bit` is only meaningful once it has been parented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub symbol: Option<u8>,
    pub weight: u64,
    pub creation_order: u64,
    pub parent: Option<NodeId>,
    pub branch_bit: Option<bool>,
}

impl TreeNode {
    fn leaf(symbol: u8, weight: u64, creation_order: u64) -> Self {
        TreeNode {
            symbol: Some(symbol),
            weight,
            creation_order,
            parent: None,
            branch_bit: None,
        }
    }

    fn internal(weight: u64, creation_order: u64) -> Self {
        TreeNode {
            symbol: None,
            weight,
            creation_order,
            parent: None,
            branch_bit: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.symbol.is_some()
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }
}

// Field order gives the selection rule: lighter first, then earlier-created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    weight: u64,
    creation_order: u64,
    node: NodeId,
}

/// Huffman tree stored as an arena; children point at parents by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTree {
    nodes: Vec<TreeNode>,
    root: NodeId,
}

impl HuffmanTree {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::build(&FrequencyTable::from_bytes(bytes))
    }

    /// Merge the two lightest parentless nodes until one root remains.
    ///
    /// Leaves are seeded in ascending `(count, symbol)` order and numbered in
    /// that order, so equal weights are always resolved the same way and the
    /// same table produces the same tree on every run.
    pub fn build(table: &FrequencyTable) -> Result<Self> {
        let mut leaves: Vec<(u8, u64)> = table.symbols().collect();
        if leaves.is_empty() {
            return Err(HuffmanError::consistency(
                "cannot build a tree from an empty frequency table",
            ));
        }
        leaves.sort_by_key(|&(symbol, count)| (count, symbol));

        let mut nodes: Vec<TreeNode> = leaves
            .iter()
            .enumerate()
            .map(|(order, &(symbol, count))| TreeNode::leaf(symbol, count, order as u64))
            .collect();

        let entries: Vec<HeapEntry> = nodes
            .iter()
            .enumerate()
            .map(|(node, n)| HeapEntry {
                weight: n.weight,
                creation_order: n.creation_order,
                node,
            })
            .collect();
        let mut heap = MinHeap::build(entries)?;
        let mut next_order = nodes.len() as u64;

        while heap.heap_size() > 1 {
            let first = heap.extract_min()?;
            let second = heap.extract_min()?;

            let merged = nodes.len();
            let weight = first.weight + second.weight;
            nodes.push(TreeNode::internal(weight, next_order));

            let (first_bit, second_bit) = branch_bits(first.weight, second.weight);
            attach(&mut nodes, first.node, merged, first_bit)?;
            attach(&mut nodes, second.node, merged, second_bit)?;

            heap.insert(HeapEntry {
                weight,
                creation_order: next_order,
                node: merged,
            });
            next_order += 1;
        }

        let root = heap.extract_min()?.node;
        let parentless = nodes.iter().filter(|n| !n.has_parent()).count();
        if parentless != 1 {
            return Err(HuffmanError::consistency(format!(
                "tree finished with {parentless} parentless nodes"
            )));
        }

        Ok(HuffmanTree { nodes, root })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Leaves in creation order, i.e. lightest first.
    pub fn leaves(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> + '_ {
        self.nodes.iter().enumerate().filter(|(_, n)| n.is_leaf())
    }

    /// Branch bits from `leaf` up to the root, leaf end first.
    pub fn path_to_root(&self, leaf: NodeId) -> Result<Vec<bool>> {
        let mut bits = Vec::new();
        let mut current = leaf;
        while let Some(parent) = self.nodes[current].parent {
            let bit = self.nodes[current].branch_bit.ok_or_else(|| {
                HuffmanError::consistency(format!("node {current} is parented without a branch bit"))
            })?;
            bits.push(bit);
            if bits.len() > self.nodes.len() {
                return Err(HuffmanError::consistency("parent links form a cycle"));
            }
            current = parent;
        }
        if current != self.root {
            return Err(HuffmanError::consistency(format!(
                "node {leaf} does not lead to the root"
            )));
        }
        Ok(bits)
    }
}

/// The strictly heavier node of a pair takes bit 1. Otherwise the node
/// selected first takes 0 and the other 1.
fn branch_bits(first_weight: u64, second_weight: u64) -> (bool, bool) {
    if first_weight > second_weight {
        (true, false)
    } else {
        (false, true)
    }
}

fn attach(nodes: &mut [TreeNode], child: NodeId, parent: NodeId, bit: bool) -> Result<()> {
    let node = &mut nodes[child];
    if node.parent.is_some() {
        return Err(HuffmanError::consistency(format!(
            "node {child} would be parented twice"
        )));
    }
    node.parent = Some(parent);
    node.branch_bit = Some(bit);
    Ok(())
}
