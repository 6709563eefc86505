//! Symbol to code mapping derived from a [`HuffmanTree`], and its inverse.

use std::collections::{BTreeMap, HashSet};

use bitvec::prelude::*;

use crate::error::{HuffmanError, Result};
use crate::frequency::FrequencyTable;
use crate::hufftree::HuffmanTree;

/// A variable-length code, most significant (root-side) bit first.
pub type Code = BitVec<u8, Msb0>;

/// Render a code as ASCII `'0'`/`'1'`.
pub fn code_to_string(code: &BitSlice<u8, Msb0>) -> String {
    code.iter().map(|bit| if *bit { '1' } else { '0' }).collect()
}

/// Parse ASCII `'0'`/`'1'` into a code. Any other character yields `None`.
pub fn parse_code(text: &str) -> Option<Code> {
    text.chars()
        .map(|c| match c {
            '0' => Some(false),
            '1' => Some(true),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codebook {
    codes: BTreeMap<u8, Code>,
}

impl Codebook {
    /// Walk every leaf up to the root, then reverse the collected bits.
    ///
    /// A one-leaf tree has no edges, so its only symbol gets the code `0`.
    pub fn derive(tree: &HuffmanTree) -> Result<Self> {
        let mut codes = BTreeMap::new();
        let mut seen = HashSet::new();

        for (id, leaf) in tree.leaves() {
            let symbol = leaf
                .symbol
                .ok_or_else(|| HuffmanError::consistency(format!("leaf {id} has no symbol")))?;

            let mut code: Code = tree.path_to_root(id)?.into_iter().rev().collect();
            if code.is_empty() {
                code.push(false);
            }

            if !seen.insert(code.clone()) {
                return Err(HuffmanError::consistency(format!(
                    "two leaves derived the same code {}",
                    code_to_string(&code)
                )));
            }
            codes.insert(symbol, code);
        }

        Ok(Codebook { codes })
    }

    /// Build tree and codebook in one go. An empty table gives an empty codebook.
    pub fn from_frequencies(table: &FrequencyTable) -> Result<Self> {
        if table.is_empty() {
            return Ok(Codebook::default());
        }
        Self::derive(&HuffmanTree::build(table)?)
    }

    /// Reassemble a codebook read back from a container.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u8, Code)>,
    {
        let mut codes = BTreeMap::new();
        for (symbol, code) in entries {
            if code.is_empty() {
                return Err(HuffmanError::format_unplaced(format!(
                    "symbol 0x{symbol:02x} has an empty code"
                )));
            }
            if codes.insert(symbol, code).is_some() {
                return Err(HuffmanError::format_unplaced(format!(
                    "symbol 0x{symbol:02x} appears twice in the codebook"
                )));
            }
        }
        Ok(Codebook { codes })
    }

    pub fn get(&self, symbol: u8) -> Option<&BitSlice<u8, Msb0>> {
        self.codes.get(&symbol).map(|code| code.as_bitslice())
    }

    pub fn code_string(&self, symbol: u8) -> Option<String> {
        self.get(symbol).map(code_to_string)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Entries in ascending symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &BitSlice<u8, Msb0>)> + '_ {
        self.codes.iter().map(|(&symbol, code)| (symbol, code.as_bitslice()))
    }

    pub fn code_lengths(&self) -> BTreeMap<u8, usize> {
        self.codes.iter().map(|(&symbol, code)| (symbol, code.len())).collect()
    }

    /// True when both books cover the same symbols with the same code lengths.
    pub fn same_code_lengths(&self, other: &Codebook) -> bool {
        self.codes.len() == other.codes.len()
            && self
                .codes
                .iter()
                .all(|(symbol, code)| other.codes.get(symbol).map(|c| c.len()) == Some(code.len()))
    }

    /// Total encoded size in bits of data with the given frequencies.
    pub fn encoded_bits(&self, table: &FrequencyTable) -> Option<u64> {
        table.symbols().try_fold(0u64, |acc, (symbol, count)| {
            self.codes.get(&symbol).map(|code| acc + count * code.len() as u64)
        })
    }

    pub fn decoder(&self) -> Result<Decoder> {
        Decoder::from_codebook(self)
    }
}

const ROOT: u32 = 0;

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: [Option<u32>; 2],
    symbol: Option<u8>,
}

/// Inverse of a [`Codebook`], stored as a binary trie.
///
/// Following one edge per input bit and emitting a symbol whenever a leaf
/// is reached is the same as growing a bit buffer until it equals a known
/// code; the trie just avoids re-hashing the buffer on every bit.
#[derive(Debug, Clone)]
pub struct Decoder {
    nodes: Vec<TrieNode>,
}

impl Decoder {
    /// Fails if a code is duplicated or is a prefix of another one, since
    /// greedy decoding would then be ambiguous.
    pub fn from_codebook(codebook: &Codebook) -> Result<Self> {
        let mut nodes = vec![TrieNode::default()];

        for (symbol, code) in codebook.iter() {
            let mut current = ROOT as usize;
            for bit in code.iter().by_vals() {
                if let Some(existing) = nodes[current].symbol {
                    return Err(prefix_conflict(existing, symbol));
                }
                current = match nodes[current].children[bit as usize] {
                    Some(next) => next as usize,
                    None => {
                        let next = nodes.len();
                        nodes.push(TrieNode::default());
                        nodes[current].children[bit as usize] = Some(next as u32);
                        next
                    }
                };
            }

            let node = &mut nodes[current];
            if let Some(existing) = node.symbol {
                return Err(HuffmanError::format_unplaced(format!(
                    "symbols 0x{existing:02x} and 0x{symbol:02x} share the code {}",
                    code_to_string(code)
                )));
            }
            if node.children.iter().any(Option::is_some) {
                return Err(HuffmanError::format_unplaced(format!(
                    "code {} of symbol 0x{symbol:02x} is a prefix of another code",
                    code_to_string(code)
                )));
            }
            node.symbol = Some(symbol);
        }

        Ok(Decoder { nodes })
    }

    /// Exact-match lookup of a complete code.
    pub fn lookup(&self, code: &BitSlice<u8, Msb0>) -> Option<u8> {
        let mut current = ROOT as usize;
        for bit in code.iter().by_vals() {
            current = self.nodes[current].children[bit as usize]? as usize;
        }
        self.nodes[current].symbol
    }

    /// Decode a whole bit sequence, appending symbols to `out`.
    ///
    /// A bit that continues no code, or bits left over after the last full
    /// code, are reported rather than dropped.
    pub fn decode_into(&self, bits: &BitSlice<u8, Msb0>, out: &mut Vec<u8>) -> Result<()> {
        let mut current = ROOT as usize;
        let mut code_start = 0;

        for (index, bit) in bits.iter().by_vals().enumerate() {
            let next = self.nodes[current].children[bit as usize].ok_or_else(|| {
                HuffmanError::format_unplaced(format!(
                    "bits {code_start}..={index} match no code"
                ))
            })? as usize;

            match self.nodes[next].symbol {
                Some(symbol) => {
                    out.push(symbol);
                    current = ROOT as usize;
                    code_start = index + 1;
                }
                None => current = next,
            }
        }

        if current != ROOT as usize {
            return Err(HuffmanError::format_unplaced(format!(
                "{} trailing bits do not complete a code",
                bits.len() - code_start
            )));
        }
        Ok(())
    }
}

fn prefix_conflict(prefix_owner: u8, symbol: u8) -> HuffmanError {
    HuffmanError::format_unplaced(format!(
        "code of symbol 0x{prefix_owner:02x} is a prefix of the code of symbol 0x{symbol:02x}"
    ))
}
