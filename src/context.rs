//! Per-file facts every operation needs: which schema, which version, which byte order.

use crate::error::{DataError, Result};
use crate::graph::BlockId;
use crate::parsers::Endianness;
use crate::registry::Registry;
use std::collections::HashMap;
use std::convert::TryFrom;

/// Sanity ceilings applied to lengths read from untrusted data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_array_len: usize,
    pub max_blocks: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_array_len: 1_000_000,
            max_blocks: 1_000_000,
        }
    }
}

/// Ambient state threaded through construct, read, write and size computations.
///
/// The string table and the link numbering are only populated by the format driver while it
/// reads or writes a whole file.
#[derive(Debug, Clone)]
pub struct Context<'r> {
    pub registry: &'r Registry,
    pub version: u32,
    pub user_version: u32,
    pub endianness: Endianness,
    pub limits: Limits,
    strings: Vec<Vec<u8>>,
    string_indices: HashMap<Vec<u8>, i32>,
    link_indices: HashMap<BlockId, i32>,
}

impl<'r> Context<'r> {
    pub fn new(registry: &'r Registry, version: u32, user_version: u32) -> Self {
        Context {
            registry,
            version,
            user_version,
            endianness: Endianness::default(),
            limits: Limits::default(),
            strings: Vec::new(),
            string_indices: HashMap::new(),
            link_indices: HashMap::new(),
        }
    }

    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn strings(&self) -> &[Vec<u8>] {
        &self.strings
    }

    /// Installs the file's string table. The first occurrence of a duplicate wins on write.
    pub fn set_strings(&mut self, strings: Vec<Vec<u8>>) {
        self.string_indices.clear();
        for (i, s) in strings.iter().enumerate() {
            self.string_indices.entry(s.clone()).or_insert(i as i32);
        }
        self.strings = strings;
    }

    pub(crate) fn string_at(&self, index: i32) -> Result<&[u8]> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.strings.get(i))
            .map(Vec::as_slice)
            .ok_or_else(|| {
                DataError::StringIndexOutOfRange {
                    index,
                    count: self.strings.len(),
                }
                .into()
            })
    }

    pub(crate) fn string_index(&self, s: &[u8]) -> Result<i32> {
        self.string_indices
            .get(s)
            .copied()
            .ok_or_else(|| DataError::MissingString.into())
    }

    /// Numbers blocks for writing: the n-th id in `order` is written as link index n.
    pub fn set_link_order(&mut self, order: &[BlockId]) {
        self.link_indices = order
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i as i32))
            .collect();
    }

    pub(crate) fn link_index(&self, id: BlockId) -> Result<i32> {
        self.link_indices
            .get(&id)
            .copied()
            .ok_or_else(|| DataError::LinkTargetNotWritten(id).into())
    }
}
