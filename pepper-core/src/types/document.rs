use std::collections::BTreeMap;

use crate::types::{Leaf, GLOBAL_LEAF};

/// Parsed leaves in declaration order, addressable by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Document {
    leaves: Vec<Leaf>,
    #[serde(skip)]
    index: BTreeMap<String, usize>,
}

impl Document {
    /// Builds a document from leaves already in declaration order.
    ///
    /// Callers guarantee unique names; the parser rejects duplicates before getting here.
    pub fn from_leaves(leaves: Vec<Leaf>) -> Self {
        let index = leaves
            .iter()
            .enumerate()
            .map(|(i, l)| (l.name.clone(), i))
            .collect();
        Self { leaves, index }
    }

    pub fn get(&self, name: &str) -> Option<&Leaf> {
        self.index.get(name).map(|&i| &self.leaves[i])
    }

    /// Declaration position of a leaf.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.leaves.iter().map(|l| l.name.as_str())
    }

    pub fn global(&self) -> Option<&Leaf> {
        self.get(GLOBAL_LEAF)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}
