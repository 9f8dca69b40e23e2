use std::fmt;

use crate::ChainId;

/// Identifies a child chain inside its parent's fork map.
///
/// `sequence` is assigned monotonically per parent; `entry_index` records
/// which parent entry spawned the fork.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForkedChainId {
    pub sequence: u32,
    pub entry_index: u32,
}

impl ForkedChainId {
    pub fn new(entry_index: u32, sequence: u32) -> Self {
        Self {
            sequence,
            entry_index,
        }
    }
}

impl fmt::Display for ForkedChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.sequence, self.entry_index)
    }
}

/// Address of one node of a fork tree: the root chain plus the fork ids
/// walked from it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChainPath {
    root: ChainId,
    forks: Vec<ForkedChainId>,
}

impl ChainPath {
    pub fn root(root: ChainId) -> Self {
        Self {
            root,
            forks: Vec::new(),
        }
    }

    pub fn from_parts(root: ChainId, forks: Vec<ForkedChainId>) -> Self {
        Self { root, forks }
    }

    pub fn chain_id(&self) -> ChainId {
        self.root
    }

    pub fn forks(&self) -> &[ForkedChainId] {
        &self.forks
    }

    /// Number of fork hops below the root chain.
    pub fn depth(&self) -> usize {
        self.forks.len()
    }

    pub fn is_root(&self) -> bool {
        self.forks.is_empty()
    }

    pub fn child(&self, fork: ForkedChainId) -> Self {
        let mut forks = self.forks.clone();
        forks.push(fork);
        Self {
            root: self.root,
            forks,
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.forks.is_empty() {
            return None;
        }
        let mut forks = self.forks.clone();
        forks.pop();
        Some(Self {
            root: self.root,
            forks,
        })
    }

    pub fn is_ancestor_of(&self, other: &ChainPath) -> bool {
        self.root == other.root
            && self.forks.len() < other.forks.len()
            && other.forks.starts_with(&self.forks)
    }
}

impl fmt::Display for ChainPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for fork in self.forks.iter() {
            write!(f, "/{}", fork)?;
        }
        Ok(())
    }
}
