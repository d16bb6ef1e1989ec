//! NodeTable — an in-memory snapshot of the node repository.
//!
//! The repository hands the allocation core a consistent copy of its
//! nodes before each decision. The table is keyed by hostname in a
//! `BTreeMap`, so every iteration order is deterministic.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::types::*;

/// Hostname lookup into the repository's node table.
///
/// Parent links are stored as hostnames and resolved through this trait,
/// so candidates never hold references into repository storage.
pub trait NodeLookup {
    fn node(&self, hostname: &str) -> Option<&Node>;
}

/// Hostname-keyed snapshot of nodes.
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    nodes: BTreeMap<Hostname, Node>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a validated table from a list of nodes.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> StateResult<Self> {
        let mut table = Self::new();
        for node in nodes {
            if table.nodes.contains_key(&node.hostname) {
                return Err(StateError::DuplicateHostname(node.hostname));
            }
            table.nodes.insert(node.hostname.clone(), node);
        }
        table.validate()?;
        debug!(nodes = table.len(), "node table built");
        Ok(table)
    }

    /// Load a snapshot exported by the node repository as a JSON array of nodes.
    pub fn from_json(bytes: &[u8]) -> StateResult<Self> {
        let nodes: Vec<Node> =
            serde_json::from_slice(bytes).map_err(|e| StateError::Deserialize(e.to_string()))?;
        Self::from_nodes(nodes)
    }

    /// Insert or replace a node. Returns the previous node with that hostname.
    ///
    /// Parent links are not checked here; call [`NodeTable::validate`]
    /// after a batch of inserts.
    pub fn insert(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.hostname.clone(), node)
    }

    pub fn get(&self, hostname: &str) -> Option<&Node> {
        self.nodes.get(hostname)
    }

    /// Like [`NodeTable::get`], but a missing node is an error.
    pub fn require(&self, hostname: &str) -> StateResult<&Node> {
        self.get(hostname)
            .ok_or_else(|| StateError::UnknownNode(hostname.to_string()))
    }

    /// All nodes, ordered by hostname.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Host nodes, ordered by hostname.
    pub fn hosts(&self) -> impl Iterator<Item = &Node> {
        self.iter().filter(|n| n.is_host())
    }

    /// Nodes whose parent is `host`, ordered by hostname.
    pub fn children_of<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.iter()
            .filter(move |n| n.parent_hostname.as_deref() == Some(host))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check that every parent link points at a host in the table.
    pub fn validate(&self) -> StateResult<()> {
        for node in self.iter() {
            let Some(parent) = node.parent_hostname.as_deref() else {
                continue;
            };
            match self.get(parent) {
                None => {
                    return Err(StateError::MissingParent {
                        child: node.hostname.clone(),
                        parent: parent.to_string(),
                    });
                }
                Some(p) if !p.is_host() => {
                    return Err(StateError::ParentNotHost {
                        child: node.hostname.clone(),
                        parent: parent.to_string(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

impl NodeLookup for NodeTable {
    fn node(&self, hostname: &str) -> Option<&Node> {
        self.get(hostname)
    }
}
