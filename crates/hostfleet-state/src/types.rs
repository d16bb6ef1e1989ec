//! Domain types for the hostfleet node model.
//!
//! These mirror what the node repository persists about a node: its
//! lifecycle state, flavor, parent linkage and current allocation. All
//! types serialize to/from JSON so a repository snapshot can be loaded
//! as-is.

use serde::{Deserialize, Serialize};

use crate::resources::ResourceCapacity;

/// Unique identifier for a node in the fleet.
pub type Hostname = String;

/// Identifier of the application a node is allocated to.
pub type ApplicationId = String;

// ── Node state ────────────────────────────────────────────────────

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Registered but not yet verified ready for use.
    Provisioned,
    /// Idle and available for allocation.
    Ready,
    /// Claimed by an allocation that has not been activated yet.
    Reserved,
    /// Running an application.
    Active,
    /// Released by its application, still holding its data.
    Inactive,
    /// Being cleaned before it can return to ready.
    Dirty,
    Failed,
    Parked,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Provisioned => "provisioned",
            NodeState::Ready => "ready",
            NodeState::Reserved => "reserved",
            NodeState::Active => "active",
            NodeState::Inactive => "inactive",
            NodeState::Dirty => "dirty",
            NodeState::Failed => "failed",
            NodeState::Parked => "parked",
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a node runs workloads itself or hosts child nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    #[default]
    Tenant,
    Host,
}

// ── Flavor ────────────────────────────────────────────────────────

/// Resources and relative cost of a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flavor {
    pub name: String,
    /// Relative cost; lower is cheaper.
    pub cost: u32,
    pub resources: ResourceCapacity,
}

impl Flavor {
    pub fn new(name: impl Into<String>, cost: u32, resources: ResourceCapacity) -> Self {
        Self {
            name: name.into(),
            cost,
            resources,
        }
    }
}

// ── Node ──────────────────────────────────────────────────────────

/// The application a node is currently allocated to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAllocation {
    pub owner: ApplicationId,
    /// Marked for removal from the application; its capacity is reclaimable.
    #[serde(default)]
    pub retired: bool,
}

/// A node as recorded in the node repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub hostname: Hostname,
    pub state: NodeState,
    #[serde(default)]
    pub node_type: NodeType,
    pub flavor: Flavor,
    /// Hostname of the host this node runs on, if any.
    #[serde(default)]
    pub parent_hostname: Option<Hostname>,
    #[serde(default)]
    pub allocation: Option<NodeAllocation>,
}

impl Node {
    /// Create an unallocated tenant node without a parent.
    pub fn new(hostname: impl Into<Hostname>, state: NodeState, flavor: Flavor) -> Self {
        Self {
            hostname: hostname.into(),
            state,
            node_type: NodeType::Tenant,
            flavor,
            parent_hostname: None,
            allocation: None,
        }
    }

    /// Create an active host node.
    pub fn host(hostname: impl Into<Hostname>, flavor: Flavor) -> Self {
        Self {
            node_type: NodeType::Host,
            ..Self::new(hostname, NodeState::Active, flavor)
        }
    }

    pub fn with_parent(mut self, parent: impl Into<Hostname>) -> Self {
        self.parent_hostname = Some(parent.into());
        self
    }

    pub fn with_allocation(mut self, owner: impl Into<ApplicationId>, retired: bool) -> Self {
        self.allocation = Some(NodeAllocation {
            owner: owner.into(),
            retired,
        });
        self
    }

    pub fn is_host(&self) -> bool {
        self.node_type == NodeType::Host
    }

    /// True if this node's allocation is marked retired.
    pub fn is_retired(&self) -> bool {
        self.allocation.as_ref().is_some_and(|a| a.retired)
    }

    /// True if this node is allocated to `application`.
    pub fn is_allocated_to(&self, application: &str) -> bool {
        self.allocation.as_ref().is_some_and(|a| a.owner == application)
    }

    /// The resources this node occupies on its parent.
    pub fn footprint(&self) -> &ResourceCapacity {
        &self.flavor.resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_flavor() -> Flavor {
        Flavor::new("d-2-8-50", 10, ResourceCapacity::new(2.0, 8.0, 50.0))
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&NodeState::Provisioned).unwrap();
        assert_eq!(json, "\"provisioned\"");
        assert_eq!(NodeState::Inactive.to_string(), "inactive");
    }

    #[test]
    fn node_defaults_optional_fields() {
        let json = r#"{
            "hostname": "n1.example.com",
            "state": "ready",
            "flavor": {
                "name": "d-2-8-50",
                "cost": 10,
                "resources": {"vcpu": 2.0, "memory_gb": 8.0, "disk_gb": 50.0}
            }
        }"#;
        let node: Node = serde_json::from_str(json).unwrap();

        assert_eq!(node.node_type, NodeType::Tenant);
        assert!(node.parent_hostname.is_none());
        assert!(node.allocation.is_none());
        assert_eq!(node.flavor, small_flavor());
    }

    #[test]
    fn allocation_helpers() {
        let node = Node::new("n1", NodeState::Active, small_flavor()).with_allocation("app-a", true);

        assert!(node.is_allocated_to("app-a"));
        assert!(!node.is_allocated_to("app-b"));
        assert!(node.is_retired());
    }

    #[test]
    fn host_constructor_sets_type() {
        let host = Node::host("h1", small_flavor());
        assert!(host.is_host());
        assert_eq!(host.state, NodeState::Active);
    }
}
