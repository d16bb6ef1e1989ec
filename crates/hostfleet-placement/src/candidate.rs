//! Candidate nodes — a node plus the context needed to rank it.

use hostfleet_state::{Hostname, Node, NodeLookup, NodeState, ResourceCapacity};

/// Allocation-time context for a [`CandidateNode`].
///
/// `Default` gives a standalone, existing, non-surplus node with no
/// spare violation and no flavor preference.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateOptions {
    /// Free capacity on the parent host, counting retired siblings as free.
    pub free_parent_capacity: ResourceCapacity,
    /// Hostname of the parent host.
    pub parent: Option<Hostname>,
    /// Placing on this node would consume a spare host.
    pub violates_spares: bool,
    /// Already retired earlier in this allocation pass.
    pub is_surplus_node: bool,
    /// Not yet in the node repository.
    pub is_new_node: bool,
    /// The request pins a flavor and this node has it.
    pub preferred_on_flavor: bool,
}

impl Default for CandidateOptions {
    fn default() -> Self {
        Self {
            free_parent_capacity: ResourceCapacity::NONE,
            parent: None,
            violates_spares: false,
            is_surplus_node: false,
            is_new_node: false,
            preferred_on_flavor: false,
        }
    }
}

/// A node considered for one allocation request.
///
/// Built fresh per request and discarded afterwards. Only
/// `free_parent_capacity` changes during allocation, as siblings on the
/// same parent are claimed.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateNode {
    node: Node,
    free_parent_capacity: ResourceCapacity,
    parent: Option<Hostname>,
    violates_spares: bool,
    is_surplus_node: bool,
    is_new_node: bool,
    preferred_on_flavor: bool,
}

impl CandidateNode {
    pub fn new(node: Node, options: CandidateOptions) -> Self {
        Self {
            node,
            free_parent_capacity: options.free_parent_capacity,
            parent: options.parent,
            violates_spares: options.violates_spares,
            is_surplus_node: options.is_surplus_node,
            is_new_node: options.is_new_node,
            preferred_on_flavor: options.preferred_on_flavor,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn into_node(self) -> Node {
        self.node
    }

    pub fn hostname(&self) -> &str {
        &self.node.hostname
    }

    pub fn state(&self) -> NodeState {
        self.node.state
    }

    pub fn cost(&self) -> u32 {
        self.node.flavor.cost
    }

    pub fn free_parent_capacity(&self) -> &ResourceCapacity {
        &self.free_parent_capacity
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Resolve the parent host through the repository snapshot.
    pub fn parent_node<'a, L: NodeLookup>(&self, lookup: &'a L) -> Option<&'a Node> {
        self.parent.as_deref().and_then(|p| lookup.node(p))
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    pub fn violates_spares(&self) -> bool {
        self.violates_spares
    }

    pub fn is_surplus_node(&self) -> bool {
        self.is_surplus_node
    }

    pub fn is_new_node(&self) -> bool {
        self.is_new_node
    }

    pub fn preferred_on_flavor(&self) -> bool {
        self.preferred_on_flavor
    }

    /// Reserved from an earlier attempt at this request. Meaningless for
    /// nodes that are not in the repository yet.
    pub fn is_reserved_in_repository(&self) -> bool {
        !self.is_new_node && self.node.state == NodeState::Reserved
    }

    /// Subtract a sibling's footprint from the tracked parent capacity.
    ///
    /// Returns false if the sibling did not fit, in which case the
    /// capacity is clamped at zero.
    pub(crate) fn claim_parent_capacity(&mut self, footprint: &ResourceCapacity) -> bool {
        let fits = self.free_parent_capacity.has_capacity_for(footprint);
        self.free_parent_capacity = self.free_parent_capacity.subtract(footprint);
        fits
    }
}
