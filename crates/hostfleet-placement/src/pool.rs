//! Candidate pool construction from a node repository snapshot.
//!
//! Bridges `hostfleet_state::{NodeTable, Node}` to the engine's
//! [`CandidateNode`]s: resolves each node's parent, computes the parent's
//! free capacity, applies spare-host policy, and marks surplus, new, and
//! flavor-preferred nodes for the request.

use std::collections::BTreeSet;

use hostfleet_state::{Hostname, Node, NodeState, NodeTable, ResourceCapacity};
use tracing::{debug, warn};

use crate::allocator::AllocationRequest;
use crate::candidate::{CandidateNode, CandidateOptions};
use crate::capacity::HostCapacity;
use crate::config::AllocationConfig;
use crate::error::{AllocationError, AllocationResult};
use crate::spares::SpareHosts;

/// States in which a node already allocated to the application is reused.
const REUSABLE_STATES: [NodeState; 3] = [NodeState::Active, NodeState::Inactive, NodeState::Reserved];

/// Builds the candidate pool for one request.
pub struct CandidatePool<'a> {
    table: &'a NodeTable,
    request: &'a AllocationRequest,
    capacity: HostCapacity,
    spares: SpareHosts,
    candidates: Vec<CandidateNode>,
    seen: BTreeSet<Hostname>,
}

impl<'a> CandidatePool<'a> {
    /// Start an empty pool and select spare hosts for it.
    pub fn new(table: &'a NodeTable, request: &'a AllocationRequest, config: &AllocationConfig) -> Self {
        let capacity = HostCapacity::new(table);
        let spares = SpareHosts::select(table, &capacity, config.spare_count);
        Self {
            table,
            request,
            capacity,
            spares,
            candidates: Vec::new(),
            seen: BTreeSet::new(),
        }
    }

    /// The usual pool: the application's own nodes plus all ready nodes.
    pub fn from_table(
        table: &'a NodeTable,
        request: &'a AllocationRequest,
        config: &AllocationConfig,
    ) -> AllocationResult<Vec<CandidateNode>> {
        let mut pool = Self::new(table, request, config);
        pool.add_application_nodes()?;
        pool.add_ready_nodes()?;
        Ok(pool.into_candidates())
    }

    pub fn spare_hosts(&self) -> &SpareHosts {
        &self.spares
    }

    /// Add tenant nodes allocated to the requesting application.
    pub fn add_application_nodes(&mut self) -> AllocationResult<()> {
        let (table, request) = (self.table, self.request);
        for node in table.iter().filter(|n| {
            !n.is_host()
                && n.is_allocated_to(&request.application)
                && REUSABLE_STATES.contains(&n.state)
        }) {
            self.push(node.clone(), false)?;
        }
        Ok(())
    }

    /// Add unallocated tenant nodes in the ready state.
    pub fn add_ready_nodes(&mut self) -> AllocationResult<()> {
        let table = self.table;
        for node in table
            .iter()
            .filter(|n| !n.is_host() && n.allocation.is_none() && n.state == NodeState::Ready)
        {
            self.push(node.clone(), false)?;
        }
        Ok(())
    }

    /// Add nodes that would be created for this request.
    ///
    /// Nodes already in the snapshot and nodes whose parent has no room
    /// for them are skipped.
    pub fn add_new_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) -> AllocationResult<()> {
        for node in nodes {
            if self.table.get(&node.hostname).is_some() {
                warn!(node = %node.hostname, "new node already exists in repository, skipping");
                continue;
            }
            self.push(node, true)?;
        }
        Ok(())
    }

    pub fn into_candidates(self) -> Vec<CandidateNode> {
        debug!(
            application = %self.request.application,
            candidates = self.candidates.len(),
            spares = self.spares.len(),
            "candidate pool built"
        );
        self.candidates
    }

    fn push(&mut self, node: Node, is_new_node: bool) -> AllocationResult<()> {
        if !self.seen.insert(node.hostname.clone()) {
            return Ok(());
        }
        let Some(candidate) = self.to_candidate(node, is_new_node)? else {
            return Ok(());
        };
        self.candidates.push(candidate);
        Ok(())
    }

    fn to_candidate(&self, node: Node, is_new_node: bool) -> AllocationResult<Option<CandidateNode>> {
        let mut options = CandidateOptions {
            is_new_node,
            is_surplus_node: self.request.surplus.contains(&node.hostname),
            preferred_on_flavor: self.request.prefers_flavor(&node.flavor.name),
            ..Default::default()
        };

        if let Some(parent_name) = node.parent_hostname.as_deref() {
            let parent = self
                .table
                .get(parent_name)
                .filter(|p| p.is_host())
                .ok_or_else(|| AllocationError::UnknownParent {
                    node: node.hostname.clone(),
                    parent: parent_name.to_string(),
                })?;

            let free = self.capacity.free_capacity_of(parent, true);
            if is_new_node && !free.has_capacity_for(node.footprint()) {
                debug!(
                    node = %node.hostname,
                    parent = %parent.hostname,
                    %free,
                    "no room for new node on parent"
                );
                return Ok(None);
            }

            options.free_parent_capacity = free;
            options.parent = Some(parent.hostname.clone());
            // Keeping a node the application already has does not consume the spare.
            options.violates_spares = self.spares.is_spare(&parent.hostname)
                && !node.is_allocated_to(&self.request.application);
        } else {
            options.free_parent_capacity = ResourceCapacity::NONE;
        }

        Ok(Some(CandidateNode::new(node, options)))
    }
}
