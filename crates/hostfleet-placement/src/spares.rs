//! Spare hosts — headroom kept free for failures.

use std::collections::BTreeSet;

use hostfleet_state::{Hostname, Node, NodeState, NodeTable};
use tracing::debug;

use crate::capacity::HostCapacity;

/// The hosts that should stay empty so failed nodes can be replaced.
///
/// Spares are the `spare_count` active hosts with the most free
/// capacity, counting retired children as used. Ties go to the
/// lexicographically smaller hostname.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpareHosts {
    hosts: BTreeSet<Hostname>,
}

impl SpareHosts {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn select(table: &NodeTable, capacity: &HostCapacity, spare_count: usize) -> Self {
        if spare_count == 0 {
            return Self::none();
        }

        let mut ranked: Vec<(&Node, _)> = table
            .hosts()
            .filter(|h| h.state == NodeState::Active)
            .map(|h| (h, capacity.free_capacity_of(h, false)))
            .collect();
        ranked.sort_by(|(a, a_free), (b, b_free)| {
            b_free
                .compare(a_free)
                .then_with(|| a.hostname.cmp(&b.hostname))
        });

        let hosts: BTreeSet<Hostname> = ranked
            .into_iter()
            .take(spare_count)
            .map(|(h, _)| h.hostname.clone())
            .collect();
        debug!(?hosts, spare_count, "selected spare hosts");
        Self { hosts }
    }

    pub fn is_spare(&self, hostname: &str) -> bool {
        self.hosts.contains(hostname)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
