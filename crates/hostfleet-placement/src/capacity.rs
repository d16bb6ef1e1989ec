//! Free capacity of parent hosts.

use std::collections::BTreeMap;

use hostfleet_state::{Hostname, Node, NodeTable, ResourceCapacity};
use tracing::warn;

/// Free room per host, computed once from a snapshot.
///
/// Two figures are kept for every host: one that counts retired children
/// as used and one that treats their capacity as already reclaimed.
#[derive(Debug, Clone, Default)]
pub struct HostCapacity {
    retired_as_used: BTreeMap<Hostname, ResourceCapacity>,
    retired_as_free: BTreeMap<Hostname, ResourceCapacity>,
}

impl HostCapacity {
    pub fn new(table: &NodeTable) -> Self {
        let mut used: BTreeMap<&str, (ResourceCapacity, ResourceCapacity)> = table
            .hosts()
            .map(|h| (h.hostname.as_str(), (ResourceCapacity::ZERO, ResourceCapacity::ZERO)))
            .collect();

        for child in table.iter() {
            let Some(parent) = child.parent_hostname.as_deref() else {
                continue;
            };
            let Some((all, active)) = used.get_mut(parent) else {
                continue;
            };
            *all = all.add(child.footprint());
            if !child.is_retired() {
                *active = active.add(child.footprint());
            }
        }

        let mut capacity = Self::default();
        for host in table.hosts() {
            let Some((all, active)) = used.get(host.hostname.as_str()) else {
                continue;
            };
            let total = &host.flavor.resources;
            if !total.has_capacity_for(all) {
                warn!(
                    host = %host.hostname,
                    %total,
                    used = %all,
                    "host is over-committed, clamping free capacity"
                );
            }
            capacity
                .retired_as_used
                .insert(host.hostname.clone(), total.subtract(all));
            capacity
                .retired_as_free
                .insert(host.hostname.clone(), total.subtract(active));
        }
        capacity
    }

    /// Host resources minus the footprint of its children.
    ///
    /// With `retired_as_free`, children whose allocation is retired do not
    /// count, since their capacity is about to be reclaimed. A host missing
    /// from the snapshot has all of its resources free.
    pub fn free_capacity_of(&self, host: &Node, retired_as_free: bool) -> ResourceCapacity {
        let free = if retired_as_free {
            &self.retired_as_free
        } else {
            &self.retired_as_used
        };
        free.get(&host.hostname)
            .copied()
            .unwrap_or(host.flavor.resources)
    }
}
