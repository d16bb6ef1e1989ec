//! Allocation engine — picks the best candidates for one request.
//!
//! Given a candidate pool, the engine:
//! 1. Sets aside candidates whose flavor is too small for the request
//! 2. Ranks the rest (see [`crate::priority`])
//! 3. Takes candidates from the front, charging each pick against its
//!    parent host so later siblings see the reduced free capacity
//! 4. Places new nodes only while their parent has room, where room is
//!    reduced by new-node picks alone since existing nodes are already
//!    counted in the snapshot
//!
//! It never creates nodes. If the pool is too small the result carries a
//! shortfall and the caller decides whether to provision more.

use std::collections::{BTreeMap, BTreeSet};

use hostfleet_state::{ApplicationId, Hostname, ResourceCapacity};
use tracing::{debug, info, warn};

use crate::candidate::CandidateNode;
use crate::config::AllocationConfig;
use crate::error::AllocationResult;
use crate::priority::{PackingStrategy, RankKey, rank_key, sort_candidates};

/// One allocation request.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationRequest {
    /// Application the nodes are allocated to.
    pub application: ApplicationId,
    /// Number of nodes wanted.
    pub count: usize,
    /// Minimum resources per node.
    pub resources: ResourceCapacity,
    /// Exact flavor to prefer, if the request names one.
    pub pinned_flavor: Option<String>,
    /// Application nodes retired earlier in this allocation pass.
    pub surplus: BTreeSet<Hostname>,
}

impl AllocationRequest {
    pub fn new(application: impl Into<ApplicationId>, count: usize, resources: ResourceCapacity) -> Self {
        Self {
            application: application.into(),
            count,
            resources,
            pinned_flavor: None,
            surplus: BTreeSet::new(),
        }
    }

    pub fn with_pinned_flavor(mut self, flavor: impl Into<String>) -> Self {
        self.pinned_flavor = Some(flavor.into());
        self
    }

    pub fn with_surplus(mut self, hostnames: impl IntoIterator<Item = impl Into<Hostname>>) -> Self {
        self.surplus.extend(hostnames.into_iter().map(Into::into));
        self
    }

    /// True if the request pins exactly this flavor.
    pub fn prefers_flavor(&self, flavor: &str) -> bool {
        self.pinned_flavor.as_deref() == Some(flavor)
    }
}

/// Outcome of an allocation.
#[derive(Debug, Clone)]
pub struct Allocation {
    /// Chosen candidates, best first.
    pub selected: Vec<CandidateNode>,
    /// Everything not chosen: ranked leftovers, then candidates whose
    /// parent ran out of room, then candidates too small for the request.
    pub remainder: Vec<CandidateNode>,
    /// How many nodes the pool could not supply.
    pub shortfall: usize,
}

impl Allocation {
    pub fn is_fulfilled(&self) -> bool {
        self.shortfall == 0
    }

    pub fn selected_hostnames(&self) -> Vec<&str> {
        self.selected.iter().map(|c| c.hostname()).collect()
    }
}

/// Rank the candidates that could serve `request`, best first, without
/// selecting anything.
///
/// Candidates whose flavor is too small for the request are dropped, so
/// the head of the ranking is what [`allocate`] would try first.
pub fn rank_candidates(
    pool: Vec<CandidateNode>,
    request: &AllocationRequest,
    config: &AllocationConfig,
) -> AllocationResult<Vec<CandidateNode>> {
    let (mut eligible, _) = split_eligible(pool, request);
    sort_candidates(&mut eligible, config.packing)?;
    Ok(eligible)
}

/// Select up to `request.count` candidates from the pool.
///
/// Candidates stay in an ordered set keyed on their rank. A pick only
/// re-keys the remaining siblings on the same parent.
pub fn allocate(
    pool: Vec<CandidateNode>,
    request: &AllocationRequest,
    config: &AllocationConfig,
) -> AllocationResult<Allocation> {
    let pool_size = pool.len();
    let packing = config.packing;
    let (mut ranked, too_small) = split_eligible(pool, request);
    sort_candidates(&mut ranked, packing)?;

    // Room each parent has for nodes the snapshot does not count yet.
    let mut room: BTreeMap<Hostname, ResourceCapacity> = BTreeMap::new();
    let mut siblings: BTreeMap<Hostname, Vec<usize>> = BTreeMap::new();
    let mut queue: BTreeSet<(RankKey, usize)> = BTreeSet::new();
    let mut slots: Vec<Option<CandidateNode>> = Vec::with_capacity(ranked.len());
    for (i, candidate) in ranked.into_iter().enumerate() {
        if let Some(parent) = candidate.parent() {
            let free = *candidate.free_parent_capacity();
            room.entry(parent.to_string())
                .and_modify(|r| {
                    if free.compare(r).is_lt() {
                        *r = free;
                    }
                })
                .or_insert(free);
            siblings.entry(parent.to_string()).or_default().push(i);
        }
        queue.insert((rank_key(&candidate, packing), i));
        slots.push(Some(candidate));
    }

    let mut selected = Vec::with_capacity(request.count.min(slots.len()));
    let mut parent_full = Vec::new();

    while selected.len() < request.count {
        let Some((_, i)) = queue.pop_first() else {
            break;
        };
        let Some(chosen) = slots[i].take() else {
            continue;
        };

        // A new node still has to be placed on its parent.
        let parent_room = match chosen.parent() {
            Some(parent) if chosen.is_new_node() => room.get_mut(parent),
            _ => None,
        };
        if let Some(free) = parent_room {
            let footprint = chosen.node().footprint();
            if !free.has_capacity_for(footprint) {
                debug!(
                    node = %chosen.hostname(),
                    parent = chosen.parent().unwrap_or_default(),
                    room = %free,
                    "parent host has no room left for new node"
                );
                parent_full.push(chosen);
                continue;
            }
            *free = free.subtract(footprint);
        }

        debug!(
            node = %chosen.hostname(),
            rank = selected.len(),
            state = %chosen.state(),
            parent = chosen.parent().unwrap_or_default(),
            free_parent_capacity = %chosen.free_parent_capacity(),
            "selected node"
        );

        if let Some(members) = chosen.parent().and_then(|p| siblings.get(p)) {
            charge_siblings(&mut queue, &mut slots, members, chosen.node().footprint(), packing);
        }
        selected.push(chosen);
    }

    let shortfall = request.count.saturating_sub(selected.len());
    if shortfall > 0 {
        warn!(
            application = %request.application,
            requested = request.count,
            shortfall,
            "not enough candidates to satisfy request"
        );
    }
    info!(
        application = %request.application,
        pool = pool_size,
        selected = selected.len(),
        shortfall,
        "allocation computed"
    );

    let mut remainder: Vec<CandidateNode> = queue
        .into_iter()
        .filter_map(|(_, i)| slots[i].take())
        .collect();
    remainder.extend(parent_full);
    remainder.extend(too_small);

    Ok(Allocation {
        selected,
        remainder,
        shortfall,
    })
}

/// Split off candidates whose flavor cannot hold the requested resources.
fn split_eligible(
    pool: Vec<CandidateNode>,
    request: &AllocationRequest,
) -> (Vec<CandidateNode>, Vec<CandidateNode>) {
    let (eligible, too_small): (Vec<_>, Vec<_>) = pool
        .into_iter()
        .partition(|c| c.node().footprint().has_capacity_for(&request.resources));
    for c in &too_small {
        debug!(
            node = %c.hostname(),
            flavor = %c.node().flavor.name,
            "flavor too small for request"
        );
    }
    (eligible, too_small)
}

/// Subtract `footprint` from every sibling still waiting in `queue` and
/// move it to its new rank.
fn charge_siblings(
    queue: &mut BTreeSet<(RankKey, usize)>,
    slots: &mut [Option<CandidateNode>],
    members: &[usize],
    footprint: &ResourceCapacity,
    packing: PackingStrategy,
) {
    for &j in members {
        let Some(sibling) = slots[j].as_mut() else {
            continue;
        };
        queue.remove(&(rank_key(sibling, packing), j));
        if !sibling.claim_parent_capacity(footprint) {
            // Existing picks are already counted in the snapshot figure.
            debug!(
                node = %sibling.hostname(),
                parent = sibling.parent().unwrap_or_default(),
                "sibling capacity exhausted by earlier picks"
            );
        }
        queue.insert((rank_key(sibling, packing), j));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateOptions;
    use crate::error::AllocationError;
    use hostfleet_state::{Flavor, Node, NodeState};

    fn flavor(mem: f64, cost: u32) -> Flavor {
        Flavor::new(format!("mem-{mem}"), cost, ResourceCapacity::new(2.0, mem, 50.0))
    }

    fn make_candidate(hostname: &str, state: NodeState, options: CandidateOptions) -> CandidateNode {
        CandidateNode::new(Node::new(hostname, state, flavor(30.0, 10)), options)
    }

    fn on_parent(hostname: &str, parent: &str, free_mem: f64) -> CandidateNode {
        make_candidate(
            hostname,
            NodeState::Ready,
            CandidateOptions {
                parent: Some(parent.to_string()),
                free_parent_capacity: ResourceCapacity::new(64.0, free_mem, 1000.0),
                ..Default::default()
            },
        )
    }

    fn request(count: usize) -> AllocationRequest {
        AllocationRequest::new("app", count, ResourceCapacity::new(1.0, 4.0, 10.0))
    }

    #[test]
    fn zero_count_selects_nothing() {
        let pool = vec![make_candidate("a", NodeState::Ready, CandidateOptions::default())];
        let result = allocate(pool, &request(0), &AllocationConfig::default()).unwrap();

        assert!(result.selected.is_empty());
        assert_eq!(result.remainder.len(), 1);
        assert!(result.is_fulfilled());
    }

    #[test]
    fn too_small_flavors_go_to_remainder() {
        let tiny = CandidateNode::new(
            Node::new("tiny", NodeState::Active, flavor(2.0, 1)),
            CandidateOptions::default(),
        );
        let fine = make_candidate("fine", NodeState::Ready, CandidateOptions::default());

        let result = allocate(vec![tiny, fine], &request(2), &AllocationConfig::default()).unwrap();

        assert_eq!(result.selected_hostnames(), vec!["fine"]);
        assert_eq!(result.remainder.len(), 1);
        assert_eq!(result.remainder[0].hostname(), "tiny");
        assert_eq!(result.shortfall, 1);
    }

    #[test]
    fn picks_update_sibling_capacity_and_rerank() {
        // host-x starts tighter, so its nodes lead; after two picks it is
        // still tighter and the third pick stays on it.
        let pool = vec![
            on_parent("x1", "host-x", 100.0),
            on_parent("x2", "host-x", 100.0),
            on_parent("x3", "host-x", 100.0),
            on_parent("y1", "host-y", 120.0),
        ];
        let result = allocate(pool, &request(2), &AllocationConfig::default()).unwrap();

        assert_eq!(result.selected_hostnames(), vec!["x1", "x2"]);
        let x3 = result
            .remainder
            .iter()
            .find(|c| c.hostname() == "x3")
            .unwrap();
        assert_eq!(x3.free_parent_capacity().memory_gb(), 40.0);
        let y1 = result
            .remainder
            .iter()
            .find(|c| c.hostname() == "y1")
            .unwrap();
        assert_eq!(y1.free_parent_capacity().memory_gb(), 120.0);
        assert_eq!(result.remainder[0].hostname(), "x3");
    }

    #[test]
    fn spread_strategy_alternates_hosts() {
        let pool = vec![
            on_parent("x1", "host-x", 100.0),
            on_parent("x2", "host-x", 100.0),
            on_parent("y1", "host-y", 90.0),
            on_parent("y2", "host-y", 90.0),
        ];
        let config = AllocationConfig {
            packing: PackingStrategy::Spread,
            ..Default::default()
        };
        let result = allocate(pool, &request(2), &config).unwrap();

        // x1 first (most room); host-x drops to 70, so y1 (90) is next.
        assert_eq!(result.selected_hostnames(), vec!["x1", "y1"]);
    }

    #[test]
    fn new_node_skipped_when_parent_fills_up() {
        let new_on = |hostname: &str| {
            make_candidate(
                hostname,
                NodeState::Reserved,
                CandidateOptions {
                    parent: Some("host-n".to_string()),
                    free_parent_capacity: ResourceCapacity::new(64.0, 50.0, 1000.0),
                    is_new_node: true,
                    ..Default::default()
                },
            )
        };
        let pool = vec![new_on("n1"), new_on("n2")];
        let result = allocate(pool, &request(2), &AllocationConfig::default()).unwrap();

        assert_eq!(result.selected_hostnames(), vec!["n1"]);
        assert_eq!(result.shortfall, 1);
        assert_eq!(result.remainder[0].hostname(), "n2");
    }

    #[test]
    fn existing_pick_leaves_room_for_new_node() {
        // host-1 has 100 GB and app-1 already uses 30 of it, so 70 is free.
        let on_host_1 = |is_new_node: bool| CandidateOptions {
            parent: Some("host-1".to_string()),
            free_parent_capacity: ResourceCapacity::new(64.0, 70.0, 1000.0),
            is_new_node,
            ..Default::default()
        };
        let existing = CandidateNode::new(
            Node::new("app-1", NodeState::Active, flavor(30.0, 10)).with_allocation("app", false),
            on_host_1(false),
        );
        let fresh = CandidateNode::new(
            Node::new("new-1", NodeState::Reserved, flavor(60.0, 10)),
            on_host_1(true),
        );

        let result = allocate(vec![fresh, existing], &request(2), &AllocationConfig::default()).unwrap();

        assert_eq!(result.selected_hostnames(), vec!["app-1", "new-1"]);
        assert_eq!(result.shortfall, 0);
        assert!(result.remainder.is_empty());
    }

    #[test]
    fn new_node_picks_consume_parent_room() {
        let fresh = |hostname: &str, mem: f64| {
            CandidateNode::new(
                Node::new(hostname, NodeState::Reserved, flavor(mem, 10)),
                CandidateOptions {
                    parent: Some("host-1".to_string()),
                    free_parent_capacity: ResourceCapacity::new(64.0, 70.0, 1000.0),
                    is_new_node: true,
                    ..Default::default()
                },
            )
        };
        let pool = vec![fresh("new-1", 40.0), fresh("new-2", 40.0), fresh("new-3", 30.0)];

        let result = allocate(pool, &request(3), &AllocationConfig::default()).unwrap();

        assert_eq!(result.selected_hostnames(), vec!["new-1", "new-3"]);
        assert_eq!(result.shortfall, 1);
        assert_eq!(result.remainder[0].hostname(), "new-2");
    }

    #[test]
    fn rank_candidates_drops_too_small_flavors() {
        let tiny = CandidateNode::new(
            Node::new("tiny", NodeState::Active, flavor(2.0, 1)),
            CandidateOptions::default(),
        );
        let fine = make_candidate("fine", NodeState::Ready, CandidateOptions::default());

        let ranked =
            rank_candidates(vec![tiny, fine], &request(1), &AllocationConfig::default()).unwrap();

        let order: Vec<&str> = ranked.iter().map(|c| c.hostname()).collect();
        assert_eq!(order, vec!["fine"]);
    }

    /// Re-sort everything after every pick.
    fn resort_each_pick(mut ranked: Vec<CandidateNode>, count: usize, packing: PackingStrategy) -> Vec<String> {
        let mut picked = Vec::new();
        while picked.len() < count && !ranked.is_empty() {
            sort_candidates(&mut ranked, packing).unwrap();
            let chosen = ranked.remove(0);
            for sibling in ranked.iter_mut().filter(|c| c.parent() == chosen.parent()) {
                if chosen.has_parent() {
                    sibling.claim_parent_capacity(chosen.node().footprint());
                }
            }
            picked.push(chosen.hostname().to_string());
        }
        picked
    }

    #[test]
    fn queue_matches_full_resort_on_a_large_pool() {
        let mut pool = Vec::new();
        for p in 0..12 {
            for n in 0..15 {
                let state = if n % 3 == 0 { NodeState::Inactive } else { NodeState::Ready };
                pool.push(CandidateNode::new(
                    Node::new(format!("n-{p:02}-{n:02}"), state, flavor(4.0 + (n % 4) as f64, n % 5)),
                    CandidateOptions {
                        parent: (p != 0).then(|| format!("host-{p:02}")),
                        free_parent_capacity: if p == 0 {
                            ResourceCapacity::NONE
                        } else {
                            ResourceCapacity::new(64.0, 40.0 + 7.0 * p as f64, 1000.0)
                        },
                        ..Default::default()
                    },
                ));
            }
        }

        for packing in [PackingStrategy::TightFit, PackingStrategy::Spread] {
            let config = AllocationConfig {
                packing,
                ..Default::default()
            };
            let result = allocate(pool.clone(), &request(120), &config).unwrap();

            let expected = resort_each_pick(pool.clone(), 120, packing);
            let picked: Vec<String> = result
                .selected
                .iter()
                .map(|c| c.hostname().to_string())
                .collect();
            assert_eq!(picked, expected);
            assert_eq!(result.remainder.len(), pool.len() - 120);
        }
    }

    #[test]
    fn ranking_errors_abort_allocation() {
        let pool = vec![
            make_candidate("a", NodeState::Failed, CandidateOptions::default()),
            make_candidate("b", NodeState::Parked, CandidateOptions::default()),
        ];
        let result = allocate(pool, &request(1), &AllocationConfig::default());
        assert!(matches!(result, Err(AllocationError::StateMismatch { .. })));
    }

    #[test]
    fn rank_candidates_is_idempotent() {
        let pool = vec![
            make_candidate("c", NodeState::Ready, CandidateOptions::default()),
            on_parent("b", "host-x", 10.0),
            make_candidate("a", NodeState::Active, CandidateOptions::default()),
            on_parent("d", "host-y", 50.0),
        ];
        let config = AllocationConfig::default();

        let req = request(2);

        let once = rank_candidates(pool.clone(), &req, &config).unwrap();
        let twice = rank_candidates(once.clone(), &req, &config).unwrap();
        let from_scratch = rank_candidates(pool, &req, &config).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once, from_scratch);
        let order: Vec<&str> = once.iter().map(|c| c.hostname()).collect();
        assert_eq!(order, vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn request_builders() {
        let req = request(3)
            .with_pinned_flavor("mem-30")
            .with_surplus(["old-1", "old-2"]);

        assert!(req.prefers_flavor("mem-30"));
        assert!(!req.prefers_flavor("mem-60"));
        assert!(req.surplus.contains("old-1"));
        assert_eq!(req.surplus.len(), 2);
    }
}
