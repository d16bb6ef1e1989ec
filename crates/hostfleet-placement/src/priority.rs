//! Candidate priority — the total order allocation picks nodes by.
//!
//! Two candidates are compared stage by stage; the first stage that tells
//! them apart decides. Earlier stages protect the fleet (spare headroom),
//! the middle ones prefer nodes that are cheapest to hand over (already
//! active, then idle, then reserved, then ready), and the last ones pack
//! hosts tightly and fall back to cost and hostname so no ties remain.
//!
//! | # | stage            | first                                  |
//! |---|------------------|----------------------------------------|
//! | 1 | spare protection | does not consume a spare host          |
//! | 2 | active           | `active`                               |
//! | 3 | non-surplus      | not retired earlier in this pass       |
//! | 4 | inactive         | `inactive`                             |
//! | 5 | reserved         | `reserved` and already in the repo     |
//! | 6 | ready            | `ready`                                |
//! | 7 | (state check)    | states must be equal from here on      |
//! | 8 | exact flavor     | has the flavor the request pinned      |
//! | 9 | parent presence  | runs on a host                         |
//! |10 | packing          | per [`PackingStrategy`]                |
//! |11 | cost             | cheaper flavor                         |
//! |12 | hostname         | lexicographically smaller              |

use std::cmp::Ordering;

use hostfleet_state::{Hostname, NodeState, ResourceCapacity};
use serde::{Deserialize, Serialize};

use crate::candidate::CandidateNode;
use crate::error::{AllocationError, AllocationResult};

/// How free parent capacity ranks candidates that tie on everything before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackingStrategy {
    /// Least free capacity first: fill busy hosts before touching empty ones.
    #[default]
    TightFit,
    /// Most free capacity first: spread load across hosts.
    Spread,
}

impl PackingStrategy {
    /// Order two parent capacities; `Less` means the first ranks higher.
    pub fn compare(&self, a: &ResourceCapacity, b: &ResourceCapacity) -> Ordering {
        match self {
            PackingStrategy::TightFit => a.compare(b),
            PackingStrategy::Spread => b.compare(a),
        }
    }
}

/// A comparison stage, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorityStage {
    SpareProtection,
    Active,
    NonSurplus,
    Inactive,
    Reserved,
    Ready,
    ExactFlavor,
    ParentPresence,
    Packing,
    Cost,
    Hostname,
}

impl PriorityStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityStage::SpareProtection => "spare_protection",
            PriorityStage::Active => "active",
            PriorityStage::NonSurplus => "non_surplus",
            PriorityStage::Inactive => "inactive",
            PriorityStage::Reserved => "reserved",
            PriorityStage::Ready => "ready",
            PriorityStage::ExactFlavor => "exact_flavor",
            PriorityStage::ParentPresence => "parent_presence",
            PriorityStage::Packing => "packing",
            PriorityStage::Cost => "cost",
            PriorityStage::Hostname => "hostname",
        }
    }
}

impl std::fmt::Display for PriorityStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stage that separated two candidates and which way it went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub stage: PriorityStage,
    pub ordering: Ordering,
}

/// Return early from a stage chain as soon as a stage discriminates.
macro_rules! stage {
    ($stage:ident, $ordering:expr) => {
        let ordering = $ordering;
        if ordering.is_ne() {
            return Some(Decision {
                stage: PriorityStage::$stage,
                ordering,
            });
        }
    };
}

/// `Less` if only `a` has the preferred property.
fn prefer(a: bool, b: bool) -> Ordering {
    b.cmp(&a)
}

fn state_stages(a: &CandidateNode, b: &CandidateNode) -> Option<Decision> {
    stage!(SpareProtection, prefer(!a.violates_spares(), !b.violates_spares()));
    stage!(
        Active,
        prefer(a.state() == NodeState::Active, b.state() == NodeState::Active)
    );
    stage!(NonSurplus, prefer(!a.is_surplus_node(), !b.is_surplus_node()));
    stage!(
        Inactive,
        prefer(a.state() == NodeState::Inactive, b.state() == NodeState::Inactive)
    );
    stage!(
        Reserved,
        prefer(a.is_reserved_in_repository(), b.is_reserved_in_repository())
    );
    stage!(
        Ready,
        prefer(a.state() == NodeState::Ready, b.state() == NodeState::Ready)
    );
    None
}

fn tie_break_stages(
    a: &CandidateNode,
    b: &CandidateNode,
    packing: PackingStrategy,
) -> Option<Decision> {
    stage!(ExactFlavor, prefer(a.preferred_on_flavor(), b.preferred_on_flavor()));
    stage!(ParentPresence, prefer(a.has_parent(), b.has_parent()));
    stage!(
        Packing,
        packing.compare(a.free_parent_capacity(), b.free_parent_capacity())
    );
    stage!(Cost, a.cost().cmp(&b.cost()));
    stage!(Hostname, a.hostname().cmp(b.hostname()));
    None
}

fn ensure_same_state(a: &CandidateNode, b: &CandidateNode) -> AllocationResult<()> {
    if a.state() == b.state() {
        return Ok(());
    }
    Err(AllocationError::StateMismatch {
        left_host: a.hostname().to_string(),
        left: a.state(),
        right_host: b.hostname().to_string(),
        right: b.state(),
    })
}

/// Find the stage that orders `a` relative to `b`.
///
/// `Ok(None)` means a full tie, which only happens for candidates with
/// the same hostname. Fails if the state stages tie but the states differ.
pub fn decide(
    a: &CandidateNode,
    b: &CandidateNode,
    packing: PackingStrategy,
) -> AllocationResult<Option<Decision>> {
    if let Some(decision) = state_stages(a, b) {
        return Ok(Some(decision));
    }
    ensure_same_state(a, b)?;
    Ok(tie_break_stages(a, b, packing))
}

/// Compare two candidates. `Less` means `a` should be allocated first.
pub fn compare(
    a: &CandidateNode,
    b: &CandidateNode,
    packing: PackingStrategy,
) -> AllocationResult<Ordering> {
    Ok(decide(a, b, packing)?.map_or(Ordering::Equal, |d| d.ordering))
}

/// Same order as [`compare`] without the state check.
fn order(a: &CandidateNode, b: &CandidateNode, packing: PackingStrategy) -> Ordering {
    state_stages(a, b)
        .or_else(|| tie_break_stages(a, b, packing))
        .map_or(Ordering::Equal, |d| d.ordering)
}

/// Free parent capacity ordered by one packing strategy.
#[derive(Debug, Clone, Copy)]
struct PackingKey {
    capacity: ResourceCapacity,
    strategy: PackingStrategy,
}

impl PartialEq for PackingKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for PackingKey {}

impl PartialOrd for PackingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.strategy.compare(&self.capacity, &other.capacity)
    }
}

/// Owned snapshot of everything [`order`] looks at, so candidates can sit
/// in an ordered set and be moved individually when their parent
/// capacity changes.
///
/// Every flag is stored so that `false` ranks first. Keys are only
/// comparable when built with the same packing strategy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct RankKey {
    states: [bool; 6],
    other_flavor: bool,
    no_parent: bool,
    packing: PackingKey,
    cost: u32,
    hostname: Hostname,
}

pub(crate) fn rank_key(c: &CandidateNode, packing: PackingStrategy) -> RankKey {
    RankKey {
        states: [
            c.violates_spares(),
            c.state() != NodeState::Active,
            c.is_surplus_node(),
            c.state() != NodeState::Inactive,
            !c.is_reserved_in_repository(),
            c.state() != NodeState::Ready,
        ],
        other_flavor: !c.preferred_on_flavor(),
        no_parent: !c.has_parent(),
        packing: PackingKey {
            capacity: *c.free_parent_capacity(),
            strategy: packing,
        },
        cost: c.cost(),
        hostname: c.hostname().to_string(),
    }
}

/// Sort candidates best first.
///
/// Candidates that tie on the state stages end up adjacent, so checking
/// neighbours is enough to catch any pair with mismatched states.
pub fn sort_candidates(
    candidates: &mut [CandidateNode],
    packing: PackingStrategy,
) -> AllocationResult<()> {
    candidates.sort_by(|a, b| order(a, b, packing));
    for pair in candidates.windows(2) {
        if state_stages(&pair[0], &pair[1]).is_none() {
            ensure_same_state(&pair[0], &pair[1])?;
        }
    }
    Ok(())
}
