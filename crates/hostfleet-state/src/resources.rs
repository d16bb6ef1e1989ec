//! Resource capacity vectors.
//!
//! A [`ResourceCapacity`] is the unit of capacity accounting: a flavor's
//! footprint, a host's total size, or the free room left on a host after
//! its children are subtracted. All dimensions are non-negative.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Plain serialized form of a capacity vector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Dimensions {
    vcpu: f64,
    memory_gb: f64,
    disk_gb: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Unbounded {
    None,
}

/// Serialized form: the string `"none"` or a dimensions object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum CapacityRepr {
    Unbounded(Unbounded),
    Bounded(Dimensions),
}

/// An immutable vector of vCPU, memory and disk.
///
/// [`ResourceCapacity::NONE`] stands for "no parent host": it is unbounded
/// on every dimension, so it holds any requirement, survives subtraction
/// unchanged, and orders after every real capacity. It is the only value
/// with infinite components and serializes as `"none"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "CapacityRepr", into = "CapacityRepr")]
pub struct ResourceCapacity {
    vcpu: f64,
    memory_gb: f64,
    disk_gb: f64,
}

impl ResourceCapacity {
    /// Capacity of a node without a parent host.
    pub const NONE: ResourceCapacity = ResourceCapacity {
        vcpu: f64::INFINITY,
        memory_gb: f64::INFINITY,
        disk_gb: f64::INFINITY,
    };

    pub const ZERO: ResourceCapacity = ResourceCapacity {
        vcpu: 0.0,
        memory_gb: 0.0,
        disk_gb: 0.0,
    };

    /// Create a capacity vector. Negative and non-finite components become zero.
    pub fn new(vcpu: f64, memory_gb: f64, disk_gb: f64) -> Self {
        Self {
            vcpu: non_negative(vcpu),
            memory_gb: non_negative(memory_gb),
            disk_gb: non_negative(disk_gb),
        }
    }

    pub fn vcpu(&self) -> f64 {
        self.vcpu
    }

    pub fn memory_gb(&self) -> f64 {
        self.memory_gb
    }

    pub fn disk_gb(&self) -> f64 {
        self.disk_gb
    }

    /// True for [`ResourceCapacity::NONE`].
    pub fn is_none(&self) -> bool {
        self.vcpu.is_infinite() && self.memory_gb.is_infinite() && self.disk_gb.is_infinite()
    }

    /// Component-wise subtraction, clamped at zero.
    ///
    /// Clamping hides over-commit; use [`ResourceCapacity::has_capacity_for`]
    /// first when the caller needs to report it.
    pub fn subtract(&self, other: &ResourceCapacity) -> ResourceCapacity {
        if self.is_none() {
            return *self;
        }
        Self::new(
            self.vcpu - other.vcpu,
            self.memory_gb - other.memory_gb,
            self.disk_gb - other.disk_gb,
        )
    }

    /// Component-wise addition. Adding to or with `NONE` gives `NONE`.
    pub fn add(&self, other: &ResourceCapacity) -> ResourceCapacity {
        if self.is_none() || other.is_none() {
            return Self::NONE;
        }
        Self::new(
            self.vcpu + other.vcpu,
            self.memory_gb + other.memory_gb,
            self.disk_gb + other.disk_gb,
        )
    }

    /// True if every dimension of `required` fits in this capacity.
    pub fn has_capacity_for(&self, required: &ResourceCapacity) -> bool {
        self.vcpu >= required.vcpu
            && self.memory_gb >= required.memory_gb
            && self.disk_gb >= required.disk_gb
    }

    /// Total order over capacities: memory first, then disk, then vCPU.
    ///
    /// Memory is the resource hosts run out of first, so it dominates.
    /// `NONE` compares greater than any real capacity and equal to itself.
    pub fn compare(&self, other: &ResourceCapacity) -> Ordering {
        self.memory_gb
            .total_cmp(&other.memory_gb)
            .then_with(|| self.disk_gb.total_cmp(&other.disk_gb))
            .then_with(|| self.vcpu.total_cmp(&other.vcpu))
    }
}

impl Default for ResourceCapacity {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<CapacityRepr> for ResourceCapacity {
    fn from(repr: CapacityRepr) -> Self {
        match repr {
            CapacityRepr::Unbounded(Unbounded::None) => Self::NONE,
            CapacityRepr::Bounded(d) => Self::new(d.vcpu, d.memory_gb, d.disk_gb),
        }
    }
}

impl From<ResourceCapacity> for CapacityRepr {
    fn from(c: ResourceCapacity) -> Self {
        if c.is_none() {
            return CapacityRepr::Unbounded(Unbounded::None);
        }
        CapacityRepr::Bounded(Dimensions {
            vcpu: c.vcpu,
            memory_gb: c.memory_gb,
            disk_gb: c.disk_gb,
        })
    }
}

impl std::fmt::Display for ResourceCapacity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            return write!(f, "[none]");
        }
        write!(
            f,
            "[vcpu: {}, memory: {} GB, disk: {} GB]",
            self.vcpu, self.memory_gb, self.disk_gb
        )
    }
}

fn non_negative(value: f64) -> f64 {
    if !value.is_finite() || value < 0.0 { 0.0 } else { value }
}
