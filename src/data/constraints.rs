//! Equal-DOF constraints: slave nodes tracking a master node's DOFs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mesh_error::{MeshAssemblyError, Result};
use crate::topology::ownership::CoreMap;
use crate::topology::point::PointKey;

/// Subset of DOFs (1-based, at most 16) coupled by a constraint.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DofMask(u16);

impl DofMask {
    pub const MAX_DOF: u8 = 16;

    /// Builds a mask from 1-based DOF numbers.
    pub fn from_dofs(dofs: &[u8]) -> Result<Self> {
        let mut bits = 0u16;
        for &d in dofs {
            if d == 0 || d > Self::MAX_DOF {
                return Err(MeshAssemblyError::validation(
                    "DOF mask",
                    format!("DOF {d} outside 1..={}", Self::MAX_DOF),
                ));
            }
            bits |= 1 << (d - 1);
        }
        Ok(Self(bits))
    }

    /// DOFs `1..=min(a, b)`: the ones both node representations carry.
    pub fn common(ndf_a: u8, ndf_b: u8) -> Self {
        let n = ndf_a.min(ndf_b).min(Self::MAX_DOF) as u32;
        Self(((1u32 << n) - 1) as u16)
    }

    pub fn contains(self, dof: u8) -> bool {
        dof >= 1 && dof <= Self::MAX_DOF && self.0 & (1 << (dof - 1)) != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Ascending 1-based DOF numbers.
    pub fn dofs(self) -> impl Iterator<Item = u8> {
        (1..=Self::MAX_DOF).filter(move |&d| self.contains(d))
    }
}

impl fmt::Debug for DofMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.dofs()).finish()
    }
}

/// Where a constraint lives once `Core` ids are final.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorePlacement {
    pub owner: usize,
    /// Other cores touching any constrained node, each holding a ghost copy.
    pub ghosts: Vec<usize>,
}

/// Slave nodes' listed DOFs follow the master node's.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EqualDofConstraint {
    pub master: usize,
    pub slaves: Vec<usize>,
    pub dofs: DofMask,
    pub placement: Option<CorePlacement>,
}

impl EqualDofConstraint {
    pub fn new(master: usize, slaves: Vec<usize>, dofs: DofMask) -> Self {
        Self {
            master,
            slaves,
            dofs,
            placement: None,
        }
    }

    /// Master followed by slaves.
    pub fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.master).chain(self.slaves.iter().copied())
    }
}

/// Constraints keyed by the stable identity of their master point.
///
/// Re-inserting under an existing key replaces the old constraint, which
/// keeps repeated rebuilds from accumulating duplicates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    constraints: BTreeMap<PointKey, EqualDofConstraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the constraint map.
    pub fn constraints(&self) -> &BTreeMap<PointKey, EqualDofConstraint> {
        &self.constraints
    }

    /// Insert or replace the constraint for `key`. Returns true when new.
    pub fn insert_constraint(&mut self, key: PointKey, constraint: EqualDofConstraint) -> bool {
        self.constraints.insert(key, constraint).is_none()
    }

    /// Like [`insert_constraint`](Self::insert_constraint), but refuses to
    /// replace a constraint on a different master that quantizes to the same key.
    ///
    /// # Errors
    /// `Topology` when `key` already holds a constraint for another master.
    pub fn try_insert_constraint(&mut self, key: PointKey, constraint: EqualDofConstraint) -> Result<bool> {
        if let Some(existing) = self.constraints.get(&key) {
            if existing.master != constraint.master {
                return Err(MeshAssemblyError::topology(
                    format!("constraint at {key}"),
                    format!(
                        "masters {} and {} share one tolerance cell; lower the merge tolerance or merge the points",
                        existing.master, constraint.master
                    ),
                ));
            }
        }
        Ok(self.insert_constraint(key, constraint))
    }

    pub fn get(&self, key: &PointKey) -> Option<&EqualDofConstraint> {
        self.constraints.get(key)
    }

    /// Remove the constraint for a point.
    pub fn clear_constraints_for_point(&mut self, key: &PointKey) -> Option<EqualDofConstraint> {
        self.constraints.remove(key)
    }

    /// Remove all constraints.
    pub fn clear_constraints(&mut self) {
        self.constraints.clear();
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Constraints in key order.
    pub fn iter(&self) -> impl Iterator<Item = &EqualDofConstraint> {
        self.constraints.values()
    }

    /// Assigns every constraint an owning core and its ghost cores.
    ///
    /// The owner is the owner of the master node (or of the first slave
    /// touched by any core). Returns the number of constraints spanning more
    /// than one core.
    pub fn place_on_cores(&mut self, core_map: &CoreMap) -> Result<usize> {
        let mut spanning = 0;
        for (key, constraint) in &mut self.constraints {
            let mut touched: Vec<usize> = constraint
                .nodes()
                .flat_map(|n| core_map.cores(n).iter().copied())
                .collect();
            touched.sort_unstable();
            touched.dedup();
            let owner = core_map
                .owner(constraint.master)
                .or_else(|| constraint.slaves.iter().find_map(|&s| core_map.owner(s)))
                .ok_or_else(|| {
                    MeshAssemblyError::topology(
                        format!("constraint at {key}"),
                        "no cell references any constrained node",
                    )
                })?;
            touched.retain(|&c| c != owner);
            if !touched.is_empty() {
                spanning += 1;
            }
            constraint.placement = Some(CorePlacement {
                owner,
                ghosts: touched,
            });
        }
        Ok(spanning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_mask_covers_translations() {
        let mask = DofMask::common(3, 9);
        assert_eq!(mask.dofs().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(mask, DofMask::from_dofs(&[1, 2, 3]).unwrap());
        assert_eq!(format!("{mask:?}"), "{1, 2, 3}");
        assert_eq!(DofMask::common(16, 16).len(), 16);
    }

    #[test]
    fn out_of_range_dof_is_rejected() {
        assert!(DofMask::from_dofs(&[0]).is_err());
        assert!(DofMask::from_dofs(&[17]).is_err());
    }

    #[test]
    fn reinserting_same_key_replaces() {
        let mut set = ConstraintSet::new();
        let key = PointKey::quantize([1.0, 2.0, 3.0], 1e-3);
        assert!(set.insert_constraint(key, EqualDofConstraint::new(0, vec![5], DofMask::common(3, 9))));
        assert!(!set.insert_constraint(key, EqualDofConstraint::new(2, vec![7], DofMask::common(3, 9))));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&key).unwrap().master, 2);
        set.clear_constraints_for_point(&key);
        assert!(set.is_empty());
    }

    #[test]
    fn distinct_masters_on_one_key_are_rejected() {
        let mut set = ConstraintSet::new();
        let tol = 1e-3;
        // 1.5 tol apart along the diagonal, yet in the same lattice cell.
        let d = 1.5 * tol / 3f64.sqrt();
        let a = PointKey::quantize([0.1 * tol; 3], tol);
        let b = PointKey::quantize([0.1 * tol + d; 3], tol);
        assert_eq!(a, b);
        let mask = DofMask::common(3, 3);
        assert!(set.try_insert_constraint(a, EqualDofConstraint::new(0, vec![4], mask)).unwrap());
        // Rebuilding the same master replaces quietly.
        assert!(!set.try_insert_constraint(a, EqualDofConstraint::new(0, vec![5], mask)).unwrap());
        let err = set.try_insert_constraint(b, EqualDofConstraint::new(1, vec![6], mask)).unwrap_err();
        assert_eq!(err.kind(), crate::mesh_error::ErrorKind::Topology);
        assert_eq!(set.get(&a).unwrap().slaves, vec![5]);
    }
}
