//! Equal-DOF coupling between two assembled mesh parts.
//!
//! When sections are assembled without merging, points on a shared surface
//! stay duplicated. A [`CouplingInterface`] finds such coincident pairs
//! between the cells of its two owners and ties them with equal-DOF
//! constraints on the DOFs both sides carry.

use std::any::Any;
use std::collections::BTreeSet;

use hashbrown::HashMap;

use crate::data::constraints::{ConstraintSet, DofMask, EqualDofConstraint};
use crate::data::mesh::Mesh;
use crate::interface::export::{ExportRecord, ExportWriter};
use crate::interface::{AssemblyContext, Capabilities, Interface};
use crate::mesh_error::{MeshAssemblyError, Result};
use crate::topology::ownership::CoreMap;
use crate::topology::point::PointKey;

#[derive(Clone, Debug)]
pub struct CouplingInterface {
    name: String,
    owners: Vec<String>,
    constraints: ConstraintSet,
}

impl CouplingInterface {
    /// Couples the cells of `master` to the cells of `slave`.
    pub fn new(name: impl Into<String>, master: impl Into<String>, slave: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (master, slave) = (master.into(), slave.into());
        if master.is_empty() || master == slave {
            return Err(MeshAssemblyError::validation(
                format!("coupling `{name}`"),
                "needs two distinct, non-empty owners",
            ));
        }
        Ok(Self {
            name,
            owners: vec![master, slave],
            constraints: ConstraintSet::new(),
        })
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    fn owner_points(&self, mesh: &Mesh, owner: &str) -> Result<BTreeSet<usize>> {
        let src = mesh.source_index(owner).ok_or_else(|| {
            MeshAssemblyError::validation(
                format!("coupling `{}`", self.name),
                format!("owner `{owner}` is not part of the assembled mesh"),
            )
        })?;
        Ok((0..mesh.num_cells())
            .filter(|&c| mesh.cell_source(c) == src)
            .flat_map(|c| mesh.cell(c).iter().copied())
            .collect())
    }

    /// Rebuilds the constraint set from scratch.
    pub fn build(&mut self, mesh: &Mesh, tol: f64) -> Result<usize> {
        let masters = self.owner_points(mesh, &self.owners[0])?;
        let slaves = self.owner_points(mesh, &self.owners[1])?;

        let mut grid: HashMap<PointKey, Vec<usize>> = HashMap::new();
        for &s in &slaves {
            grid.entry(PointKey::quantize(mesh.point(s), tol)).or_default().push(s);
        }
        let tol2 = tol * tol;
        let mut constraints = ConstraintSet::new();
        for &m in &masters {
            let xyz = mesh.point(m);
            let key = PointKey::quantize(xyz, tol);
            let mut matched: Vec<usize> = key
                .neighbourhood()
                .filter_map(|nb| grid.get(&nb))
                .flatten()
                .copied()
                .filter(|&s| s != m)
                .filter(|&s| {
                    let p = mesh.point(s);
                    (0..3).map(|k| (p[k] - xyz[k]).powi(2)).sum::<f64>() <= tol2
                })
                .collect();
            if matched.is_empty() {
                continue;
            }
            matched.sort_unstable();
            let min_ndf = matched.iter().map(|&s| mesh.ndf(s)).min().unwrap_or(0);
            let dofs = DofMask::common(mesh.ndf(m), min_ndf);
            constraints.try_insert_constraint(key, EqualDofConstraint::new(m, matched, dofs))?;
        }
        log::debug!("coupling `{}`: {} node pair(s) tied", self.name, constraints.len());
        self.constraints = constraints;
        Ok(self.constraints.len())
    }
}

impl Interface for CouplingInterface {
    fn name(&self) -> &str {
        &self.name
    }

    fn owners(&self) -> &[String] {
        &self.owners
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::OWNS_CONSTRAINTS | Capabilities::REACTS_TO_REPARTITION
    }

    fn on_post_assemble(&mut self, ctx: &mut AssemblyContext<'_>) -> Result<()> {
        self.build(ctx.mesh, ctx.tolerance).map(|_| ())
    }

    fn on_resolve_core_conflicts(&mut self, _mesh: &Mesh, core_map: &CoreMap) -> Result<()> {
        self.constraints.place_on_cores(core_map).map(|_| ())
    }

    fn on_pre_export(&self, _mesh: &Mesh, writer: &mut dyn ExportWriter) -> Result<()> {
        writer.write(ExportRecord::comment(format!(
            "coupling `{}`: {} -> {}",
            self.name, self.owners[0], self.owners[1]
        )))?;
        for c in self.constraints.iter() {
            writer.write(ExportRecord::equal_dof(c))?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
