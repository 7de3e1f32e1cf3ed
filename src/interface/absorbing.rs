//! Absorbing boundary layers wrapped around the assembled mesh.
//!
//! An [`AbsorbingLayer`] extrudes `num_layers` shells from the current
//! exterior of the global mesh (see [`crate::algs::extrude`]) and gives
//! every shell cell fresh element, material and region tags:
//!
//! - **PML**: 9-DOF `PML3D` elements whose parameters depend on depth. The
//!   interface nodes are duplicated and tied to the interior nodes with
//!   equal-DOF constraints on the translations.
//! - **Rayleigh**: the interior element formulation on a region with
//!   frequency-band Rayleigh damping. Interface nodes are shared.
//!
//! Tags are cached per (layer, source element, source material) and per
//! (layer, source region), so rebuilding after a re-assembly rewrites the same
//! records instead of growing the property library. Constraints are keyed
//! by [`PointKey`] and replaced wholesale on every build.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use serde::Serialize;

use crate::algs::boundary::classify_rectangular;
use crate::algs::extrude::{ShellExtrusion, extrude_shell};
use crate::config::{AbsorbingLayerParams, DampingModel, LayerGeometry};
use crate::data::constraints::{ConstraintSet, DofMask, EqualDofConstraint};
use crate::data::mesh::{CellSpec, Mesh};
use crate::data::properties::{
    ElementFormulation, ElementRecord, MaterialKind, MaterialRecord, PmlParameters, PropertyLibrary,
    RayleighDamping, RegionRecord,
};
use crate::interface::export::{ExportRecord, ExportWriter};
use crate::interface::{AssemblyContext, Capabilities, Interface};
use crate::mesh_error::{MeshAssemblyError, Result};
use crate::partitioning::partition_centroids;
use crate::topology::cell_type::CellType;
use crate::topology::ownership::CoreMap;
use crate::topology::point::PointKey;

/// Solver name of the PML brick element.
pub const PML_ELEMENT: &str = "PML3D";

/// What the last build produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AbsorbingLayerReport {
    /// Global depth index of the first layer of this interface (1-based).
    pub first_depth: usize,
    pub num_layers: usize,
    pub thickness: f64,
    /// Exterior faces extruded per layer.
    pub exterior_faces: usize,
    pub points: Range<usize>,
    pub cells: Range<usize>,
    /// Distinct `Core` ids given to the new cells.
    pub cores: Vec<usize>,
    pub constraints: usize,
    /// Recoverable anomalies (skipped faces, missing damping).
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct TagCache {
    /// (layer, source element, source material) -> (element, material)
    elements: BTreeMap<(usize, u32, u32), (u32, u32)>,
    /// (layer, source region) -> region
    regions: BTreeMap<(usize, u32), u32>,
}

impl TagCache {
    fn fresh_element(&self, lib: &PropertyLibrary) -> u32 {
        let cached = self.elements.values().map(|&(e, _)| e + 1).max().unwrap_or(1);
        lib.next_element_tag().max(cached)
    }

    fn fresh_material(&self, lib: &PropertyLibrary) -> u32 {
        let cached = self.elements.values().map(|&(_, m)| m + 1).max().unwrap_or(1);
        lib.next_material_tag().max(cached)
    }

    fn fresh_region(&self, lib: &PropertyLibrary) -> u32 {
        let cached = self.regions.values().map(|&r| r + 1).max().unwrap_or(1);
        lib.next_region_tag().max(cached)
    }
}

/// Absorbing-layer interface.
#[derive(Clone, Debug)]
pub struct AbsorbingLayer {
    name: String,
    owners: Vec<String>,
    params: AbsorbingLayerParams,
    tags: TagCache,
    constraints: ConstraintSet,
    report: Option<AbsorbingLayerReport>,
}

impl AbsorbingLayer {
    /// # Errors
    /// Whatever [`AbsorbingLayerParams::validate`] rejects.
    pub fn new(name: impl Into<String>, params: AbsorbingLayerParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            name: name.into(),
            owners: Vec::new(),
            params,
            tags: TagCache::default(),
            constraints: ConstraintSet::new(),
            report: None,
        })
    }

    pub fn params(&self) -> &AbsorbingLayerParams {
        &self.params
    }

    /// Equal-DOF constraints of the last build.
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn report(&self) -> Option<&AbsorbingLayerReport> {
        self.report.as_ref()
    }

    fn context(&self) -> String {
        format!("absorbing layer `{}`", self.name)
    }

    /// Extrudes the layers into `mesh` and records their properties in `lib`.
    ///
    /// Both are left untouched on error. Building again on a mesh that
    /// already holds this layer's cells is a no-op.
    ///
    /// # Errors
    /// - `Validation` if the mesh is not assembled, not box shaped, or the
    ///   source cells lack the records the damping model needs.
    /// - `Topology` for a degenerate layer thickness.
    /// - `NotImplemented` for PML on triangular exterior faces.
    /// - `Partition` if the layers cannot be split into `num_partitions`.
    pub fn build(&mut self, mesh: &mut Mesh, lib: &mut PropertyLibrary, tol: f64) -> Result<&AbsorbingLayerReport> {
        let context = self.context();
        if let Some(src) = mesh.source_index(&self.name) {
            if (0..mesh.num_cells()).any(|c| mesh.cell_source(c) == src) {
                return self.report.as_ref().ok_or_else(|| {
                    MeshAssemblyError::validation(&context, "mesh already holds cells under this name")
                });
            }
        }
        if mesh.core().is_none() {
            return Err(MeshAssemblyError::validation(&context, "the mesh must be assembled first"));
        }

        let classification = match self.params.geometry {
            LayerGeometry::Rectangular => classify_rectangular(mesh, tol, &context)?,
        };
        let thickness = self
            .params
            .options
            .layer_thickness
            .unwrap_or_else(|| classification.mean_edge_length(mesh));
        let layer_ndf = match self.params.damping_model {
            DampingModel::Pml => Some(self.params.options.pml.ndf),
            DampingModel::Rayleigh => None,
        };
        let plan = extrude_shell(mesh, &classification, self.params.num_layers, thickness, layer_ndf, &context)?;
        if self.params.damping_model == DampingModel::Pml
            && plan.cells.iter().any(|c| c.cell_type != CellType::Hexahedron)
        {
            return Err(MeshAssemblyError::not_implemented(format!(
                "{context}: PML on non-quadrilateral exterior faces"
            )));
        }

        // Fragments whose exterior the layers wrap, earlier layers included.
        let owners: Vec<String> = classification
            .faces
            .iter()
            .map(|(face, _)| mesh.cell_source_name(face.cell))
            .filter(|&name| name != self.name)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut staged_lib = lib.clone();
        let mut tags = self.tags.clone();
        let mut warnings = classification.warnings.clone();
        let first_depth = mesh.absorbing_depth() + 1;
        let (center, half) = classification.center_and_half_extent();

        // Distinct property keys, in a deterministic order.
        let mut element_keys = BTreeSet::new();
        let mut region_keys = BTreeSet::new();
        for cell in &plan.cells {
            let src = cell.interior_cell;
            element_keys.insert((cell.layer, mesh.element_tags()[src], mesh.material_tags()[src]));
            region_keys.insert((cell.layer, mesh.regions()[src]));
        }

        for key @ (layer, src_element, src_material) in element_keys {
            let (element, material) = self.layer_element(&staged_lib, layer, src_element, src_material, thickness, center, half)?;
            let (et, mt) = match tags.elements.get(&key) {
                Some(&pair) => pair,
                None => {
                    let pair = (tags.fresh_element(&staged_lib), tags.fresh_material(&staged_lib));
                    tags.elements.insert(key, pair);
                    pair
                }
            };
            staged_lib.upsert_element(et, element);
            staged_lib.upsert_material(mt, material);
        }
        for key @ (layer, src_region) in region_keys {
            let record = self.layer_region(&staged_lib, layer, first_depth, src_region, &mut warnings);
            let rt = match tags.regions.get(&key) {
                Some(&r) => r,
                None => {
                    let r = tags.fresh_region(&staged_lib);
                    tags.regions.insert(key, r);
                    r
                }
            };
            staged_lib.upsert_region(rt, record);
        }

        let cores = self.layer_cores(mesh, &plan, &context)?;

        let mut staged = mesh.clone();
        let point_start = staged.num_points();
        for p in &plan.points {
            staged.add_point(p.xyz, p.ndf);
        }
        let source = staged.add_source(&self.name);
        let cell_start = staged.num_cells();
        for (cell, &core) in plan.cells.iter().zip(&cores) {
            let src = cell.interior_cell;
            let (et, mt) = tags.elements[&(cell.layer, mesh.element_tags()[src], mesh.material_tags()[src])];
            let rt = tags.regions[&(cell.layer, mesh.regions()[src])];
            staged.push_cell(CellSpec {
                cell_type: cell.cell_type,
                vertices: &cell.vertices,
                element_tag: et,
                material_tag: mt,
                region: rt,
                source,
                core: Some(core),
            })?;
        }
        staged.advance_absorbing_depth(self.params.num_layers);

        let mut constraints = ConstraintSet::new();
        for &(interior, layer_node) in &plan.interface_pairs {
            let dofs = DofMask::common(mesh.ndf(interior), staged.ndf(layer_node));
            constraints.try_insert_constraint(
                PointKey::quantize(mesh.point(interior), tol),
                EqualDofConstraint::new(interior, vec![layer_node], dofs),
            )?;
        }

        let mut distinct_cores = cores;
        distinct_cores.sort_unstable();
        distinct_cores.dedup();
        let report = AbsorbingLayerReport {
            first_depth,
            num_layers: self.params.num_layers,
            thickness,
            exterior_faces: classification.face_count(),
            points: point_start..staged.num_points(),
            cells: cell_start..staged.num_cells(),
            cores: distinct_cores,
            constraints: constraints.len(),
            warnings,
        };
        log::info!(
            "{context}: {} {} layer(s) of thickness {thickness}, {} cells, {} constraints",
            report.num_layers,
            self.params.damping_model,
            report.cells.len(),
            report.constraints
        );

        *mesh = staged;
        *lib = staged_lib;
        self.tags = tags;
        self.constraints = constraints;
        self.owners = owners;
        Ok(&*self.report.insert(report))
    }

    /// Element and material records for one (layer, source element, source material).
    #[allow(clippy::too_many_arguments)]
    fn layer_element(
        &self,
        lib: &PropertyLibrary,
        layer: usize,
        src_element: u32,
        src_material: u32,
        thickness: f64,
        center: [f64; 3],
        half: [f64; 3],
    ) -> Result<(ElementRecord, MaterialRecord)> {
        let context = self.context();
        let material = lib.material(src_material).ok_or_else(|| {
            MeshAssemblyError::validation(&context, format!("material {src_material} has no record"))
        })?;
        let renamed = MaterialRecord {
            name: format!("{} ({} L{})", material.name, self.name, layer + 1),
            kind: material.kind.clone(),
        };
        match self.params.damping_model {
            DampingModel::Rayleigh => {
                let element = lib.element(src_element).ok_or_else(|| {
                    MeshAssemblyError::validation(&context, format!("element {src_element} has no record"))
                })?;
                let element = ElementRecord {
                    name: format!("{} ({} L{})", element.name, self.name, layer + 1),
                    ..element.clone()
                };
                Ok((element, renamed))
            }
            DampingModel::Pml => {
                let MaterialKind::ElasticIsotropic {
                    youngs_modulus,
                    poisson_ratio,
                    density,
                } = material.kind
                else {
                    return Err(MeshAssemblyError::validation(
                        &context,
                        format!(
                            "material {src_material} (`{}`) is not linear elastic isotropic, which PML requires",
                            material.name
                        ),
                    ));
                };
                let cp = material.p_wave_speed().unwrap_or_default();
                let pml = &self.params.options.pml;
                let total = thickness * self.params.num_layers as f64;
                let m = pml.polynomial_order;
                let d0 = (m + 1.0) * cp * (1.0 / pml.reflection_coefficient).ln() / (2.0 * total);
                let mid = (layer as f64 + 0.5) * thickness;
                let params = PmlParameters {
                    thickness: total,
                    depth_start: layer as f64 * thickness,
                    depth_end: (layer + 1) as f64 * thickness,
                    reflection_coefficient: pml.reflection_coefficient,
                    polynomial_order: m,
                    d0,
                    absorption: d0 * (mid / total).powf(m),
                    alpha0: pml.alpha0,
                    beta0: pml.beta0,
                    domain_center: center,
                    domain_half_extent: half,
                    youngs_modulus,
                    poisson_ratio,
                    density,
                };
                let element = ElementRecord {
                    name: PML_ELEMENT.to_string(),
                    ndf: pml.ndf,
                    formulation: ElementFormulation::Pml(params),
                };
                Ok((element, renamed))
            }
        }
    }

    /// Region record for one (layer, source region).
    fn layer_region(
        &self,
        lib: &PropertyLibrary,
        layer: usize,
        first_depth: usize,
        src_region: u32,
        warnings: &mut Vec<String>,
    ) -> RegionRecord {
        let name = format!("{} layer {} (from region {src_region})", self.name, first_depth + layer);
        let damping = match self.params.damping_model {
            DampingModel::Pml => None,
            DampingModel::Rayleigh => {
                let ratio = if self.params.match_damping {
                    match lib.region_damping(src_region) {
                        Some(d) => d.ratio,
                        None => {
                            let msg = format!(
                                "{}: region {src_region} has no damping to match, using {}",
                                self.context(),
                                self.params.rayleigh_damping
                            );
                            log::warn!("{msg}");
                            if !warnings.contains(&msg) {
                                warnings.push(msg);
                            }
                            self.params.rayleigh_damping
                        }
                    }
                } else {
                    self.params.rayleigh_damping
                };
                Some(RayleighDamping::from_ratio(ratio, self.params.options.rayleigh_band))
            }
        };
        RegionRecord { name, damping }
    }

    /// `Core` id of every planned cell.
    fn layer_cores(&self, mesh: &Mesh, plan: &ShellExtrusion, context: &str) -> Result<Vec<usize>> {
        if self.params.num_partitions == 0 {
            return Ok(plan
                .cells
                .iter()
                .map(|c| mesh.core_of(c.interior_cell).unwrap_or(0))
                .collect());
        }
        let base = mesh.max_core().map_or(0, |m| m + 1);
        let centroids: Vec<[f64; 3]> = plan.cells.iter().map(|c| plan.centroid(mesh, c)).collect();
        let parts = partition_centroids(
            &centroids,
            self.params.num_partitions,
            self.params.partition_algorithm,
            context,
        )?;
        Ok(parts.into_iter().map(|p| p + base).collect())
    }
}

impl Interface for AbsorbingLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn owners(&self) -> &[String] {
        &self.owners
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::OWNS_MESH
            | Capabilities::OWNS_NODES
            | Capabilities::OWNS_CONSTRAINTS
            | Capabilities::REACTS_TO_REPARTITION
    }

    fn on_post_assemble(&mut self, ctx: &mut AssemblyContext<'_>) -> Result<()> {
        self.build(ctx.mesh, ctx.properties, ctx.tolerance).map(|_| ())
    }

    fn on_resolve_core_conflicts(&mut self, _mesh: &Mesh, core_map: &CoreMap) -> Result<()> {
        let spanning = self.constraints.place_on_cores(core_map)?;
        log::debug!("{}: {spanning} constraint(s) span cores", self.context());
        Ok(())
    }

    fn on_pre_export(&self, mesh: &Mesh, writer: &mut dyn ExportWriter) -> Result<()> {
        let Some(report) = &self.report else {
            return Ok(());
        };
        writer.write(ExportRecord::comment(format!(
            "{}: {} {} layer(s)",
            self.context(),
            report.num_layers,
            self.params.damping_model
        )))?;
        for p in report.points.clone() {
            writer.write(ExportRecord::node(mesh, p))?;
        }
        for c in report.cells.clone() {
            writer.write(ExportRecord::element(mesh, c))?;
        }
        for constraint in self.constraints.iter() {
            writer.write(ExportRecord::equal_dof(constraint))?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::meshgen::{BoxOptions, structured_box};
    use crate::data::fragment::MeshFragment;
    use crate::mesh_error::ErrorKind;

    fn assembled_cube() -> (Mesh, PropertyLibrary) {
        let data = structured_box([1, 1, 1], [0.0; 3], [1.0; 3], BoxOptions::default()).unwrap();
        let fragment = MeshFragment::try_new("cube", data).unwrap();
        let mut mesh = Mesh::with_cores();
        mesh.append(fragment.mesh(), Some(0)).unwrap();
        let mut lib = PropertyLibrary::new();
        lib.add_material(1, MaterialRecord::elastic_isotropic("soil", 2.0e8, 0.3, 2000.0))
            .unwrap();
        lib.add_element(1, ElementRecord::standard("brick", "stdBrick", 3)).unwrap();
        (mesh, lib)
    }

    fn params(model: &str, layers: usize, parts: usize) -> AbsorbingLayerParams {
        AbsorbingLayerParams::from_names(layers, parts, "kd-tree", "Rectangular", model, 0.05, false).unwrap()
    }

    #[test]
    fn rayleigh_layers_share_interface_nodes() {
        let (mut mesh, mut lib) = assembled_cube();
        let mut layer = AbsorbingLayer::new("abl", params("Rayleigh", 2, 0)).unwrap();
        let report = layer.build(&mut mesh, &mut lib, 1e-6).unwrap().clone();
        assert_eq!(report.cells.len(), 12);
        assert_eq!(mesh.num_cells(), 13);
        assert_eq!(report.constraints, 0);
        assert!(layer.constraints().is_empty());
        assert_eq!(mesh.absorbing_depth(), 2);
        assert_eq!(report.cores, vec![0]);
        // Two layers, one region each, both damped.
        let regions: BTreeSet<u32> = report.cells.clone().map(|c| mesh.regions()[c]).collect();
        assert_eq!(regions.len(), 2);
        for r in regions {
            assert_eq!(lib.region_damping(r).map(|d| d.ratio), Some(0.05));
        }
    }

    #[test]
    fn pml_layers_duplicate_and_constrain_interface() {
        let (mut mesh, mut lib) = assembled_cube();
        let mut layer = AbsorbingLayer::new("pml", params("PML", 1, 1)).unwrap();
        let report = layer.build(&mut mesh, &mut lib, 1e-6).unwrap().clone();
        assert_eq!(report.cells.len(), 6);
        assert_eq!(report.constraints, 8);
        for c in layer.constraints().iter() {
            assert_eq!(c.dofs.dofs().collect::<Vec<_>>(), vec![1, 2, 3]);
            assert_eq!(mesh.ndf(c.master), 3);
            assert_eq!(mesh.ndf(c.slaves[0]), 9);
            assert_eq!(mesh.point(c.master), mesh.point(c.slaves[0]));
        }
        // numPartitions = 1 puts the layer on a fresh core.
        assert_eq!(report.cores, vec![1]);
        let et = mesh.element_tags()[report.cells.start];
        match &lib.element(et).unwrap().formulation {
            ElementFormulation::Pml(p) => {
                assert!(p.d0 > 0.0);
                assert_eq!(p.domain_center, [0.5; 3]);
                assert_eq!(p.domain_half_extent, [0.5; 3]);
            }
            other => panic!("expected PML formulation, got {other:?}"),
        }
    }

    #[test]
    fn owners_are_the_wrapped_fragments() {
        let (mut mesh, mut lib) = assembled_cube();
        let mut inner = AbsorbingLayer::new("inner", params("Rayleigh", 1, 0)).unwrap();
        assert!(inner.owners().is_empty());
        inner.build(&mut mesh, &mut lib, 1e-6).unwrap();
        assert_eq!(inner.owners(), ["cube".to_string()]);

        // A second shell wraps only the first one's cells.
        let mut outer = AbsorbingLayer::new("outer", params("Rayleigh", 1, 0)).unwrap();
        outer.build(&mut mesh, &mut lib, 1e-6).unwrap();
        assert_eq!(outer.owners(), ["inner".to_string()]);
    }

    #[test]
    fn pml_requires_elastic_material() {
        let (mut mesh, _) = assembled_cube();
        let mut lib = PropertyLibrary::new();
        lib.add_material(
            1,
            MaterialRecord {
                name: "clay".into(),
                kind: MaterialKind::Other {
                    model: "PressureDependMultiYield".into(),
                },
            },
        )
        .unwrap();
        let before = mesh.clone();
        let mut layer = AbsorbingLayer::new("pml", params("PML", 1, 0)).unwrap();
        let err = layer.build(&mut mesh, &mut lib, 1e-6).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(mesh, before);
        assert!(layer.report().is_none());
    }

    #[test]
    fn rebuild_on_same_mesh_is_a_no_op() {
        let (mut mesh, mut lib) = assembled_cube();
        let mut layer = AbsorbingLayer::new("abl", params("Rayleigh", 1, 0)).unwrap();
        layer.build(&mut mesh, &mut lib, 1e-6).unwrap();
        let (cells, elements) = (mesh.num_cells(), lib.num_elements());
        layer.build(&mut mesh, &mut lib, 1e-6).unwrap();
        assert_eq!(mesh.num_cells(), cells);
        assert_eq!(lib.num_elements(), elements);
    }

    #[test]
    fn rebuild_on_fresh_mesh_reuses_tags() {
        let (mesh0, lib0) = assembled_cube();
        let mut layer = AbsorbingLayer::new("abl", params("Rayleigh", 2, 0)).unwrap();
        let (mut m1, mut l1) = (mesh0.clone(), lib0.clone());
        layer.build(&mut m1, &mut l1, 1e-6).unwrap();
        // Replay against the committed library, as a re-assembly does.
        let mut m2 = mesh0.clone();
        let mut l2 = l1.clone();
        layer.build(&mut m2, &mut l2, 1e-6).unwrap();
        assert_eq!(m1, m2);
        assert_eq!(l1, l2);
    }

    #[test]
    fn match_damping_falls_back_with_warning() {
        let (mut mesh, mut lib) = assembled_cube();
        let p = AbsorbingLayerParams::from_names(1, 0, "kd-tree", "Rectangular", "Rayleigh", 0.02, true).unwrap();
        let mut layer = AbsorbingLayer::new("abl", p).unwrap();
        let report = layer.build(&mut mesh, &mut lib, 1e-6).unwrap();
        assert_eq!(report.warnings.len(), 1);
        let region = mesh.regions()[report.cells.start];
        assert_eq!(lib.region_damping(region).map(|d| d.ratio), Some(0.02));
    }

    #[test]
    fn unassembled_mesh_is_rejected() {
        let data = structured_box([1, 1, 1], [0.0; 3], [1.0; 3], BoxOptions::default()).unwrap();
        let mut mesh = MeshFragment::try_new("cube", data).unwrap().mesh().clone();
        let mut lib = PropertyLibrary::new();
        let mut layer = AbsorbingLayer::new("abl", params("Rayleigh", 1, 0)).unwrap();
        let err = layer.build(&mut mesh, &mut lib, 1e-6).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
