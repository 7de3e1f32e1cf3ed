//! Flat unstructured mesh storage.
//!
//! A [`Mesh`] keeps points and cells in parallel arrays, the layout external
//! solvers and exporters expect:
//! - per point: coordinates and `ndf` (degrees of freedom),
//! - per cell: CSR connectivity, [`CellType`], `ElementTag`, `MaterialTag`,
//!   `Region`, an optional `Core` (partition id) and the index of the source
//!   (fragment or interface name) the cell came from.
//!
//! Fragments, section-local meshes and the global assembly all use this type.

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::{MeshAssemblyError, Result};
use crate::topology::cell_type::CellType;

/// Everything needed to append one cell.
#[derive(Clone, Debug)]
pub struct CellSpec<'a> {
    pub cell_type: CellType,
    pub vertices: &'a [usize],
    pub element_tag: u32,
    pub material_tag: u32,
    pub region: u32,
    pub source: usize,
    pub core: Option<usize>,
}

/// Unstructured mesh with per-cell tag arrays.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    points: Vec<[f64; 3]>,
    ndf: Vec<u8>,
    offsets: Vec<usize>,
    connectivity: Vec<usize>,
    cell_types: Vec<CellType>,
    element_tag: Vec<u32>,
    material_tag: Vec<u32>,
    region: Vec<u32>,
    core: Option<Vec<usize>>,
    cell_source: Vec<usize>,
    sources: Vec<String>,
    absorbing_depth: usize,
}

impl Default for Mesh {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            ndf: Vec::new(),
            offsets: vec![0],
            connectivity: Vec::new(),
            cell_types: Vec::new(),
            element_tag: Vec::new(),
            material_tag: Vec::new(),
            region: Vec::new(),
            core: None,
            cell_source: Vec::new(),
            sources: Vec::new(),
            absorbing_depth: 0,
        }
    }
}

impl Mesh {
    /// Creates an empty mesh without a `Core` array.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty mesh whose cells all carry a `Core` id.
    pub fn with_cores() -> Self {
        Self {
            core: Some(Vec::new()),
            ..Self::default()
        }
    }

    #[inline]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cell_types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cell_types.is_empty() && self.points.is_empty()
    }

    #[inline]
    pub fn point(&self, p: usize) -> [f64; 3] {
        self.points[p]
    }

    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    #[inline]
    pub fn ndf(&self, p: usize) -> u8 {
        self.ndf[p]
    }

    pub fn ndf_slice(&self) -> &[u8] {
        &self.ndf
    }

    /// Connectivity of cell `c`.
    #[inline]
    pub fn cell(&self, c: usize) -> &[usize] {
        &self.connectivity[self.offsets[c]..self.offsets[c + 1]]
    }

    /// Iterate `(cell index, type, connectivity)` in cell order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, CellType, &[usize])> + '_ {
        (0..self.num_cells()).map(move |c| (c, self.cell_types[c], self.cell(c)))
    }

    #[inline]
    pub fn cell_type(&self, c: usize) -> CellType {
        self.cell_types[c]
    }

    pub fn element_tags(&self) -> &[u32] {
        &self.element_tag
    }

    pub fn material_tags(&self) -> &[u32] {
        &self.material_tag
    }

    pub fn regions(&self) -> &[u32] {
        &self.region
    }

    /// The `Core` array, when this mesh has been partitioned.
    pub fn core(&self) -> Option<&[usize]> {
        self.core.as_deref()
    }

    #[inline]
    pub fn core_of(&self, c: usize) -> Option<usize> {
        self.core.as_ref().map(|core| core[c])
    }

    /// Largest `Core` id in use.
    pub fn max_core(&self) -> Option<usize> {
        self.core.as_ref().and_then(|core| core.iter().copied().max())
    }

    /// Names of the fragments/interfaces cells originate from.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Source index of cell `c`.
    #[inline]
    pub fn cell_source(&self, c: usize) -> usize {
        self.cell_source[c]
    }

    /// Source name of cell `c`.
    pub fn cell_source_name(&self, c: usize) -> &str {
        &self.sources[self.cell_source[c]]
    }

    /// Looks up a source index by name.
    pub fn source_index(&self, name: &str) -> Option<usize> {
        self.sources.iter().position(|s| s == name)
    }

    /// Number of absorbing layers extruded around this mesh so far.
    pub fn absorbing_depth(&self) -> usize {
        self.absorbing_depth
    }

    pub(crate) fn advance_absorbing_depth(&mut self, layers: usize) {
        self.absorbing_depth += layers;
    }

    /// Appends a point and returns its index.
    pub fn add_point(&mut self, xyz: [f64; 3], ndf: u8) -> usize {
        self.points.push(xyz);
        self.ndf.push(ndf);
        self.points.len() - 1
    }

    /// Registers a source name, reusing an existing entry with the same name.
    pub fn add_source(&mut self, name: &str) -> usize {
        match self.source_index(name) {
            Some(idx) => idx,
            None => {
                self.sources.push(name.to_string());
                self.sources.len() - 1
            }
        }
    }

    /// Appends a cell and returns its index.
    ///
    /// A `Core` id must be supplied exactly when this mesh carries a `Core` array.
    pub fn push_cell(&mut self, cell: CellSpec<'_>) -> Result<usize> {
        let idx = self.num_cells();
        if cell.vertices.len() != cell.cell_type.vertex_count() {
            return Err(MeshAssemblyError::topology(
                format!("cell {idx}"),
                format!(
                    "{:?} expects {} vertices, got {}",
                    cell.cell_type,
                    cell.cell_type.vertex_count(),
                    cell.vertices.len()
                ),
            ));
        }
        if let Some(&bad) = cell.vertices.iter().find(|&&v| v >= self.points.len()) {
            return Err(MeshAssemblyError::topology(
                format!("cell {idx}"),
                format!("references point {bad}, mesh has {} points", self.points.len()),
            ));
        }
        if cell.source >= self.sources.len() {
            return Err(MeshAssemblyError::validation(
                format!("cell {idx}"),
                format!("unknown source index {}", cell.source),
            ));
        }
        match (&mut self.core, cell.core) {
            (Some(core), Some(c)) => core.push(c),
            (None, None) => {}
            (Some(_), None) => {
                return Err(MeshAssemblyError::validation(
                    format!("cell {idx}"),
                    "mesh is partitioned but no Core id was given",
                ));
            }
            (None, Some(_)) => {
                return Err(MeshAssemblyError::validation(
                    format!("cell {idx}"),
                    "Core id given for an unpartitioned mesh",
                ));
            }
        }
        self.connectivity.extend_from_slice(cell.vertices);
        self.offsets.push(self.connectivity.len());
        self.cell_types.push(cell.cell_type);
        self.element_tag.push(cell.element_tag);
        self.material_tag.push(cell.material_tag);
        self.region.push(cell.region);
        self.cell_source.push(cell.source);
        Ok(idx)
    }

    /// Installs a `Core` array, replacing any previous one.
    pub fn set_core(&mut self, core: Vec<usize>) -> Result<()> {
        if core.len() != self.num_cells() {
            return Err(MeshAssemblyError::validation(
                "Core array",
                format!("{} entries for {} cells", core.len(), self.num_cells()),
            ));
        }
        self.core = Some(core);
        Ok(())
    }

    /// Drops the `Core` array.
    pub fn clear_core(&mut self) {
        self.core = None;
    }

    /// Appends every point and cell of `other`, shifting its point indices.
    ///
    /// `core_offset` is added to `other`'s `Core` ids; cells of an
    /// unpartitioned `other` land in `core_offset` itself. When `self` has no
    /// `Core` array, `core_offset` must be `None`.
    pub fn append(&mut self, other: &Mesh, core_offset: Option<usize>) -> Result<()> {
        let base = self.points.len();
        self.points.extend_from_slice(&other.points);
        self.ndf.extend_from_slice(&other.ndf);

        let source_map: Vec<usize> = other.sources.iter().map(|s| self.add_source(s)).collect();
        let mut vertices = Vec::new();
        for (c, cell_type, cell) in other.cells() {
            vertices.clear();
            vertices.extend(cell.iter().map(|&v| v + base));
            let core = core_offset.map(|offset| offset + other.core_of(c).unwrap_or(0));
            self.push_cell(CellSpec {
                cell_type,
                vertices: &vertices,
                element_tag: other.element_tag[c],
                material_tag: other.material_tag[c],
                region: other.region[c],
                source: source_map[other.cell_source[c]],
                core,
            })?;
        }
        self.absorbing_depth = self.absorbing_depth.max(other.absorbing_depth);
        Ok(())
    }

    /// Rebuilds the point arrays from a merge map.
    ///
    /// `map[p]` is the new index of old point `p`; `kept` lists, in new-index
    /// order, the old point whose coordinates and `ndf` survive.
    pub(crate) fn remap_points(&mut self, map: &[usize], kept: &[usize]) {
        self.points = kept.iter().map(|&p| self.points[p]).collect();
        self.ndf = kept.iter().map(|&p| self.ndf[p]).collect();
        for v in &mut self.connectivity {
            *v = map[*v];
        }
    }

    /// Arithmetic mean of the vertices of cell `c`.
    pub fn centroid(&self, c: usize) -> [f64; 3] {
        let cell = self.cell(c);
        let mut acc = [0.0; 3];
        for &v in cell {
            for k in 0..3 {
                acc[k] += self.points[v][k];
            }
        }
        let n = cell.len().max(1) as f64;
        acc.map(|x| x / n)
    }

    /// Axis-aligned bounding box of all points.
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(mut lo, mut hi), p| {
            for k in 0..3 {
                lo[k] = lo[k].min(p[k]);
                hi[k] = hi[k].max(p[k]);
            }
            (lo, hi)
        }))
    }
}

impl DebugInvariants for Mesh {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Mesh");
    }

    fn validate_invariants(&self) -> Result<()> {
        let n = self.num_cells();
        if self.ndf.len() != self.points.len() {
            return Err(MeshAssemblyError::validation(
                "mesh",
                format!("ndf has {} entries for {} points", self.ndf.len(), self.points.len()),
            ));
        }
        let lens = [
            ("ElementTag", self.element_tag.len()),
            ("MaterialTag", self.material_tag.len()),
            ("Region", self.region.len()),
            ("source", self.cell_source.len()),
            ("Core", self.core.as_ref().map_or(n, Vec::len)),
        ];
        for (name, len) in lens {
            if len != n {
                return Err(MeshAssemblyError::validation(
                    "mesh",
                    format!("{name} has {len} entries for {n} cells"),
                ));
            }
        }
        if self.offsets.len() != n + 1 || self.offsets.last() != Some(&self.connectivity.len()) {
            return Err(MeshAssemblyError::topology("mesh", "connectivity offsets are inconsistent"));
        }
        if let Some(&bad) = self.connectivity.iter().find(|&&v| v >= self.points.len()) {
            return Err(MeshAssemblyError::topology(
                "mesh",
                format!("dangling reference to point {bad}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_hex(mesh: &mut Mesh, origin: [f64; 3], core: Option<usize>) -> usize {
        let base = mesh.num_points();
        for dz in [0.0, 1.0] {
            for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                mesh.add_point([origin[0] + dx, origin[1] + dy, origin[2] + dz], 3);
            }
        }
        let vertices: Vec<usize> = (base..base + 8).collect();
        let source = mesh.add_source("block");
        mesh.push_cell(CellSpec {
            cell_type: CellType::Hexahedron,
            vertices: &vertices,
            element_tag: 1,
            material_tag: 1,
            region: 0,
            source,
            core,
        })
        .unwrap()
    }

    #[test]
    fn push_cell_rejects_dangling_vertices() {
        let mut mesh = Mesh::new();
        mesh.add_point([0.0; 3], 3);
        let source = mesh.add_source("f");
        let err = mesh
            .push_cell(CellSpec {
                cell_type: CellType::Triangle,
                vertices: &[0, 1, 2],
                element_tag: 1,
                material_tag: 1,
                region: 0,
                source,
                core: None,
            })
            .unwrap_err();
        assert_eq!(err.kind(), crate::mesh_error::ErrorKind::Topology);
    }

    #[test]
    fn push_cell_requires_core_on_partitioned_mesh() {
        let mut mesh = Mesh::with_cores();
        for _ in 0..3 {
            mesh.add_point([0.0; 3], 3);
        }
        let source = mesh.add_source("f");
        let spec = CellSpec {
            cell_type: CellType::Triangle,
            vertices: &[0, 1, 2],
            element_tag: 1,
            material_tag: 1,
            region: 0,
            source,
            core: None,
        };
        assert!(mesh.push_cell(spec.clone()).is_err());
        assert!(mesh.push_cell(CellSpec { core: Some(3), ..spec }).is_ok());
        assert_eq!(mesh.max_core(), Some(3));
    }

    #[test]
    fn append_offsets_points_and_cores() {
        let mut a = Mesh::new();
        unit_hex(&mut a, [0.0; 3], None);
        let mut b = Mesh::with_cores();
        unit_hex(&mut b, [1.0, 0.0, 0.0], Some(1));

        let mut global = Mesh::with_cores();
        global.append(&a, Some(0)).unwrap();
        global.append(&b, Some(4)).unwrap();

        assert_eq!(global.num_points(), 16);
        assert_eq!(global.num_cells(), 2);
        assert_eq!(global.cell(1)[0], 8);
        assert_eq!(global.core(), Some(&[0, 5][..]));
        assert_eq!(global.sources(), &["block".to_string()]);
        global.validate_invariants().unwrap();
    }

    #[test]
    fn centroid_and_bounds() {
        let mut mesh = Mesh::new();
        let c = unit_hex(&mut mesh, [2.0, 0.0, 0.0], None);
        assert_eq!(mesh.centroid(c), [2.5, 0.5, 0.5]);
        assert_eq!(mesh.bounds(), Some(([2.0, 0.0, 0.0], [3.0, 1.0, 1.0])));
    }
}
