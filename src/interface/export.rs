//! Append-only export sink shared by the exporter and interfaces.

use serde::Serialize;

use crate::data::constraints::EqualDofConstraint;
use crate::data::mesh::Mesh;
use crate::mesh_error::Result;
use crate::topology::cell_type::CellType;

/// One entry of the export stream.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportRecord {
    Comment {
        text: String,
    },
    Node {
        id: usize,
        xyz: [f64; 3],
        ndf: u8,
    },
    Element {
        id: usize,
        cell_type: CellType,
        element_tag: u32,
        material_tag: u32,
        region: u32,
        core: Option<usize>,
        nodes: Vec<usize>,
    },
    EqualDof {
        master: usize,
        slaves: Vec<usize>,
        dofs: Vec<u8>,
        /// Owning core, once placed.
        owner: Option<usize>,
        /// Cores holding a ghost copy.
        ghosts: Vec<usize>,
    },
}

impl ExportRecord {
    pub fn comment(text: impl Into<String>) -> Self {
        ExportRecord::Comment { text: text.into() }
    }

    pub fn node(mesh: &Mesh, p: usize) -> Self {
        ExportRecord::Node {
            id: p,
            xyz: mesh.point(p),
            ndf: mesh.ndf(p),
        }
    }

    pub fn element(mesh: &Mesh, c: usize) -> Self {
        ExportRecord::Element {
            id: c,
            cell_type: mesh.cell_type(c),
            element_tag: mesh.element_tags()[c],
            material_tag: mesh.material_tags()[c],
            region: mesh.regions()[c],
            core: mesh.core_of(c),
            nodes: mesh.cell(c).to_vec(),
        }
    }

    pub fn equal_dof(constraint: &EqualDofConstraint) -> Self {
        let (owner, ghosts) = match &constraint.placement {
            Some(p) => (Some(p.owner), p.ghosts.clone()),
            None => (None, Vec::new()),
        };
        ExportRecord::EqualDof {
            master: constraint.master,
            slaves: constraint.slaves.clone(),
            dofs: constraint.dofs.dofs().collect(),
            owner,
            ghosts,
        }
    }
}

/// Destination for export records, owned by the external exporter.
pub trait ExportWriter {
    fn write(&mut self, record: ExportRecord) -> Result<()>;
}

/// In-memory writer collecting records in order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RecordWriter {
    records: Vec<ExportRecord>,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ExportRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ExportRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ExportWriter for RecordWriter {
    fn write(&mut self, record: ExportRecord) -> Result<()> {
        self.records.push(record);
        Ok(())
    }
}
