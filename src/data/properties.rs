//! Element, material and region records referenced by mesh tag arrays.
//!
//! Full parameter validation belongs to the solver-facing model layer; the
//! records here carry just what assembly and boundary-layer generation need
//! (elastic constants for PML sizing, element DOF counts, region damping).

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::mesh_error::{MeshAssemblyError, Result};

/// Constitutive model of a material.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MaterialKind {
    /// Linear elastic isotropic solid.
    ElasticIsotropic {
        youngs_modulus: f64,
        poisson_ratio: f64,
        density: f64,
    },
    /// Any other model, identified by its solver name.
    Other { model: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub name: String,
    pub kind: MaterialKind,
}

impl MaterialRecord {
    pub fn elastic_isotropic(name: impl Into<String>, e: f64, nu: f64, rho: f64) -> Self {
        Self {
            name: name.into(),
            kind: MaterialKind::ElasticIsotropic {
                youngs_modulus: e,
                poisson_ratio: nu,
                density: rho,
            },
        }
    }

    /// Compressional wave speed `sqrt((lambda + 2 mu) / rho)`, for elastic isotropic materials.
    pub fn p_wave_speed(&self) -> Option<f64> {
        match self.kind {
            MaterialKind::ElasticIsotropic {
                youngs_modulus: e,
                poisson_ratio: nu,
                density: rho,
            } => {
                let lambda = e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu));
                let mu = e / (2.0 * (1.0 + nu));
                Some(((lambda + 2.0 * mu) / rho).sqrt())
            }
            MaterialKind::Other { .. } => None,
        }
    }
}

/// Depth-dependent parameters of one PML layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PmlParameters {
    /// Total thickness of the PML this layer belongs to.
    pub thickness: f64,
    pub depth_start: f64,
    pub depth_end: f64,
    pub reflection_coefficient: f64,
    pub polynomial_order: f64,
    /// Peak damping `d0 = (m + 1) c_p ln(1/R) / (2 T)`.
    pub d0: f64,
    /// `d0 (mid_depth / T)^m` evaluated at the layer mid-depth.
    pub absorption: f64,
    pub alpha0: f64,
    pub beta0: f64,
    /// Centre and half-extents of the interior domain the PML wraps.
    pub domain_center: [f64; 3],
    pub domain_half_extent: [f64; 3],
    pub youngs_modulus: f64,
    pub poisson_ratio: f64,
    pub density: f64,
}

/// Element formulation attached to an `ElementTag`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ElementFormulation {
    /// A formulation handled entirely by the solver (e.g. `stdBrick`).
    Standard { solver_name: String },
    /// Perfectly matched layer element.
    Pml(PmlParameters),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub name: String,
    pub ndf: u8,
    pub formulation: ElementFormulation,
}

impl ElementRecord {
    pub fn standard(name: impl Into<String>, solver_name: impl Into<String>, ndf: u8) -> Self {
        Self {
            name: name.into(),
            ndf,
            formulation: ElementFormulation::Standard {
                solver_name: solver_name.into(),
            },
        }
    }
}

/// Frequency-band Rayleigh damping: `C = alpha_m M + beta_k K`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RayleighDamping {
    pub ratio: f64,
    pub band: [f64; 2],
    pub alpha_m: f64,
    pub beta_k: f64,
}

impl RayleighDamping {
    /// Coefficients giving damping ratio `ratio` at both band frequencies (Hz).
    pub fn from_ratio(ratio: f64, band: [f64; 2]) -> Self {
        let (w1, w2) = (TAU * band[0], TAU * band[1]);
        Self {
            ratio,
            band,
            alpha_m: 2.0 * ratio * w1 * w2 / (w1 + w2),
            beta_k: 2.0 * ratio / (w1 + w2),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub name: String,
    pub damping: Option<RayleighDamping>,
}

/// Tag-indexed element, material and region records.
///
/// Region `0` is the implicit default region and carries no damping.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyLibrary {
    materials: BTreeMap<u32, MaterialRecord>,
    elements: BTreeMap<u32, ElementRecord>,
    regions: BTreeMap<u32, RegionRecord>,
}

fn next_tag<V>(map: &BTreeMap<u32, V>) -> u32 {
    map.keys().next_back().map_or(1, |&t| t + 1)
}

impl PropertyLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_material(&mut self, tag: u32, record: MaterialRecord) -> Result<()> {
        if tag == 0 || self.materials.contains_key(&tag) {
            return Err(MeshAssemblyError::validation(
                format!("material {tag}"),
                "tag is zero or already in use",
            ));
        }
        self.materials.insert(tag, record);
        Ok(())
    }

    pub fn add_element(&mut self, tag: u32, record: ElementRecord) -> Result<()> {
        if tag == 0 || self.elements.contains_key(&tag) {
            return Err(MeshAssemblyError::validation(
                format!("element {tag}"),
                "tag is zero or already in use",
            ));
        }
        if record.ndf == 0 {
            return Err(MeshAssemblyError::validation(format!("element {tag}"), "ndf must be positive"));
        }
        self.elements.insert(tag, record);
        Ok(())
    }

    pub fn add_region(&mut self, tag: u32, record: RegionRecord) -> Result<()> {
        if tag == 0 || self.regions.contains_key(&tag) {
            return Err(MeshAssemblyError::validation(
                format!("region {tag}"),
                "tag is zero or already in use",
            ));
        }
        self.regions.insert(tag, record);
        Ok(())
    }

    /// Inserts or replaces a material under a tag the caller owns.
    pub(crate) fn upsert_material(&mut self, tag: u32, record: MaterialRecord) {
        self.materials.insert(tag, record);
    }

    pub(crate) fn upsert_element(&mut self, tag: u32, record: ElementRecord) {
        self.elements.insert(tag, record);
    }

    pub(crate) fn upsert_region(&mut self, tag: u32, record: RegionRecord) {
        self.regions.insert(tag, record);
    }

    pub fn material(&self, tag: u32) -> Option<&MaterialRecord> {
        self.materials.get(&tag)
    }

    pub fn element(&self, tag: u32) -> Option<&ElementRecord> {
        self.elements.get(&tag)
    }

    pub fn region(&self, tag: u32) -> Option<&RegionRecord> {
        self.regions.get(&tag)
    }

    /// Damping carried by region `tag`, if any.
    pub fn region_damping(&self, tag: u32) -> Option<RayleighDamping> {
        self.regions.get(&tag).and_then(|r| r.damping)
    }

    pub fn next_material_tag(&self) -> u32 {
        next_tag(&self.materials)
    }

    pub fn next_element_tag(&self) -> u32 {
        next_tag(&self.elements)
    }

    pub fn next_region_tag(&self) -> u32 {
        next_tag(&self.regions)
    }

    pub fn num_materials(&self) -> usize {
        self.materials.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }
}
