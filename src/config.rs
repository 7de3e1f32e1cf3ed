//! Configuration records.
//!
//! All records deserialize with `serde` and fill omitted fields from their
//! `Default`. Name-valued fields (`"kd-tree"`, `"Rectangular"`, `"PML"`,
//! `"Rayleigh"`) go through `FromStr`, so a bad name surfaces as the same
//! error kind whether it arrives from code or from a config file.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::mesh_error::{MeshAssemblyError, Result};
use crate::partitioning::PartitionAlgorithm;

/// Assembler-wide settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Maximum distance for two points to be treated as identical.
    pub merge_tolerance: f64,
    /// Algorithm used when a section is created without naming one.
    pub default_partition_algorithm: PartitionAlgorithm,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            merge_tolerance: 1e-5,
            default_partition_algorithm: PartitionAlgorithm::KdTree,
        }
    }
}

/// Shape of the absorbing-layer envelope.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LayerGeometry {
    /// Axis-aligned box: 6 faces, 12 edges, 8 corners.
    Rectangular,
}

impl FromStr for LayerGeometry {
    type Err = MeshAssemblyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Rectangular" | "rectangular" => Ok(LayerGeometry::Rectangular),
            other => Err(MeshAssemblyError::not_implemented(format!(
                "absorbing layer geometry `{other}`"
            ))),
        }
    }
}

impl fmt::Display for LayerGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Rectangular")
    }
}

impl TryFrom<String> for LayerGeometry {
    type Error = MeshAssemblyError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<LayerGeometry> for String {
    fn from(g: LayerGeometry) -> Self {
        g.to_string()
    }
}

/// How the absorbing layer dissipates outgoing waves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DampingModel {
    /// Perfectly matched layer elements with extra DOFs.
    Pml,
    /// Interior element formulation with Rayleigh damping.
    Rayleigh,
}

impl FromStr for DampingModel {
    type Err = MeshAssemblyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pml" => Ok(DampingModel::Pml),
            "rayleigh" => Ok(DampingModel::Rayleigh),
            _ => Err(MeshAssemblyError::validation(
                "damping model",
                format!("unknown damping model `{s}` (supported: PML, Rayleigh)"),
            )),
        }
    }
}

impl fmt::Display for DampingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DampingModel::Pml => "PML",
            DampingModel::Rayleigh => "Rayleigh",
        })
    }
}

impl TryFrom<String> for DampingModel {
    type Error = MeshAssemblyError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DampingModel> for String {
    fn from(d: DampingModel) -> Self {
        d.to_string()
    }
}

/// PML sizing knobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PmlOptions {
    /// Target reflection coefficient `R` at normal incidence.
    pub reflection_coefficient: f64,
    /// Exponent `m` of the damping profile.
    pub polynomial_order: f64,
    /// DOFs per PML node (3 displacements + 6 stress-like auxiliaries).
    pub ndf: u8,
    pub alpha0: f64,
    pub beta0: f64,
}

impl Default for PmlOptions {
    fn default() -> Self {
        Self {
            reflection_coefficient: 1e-8,
            polynomial_order: 2.0,
            ndf: 9,
            alpha0: 0.0,
            beta0: 0.0,
        }
    }
}

/// Secondary absorbing-layer settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbsorbingLayerOptions {
    /// Thickness of each layer; defaults to the mean exterior edge length.
    pub layer_thickness: Option<f64>,
    pub pml: PmlOptions,
    /// Frequencies (Hz) at which Rayleigh layers hit their damping ratio.
    pub rayleigh_band: [f64; 2],
}

impl Default for AbsorbingLayerOptions {
    fn default() -> Self {
        Self {
            layer_thickness: None,
            pml: PmlOptions::default(),
            rayleigh_band: [2.0, 20.0],
        }
    }
}

/// Parameters of one `add_absorbing_layer` request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbsorbingLayerParams {
    pub num_layers: usize,
    pub num_partitions: usize,
    pub partition_algorithm: PartitionAlgorithm,
    pub geometry: LayerGeometry,
    pub damping_model: DampingModel,
    pub rayleigh_damping: f64,
    pub match_damping: bool,
    #[serde(default)]
    pub options: AbsorbingLayerOptions,
}

impl AbsorbingLayerParams {
    /// Builds parameters from the solver-facing names.
    #[allow(clippy::too_many_arguments)]
    pub fn from_names(
        num_layers: usize,
        num_partitions: usize,
        partition_algorithm: &str,
        geometry: &str,
        damping_model: &str,
        rayleigh_damping: f64,
        match_damping: bool,
    ) -> Result<Self> {
        let params = Self {
            num_layers,
            num_partitions,
            partition_algorithm: partition_algorithm.parse()?,
            geometry: geometry.parse()?,
            damping_model: damping_model.parse()?,
            rayleigh_damping,
            match_damping,
            options: AbsorbingLayerOptions::default(),
        };
        params.validate()?;
        Ok(params)
    }

    /// Checks ranges that the type system does not.
    pub fn validate(&self) -> Result<()> {
        let ctx = "absorbing layer";
        if self.num_layers == 0 {
            return Err(MeshAssemblyError::validation(ctx, "numLayers must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.rayleigh_damping) {
            return Err(MeshAssemblyError::validation(
                ctx,
                format!("rayleighDamping {} outside [0, 1]", self.rayleigh_damping),
            ));
        }
        if let Some(h) = self.options.layer_thickness {
            if !(h.is_finite() && h > 0.0) {
                return Err(MeshAssemblyError::validation(
                    ctx,
                    format!("layer thickness must be positive, got {h}"),
                ));
            }
        }
        let pml = &self.options.pml;
        if !(pml.reflection_coefficient > 0.0 && pml.reflection_coefficient < 1.0) {
            return Err(MeshAssemblyError::validation(
                ctx,
                format!("PML reflection coefficient {} outside (0, 1)", pml.reflection_coefficient),
            ));
        }
        if pml.polynomial_order < 0.0 || pml.ndf < 3 {
            return Err(MeshAssemblyError::validation(
                ctx,
                "PML needs a non-negative polynomial order and at least 3 DOFs per node",
            ));
        }
        let [f1, f2] = self.options.rayleigh_band;
        if !(f1 > 0.0 && f2 > f1) {
            return Err(MeshAssemblyError::validation(
                ctx,
                format!("Rayleigh band [{f1}, {f2}] must satisfy 0 < f1 < f2"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_error::ErrorKind;

    #[test]
    fn unknown_geometry_is_not_implemented() {
        let err = AbsorbingLayerParams::from_names(2, 0, "kd-tree", "Spherical", "PML", 0.05, false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }

    #[test]
    fn unknown_names_are_validation_errors() {
        for (algo, model) in [("metis", "PML"), ("kd-tree", "Lysmer")] {
            let err = AbsorbingLayerParams::from_names(1, 0, algo, "Rectangular", model, 0.0, false)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let cfg: AssemblerConfig = serde_json::from_str(r#"{"merge_tolerance": 0.001}"#).unwrap();
        assert_eq!(cfg.merge_tolerance, 0.001);
        assert_eq!(cfg.default_partition_algorithm, PartitionAlgorithm::KdTree);

        let params: AbsorbingLayerParams = serde_json::from_str(
            r#"{"num_layers": 2, "num_partitions": 0, "partition_algorithm": "kd-tree",
                "geometry": "Rectangular", "damping_model": "PML",
                "rayleigh_damping": 0.05, "match_damping": false,
                "options": {"pml": {"ndf": 9}}}"#,
        )
        .unwrap();
        assert_eq!(params.damping_model, DampingModel::Pml);
        assert_eq!(params.options.pml.reflection_coefficient, 1e-8);
        assert_eq!(params.options.rayleigh_band, [2.0, 20.0]);
    }

    #[test]
    fn unknown_geometry_fails_deserialization() {
        let res: std::result::Result<LayerGeometry, _> = serde_json::from_str(r#""Spherical""#);
        assert!(res.is_err());
    }

    #[test]
    fn ranges_are_checked() {
        assert!(AbsorbingLayerParams::from_names(0, 0, "kd-tree", "Rectangular", "PML", 0.0, false).is_err());
        assert!(AbsorbingLayerParams::from_names(1, 0, "kd-tree", "Rectangular", "Rayleigh", 1.5, false).is_err());
        assert!(AbsorbingLayerParams::from_names(1, 0, "kd-tree", "Rectangular", "Rayleigh", 1.0, true).is_ok());
    }
}
