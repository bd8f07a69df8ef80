//! Rigid-body superposition of one structure onto another.

pub mod external;
pub mod kabsch;

use crate::core::geometry::GeometryError;
use crate::core::models::structure::Structure;
use crate::core::process::ExternalToolError;
use nalgebra::{Matrix3, Point3, Vector3};
use thiserror::Error;

pub use external::ExternalAligner;
pub use kabsch::KabschAligner;

const ORTHONORMAL_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error(transparent)]
    Tool(#[from] ExternalToolError),
    #[error("Superposition failed: {0}")]
    Geometry(#[from] GeometryError),
    #[error("Only {found} residue(s) correspond between the structures; need at least {required}")]
    InsufficientCorrespondence { found: usize, required: usize },
    #[error("Aligner returned an invalid transform: {reason}")]
    InvalidTransform { reason: String },
}

/// Rotation followed by translation: `x' = R·x + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity(), Vector3::zeros())
    }

    /// Checks that the rotation is a proper orthonormal matrix.
    pub fn validate(&self) -> Result<(), AlignmentError> {
        let invalid = |reason: &str| AlignmentError::InvalidTransform {
            reason: reason.to_string(),
        };
        if self.rotation.iter().chain(self.translation.iter()).any(|v| !v.is_finite()) {
            return Err(invalid("non-finite component"));
        }
        let gram = self.rotation.transpose() * self.rotation;
        if (gram - Matrix3::identity()).amax() > ORTHONORMAL_TOLERANCE {
            return Err(invalid("rotation is not orthonormal"));
        }
        if (self.rotation.determinant() - 1.0).abs() > ORTHONORMAL_TOLERANCE {
            return Err(invalid("rotation is a reflection (det != +1)"));
        }
        Ok(())
    }

    pub fn apply_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * point.coords + self.translation)
    }

    pub fn apply_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * vector
    }

    /// Returns a transformed copy; the input structure is untouched.
    pub fn apply_to(&self, structure: &Structure) -> Structure {
        structure.map_positions(|p| self.apply_point(p))
    }
}

/// Result of superposing a mobile structure onto a reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Superposition {
    /// Maps mobile coordinates into the reference frame.
    pub transform: RigidTransform,
    /// Aligner-specific quality score (higher is better).
    pub score: f64,
    /// CA RMSD after superposition, when residue correspondence is available.
    pub rmsd: Option<f64>,
    pub aligned_pairs: usize,
}

pub trait StructuralAligner: Send + Sync {
    fn name(&self) -> &str;

    fn align(&self, reference: &Structure, mobile: &Structure) -> Result<Superposition, AlignmentError>;
}
