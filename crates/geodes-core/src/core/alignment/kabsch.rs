use super::{AlignmentError, RigidTransform, StructuralAligner, Superposition};
use crate::core::geometry::{kabsch, rmsd};
use crate::core::models::structure::{ResidueKey, Structure};
use nalgebra::Point3;
use std::collections::HashMap;

const MIN_PAIRS: usize = 3;

/// CA coordinates of residues present in both structures, in reference order.
///
/// Residues are matched by chain, number and insertion code.
pub fn matched_ca_pairs(reference: &Structure, mobile: &Structure) -> Vec<(Point3<f64>, Point3<f64>)> {
    let mobile_cas: HashMap<ResidueKey, Point3<f64>> = ca_positions(mobile).collect();
    ca_positions(reference)
        .filter_map(|(key, r)| mobile_cas.get(&key).map(|m| (r, *m)))
        .collect()
}

fn ca_positions(structure: &Structure) -> impl Iterator<Item = (ResidueKey, Point3<f64>)> + '_ {
    structure
        .chains()
        .flat_map(move |(chain_id, _)| structure.chain_residues(chain_id))
        .filter_map(move |(residue_id, _)| {
            let key = structure.residue_key(residue_id)?;
            let ca = structure.residue_atom(residue_id, "CA")?;
            Some((key, ca.position))
        })
}

/// Built-in least-squares superposition on matched CA atoms.
///
/// The score is the fraction of reference CA atoms that found a partner.
#[derive(Debug, Clone, Copy, Default)]
pub struct KabschAligner;

impl StructuralAligner for KabschAligner {
    fn name(&self) -> &str {
        "kabsch"
    }

    fn align(&self, reference: &Structure, mobile: &Structure) -> Result<Superposition, AlignmentError> {
        let pairs = matched_ca_pairs(reference, mobile);
        if pairs.len() < MIN_PAIRS {
            return Err(AlignmentError::InsufficientCorrespondence {
                found: pairs.len(),
                required: MIN_PAIRS,
            });
        }
        let (ref_points, mob_points): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        let (rotation, translation) = kabsch(&ref_points, &mob_points)?;
        let transform = RigidTransform::new(rotation, translation);
        transform.validate()?;

        let moved: Vec<_> = mob_points.iter().map(|p| transform.apply_point(p)).collect();
        let reference_count = ca_positions(reference).count().max(1);

        Ok(Superposition {
            transform,
            score: ref_points.len() as f64 / reference_count as f64,
            rmsd: rmsd(&ref_points, &moved),
            aligned_pairs: ref_points.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::{Rotation3, Unit, Vector3};

    fn ca_trace(id: &str, points: &[Point3<f64>]) -> Structure {
        let mut s = Structure::new(id);
        let chain = s.add_chain('A');
        for (i, p) in points.iter().enumerate() {
            let rid = s.add_residue(chain, i as isize + 1, None, "ALA").unwrap();
            s.add_atom_to_residue(rid, Atom::new("CA", rid, *p));
        }
        s
    }

    fn bent_trace() -> Vec<Point3<f64>> {
        (0..8)
            .map(|i| {
                let t = i as f64;
                Point3::new(2.3 * (t * 1.745).cos(), 2.3 * (t * 1.745).sin(), 1.5 * t)
            })
            .collect()
    }

    #[test]
    fn recovers_rigid_motion_with_zero_rmsd() {
        let points = bent_trace();
        let reference = ca_trace("ref", &points);
        let rot = Rotation3::from_axis_angle(&Unit::new_normalize(Vector3::new(1.0, -1.0, 0.5)), 0.9);
        let moved: Vec<_> = points.iter().map(|p| rot * p + Vector3::new(5.0, 5.0, -3.0)).collect();
        let mobile = ca_trace("mob", &moved);

        let sup = KabschAligner.align(&reference, &mobile).unwrap();
        assert_eq!(sup.aligned_pairs, 8);
        assert!(sup.rmsd.unwrap() < 1e-8);
        assert!((sup.score - 1.0).abs() < 1e-12);

        let realigned = sup.transform.apply_to(&mobile);
        let a = realigned.atoms_in_order().next().unwrap().1.position;
        assert!((a - points[0]).norm() < 1e-8);
    }

    #[test]
    fn too_few_matching_residues_is_an_error() {
        let points = bent_trace();
        let reference = ca_trace("ref", &points[..2]);
        let mobile = ca_trace("mob", &points);
        assert!(matches!(
            KabschAligner.align(&reference, &mobile),
            Err(AlignmentError::InsufficientCorrespondence { found: 2, required: 3 })
        ));
    }
}
