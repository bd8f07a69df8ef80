use super::config::{ChainScope, ClampConfig};
use crate::core::geometry::centroid;
use crate::core::models::ids::ResidueId;
use crate::core::models::residue::ChargeClass;
use crate::core::models::structure::{ResidueKey, Structure};
use itertools::Itertools;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point3;
use std::cmp::Ordering;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Representative atoms tried, in order, when no charged side-chain atom is present.
const FALLBACK_ATOMS: [&str; 2] = ["CB", "CA"];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClampResidue {
    pub key: ResidueKey,
    pub name: String,
    pub charge: ChargeClass,
}

/// An oppositely charged residue pair within the distance threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeClampCandidate {
    /// The residue with the smaller key.
    pub first: ClampResidue,
    pub second: ClampResidue,
    /// Distance between the representative points (Å).
    pub distance: f64,
    /// Closest approach of any two charged atoms of the pair (Å).
    pub min_atom_distance: f64,
    /// `1 - distance / threshold`, in `[0, 1]`.
    pub score: f64,
}

impl ChargeClampCandidate {
    /// Charge signs of the pair, e.g. `+/-`.
    pub fn sign_pair(&self) -> String {
        format!("{}/{}", self.first.charge.sign(), self.second.charge.sign())
    }

    fn ordering(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.first.key.cmp(&other.first.key))
            .then_with(|| self.second.key.cmp(&other.second.key))
    }
}

#[derive(Debug, Clone)]
struct ChargedSite {
    residue: ClampResidue,
    point: Point3<f64>,
    atoms: Vec<Point3<f64>>,
}

fn charged_site(structure: &Structure, residue_id: ResidueId) -> Option<ChargedSite> {
    let residue = structure.residue(residue_id)?;
    let charge = residue.charge_class();
    if charge == ChargeClass::Neutral {
        return None;
    }
    let residue_type = residue.residue_type?;

    let atoms: Vec<Point3<f64>> = residue_type
        .charged_atom_names()
        .iter()
        .filter_map(|name| structure.residue_atom(residue_id, name))
        .map(|atom| atom.position)
        .collect();
    let point = match centroid(&atoms) {
        Some(point) => point,
        None => FALLBACK_ATOMS
            .iter()
            .find_map(|name| structure.residue_atom(residue_id, name))
            .map(|atom| atom.position)?,
    };

    Some(ChargedSite {
        residue: ClampResidue {
            key: structure.residue_key(residue_id)?,
            name: residue.name.clone(),
            charge,
        },
        atoms: if atoms.is_empty() { vec![point] } else { atoms },
        point,
    })
}

fn min_pair_distance(a: &[Point3<f64>], b: &[Point3<f64>]) -> f64 {
    a.iter()
        .cartesian_product(b.iter())
        .map(|(p, q)| (p - q).norm())
        .fold(f64::INFINITY, f64::min)
}

/// Enumerates opposite-charge residue pairs whose representative points lie
/// within `config.distance_threshold` (inclusive).
///
/// Each unordered pair appears once; results are sorted by distance, then by
/// residue keys.
#[instrument(skip_all, name = "charge_clamp_detection", fields(structure = %structure.id()))]
pub fn detect_clamps(structure: &Structure, config: &ClampConfig, scope: &ChainScope) -> Vec<ChargeClampCandidate> {
    let threshold = config.distance_threshold;
    let sites: Vec<ChargedSite> = structure
        .chains()
        .filter(|(_, chain)| scope.contains(chain.id))
        .flat_map(|(chain_id, _)| structure.chain_residues(chain_id))
        .filter_map(|(residue_id, _)| charged_site(structure, residue_id))
        .collect();

    let (positives, negatives): (Vec<_>, Vec<_>) = sites
        .into_iter()
        .partition(|site| site.residue.charge == ChargeClass::Positive);
    if positives.is_empty() || negatives.is_empty() {
        return Vec::new();
    }

    let positive_points: Vec<[f64; 3]> = positives
        .iter()
        .map(|s| [s.point.x, s.point.y, s.point.z])
        .collect();
    let kdtree: KdTree<f64, 3> = (&positive_points).into();
    // Pad the search radius so boundary pairs survive the squared-distance round trip.
    let search_radius_sq = threshold * threshold * (1.0 + 1e-9) + 1e-12;

    #[cfg(not(feature = "parallel"))]
    let iterator = negatives.iter();

    #[cfg(feature = "parallel")]
    let iterator = negatives.par_iter();

    let candidates: Vec<ChargeClampCandidate> = iterator
        .map(|negative| {
            let query = [negative.point.x, negative.point.y, negative.point.z];
            kdtree
                .within::<SquaredEuclidean>(&query, search_radius_sq)
                .into_iter()
                .filter_map(|neighbour| {
                    let positive = positives.get(neighbour.item as usize)?;
                    let distance = (positive.point - negative.point).norm();
                    if distance > threshold {
                        return None;
                    }
                    let (first, second) = if positive.residue.key <= negative.residue.key {
                        (positive, negative)
                    } else {
                        (negative, positive)
                    };
                    Some(ChargeClampCandidate {
                        first: first.residue.clone(),
                        second: second.residue.clone(),
                        distance,
                        min_atom_distance: min_pair_distance(&first.atoms, &second.atoms),
                        score: (1.0 - distance / threshold).clamp(0.0, 1.0),
                    })
                })
                .collect::<Vec<_>>()
        })
        .flatten()
        .filter(|candidate| {
            config.focus_residues.is_empty()
                || config.focus_residues.contains(&candidate.first.key.number)
                || config.focus_residues.contains(&candidate.second.key.number)
        })
        .collect();

    let sorted: Vec<_> = candidates
        .into_iter()
        .sorted_by(|a, b| a.ordering(b))
        .collect();
    debug!(
        positives = positives.len(),
        negatives = negatives.len(),
        clamps = sorted.len(),
        "Charge clamp scan complete"
    );
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::engine::config::DescriptorConfig;
    use std::collections::BTreeSet;

    fn add_residue(s: &mut Structure, chain: char, number: isize, name: &str, atoms: &[(&str, Point3<f64>)]) {
        let chain_id = s.add_chain(chain);
        let rid = s.add_residue(chain_id, number, None, name).unwrap();
        for (atom_name, pos) in atoms {
            s.add_atom_to_residue(rid, Atom::new(atom_name, rid, *pos));
        }
    }

    fn salt_bridge(distance: f64) -> Structure {
        let mut s = Structure::new("bridge");
        add_residue(&mut s, 'A', 246, "LYS", &[("CA", Point3::new(-3.0, 0.0, 0.0)), ("NZ", Point3::origin())]);
        add_residue(
            &mut s,
            'A',
            420,
            "GLU",
            &[
                ("CA", Point3::new(distance + 3.0, 0.0, 0.0)),
                ("OE1", Point3::new(distance, 1.0, 0.0)),
                ("OE2", Point3::new(distance, -1.0, 0.0)),
            ],
        );
        add_residue(&mut s, 'A', 300, "LEU", &[("CA", Point3::new(1.0, 1.0, 1.0))]);
        s
    }

    fn config() -> DescriptorConfig {
        DescriptorConfig::default()
    }

    #[test]
    fn one_pair_below_threshold_is_reported_with_its_distance() {
        let c = config();
        let clamps = detect_clamps(&salt_bridge(4.2), &c.clamp, &c.chain_scope);
        assert_eq!(clamps.len(), 1);
        let clamp = &clamps[0];
        assert!((clamp.distance - 4.2).abs() < 1e-9);
        assert_eq!(clamp.first.key.number, 246);
        assert_eq!(clamp.second.key.number, 420);
        assert_eq!(clamp.sign_pair(), "+/-");
        assert!((clamp.score - (1.0 - 4.2 / 6.0)).abs() < 1e-9);
        let expected_min = (4.2f64 * 4.2 + 1.0).sqrt();
        assert!((clamp.min_atom_distance - expected_min).abs() < 1e-9);
    }

    #[test]
    fn pair_beyond_threshold_is_not_reported() {
        let c = config();
        assert!(detect_clamps(&salt_bridge(6.5), &c.clamp, &c.chain_scope).is_empty());
    }

    #[test]
    fn threshold_is_inclusive() {
        let c = config();
        assert_eq!(detect_clamps(&salt_bridge(6.0), &c.clamp, &c.chain_scope).len(), 1);
    }

    #[test]
    fn missing_charged_atoms_fall_back_to_cb_then_ca() {
        let mut s = Structure::new("fallback");
        add_residue(&mut s, 'A', 1, "ARG", &[("CA", Point3::origin()), ("CB", Point3::new(1.0, 0.0, 0.0))]);
        add_residue(&mut s, 'A', 2, "ASP", &[("CA", Point3::new(5.0, 0.0, 0.0))]);
        let c = config();
        let clamps = detect_clamps(&s, &c.clamp, &c.chain_scope);
        assert_eq!(clamps.len(), 1);
        assert!((clamps[0].distance - 4.0).abs() < 1e-9);
    }

    #[test]
    fn same_sign_pairs_are_ignored_and_results_are_sorted() {
        let mut s = Structure::new("many");
        add_residue(&mut s, 'A', 1, "LYS", &[("NZ", Point3::origin())]);
        add_residue(&mut s, 'A', 2, "ARG", &[("NH1", Point3::new(2.0, 0.0, 0.0))]);
        add_residue(&mut s, 'B', 7, "ASP", &[("OD1", Point3::new(0.0, 5.0, 0.0))]);
        add_residue(&mut s, 'B', 8, "GLU", &[("OE1", Point3::new(0.0, 3.0, 0.0))]);
        let c = config();
        let clamps = detect_clamps(&s, &c.clamp, &c.chain_scope);
        let pairs: Vec<_> = clamps
            .iter()
            .map(|c| (c.first.key.number, c.second.key.number))
            .collect();
        // LYS1-GLU8 (3.0), ARG2-GLU8 (3.61), LYS1-ASP7 (5.0), ARG2-ASP7 (5.39)
        assert_eq!(pairs, vec![(1, 8), (2, 8), (1, 7), (2, 7)]);
        assert!(clamps.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn chain_scope_and_focus_filter_pairs() {
        let mut s = salt_bridge(4.0);
        add_residue(&mut s, 'B', 10, "ARG", &[("NE", Point3::new(50.0, 0.0, 0.0))]);
        add_residue(&mut s, 'B', 11, "ASP", &[("OD2", Point3::new(53.0, 0.0, 0.0))]);
        let mut c = config();
        assert_eq!(detect_clamps(&s, &c.clamp, &c.chain_scope).len(), 2);

        let only_b = ChainScope::Only(['B'].into_iter().collect());
        let in_b = detect_clamps(&s, &c.clamp, &only_b);
        assert_eq!(in_b.len(), 1);
        assert_eq!(in_b[0].first.key.chain, 'B');

        c.clamp.focus_residues = BTreeSet::from([420]);
        let focused = detect_clamps(&s, &c.clamp, &c.chain_scope);
        assert_eq!(focused.len(), 1);
        assert_eq!(focused[0].second.key.number, 420);
    }
}
