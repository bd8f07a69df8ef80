//! Secondary-structure assignment.
//!
//! Assignment is delegated to an external program behind the
//! [`SecondaryStructureAssigner`] trait; the rest of the pipeline only sees a
//! [`SecondaryStructureMap`] keyed by [`ResidueKey`].

pub mod dssp;

use crate::core::models::residue::{ModelError, SecondaryStructure};
use crate::core::models::structure::{ResidueKey, Structure};
use crate::core::process::ExternalToolError;
use std::collections::BTreeMap;
use std::path::Path;

pub use dssp::{DsspAssigner, DsspRecord, parse_dssp_output};

/// Produces per-residue secondary-structure labels for a structure.
pub trait SecondaryStructureAssigner: Send + Sync {
    /// Short name used in logs and error rows.
    fn name(&self) -> &str;

    fn assign(&self, structure: &Structure) -> Result<SecondaryStructureMap, ExternalToolError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecondaryStructureMap {
    labels: BTreeMap<ResidueKey, SecondaryStructure>,
}

impl SecondaryStructureMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ResidueKey, label: SecondaryStructure) {
        self.labels.insert(key, label);
    }

    pub fn get(&self, key: &ResidueKey) -> Option<SecondaryStructure> {
        self.labels.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResidueKey, &SecondaryStructure)> {
        self.labels.iter()
    }

    /// Writes labels onto every residue of `structure`.
    ///
    /// Residues missing from the map (typically non-standard residues the tool
    /// skipped) are labeled [`SecondaryStructure::Other`]. Returns the number
    /// of residues that received a label from the map.
    pub fn apply(&self, structure: &mut Structure) -> Result<usize, ModelError> {
        let assignments: Vec<_> = structure
            .chains()
            .flat_map(|(chain_id, _)| structure.chain_residues(chain_id))
            .filter_map(|(residue_id, _)| {
                structure
                    .residue_key(residue_id)
                    .map(|key| (residue_id, self.get(&key)))
            })
            .collect();

        let mut matched = 0;
        for (residue_id, label) in assignments {
            if label.is_some() {
                matched += 1;
            }
            if let Some(residue) = structure.residue_mut(residue_id) {
                residue.set_secondary_structure(label.unwrap_or(SecondaryStructure::Other))?;
            }
        }
        Ok(matched)
    }
}

impl FromIterator<(ResidueKey, SecondaryStructure)> for SecondaryStructureMap {
    fn from_iter<T: IntoIterator<Item = (ResidueKey, SecondaryStructure)>>(iter: T) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

/// Assigner backed by precomputed labels, e.g. a stored DSSP file.
#[derive(Debug, Clone, Default)]
pub struct StaticAssigner {
    map: SecondaryStructureMap,
}

impl StaticAssigner {
    pub fn new(map: SecondaryStructureMap) -> Self {
        Self { map }
    }

    /// Loads labels from a classic-format DSSP file written by an earlier run.
    pub fn from_dssp_file<P: AsRef<Path>>(path: P) -> Result<Self, ExternalToolError> {
        let text = std::fs::read_to_string(path)?;
        let map = parse_dssp_output("dssp", &text)?
            .into_iter()
            .map(|record| (record.key, record.label()))
            .collect();
        Ok(Self { map })
    }
}

impl SecondaryStructureAssigner for StaticAssigner {
    fn name(&self) -> &str {
        "static"
    }

    fn assign(&self, _structure: &Structure) -> Result<SecondaryStructureMap, ExternalToolError> {
        Ok(self.map.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::pdb::PdbFile;

    const THREE_RESIDUES: &str = "\
ATOM      1  CA  ALA A   1       0.000   0.000   0.000  1.00  0.00           C
ATOM      2  CA  ALA A   2       3.800   0.000   0.000  1.00  0.00           C
HETATM    3  C1  LIG A 900       9.000   0.000   0.000  1.00  0.00           C
";

    #[test]
    fn apply_labels_matched_residues_and_marks_others() {
        let mut structure = PdbFile::parse_str("s", THREE_RESIDUES).unwrap();
        let map: SecondaryStructureMap = [
            (ResidueKey::new('A', 1, None), SecondaryStructure::Helix),
            (ResidueKey::new('A', 2, None), SecondaryStructure::Coil),
        ]
        .into_iter()
        .collect();

        let matched = map.apply(&mut structure).unwrap();
        assert_eq!(matched, 2);

        let chain = structure.find_chain_by_id('A').unwrap();
        let labels: Vec<_> = structure
            .chain_residues(chain)
            .map(|(_, r)| r.secondary_structure())
            .collect();
        assert_eq!(
            labels,
            vec![
                Some(SecondaryStructure::Helix),
                Some(SecondaryStructure::Coil),
                Some(SecondaryStructure::Other)
            ]
        );
    }

    #[test]
    fn applying_twice_is_rejected() {
        let mut structure = PdbFile::parse_str("s", THREE_RESIDUES).unwrap();
        let map = SecondaryStructureMap::new();
        map.apply(&mut structure).unwrap();
        assert!(matches!(
            map.apply(&mut structure),
            Err(ModelError::LabelAlreadyAssigned { .. })
        ));
    }

    #[test]
    fn static_assigner_replays_a_stored_dssp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.dssp");
        let text = "  #  RESIDUE AA STRUCTURE BP1 BP2  ACC\n\
                    \x20   1    1 A A  H   0   0   45\n\
                    \x20   2    2 A A  E   0   0   45\n";
        std::fs::write(&path, text).unwrap();

        let assigner = StaticAssigner::from_dssp_file(&path).unwrap();
        let structure = PdbFile::parse_str("s", THREE_RESIDUES).unwrap();
        let map = assigner.assign(&structure).unwrap();
        assert_eq!(map.get(&ResidueKey::new('A', 1, None)), Some(SecondaryStructure::Helix));
        assert_eq!(map.get(&ResidueKey::new('A', 2, None)), Some(SecondaryStructure::Strand));
        assert!(StaticAssigner::from_dssp_file(dir.path().join("absent.dssp")).is_err());
    }

    #[test]
    fn static_assigner_returns_its_map() {
        let structure = PdbFile::parse_str("s", THREE_RESIDUES).unwrap();
        let mut map = SecondaryStructureMap::new();
        map.insert(ResidueKey::new('A', 1, None), SecondaryStructure::Strand);
        let assigner = StaticAssigner::new(map.clone());
        assert_eq!(assigner.assign(&structure).unwrap(), map);
        assert_eq!(assigner.name(), "static");
    }
}
