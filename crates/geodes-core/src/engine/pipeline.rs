use super::axis::{HelixSegment, fit_segment};
use super::clamp::{ChargeClampCandidate, detect_clamps};
use super::config::DescriptorConfig;
use super::error::{EngineError, SegmentError};
use super::segmenter::{SegmentSpan, Segmentation, UnmatchedWindow, segment_structure};
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::StructureFile;
use crate::core::models::structure::{Structure, StructureMetadata};
use crate::core::secondary::SecondaryStructureAssigner;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// A segment whose axis could not be fitted, or a reference window that
/// produced no segment (its bounds then stand in for the residue range).
#[derive(Debug, Clone, PartialEq)]
pub struct FailedSegment {
    pub chain: Option<char>,
    pub start_number: isize,
    pub end_number: isize,
    pub window: Option<usize>,
    pub error: SegmentError,
}

impl FailedSegment {
    fn new(span: &SegmentSpan, error: SegmentError) -> Self {
        Self {
            chain: Some(span.chain),
            start_number: span.start_number,
            end_number: span.end_number,
            window: span.window,
            error,
        }
    }
}

impl From<&UnmatchedWindow> for FailedSegment {
    fn from(unmatched: &UnmatchedWindow) -> Self {
        Self {
            chain: unmatched.chain,
            start_number: unmatched.bounds.start,
            end_number: unmatched.bounds.end,
            window: Some(unmatched.window),
            error: SegmentError::Window(unmatched.reason),
        }
    }
}

/// Outcome of fitting one segment, in segmentation order.
pub type SegmentOutcome = Result<HelixSegment, FailedSegment>;

/// Descriptors of one successfully processed structure.
#[derive(Debug, Clone)]
pub struct StructureReport {
    pub id: String,
    pub metadata: StructureMetadata,
    pub segments: Vec<SegmentOutcome>,
    pub clamps: Vec<ChargeClampCandidate>,
}

impl StructureReport {
    pub fn helices(&self) -> impl Iterator<Item = &HelixSegment> {
        self.segments.iter().filter_map(|s| s.as_ref().ok())
    }

    pub fn failed_segments(&self) -> impl Iterator<Item = &FailedSegment> {
        self.segments.iter().filter_map(|s| s.as_ref().err())
    }
}

/// Result slot for one batch input. `id` is known even when loading failed.
#[derive(Debug)]
pub struct StructureOutcome {
    pub id: String,
    pub result: Result<StructureReport, EngineError>,
}

impl StructureOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Returns a copy of `structure` with every residue labeled by `assigner`.
pub fn label_structure(
    structure: &Structure,
    assigner: &dyn SecondaryStructureAssigner,
) -> Result<Structure, EngineError> {
    let map = assigner.assign(structure)?;
    let mut labeled = structure.clone();
    let matched = map.apply(&mut labeled)?;
    let unlabeled = labeled.residue_count().saturating_sub(matched);
    if unlabeled > 0 {
        debug!(
            structure = %structure.id(),
            residues = unlabeled,
            tool = assigner.name(),
            "Residues omitted by the assigner were labeled Other"
        );
    }
    Ok(labeled)
}

/// Computes helix and charge clamp descriptors of an already labeled structure.
///
/// A segment whose fit fails is recorded and the remaining segments continue.
/// Reference windows without a segment follow the fitted segments as failures.
#[instrument(skip_all, name = "describe_structure", fields(structure = %structure.id()))]
pub fn describe_labeled(structure: &Structure, config: &DescriptorConfig) -> StructureReport {
    let Segmentation { spans, unmatched } = segment_structure(structure, &config.helix, &config.chain_scope);
    let mut segments: Vec<SegmentOutcome> = spans
        .iter()
        .map(|span| {
            fit_segment(structure, span, config.helix.curvature_tolerance).map_err(|e| {
                warn!(
                    chain = %span.chain,
                    start = span.start_number,
                    end = span.end_number,
                    error = %e,
                    "Helix axis fit failed"
                );
                FailedSegment::new(span, e.into())
            })
        })
        .collect();
    for miss in &unmatched {
        debug!(window = %miss.bounds, chain = ?miss.chain, reason = %miss.reason, "Reference window has no segment");
        segments.push(Err(FailedSegment::from(miss)));
    }
    let clamps = if config.clamp.enabled {
        detect_clamps(structure, &config.clamp, &config.chain_scope)
    } else {
        Vec::new()
    };

    debug!(segments = segments.len(), clamps = clamps.len(), "Structure described");
    StructureReport {
        id: structure.id().to_string(),
        metadata: structure.metadata().clone(),
        segments,
        clamps,
    }
}

/// Labels and describes a loaded structure.
pub fn analyze_structure(
    structure: &Structure,
    assigner: &dyn SecondaryStructureAssigner,
    config: &DescriptorConfig,
) -> Result<StructureReport, EngineError> {
    let labeled = label_structure(structure, assigner)?;
    Ok(describe_labeled(&labeled, config))
}

/// Identifier used for an input path before (or without) a successful load.
pub fn structure_id_for(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Loads, labels and describes one PDB file.
pub fn analyze_path(
    path: &Path,
    assigner: &dyn SecondaryStructureAssigner,
    config: &DescriptorConfig,
) -> StructureOutcome {
    let id = structure_id_for(path);
    let result = PdbFile::read_from_path(path)
        .map_err(EngineError::from)
        .and_then(|mut structure| {
            structure.set_id(&id);
            analyze_structure(&structure, assigner, config)
        });
    if let Err(e) = &result {
        warn!(structure = %id, error = %e, "Structure could not be processed");
    }
    StructureOutcome { id, result }
}


#[cfg(test)]
mod tests {
    use super::test_support::helix_structure;
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::residue::{ModelError, SecondaryStructure};
    use crate::core::geometry::GeometryError;
    use crate::core::models::structure::ResidueKey;
    use crate::core::process::ExternalToolError;
    use crate::core::secondary::{SecondaryStructureMap, StaticAssigner};
    use crate::engine::config::DescriptorConfigBuilder;
    use nalgebra::Point3;

    struct FailingAssigner;

    impl SecondaryStructureAssigner for FailingAssigner {
        fn name(&self) -> &str {
            "broken-dssp"
        }

        fn assign(&self, _: &Structure) -> Result<SecondaryStructureMap, ExternalToolError> {
            Err(ExternalToolError::MalformedOutput {
                tool: "broken-dssp".into(),
                line: 1,
                reason: "garbage".into(),
            })
        }
    }

    #[test]
    fn helix_structure_yields_one_segment_with_small_bend() {
        let (structure, assigner) = helix_structure("ideal", 16, 4);
        let report = analyze_structure(&structure, &assigner, &DescriptorConfig::default()).unwrap();
        let helices: Vec<_> = report.helices().collect();
        assert_eq!(helices.len(), 1);
        assert_eq!((helices[0].start_number, helices[0].end_number), (1, 16));
        assert!(helices[0].bend_angle.unwrap() < 5.0);
        assert_eq!(report.failed_segments().count(), 0);
    }

    #[test]
    fn assigner_failure_is_a_tool_error_not_a_default_label() {
        let (structure, _) = helix_structure("ideal", 8, 0);
        let err = analyze_structure(&structure, &FailingAssigner, &DescriptorConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::Tool(ExternalToolError::MalformedOutput { .. })));
    }

    #[test]
    fn labeling_an_already_labeled_structure_is_rejected() {
        let (structure, assigner) = helix_structure("twice", 6, 0);
        let labeled = label_structure(&structure, &assigner).unwrap();
        let err = label_structure(&labeled, &assigner).unwrap_err();
        assert!(matches!(err, EngineError::Model(ModelError::LabelAlreadyAssigned { .. })));
    }

    #[test]
    fn failed_segment_fits_are_recorded_and_others_continue() {
        let (mut structure, _) = helix_structure("mixed", 8, 1);
        let chain = structure.find_chain_by_id('A').unwrap();
        // A second helix whose atoms all sit on one point.
        let mut map: SecondaryStructureMap = (1..=9)
            .map(|n| {
                let label = if n == 9 { SecondaryStructure::Coil } else { SecondaryStructure::Helix };
                (ResidueKey::new('A', n, None), label)
            })
            .collect();
        for n in 10..=14 {
            let rid = structure.add_residue(chain, n, None, "ALA").unwrap();
            for atom in ["N", "CA", "C"] {
                structure.add_atom_to_residue(rid, Atom::new(atom, rid, Point3::new(5.0, 5.0, 5.0)));
            }
            map.insert(ResidueKey::new('A', n, None), SecondaryStructure::Helix);
        }
        let report = analyze_structure(&structure, &StaticAssigner::new(map), &DescriptorConfig::default()).unwrap();
        assert_eq!(report.segments.len(), 2);
        assert_eq!(report.helices().count(), 1);
        let failed: Vec<_> = report.failed_segments().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!((failed[0].start_number, failed[0].end_number), (10, 14));
        assert_eq!(failed[0].error, SegmentError::Fit(GeometryError::Degenerate));
    }

    #[test]
    fn disabled_clamp_detection_leaves_helices_untouched() {
        let (mut structure, _) = helix_structure("bridged", 8, 1);
        let mut map: SecondaryStructureMap = (1..=9)
            .map(|n| {
                let label = if n == 9 { SecondaryStructure::Coil } else { SecondaryStructure::Helix };
                (ResidueKey::new('A', n, None), label)
            })
            .collect();
        let chain = structure.add_chain('B');
        for (number, name, atom, x) in [(1, "LYS", "NZ", 40.0), (2, "GLU", "OE1", 44.0)] {
            let rid = structure.add_residue(chain, number, None, name).unwrap();
            structure.add_atom_to_residue(rid, Atom::new(atom, rid, Point3::new(x, 0.0, 0.0)));
            map.insert(ResidueKey::new('B', number, None), SecondaryStructure::Coil);
        }
        let assigner = StaticAssigner::new(map);

        let scanning = analyze_structure(&structure, &assigner, &DescriptorConfig::default()).unwrap();
        assert!(scanning.clamps.iter().any(|c| c.first.key.chain == 'B'));

        let config = DescriptorConfigBuilder::new().clamp_detection(false).build().unwrap();
        let skipped = analyze_structure(&structure, &assigner, &config).unwrap();
        assert!(skipped.clamps.is_empty());
        assert_eq!(skipped.helices().count(), scanning.helices().count());
    }

    #[test]
    fn unreadable_path_gives_error_outcome_named_after_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdb");
        std::fs::write(&path, "HEADER    NOTHING HERE\nEND\n").unwrap();
        let (_, assigner) = helix_structure("unused", 4, 0);
        let outcome = analyze_path(&path, &assigner, &DescriptorConfig::default());
        assert_eq!(outcome.id, "broken");
        assert!(matches!(outcome.result, Err(EngineError::Load { .. })));
    }
}
