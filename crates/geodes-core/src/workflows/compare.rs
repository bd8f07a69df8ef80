use crate::core::alignment::{StructuralAligner, Superposition};
use crate::core::geometry::angle_between_degrees;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::StructureFile;
use crate::core::models::structure::Structure;
use crate::core::secondary::SecondaryStructureAssigner;
use crate::engine::aggregate::{fixed3, opt_fixed3, write_rows};
use crate::engine::axis::HelixSegment;
use crate::engine::batch::{CancellationToken, run_ordered};
use crate::engine::config::{AlignmentReference, DescriptorConfig};
use crate::engine::error::{EngineError, WorkflowError};
use crate::engine::pipeline::{StructureReport, describe_labeled, label_structure, structure_id_for};
use crate::engine::progress::ProgressReporter;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonRole {
    Reference,
    Mobile,
}

/// One helix of an aligned structure compared with the reference helix that
/// starts at the same residue of the same chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub reference: String,
    pub structure: String,
    pub role: ComparisonRole,
    pub status: &'static str,
    pub chain: Option<char>,
    pub start: Option<isize>,
    pub end: Option<isize>,
    #[serde(serialize_with = "opt_fixed3")]
    pub axis_angle_deg: Option<f64>,
    #[serde(serialize_with = "opt_fixed3")]
    pub origin_offset: Option<f64>,
    #[serde(serialize_with = "opt_fixed3")]
    pub bend_deg: Option<f64>,
    #[serde(serialize_with = "fixed3")]
    pub alignment_score: f64,
    #[serde(serialize_with = "opt_fixed3")]
    pub rmsd: Option<f64>,
    pub aligned_pairs: usize,
    pub error: String,
}

impl ComparisonRow {
    fn base(reference: &str, structure: &str, role: ComparisonRole) -> Self {
        Self {
            reference: reference.to_string(),
            structure: structure.to_string(),
            role,
            status: "ok",
            chain: None,
            start: None,
            end: None,
            axis_angle_deg: None,
            origin_offset: None,
            bend_deg: None,
            alignment_score: 0.0,
            rmsd: None,
            aligned_pairs: 0,
            error: String::new(),
        }
    }

    fn failure(reference: &str, structure: &str, role: ComparisonRole, reason: String) -> Self {
        Self {
            status: "error",
            error: reason,
            ..Self::base(reference, structure, role)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompareResult {
    pub reference: String,
    pub rows: Vec<ComparisonRow>,
}

impl CompareResult {
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), WorkflowError> {
        write_rows(&self.rows, writer)
    }

    pub fn write_to_path(&self, path: &Path) -> Result<(), WorkflowError> {
        let file = File::create(path).map_err(|e| WorkflowError::Output {
            path: path.display().to_string(),
            source: e,
        })?;
        self.write_csv(BufWriter::new(file))
    }
}

type HelixIndex<'a> = HashMap<(char, isize), &'a HelixSegment>;

fn index_helices(report: &StructureReport) -> HelixIndex<'_> {
    report
        .helices()
        .map(|h| ((h.chain, h.start_number), h))
        .collect()
}

fn compare_report(
    reference_id: &str,
    reference_helices: &HelixIndex<'_>,
    report: &StructureReport,
    superposition: &Superposition,
) -> Vec<ComparisonRow> {
    let aligned = |row: ComparisonRow| ComparisonRow {
        alignment_score: superposition.score,
        rmsd: superposition.rmsd,
        aligned_pairs: superposition.aligned_pairs,
        ..row
    };
    let rows: Vec<ComparisonRow> = report
        .helices()
        .map(|helix| {
            let counterpart = reference_helices.get(&(helix.chain, helix.start_number));
            aligned(ComparisonRow {
                chain: Some(helix.chain),
                start: Some(helix.start_number),
                end: Some(helix.end_number),
                bend_deg: helix.bend_angle,
                axis_angle_deg: counterpart.map(|r| angle_between_degrees(&helix.axis.direction, &r.axis.direction)),
                origin_offset: counterpart.map(|r| (helix.axis.origin - r.axis.origin).norm()),
                ..ComparisonRow::base(reference_id, &report.id, ComparisonRole::Mobile)
            })
        })
        .collect();
    if rows.is_empty() {
        vec![aligned(ComparisonRow::base(reference_id, &report.id, ComparisonRole::Mobile))]
    } else {
        rows
    }
}

fn load_labeled(path: &Path, assigner: &dyn SecondaryStructureAssigner) -> Result<Structure, EngineError> {
    let mut structure = PdbFile::read_from_path(path)?;
    structure.set_id(&structure_id_for(path));
    label_structure(&structure, assigner)
}

fn reference_index(ids: &[String], reference: &AlignmentReference) -> Result<usize, WorkflowError> {
    match reference {
        AlignmentReference::First => Ok(0),
        AlignmentReference::Named(name) => ids
            .iter()
            .position(|id| id == name)
            .ok_or_else(|| WorkflowError::ReferenceNotFound(name.clone())),
    }
}

/// Superposes every structure onto the reference and compares helix axes.
///
/// Structures that fail to load, label or align become error rows and take no
/// further part in the comparison.
#[instrument(skip_all, name = "compare_workflow", fields(inputs = inputs.len()))]
pub fn run(
    inputs: &[PathBuf],
    assigner: &dyn SecondaryStructureAssigner,
    aligner: &dyn StructuralAligner,
    config: &DescriptorConfig,
    token: &CancellationToken,
    reporter: &ProgressReporter,
) -> Result<CompareResult, WorkflowError> {
    config.validate()?;
    if inputs.is_empty() {
        return Err(WorkflowError::NoInputs);
    }
    let ids: Vec<String> = inputs.iter().map(|p| structure_id_for(p)).collect();
    let reference_at = reference_index(&ids, &config.alignment_reference)?;
    let reference_id = ids[reference_at].clone();
    info!(reference = %reference_id, aligner = aligner.name(), "Starting structure comparison.");

    let loaded = {
        let _phase = reporter.phase("Loading Structures");
        run_ordered(
            inputs,
            config.workers,
            token,
            reporter,
            |path| structure_id_for(path),
            |path| load_labeled(path, assigner),
        )
    };

    let reference = match &loaded[reference_at] {
        Ok(structure) => structure,
        Err(e) => {
            warn!(reference = %reference_id, error = %e, "Reference structure is unavailable");
            reporter.message(format!("Reference '{reference_id}' is unavailable; nothing was compared"));
            let rows = ids
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    if i == reference_at {
                        ComparisonRow::failure(&reference_id, id, ComparisonRole::Reference, e.to_string())
                    } else {
                        let reason = format!("reference '{reference_id}' is unavailable");
                        ComparisonRow::failure(&reference_id, id, ComparisonRole::Mobile, reason)
                    }
                })
                .collect();
            return Ok(CompareResult {
                reference: reference_id,
                rows,
            });
        }
    };
    let reference_report = describe_labeled(reference, config);
    let reference_helices = index_helices(&reference_report);

    let slots: Vec<usize> = (0..inputs.len()).filter(|&i| i != reference_at).collect();
    let compared = {
        let _phase = reporter.phase("Aligning Structures");
        // `None` marks a structure that already failed to load.
        run_ordered(&slots, config.workers, token, reporter, |&i| ids[i].clone(), |&i| {
            let Ok(mobile) = &loaded[i] else {
                return Ok(None);
            };
            let superposition = aligner.align(reference, mobile)?;
            let moved = superposition.transform.apply_to(mobile);
            let report = describe_labeled(&moved, config);
            Ok(Some(compare_report(&reference_id, &reference_helices, &report, &superposition)))
        })
    };

    let mut rows = vec![ComparisonRow {
        alignment_score: 1.0,
        rmsd: Some(0.0),
        aligned_pairs: 0,
        ..ComparisonRow::base(&reference_id, &reference_id, ComparisonRole::Reference)
    }];
    for (&i, result) in slots.iter().zip(compared) {
        let reason = match result {
            Ok(Some(mut pair_rows)) => {
                rows.append(&mut pair_rows);
                continue;
            }
            Ok(None) => loaded[i]
                .as_ref()
                .err()
                .map(ToString::to_string)
                .unwrap_or_default(),
            Err(e) => e.to_string(),
        };
        warn!(structure = %ids[i], error = %reason, "Structure excluded from comparison");
        rows.push(ComparisonRow::failure(&reference_id, &ids[i], ComparisonRole::Mobile, reason));
    }
    info!(rows = rows.len(), "Structure comparison complete.");
    Ok(CompareResult {
        reference: reference_id,
        rows,
    })
}
