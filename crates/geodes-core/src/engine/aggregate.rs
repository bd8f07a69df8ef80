use super::axis::HelixSegment;
use super::clamp::ChargeClampCandidate;
use super::config::TableLayout;
use super::error::WorkflowError;
use super::pipeline::{FailedSegment, StructureOutcome, StructureReport};
use serde::{Serialize, Serializer};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

const STATUS_OK: &str = "ok";
const STATUS_ERROR: &str = "error";

pub(crate) fn fixed3<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.3}"))
}

pub(crate) fn opt_fixed3<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_str(&format!("{v:.3}")),
        None => serializer.serialize_str(""),
    }
}

pub(crate) fn opt_fixed4<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_str(&format!("{v:.4}")),
        None => serializer.serialize_str(""),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

fn max(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
}

/// Summary record of one structure (`per-structure` layout).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureSummaryRow {
    pub structure: String,
    pub status: &'static str,
    pub helix_count: usize,
    pub failed_segments: usize,
    #[serde(serialize_with = "opt_fixed3")]
    pub mean_bend_deg: Option<f64>,
    #[serde(serialize_with = "opt_fixed3")]
    pub max_bend_deg: Option<f64>,
    #[serde(serialize_with = "opt_fixed4")]
    pub mean_curvature: Option<f64>,
    #[serde(serialize_with = "opt_fixed3")]
    pub mean_length: Option<f64>,
    pub clamp_count: usize,
    #[serde(serialize_with = "opt_fixed3")]
    pub min_clamp_distance: Option<f64>,
    #[serde(serialize_with = "opt_fixed3")]
    pub resolution: Option<f64>,
    pub error: String,
}

impl StructureSummaryRow {
    fn from_report(report: &StructureReport) -> Self {
        let helices: Vec<&HelixSegment> = report.helices().collect();
        Self {
            structure: report.id.clone(),
            status: STATUS_OK,
            helix_count: helices.len(),
            failed_segments: report.failed_segments().count(),
            mean_bend_deg: mean(helices.iter().filter_map(|h| h.bend_angle)),
            max_bend_deg: max(helices.iter().filter_map(|h| h.bend_angle)),
            mean_curvature: mean(helices.iter().map(|h| h.axis.mean_curvature())),
            mean_length: mean(helices.iter().map(|h| h.length)),
            clamp_count: report.clamps.len(),
            min_clamp_distance: report.clamps.first().map(|c| c.distance),
            resolution: report.metadata.resolution,
            error: String::new(),
        }
    }

    fn failure(id: &str, reason: String) -> Self {
        Self {
            structure: id.to_string(),
            status: STATUS_ERROR,
            helix_count: 0,
            failed_segments: 0,
            mean_bend_deg: None,
            max_bend_deg: None,
            mean_curvature: None,
            mean_length: None,
            clamp_count: 0,
            min_clamp_distance: None,
            resolution: None,
            error: reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    Helix,
    Clamp,
    Structure,
}

/// One helix, one clamp, or a placeholder/error for a whole structure
/// (`per-descriptor` layout). Fields that do not apply to the kind are empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptorRow {
    pub structure: String,
    pub kind: DescriptorKind,
    pub status: &'static str,
    pub chain: Option<char>,
    pub start: Option<isize>,
    pub end: Option<isize>,
    pub window: Option<usize>,
    pub residues: Option<usize>,
    pub model: Option<String>,
    #[serde(serialize_with = "opt_fixed3")]
    pub length: Option<f64>,
    #[serde(serialize_with = "opt_fixed3")]
    pub rise: Option<f64>,
    #[serde(serialize_with = "opt_fixed3")]
    pub bend_deg: Option<f64>,
    #[serde(serialize_with = "opt_fixed4")]
    pub mean_curvature: Option<f64>,
    #[serde(serialize_with = "opt_fixed4")]
    pub max_curvature: Option<f64>,
    #[serde(serialize_with = "opt_fixed3")]
    pub residual: Option<f64>,
    #[serde(serialize_with = "opt_fixed4")]
    pub axis_x: Option<f64>,
    #[serde(serialize_with = "opt_fixed4")]
    pub axis_y: Option<f64>,
    #[serde(serialize_with = "opt_fixed4")]
    pub axis_z: Option<f64>,
    pub residue_a: Option<String>,
    pub residue_b: Option<String>,
    pub charges: Option<String>,
    #[serde(serialize_with = "opt_fixed3")]
    pub distance: Option<f64>,
    #[serde(serialize_with = "opt_fixed3")]
    pub min_atom_distance: Option<f64>,
    #[serde(serialize_with = "opt_fixed3")]
    pub score: Option<f64>,
    pub error: String,
}

impl DescriptorRow {
    fn empty(structure: &str, kind: DescriptorKind, status: &'static str) -> Self {
        Self {
            structure: structure.to_string(),
            kind,
            status,
            chain: None,
            start: None,
            end: None,
            window: None,
            residues: None,
            model: None,
            length: None,
            rise: None,
            bend_deg: None,
            mean_curvature: None,
            max_curvature: None,
            residual: None,
            axis_x: None,
            axis_y: None,
            axis_z: None,
            residue_a: None,
            residue_b: None,
            charges: None,
            distance: None,
            min_atom_distance: None,
            score: None,
            error: String::new(),
        }
    }

    fn helix(structure: &str, helix: &HelixSegment) -> Self {
        let direction = helix.axis.direction;
        Self {
            chain: Some(helix.chain),
            start: Some(helix.start_number),
            end: Some(helix.end_number),
            window: helix.window,
            residues: Some(helix.residue_count),
            model: Some(helix.axis.model.to_string()),
            length: Some(helix.length),
            rise: Some(helix.rise_per_residue),
            bend_deg: helix.bend_angle,
            mean_curvature: Some(helix.axis.mean_curvature()),
            max_curvature: Some(helix.axis.max_curvature()),
            residual: Some(helix.residual),
            axis_x: Some(direction.x),
            axis_y: Some(direction.y),
            axis_z: Some(direction.z),
            ..Self::empty(structure, DescriptorKind::Helix, STATUS_OK)
        }
    }

    fn failed_helix(structure: &str, failed: &FailedSegment) -> Self {
        Self {
            chain: failed.chain,
            start: Some(failed.start_number),
            end: Some(failed.end_number),
            window: failed.window,
            error: failed.error.to_string(),
            ..Self::empty(structure, DescriptorKind::Helix, STATUS_ERROR)
        }
    }

    fn clamp(structure: &str, clamp: &ChargeClampCandidate) -> Self {
        Self {
            chain: Some(clamp.first.key.chain),
            residue_a: Some(format!("{} {}", clamp.first.key, clamp.first.name)),
            residue_b: Some(format!("{} {}", clamp.second.key, clamp.second.name)),
            charges: Some(clamp.sign_pair()),
            distance: Some(clamp.distance),
            min_atom_distance: Some(clamp.min_atom_distance),
            score: Some(clamp.score),
            ..Self::empty(structure, DescriptorKind::Clamp, STATUS_OK)
        }
    }

    fn rows_for(report: &StructureReport) -> Vec<Self> {
        let mut rows: Vec<Self> = report
            .segments
            .iter()
            .map(|segment| match segment {
                Ok(helix) => Self::helix(&report.id, helix),
                Err(failed) => Self::failed_helix(&report.id, failed),
            })
            .chain(report.clamps.iter().map(|c| Self::clamp(&report.id, c)))
            .collect();
        if rows.is_empty() {
            rows.push(Self::empty(&report.id, DescriptorKind::Structure, STATUS_OK));
        }
        rows
    }

    fn failure(id: &str, reason: String) -> Self {
        Self {
            error: reason,
            ..Self::empty(id, DescriptorKind::Structure, STATUS_ERROR)
        }
    }
}

/// The batch table in its configured layout, rows in input order.
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorTable {
    PerStructure(Vec<StructureSummaryRow>),
    PerDescriptor(Vec<DescriptorRow>),
}

impl DescriptorTable {
    /// Builds the table from per-structure outcomes. Never drops an outcome:
    /// a failed structure becomes an `error` row carrying the reason.
    pub fn from_outcomes(outcomes: &[StructureOutcome], layout: TableLayout) -> Self {
        match layout {
            TableLayout::PerStructure => DescriptorTable::PerStructure(
                outcomes
                    .iter()
                    .map(|outcome| match &outcome.result {
                        Ok(report) => StructureSummaryRow::from_report(report),
                        Err(e) => StructureSummaryRow::failure(&outcome.id, e.to_string()),
                    })
                    .collect(),
            ),
            TableLayout::PerDescriptor => DescriptorTable::PerDescriptor(
                outcomes
                    .iter()
                    .flat_map(|outcome| match &outcome.result {
                        Ok(report) => DescriptorRow::rows_for(report),
                        Err(e) => vec![DescriptorRow::failure(&outcome.id, e.to_string())],
                    })
                    .collect(),
            ),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DescriptorTable::PerStructure(rows) => rows.len(),
            DescriptorTable::PerDescriptor(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), WorkflowError> {
        match self {
            DescriptorTable::PerStructure(rows) => write_rows(rows, writer),
            DescriptorTable::PerDescriptor(rows) => write_rows(rows, writer),
        }
    }

    pub fn write_to_path(&self, path: &Path) -> Result<(), WorkflowError> {
        let file = File::create(path).map_err(|e| WorkflowError::Output {
            path: path.display().to_string(),
            source: e,
        })?;
        self.write_csv(BufWriter::new(file))?;
        info!(path = %path.display(), rows = self.len(), "Descriptor table written");
        Ok(())
    }
}

/// Serializes records as CSV with a header row.
pub fn write_rows<T: Serialize, W: Write>(rows: &[T], writer: W) -> Result<(), WorkflowError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
