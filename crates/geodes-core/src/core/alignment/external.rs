use super::kabsch::matched_ca_pairs;
use super::{AlignmentError, RigidTransform, StructuralAligner, Superposition};
use crate::core::geometry::rmsd;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::StructureFile;
use crate::core::models::structure::Structure;
use crate::core::process::{ExternalToolError, run_with_timeout, tool_name};
use nalgebra::{Matrix3, Vector3};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_ALIGNER_TIMEOUT: Duration = Duration::from_secs(120);

/// Parsed transform records of an aligner run.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignerReport {
    pub transform: RigidTransform,
    pub score: f64,
    pub rmsd: Option<f64>,
    pub aligned_pairs: Option<usize>,
}

/// Parses aligner output.
///
/// Recognized records, one per line: three `ROTATION r1 r2 r3` rows, one
/// `TRANSLATION tx ty tz`, one `SCORE s`, and optionally `RMSD r` and
/// `ALIGNED n`. Other lines are ignored.
pub fn parse_aligner_output(tool: &str, text: &str) -> Result<AlignerReport, ExternalToolError> {
    let malformed = |line: usize, reason: &str| ExternalToolError::MalformedOutput {
        tool: tool.to_string(),
        line,
        reason: reason.to_string(),
    };

    let mut rows: Vec<[f64; 3]> = Vec::with_capacity(3);
    let mut translation: Option<[f64; 3]> = None;
    let mut score = None;
    let mut rmsd_value = None;
    let mut aligned = None;

    for (index, line) in text.lines().enumerate() {
        let line_num = index + 1;
        let mut fields = line.split_whitespace();
        let Some(tag) = fields.next() else {
            continue;
        };
        let values: Vec<&str> = fields.collect();
        let triple = || -> Result<[f64; 3], ExternalToolError> {
            if values.len() != 3 {
                return Err(malformed(line_num, "expected three numeric values"));
            }
            let mut out = [0.0; 3];
            for (slot, raw) in out.iter_mut().zip(&values) {
                *slot = raw
                    .parse()
                    .map_err(|_| malformed(line_num, "non-numeric value"))?;
            }
            Ok(out)
        };
        let single = || -> Result<f64, ExternalToolError> {
            values
                .first()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| malformed(line_num, "expected a numeric value"))
        };

        match tag.to_ascii_uppercase().as_str() {
            "ROTATION" => {
                if rows.len() == 3 {
                    return Err(malformed(line_num, "more than three ROTATION rows"));
                }
                rows.push(triple()?);
            }
            "TRANSLATION" => translation = Some(triple()?),
            "SCORE" => score = Some(single()?),
            "RMSD" => rmsd_value = Some(single()?),
            "ALIGNED" => aligned = Some(single()? as usize),
            _ => {}
        }
    }

    if rows.len() != 3 {
        return Err(malformed(0, "expected three ROTATION rows"));
    }
    let translation = translation.ok_or_else(|| malformed(0, "missing TRANSLATION record"))?;
    let score = score.ok_or_else(|| malformed(0, "missing SCORE record"))?;

    let rotation = Matrix3::new(
        rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
        rows[2][1], rows[2][2],
    );
    Ok(AlignerReport {
        transform: RigidTransform::new(rotation, Vector3::from(translation)),
        score,
        rmsd: rmsd_value,
        aligned_pairs: aligned,
    })
}

/// Runs an external structural aligner as `<executable> <reference.pdb> <mobile.pdb>`.
///
/// The tool must print a transform that maps the mobile structure onto the
/// reference (see [`parse_aligner_output`]).
#[derive(Debug, Clone)]
pub struct ExternalAligner {
    executable: PathBuf,
    timeout: Duration,
}

impl ExternalAligner {
    pub fn new<P: Into<PathBuf>>(executable: P, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl StructuralAligner for ExternalAligner {
    fn name(&self) -> &str {
        "external"
    }

    #[instrument(skip_all, name = "external_align", fields(reference = %reference.id(), mobile = %mobile.id()))]
    fn align(&self, reference: &Structure, mobile: &Structure) -> Result<Superposition, AlignmentError> {
        let tool = tool_name(&self.executable);
        let scratch = tempfile::Builder::new()
            .prefix("geodes-align-")
            .tempdir()
            .map_err(ExternalToolError::from)?;
        let reference_path = scratch.path().join("reference.pdb");
        let mobile_path = scratch.path().join("mobile.pdb");
        for (structure, path) in [(reference, &reference_path), (mobile, &mobile_path)] {
            PdbFile::write_to_path(structure, path).map_err(|e| ExternalToolError::Input {
                tool: tool.clone(),
                reason: e.to_string(),
            })?;
        }

        let mut command = Command::new(&self.executable);
        command.arg(&reference_path).arg(&mobile_path);
        let output = run_with_timeout(command, &tool, self.timeout, scratch.path())?;
        let report = parse_aligner_output(&tool, &output.stdout)?;
        report.transform.validate()?;

        let pairs = matched_ca_pairs(reference, mobile);
        let computed_rmsd = {
            let (ref_points, mob_points): (Vec<_>, Vec<_>) = pairs.iter().copied().unzip();
            let moved: Vec<_> = mob_points
                .iter()
                .map(|p| report.transform.apply_point(p))
                .collect();
            rmsd(&ref_points, &moved)
        };
        debug!(score = report.score, pairs = pairs.len(), "Parsed aligner transform");

        Ok(Superposition {
            transform: report.transform,
            score: report.score,
            rmsd: report.rmsd.or(computed_rmsd),
            aligned_pairs: report.aligned_pairs.unwrap_or(pairs.len()),
        })
    }
}
