use crate::core::secondary::SecondaryStructureAssigner;
use crate::engine::aggregate::DescriptorTable;
use crate::engine::batch::{CancellationToken, run_ordered};
use crate::engine::config::DescriptorConfig;
use crate::engine::error::WorkflowError;
use crate::engine::pipeline::{StructureOutcome, analyze_path, structure_id_for};
use crate::engine::progress::ProgressReporter;
use std::path::PathBuf;
use tracing::{info, instrument};

#[derive(Debug)]
pub struct DescribeResult {
    /// One outcome per input, in input order.
    pub outcomes: Vec<StructureOutcome>,
    pub table: DescriptorTable,
}

impl DescribeResult {
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_ok()).count()
    }
}

/// Computes descriptors for every input structure and aggregates them.
///
/// Per-structure failures become error rows; only an invalid configuration
/// fails the whole run.
#[instrument(skip_all, name = "describe_workflow", fields(inputs = inputs.len()))]
pub fn run(
    inputs: &[PathBuf],
    assigner: &dyn SecondaryStructureAssigner,
    config: &DescriptorConfig,
    token: &CancellationToken,
    reporter: &ProgressReporter,
) -> Result<DescribeResult, WorkflowError> {
    config.validate()?;
    if inputs.is_empty() {
        return Err(WorkflowError::NoInputs);
    }
    info!(
        workers = config.workers,
        assigner = assigner.name(),
        "Starting descriptor computation."
    );

    let results = {
        let _phase = reporter.phase("Computing Descriptors");
        run_ordered(
            inputs,
            config.workers,
            token,
            reporter,
            |path| structure_id_for(path),
            |path| analyze_path(path, assigner, config).result,
        )
    };

    let outcomes: Vec<StructureOutcome> = inputs
        .iter()
        .zip(results)
        .map(|(path, result)| StructureOutcome {
            id: structure_id_for(path),
            result,
        })
        .collect();

    let table = DescriptorTable::from_outcomes(&outcomes, config.layout);
    let result = DescribeResult { outcomes, table };
    info!(
        structures = result.outcomes.len(),
        failed = result.failed_count(),
        rows = result.table.len(),
        "Descriptor computation complete."
    );
    Ok(result)
}
