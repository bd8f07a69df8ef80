use super::load_config;
use crate::cli::CompareArgs;
use crate::config::CommandOverrides;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use geodes::{
    core::{
        alignment::{StructuralAligner, external::ExternalAligner, kabsch::KabschAligner},
        secondary::dssp::DsspAssigner,
    },
    engine::{batch::CancellationToken, progress::ProgressReporter},
    workflows::{self, inputs::collect_inputs},
};
use tracing::{info, warn};

pub async fn run(args: CompareArgs, threads: Option<usize>, token: CancellationToken) -> Result<()> {
    let config = load_config(
        &args.common,
        CommandOverrides {
            threads,
            reference: args.reference.as_deref(),
            aligner: args.aligner.as_deref(),
        },
    )?;

    let inputs = collect_inputs(&args.common.inputs)?;
    info!("Collected {} input structure(s).", inputs.len());

    let assigner = DsspAssigner::new(&config.tools.dssp, config.tools.dssp_timeout);
    let aligner: Box<dyn StructuralAligner> = match &config.tools.aligner {
        Some(executable) => Box::new(ExternalAligner::new(executable, config.tools.aligner_timeout)),
        None => Box::new(KabschAligner),
    };
    info!("Superposing with '{}'.", aligner.name());

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Comparing {} structure(s)...", inputs.len());
    let result = tokio::task::block_in_place(|| {
        workflows::compare::run(
            &inputs,
            &assigner,
            aligner.as_ref(),
            &config.descriptor,
            &token,
            &reporter,
        )
    })?;

    info!("Writing {} comparison row(s) to {:?}", result.rows.len(), &args.common.output);
    result.write_to_path(&args.common.output)?;

    let failed = result.rows.iter().filter(|r| r.status != "ok").count();
    if failed > 0 {
        warn!("{} comparison row(s) carry errors.", failed);
        println!("Warning: {} row(s) carry errors; see the 'error' column.", failed);
    }
    println!(
        "✓ Comparison against '{}' written to: {}",
        result.reference,
        args.common.output.display()
    );
    Ok(())
}
