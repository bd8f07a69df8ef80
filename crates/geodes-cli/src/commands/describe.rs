use super::load_config;
use crate::cli::DescribeArgs;
use crate::config::CommandOverrides;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use geodes::{
    core::secondary::dssp::DsspAssigner,
    engine::{batch::CancellationToken, progress::ProgressReporter},
    workflows::{self, inputs::collect_inputs},
};
use tracing::{info, warn};

pub async fn run(args: DescribeArgs, threads: Option<usize>, token: CancellationToken) -> Result<()> {
    let config = load_config(
        &args.common,
        CommandOverrides {
            threads,
            ..Default::default()
        },
    )?;

    let inputs = collect_inputs(&args.common.inputs)?;
    info!("Collected {} input structure(s).", inputs.len());

    let assigner = DsspAssigner::new(&config.tools.dssp, config.tools.dssp_timeout);
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Computing descriptors for {} structure(s) with {} worker(s)...",
        inputs.len(),
        config.descriptor.workers
    );
    let result = tokio::task::block_in_place(|| {
        workflows::describe::run(&inputs, &assigner, &config.descriptor, &token, &reporter)
    })?;

    info!("Writing {} row(s) to {:?}", result.table.len(), &args.common.output);
    result.table.write_to_path(&args.common.output)?;

    let failed = result.failed_count();
    if token.is_cancelled() {
        warn!("Run was interrupted; unfinished structures are marked as cancelled.");
        println!("Warning: run interrupted, partial results were written.");
    }
    if failed > 0 {
        warn!("{} structure(s) could not be processed.", failed);
        println!(
            "Warning: {} of {} structure(s) failed; see the 'error' column.",
            failed,
            result.outcomes.len()
        );
    }
    println!(
        "✓ Descriptor table ({} layout) written to: {}",
        config.descriptor.layout,
        args.common.output.display()
    );
    Ok(())
}
