use geodes::engine::progress::{ItemStatus, Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const SPINNER_TICK_MS: u64 = 80;

/// Terminal progress for a batch run, driven by engine [`Progress`] events.
///
/// The bar shows the most recently finished structure; failures are printed
/// above it as they happen and summarized when the phase ends.
#[derive(Clone)]
pub struct CliProgressHandler {
    bar: ProgressBar,
    failures: Arc<AtomicUsize>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr())
            .with_style(spinner_style())
            .with_message("Initializing...");
        bar.finish_and_clear();

        Self {
            bar,
            failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let handler = self.clone();
        Box::new(move |event: Progress| handler.handle(event))
    }

    fn handle(&self, event: Progress) {
        let bar = &self.bar;
        match event {
            Progress::PhaseStart { name } => {
                self.failures.store(0, Ordering::Relaxed);
                bar.reset();
                bar.set_length(0);
                bar.set_style(spinner_style());
                bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                bar.set_message(name);
            }
            Progress::BatchStart { items } => {
                bar.disable_steady_tick();
                bar.reset();
                bar.set_length(items);
                bar.set_style(bar_style());
            }
            Progress::ItemFinished { id, status } => {
                if status == ItemStatus::Failed {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    bar.suspend(|| eprintln!("  ✗ {id} could not be processed"));
                }
                bar.inc(1);
                bar.set_message(id);
            }
            Progress::BatchFinish => {
                if let Some(length) = bar.length() {
                    bar.set_position(length);
                }
                bar.finish();
            }
            Progress::PhaseFinish => {
                bar.disable_steady_tick();
                bar.finish_with_message(self.summary());
            }
            Progress::Message(msg) => bar.suspend(|| eprintln!("  {msg}")),
        }
    }

    fn summary(&self) -> String {
        match self.failures.load(Ordering::Relaxed) {
            0 => "✓ Done".to_string(),
            1 => "✓ Done, 1 structure failed".to_string(),
            n => format!("✓ Done, {n} structures failed"),
        }
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len} structures ({eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("eta", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
        })
        .progress_chars("##-")
}
