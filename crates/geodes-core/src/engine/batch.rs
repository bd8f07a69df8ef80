use super::error::EngineError;
use super::progress::{ItemStatus, Progress, ProgressReporter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "parallel")]
use tracing::warn;

/// Shared flag checked before each batch item starts.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs `job` over `items` on a pool of `workers` threads.
///
/// The returned vector is index-aligned with `items` whatever the completion
/// order. Items not yet started when `token` is cancelled yield
/// [`EngineError::Cancelled`]; finished results are kept. Each item is
/// reported under the id `label` gives it as soon as it ends.
#[instrument(skip_all, name = "batch_executor", fields(items = items.len(), workers = workers))]
pub fn run_ordered<I, R, L, F>(
    items: &[I],
    workers: usize,
    token: &CancellationToken,
    reporter: &ProgressReporter,
    label: L,
    job: F,
) -> Vec<Result<R, EngineError>>
where
    I: Sync,
    R: Send,
    L: Fn(&I) -> String + Sync,
    F: Fn(&I) -> Result<R, EngineError> + Sync,
{
    reporter.report(Progress::BatchStart {
        items: items.len() as u64,
    });

    let run_one = |item: &I| {
        let result = if token.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            job(item)
        };
        let status = match &result {
            Ok(_) => ItemStatus::Succeeded,
            Err(EngineError::Cancelled) => ItemStatus::Cancelled,
            Err(_) => ItemStatus::Failed,
        };
        reporter.report(Progress::ItemFinished {
            id: label(item),
            status,
        });
        result
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<_> = {
        let _ = workers;
        items.iter().map(run_one).collect()
    };

    #[cfg(feature = "parallel")]
    let results: Vec<_> = match rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("geodes-worker-{i}"))
        .build()
    {
        Ok(pool) => pool.install(|| items.par_iter().map(run_one).collect()),
        Err(e) => {
            warn!(error = %e, "Could not build worker pool; running sequentially");
            items.iter().map(run_one).collect()
        }
    };

    reporter.report(Progress::BatchFinish);
    let cancelled = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::Cancelled)))
        .count();
    if cancelled > 0 {
        info!(cancelled, "Batch cancelled before all items started");
        reporter.message(format!("Cancelled: {cancelled} of {} items skipped", items.len()));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    fn id<T: ToString>(item: &T) -> String {
        item.to_string()
    }

    #[test]
    fn results_keep_input_order() {
        let items: Vec<u64> = (0..32).collect();
        let results = run_ordered(&items, 4, &CancellationToken::new(), &ProgressReporter::new(), id, |&n| {
            // Later items finish first.
            std::thread::sleep(Duration::from_millis(32 - n));
            Ok(n * 10)
        });
        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..32).map(|n| n * 10).collect::<Vec<_>>());
    }

    #[test]
    fn failures_stay_in_their_slot() {
        let items = ["a", "bad", "c"];
        let results = run_ordered(&items, 2, &CancellationToken::new(), &ProgressReporter::new(), id, |s| {
            if *s == "bad" {
                Err(EngineError::Internal("boom".into()))
            } else {
                Ok(s.to_uppercase())
            }
        });
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_deref().unwrap(), "A");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_deref().unwrap(), "C");
    }

    #[test]
    fn cancelled_items_are_reported_and_finished_ones_kept() {
        let token = CancellationToken::new();
        let items: Vec<usize> = (0..6).collect();
        let results = run_ordered(&items, 1, &token, &ProgressReporter::new(), id, |&n| {
            if n == 2 {
                token.cancel();
            }
            Ok(n)
        });
        assert_eq!(results[0].as_ref().unwrap(), &0);
        assert_eq!(results[2].as_ref().unwrap(), &2);
        assert!(results[3..].iter().all(|r| matches!(r, Err(EngineError::Cancelled))));
    }

    #[test]
    fn every_item_is_reported_with_its_status() {
        let finished = Mutex::new(Vec::new());
        let messages = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event: Progress| match event {
            Progress::ItemFinished { id, status } => finished.lock().unwrap().push((id, status)),
            Progress::Message(text) => messages.lock().unwrap().push(text),
            _ => {}
        }));
        let token = CancellationToken::new();
        let items = [1, 2, 3, 4];
        let results = run_ordered(&items, 1, &token, &reporter, |n| format!("s{n}"), |&n| {
            match n {
                2 => Err(EngineError::Internal("boom".into())),
                3 => {
                    token.cancel();
                    Ok(n)
                }
                _ => Ok(n),
            }
        });
        drop(reporter);
        assert_eq!(results.len(), 4);

        let mut finished = finished.into_inner().unwrap();
        finished.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            finished,
            vec![
                ("s1".to_string(), ItemStatus::Succeeded),
                ("s2".to_string(), ItemStatus::Failed),
                ("s3".to_string(), ItemStatus::Succeeded),
                ("s4".to_string(), ItemStatus::Cancelled),
            ]
        );
        assert_eq!(messages.into_inner().unwrap(), vec!["Cancelled: 1 of 4 items skipped"]);
    }
}
