/// How one batch item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Succeeded,
    Failed,
    /// The item never started because the run was cancelled.
    Cancelled,
}

#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    BatchStart { items: u64 },
    /// Emitted once per item, in completion order.
    ItemFinished { id: String, status: ItemStatus },
    BatchFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Fan-out point for [`Progress`] events; silent unless given a callback.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// Opens a named phase that finishes when the returned guard drops.
    pub fn phase(&self, name: &'static str) -> PhaseGuard<'_, 'a> {
        self.report(Progress::PhaseStart { name });
        PhaseGuard { reporter: self }
    }

    pub fn message(&self, text: impl Into<String>) {
        if self.callback.is_some() {
            self.report(Progress::Message(text.into()));
        }
    }
}

#[must_use = "the phase finishes as soon as the guard drops"]
pub struct PhaseGuard<'r, 'a> {
    reporter: &'r ProgressReporter<'a>,
}

impl Drop for PhaseGuard<'_, '_> {
    fn drop(&mut self) {
        self.reporter.report(Progress::PhaseFinish);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording(seen: &Mutex<Vec<String>>) -> ProgressReporter<'_> {
        ProgressReporter::with_callback(Box::new(move |event: Progress| {
            let tag = match event {
                Progress::PhaseStart { name } => name.to_string(),
                Progress::PhaseFinish => "end".to_string(),
                Progress::BatchStart { items } => format!("batch:{items}"),
                Progress::ItemFinished { id, status } => format!("{id}:{status:?}"),
                Progress::BatchFinish => "batch-end".to_string(),
                Progress::Message(text) => text,
            };
            seen.lock().unwrap().push(tag);
        }))
    }

    #[test]
    fn phase_guard_closes_the_phase_on_drop() {
        let seen = Mutex::new(Vec::new());
        let reporter = recording(&seen);
        {
            let _phase = reporter.phase("Computing Descriptors");
            reporter.report(Progress::BatchStart { items: 1 });
            reporter.report(Progress::ItemFinished {
                id: "1db1".into(),
                status: ItemStatus::Failed,
            });
            reporter.report(Progress::BatchFinish);
        }
        reporter.message("after");
        drop(reporter);
        assert_eq!(
            seen.into_inner().unwrap(),
            vec!["Computing Descriptors", "batch:1", "1db1:Failed", "batch-end", "end", "after"]
        );
    }

    #[test]
    fn phase_finishes_even_on_early_return() {
        let seen = Mutex::new(Vec::new());
        let reporter = recording(&seen);
        let work = || -> Result<(), ()> {
            let _phase = reporter.phase("Aligning Structures");
            Err(())
        };
        assert!(work().is_err());
        drop(reporter);
        assert_eq!(seen.into_inner().unwrap(), vec!["Aligning Structures", "end"]);
    }

    #[test]
    fn silent_reporter_ignores_events() {
        let reporter = ProgressReporter::new();
        let _phase = reporter.phase("unheard");
        reporter.message("nobody listens");
    }
}
