use crate::models::SubmissionResult;

/// Extension points the engine reports progress to.
pub(crate) trait Observer: Send + Sync {
    fn fetch_started(&self, source: &str);
    fn fetch_finished(&self, source: &str, items: usize);
    /// A secondary source was used because the primary one failed or was empty.
    fn fallback_taken(&self, source: &str, reason: &str);
    fn item_skipped(&self, subject: &str, reason: &str);
    fn batch_started(&self, items: usize, days: usize);
    fn submission_finished(&self, result: &SubmissionResult);
    fn batch_finished(&self, succeeded: usize, failed: usize);
}

/// Forwards every event to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct LogObserver;

impl Observer for LogObserver {
    fn fetch_started(&self, source: &str) {
        log::debug!("Fetching {source}");
    }

    fn fetch_finished(&self, source: &str, items: usize) {
        log::debug!("Fetched {items} items from {source}");
    }

    fn fallback_taken(&self, source: &str, reason: &str) {
        log::warn!("Falling back for {source}: {reason}");
    }

    fn item_skipped(&self, subject: &str, reason: &str) {
        log::debug!("Skipping {subject}: {reason}");
    }

    fn batch_started(&self, items: usize, days: usize) {
        log::info!("Submitting {items} entries over {days} days");
    }

    fn submission_finished(&self, result: &SubmissionResult) {
        if result.success {
            log::info!("Task #{} on {}: {}", result.task_id, result.date, result.message);
        } else {
            log::warn!("Task #{} on {}: {}", result.task_id, result.date, result.message);
        }
    }

    fn batch_finished(&self, succeeded: usize, failed: usize) {
        log::info!("Batch finished: {succeeded} succeeded, {failed} failed");
    }
}
