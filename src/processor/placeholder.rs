use std::time::Duration;

use crate::state_machine::{StageOutcome, WorkItem};

/// Stand-in for a stage whose business logic does not exist yet: waits for
/// `delay` and succeeds.
#[derive(Debug, Clone)]
pub struct PlaceholderProcessor {
    label: &'static str,
    delay: Duration,
}

impl PlaceholderProcessor {
    pub fn new(label: &'static str, delay: Duration) -> Self {
        Self { label, delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn process(&self, item: &WorkItem) -> StageOutcome {
        tracing::debug!(item_id = %item.id, step = self.label, delay_ms = self.delay.as_millis() as u64, "simulating work");
        tokio::time::sleep(self.delay).await;
        StageOutcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn waits_for_delay_then_succeeds() {
        let step = PlaceholderProcessor::new("extraction", Duration::from_secs(3));
        let item = WorkItem::new("Scan");
        let started = tokio::time::Instant::now();

        assert_eq!(step.process(&item).await, StageOutcome::Success);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
