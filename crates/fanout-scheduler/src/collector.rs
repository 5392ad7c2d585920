//! Ordered collection of job results.

use fanout_core::run::JobResult;
use fanout_core::{Error, Result};
use tokio::sync::Mutex;

/// Append-only result slots indexed by submission order.
///
/// Workers record results as they complete; [`ResultCollector::take`] hands
/// them back in submission order regardless of completion order.
pub struct ResultCollector {
    slots: Mutex<Vec<Option<JobResult>>>,
}

impl ResultCollector {
    pub fn new(len: usize) -> Self {
        Self {
            slots: Mutex::new(vec![None; len]),
        }
    }

    /// Record the result of the job at `index`. Each slot is written once.
    pub async fn record(&self, index: usize, result: JobResult) -> Result<()> {
        let mut slots = self.slots.lock().await;
        let len = slots.len();
        let slot = slots.get_mut(index).ok_or_else(|| {
            Error::Internal(format!("job index {index} out of range ({len} jobs)"))
        })?;
        if let Some(existing) = slot.as_ref() {
            return Err(Error::Internal(format!(
                "result for job {} recorded twice",
                existing.job_id
            )));
        }
        *slot = Some(result);
        Ok(())
    }

    pub async fn recorded(&self) -> usize {
        self.slots.lock().await.iter().filter(|s| s.is_some()).count()
    }

    /// Drain all results. Fails if any job has not settled.
    pub async fn take(&self) -> Result<Vec<JobResult>> {
        let mut slots = self.slots.lock().await;
        if let Some(missing) = slots.iter().position(Option::is_none) {
            return Err(Error::Internal(format!(
                "job at index {missing} never reported a result"
            )));
        }
        Ok(std::mem::take(&mut *slots).into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_core::matrix::JobSpec;

    fn job(index: usize) -> JobSpec {
        JobSpec::new(index, vec![("n".into(), index.to_string().as_str().into())])
    }

    #[tokio::test]
    async fn test_results_come_back_in_submission_order() {
        let jobs: Vec<_> = (0..3).map(job).collect();
        let collector = ResultCollector::new(3);

        collector.record(2, JobResult::skipped(&jobs[2])).await.unwrap();
        collector.record(0, JobResult::skipped(&jobs[0])).await.unwrap();
        assert_eq!(collector.recorded().await, 2);
        collector.record(1, JobResult::skipped(&jobs[1])).await.unwrap();

        let results = collector.take().await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.job_id.clone()).collect();
        let expected: Vec<_> = jobs.iter().map(|j| j.id().clone()).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_double_record_is_rejected() {
        let j = job(0);
        let collector = ResultCollector::new(1);
        collector.record(0, JobResult::skipped(&j)).await.unwrap();
        assert!(collector.record(0, JobResult::skipped(&j)).await.is_err());
        assert!(collector.record(5, JobResult::skipped(&j)).await.is_err());
    }

    #[tokio::test]
    async fn test_take_requires_every_result() {
        let collector = ResultCollector::new(2);
        collector.record(0, JobResult::skipped(&job(0))).await.unwrap();
        assert!(collector.take().await.is_err());
    }
}
