use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::service::{AttendanceService, ProcessedRange};

/// Long-range aggregation request. Also the deduplication key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct AggregationJob {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed { result: ProcessedRange },
    Failed { error: String },
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Re-enqueueing a job that is pending, running or completed returns its existing id.
    async fn enqueue(&self, job: AggregationJob) -> EngineResult<Uuid>;

    async fn status(&self, job_id: Uuid) -> Option<JobStatus>;
}

/// Runs aggregation jobs on the actix runtime; statuses expire after a TTL.
#[derive(Clone)]
pub struct InMemoryJobQueue {
    service: Arc<AttendanceService>,
    statuses: Cache<Uuid, JobStatus>,
    ids: Cache<AggregationJob, Uuid>,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

impl InMemoryJobQueue {
    pub fn new(service: Arc<AttendanceService>, status_ttl: Duration) -> Self {
        Self {
            service,
            statuses: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(status_ttl)
                .build(),
            ids: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(status_ttl)
                .build(),
            clock: local_now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    fn spawn(&self, job_id: Uuid, job: AggregationJob) {
        let service = self.service.clone();
        let statuses = self.statuses.clone();
        let now = (self.clock)();

        actix_web::rt::spawn(async move {
            statuses.insert(job_id, JobStatus::Running).await;
            let status = match service
                .processed_attendance(job.employee_id, job.start, job.end, now)
                .await
            {
                Ok(result) => {
                    info!(%job_id, employee_id = job.employee_id, days = result.days.len(), "Aggregation job completed");
                    JobStatus::Completed { result }
                }
                Err(e) => {
                    error!(%job_id, employee_id = job.employee_id, error = %e, "Aggregation job failed");
                    JobStatus::Failed { error: e.to_string() }
                }
            };
            statuses.insert(job_id, status).await;
        });
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: AggregationJob) -> EngineResult<Uuid> {
        if job.end < job.start {
            return Err(EngineError::BadRequest(format!(
                "range end {} is before start {}",
                job.end, job.start
            )));
        }

        let entry = self.ids.entry(job).or_insert_with(async { Uuid::new_v4() }).await;
        let mut job_id = *entry.value();
        if !entry.is_fresh() {
            match self.statuses.get(&job_id).await {
                Some(JobStatus::Failed { .. }) | None => {
                    job_id = Uuid::new_v4();
                    self.ids.insert(job, job_id).await;
                }
                Some(_) => return Ok(job_id),
            }
        }

        self.statuses.insert(job_id, JobStatus::Pending).await;
        info!(%job_id, employee_id = job.employee_id, start = %job.start, end = %job.end, "Aggregation job enqueued");
        self.spawn(job_id, job);
        Ok(job_id)
    }

    async fn status(&self, job_id: Uuid) -> Option<JobStatus> {
        self.statuses.get(&job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::service::Collaborators;
    use crate::testing::{FakeAttendanceStore, FakeCatalog, FakeHolidays, FakeLeave, FakeOvertime, at, date, shift};
    use crate::utils::retry::RetryPolicy;

    fn fixed_now() -> NaiveDateTime {
        at(2026, 3, 31, 12, 0)
    }

    fn queue(catalog: FakeCatalog) -> InMemoryJobQueue {
        let service = AttendanceService::new(
            Collaborators {
                catalog: Arc::new(catalog),
                holidays: Arc::new(FakeHolidays::none()),
                leave: Arc::new(FakeLeave::none()),
                overtime: Arc::new(FakeOvertime::none()),
            },
            Arc::new(FakeAttendanceStore::new()),
            RetryPolicy::immediate(1),
            EngineSettings::default(),
            None,
        );
        InMemoryJobQueue::new(Arc::new(service), Duration::from_secs(60)).with_clock(fixed_now)
    }

    async fn settle(queue: &InMemoryJobQueue, job_id: Uuid) -> JobStatus {
        for _ in 0..200 {
            match queue.status(job_id).await {
                Some(JobStatus::Pending) | Some(JobStatus::Running) | None => {
                    actix_web::rt::time::sleep(Duration::from_millis(5)).await;
                }
                Some(done) => return done,
            }
        }
        panic!("job {job_id} never finished");
    }

    fn march(employee_id: u64) -> AggregationJob {
        AggregationJob {
            employee_id,
            start: date(2026, 3, 1),
            end: date(2026, 3, 31),
        }
    }

    #[actix_web::test]
    async fn completed_job_is_reused() {
        let q = queue(FakeCatalog::assigned(1, shift("A1", (8, 0), (17, 0))));
        let id = q.enqueue(march(1)).await.unwrap();
        let JobStatus::Completed { result } = settle(&q, id).await else {
            panic!("job should complete");
        };
        assert_eq!(result.days.len(), 31);

        assert_eq!(q.enqueue(march(1)).await.unwrap(), id);
        assert_ne!(q.enqueue(march(2)).await.unwrap(), id);
    }

    #[actix_web::test]
    async fn failed_job_keeps_error_and_can_be_retried() {
        let q = queue(FakeCatalog::empty());
        let id = q.enqueue(march(4)).await.unwrap();
        let JobStatus::Failed { error } = settle(&q, id).await else {
            panic!("job should fail");
        };
        assert!(error.contains("no shift assigned"));

        let retried = q.enqueue(march(4)).await.unwrap();
        assert_ne!(retried, id);
    }

    #[actix_web::test]
    async fn inverted_range_is_rejected() {
        let q = queue(FakeCatalog::empty());
        let job = AggregationJob {
            employee_id: 1,
            start: date(2026, 3, 10),
            end: date(2026, 3, 1),
        };
        assert!(matches!(q.enqueue(job).await, Err(EngineError::BadRequest(_))));
    }
}
