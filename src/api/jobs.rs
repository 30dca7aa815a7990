use actix_web::{HttpResponse, Responder, web};
use uuid::Uuid;

use crate::error::EngineError;
use crate::jobs::{AggregationJob, JobQueue, JobStatus};

/// Enqueue a long-range aggregation
#[utoipa::path(
    post,
    path = "/api/jobs/aggregation",
    request_body = AggregationJob,
    responses(
        (status = 202, description = "Job accepted; identical requests share an id", body = Object, example = json!({
            "job_id": "9b2f3c1e-5d0a-4f7e-8a57-1f2d3c4b5a69"
        })),
        (status = 400, description = "Range end before start")
    ),
    tag = "Jobs"
)]
pub async fn enqueue_aggregation(
    queue: web::Data<dyn JobQueue>,
    body: web::Json<AggregationJob>,
) -> actix_web::Result<impl Responder> {
    let job_id = queue.enqueue(body.into_inner()).await?;
    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "job_id": job_id.to_string()
    })))
}

/// Poll a job
#[utoipa::path(
    get,
    path = "/api/jobs/{job_id}",
    params(
        ("job_id", description = "Job ID returned on enqueue")
    ),
    responses(
        (status = 200, description = "Current status", body = JobStatus),
        (status = 404, description = "Unknown or expired job")
    ),
    tag = "Jobs"
)]
pub async fn job_status(
    queue: web::Data<dyn JobQueue>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let raw = path.into_inner();
    let job_id = Uuid::parse_str(&raw).map_err(|_| EngineError::NotFound(format!("job {raw}")))?;
    let status = queue
        .status(job_id)
        .await
        .ok_or_else(|| EngineError::NotFound(format!("job {raw}")))?;
    Ok(HttpResponse::Ok().json(status))
}
