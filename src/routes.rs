use crate::{
    api::{attendance, jobs, payroll, shift_adjustment},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Option<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        60_000 / requests_per_min as u64
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()?;
    Some(Governor::new(&cfg))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let (Some(check_limiter), Some(query_limiter)) = (
        build_limiter(config.rate_check_per_min),
        build_limiter(config.rate_query_per_min),
    ) else {
        tracing::error!(
            check = config.rate_check_per_min,
            query = config.rate_query_per_min,
            "Invalid rate limit settings, refusing to register routes"
        );
        return;
    };
    // writes share the stricter limiter
    let check_limiter = Arc::new(check_limiter);
    let query_limiter = Arc::new(query_limiter);

    cfg.service(
        web::scope(&config.api_prefix)
            .service(
                web::scope("/attendance/{employee_id}")
                    // /attendance/{id}/status
                    .service(
                        web::resource("/status")
                            .wrap(query_limiter.clone())
                            .route(web::get().to(attendance::window_status)),
                    )
                    // /attendance/{id}/check
                    .service(
                        web::resource("/check")
                            .wrap(check_limiter.clone())
                            .route(web::post().to(attendance::submit_check)),
                    )
                    // /attendance/{id}/confirm
                    .service(
                        web::resource("/confirm")
                            .wrap(check_limiter.clone())
                            .route(web::post().to(attendance::confirm_entries)),
                    )
                    // /attendance/{id}/correction
                    .service(
                        web::resource("/correction")
                            .wrap(check_limiter.clone())
                            .route(web::put().to(attendance::manual_correction)),
                    )
                    // /attendance/{id}/processed
                    .service(
                        web::resource("/processed")
                            .wrap(query_limiter.clone())
                            .route(web::get().to(attendance::processed_attendance)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    // /payroll/{id}/summary
                    .service(
                        web::resource("/{employee_id}/summary")
                            .wrap(query_limiter.clone())
                            .route(web::get().to(payroll::payroll_summary)),
                    ),
            )
            .service(
                web::scope("/jobs")
                    // /jobs/aggregation
                    .service(
                        web::resource("/aggregation")
                            .wrap(query_limiter.clone())
                            .route(web::post().to(jobs::enqueue_aggregation)),
                    )
                    // /jobs/{job_id}
                    .service(
                        web::resource("/{job_id}")
                            .wrap(query_limiter.clone())
                            .route(web::get().to(jobs::job_status)),
                    ),
            )
            .service(
                web::scope("/shift-adjustments")
                    // /shift-adjustments/{id}/approve
                    .service(
                        web::resource("/{adjustment_id}/approve")
                            .wrap(check_limiter)
                            .route(web::put().to(shift_adjustment::approve_adjustment)),
                    ),
            ),
    );
}
