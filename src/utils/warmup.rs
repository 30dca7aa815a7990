use anyhow::Result;
use chrono::NaiveDate;
use futures::StreamExt;
use sqlx::MySqlPool;

use crate::service::AttendanceService;

/// Resolve a batch of schedules concurrently; failures are logged by the resolver.
async fn batch_prime(service: &AttendanceService, employee_ids: &[u64], date: NaiveDate) -> usize {
    let futures: Vec<_> = employee_ids
        .iter()
        .map(|id| service.prime_schedule(*id, date))
        .collect();

    futures::future::join_all(futures)
        .await
        .into_iter()
        .filter(Result::is_ok)
        .count()
}

/// Load today's shift windows for every employee with an assigned shift (batched)
pub async fn warmup_shift_windows(
    pool: &MySqlPool,
    service: &AttendanceService,
    date: NaiveDate,
    batch_size: usize,
) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (u64,)>(
        r#"
        SELECT employee_id
        FROM employee_shifts
        ORDER BY employee_id
        "#,
    )
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total_count = 0usize;
    let mut primed = 0usize;

    while let Some(row) = stream.next().await {
        let (employee_id,) = row?;
        batch.push(employee_id);
        total_count += 1;

        if batch.len() >= batch_size {
            primed += batch_prime(service, &batch, date).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        primed += batch_prime(service, &batch, date).await;
    }

    log::info!(
        "Shift window warmup complete: {} of {} employees for {}",
        primed,
        total_count,
        date
    );

    Ok(())
}
