use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use moka::future::Cache;
use serde::Serialize;
use tracing::{error, instrument, warn};
use utoipa::ToSchema;

use crate::config::EngineSettings;
use crate::engine::aggregator::ShiftSchedule;
use crate::error::{EngineError, EngineResult};
use crate::model::overtime::OvertimeWindow;
use crate::model::shift::{ShiftDefinition, TimeWindow};
use crate::provider::{HolidayProvider, OvertimeProvider, ShiftCatalog};
use crate::utils::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShiftSource {
    Adjustment,
    Assigned,
    SystemDefault,
}

/// The effective schedule of one employee on one attendance date.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DaySchedule {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub shift: ShiftDefinition,
    pub source: ShiftSource,
    /// The shift's window on `date`, present even on days off for audit.
    pub regular_window: TimeWindow,
    pub overtime_window: Option<OvertimeWindow>,
    pub is_work_day: bool,
    pub is_holiday: bool,
    pub is_day_off: bool,
    /// A holiday or overtime lookup fell back to its default.
    pub degraded: bool,
}

impl DaySchedule {
    /// The regular window, if the date is scheduled work.
    pub fn working_window(&self) -> Option<TimeWindow> {
        (!self.is_day_off).then_some(self.regular_window)
    }
}

type CacheKey = (u64, NaiveDate);

/// Resolves shift windows, shared by every request through one instance so
/// there is exactly one cache to invalidate.
pub struct ShiftWindowResolver {
    catalog: Arc<dyn ShiftCatalog>,
    holidays: Arc<dyn HolidayProvider>,
    overtime: Arc<dyn OvertimeProvider>,
    retry: RetryPolicy,
    settings: EngineSettings,
    default_shift_code: Option<String>,
    cache: Cache<CacheKey, DaySchedule>,
}

impl ShiftWindowResolver {
    pub fn new(
        catalog: Arc<dyn ShiftCatalog>,
        holidays: Arc<dyn HolidayProvider>,
        overtime: Arc<dyn OvertimeProvider>,
        retry: RetryPolicy,
        settings: EngineSettings,
        default_shift_code: Option<String>,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(50_000)
            .time_to_live(settings.shift_cache_ttl)
            .build();
        Self {
            catalog,
            holidays,
            overtime,
            retry,
            settings,
            default_shift_code,
            cache,
        }
    }

    /// Schedule governing `at`. An instant still inside the previous day's
    /// overnight shift (plus check-out grace) belongs to the previous date.
    #[instrument(skip(self))]
    pub async fn resolve(&self, employee_id: u64, at: NaiveDateTime) -> EngineResult<DaySchedule> {
        let today = self.resolve_day(employee_id, at.date()).await?;

        if let Some(yesterday) = at.date().pred_opt() {
            let previous = self.resolve_day(employee_id, yesterday).await?;
            if self.still_inside(&previous, at) && at < today.regular_window.start - self.settings.early_grace {
                return Ok(previous);
            }
        }

        Ok(today)
    }

    fn still_inside(&self, previous: &DaySchedule, at: NaiveDateTime) -> bool {
        let grace = self.settings.checkout_grace;
        let regular = previous
            .working_window()
            .filter(|_| previous.shift.is_overnight())
            .is_some_and(|w| at <= w.end + grace);
        let overtime = previous
            .overtime_window
            .is_some_and(|ot| ot.end().date() > previous.date && at <= ot.end() + grace);
        regular || overtime
    }

    /// Schedule for a calendar date, served from the cache when possible.
    pub async fn resolve_day(&self, employee_id: u64, date: NaiveDate) -> EngineResult<DaySchedule> {
        let key = (employee_id, date);
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        let schedule = self.load_day(employee_id, date).await?;
        // fallbacks are re-attempted on the next call
        if !schedule.degraded {
            self.cache.insert(key, schedule.clone()).await;
        }
        Ok(schedule)
    }

    async fn load_day(&self, employee_id: u64, date: NaiveDate) -> EngineResult<DaySchedule> {
        let (shift, source) = self.effective_shift(employee_id, date).await?;

        let holidays = &self.holidays;
        let observes_eve = shift.observes_holiday_eve();
        let holiday = self
            .retry
            .call_with_fallback("holiday lookup", false, move || {
                holidays.is_holiday(date, observes_eve)
            })
            .await;

        let overtime = &self.overtime;
        let overtime_window = self
            .retry
            .call_with_fallback("overtime lookup", None, move || {
                overtime.approved_overtime(employee_id, date)
            })
            .await;

        let degraded = holiday.degraded || overtime_window.degraded;
        if degraded {
            warn!(employee_id, %date, "Shift window resolved with collaborator fallback");
        }

        let is_work_day = shift.is_work_day(date);
        Ok(DaySchedule {
            employee_id,
            date,
            regular_window: shift.window_on(date),
            shift,
            source,
            overtime_window: overtime_window.value,
            is_work_day,
            is_holiday: holiday.value,
            is_day_off: !is_work_day || holiday.value,
            degraded,
        })
    }

    /// Approved adjustment first, then the assignment, then the system default.
    async fn effective_shift(&self, employee_id: u64, date: NaiveDate) -> EngineResult<(ShiftDefinition, ShiftSource)> {
        let catalog = &self.catalog;
        let adjustment = self
            .retry
            .run("shift adjustment lookup", move || catalog.approved_adjustment(employee_id, date))
            .await?;
        match adjustment {
            Some(shift) => Ok((shift, ShiftSource::Adjustment)),
            None => self.base_shift(employee_id, date).await,
        }
    }

    /// The employee's standing assignment, or the configured system default.
    async fn base_shift(&self, employee_id: u64, date: NaiveDate) -> EngineResult<(ShiftDefinition, ShiftSource)> {
        let catalog = &self.catalog;
        let assigned = self
            .retry
            .run("shift assignment lookup", move || catalog.assigned_shift(employee_id))
            .await?;
        if let Some(shift) = assigned {
            return Ok((shift, ShiftSource::Assigned));
        }

        let missing = EngineError::Configuration(format!("no shift assigned to employee {employee_id}"));
        let Some(code) = self.default_shift_code.as_deref() else {
            error!(employee_id, %date, error = %missing, "No resolvable shift and no system default");
            return Err(missing);
        };

        match catalog.shift_by_code(code).await? {
            Some(shift) => {
                error!(employee_id, %date, error = %missing, default_shift = code, "Falling back to system default shift");
                Ok((shift, ShiftSource::SystemDefault))
            }
            None => {
                error!(employee_id, %date, default_shift = code, "System default shift does not exist");
                Err(EngineError::Configuration(format!(
                    "no shift assigned to employee {employee_id} and default shift {code} is missing"
                )))
            }
        }
    }

    /// Shifts governing every date in `[start, end]`, for range aggregation.
    pub async fn shift_schedule(&self, employee_id: u64, start: NaiveDate, end: NaiveDate) -> EngineResult<ShiftSchedule> {
        let (assigned, _) = self.base_shift(employee_id, start).await?;
        let catalog = &self.catalog;
        let adjustments = self
            .retry
            .run("shift adjustment lookup", move || {
                catalog.approved_adjustments_between(employee_id, start, end)
            })
            .await?;
        Ok(ShiftSchedule { assigned, adjustments })
    }

    /// Drops cached schedules touched by an approved adjustment. The next date
    /// is cleared too, since its overnight look-back reads this one.
    pub async fn invalidate(&self, employee_id: u64, date: NaiveDate) {
        self.cache.invalidate(&(employee_id, date)).await;
        if let Some(next) = date.succ_opt() {
            self.cache.invalidate(&(employee_id, next)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCatalog, FakeHolidays, FakeOvertime, at, date, shift};
    use crate::model::shift::WorkDays;
    use chrono::Duration;

    fn resolver(catalog: FakeCatalog, holidays: FakeHolidays, overtime: FakeOvertime) -> ShiftWindowResolver {
        ShiftWindowResolver::new(
            Arc::new(catalog),
            Arc::new(holidays),
            Arc::new(overtime),
            RetryPolicy::immediate(2),
            EngineSettings::default(),
            None,
        )
    }

    #[actix_web::test]
    async fn adjustment_overrides_assignment() {
        let catalog = FakeCatalog::assigned(1, shift("A1", (8, 0), (17, 0)));
        catalog.add_adjustment(1, date(2026, 3, 10), shift("N1", (22, 0), (6, 0)));
        let r = resolver(catalog, FakeHolidays::none(), FakeOvertime::none());

        let adjusted = r.resolve_day(1, date(2026, 3, 10)).await.unwrap();
        assert_eq!(adjusted.source, ShiftSource::Adjustment);
        assert_eq!(adjusted.shift.code, "N1");
        assert_eq!(adjusted.regular_window.end, at(2026, 3, 11, 6, 0));

        let normal = r.resolve_day(1, date(2026, 3, 11)).await.unwrap();
        assert_eq!(normal.source, ShiftSource::Assigned);
        assert_eq!(normal.regular_window.start, at(2026, 3, 11, 8, 0));
    }

    #[actix_web::test]
    async fn weekend_and_holiday_are_days_off() {
        let holidays = FakeHolidays::on(&[date(2026, 3, 11)]);
        let r = resolver(FakeCatalog::assigned(1, shift("A1", (8, 0), (17, 0))), holidays, FakeOvertime::none());

        let holiday = r.resolve_day(1, date(2026, 3, 11)).await.unwrap();
        assert!(holiday.is_holiday && holiday.is_day_off && holiday.is_work_day);
        assert!(holiday.working_window().is_none());

        // 2026-03-14 is a Saturday
        let saturday = r.resolve_day(1, date(2026, 3, 14)).await.unwrap();
        assert!(!saturday.is_work_day && saturday.is_day_off && !saturday.is_holiday);
    }

    #[actix_web::test]
    async fn holiday_eve_shift_observes_day_before() {
        let holidays = FakeHolidays::on(&[date(2026, 3, 11)]);
        let r = resolver(FakeCatalog::assigned(1, shift("104", (14, 0), (23, 0))), holidays, FakeOvertime::none());

        assert!(r.resolve_day(1, date(2026, 3, 10)).await.unwrap().is_holiday);
        assert!(!r.resolve_day(1, date(2026, 3, 11)).await.unwrap().is_holiday);
    }

    #[actix_web::test]
    async fn missing_shift_is_configuration_error() {
        let r = resolver(FakeCatalog::empty(), FakeHolidays::none(), FakeOvertime::none());
        let err = r.resolve(9, at(2026, 3, 10, 8, 0)).await.unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[actix_web::test]
    async fn system_default_is_used_when_configured() {
        let catalog = FakeCatalog::empty();
        catalog.add_definition(shift("DEF", (9, 0), (18, 0)));
        let r = ShiftWindowResolver::new(
            Arc::new(catalog),
            Arc::new(FakeHolidays::none()),
            Arc::new(FakeOvertime::none()),
            RetryPolicy::immediate(1),
            EngineSettings::default(),
            Some("DEF".into()),
        );
        let day = r.resolve_day(9, date(2026, 3, 10)).await.unwrap();
        assert_eq!(day.source, ShiftSource::SystemDefault);
        assert_eq!(day.shift.code, "DEF");
    }

    #[actix_web::test]
    async fn early_morning_belongs_to_previous_overnight_shift() {
        let mut night = shift("N1", (22, 0), (6, 0));
        night.work_days = WorkDays::EVERY_DAY;
        let r = resolver(FakeCatalog::assigned(1, night), FakeHolidays::none(), FakeOvertime::none());

        let day = r.resolve(1, at(2026, 3, 11, 5, 30)).await.unwrap();
        assert_eq!(day.date, date(2026, 3, 10));
        assert_eq!(day.regular_window.end - day.regular_window.start, Duration::hours(8));

        let evening = r.resolve(1, at(2026, 3, 11, 21, 30)).await.unwrap();
        assert_eq!(evening.date, date(2026, 3, 11));
    }

    #[actix_web::test]
    async fn unavailable_holiday_calendar_assumes_working_day() {
        let r = resolver(
            FakeCatalog::assigned(1, shift("A1", (8, 0), (17, 0))),
            FakeHolidays::failing(),
            FakeOvertime::none(),
        );
        let day = r.resolve_day(1, date(2026, 3, 10)).await.unwrap();
        assert!(day.degraded);
        assert!(!day.is_holiday && !day.is_day_off);
    }

    #[actix_web::test]
    async fn unavailable_overtime_service_assumes_no_overtime() {
        let r = resolver(
            FakeCatalog::assigned(1, shift("A1", (8, 0), (17, 0))),
            FakeHolidays::none(),
            FakeOvertime::failing(),
        );
        let day = r.resolve_day(1, date(2026, 3, 10)).await.unwrap();
        assert!(day.degraded);
        assert!(day.overtime_window.is_none());
        assert!(day.working_window().is_some());
    }

    #[actix_web::test]
    async fn range_schedule_carries_adjustments() {
        let catalog = FakeCatalog::assigned(1, shift("A1", (8, 0), (17, 0)));
        catalog.add_adjustment(1, date(2026, 3, 12), shift("B2", (12, 0), (21, 0)));
        let r = resolver(catalog, FakeHolidays::none(), FakeOvertime::none());

        let schedule = r.shift_schedule(1, date(2026, 3, 9), date(2026, 3, 15)).await.unwrap();
        assert_eq!(schedule.for_date(date(2026, 3, 11)).code, "A1");
        assert_eq!(schedule.for_date(date(2026, 3, 12)).code, "B2");
        assert_eq!(schedule.adjustments.len(), 1);
    }

    #[actix_web::test]
    async fn approval_invalidates_cached_schedule() {
        let catalog = Arc::new(FakeCatalog::assigned(1, shift("A1", (8, 0), (17, 0))));
        let r = ShiftWindowResolver::new(
            catalog.clone(),
            Arc::new(FakeHolidays::none()),
            Arc::new(FakeOvertime::none()),
            RetryPolicy::immediate(1),
            EngineSettings::default(),
            None,
        );
        let d = date(2026, 3, 10);
        assert_eq!(r.resolve_day(1, d).await.unwrap().shift.code, "A1");

        catalog.add_adjustment(1, d, shift("B2", (12, 0), (21, 0)));
        assert_eq!(r.resolve_day(1, d).await.unwrap().shift.code, "A1");

        r.invalidate(1, d).await;
        assert_eq!(r.resolve_day(1, d).await.unwrap().shift.code, "B2");
    }
}
