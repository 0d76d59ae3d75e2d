//! Dashboard summary

use axum::{
    extract::{Extension, State},
    Json,
};
use serde::Serialize;
use time::{Date, Month, OffsetDateTime, Time};

use offertedesk_shared::{begin_user_scope, Quote, QuoteStatus};

use super::quotes::QUOTE_COLUMNS;
use crate::{auth::AuthUser, error::ApiError, state::AppState};

/// Months shown in the revenue chart, current month included
pub const REVENUE_MONTHS: i32 = 6;

const RECENT_QUOTES: i64 = 5;

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mrt", "Apr", "Mei", "Jun", "Jul", "Aug", "Sep", "Okt", "Nov", "Dec",
];

#[derive(Debug, Serialize)]
pub struct DashboardProfile {
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub credits: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub active_quotes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenueBucket {
    pub name: &'static str,
    pub year: i32,
    pub month: u8,
    pub total_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub profile: DashboardProfile,
    pub stats: DashboardStats,
    pub recent_quotes: Vec<Quote>,
    pub agenda: Vec<Quote>,
    pub revenue_chart: Vec<RevenueBucket>,
}

/// Month index counted from year 0, so months can be stepped across years
fn month_index(year: i32, month: Month) -> i32 {
    year * 12 + i32::from(u8::from(month)) - 1
}

/// First instant of the oldest month in the chart window
pub fn revenue_window_start(today: Date) -> OffsetDateTime {
    let oldest = month_index(today.year(), today.month()) - (REVENUE_MONTHS - 1);
    let year = oldest.div_euclid(12);
    let month = Month::try_from(u8::try_from(oldest.rem_euclid(12) + 1).unwrap_or(1))
        .unwrap_or(Month::January);
    Date::from_calendar_date(year, month, 1)
        .unwrap_or(today)
        .with_time(Time::MIDNIGHT)
        .assume_utc()
}

/// Sum accepted-quote totals into six (year, month) buckets, oldest first
///
/// Rows outside the window are dropped rather than folded into a bucket
/// that shares their month name.
pub fn revenue_buckets(today: Date, rows: &[(OffsetDateTime, i64)]) -> Vec<RevenueBucket> {
    let current = month_index(today.year(), today.month());
    let mut buckets: Vec<RevenueBucket> = (0..REVENUE_MONTHS)
        .rev()
        .map(|back| {
            let index = current - back;
            let month0 = index.rem_euclid(12);
            RevenueBucket {
                name: MONTH_LABELS[month0 as usize],
                year: index.div_euclid(12),
                month: u8::try_from(month0 + 1).unwrap_or(1),
                total_cents: 0,
            }
        })
        .collect();

    for (created_at, total_cents) in rows {
        let (year, month) = (created_at.year(), u8::from(created_at.month()));
        if let Some(bucket) = buckets
            .iter_mut()
            .find(|b| b.year == year && b.month == month)
        {
            bucket.total_cents += total_cents;
        }
    }

    buckets
}

/// Everything the dashboard home page shows
pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let user_id = auth_user.user_id.0;
    let now = OffsetDateTime::now_utc();
    let mut tx = begin_user_scope(&state.pool, auth_user.user_id).await?;

    let profile: Option<(Option<String>, Option<String>, i64)> =
        sqlx::query_as("SELECT full_name, company_name, credits FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
    let (full_name, company_name, credits) = profile.unwrap_or((None, None, 0));

    let (active_quotes,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM quotes WHERE user_id = $1 AND status = $2")
            .bind(user_id)
            .bind(QuoteStatus::Verzonden.as_str())
            .fetch_one(&mut *tx)
            .await?;

    let recent_quotes = sqlx::query_as::<_, Quote>(&format!(
        "SELECT {} FROM quotes WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        QUOTE_COLUMNS
    ))
    .bind(user_id)
    .bind(RECENT_QUOTES)
    .fetch_all(&mut *tx)
    .await?;

    let agenda = sqlx::query_as::<_, Quote>(&format!(
        "SELECT {} FROM quotes \
         WHERE user_id = $1 AND scheduled_for > $2 AND status <> $3 \
         ORDER BY scheduled_for ASC",
        QUOTE_COLUMNS
    ))
    .bind(user_id)
    .bind(now)
    .bind(QuoteStatus::Afgewezen.as_str())
    .fetch_all(&mut *tx)
    .await?;

    let revenue_rows: Vec<(OffsetDateTime, i64)> = sqlx::query_as(
        "SELECT created_at, total_cents FROM quotes \
         WHERE user_id = $1 AND status = $2 AND created_at >= $3",
    )
    .bind(user_id)
    .bind(QuoteStatus::Geaccepteerd.as_str())
    .bind(revenue_window_start(now.date()))
    .fetch_all(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(Json(DashboardResponse {
        profile: DashboardProfile {
            full_name,
            company_name,
            credits,
        },
        stats: DashboardStats { active_quotes },
        recent_quotes,
        agenda,
        revenue_chart: revenue_buckets(now.date(), &revenue_rows),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn test_buckets_cross_year_boundary() {
        let buckets = revenue_buckets(date!(2025 - 02 - 14), &[]);
        let names: Vec<&str> = buckets.iter().map(|b| b.name).collect();
        assert_eq!(names, ["Sep", "Okt", "Nov", "Dec", "Jan", "Feb"]);
        assert_eq!(buckets[0].year, 2024);
        assert_eq!(buckets[5].year, 2025);
    }

    #[test]
    fn test_revenue_summed_per_month() {
        let rows = [
            (datetime!(2025-02-01 10:00 UTC), 150_000),
            (datetime!(2025-02-20 10:00 UTC), 50_000),
            (datetime!(2024-11-05 10:00 UTC), 80_000),
        ];
        let buckets = revenue_buckets(date!(2025 - 02 - 14), &rows);
        assert_eq!(buckets[5].total_cents, 200_000);
        assert_eq!(buckets[2].name, "Nov");
        assert_eq!(buckets[2].total_cents, 80_000);
    }

    #[test]
    fn test_same_month_name_from_other_year_is_dropped() {
        let rows = [(datetime!(2024-02-10 10:00 UTC), 99_900)];
        let buckets = revenue_buckets(date!(2025 - 02 - 14), &rows);
        assert!(buckets.iter().all(|b| b.total_cents == 0));
    }

    #[test]
    fn test_window_start() {
        assert_eq!(
            revenue_window_start(date!(2025 - 02 - 14)),
            datetime!(2024-09-01 0:00 UTC)
        );
        assert_eq!(
            revenue_window_start(date!(2025 - 06 - 30)),
            datetime!(2025-01-01 0:00 UTC)
        );
    }
}
