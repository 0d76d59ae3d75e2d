//! Quote list and planning routes

use axum::{
    extract::{Extension, State},
    Json,
};

use offertedesk_shared::{begin_user_scope, Quote, QuoteStatus};

use crate::{auth::AuthUser, error::ApiError, state::AppState};

pub(crate) const QUOTE_COLUMNS: &str =
    "id, user_id, customer_name, status, total_cents, scheduled_for, created_at";

/// Jobs on the planning board: scheduled and not rejected, earliest first
///
/// The sort is stable, so jobs at the same moment keep their query order.
pub fn planned_jobs(quotes: Vec<Quote>) -> Vec<Quote> {
    let mut jobs: Vec<Quote> = quotes
        .into_iter()
        .filter(|quote| quote.scheduled_for.is_some())
        .filter(|quote| quote.status != QuoteStatus::Afgewezen.as_str())
        .collect();
    jobs.sort_by_key(|quote| quote.scheduled_for);
    jobs
}

/// All of the caller's quotes, newest first
pub async fn list_quotes(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<Quote>>, ApiError> {
    let mut tx = begin_user_scope(&state.pool, auth_user.user_id).await?;
    let quotes = sqlx::query_as::<_, Quote>(&format!(
        "SELECT {} FROM quotes WHERE user_id = $1 ORDER BY created_at DESC",
        QUOTE_COLUMNS
    ))
    .bind(auth_user.user_id.0)
    .fetch_all(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(Json(quotes))
}

/// Scheduled jobs for the planning calendar
pub async fn get_planning(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<Quote>>, ApiError> {
    let mut tx = begin_user_scope(&state.pool, auth_user.user_id).await?;
    let scheduled = sqlx::query_as::<_, Quote>(&format!(
        "SELECT {} FROM quotes \
         WHERE user_id = $1 AND scheduled_for IS NOT NULL AND status <> $2 \
         ORDER BY scheduled_for ASC",
        QUOTE_COLUMNS
    ))
    .bind(auth_user.user_id.0)
    .bind(QuoteStatus::Afgewezen.as_str())
    .fetch_all(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(Json(planned_jobs(scheduled)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn quote(customer: &str, status: QuoteStatus, scheduled_for: Option<OffsetDateTime>) -> Quote {
        Quote {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            customer_name: customer.to_string(),
            status: status.as_str().to_string(),
            total_cents: 125_000,
            scheduled_for,
            created_at: datetime!(2025-01-10 09:00 UTC),
        }
    }

    #[test]
    fn test_planning_drops_rejected_and_unscheduled() {
        let jobs = planned_jobs(vec![
            quote("De Vries", QuoteStatus::Afgewezen, Some(datetime!(2025-03-03 08:00 UTC))),
            quote("Bakker", QuoteStatus::Concept, None),
            quote("Jansen", QuoteStatus::Geaccepteerd, Some(datetime!(2025-03-05 08:00 UTC))),
            quote("Visser", QuoteStatus::Verzonden, Some(datetime!(2025-03-04 08:00 UTC))),
        ]);

        let customers: Vec<&str> = jobs.iter().map(|q| q.customer_name.as_str()).collect();
        assert_eq!(customers, ["Visser", "Jansen"]);
    }

    #[test]
    fn test_planning_earliest_first_and_stable() {
        let same = Some(datetime!(2025-04-01 07:30 UTC));
        let jobs = planned_jobs(vec![
            quote("Later", QuoteStatus::Verzonden, Some(datetime!(2025-05-01 07:30 UTC))),
            quote("Eerste", QuoteStatus::Concept, same),
            quote("Tweede", QuoteStatus::Geaccepteerd, same),
            quote("Vroegst", QuoteStatus::Concept, Some(datetime!(2024-12-31 23:00 UTC))),
        ]);

        let customers: Vec<&str> = jobs.iter().map(|q| q.customer_name.as_str()).collect();
        assert_eq!(customers, ["Vroegst", "Eerste", "Tweede", "Later"]);
    }

    #[test]
    fn test_planning_empty() {
        assert!(planned_jobs(Vec::new()).is_empty());
    }
}
