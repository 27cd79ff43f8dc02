use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    routing::get,
};
use chrono::Utc;
use readagain_core::PageRequest;
use readagain_earnings::EarningsService;
use readagain_platform::{
    EarningsListQuery, EarningsListResponse, PayoutRequestedEvent, PayoutsListQuery,
    PayoutsListResponse, RedisBus, RequestPayoutRequest,
};
use serde_json::{Value, json};
use tracing::error;
use uuid::Uuid;

use crate::{auth::AuthenticatedAuthor, error::ApiError};

#[derive(Clone)]
pub struct AppState {
    pub earnings: EarningsService,
    pub bus: Option<RedisBus>,
}

pub fn router(state: AppState) -> Router {
    let author_routes = Router::new()
        .route("/earnings", get(list_earnings))
        .route("/earnings/summary", get(earnings_summary))
        .route("/earnings/overview", get(earnings_overview))
        .route("/earnings/books/{book_id}", get(book_sales))
        .route("/payouts", get(list_payouts).post(request_payout))
        .route("/payouts/{payout_id}", get(get_payout));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1/author", author_routes)
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn earnings_summary(
    State(state): State<AppState>,
    AuthenticatedAuthor(author_id): AuthenticatedAuthor,
) -> Result<Json<Value>, ApiError> {
    let summary = state.earnings.earnings_summary(author_id).await?;
    Ok(Json(json!({ "summary": summary })))
}

async fn earnings_overview(
    State(state): State<AppState>,
    AuthenticatedAuthor(author_id): AuthenticatedAuthor,
) -> Result<Json<Value>, ApiError> {
    let overview = state
        .earnings
        .earnings_overview(author_id, Utc::now())
        .await?;
    Ok(Json(json!({ "overview": overview })))
}

async fn book_sales(
    State(state): State<AppState>,
    AuthenticatedAuthor(author_id): AuthenticatedAuthor,
    book_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(book_id) = book_id?;
    let sales = state.earnings.book_sales(author_id, book_id).await?;
    Ok(Json(json!({ "sales": sales })))
}

async fn list_earnings(
    State(state): State<AppState>,
    AuthenticatedAuthor(author_id): AuthenticatedAuthor,
    query: Result<Query<EarningsListQuery>, QueryRejection>,
) -> Result<Json<EarningsListResponse>, ApiError> {
    let Query(query) = query?;
    let page = PageRequest::normalized(query.page, query.limit);

    let earnings = state
        .earnings
        .list_earnings(author_id, page, query.status.as_deref())
        .await?;

    Ok(Json(EarningsListResponse {
        earnings: earnings.items,
        total: earnings.total,
        page: page.page,
        limit: page.limit,
    }))
}

async fn list_payouts(
    State(state): State<AppState>,
    AuthenticatedAuthor(author_id): AuthenticatedAuthor,
    query: Result<Query<PayoutsListQuery>, QueryRejection>,
) -> Result<Json<PayoutsListResponse>, ApiError> {
    let Query(query) = query?;
    let page = PageRequest::normalized(query.page, query.limit);

    let payouts = state.earnings.list_payouts(author_id, page).await?;

    Ok(Json(PayoutsListResponse {
        payouts: payouts.items,
        total: payouts.total,
        page: page.page,
        limit: page.limit,
    }))
}

async fn request_payout(
    State(state): State<AppState>,
    AuthenticatedAuthor(author_id): AuthenticatedAuthor,
    payload: Result<Json<RequestPayoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(payload) = payload?;

    let payout = state
        .earnings
        .request_payout(
            author_id,
            payload.amount,
            &payload.method,
            &payload.account_details,
        )
        .await?;

    if let Some(bus) = &state.bus
        && let Err(err) = bus
            .publish_payout_requested(&PayoutRequestedEvent::from(&payout))
            .await
    {
        error!("failed to publish payout {}: {err:#}", payout.id);
    }

    Ok((StatusCode::CREATED, Json(json!({ "payout": payout }))))
}

async fn get_payout(
    State(state): State<AppState>,
    AuthenticatedAuthor(author_id): AuthenticatedAuthor,
    payout_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(payout_id) = payout_id?;
    let payout = state.earnings.get_payout(author_id, payout_id).await?;
    Ok(Json(json!({ "payout": payout })))
}
