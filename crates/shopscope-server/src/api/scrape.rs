use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;
use shopscope_core::ListingRecord;
use shopscope_scraper::ScraperError;

use crate::middleware::RequestId;

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ScrapeRequest {
    url: String,
}

/// Runs one scrape and returns the record as-is.
///
/// Blocked or unreachable listings still answer 200 with every field set to
/// `"N/A"`; only bad input and misconfiguration are errors.
pub(super) async fn scrape_listing(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<Json<ListingRecord>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        ApiError::new(req_id.0.clone(), "bad_request", rejection.body_text())
    })?;

    tracing::info!(
        request_id = %req_id.0,
        url = %request.url,
        fetcher = state.scraper.fetcher_name(),
        "scrape requested"
    );

    state
        .scraper
        .scrape(&request.url)
        .await
        .map(Json)
        .map_err(|e| map_scraper_error(req_id.0, &e))
}

fn map_scraper_error(request_id: String, error: &ScraperError) -> ApiError {
    match error {
        ScraperError::InvalidUrl { .. } => ApiError::new(request_id, "bad_request", error.to_string()),
        ScraperError::Config(_) => {
            tracing::error!(error = %error, "scrape aborted by configuration error");
            ApiError::new(request_id, "config_error", error.to_string())
        }
        _ => {
            tracing::error!(error = %error, "scrape failed");
            ApiError::new(request_id, "internal_error", "scrape failed")
        }
    }
}
