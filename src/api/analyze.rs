use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

use crate::{app::AppState, error::AnalysisError};

#[derive(Debug, Deserialize)]
pub(crate) struct HashtagRequest {
    #[serde(default)]
    hashtag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostRequest {
    #[serde(default)]
    url: Option<String>,
}

pub(crate) async fn hashtag(
    State(state): State<AppState>,
    Json(payload): Json<HashtagRequest>,
) -> Result<impl IntoResponse, AnalysisError> {
    let hashtag = payload.hashtag.unwrap_or_default();
    let report = state.batch().analyze(&hashtag).await?;
    Ok((StatusCode::OK, Json(report)))
}

pub(crate) async fn post(
    State(state): State<AppState>,
    Json(payload): Json<PostRequest>,
) -> Result<impl IntoResponse, AnalysisError> {
    let url = payload.url.unwrap_or_default();
    let assessment = state.evidence().assess(&url).await?;
    Ok((StatusCode::OK, Json(assessment)))
}
