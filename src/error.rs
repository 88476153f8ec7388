//! リクエスト単位のエラー分類と HTTP 応答への変換。
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::classification::model::ClassifierError;
use crate::clients::FetchError;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// 識別子（ハッシュタグ・URL）が欠けている、または空。
    #[error("{0}")]
    Input(String),
    /// 主クエリの検索結果が 0 件。
    #[error("{0}")]
    NoResults(String),
    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(#[from] FetchError),
    #[error("insufficient training data: {0}")]
    InsufficientData(#[source] ClassifierError),
    /// 学習済みモデルと入力特徴量の不整合。プログラム上の不変条件違反。
    #[error("model consistency violated: {0}")]
    ModelConsistency(#[source] ClassifierError),
    #[error("analysis failed: {0:#}")]
    Internal(#[source] anyhow::Error),
}

impl From<ClassifierError> for AnalysisError {
    fn from(error: ClassifierError) -> Self {
        if error.is_insufficient_data() {
            Self::InsufficientData(error)
        } else {
            Self::ModelConsistency(error)
        }
    }
}

impl AnalysisError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Input(_) => StatusCode::BAD_REQUEST,
            Self::NoResults(_) => StatusCode::NOT_FOUND,
            Self::UpstreamFetch(_)
            | Self::InsufficientData(_)
            | Self::ModelConsistency(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::ModelConsistency(source) => {
                error!(error = %source, "model consistency invariant violated");
            }
            Self::Input(_) | Self::NoResults(_) => {}
            other if status.is_server_error() => error!(error = %other, "analysis failed"),
            other => warn!(error = %other, "analysis rejected"),
        }
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
