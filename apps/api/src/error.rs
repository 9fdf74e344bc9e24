//! # API エラーハンドリング
//!
//! HTTP API のエラー定義と、axum レスポンスへの変換。
//!
//! 呼び出し元が受け取る本文は常に `{"error": <メッセージ>}` の 1 形式。
//! 認証エラー（401）と上流プロバイダのエラー（502）は明確に区別する。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::client::{AuthError, CompletionError};

/// API 層で発生するエラー
///
/// `IntoResponse` を実装しているため、axum が自動的に HTTP レスポンスに変換する。
#[derive(Debug, Error)]
pub enum ApiError {
    /// 認証エラー（401 Unauthorized）
    ///
    /// Authorization ヘッダーの欠落と、トークン検証の失敗の両方を含む。
    #[error("{0}")]
    Unauthorized(#[from] AuthError),

    /// `metrics` ペイロードの欠落・型不正（400 Bad Request）
    #[error("Invalid 'metrics' payload")]
    InvalidMetrics,

    /// 補完プロバイダのエラー（502 Bad Gateway）
    #[error("{0}")]
    Completion(#[from] CompletionError),

    /// 内部サーバーエラー（500 Internal Server Error）
    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

/// エラーレスポンス本文（`{"error": <メッセージ>}`）
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    /// 新しいエラー本文を作成する
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidMetrics => StatusCode::BAD_REQUEST,
            ApiError::Completion(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // 上流・内部エラーの詳細はサーバー側ログにのみ残す
        match &self {
            ApiError::Completion(err) => {
                tracing::error!(error = %err, "補完プロバイダの呼び出しに失敗しました");
            }
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "内部エラー");
            }
            _ => {}
        }

        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}
