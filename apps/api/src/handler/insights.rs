//! # インサイト生成ハンドラ
//!
//! `POST /api/v1/insights` の本体。処理は 1 リクエストにつき直線的に進む:
//!
//! 1. Authorization ヘッダーから Bearer トークンを取り出す
//! 2. ID プロバイダでトークンを検証し uid を得る
//! 3. `metrics` ペイロードを検証する
//! 4. プロンプトを組み立てる
//! 5. 補完プロバイダを 1 回呼び出す
//! 6. 先頭候補の本文を `{uid, text}` として返す
//!
//! リトライ・キャッシュ・重複排除は行わない。同一リクエストを 2 回送れば
//! 補完プロバイダも 2 回呼ばれる。

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    client::{ChatMessage, CompletionClient, CompletionRequest, TokenVerifier},
    error::ApiError,
};

/// `model` 未指定時に使用するモデル識別子
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// サンプリング温度（固定）
const TEMPERATURE: f32 = 0.3;

/// system ロールの指示文
const SYSTEM_PROMPT: &str = "You are a concise financial summarizer.";

/// インサイト生成ハンドラの State
pub struct InsightsState {
    pub token_verifier:    Arc<dyn TokenVerifier>,
    pub completion_client: Arc<dyn CompletionClient>,
}

// --- リクエスト/レスポンス型 ---

/// インサイト生成リクエスト
///
/// `metrics` は任意の JSON 値として受け取り、ハンドラ内で型を検証する。
#[derive(Debug, Default, Deserialize)]
pub struct InsightsRequest {
    #[serde(default)]
    pub metrics: Option<Value>,
    #[serde(default)]
    pub model:   Option<String>,
}

/// インサイト生成レスポンス
#[derive(Debug, Serialize)]
pub struct InsightsResponse {
    /// 検証済みのサブジェクト識別子
    pub uid:  String,
    /// 生成された要約（前後空白除去済み）
    pub text: String,
}

// --- ヘルパー ---

/// Authorization ヘッダーから Bearer トークンを取り出す
///
/// `Bearer <token>` 形式に一致しない場合は
/// [`AuthError::MissingHeader`](crate::client::AuthError::MissingHeader) 相当のエラー。
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::from(crate::client::AuthError::MissingHeader))
}

/// `metrics` として受理できる値か判定する
///
/// 受理条件は「null でないオブジェクト的な値」。配列もオブジェクト扱いで
/// 受理する（互換性のための寛容な判定）。プリミティブと null は拒否する。
fn is_object_like(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

/// user ロールのプロンプトを組み立てる
///
/// メトリクスの JSON テキストをそのまま末尾に埋め込む。
fn build_user_prompt(metrics_json: &str) -> String {
    format!(
        "You are a budgeting assistant. Summarize the user's monthly finances in 2-3 short, plain sentences.\n\
         Prefer concrete numbers and comparisons month-over-month. Avoid advice or promises.\n\
         JSON:\n\
         {metrics_json}"
    )
}

// --- ハンドラ ---

/// POST /api/v1/insights
///
/// 家計メトリクスの要約を生成する。
///
/// 本文は寛容にパースする: 壊れた JSON や空の本文は空オブジェクトとして
/// 扱い、`metrics` 検証で 400 になる。
#[tracing::instrument(skip_all)]
pub async fn generate_insights(
    State(state): State<Arc<InsightsState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InsightsResponse>, ApiError> {
    // 認証はペイロード検証より先に行う
    let token = bearer_token(&headers)?;
    let uid = state.token_verifier.verify(token).await?;

    let request: InsightsRequest = serde_json::from_slice(&body).unwrap_or_default();

    let metrics = request
        .metrics
        .filter(is_object_like)
        .ok_or(ApiError::InvalidMetrics)?;
    let model = request
        .model
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let metrics_json = serde_json::to_string(&metrics).map_err(anyhow::Error::from)?;

    let completion = state
        .completion_client
        .create_completion(CompletionRequest {
            model,
            temperature: TEMPERATURE,
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_user_prompt(&metrics_json)),
            ],
        })
        .await?;

    Ok(Json(InsightsResponse {
        uid,
        text: completion.first_text(),
    }))
}

/// POST / OPTIONS 以外のメソッドに対するフォールバック
///
/// axum 標準の 405（空ボディ）ではなくプレーンテキストを返す。
pub async fn method_not_allowed() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}
