//! # 補完プロバイダクライアント
//!
//! OpenAI 互換の Chat Completions API への通信を担当する。
//!
//! ## エンドポイント
//!
//! - `POST /v1/chat/completions` - チャット補完の生成
//!
//! リトライは行わない。最初のエラーでリクエストは終了する。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 補完プロバイダクライアントエラー
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// レート制限（429）
    #[error("補完プロバイダのレート制限に達しました")]
    RateLimited,

    /// API エラー（4xx / 5xx）
    #[error("補完プロバイダエラー ({status}): {message}")]
    Api { status: u16, message: String },

    /// ネットワークエラー
    #[error("ネットワークエラー: {0}")]
    Network(String),

    /// 補完プロバイダが利用不可
    #[error("補完プロバイダが一時的に利用できません")]
    ServiceUnavailable,
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            CompletionError::ServiceUnavailable
        } else {
            CompletionError::Network(err.to_string())
        }
    }
}

// --- リクエスト/レスポンス型 ---

/// 会話中の 1 メッセージ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// メッセージの役割（`"system"` / `"user"` / `"assistant"`）
    pub role:    String,
    /// メッセージ本文
    pub content: String,
}

impl ChatMessage {
    /// system ロールのメッセージを作成する
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role:    "system".to_string(),
            content: content.into(),
        }
    }

    /// user ロールのメッセージを作成する
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role:    "user".to_string(),
            content: content.into(),
        }
    }
}

/// チャット補完リクエスト
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// モデル識別子
    pub model:       String,
    /// サンプリング温度
    pub temperature: f32,
    /// メッセージ列（system → user の順）
    pub messages:    Vec<ChatMessage>,
}

/// 補完レスポンスの 1 候補
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    /// 生成されたメッセージ
    pub message: ChoiceMessage,
}

/// 候補内のメッセージ
///
/// `content` はプロバイダが本文を返さなかった場合 `None` になる。
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

/// チャット補完レスポンス
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    /// 生成された候補（通常 1 件）
    pub choices: Vec<CompletionChoice>,
}

impl CompletionResponse {
    /// 先頭候補の本文を取り出す
    ///
    /// 候補が空、または本文がない場合は空文字列。前後の空白は除去する。
    pub fn first_text(&self) -> String {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .unwrap_or("")
            .trim()
            .to_string()
    }
}

/// プロバイダのエラーレスポンス（`{"error": {"message": ...}}`）
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

// --- トレイトと実装 ---

/// 補完プロバイダクライアントトレイト
///
/// テスト時にスタブを使用できるようトレイトで定義。
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// チャット補完を 1 回生成する
    ///
    /// 補完プロバイダの `POST /v1/chat/completions` を呼び出す。
    async fn create_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError>;
}

/// OpenAI 互換 API のクライアント実装
pub struct OpenAiCompletionClient {
    base_url: String,
    api_key:  String,
    client:   reqwest::Client,
}

impl OpenAiCompletionClient {
    /// 新しい補完クライアントを作成する
    ///
    /// # 引数
    ///
    /// - `base_url`: プロバイダのベース URL（例: `https://api.openai.com`）
    /// - `api_key`: API キー
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key:  api_key.to_string(),
            client:   reqwest::Client::new(),
        }
    }

    /// エラーレスポンス本文からメッセージを取り出す
    ///
    /// プロバイダ標準の `{"error": {"message": ...}}` 形式でない場合は
    /// 本文をそのまま返す。
    fn extract_error_message(body: &str) -> String {
        serde_json::from_str::<ProviderErrorBody>(body)
            .map(|parsed| parsed.error.message)
            .unwrap_or_else(|_| body.to_string())
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn create_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let body = response.json::<CompletionResponse>().await?;
                Ok(body)
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(CompletionError::RateLimited),
            reqwest::StatusCode::SERVICE_UNAVAILABLE => Err(CompletionError::ServiceUnavailable),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(CompletionError::Api {
                    status:  status.as_u16(),
                    message: Self::extract_error_message(&body),
                })
            }
        }
    }
}
