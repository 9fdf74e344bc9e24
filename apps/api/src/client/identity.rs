//! # ID プロバイダクライアント
//!
//! Firebase Auth の ID トークン検証を担当する。
//!
//! ## エンドポイント
//!
//! - `POST /v1/accounts:lookup` - ID トークンの検証とユーザー情報の取得
//!
//! プロバイダ側で署名・有効期限・失効の検証が行われるため、
//! トークンの中身をここで解析することはない。検証に成功した場合のみ
//! サブジェクト識別子（uid）が得られる。

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// ID プロバイダクライアントエラー
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Authorization ヘッダーがない、または `Bearer <token>` 形式でない
    #[error("Missing Authorization header")]
    MissingHeader,

    /// トークンが無効・期限切れ・失効済み（プロバイダのメッセージを保持）
    #[error("{0}")]
    InvalidToken(String),

    /// 検証には成功したがサブジェクトが得られなかった
    #[error("ID プロバイダがユーザーを返しませんでした")]
    SubjectMissing,

    /// ネットワークエラー
    #[error("ネットワークエラー: {0}")]
    Network(String),

    /// ID プロバイダが利用不可
    #[error("ID プロバイダが一時的に利用できません")]
    ServiceUnavailable,
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            AuthError::ServiceUnavailable
        } else {
            AuthError::Network(err.to_string())
        }
    }
}

// --- レスポンス型 ---

/// `accounts:lookup` の成功レスポンス
#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

/// 検証済みユーザー
#[derive(Debug, Deserialize)]
struct LookupUser {
    /// サブジェクト識別子（uid）
    #[serde(rename = "localId")]
    local_id: String,
}

/// プロバイダのエラーレスポンス（`{"error": {"message": "INVALID_ID_TOKEN"}}`）
#[derive(Debug, Deserialize)]
struct LookupErrorBody {
    error: LookupErrorDetail,
}

#[derive(Debug, Deserialize)]
struct LookupErrorDetail {
    message: String,
}

// --- トレイトと実装 ---

/// ID トークン検証トレイト
///
/// テスト時にスタブを使用できるようトレイトで定義。
/// 実装はプロセス起動時に 1 度だけ構築され、`Arc` で全リクエストに共有される。
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// ID トークンを検証し、サブジェクト識別子（uid）を返す
    ///
    /// 失効チェックを含む検証はプロバイダ側で行われる。
    async fn verify(&self, token: &str) -> Result<String, AuthError>;
}

/// Firebase Auth のトークン検証実装
///
/// `accounts:lookup` エンドポイントにトークンを送信して検証する。
pub struct FirebaseTokenVerifier {
    base_url: String,
    api_key:  String,
    client:   reqwest::Client,
}

impl FirebaseTokenVerifier {
    /// 新しいトークン検証クライアントを作成する
    ///
    /// # 引数
    ///
    /// - `base_url`: ID プロバイダのベース URL（例: `https://identitytoolkit.googleapis.com`）
    /// - `api_key`: Web API キー
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key:  api_key.to_string(),
            client:   reqwest::Client::new(),
        }
    }

    /// エラーレスポンス本文からプロバイダのメッセージを取り出す
    fn extract_error_message(body: &str) -> String {
        serde_json::from_str::<LookupErrorBody>(body)
            .map(|parsed| parsed.error.message)
            .unwrap_or_else(|_| "INVALID_ID_TOKEN".to_string())
    }
}

#[async_trait]
impl TokenVerifier for FirebaseTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String, AuthError> {
        let url = format!("{}/v1/accounts:lookup?key={}", self.base_url, self.api_key);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "idToken": token }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let body = response.json::<LookupResponse>().await?;
                body.users
                    .into_iter()
                    .next()
                    .map(|user| user.local_id)
                    .ok_or(AuthError::SubjectMissing)
            }
            reqwest::StatusCode::SERVICE_UNAVAILABLE => Err(AuthError::ServiceUnavailable),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(AuthError::InvalidToken(Self::extract_error_message(&body)))
            }
        }
    }
}
