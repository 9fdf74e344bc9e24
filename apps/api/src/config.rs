//! # API 設定
//!
//! 環境変数から API サーバーの設定を読み込む。

use std::env;

/// API サーバーの設定
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// バインドアドレス
    pub host: String,
    /// ポート番号
    pub port: u16,
    /// CORS の許可オリジン（デフォルト `*`）
    pub allow_origin: String,
    /// 補完プロバイダのベース URL
    pub openai_base_url: String,
    /// 補完プロバイダの API キー
    pub openai_api_key: String,
    /// ID プロバイダのベース URL
    pub identity_base_url: String,
    /// ID プロバイダの Web API キー
    pub identity_api_key: String,
}

impl ApiConfig {
    /// 環境変数から設定を読み込む
    ///
    /// 必須の変数が欠けている場合は起動時に panic する
    /// （リクエスト処理中ではなく起動時に検出する）。
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("API_PORT")
                .expect("API_PORT が設定されていません")
                .parse()
                .expect("API_PORT は有効なポート番号である必要があります"),
            allow_origin: env::var("ALLOW_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY")
                .expect("OPENAI_API_KEY が設定されていません"),
            identity_base_url: env::var("IDENTITY_BASE_URL")
                .unwrap_or_else(|_| "https://identitytoolkit.googleapis.com".to_string()),
            identity_api_key: env::var("IDENTITY_API_KEY")
                .expect("IDENTITY_API_KEY が設定されていません"),
        })
    }
}
