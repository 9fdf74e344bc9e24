//! # FinBrief API サーバー
//!
//! 家計メトリクスの要約生成を仲介する認証付きプロキシ API。
//!
//! ## 役割
//!
//! クライアントアプリと外部プロバイダの間に位置し、以下の責務を担う:
//!
//! - **認証**: Bearer トークンを ID プロバイダで検証する
//! - **検証**: `metrics` ペイロードの型チェック
//! - **仲介**: プロンプトを組み立て、補完プロバイダを 1 回呼び出す
//! - **CORS**: ブラウザからのクロスオリジン呼び出しの許可
//!
//! ## アーキテクチャ
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌───────────────────┐
//! │   Browser    │────▶│     API      │────▶│ 補完プロバイダ     │
//! │   (App)      │     │  (FinBrief)  │     │ (OpenAI 互換)     │
//! └──────────────┘     └──────────────┘     └───────────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │ ID プロバイダ │
//!                      │ (Firebase)   │
//!                      └──────────────┘
//! ```
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `API_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `API_PORT` | **Yes** | ポート番号 |
//! | `ALLOW_ORIGIN` | No | CORS 許可オリジン（デフォルト: `*`） |
//! | `OPENAI_API_KEY` | **Yes** | 補完プロバイダの API キー |
//! | `OPENAI_BASE_URL` | No | 補完プロバイダのベース URL |
//! | `IDENTITY_API_KEY` | **Yes** | ID プロバイダの Web API キー |
//! | `IDENTITY_BASE_URL` | No | ID プロバイダのベース URL |
//! | `LOG_FORMAT` | No | `json` または `pretty` |
//!
//! ## 起動方法
//!
//! ```bash
//! # 開発環境（.env ファイルを使用）
//! cargo run -p finbrief-api
//!
//! # 本番環境（環境変数を直接指定）
//! API_PORT=3000 OPENAI_API_KEY=... IDENTITY_API_KEY=... cargo run -p finbrief-api --release
//! ```

mod app_builder;
mod config;

use std::{net::SocketAddr, sync::Arc};

use config::ApiConfig;
use finbrief_api::client::{
    CompletionClient,
    FirebaseTokenVerifier,
    OpenAiCompletionClient,
    TokenVerifier,
};
use finbrief_shared::observability::TracingConfig;
use tokio::net::TcpListener;

/// API サーバーのエントリーポイント
///
/// 以下の順序で初期化を行う:
///
/// 1. 環境変数の読み込み（.env ファイル）
/// 2. トレーシングの初期化
/// 3. アプリケーション設定の読み込み
/// 4. プロバイダクライアントの構築（プロセスで 1 度だけ）
/// 5. ルーターの構築と HTTP サーバーの起動
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    // 本番環境では .env ファイルは使用せず、環境変数を直接設定する
    dotenvy::dotenv().ok();

    // トレーシング初期化
    let tracing_config = TracingConfig::from_env("api");
    finbrief_shared::observability::init_tracing(tracing_config);
    let _tracing_guard = tracing::info_span!("app", service = "api").entered();

    // 設定読み込み
    let config = ApiConfig::from_env().expect("設定の読み込みに失敗しました");

    tracing::info!("API サーバーを起動します: {}:{}", config.host, config.port);

    // プロバイダクライアントの構築
    // ここで 1 度だけ構築し、Arc で全リクエストに共有する
    let token_verifier: Arc<dyn TokenVerifier> = Arc::new(FirebaseTokenVerifier::new(
        &config.identity_base_url,
        &config.identity_api_key,
    ));
    let completion_client: Arc<dyn CompletionClient> = Arc::new(OpenAiCompletionClient::new(
        &config.openai_base_url,
        &config.openai_api_key,
    ));

    // ルーター構築
    let app = app_builder::build_app(&config, token_verifier, completion_client)?;

    // サーバー起動
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("アドレスのパースに失敗しました");

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("API サーバーが起動しました: {}", addr);

    // Graceful shutdown は axum::serve が自動的に処理する
    axum::serve(listener, app).await?;

    Ok(())
}
