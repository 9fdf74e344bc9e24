//! # API アプリケーション構築
//!
//! DI（クライアント・State）の初期化とルーター構築を担当する。
//! `main.rs` はインフラ初期化とサーバー起動に集中する。

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use finbrief_api::{
    client::{CompletionClient, TokenVerifier},
    handler::{InsightsState, generate_insights, health_check, method_not_allowed},
    middleware::{CorsState, cors_middleware},
};
use finbrief_shared::observability::{MakeRequestUuidV7, make_request_span};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ApiConfig;

/// DI コンテナの構築とルーター定義を行う
///
/// 構築済みのプロバイダクライアントを受け取り、State → Router の順に
/// 組み立てる。クライアントはプロセス起動時に 1 度だけ構築され、
/// 全リクエストで共有される。
pub(crate) fn build_app(
    config: &ApiConfig,
    token_verifier: Arc<dyn TokenVerifier>,
    completion_client: Arc<dyn CompletionClient>,
) -> anyhow::Result<Router> {
    let insights_state = Arc::new(InsightsState {
        token_verifier,
        completion_client,
    });

    // 許可オリジンはヘッダー値として起動時に検証する
    let cors_state = CorsState::new(&config.allow_origin)?;

    // ルーター構築
    // insights ルートはメソッドフォールバックでプレーンテキストの 405 を返す
    // レイヤー順序が重要: 下に書いたものが外側
    // 1. SetRequestIdLayer（最外）: リクエスト受信時に UUID v7 を生成
    // 2. TraceLayer: カスタムスパンに request_id を含め、全ログに自動注入
    // 3. PropagateRequestIdLayer: レスポンスヘッダーに X-Request-Id をコピー
    // 4. CORS: プリフライト応答と Allow-Origin の付与
    let app = Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/v1/insights",
            post(generate_insights).fallback(method_not_allowed),
        )
        .with_state(insights_state)
        .layer(from_fn_with_state(cors_state, cors_middleware))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7));

    Ok(app)
}
