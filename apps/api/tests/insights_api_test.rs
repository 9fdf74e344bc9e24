//! インサイト API 統合テスト
//!
//! 補完プロバイダと ID プロバイダの呼び出しはスタブを使用し、
//! ルーター全体（CORS ミドルウェア + メソッドフォールバック + ハンドラ）を
//! `tower::ServiceExt::oneshot` で検証する。
//!
//! ## テストケース
//!
//! - OPTIONS プリフライト: 204 + CORS ヘッダー + 空ボディ
//! - POST / OPTIONS 以外のメソッド: 405 プレーンテキスト
//! - Authorization ヘッダーなし: 401（ヘッダー欠落のメッセージ）
//! - 無効なトークン: 401（プロバイダのメッセージ）
//! - `metrics` 欠落・null・プリミティブ: 400 固定メッセージ
//! - 配列の `metrics` は受理される（寛容な判定）
//! - `model` 未指定時はデフォルトモデルでプロバイダが呼ばれる
//! - 成功時: `{uid, text}`、本文は前後空白除去済み
//! - 同一リクエスト 2 回でプロバイダも 2 回呼ばれる（キャッシュなし）
//! - プロバイダ失敗時: 502（認証エラーの 401 とは区別する）

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode, header},
    middleware::from_fn_with_state,
    routing::post,
};
use finbrief_api::{
    client::{
        AuthError,
        CompletionClient,
        CompletionError,
        CompletionRequest,
        CompletionResponse,
        TokenVerifier,
    },
    handler::{InsightsState, generate_insights, method_not_allowed},
    middleware::{CorsState, cors_middleware},
};
use pretty_assertions::assert_eq;
use tower::ServiceExt;

/// テスト用のサブジェクト識別子
const TEST_UID: &str = "user-123";

// --- ID プロバイダスタブ ---

/// 常に固定の結果を返すトークン検証スタブ
struct StubVerifier {
    result: Result<String, AuthError>,
}

impl StubVerifier {
    fn success() -> Self {
        Self {
            result: Ok(TEST_UID.to_string()),
        }
    }

    fn invalid_token() -> Self {
        Self {
            result: Err(AuthError::InvalidToken("TOKEN_EXPIRED".to_string())),
        }
    }
}

#[async_trait]
impl TokenVerifier for StubVerifier {
    async fn verify(&self, _token: &str) -> Result<String, AuthError> {
        self.result.clone()
    }
}

// --- 補完プロバイダスタブ ---

/// 呼び出しを記録しつつ固定の結果を返す補完クライアントスタブ
struct StubCompletionClient {
    requests: Mutex<Vec<CompletionRequest>>,
    result:   Result<CompletionResponse, CompletionError>,
}

impl StubCompletionClient {
    fn with_text(text: &str) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            result:   Ok(completion_response(text)),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            result:   Err(CompletionError::RateLimited),
        })
    }

    fn recorded(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for StubCompletionClient {
    async fn create_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        self.requests.lock().unwrap().push(request);
        self.result.clone()
    }
}

/// 補完レスポンスを組み立てる
fn completion_response(text: &str) -> CompletionResponse {
    serde_json::from_value(serde_json::json!({
        "choices": [ { "message": { "content": text } } ]
    }))
    .unwrap()
}

// --- テスト用ルーター ---

/// 本番と同じルート構成（CORS + メソッドフォールバック + ハンドラ）を構築する
fn test_app(
    verifier: Arc<dyn TokenVerifier>,
    completion_client: Arc<dyn CompletionClient>,
) -> Router {
    let state = Arc::new(InsightsState {
        token_verifier: verifier,
        completion_client,
    });
    let cors_state = CorsState::new("*").unwrap();

    Router::new()
        .route(
            "/api/v1/insights",
            post(generate_insights).fallback(method_not_allowed),
        )
        .with_state(state)
        .layer(from_fn_with_state(cors_state, cors_middleware))
}

/// 認証ヘッダー付きの POST リクエストを送る
async fn post_insights(app: Router, auth: Option<&str>, body: &str) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/insights")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }

    app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

/// レスポンスボディを JSON として読み出す
async fn read_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// --- CORS / メソッドゲート ---

#[tokio::test]
async fn test_プリフライトは204とcorsヘッダーを返す() {
    let app = test_app(
        Arc::new(StubVerifier::success()),
        StubCompletionClient::with_text("ok"),
    );

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/v1/insights")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers().clone();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(
        headers["access-control-allow-headers"],
        "Authorization, Content-Type"
    );
    assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_getは405プレーンテキストを返す() {
    let app = test_app(
        Arc::new(StubVerifier::success()),
        StubCompletionClient::with_text("ok"),
    );

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/v1/insights")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"Method Not Allowed");
}

#[tokio::test]
async fn test_実リクエストのレスポンスにもallow_originが付く() {
    let app = test_app(
        Arc::new(StubVerifier::success()),
        StubCompletionClient::with_text("ok"),
    );

    let response = post_insights(app, Some("Bearer token"), r#"{"metrics": {}}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

// --- 認証 ---

#[tokio::test]
async fn test_authorizationヘッダーなしは401() {
    let app = test_app(
        Arc::new(StubVerifier::success()),
        StubCompletionClient::with_text("ok"),
    );

    let response = post_insights(app, None, r#"{"metrics": {}}"#).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Missing Authorization header");
}

#[tokio::test]
async fn test_無効なトークンは401でプロバイダのメッセージを返す() {
    let completion_client = StubCompletionClient::with_text("ok");
    let app = test_app(
        Arc::new(StubVerifier::invalid_token()),
        completion_client.clone(),
    );

    let response = post_insights(app, Some("Bearer expired"), r#"{"metrics": {}}"#).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"], "TOKEN_EXPIRED");
    // 認証で短絡するため補完プロバイダは呼ばれない
    assert!(completion_client.recorded().is_empty());
}

// --- metrics 検証 ---

#[tokio::test]
async fn test_metricsの欠落や型不正は400固定メッセージ() {
    let invalid_bodies = [
        "{}",
        r#"{"metrics": null}"#,
        r#"{"metrics": "a lot"}"#,
        r#"{"metrics": 42}"#,
        r#"{"metrics": true}"#,
        "not even json",
        "",
    ];

    for body in invalid_bodies {
        let app = test_app(
            Arc::new(StubVerifier::success()),
            StubCompletionClient::with_text("ok"),
        );

        let response = post_insights(app, Some("Bearer token"), body).await;

        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "本文 {body:?} は 400 になること"
        );
        let json = read_json(response).await;
        assert_eq!(json["error"], "Invalid 'metrics' payload");
    }
}

#[tokio::test]
async fn test_配列のmetricsは受理される() {
    let app = test_app(
        Arc::new(StubVerifier::success()),
        StubCompletionClient::with_text("ok"),
    );

    let response = post_insights(app, Some("Bearer token"), r#"{"metrics": [1, 2]}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
}

// --- 補完呼び出し ---

#[tokio::test]
async fn test_model未指定時はデフォルトモデルで呼ばれる() {
    let completion_client = StubCompletionClient::with_text("ok");
    let app = test_app(Arc::new(StubVerifier::success()), completion_client.clone());

    post_insights(app, Some("Bearer token"), r#"{"metrics": {"income": 5000}}"#).await;

    let recorded = completion_client.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].model, "gpt-4o-mini");
}

#[tokio::test]
async fn test_model指定時はそのモデルで呼ばれる() {
    let completion_client = StubCompletionClient::with_text("ok");
    let app = test_app(Arc::new(StubVerifier::success()), completion_client.clone());

    post_insights(
        app,
        Some("Bearer token"),
        r#"{"metrics": {}, "model": "gpt-4o"}"#,
    )
    .await;

    assert_eq!(completion_client.recorded()[0].model, "gpt-4o");
}

#[tokio::test]
async fn test_プロンプトはsystemとuserの2メッセージで構成される() {
    let completion_client = StubCompletionClient::with_text("ok");
    let app = test_app(Arc::new(StubVerifier::success()), completion_client.clone());

    post_insights(app, Some("Bearer token"), r#"{"metrics": {"income": 5000}}"#).await;

    let recorded = completion_client.recorded();
    let messages = &recorded[0].messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "system");
    assert_eq!(messages[0].content, "You are a concise financial summarizer.");
    assert_eq!(messages[1].role, "user");
    assert!(messages[1].content.ends_with("JSON:\n{\"income\":5000}"));
    let temperature = recorded[0].temperature;
    assert!((f64::from(temperature) - 0.3).abs() < 1e-6);
}

// --- 成功レスポンス ---

#[tokio::test]
async fn test_成功時はuidとトリム済みテキストを返す() {
    let app = test_app(
        Arc::new(StubVerifier::success()),
        StubCompletionClient::with_text("  Spending is up 5%.\n"),
    );

    let response = post_insights(app, Some("Bearer token"), r#"{"metrics": {}}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(
        body,
        serde_json::json!({ "uid": TEST_UID, "text": "Spending is up 5%." })
    );
}

#[tokio::test]
async fn test_同一リクエスト2回でプロバイダも2回呼ばれる() {
    let completion_client = StubCompletionClient::with_text("ok");
    let verifier: Arc<dyn TokenVerifier> = Arc::new(StubVerifier::success());

    for _ in 0..2 {
        let app = test_app(verifier.clone(), completion_client.clone());
        let response = post_insights(app, Some("Bearer token"), r#"{"metrics": {}}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(completion_client.recorded().len(), 2);
}

// --- プロバイダ失敗 ---

#[tokio::test]
async fn test_プロバイダ失敗は502になる() {
    let app = test_app(
        Arc::new(StubVerifier::success()),
        StubCompletionClient::failing(),
    );

    let response = post_insights(app, Some("Bearer token"), r#"{"metrics": {}}"#).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = read_json(response).await;
    assert!(body["error"].is_string());
}
