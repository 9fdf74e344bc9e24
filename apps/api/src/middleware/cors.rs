//! # CORS ミドルウェア
//!
//! ブラウザからのクロスオリジン呼び出しを許可するためのヘッダー制御。
//!
//! - OPTIONS（プリフライト）: 204 + 固定の許可ヘッダーで即応答し、
//!   以降の処理は行わない
//! - それ以外: ハンドラ実行後のレスポンスに `Access-Control-Allow-Origin` を付与
//!
//! 許可オリジンは設定値（`ALLOW_ORIGIN`、デフォルト `*`）から取る。
//!
//! tower-http の `CorsLayer` はプリフライトに 200 を返すため使用せず、
//! 204 を返す契約をこのミドルウェアで直接実装している。

use axum::{
    body::Body,
    extract::State,
    http::{
        HeaderValue, Method, Request, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

/// プリフライトで許可するリクエストヘッダー（固定）
const ALLOW_HEADERS: &str = "Authorization, Content-Type";

/// プリフライトで許可するメソッド（固定）
const ALLOW_METHODS: &str = "POST, OPTIONS";

/// CORS ミドルウェアの状態
#[derive(Clone)]
pub struct CorsState {
    /// `Access-Control-Allow-Origin` の値（起動時にパース済み）
    allow_origin: HeaderValue,
}

impl CorsState {
    /// 許可オリジン文字列から状態を作成する
    ///
    /// ヘッダー値として不正な文字列はここで弾く（起動時に検出する）。
    pub fn new(allow_origin: &str) -> Result<Self, http::header::InvalidHeaderValue> {
        Ok(Self {
            allow_origin: HeaderValue::from_str(allow_origin)?,
        })
    }
}

/// CORS ミドルウェア
///
/// プリフライトには 204 で即応答し、実リクエストのレスポンスには
/// `Access-Control-Allow-Origin` を付与する。
pub async fn cors_middleware(
    State(state): State<CorsState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return (
            StatusCode::NO_CONTENT,
            [
                (ACCESS_CONTROL_ALLOW_ORIGIN, state.allow_origin),
                (ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS)),
                (ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS)),
            ],
        )
            .into_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, state.allow_origin);
    response
}
