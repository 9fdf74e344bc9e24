//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! ## 設計方針
//!
//! - 各ハンドラはサブモジュールに配置
//! - 親モジュールで re-export し、フラットな API を提供
//! - ハンドラは薄く保ち、外部サービス呼び出しはクライアントトレイトに委譲
//!
//! ## ハンドラ一覧
//!
//! - `health`: ヘルスチェック
//! - `insights`: 家計メトリクスの要約生成

pub mod health;
pub mod insights;

pub use health::health_check;
pub use insights::{
    InsightsRequest,
    InsightsResponse,
    InsightsState,
    generate_insights,
    method_not_allowed,
};
