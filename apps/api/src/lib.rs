//! # FinBrief API ライブラリ
//!
//! 家計メトリクスの要約生成を仲介する認証付きプロキシ API のコアモジュール。
//!
//! ## モジュール構成
//!
//! - `client`: 外部 API クライアント（補完プロバイダ・ID プロバイダ）
//! - `error`: エラー型と HTTP レスポンスへの変換
//! - `handler`: HTTP ハンドラ
//! - `middleware`: ミドルウェア（CORS）

pub mod client;
pub mod error;
pub mod handler;
pub mod middleware;
