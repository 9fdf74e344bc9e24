//! # 外部 API クライアント
//!
//! 補完プロバイダ（OpenAI 互換 API）と ID プロバイダ（Firebase Auth）との
//! 通信を担当する。

pub mod completion;
pub mod identity;

pub use completion::{
    ChatMessage,
    CompletionClient,
    CompletionError,
    CompletionRequest,
    CompletionResponse,
    OpenAiCompletionClient,
};
pub use identity::{AuthError, FirebaseTokenVerifier, TokenVerifier};
