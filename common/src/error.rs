//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// アレルゲンデータの読み込み・解析に失敗（致命的ではない）
    #[error("Allergen data unavailable: {0}")]
    DataUnavailable(String),

    /// カタログの不変条件違反（空・重複した名前など）
    #[error("Invalid allergen catalog: {0}")]
    InvalidCatalog(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;

/// OCR（外部サービス）の失敗
///
/// 照合はスキップされるが、再スキャンで回復できる。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionFailure {
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    #[error("OCR failed: {0}")]
    Failed(String),

    #[error("OCR timed out after {0}s")]
    TimedOut(u64),

    #[error("no text detected")]
    NoText,

    #[error("scan cancelled")]
    Cancelled,
}
