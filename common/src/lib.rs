//! Allergen Scan Common Library
//!
//! CLIと他のフロントエンドで共有されるアレルゲン照合のコア:
//! カタログ・OCRテキスト正規化・照合・選択状態・スキャンセッション

pub mod catalog;
pub mod error;
pub mod matcher;
pub mod normalizer;
pub mod selection;
pub mod session;

pub use catalog::{AllergenRecord, Catalog};
pub use error::{Error, RecognitionFailure, Result};
pub use matcher::{
    match_allergens, match_allergens_with, AllergenMatch, MatchOptions, MatchOutcome,
    MatchReport, MatchTrigger,
};
pub use normalizer::{normalize, NormalizedText};
pub use selection::SelectionState;
pub use session::{ScanTicket, ScanUpdate, Session};
