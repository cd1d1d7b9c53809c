//! OCRテキストの正規化
//!
//! OCR出力の揺れ（行末ハイフンによる単語分割・改行・記号ノイズ・1文字ゴミ）を
//! 取り除き、1行1トークンの比較可能なテキストに変換する。
//!
//! ## 処理フロー
//! 1. 行末ハイフン + 改行を削除して分割語を結合
//! 2. 残った改行（連続含む）を空白1つに
//! 3. ASCII英数字・`( ) , . %`・空白・`-` 以外を除去
//! 4. 空白の連続を1つにまとめ、前後をトリム
//! 5. 空白/カンマで分割し、1文字以下のトークンを捨てる
//! 6. トークンを改行区切りで連結
//!
//! 大文字小文字は保持する（照合側で小文字化する）。

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref HYPHEN_BREAK_RE: Regex = Regex::new(r"-\r?\n").unwrap();
    static ref LINE_BREAK_RE: Regex = Regex::new(r"(?:\r?\n)+").unwrap();
    static ref STRAY_CHAR_RE: Regex = Regex::new(r"[^a-zA-Z0-9(),.%\s-]").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref TOKEN_SPLIT_RE: Regex = Regex::new(r"[\s,]+").unwrap();
}

/// 正規化済みテキスト
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedText {
    /// 改行区切りのトークン列
    pub text: String,
    /// `text` の各行
    pub tokens: Vec<String>,
}

impl NormalizedText {
    /// OCR生テキストから生成
    pub fn from_raw(raw: &str) -> Self {
        let tokens = tokens(raw);
        let text = tokens.join("\n");
        Self { text, tokens }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// OCR生テキストを正規化する
///
/// 空入力・ノイズのみの入力は空文字列を返す。
/// 出力を再度正規化しても変化しない。
pub fn normalize(raw: &str) -> String {
    NormalizedText::from_raw(raw).text
}

/// 正規化後のトークン列を返す（手順1〜5）
pub fn tokens(raw: &str) -> Vec<String> {
    // 1. 行末ハイフンで分割された語を結合
    let joined = HYPHEN_BREAK_RE.replace_all(raw, "");
    // 2. 改行を空白に
    let single_line = LINE_BREAK_RE.replace_all(&joined, " ");
    // 3. ノイズ文字を除去
    let stripped = STRAY_CHAR_RE.replace_all(&single_line, "");
    // 4. 空白の正規化
    let collapsed = WHITESPACE_RE.replace_all(&stripped, " ");
    let trimmed = collapsed.trim();

    // 5. 分割して1文字以下を除外
    let words: Vec<&str> = TOKEN_SPLIT_RE
        .split(trimmed)
        .filter(|word| word.len() > 1)
        .collect();

    merge_dangling_hyphens(words)
}

/// 末尾が `-` のトークンを次のトークンと結合する
///
/// 改行を挟まずに分割された語（`SOY- LECITHIN`）は手順1では結合されないが、
/// 出力では `SOY-\nLECITHIN` と行末ハイフンになるため、ここで結合して
/// 再正規化しても結果が変わらないようにする。
fn merge_dangling_hyphens(words: Vec<&str>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(words.len());
    let mut carry: Option<String> = None;

    for word in words {
        let current = match carry.take() {
            Some(mut prefix) => {
                prefix.push_str(word);
                prefix
            }
            None => word.to_string(),
        };

        match current.strip_suffix('-') {
            Some(head) => carry = Some(head.to_string()),
            None => merged.push(current),
        }
    }

    // 最後のトークンの末尾ハイフンは結合相手がないのでそのまま残す
    if let Some(mut rest) = carry {
        rest.push('-');
        merged.push(rest);
    }

    merged
}
