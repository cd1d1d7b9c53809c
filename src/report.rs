//! 照合レポートの表示
//!
//! 「データなし」「未選択」「アレルゲンなし」「検出あり」を必ず区別して表示する。
//! 「アレルゲンなし」と表示するのは `AllClear` の場合だけ。

use allergen_scan_common::{MatchOutcome, MatchReport, RecognitionFailure};
use serde::Serialize;

pub const NO_DATA: &str = "No allergen data loaded.";
pub const NOTHING_SELECTED: &str = "No allergies selected.";
pub const FOUND_HEADER: &str = "⚠️ Found allergens:";
pub const ALL_CLEAR: &str = "✔️ No allergens found.";
pub const NO_ALTERNATIVES: &str = "No alternative names found for selected allergens.";
pub const READ_ERROR: &str = "Error reading text.";

/// 表示用に整形したレポート
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    /// 検出結果欄
    pub matches: String,
    /// 検索した別名欄
    pub alternatives: String,
}

pub fn render_text(report: &MatchReport) -> RenderedReport {
    match &report.outcome {
        MatchOutcome::NoData => RenderedReport {
            matches: NO_DATA.to_string(),
            alternatives: NO_DATA.to_string(),
        },
        MatchOutcome::NothingSelected => RenderedReport {
            matches: NOTHING_SELECTED.to_string(),
            alternatives: NOTHING_SELECTED.to_string(),
        },
        outcome => {
            let matches = match outcome {
                MatchOutcome::Found(found) => {
                    let mut lines = vec![FOUND_HEADER.to_string()];
                    for allergen in found {
                        for trigger in &allergen.triggers {
                            lines.push(format!(
                                "{} (matched: \"{}\")",
                                allergen.chemical_name, trigger.alternative_name
                            ));
                        }
                    }
                    lines.join("\n")
                }
                _ => ALL_CLEAR.to_string(),
            };

            let alternatives = if report.alternative_names.is_empty() {
                NO_ALTERNATIVES.to_string()
            } else {
                report.alternative_names.join("\n")
            };

            RenderedReport {
                matches,
                alternatives,
            }
        }
    }
}

/// 画像1枚分の結果（JSON出力用）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<MatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanRecord {
    pub fn matched(file_name: String, normalized_text: String, report: MatchReport) -> Self {
        Self {
            file_name,
            normalized_text: Some(normalized_text),
            report: Some(report),
            error: None,
        }
    }

    pub fn failed(file_name: String, failure: &RecognitionFailure) -> Self {
        Self {
            file_name,
            normalized_text: None,
            report: None,
            error: Some(failure.to_string()),
        }
    }

    pub fn has_matches(&self) -> bool {
        self.report.as_ref().is_some_and(|r| r.has_matches())
    }
}

/// 端末向けにレコードを出力する
pub fn print_record(record: &ScanRecord, verbose: bool) {
    println!("── {}", record.file_name);

    match (&record.report, &record.error) {
        (Some(report), _) => {
            if verbose {
                if let Some(text) = &record.normalized_text {
                    println!("[正規化テキスト]\n{}\n", text);
                }
            }
            let rendered = render_text(report);
            println!("{}", rendered.matches);
            println!("\n[検索した別名]\n{}", rendered.alternatives);
        }
        (None, Some(error)) => {
            println!("{}", READ_ERROR);
            if verbose {
                println!("  ({})", error);
            }
        }
        (None, None) => println!("{}", READ_ERROR),
    }

    println!();
}
