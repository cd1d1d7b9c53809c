//! 対話式アレルゲン選択・スキャンセッション
//!
//! OCRは数秒かかるためバックグラウンドで実行し、その間もアレルゲンの
//! 選択を変更できる。完了した結果はメニューに戻るたびに反映する。

use crate::error::{AllergenScanError, Result};
use crate::ocr::{spawn_scan, Recognizer, ScanCompletion};
use crate::report::{render_text, READ_ERROR};
use allergen_scan_common::{Catalog, MatchReport, ScanUpdate, SelectionState, Session};
use dialoguer::{Input, MultiSelect, Select};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// 対話アクション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// ラベル画像をスキャン
    Scan,
    /// アレルゲンを選択
    Select,
    /// 結果を表示（実行中のスキャンを待つ）
    Show,
    /// 実行中のスキャンを取り消してテキストを破棄
    Reset,
    /// 終了
    Quit,
}

impl SessionAction {
    const ALL: [SessionAction; 5] = [
        SessionAction::Scan,
        SessionAction::Select,
        SessionAction::Show,
        SessionAction::Reset,
        SessionAction::Quit,
    ];

    fn label(&self) -> &'static str {
        match self {
            SessionAction::Scan => "ラベル画像をスキャン",
            SessionAction::Select => "アレルゲンを選択",
            SessionAction::Show => "結果を表示",
            SessionAction::Reset => "リセット",
            SessionAction::Quit => "終了",
        }
    }
}

fn prompt_error(e: dialoguer::Error) -> AllergenScanError {
    AllergenScanError::Prompt(e.to_string())
}

/// 対話式でアレルゲンを選択（現在の選択をチェック済みで表示）
pub fn select_allergens_interactive(
    catalog: &Catalog,
    current: &SelectionState,
) -> Result<Vec<String>> {
    if catalog.is_empty() {
        println!("⚠ アレルゲンデータが読み込まれていません");
        return Ok(Vec::new());
    }

    let names: Vec<&str> = catalog.chemical_names().collect();
    let defaults: Vec<bool> = names.iter().map(|n| current.contains(n)).collect();

    let chosen = MultiSelect::new()
        .with_prompt("アレルゲンを選択してください（スペースで切替、Enterで確定）")
        .items(&names)
        .defaults(&defaults)
        .interact()
        .map_err(prompt_error)?;

    Ok(chosen.into_iter().map(|i| names[i].to_string()).collect())
}

/// 対話式スキャンセッションを実行
pub async fn run_interactive_session<R>(mut session: Session, recognizer: Arc<R>) -> Result<()>
where
    R: Recognizer + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<ScanCompletion>();
    let mut in_flight: HashMap<u64, JoinHandle<()>> = HashMap::new();

    println!(
        "🔍 アレルゲンスキャン（{}種類のアレルゲンを読み込み済み）\n",
        session.catalog().len()
    );

    loop {
        while let Ok(completion) = rx.try_recv() {
            apply_completion(&mut session, &mut in_flight, completion);
        }

        let labels: Vec<&str> = SessionAction::ALL.iter().map(|a| a.label()).collect();
        let pending = in_flight.len();
        let prompt = if pending > 0 {
            format!("操作を選択（認識中: {}件）", pending)
        } else {
            "操作を選択".to_string()
        };

        let index = tokio::task::block_in_place(|| {
            Select::new()
                .with_prompt(prompt)
                .items(&labels)
                .default(0)
                .interact()
        })
        .map_err(prompt_error)?;

        match SessionAction::ALL[index] {
            SessionAction::Scan => {
                let path: String = tokio::task::block_in_place(|| {
                    Input::<String>::new()
                        .with_prompt("画像ファイルのパス")
                        .interact_text()
                })
                .map_err(prompt_error)?;

                let image = PathBuf::from(path.trim());
                if !image.is_file() {
                    println!("⚠ ファイルが見つかりません: {}\n", image.display());
                    continue;
                }

                let ticket = session.begin_scan();
                let handle = spawn_scan(Arc::clone(&recognizer), image, ticket, tx.clone());
                in_flight.insert(ticket.seq(), handle);
                println!("→ 認識を開始しました (#{})\n", ticket.seq());
            }
            SessionAction::Select => {
                let chosen = tokio::task::block_in_place(|| {
                    select_allergens_interactive(session.catalog(), session.selection())
                })?;
                let report = session.select_only(chosen);
                print_report(&report);
            }
            SessionAction::Show => {
                while !in_flight.is_empty() {
                    match rx.recv().await {
                        Some(completion) => {
                            apply_completion(&mut session, &mut in_flight, completion)
                        }
                        None => break,
                    }
                }
                if !session.current_text().is_empty() {
                    println!("[正規化テキスト]\n{}\n", session.current_text().as_str());
                }
                print_report(&session.report());
            }
            SessionAction::Reset => {
                for (seq, handle) in in_flight.drain() {
                    tracing::debug!(seq, "aborting in-flight scan");
                    handle.abort();
                }
                session.reset();
                println!("✔ リセットしました\n");
            }
            SessionAction::Quit => {
                for (_, handle) in in_flight.drain() {
                    handle.abort();
                }
                break;
            }
        }
    }

    Ok(())
}

fn apply_completion(
    session: &mut Session,
    in_flight: &mut HashMap<u64, JoinHandle<()>>,
    completion: ScanCompletion,
) {
    in_flight.remove(&completion.ticket.seq());

    match session.complete_scan(completion.ticket, completion.result) {
        ScanUpdate::Applied(report) => {
            println!(
                "\n✔ 認識完了 (#{}): {}",
                completion.ticket.seq(),
                completion.image.display()
            );
            print_report(&report);
        }
        ScanUpdate::RecognitionFailed(failure) => {
            println!("\n{} (#{}: {})\n", READ_ERROR, completion.ticket.seq(), failure);
        }
        ScanUpdate::Stale => {
            tracing::debug!(seq = completion.ticket.seq(), "stale scan ignored");
        }
    }
}

fn print_report(report: &MatchReport) {
    let rendered = render_text(report);
    println!("{}", rendered.matches);
    println!("\n[検索した別名]\n{}\n", rendered.alternatives);
}
