//! スキャン処理の組み立て
//!
//! カタログ読み込み → 選択の解決 → OCR → 正規化 → 照合 を画像ごとに実行する。
//! 画像ごとに独立した `Session` を使うため、複数画像の結果が混ざることはない。

use crate::error::Result;
use crate::ocr::Recognizer;
use crate::report::ScanRecord;
use crate::scanner::ImageInfo;
use crate::selector::select_allergens_interactive;
use allergen_scan_common::{Catalog, MatchOptions, ScanUpdate, SelectionState, Session};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// カタログを読み込む
///
/// 失敗しても処理は続ける（照合結果は「データなし」になる）。
pub fn load_catalog(path: &Path) -> Option<Arc<Catalog>> {
    match Catalog::load(path) {
        Ok(catalog) => Some(Arc::new(catalog)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "allergen catalog unavailable");
            eprintln!("⚠ アレルゲンデータを読み込めません: {}", e);
            None
        }
    }
}

/// カタログ上の代表名を大文字小文字を無視して探す
pub fn resolve_name<'a>(catalog: &'a Catalog, name: &str) -> Option<&'a str> {
    let name = name.trim();
    catalog
        .chemical_names()
        .find(|n| *n == name)
        .or_else(|| {
            catalog
                .chemical_names()
                .find(|n| n.to_lowercase() == name.to_lowercase())
        })
}

/// 引数の指定から選択状態を作る
///
/// カタログにない名前は警告して無視する。空の選択はエラーではない。
pub fn resolve_selection(
    catalog: Option<&Catalog>,
    names: &[String],
    interactive: bool,
) -> Result<SelectionState> {
    let Some(catalog) = catalog else {
        return Ok(names.iter().map(|n| n.trim().to_string()).collect());
    };

    let mut selection = SelectionState::new();
    for name in names {
        match resolve_name(catalog, name) {
            Some(known) => {
                selection.select(known);
            }
            None => {
                tracing::warn!(name = %name, "unknown allergen ignored");
                eprintln!("⚠ カタログにないアレルゲンです: {}", name);
            }
        }
    }

    if interactive {
        let chosen = select_allergens_interactive(catalog, &selection)?;
        selection = chosen.into_iter().collect();
    }

    Ok(selection)
}

/// 認識済みテキストを照合する
pub fn check_text(
    file_name: &str,
    raw: &str,
    catalog: Option<Arc<Catalog>>,
    selection: &SelectionState,
    options: &MatchOptions,
) -> ScanRecord {
    let mut session = Session::with_options(catalog, options.clone());
    session.select_only(selection.iter());
    let ticket = session.begin_scan();
    let update = session.complete_scan(ticket, Ok(raw.to_string()));
    into_record(file_name, &session, update)
}

fn into_record(file_name: &str, session: &Session, update: ScanUpdate) -> ScanRecord {
    match update {
        ScanUpdate::Applied(report) => ScanRecord::matched(
            file_name.to_string(),
            session.current_text().text.clone(),
            report,
        ),
        ScanUpdate::RecognitionFailed(failure) => {
            ScanRecord::failed(file_name.to_string(), &failure)
        }
        // 新しいセッションではスキャンは1回だけなので起こらない
        ScanUpdate::Stale => ScanRecord::failed(
            file_name.to_string(),
            &allergen_scan_common::RecognitionFailure::Cancelled,
        ),
    }
}

/// 画像をまとめてスキャンする（結果は入力順）
pub async fn scan_images<R>(
    images: &[ImageInfo],
    recognizer: Arc<R>,
    catalog: Option<Arc<Catalog>>,
    selection: &SelectionState,
    options: &MatchOptions,
    jobs: usize,
    show_progress: bool,
) -> Vec<ScanRecord>
where
    R: Recognizer + 'static,
{
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let progress = if show_progress {
        let pb = ProgressBar::new(images.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut tasks = JoinSet::new();

    for (index, image) in images.iter().enumerate() {
        let recognizer = Arc::clone(&recognizer);
        let semaphore = Arc::clone(&semaphore);
        let catalog = catalog.clone();
        let selection = selection.clone();
        let options = options.clone();
        let image = image.clone();
        let progress = progress.clone();

        tasks.spawn(async move {
            let mut session = Session::with_options(catalog, options);
            session.select_only(selection.iter());
            let ticket = session.begin_scan();

            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => recognizer.recognize(&image.path).await,
                Err(_) => Err(allergen_scan_common::RecognitionFailure::Cancelled),
            };

            let update = session.complete_scan(ticket, result);
            progress.set_message(image.file_name.clone());
            progress.inc(1);

            (index, into_record(&image.file_name, &session, update))
        });
    }

    let mut records: Vec<Option<ScanRecord>> = vec![None; images.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, record)) => records[index] = Some(record),
            Err(e) => tracing::warn!(error = %e, "scan task failed"),
        }
    }
    progress.finish_and_clear();

    records
        .into_iter()
        .zip(images)
        .map(|(record, image)| {
            record.unwrap_or_else(|| {
                ScanRecord::failed(
                    image.file_name.clone(),
                    &allergen_scan_common::RecognitionFailure::Cancelled,
                )
            })
        })
        .collect()
}
