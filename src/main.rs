use allergen_scan::{cli, config, error, ocr, pipeline, report, scanner, selector};
use allergen_scan_common::{normalize, MatchOptions, Session};
use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, SelectionArgs};
use config::Config;
use ocr::{CachedRecognizer, OcrCache, TesseractCli};
use report::ScanRecord;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// ファイルまたは標準入力からテキストを読む
fn read_input(input: Option<&Path>) -> anyhow::Result<(String, String)> {
    match input {
        Some(path) if path != Path::new("-") => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("入力ファイルを読み込めません: {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            Ok((name, text))
        }
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("標準入力を読み込めません")?;
            Ok(("stdin".to_string(), text))
        }
    }
}

fn match_options(match_chemical_name: bool) -> MatchOptions {
    MatchOptions {
        match_chemical_name,
    }
}

fn print_records(records: &[ScanRecord], json: bool, verbose: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
    } else {
        for record in records {
            report::print_record(record, verbose);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_scan(
    config: &Config,
    catalog_path: PathBuf,
    paths: Vec<PathBuf>,
    selection_args: SelectionArgs,
    lang: Option<String>,
    use_cache: bool,
    recursive: bool,
    jobs: Option<usize>,
    verbose: bool,
) -> anyhow::Result<()> {
    let quiet = selection_args.json;
    if !quiet {
        println!("🔍 allergen-scan - ラベルスキャン\n");
        println!("[1/3] 画像を検索中...");
    }

    let images = scanner::scan_paths(&paths, recursive)?;
    if images.is_empty() {
        let joined = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(error::AllergenScanError::NoImagesFound(joined).into());
    }
    if !quiet {
        println!("✔ {}枚の画像を検出\n", images.len());
    }

    let catalog = pipeline::load_catalog(&catalog_path);
    let selection = pipeline::resolve_selection(
        catalog.as_deref(),
        &selection_args.allergens,
        selection_args.interactive_select,
    )?;

    let language = lang.unwrap_or_else(|| config.language.clone());
    let jobs = jobs.unwrap_or(config.jobs);
    let tesseract = TesseractCli::new(
        config.tesseract_command.clone(),
        language.clone(),
        Duration::from_secs(config.timeout_seconds),
    );
    let options = match_options(selection_args.match_chemical_name);

    if !quiet {
        println!(
            "[2/3] 文字認識中...{}",
            if use_cache { " (キャッシュ有効)" } else { "" }
        );
    }

    let records = if use_cache {
        let recognizer = Arc::new(CachedRecognizer::new(tesseract, language));
        let records = pipeline::scan_images(
            &images,
            Arc::clone(&recognizer),
            catalog,
            &selection,
            &options,
            jobs,
            !quiet,
        )
        .await;
        recognizer.save()?;
        records
    } else {
        pipeline::scan_images(
            &images,
            Arc::new(tesseract),
            catalog,
            &selection,
            &options,
            jobs,
            !quiet,
        )
        .await
    };

    if !quiet {
        println!("✔ 認識完了\n");
        println!("[3/3] 照合結果\n");
    }
    print_records(&records, quiet, verbose)?;

    if !quiet {
        let flagged = records.iter().filter(|r| r.has_matches()).count();
        let failed = records.iter().filter(|r| r.error.is_some()).count();
        println!(
            "✅ 完了: {}枚中 {}枚でアレルゲンを検出{}",
            records.len(),
            flagged,
            if failed > 0 {
                format!("（{}枚は読み取り失敗）", failed)
            } else {
                String::new()
            }
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load().context("設定ファイルを読み込めません")?;
    let catalog_path = config.resolve_catalog_path(cli.catalog.clone());

    match cli.command {
        Commands::Scan {
            paths,
            selection,
            lang,
            use_cache,
            recursive,
            jobs,
        } => {
            run_scan(
                &config,
                catalog_path,
                paths,
                selection,
                lang,
                use_cache,
                recursive,
                jobs,
                cli.verbose,
            )
            .await?;
        }

        Commands::Check { input, selection } => {
            let (name, text) = read_input(input.as_deref())?;
            let catalog = pipeline::load_catalog(&catalog_path);
            let selected = pipeline::resolve_selection(
                catalog.as_deref(),
                &selection.allergens,
                selection.interactive_select,
            )?;

            let record = pipeline::check_text(
                &name,
                &text,
                catalog,
                &selected,
                &match_options(selection.match_chemical_name),
            );
            print_records(&[record], selection.json, cli.verbose)?;
        }

        Commands::Normalize { input } => {
            let (_, text) = read_input(input.as_deref())?;
            println!("{}", normalize(&text));
        }

        Commands::Catalog { names_only } => {
            let catalog = allergen_scan_common::Catalog::load(&catalog_path)
                .with_context(|| format!("カタログ: {}", catalog_path.display()))?;

            for record in catalog.iter() {
                if names_only {
                    println!("{}", record.chemical_name);
                } else {
                    println!("{}", record.chemical_name);
                    for name in &record.alternative_names {
                        println!("  - {}", name);
                    }
                }
            }
            if !names_only {
                println!("\n{}種類のアレルゲン", catalog.len());
            }
        }

        Commands::Session {
            lang,
            match_chemical_name,
        } => {
            let catalog = pipeline::load_catalog(&catalog_path);
            let session = Session::with_options(catalog, match_options(match_chemical_name));
            let recognizer = TesseractCli::new(
                config.tesseract_command.clone(),
                lang.unwrap_or_else(|| config.language.clone()),
                Duration::from_secs(config.timeout_seconds),
            );

            selector::run_interactive_session(session, Arc::new(recognizer)).await?;
        }

        Commands::Config {
            set_catalog,
            set_language,
            set_tesseract,
            show,
        } => {
            let mut config = config;

            if let Some(path) = set_catalog {
                config.set_catalog_path(path)?;
                println!("✔ カタログのパスを設定しました");
            }

            if let Some(language) = set_language {
                config.set_language(language)?;
                println!("✔ OCR言語を設定しました");
            }

            if let Some(command) = set_tesseract {
                config.set_tesseract_command(command)?;
                println!("✔ tesseractコマンドを設定しました");
            }

            if show {
                println!("設定:");
                println!("  カタログ: {}", config.resolve_catalog_path(None).display());
                println!("  OCR言語: {}", config.language);
                println!("  tesseract: {}", config.tesseract_command);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  同時実行数: {}", config.jobs);
            }
        }

        Commands::Cache { clear, folder, info } => {
            let target = folder.unwrap_or_else(|| PathBuf::from("."));
            let cache_path = OcrCache::cache_path(&target);

            if info || !clear {
                // デフォルトまたは--info: 情報表示
                if cache_path.exists() {
                    let cache = OcrCache::load(&target);
                    println!("キャッシュ情報:");
                    println!("  パス: {}", cache_path.display());
                    println!("  件数: {}", cache.len());
                    if let Ok(meta) = std::fs::metadata(&cache_path) {
                        println!("  サイズ: {} bytes", meta.len());
                    }
                } else {
                    println!("キャッシュファイルが存在しません: {}", cache_path.display());
                }
            }

            if clear {
                match OcrCache::clear(&target) {
                    Ok(true) => println!("✔ キャッシュを削除しました: {}", cache_path.display()),
                    Ok(false) => println!("キャッシュファイルが存在しません"),
                    Err(e) => println!("キャッシュ削除エラー: {}", e),
                }
            }
        }
    }

    Ok(())
}
