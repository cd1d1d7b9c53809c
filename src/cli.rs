use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "allergen-scan")]
#[command(about = "食品ラベルのOCRテキストからアレルゲンを検出するツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// アレルゲンカタログJSON（省略時は設定ファイル → data/allergens.json）
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,
}

/// 照合対象の指定（scan/check 共通）
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// 検出するアレルゲン（代表名、複数指定可）
    #[arg(short, long = "allergen", value_name = "NAME")]
    pub allergens: Vec<String>,

    /// 対話式でアレルゲンを選択
    #[arg(long)]
    pub interactive_select: bool,

    /// 別名に加えて代表名そのものも照合
    #[arg(long)]
    pub match_chemical_name: bool,

    /// 結果をJSONで出力
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// ラベル画像をOCRしてアレルゲンを照合
    Scan {
        /// 画像ファイルまたはフォルダ
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        selection: SelectionArgs,

        /// OCR言語（tesseractの言語コード、省略時は設定値）
        #[arg(short, long)]
        lang: Option<String>,

        /// キャッシュを使用（再認識をスキップ）
        #[arg(long)]
        use_cache: bool,

        /// サブフォルダも再帰的にスキャン
        #[arg(short = 'r', long)]
        recursive: bool,

        /// 同時に実行するOCR数（省略時は設定値）
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// 認識済みテキストを照合（ファイルまたは標準入力）
    Check {
        /// テキストファイル（省略時または `-` で標準入力）
        input: Option<PathBuf>,

        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// テキストを正規化して表示
    Normalize {
        /// テキストファイル（省略時または `-` で標準入力）
        input: Option<PathBuf>,
    },

    /// カタログのアレルゲン一覧を表示
    Catalog {
        /// 代表名のみ表示
        #[arg(long)]
        names_only: bool,
    },

    /// 対話式スキャンセッション
    Session {
        /// OCR言語
        #[arg(short, long)]
        lang: Option<String>,

        /// 別名に加えて代表名そのものも照合
        #[arg(long)]
        match_chemical_name: bool,
    },

    /// 設定を表示/編集
    Config {
        /// カタログのパスを設定
        #[arg(long)]
        set_catalog: Option<PathBuf>,

        /// OCR言語を設定
        #[arg(long)]
        set_language: Option<String>,

        /// tesseractコマンドを設定
        #[arg(long)]
        set_tesseract: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },

    /// OCRキャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// 対象フォルダ（省略時はカレント）
        #[arg(short, long)]
        folder: Option<PathBuf>,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },
}
