use crate::error::{AllergenScanError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const CATALOG_ENV: &str = "ALLERGEN_SCAN_CATALOG";
const DEFAULT_CATALOG: &str = "data/allergens.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog_path: Option<PathBuf>,
    /// tesseract の言語コード
    pub language: String,
    pub tesseract_command: String,
    pub timeout_seconds: u64,
    /// 同時に走らせるOCRプロセス数
    pub jobs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: None,
            language: "nld".into(), // ラベルはオランダ語が主
            tesseract_command: "tesseract".into(),
            timeout_seconds: 120,
            jobs: 2,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AllergenScanError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("allergen-scan").join("config.json"))
    }

    /// カタログのパスを解決する（引数 > 環境変数 > 設定ファイル > 既定値）
    pub fn resolve_catalog_path(&self, cli_override: Option<PathBuf>) -> PathBuf {
        cli_override
            .or_else(|| std::env::var_os(CATALOG_ENV).map(PathBuf::from))
            .or_else(|| self.catalog_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG))
    }

    pub fn set_catalog_path(&mut self, path: PathBuf) -> Result<()> {
        self.catalog_path = Some(path);
        self.save()
    }

    pub fn set_language(&mut self, language: String) -> Result<()> {
        if language.trim().is_empty() {
            return Err(AllergenScanError::Config("言語コードが空です".into()));
        }
        self.language = language;
        self.save()
    }

    pub fn set_tesseract_command(&mut self, command: String) -> Result<()> {
        self.tesseract_command = command;
        self.save()
    }
}
