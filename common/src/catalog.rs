//! アレルゲンカタログ
//!
//! アレルゲン名と別名（化学名・商品名・E番号など）の対応表。
//! 起動時に一度だけJSONから読み込み、以降は変更しない。
//!
//! JSON形式:
//! ```json
//! [{ "chemical_name": "Soy", "alternative_names": ["soja", "soylecithin"] }]
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// アレルゲン1件分の定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllergenRecord {
    /// 代表名（カタログ内で一意）
    pub chemical_name: String,
    /// ラベル上に現れうる別名
    #[serde(default)]
    pub alternative_names: Vec<String>,
}

impl AllergenRecord {
    pub fn new<S: Into<String>>(chemical_name: S, alternative_names: &[&str]) -> Self {
        Self {
            chemical_name: chemical_name.into(),
            alternative_names: alternative_names.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// 読み込み済みのアレルゲンカタログ（読み取り専用）
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<AllergenRecord>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// レコード列からカタログを構築（不変条件を検証）
    pub fn from_records(records: Vec<AllergenRecord>) -> Result<Self> {
        let mut index = HashMap::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            if record.chemical_name.trim().is_empty() {
                return Err(Error::InvalidCatalog(format!(
                    "record #{} has an empty chemical_name",
                    i
                )));
            }

            if index.insert(record.chemical_name.clone(), i).is_some() {
                return Err(Error::InvalidCatalog(format!(
                    "duplicate chemical_name '{}'",
                    record.chemical_name
                )));
            }

            if let Some(pos) = record
                .alternative_names
                .iter()
                .position(|name| name.trim().to_lowercase().is_empty())
            {
                return Err(Error::InvalidCatalog(format!(
                    "'{}' has an empty alternative name at position {}",
                    record.chemical_name, pos
                )));
            }
        }

        Ok(Self { records, index })
    }

    /// JSON文字列から読み込み
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<AllergenRecord> = serde_json::from_str(json)
            .map_err(|e| Error::DataUnavailable(format!("JSONパースエラー: {}", e)))?;
        Self::from_records(records)
    }

    /// JSONファイルから読み込み（非WASM環境のみ）
    #[cfg(not(feature = "wasm"))]
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::DataUnavailable(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::from_json(&content)?;

        tracing::info!(
            path = %path.display(),
            allergens = catalog.len(),
            "allergen catalog loaded"
        );

        Ok(catalog)
    }

    /// 代表名でレコードを取得
    pub fn get(&self, chemical_name: &str) -> Option<&AllergenRecord> {
        self.index.get(chemical_name).map(|&i| &self.records[i])
    }

    pub fn contains(&self, chemical_name: &str) -> bool {
        self.index.contains_key(chemical_name)
    }

    /// 読み込み順でレコードを走査
    pub fn iter(&self) -> impl Iterator<Item = &AllergenRecord> {
        self.records.iter()
    }

    /// 代表名の一覧（読み込み順）
    pub fn chemical_names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.chemical_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
