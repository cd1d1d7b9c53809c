//! アレルゲン選択状態
//!
//! ユーザーがチェックしたアレルゲン（代表名）の集合。
//! 書き込むのはセッション（UIイベント側）のみで、照合は読み取るだけ。

use crate::catalog::Catalog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionState {
    selected: BTreeSet<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 選択に追加（追加された場合 true）
    pub fn select<S: Into<String>>(&mut self, chemical_name: S) -> bool {
        self.selected.insert(chemical_name.into())
    }

    /// 選択を解除（解除された場合 true）
    pub fn deselect(&mut self, chemical_name: &str) -> bool {
        self.selected.remove(chemical_name)
    }

    /// チェックを反転し、反転後の状態を返す
    pub fn toggle(&mut self, chemical_name: &str) -> bool {
        if self.selected.remove(chemical_name) {
            false
        } else {
            self.selected.insert(chemical_name.to_string());
            true
        }
    }

    pub fn contains(&self, chemical_name: &str) -> bool {
        self.selected.contains(chemical_name)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(|s| s.as_str())
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// カタログに存在しない名前を取り除き、取り除いた名前を返す
    pub fn retain_known(&mut self, catalog: &Catalog) -> Vec<String> {
        let unknown: Vec<String> = self
            .selected
            .iter()
            .filter(|name| !catalog.contains(name.as_str()))
            .cloned()
            .collect();

        for name in &unknown {
            self.selected.remove(name);
        }

        unknown
    }
}

impl<S: Into<String>> FromIterator<S> for SelectionState {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            selected: iter.into_iter().map(Into::into).collect(),
        }
    }
}
