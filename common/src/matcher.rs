//! アレルゲン照合
//!
//! 正規化済みテキストと選択中のアレルゲンを照合し、どの別名が一致したかを返す。
//!
//! 照合は単語境界ではなく部分一致で行う。OCRは単語の区切りを壊したり
//! くっつけたりするため、完全一致では取りこぼしが多い。その代わり、
//! 無関係な長い単語の中に別名が含まれていても一致として報告される。

use crate::catalog::Catalog;
use crate::selection::SelectionState;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 照合オプション
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// 別名に加えて代表名そのものも照合する
    pub match_chemical_name: bool,
}

/// 一致のきっかけになった別名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTrigger {
    /// 一致した別名（小文字化済み）
    pub alternative_name: String,
    /// テキスト中で一致した部分（元の大文字小文字）
    pub matched_text: String,
}

/// アレルゲン1件分の一致結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllergenMatch {
    pub chemical_name: String,
    pub triggers: Vec<MatchTrigger>,
}

/// 照合の結果状態
///
/// `NoData` / `NothingSelected` は「安全」ではない。
/// 利用側は `AllClear` の場合のみ「アレルゲンなし」と表示すること。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "matches", rename_all = "snake_case")]
pub enum MatchOutcome {
    /// カタログが空（未読み込み）
    NoData,
    /// アレルゲンが1つも選択されていない
    NothingSelected,
    /// 選択中のアレルゲンは見つからなかった
    AllClear,
    /// 一致あり
    Found(Vec<AllergenMatch>),
}

/// 照合レポート
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    pub outcome: MatchOutcome,
    /// 選択中アレルゲンの別名一覧（重複除去、一致の有無に関係なく）
    pub alternative_names: Vec<String>,
}

impl MatchReport {
    fn without_aliases(outcome: MatchOutcome) -> Self {
        Self {
            outcome,
            alternative_names: Vec::new(),
        }
    }

    /// 一致したアレルゲン（なければ空）
    pub fn matches(&self) -> &[AllergenMatch] {
        match &self.outcome {
            MatchOutcome::Found(matches) => matches,
            _ => &[],
        }
    }

    pub fn has_matches(&self) -> bool {
        !self.matches().is_empty()
    }

    /// 一致したアレルゲンの代表名
    pub fn matched_names(&self) -> Vec<&str> {
        self.matches()
            .iter()
            .map(|m| m.chemical_name.as_str())
            .collect()
    }
}

/// 正規化済みテキストと選択中アレルゲンを照合する
pub fn match_allergens(text: &str, selection: &SelectionState, catalog: &Catalog) -> MatchReport {
    match_allergens_with(text, selection, catalog, &MatchOptions::default())
}

/// オプション付きで照合する
pub fn match_allergens_with(
    text: &str,
    selection: &SelectionState,
    catalog: &Catalog,
    options: &MatchOptions,
) -> MatchReport {
    if catalog.is_empty() {
        return MatchReport::without_aliases(MatchOutcome::NoData);
    }

    if selection.is_empty() {
        return MatchReport::without_aliases(MatchOutcome::NothingSelected);
    }

    let haystack = LoweredText::new(text);
    let mut matches = Vec::new();
    let mut alternative_names = Vec::new();
    let mut seen_names: HashSet<&str> = HashSet::new();

    for record in catalog.iter() {
        if !selection.contains(&record.chemical_name) {
            continue;
        }

        for name in &record.alternative_names {
            if seen_names.insert(name.as_str()) {
                alternative_names.push(name.clone());
            }
        }

        let mut candidates: Vec<String> = Vec::with_capacity(record.alternative_names.len() + 1);
        if options.match_chemical_name {
            candidates.push(record.chemical_name.to_lowercase());
        }
        candidates.extend(record.alternative_names.iter().map(|n| n.to_lowercase()));

        let mut triggered: HashSet<String> = HashSet::new();
        let mut triggers = Vec::new();

        for candidate in candidates {
            if candidate.is_empty() || triggered.contains(&candidate) {
                continue;
            }

            if let Some(matched_text) = haystack.find(&candidate) {
                triggers.push(MatchTrigger {
                    alternative_name: candidate.clone(),
                    matched_text: matched_text.to_string(),
                });
                triggered.insert(candidate);
            }
        }

        if !triggers.is_empty() {
            matches.push(AllergenMatch {
                chemical_name: record.chemical_name.clone(),
                triggers,
            });
        }
    }

    tracing::debug!(
        text_len = text.len(),
        selected = selection.len(),
        matched = matches.len(),
        aliases = alternative_names.len(),
        "allergen match computed"
    );

    let outcome = if matches.is_empty() {
        MatchOutcome::AllClear
    } else {
        MatchOutcome::Found(matches)
    };

    MatchReport {
        outcome,
        alternative_names,
    }
}

/// 小文字化したテキストと元テキストの位置対応
///
/// 小文字化でバイト長が変わる文字があっても、一致箇所を元テキスト上で切り出せるようにする。
struct LoweredText<'a> {
    original: &'a str,
    lowered: String,
    /// lowered のバイト位置 → original のバイト位置（末尾の番兵を含む）
    offsets: Vec<(usize, usize)>,
}

impl<'a> LoweredText<'a> {
    fn new(original: &'a str) -> Self {
        let mut lowered = String::with_capacity(original.len());
        let mut offsets = Vec::with_capacity(original.len() + 1);

        for (pos, ch) in original.char_indices() {
            offsets.push((lowered.len(), pos));
            lowered.extend(ch.to_lowercase());
        }
        offsets.push((lowered.len(), original.len()));

        Self {
            original,
            lowered,
            offsets,
        }
    }

    /// 小文字化済みの needle を探し、元テキスト上の一致部分を返す
    fn find(&self, needle: &str) -> Option<&'a str> {
        let start = self.lowered.find(needle)?;
        let end = start + needle.len();

        let original_start = self.to_original(start, false);
        let original_end = self.to_original(end, true);

        Some(&self.original[original_start..original_end])
    }

    fn to_original(&self, lowered_pos: usize, round_up: bool) -> usize {
        match self.offsets.binary_search_by_key(&lowered_pos, |&(l, _)| l) {
            Ok(i) => self.offsets[i].1,
            // 小文字化で複数文字に展開された文字の途中
            Err(i) if round_up => self.offsets[i].1,
            Err(i) => self.offsets[i - 1].1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AllergenRecord;
    use crate::normalizer::normalize;

    fn sample_catalog() -> Catalog {
        Catalog::from_records(vec![
            AllergenRecord::new("Soy", &["soja", "soylecithin", "E322"]),
            AllergenRecord::new("Milk", &["milk", "casein", "Lactose"]),
            AllergenRecord::new("Egg", &["egg", "albumin", "ovalbumin"]),
            AllergenRecord::new("Sesame", &[]),
        ])
        .unwrap()
    }

    fn select(names: &[&str]) -> SelectionState {
        names.iter().copied().collect()
    }

    #[test]
    fn test_label_example_end_to_end() {
        let catalog = Catalog::from_records(vec![AllergenRecord::new("Soy", &["soylecithin"])])
            .unwrap();
        let text = normalize("Contains: SOY-\nLECITHIN, salt");

        let report = match_allergens(&text, &select(&["Soy"]), &catalog);

        assert_eq!(
            report.outcome,
            MatchOutcome::Found(vec![AllergenMatch {
                chemical_name: "Soy".to_string(),
                triggers: vec![MatchTrigger {
                    alternative_name: "soylecithin".to_string(),
                    matched_text: "SOYLECITHIN".to_string(),
                }],
            }])
        );
    }

    #[test]
    fn test_all_clear_lists_aliases() {
        let catalog = Catalog::from_records(vec![AllergenRecord::new("Milk", &["milk", "casein"])])
            .unwrap();

        let report = match_allergens("sugar water", &select(&["Milk"]), &catalog);

        assert_eq!(report.outcome, MatchOutcome::AllClear);
        assert_eq!(report.alternative_names.join("\n"), "milk\ncasein");
    }

    #[test]
    fn test_empty_catalog_is_no_data() {
        let report = match_allergens("milk", &select(&["Milk"]), &Catalog::default());
        assert_eq!(report.outcome, MatchOutcome::NoData);
        assert_ne!(report.outcome, MatchOutcome::AllClear);
        assert!(report.alternative_names.is_empty());
    }

    #[test]
    fn test_empty_selection_is_nothing_selected() {
        let report = match_allergens("milk", &SelectionState::default(), &sample_catalog());
        assert_eq!(report.outcome, MatchOutcome::NothingSelected);
        assert!(!report.has_matches());
    }

    #[test]
    fn test_empty_text_is_all_clear() {
        let report = match_allergens("", &select(&["Milk"]), &sample_catalog());
        assert_eq!(report.outcome, MatchOutcome::AllClear);
        assert_eq!(report.alternative_names, vec!["milk", "casein", "Lactose"]);
    }

    #[test]
    fn test_unselected_allergen_not_reported() {
        let text = normalize("sugar, MILK powder, soja");

        let milk_only = match_allergens(&text, &select(&["Milk"]), &sample_catalog());
        assert_eq!(milk_only.matched_names(), vec!["Milk"]);

        let egg_only = match_allergens(&text, &select(&["Egg"]), &sample_catalog());
        assert_eq!(egg_only.outcome, MatchOutcome::AllClear);
    }

    #[test]
    fn test_match_is_case_insensitive_both_ways() {
        let text = normalize("LACTOSE, dextrose");
        let report = match_allergens(&text, &select(&["Milk"]), &sample_catalog());

        let triggers = &report.matches()[0].triggers;
        assert_eq!(triggers[0].alternative_name, "lactose");
        assert_eq!(triggers[0].matched_text, "LACTOSE");
    }

    #[test]
    fn test_substring_inside_longer_word_is_accepted_false_positive() {
        // "egg" は "eggplant" の中にも含まれる。部分一致の仕様上の既知の誤検出。
        let text = normalize("grilled eggplant, olive oil");
        let report = match_allergens(&text, &select(&["Egg"]), &sample_catalog());

        assert_eq!(report.matched_names(), vec!["Egg"]);
        assert_eq!(report.matches()[0].triggers[0].matched_text, "egg");
    }

    #[test]
    fn test_ocr_merged_words_still_match() {
        let text = normalize("wheyproteincasein-\nate");
        let report = match_allergens(&text, &select(&["Milk"]), &sample_catalog());
        assert_eq!(report.matched_names(), vec!["Milk"]);
    }

    #[test]
    fn test_every_matching_alias_reported_once() {
        let catalog = Catalog::from_records(vec![AllergenRecord::new(
            "Egg",
            &["egg", "albumin", "ovalbumin", "EGG"],
        )])
        .unwrap();
        let text = normalize("egg ovalbumin egg");

        let report = match_allergens(&text, &select(&["Egg"]), &catalog);
        let names: Vec<&str> = report.matches()[0]
            .triggers
            .iter()
            .map(|t| t.alternative_name.as_str())
            .collect();

        assert_eq!(names, vec!["egg", "albumin", "ovalbumin"]);
    }

    #[test]
    fn test_matches_follow_catalog_order() {
        let text = normalize("E322, casein");
        let report = match_allergens(&text, &select(&["Milk", "Soy"]), &sample_catalog());
        assert_eq!(report.matched_names(), vec!["Soy", "Milk"]);
    }

    #[test]
    fn test_alias_list_deduplicated_across_allergens() {
        let catalog = Catalog::from_records(vec![
            AllergenRecord::new("Milk", &["milk", "whey"]),
            AllergenRecord::new("Lactose", &["whey", "lactose"]),
        ])
        .unwrap();

        let report = match_allergens("bread", &select(&["Milk", "Lactose"]), &catalog);
        assert_eq!(report.alternative_names, vec!["milk", "whey", "lactose"]);
    }

    #[test]
    fn test_unknown_selected_name_is_ignored() {
        let report = match_allergens("peanut", &select(&["Peanut"]), &sample_catalog());
        assert_eq!(report.outcome, MatchOutcome::AllClear);
        assert!(report.alternative_names.is_empty());
    }

    #[test]
    fn test_allergen_without_aliases_never_matches_by_default() {
        let report = match_allergens("sesame seeds", &select(&["Sesame"]), &sample_catalog());
        assert_eq!(report.outcome, MatchOutcome::AllClear);
    }

    #[test]
    fn test_chemical_name_matching_option() {
        let options = MatchOptions {
            match_chemical_name: true,
        };
        let report = match_allergens_with(
            "Sesame seeds",
            &select(&["Sesame"]),
            &sample_catalog(),
            &options,
        );

        assert_eq!(report.matched_names(), vec!["Sesame"]);
        assert_eq!(report.matches()[0].triggers[0].alternative_name, "sesame");
        assert_eq!(report.matches()[0].triggers[0].matched_text, "Sesame");
    }

    #[test]
    fn test_non_ascii_text_maps_back_to_original() {
        let catalog =
            Catalog::from_records(vec![AllergenRecord::new("Celery", &["selderij"])]).unwrap();
        let report = match_allergens("İ SELDERIJ", &select(&["Celery"]), &catalog);

        assert_eq!(report.matches()[0].triggers[0].matched_text, "SELDERIJ");
    }

    #[test]
    fn test_deterministic() {
        let text = normalize("soja, casein, egg, E322");
        let selection = select(&["Soy", "Milk", "Egg"]);
        let first = match_allergens(&text, &selection, &sample_catalog());
        for _ in 0..5 {
            assert_eq!(match_allergens(&text, &selection, &sample_catalog()), first);
        }
    }

    #[test]
    fn test_report_serializes_with_state_tag() {
        let report = match_allergens("", &SelectionState::default(), &sample_catalog());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"]["state"], "nothing_selected");
    }
}
