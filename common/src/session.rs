//! スキャンセッション
//!
//! カタログ・選択状態・現在の正規化テキストを1か所で所有し、
//! OCR完了と選択変更のたびに照合を最初から計算し直す。
//!
//! OCRは非同期で複数同時に走りうるため、スキャンごとに単調増加の
//! 連番（[`ScanTicket`]）を発行し、新しい結果より後に届いた古い結果は捨てる。

use crate::catalog::Catalog;
use crate::error::RecognitionFailure;
use crate::matcher::{match_allergens_with, MatchOptions, MatchReport};
use crate::normalizer::NormalizedText;
use crate::selection::SelectionState;
use std::collections::BTreeSet;
use std::sync::Arc;

/// スキャン1回分の連番
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScanTicket(u64);

impl ScanTicket {
    pub fn seq(&self) -> u64 {
        self.0
    }
}

/// OCR完了を反映した結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanUpdate {
    /// 正規化テキストを更新して再照合した
    Applied(MatchReport),
    /// OCRが失敗した（照合はスキップ）
    RecognitionFailed(RecognitionFailure),
    /// 取り消し済み、またはより新しい結果が反映済みのため破棄した
    Stale,
}

#[derive(Debug, Clone)]
pub struct Session {
    catalog: Arc<Catalog>,
    selection: SelectionState,
    options: MatchOptions,
    current: NormalizedText,
    /// 最後に発行した連番
    issued: u64,
    /// 最後に反映した連番
    last_applied: u64,
    /// この連番以下は reset により全て破棄
    cancelled_through: u64,
    cancelled: BTreeSet<u64>,
}

impl Session {
    /// カタログが読み込めなかった場合は `None` を渡す（空カタログとして扱う）
    pub fn new(catalog: Option<Arc<Catalog>>) -> Self {
        Self::with_options(catalog, MatchOptions::default())
    }

    pub fn with_options(catalog: Option<Arc<Catalog>>, options: MatchOptions) -> Self {
        Self {
            catalog: catalog.unwrap_or_default(),
            selection: SelectionState::default(),
            options,
            current: NormalizedText::default(),
            issued: 0,
            last_applied: 0,
            cancelled_through: 0,
            cancelled: BTreeSet::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    pub fn current_text(&self) -> &NormalizedText {
        &self.current
    }

    /// 最後に反映したスキャン（まだなければ `None`）
    pub fn last_applied(&self) -> Option<ScanTicket> {
        (self.last_applied > 0).then_some(ScanTicket(self.last_applied))
    }

    /// 新しいスキャンを開始し、連番を発行する
    pub fn begin_scan(&mut self) -> ScanTicket {
        self.issued += 1;
        ScanTicket(self.issued)
    }

    /// 実行中のスキャンを取り消す
    pub fn cancel(&mut self, ticket: ScanTicket) {
        if ticket.0 > self.last_applied && ticket.0 > self.cancelled_through {
            self.cancelled.insert(ticket.0);
        }
    }

    /// 実行中のスキャンを全て取り消し、現在のテキストを破棄する
    pub fn reset(&mut self) {
        self.cancelled_through = self.issued;
        self.cancelled.clear();
        self.current = NormalizedText::default();
    }

    /// OCR完了を反映する
    pub fn complete_scan(
        &mut self,
        ticket: ScanTicket,
        result: std::result::Result<String, RecognitionFailure>,
    ) -> ScanUpdate {
        let seq = ticket.0;

        if seq <= self.last_applied || seq <= self.cancelled_through || self.cancelled.remove(&seq)
        {
            tracing::warn!(
                seq,
                last_applied = self.last_applied,
                "discarding stale scan result"
            );
            return ScanUpdate::Stale;
        }

        self.last_applied = seq;
        self.cancelled = self.cancelled.split_off(&(seq + 1));

        let raw = match result {
            Ok(raw) if raw.trim().is_empty() => {
                return ScanUpdate::RecognitionFailed(RecognitionFailure::NoText);
            }
            Ok(raw) => raw,
            Err(failure) => {
                tracing::warn!(seq, error = %failure, "text recognition failed");
                return ScanUpdate::RecognitionFailed(failure);
            }
        };

        self.current = NormalizedText::from_raw(&raw);
        tracing::info!(seq, tokens = self.current.tokens.len(), "scan applied");

        ScanUpdate::Applied(self.report())
    }

    /// 選択を反転して再照合する
    pub fn toggle(&mut self, chemical_name: &str) -> MatchReport {
        if !self.catalog.contains(chemical_name) {
            tracing::warn!(chemical_name, "toggled allergen is not in the catalog");
        }
        self.selection.toggle(chemical_name);
        self.report()
    }

    /// 選択を置き換えて再照合する
    pub fn select_only<I, S>(&mut self, names: I) -> MatchReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = names.into_iter().collect();
        self.report()
    }

    /// 現在のテキストと選択で照合する
    pub fn report(&self) -> MatchReport {
        match_allergens_with(
            self.current.as_str(),
            &self.selection,
            &self.catalog,
            &self.options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AllergenRecord;
    use crate::matcher::MatchOutcome;

    fn session() -> Session {
        let catalog = Catalog::from_records(vec![
            AllergenRecord::new("Soy", &["soylecithin", "soja"]),
            AllergenRecord::new("Milk", &["milk", "casein"]),
        ])
        .unwrap();
        Session::new(Some(Arc::new(catalog)))
    }

    #[test]
    fn test_tickets_are_monotonic() {
        let mut s = session();
        let a = s.begin_scan();
        let b = s.begin_scan();
        assert!(b > a);
        assert_eq!(b.seq(), a.seq() + 1);
    }

    #[test]
    fn test_completion_applies_and_matches() {
        let mut s = session();
        s.select_only(["Soy"]);
        let ticket = s.begin_scan();

        let update = s.complete_scan(ticket, Ok("Contains: SOY-\nLECITHIN, salt".into()));

        match update {
            ScanUpdate::Applied(report) => assert_eq!(report.matched_names(), vec!["Soy"]),
            other => panic!("unexpected update: {:?}", other),
        }
        assert_eq!(s.current_text().as_str(), "Contains\nSOYLECITHIN\nsalt");
        assert_eq!(s.last_applied(), Some(ticket));
    }

    #[test]
    fn test_stale_completion_after_newer_is_discarded() {
        let mut s = session();
        s.select_only(["Milk"]);
        let older = s.begin_scan();
        let newer = s.begin_scan();

        assert!(matches!(
            s.complete_scan(newer, Ok("sugar water".into())),
            ScanUpdate::Applied(_)
        ));
        assert_eq!(s.complete_scan(older, Ok("milk".into())), ScanUpdate::Stale);

        assert_eq!(s.current_text().as_str(), "sugar\nwater");
        assert_eq!(s.report().outcome, MatchOutcome::AllClear);
    }

    #[test]
    fn test_out_of_order_older_first_then_newer_both_apply() {
        let mut s = session();
        let older = s.begin_scan();
        let newer = s.begin_scan();

        assert!(matches!(s.complete_scan(older, Ok("milk".into())), ScanUpdate::Applied(_)));
        assert!(matches!(s.complete_scan(newer, Ok("soja".into())), ScanUpdate::Applied(_)));
        assert_eq!(s.current_text().as_str(), "soja");
    }

    #[test]
    fn test_cancelled_ticket_is_discarded() {
        let mut s = session();
        let ticket = s.begin_scan();
        s.cancel(ticket);

        assert_eq!(s.complete_scan(ticket, Ok("milk".into())), ScanUpdate::Stale);
        assert!(s.current_text().is_empty());
        assert_eq!(s.last_applied(), None);
    }

    #[test]
    fn test_reset_discards_in_flight_and_clears_text() {
        let mut s = session();
        let first = s.begin_scan();
        s.complete_scan(first, Ok("milk".into()));
        let in_flight = s.begin_scan();

        s.reset();

        assert!(s.current_text().is_empty());
        assert_eq!(s.complete_scan(in_flight, Ok("casein".into())), ScanUpdate::Stale);

        let after_reset = s.begin_scan();
        assert!(matches!(
            s.complete_scan(after_reset, Ok("casein".into())),
            ScanUpdate::Applied(_)
        ));
    }

    #[test]
    fn test_recognition_failure_skips_matching_and_keeps_text() {
        let mut s = session();
        let first = s.begin_scan();
        s.complete_scan(first, Ok("milk".into()));

        let failed = s.begin_scan();
        let update = s.complete_scan(failed, Err(RecognitionFailure::Failed("exit 1".into())));

        assert_eq!(
            update,
            ScanUpdate::RecognitionFailed(RecognitionFailure::Failed("exit 1".into()))
        );
        assert_eq!(s.current_text().as_str(), "milk");
    }

    #[test]
    fn test_blank_text_is_recognition_failure() {
        let mut s = session();
        let ticket = s.begin_scan();
        assert_eq!(
            s.complete_scan(ticket, Ok("  \n ".into())),
            ScanUpdate::RecognitionFailed(RecognitionFailure::NoText)
        );
    }

    #[test]
    fn test_toggle_recomputes() {
        let mut s = session();
        let ticket = s.begin_scan();
        s.complete_scan(ticket, Ok("casein, soja".into()));

        assert_eq!(s.report().outcome, MatchOutcome::NothingSelected);
        assert_eq!(s.toggle("Milk").matched_names(), vec!["Milk"]);
        assert_eq!(s.toggle("Soy").matched_names(), vec!["Soy", "Milk"]);
        assert_eq!(s.toggle("Milk").matched_names(), vec!["Soy"]);
    }

    #[test]
    fn test_missing_catalog_reports_no_data() {
        let mut s = Session::new(None);
        let report = s.toggle("Milk");
        assert_eq!(report.outcome, MatchOutcome::NoData);
    }

    #[test]
    fn test_report_without_scan_is_all_clear() {
        let mut s = session();
        assert_eq!(s.toggle("Milk").outcome, MatchOutcome::AllClear);
    }
}
