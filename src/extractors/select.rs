// src/extractors/select.rs
//! Keeps one value per canonical key, preferring the best-ranked context.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::extractors::canonical::{CanonicalKey, Section};
use crate::utils::error::ValueError;

/// Sectioned output of the primary engine. Only resolved keys are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionResult {
    #[serde(rename = "PL")]
    pub pl: BTreeMap<String, f64>,
    #[serde(rename = "BS")]
    pub bs: BTreeMap<String, f64>,
    #[serde(rename = "CF")]
    pub cf: BTreeMap<String, f64>,
    #[serde(skip)]
    pub diagnostics: Diagnostics,
}

/// What happened to the facts that did not end up in the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub facts_seen: usize,
    pub unmapped: usize,
    pub unparsable: BTreeMap<CanonicalKey, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldStatus {
    Present(f64),
    /// Facts mapped to the key, but none carried a usable number.
    Unparsable,
    Absent,
}

impl ExtractionResult {
    pub fn section(&self, section: Section) -> &BTreeMap<String, f64> {
        match section {
            Section::PL => &self.pl,
            Section::BS => &self.bs,
            Section::CF => &self.cf,
        }
    }

    fn section_mut(&mut self, section: Section) -> &mut BTreeMap<String, f64> {
        match section {
            Section::PL => &mut self.pl,
            Section::BS => &mut self.bs,
            Section::CF => &mut self.cf,
        }
    }

    pub fn get(&self, key: CanonicalKey) -> Option<f64> {
        self.section(key.section()).get(key.label()).copied()
    }

    pub fn status(&self, key: CanonicalKey) -> FieldStatus {
        match self.get(key) {
            Some(value) => FieldStatus::Present(value),
            None if self.diagnostics.unparsable.contains_key(&key) => FieldStatus::Unparsable,
            None => FieldStatus::Absent,
        }
    }

    pub fn len(&self) -> usize {
        self.pl.len() + self.bs.len() + self.cf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Picked {
    value: f64,
    rank: usize,
    source: String,
}

/// Accumulates candidate values fact by fact.
#[derive(Debug, Default)]
pub struct Selection {
    picked: BTreeMap<CanonicalKey, Picked>,
    diagnostics: Diagnostics,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_seen(&mut self) {
        self.diagnostics.facts_seen += 1;
    }

    pub fn note_unmapped(&mut self) {
        self.diagnostics.unmapped += 1;
    }

    pub fn note_unparsable(&mut self, key: CanonicalKey, error: &ValueError) {
        self.diagnostics
            .unparsable
            .entry(key)
            .or_default()
            .push(error.to_string());
    }

    /// Records `value` unless an equal or better rank is already held.
    /// Returns whether the value was taken.
    pub fn offer(&mut self, key: CanonicalKey, value: f64, rank: usize, source: &str) -> bool {
        match self.picked.get(&key) {
            Some(current) if current.rank <= rank => {
                tracing::trace!(
                    "Keeping {:?} from '{}' (rank {}) over '{}' (rank {})",
                    key, current.source, current.rank, source, rank
                );
                false
            }
            _ => {
                self.picked.insert(
                    key,
                    Picked {
                        value,
                        rank,
                        source: source.to_string(),
                    },
                );
                true
            }
        }
    }

    pub fn finish(self) -> ExtractionResult {
        let mut result = ExtractionResult {
            diagnostics: self.diagnostics,
            ..ExtractionResult::default()
        };
        for (key, picked) in self.picked {
            result
                .section_mut(key.section())
                .insert(key.label().to_string(), picked.value);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_better_rank_overwrites() {
        let mut selection = Selection::new();
        assert!(selection.offer(CanonicalKey::Revenue, 1.0, 3, "a"));
        assert!(selection.offer(CanonicalKey::Revenue, 2.0, 0, "b"));
        assert!(!selection.offer(CanonicalKey::Revenue, 3.0, 1, "c"));
        assert_eq!(selection.finish().get(CanonicalKey::Revenue), Some(2.0));
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let mut selection = Selection::new();
        selection.offer(CanonicalKey::NetIncome, 10.0, 0, "jppfs_cor:ProfitLoss");
        selection.offer(CanonicalKey::NetIncome, 20.0, 0, "当期純利益");
        assert_eq!(selection.finish().get(CanonicalKey::NetIncome), Some(10.0));
    }

    #[test]
    fn test_result_is_sparse_and_sectioned() {
        let mut selection = Selection::new();
        selection.offer(CanonicalKey::TotalAssets, 100.0, 0, "x");
        selection.offer(CanonicalKey::FinancingCF, -5.0, 0, "y");
        let result = selection.finish();

        assert!(result.pl.is_empty());
        assert_eq!(result.bs.get("総資産"), Some(&100.0));
        assert_eq!(result.cf.get("財務CF"), Some(&-5.0));
        assert_eq!(result.len(), 2);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"PL": {}, "BS": {"総資産": 100.0}, "CF": {"財務CF": -5.0}})
        );
    }

    #[test]
    fn test_field_status_distinguishes_unparsable() {
        let mut selection = Selection::new();
        selection.note_unparsable(CanonicalKey::GrossProfit, &ValueError::Unparsable("－".into()));
        selection.offer(CanonicalKey::Revenue, 1.0, 0, "x");
        let result = selection.finish();

        assert_eq!(result.status(CanonicalKey::Revenue), FieldStatus::Present(1.0));
        assert_eq!(result.status(CanonicalKey::GrossProfit), FieldStatus::Unparsable);
        assert_eq!(result.status(CanonicalKey::OperatingCF), FieldStatus::Absent);
    }
}
