// src/extractors/engine.rs
//! Primary extraction pipeline, plus the combined entry point that falls back
//! to the text extractor.

use serde::Serialize;

use crate::document::{self, LoadedDocument};
use crate::extractors::canonical;
use crate::extractors::context::ContextTable;
use crate::extractors::facts::{self, DocumentShape};
use crate::extractors::fallback::{self, FallbackResult};
use crate::extractors::select::{ExtractionResult, Selection};
use crate::extractors::value;
use crate::utils::error::LoadError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Extra unit string checked for percent markers on every fact.
    pub unit_hint: Option<String>,
}

/// Output of [`extract_auto`]. The two engines report absence differently:
/// primary results omit unresolved keys, fallback results list them as null.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "engine", rename_all = "snake_case")]
pub enum Extraction {
    Primary {
        #[serde(flatten)]
        result: ExtractionResult,
    },
    Fallback {
        #[serde(flatten)]
        result: FallbackResult,
    },
}

pub fn extract(bytes: &[u8]) -> Result<ExtractionResult, LoadError> {
    extract_with(bytes, &ExtractOptions::default())
}

pub fn extract_with(bytes: &[u8], options: &ExtractOptions) -> Result<ExtractionResult, LoadError> {
    let document = document::load(bytes)?;
    Ok(extract_document(&document, options))
}

/// Runs contexts, facts, normalization, mapping and selection over a loaded tree.
pub fn extract_document(document: &LoadedDocument, options: &ExtractOptions) -> ExtractionResult {
    let root = &document.root;
    let contexts = ContextTable::resolve(root);
    let unit_hint = options.unit_hint.as_deref();

    let mut selection = Selection::new();
    for fact in facts::enumerate(root) {
        selection.note_seen();

        let resolved = canonical::resolve(&fact.name).or_else(|| canonical::resolve(&fact.text));
        let Some(key) = resolved else {
            selection.note_unmapped();
            continue;
        };

        let normalized = match value::normalize(&fact, unit_hint) {
            Ok(normalized) => normalized,
            Err(e) => {
                tracing::debug!("Skipping '{}' for {:?}: {}", fact.name, key, e);
                selection.note_unparsable(key, &e);
                continue;
            }
        };

        let rank = contexts.rank_of(fact.context_ref());
        selection.offer(key, normalized.value, rank, &fact.name);
    }

    let result = selection.finish();
    tracing::info!(
        "Extracted {} line items from {:?} document ({:?}, {:?} parse): \
         {} facts, {} contexts, {} unmapped",
        result.len(),
        DocumentShape::of(root),
        document.source,
        document.mode,
        result.diagnostics.facts_seen,
        contexts.len(),
        result.diagnostics.unmapped,
    );
    result
}

/// Primary engine first; the text extractor when loading fails or nothing resolves.
pub fn extract_auto(bytes: &[u8], options: &ExtractOptions) -> Extraction {
    let primary = match extract_with(bytes, options) {
        Ok(result) if !result.is_empty() => return Extraction::Primary { result },
        Ok(result) => {
            tracing::debug!("Primary engine resolved nothing, trying text fallback");
            Some(result)
        }
        Err(e) => {
            tracing::warn!("Primary engine failed ({}), trying text fallback", e);
            None
        }
    };

    let fallback = fallback::extract_fallback(bytes);
    match primary {
        Some(result) if !fallback.has_any_value() => Extraction::Primary { result },
        _ => Extraction::Fallback { result: fallback },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::canonical::CanonicalKey;
    use crate::extractors::select::FieldStatus;

    const INLINE: &str = r#"<html xmlns:ix="http://www.xbrl.org/2013/inlineXBRL"
               xmlns:xbrli="http://www.xbrl.org/2003/instance">
  <xbrli:context id="C1">
    <xbrli:entity><xbrli:identifier scheme="http://example.com">E</xbrli:identifier></xbrli:entity>
    <xbrli:period><xbrli:startDate>2023-04-01</xbrli:startDate><xbrli:endDate>2024-03-31</xbrli:endDate></xbrli:period>
  </xbrli:context>
  <ix:nonFraction name="jppfs_cor:NetSales" contextRef="C1">1,234</ix:nonFraction>
  <ix:nonFraction name="jppfs_cor:OperatingIncome" contextRef="C1">(567)</ix:nonFraction>
  <ix:nonFraction name="jppfs_cor:Assets" contextRef="C1">10000</ix:nonFraction>
  <ix:nonFraction name="jppfs_cor:NetCashProvidedByUsedInOperatingActivities" contextRef="C1">900</ix:nonFraction>
</html>"#;

    #[test]
    fn test_minimal_inline_document() {
        let result = extract(INLINE.as_bytes()).expect("raw markup always loads");

        assert_eq!(result.pl.get("売上高"), Some(&1234.0));
        assert_eq!(result.pl.get("営業利益"), Some(&-567.0));
        assert_eq!(result.bs.get("総資産"), Some(&10000.0));
        assert_eq!(result.cf.get("営業CF"), Some(&900.0));
        assert_eq!(result.len(), 4);
        assert_eq!(result.diagnostics.facts_seen, 4);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let first = extract(INLINE.as_bytes()).unwrap();
        let second = extract(INLINE.as_bytes()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unit_hint_option() {
        let doc = r#"<html xmlns:ix="http://www.xbrl.org/2013/inlineXBRL"><ix:nonFraction name="EquityRatio" contextRef="X">45</ix:nonFraction></html>"#;
        let options = ExtractOptions {
            unit_hint: Some("percent".to_string()),
        };
        let result = extract_with(doc.as_bytes(), &options).unwrap();
        let ratio = result.get(CanonicalKey::EquityRatioPercent).expect("ratio resolved");
        assert!((ratio - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_fact_is_left_out() {
        let doc = r#"<html xmlns:ix="http://www.xbrl.org/2013/inlineXBRL"><ix:nonFraction name="jppfs_cor:Assets" contextRef="X" scale="400">5</ix:nonFraction></html>"#;
        let result = extract(doc.as_bytes()).unwrap();

        assert_eq!(result.status(CanonicalKey::TotalAssets), FieldStatus::Unparsable);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({"PL": {}, "BS": {}, "CF": {}}));
    }

    #[test]
    fn test_auto_prefers_primary() {
        match extract_auto(INLINE.as_bytes(), &ExtractOptions::default()) {
            Extraction::Primary { result } => {
                assert_eq!(result.get(CanonicalKey::Revenue), Some(1234.0))
            }
            other => panic!("expected primary result, got {:?}", other),
        }
    }

    #[test]
    fn test_auto_keeps_empty_primary_when_fallback_has_nothing() {
        match extract_auto(b"<doc><note>nothing</note></doc>", &ExtractOptions::default()) {
            Extraction::Primary { result } => assert!(result.is_empty()),
            other => panic!("expected empty primary result, got {:?}", other),
        }
    }

    #[test]
    fn test_extraction_serializes_with_engine_tag() {
        let result = extract(INLINE.as_bytes()).unwrap();
        let json = serde_json::to_value(Extraction::Primary { result }).unwrap();
        assert_eq!(json["engine"], "primary");
        assert_eq!(json["PL"]["売上高"], 1234.0);
    }
}
