// src/extractors/context.rs

// --- Imports ---
use std::collections::HashMap;

use serde::Serialize;

use crate::document::{Element, XBRLI_NAMESPACES};

// --- Scope Markers ---
// Matched against the serialized entity segment. A standalone marker always wins.
const CONSOLIDATED_MARKERS: &[&str] = &["ConsolidatedMember", "連結", "Consolidated"];
const NON_CONSOLIDATED_MARKERS: &[&str] = &["NonConsolidatedMember", "個別"];

// --- Data Structures ---
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Instant(String),
    Duration { start: String, end: String },
}

impl Period {
    pub fn is_duration(&self) -> bool {
        matches!(self, Period::Duration { .. })
    }

    /// End date for durations, the date itself for instants.
    pub fn reference_date(&self) -> &str {
        match self {
            Period::Instant(date) => date,
            Period::Duration { end, .. } => end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportingContext {
    pub id: String,
    pub period: Period,
    pub consolidated: bool,
    pub rank: usize, // 0 is the most preferred
}

/// Every usable context of one document, with its preference rank.
#[derive(Debug, Clone, Default)]
pub struct ContextTable {
    contexts: Vec<ReportingContext>, // document order
    index: HashMap<String, usize>,
}

impl ContextTable {
    /// Reads all `xbrli:context` elements below `root` and ranks them.
    ///
    /// Ranking is a stable sort, descending on `(consolidated, has duration,
    /// reference date)`. Dates compare as plain strings, which only orders
    /// ISO-formatted dates correctly.
    pub fn resolve(root: &Element) -> Self {
        let mut contexts: Vec<ReportingContext> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for element in root
            .descendants()
            .filter(|el| el.is(XBRLI_NAMESPACES, "xbrli", "context"))
        {
            let id = element.attributes.get("id").unwrap_or_default().to_string();
            let Some(period) = element
                .find(|el| el.is(XBRLI_NAMESPACES, "xbrli", "period"))
                .and_then(read_period)
            else {
                tracing::trace!("Skipping context '{}' without a period", id);
                continue;
            };
            let context = ReportingContext {
                id: id.clone(),
                period,
                consolidated: is_consolidated(element),
                rank: 0,
            };
            // A redefined id keeps its first position
            match index.get(&id) {
                Some(&pos) => contexts[pos] = context,
                None => {
                    index.insert(id, contexts.len());
                    contexts.push(context);
                }
            }
        }

        let mut order: Vec<usize> = (0..contexts.len()).collect();
        order.sort_by(|&a, &b| sort_key(&contexts[b]).cmp(&sort_key(&contexts[a])));
        for (rank, pos) in order.into_iter().enumerate() {
            contexts[pos].rank = rank;
        }

        tracing::debug!("Resolved {} reporting contexts", contexts.len());
        Self { contexts, index }
    }

    pub fn get(&self, id: &str) -> Option<&ReportingContext> {
        self.index.get(id).map(|&pos| &self.contexts[pos])
    }

    /// Rank of the referenced context; unknown or missing references rank
    /// behind every resolved context.
    pub fn rank_of(&self, context_ref: Option<&str>) -> usize {
        context_ref
            .and_then(|id| self.get(id))
            .map(|ctx| ctx.rank)
            .unwrap_or_else(|| self.unranked())
    }

    pub fn unranked(&self) -> usize {
        self.contexts.len() + 1
    }

    /// Contexts from most to least preferred.
    pub fn ranked(&self) -> Vec<&ReportingContext> {
        let mut ranked: Vec<&ReportingContext> = self.contexts.iter().collect();
        ranked.sort_by_key(|ctx| ctx.rank);
        ranked
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

fn sort_key(context: &ReportingContext) -> (bool, bool, &str) {
    (
        context.consolidated,
        context.period.is_duration(),
        context.period.reference_date(),
    )
}

fn child_text(parent: &Element, local: &str) -> Option<String> {
    parent
        .elements()
        .find(|el| el.is(XBRLI_NAMESPACES, "xbrli", local))
        .map(|el| el.text_content().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn read_period(period: &Element) -> Option<Period> {
    let instant = child_text(period, "instant");
    let start = child_text(period, "startDate");
    let end = child_text(period, "endDate");

    match (start, end, instant) {
        (Some(start), Some(end), _) => Some(Period::Duration { start, end }),
        (_, _, Some(instant)) => Some(Period::Instant(instant)),
        // An end date on its own behaves like an instant at that date
        (None, Some(end), None) => Some(Period::Instant(end)),
        _ => None,
    }
}

fn is_consolidated(context: &Element) -> bool {
    let segment_markup = context
        .find(|el| el.is(XBRLI_NAMESPACES, "xbrli", "entity"))
        .and_then(|entity| entity.find(|el| el.is(XBRLI_NAMESPACES, "xbrli", "segment")))
        .map(Element::to_markup)
        .unwrap_or_default();

    let consolidated = CONSOLIDATED_MARKERS.iter().any(|m| segment_markup.contains(m));
    let standalone = NON_CONSOLIDATED_MARKERS.iter().any(|m| segment_markup.contains(m));
    consolidated && !standalone
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tree::parse_strict;

    const HEADER: &str = r#"<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance" xmlns:xbrldi="http://xbrl.org/2006/xbrldi">"#;

    fn context(id: &str, period: &str, segment: &str) -> String {
        let segment = if segment.is_empty() {
            String::new()
        } else {
            format!(
                "<xbrli:segment><xbrldi:explicitMember dimension=\"jppfs_cor:ConsolidatedOrNonConsolidatedAxis\">{}</xbrldi:explicitMember></xbrli:segment>",
                segment
            )
        };
        format!(
            "<xbrli:context id=\"{}\"><xbrli:entity><xbrli:identifier scheme=\"s\">E1</xbrli:identifier>{}</xbrli:entity><xbrli:period>{}</xbrli:period></xbrli:context>",
            id, segment, period
        )
    }

    fn table(contexts: &[String]) -> ContextTable {
        let xml = format!("{}{}</xbrli:xbrl>", HEADER, contexts.concat());
        ContextTable::resolve(&parse_strict(&xml).expect("well-formed test document"))
    }

    const DURATION: &str = "<xbrli:startDate>2023-04-01</xbrli:startDate><xbrli:endDate>2024-03-31</xbrli:endDate>";
    const INSTANT: &str = "<xbrli:instant>2024-03-31</xbrli:instant>";

    #[test]
    fn test_consolidated_duration_ranks_first() {
        let contexts = table(&[
            context("Standalone", INSTANT, "jppfs_cor:NonConsolidatedMember"),
            context("Group", DURATION, "jppfs_cor:ConsolidatedMember"),
        ]);

        assert_eq!(contexts.get("Group").map(|c| c.rank), Some(0));
        assert_eq!(contexts.get("Standalone").map(|c| c.rank), Some(1));
        assert!(contexts.get("Group").unwrap().consolidated);
        assert!(!contexts.get("Standalone").unwrap().consolidated);
    }

    #[test]
    fn test_later_reference_date_ranks_higher() {
        let prior = "<xbrli:startDate>2022-04-01</xbrli:startDate><xbrli:endDate>2023-03-31</xbrli:endDate>";
        let contexts = table(&[context("Prior", prior, ""), context("Current", DURATION, "")]);

        assert_eq!(contexts.rank_of(Some("Current")), 0);
        assert_eq!(contexts.rank_of(Some("Prior")), 1);
    }

    #[test]
    fn test_duration_beats_instant_at_equal_scope() {
        let contexts = table(&[context("I", INSTANT, ""), context("D", DURATION, "")]);
        let ranked: Vec<&str> = contexts.ranked().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ranked, vec!["D", "I"]);
    }

    #[test]
    fn test_ties_keep_document_order() {
        let contexts = table(&[context("First", INSTANT, ""), context("Second", INSTANT, "")]);
        assert_eq!(contexts.rank_of(Some("First")), 0);
        assert_eq!(contexts.rank_of(Some("Second")), 1);
    }

    #[test]
    fn test_contexts_without_period_are_skipped() {
        let contexts = table(&[context("Empty", "", ""), context("Ok", INSTANT, "")]);
        assert_eq!(contexts.len(), 1);
        assert!(contexts.get("Empty").is_none());
    }

    #[test]
    fn test_unknown_reference_ranks_last() {
        let contexts = table(&[context("A", INSTANT, ""), context("B", DURATION, "")]);
        assert_eq!(contexts.rank_of(Some("Missing")), 3);
        assert_eq!(contexts.rank_of(None), 3);
    }

    #[test]
    fn test_japanese_scope_markers() {
        let contexts = table(&[
            context("Renketsu", INSTANT, "連結"),
            context("Kobetsu", INSTANT, "連結 個別"),
        ]);
        assert!(contexts.get("Renketsu").unwrap().consolidated);
        assert!(!contexts.get("Kobetsu").unwrap().consolidated);
    }

    #[test]
    fn test_period_shapes() {
        let contexts = table(&[
            context("D", DURATION, ""),
            context("EndOnly", "<xbrli:endDate>2024-03-31</xbrli:endDate>", ""),
        ]);
        assert_eq!(
            contexts.get("D").unwrap().period,
            Period::Duration { start: "2023-04-01".into(), end: "2024-03-31".into() }
        );
        assert_eq!(contexts.get("EndOnly").unwrap().period, Period::Instant("2024-03-31".into()));
    }
}
