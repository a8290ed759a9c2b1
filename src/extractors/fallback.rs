// src/extractors/fallback.rs
//! Regex-based extraction straight from entry text, without building a tree.
//!
//! Simpler than the primary engine: no contexts, no width folding,
//! no parenthesis negatives. Every known field is always reported, null when
//! unresolved, and the whole pass never fails.

// --- Imports ---
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use zip::ZipArchive;

use crate::extractors::canonical::Section;
use crate::utils::error::LoadError;

// --- Tag Tables (earlier = higher priority) ---
type FieldTable = &'static [(&'static str, &'static [&'static str])];

static PL_FIELDS: FieldTable = &[
    (
        "Revenue",
        &["ifrs-full:Revenue", "jppfs_cor:NetSales", "jpdei_cor:NetSales", "NetSales", "Revenue"],
    ),
    (
        "OperatingIncome",
        &[
            "jppfs_cor:OperatingIncome",
            "ifrs-full:ProfitLossFromOperatingActivities",
            "OperatingIncome",
            "OperatingProfit",
        ],
    ),
    (
        "NetIncome",
        &[
            "jppfs_cor:ProfitAttributableToOwnersOfParent",
            "ifrs-full:ProfitLoss",
            "NetIncome",
            "Profit",
            "ProfitLoss",
        ],
    ),
    ("GrossProfit", &["jppfs_cor:GrossProfit", "ifrs-full:GrossProfit", "GrossProfit"]),
];

static BS_FIELDS: FieldTable = &[
    ("Assets", &["ifrs-full:Assets", "jppfs_cor:Assets", "Assets", "TotalAssets"]),
    (
        "Liabilities",
        &["ifrs-full:Liabilities", "jppfs_cor:Liabilities", "Liabilities", "TotalLiabilities"],
    ),
    (
        "Equity",
        &[
            "ifrs-full:Equity",
            "jppfs_cor:Equity",
            "Equity",
            "EquityAttributableToOwnersOfParent",
            "ShareholdersEquity",
            "NetAssets",
        ],
    ),
];

static CF_FIELDS: FieldTable = &[
    (
        "OperatingCF",
        &[
            "ifrs-full:NetCashFlowsFromUsedInOperatingActivities",
            "jppfs_cor:NetCashProvidedByUsedInOperatingActivities",
            "OperatingCF",
        ],
    ),
    (
        "InvestingCF",
        &[
            "ifrs-full:NetCashFlowsFromUsedInInvestingActivities",
            "jppfs_cor:NetCashProvidedByUsedInInvestingActivities",
            "InvestingCF",
        ],
    ),
    (
        "FinancingCF",
        &[
            "ifrs-full:NetCashFlowsFromUsedInFinancingActivities",
            "jppfs_cor:NetCashProvidedByUsedInFinancingActivities",
            "FinancingCF",
        ],
    ),
    (
        "Cash",
        &[
            "ifrs-full:CashAndCashEquivalents",
            "jppfs_cor:CashAndCashEquivalents",
            "CashAndCashEquivalents",
            "Cash",
        ],
    ),
];

static PERIOD_TAGS: &[&str] = &[
    "jpdei_cor:DocumentPeriodEndDate",
    "jppfs_cor:CurrentFiscalYearEndDate",
    "ifrs-full:ReportingPeriodEndDate",
    "dei:DocumentPeriodEndDate",
];

const ENTRY_EXTENSIONS: &[&str] = &[".xbrl", ".xml"];

// --- Regex Patterns (Lazy Static) ---
// Grouped thousands first so that ungrouped digit runs are taken whole.
// ASCII digits only: full-width text is not folded here.
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+]?[0-9]{1,3}(?:[,\s][0-9]{3})+(?:\.[0-9]+)?|[-+]?[0-9]+(?:\.[0-9]+)?")
        .expect("Failed to compile NUMBER_RE")
});

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(20[0-9]{2}|19[0-9]{2})").expect("Failed to compile YEAR_RE"));

struct FieldPatterns {
    section: Section,
    field: &'static str,
    patterns: Vec<Regex>,
}

static FIELD_PATTERNS: Lazy<Vec<FieldPatterns>> = Lazy::new(|| {
    [(Section::PL, PL_FIELDS), (Section::BS, BS_FIELDS), (Section::CF, CF_FIELDS)]
        .into_iter()
        .flat_map(|(section, table)| {
            table.iter().map(move |&(field, tags)| FieldPatterns {
                section,
                field,
                patterns: tags.iter().filter_map(|tag| tag_pattern(tag)).collect(),
            })
        })
        .collect()
});

static PERIOD_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| PERIOD_TAGS.iter().filter_map(|tag| tag_pattern(tag)).collect());

/// Opening tag followed by its text. Qualified tags pin the prefix, bare tags
/// accept any prefix. Case-insensitive.
fn tag_pattern(tag: &str) -> Option<Regex> {
    let (prefix, local) = match tag.split_once(':') {
        Some((prefix, local)) => (format!("{}:", regex::escape(prefix)), local),
        None => (r"(?:[\w.\-]+:)?".to_string(), tag),
    };
    Regex::new(&format!(
        r"(?i)<{}{}(?:\s[^>]*)?>\s*([^<]+)<",
        prefix,
        regex::escape(local)
    ))
    .ok()
}

// --- Data Structures ---
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackResult {
    pub period: String,
    #[serde(rename = "PL")]
    pub pl: BTreeMap<&'static str, Option<f64>>,
    #[serde(rename = "BS")]
    pub bs: BTreeMap<&'static str, Option<f64>>,
    #[serde(rename = "CF")]
    pub cf: BTreeMap<&'static str, Option<f64>>,
    /// Why the pass produced nothing, when it failed outright.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl FallbackResult {
    /// Every known field, all null, empty period.
    pub fn empty() -> Self {
        fn nulls(table: FieldTable) -> BTreeMap<&'static str, Option<f64>> {
            table.iter().map(|(field, _)| (*field, None)).collect()
        }
        Self {
            period: String::new(),
            pl: nulls(PL_FIELDS),
            bs: nulls(BS_FIELDS),
            cf: nulls(CF_FIELDS),
            failure: None,
        }
    }

    pub fn section(&self, section: Section) -> &BTreeMap<&'static str, Option<f64>> {
        match section {
            Section::PL => &self.pl,
            Section::BS => &self.bs,
            Section::CF => &self.cf,
        }
    }

    fn section_mut(&mut self, section: Section) -> &mut BTreeMap<&'static str, Option<f64>> {
        match section {
            Section::PL => &mut self.pl,
            Section::BS => &mut self.bs,
            Section::CF => &mut self.cf,
        }
    }

    pub fn get(&self, section: Section, field: &str) -> Option<f64> {
        self.section(section).get(field).copied().flatten()
    }

    pub fn has_any_value(&self) -> bool {
        Section::ALL
            .iter()
            .any(|s| self.section(*s).values().any(Option::is_some))
    }

    fn section_filled(&self, section: Section) -> bool {
        self.section(section).values().any(Option::is_some)
    }
}

// --- Extraction ---

/// Scans every `.xbrl`/`.xml` entry of an archive. Never fails; see [`FallbackResult::failure`].
pub fn extract_fallback(bytes: &[u8]) -> FallbackResult {
    match scan_archive(bytes) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("Text fallback failed, returning empty result: {}", e);
            FallbackResult {
                failure: Some(e.to_string()),
                ..FallbackResult::empty()
            }
        }
    }
}

fn scan_archive(bytes: &[u8]) -> Result<FallbackResult, LoadError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let names: Vec<String> = archive
        .file_names()
        .filter(|name| {
            let lower = name.to_ascii_lowercase();
            ENTRY_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        })
        .map(str::to_string)
        .collect();

    let mut result = FallbackResult::empty();
    for name in names {
        let mut data = Vec::new();
        let read = archive
            .by_name(&name)
            .map_err(LoadError::from)
            .and_then(|mut entry| entry.read_to_end(&mut data).map_err(LoadError::from));
        if let Err(e) = read {
            tracing::debug!("Skipping unreadable entry '{}': {}", name, e);
            continue;
        }
        let text = String::from_utf8_lossy(&data);
        scan_text(&text, &mut result);

        // TODO: decide whether missing cash-flow fields should keep the scan going past this point
        if result.section_filled(Section::PL) && result.section_filled(Section::BS) {
            tracing::debug!("Stopping after '{}': profit/loss and balance sheet found", name);
            break;
        }
    }
    Ok(result)
}

/// Fills still-missing fields (and the period, if unset) from one document's text.
pub fn scan_text(text: &str, result: &mut FallbackResult) {
    if result.period.is_empty() {
        result.period = extract_period(text);
    }
    for field in FIELD_PATTERNS.iter() {
        let slot = result.section_mut(field.section).entry(field.field).or_insert(None);
        if slot.is_none() {
            *slot = extract_first(text, &field.patterns);
        }
    }
}

fn extract_first(text: &str, patterns: &[Regex]) -> Option<f64> {
    patterns
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .find_map(|m| to_float(m.as_str()))
}

/// First number in `raw`; separators and NBSP tolerated.
pub fn to_float(raw: &str) -> Option<f64> {
    let text = raw.replace('\u{a0}', " ");
    let found = NUMBER_RE.find(&text)?;
    let digits: String = found
        .as_str()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    digits.parse::<f64>().ok()
}

/// `FY{year}` from the first known period tag, else from any year in the text.
pub fn extract_period(text: &str) -> String {
    for re in PERIOD_PATTERNS.iter() {
        if let Some(raw) = re.captures(text).and_then(|caps| caps.get(1)) {
            let raw = raw.as_str().trim();
            return match YEAR_RE.find(raw) {
                Some(year) => format!("FY{}", year.as_str()),
                None => raw.to_string(),
            };
        }
    }
    YEAR_RE
        .find(text)
        .map(|year| format!("FY{}", year.as_str()))
        .unwrap_or_default()
}
