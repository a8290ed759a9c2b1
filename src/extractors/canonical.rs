// src/extractors/canonical.rs
//! Canonical vocabulary and the tag/synonym tables that map onto it.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::extractors::value::fold_width;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Section {
    PL,
    BS,
    CF,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::PL, Section::BS, Section::CF];
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::PL => "PL",
            Section::BS => "BS",
            Section::CF => "CF",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CanonicalKey {
    Revenue,
    OperatingIncome,
    NetIncome,
    GrossProfit,
    TotalAssets,
    NetAssetsOrEquity,
    EquityRatioPercent,
    OperatingCF,
    InvestingCF,
    FinancingCF,
}

impl CanonicalKey {
    pub const ALL: [CanonicalKey; 10] = [
        CanonicalKey::Revenue,
        CanonicalKey::OperatingIncome,
        CanonicalKey::NetIncome,
        CanonicalKey::GrossProfit,
        CanonicalKey::TotalAssets,
        CanonicalKey::NetAssetsOrEquity,
        CanonicalKey::EquityRatioPercent,
        CanonicalKey::OperatingCF,
        CanonicalKey::InvestingCF,
        CanonicalKey::FinancingCF,
    ];

    pub fn section(self) -> Section {
        match self {
            CanonicalKey::Revenue
            | CanonicalKey::OperatingIncome
            | CanonicalKey::NetIncome
            | CanonicalKey::GrossProfit => Section::PL,
            CanonicalKey::TotalAssets
            | CanonicalKey::NetAssetsOrEquity
            | CanonicalKey::EquityRatioPercent => Section::BS,
            CanonicalKey::OperatingCF | CanonicalKey::InvestingCF | CanonicalKey::FinancingCF => {
                Section::CF
            }
        }
    }

    /// Display label used in extraction results.
    pub fn label(self) -> &'static str {
        match self {
            CanonicalKey::Revenue => "売上高",
            CanonicalKey::OperatingIncome => "営業利益",
            CanonicalKey::NetIncome => "当期純利益",
            CanonicalKey::GrossProfit => "売上総利益",
            CanonicalKey::TotalAssets => "総資産",
            CanonicalKey::NetAssetsOrEquity => "純資産",
            CanonicalKey::EquityRatioPercent => "自己資本比率(%)",
            CanonicalKey::OperatingCF => "営業CF",
            CanonicalKey::InvestingCF => "投資CF",
            CanonicalKey::FinancingCF => "財務CF",
        }
    }
}

// --- Exact Tags ---
static TAGS: &[(&str, CanonicalKey)] = &[
    // PL
    ("jppfs_cor:NetSales", CanonicalKey::Revenue),
    ("jppfs_cor:OperatingRevenue1", CanonicalKey::Revenue),
    ("jppfs_cor:Revenue", CanonicalKey::Revenue),
    ("ifrs-full:Revenue", CanonicalKey::Revenue),
    ("jpcrp_cor:NetSalesSummaryOfBusinessResults", CanonicalKey::Revenue),
    ("jppfs_cor:OperatingIncome", CanonicalKey::OperatingIncome),
    ("ifrs-full:ProfitLossFromOperatingActivities", CanonicalKey::OperatingIncome),
    ("jppfs_cor:ProfitLoss", CanonicalKey::NetIncome),
    ("jppfs_cor:ProfitAttributableToOwnersOfParent", CanonicalKey::NetIncome),
    ("ifrs-full:ProfitLoss", CanonicalKey::NetIncome),
    ("ifrs-full:ProfitLossAttributableToOwnersOfParent", CanonicalKey::NetIncome),
    (
        "jpcrp_cor:ProfitLossAttributableToOwnersOfParentSummaryOfBusinessResults",
        CanonicalKey::NetIncome,
    ),
    ("jppfs_cor:GrossProfit", CanonicalKey::GrossProfit),
    ("ifrs-full:GrossProfit", CanonicalKey::GrossProfit),
    // BS
    ("jppfs_cor:Assets", CanonicalKey::TotalAssets),
    ("ifrs-full:Assets", CanonicalKey::TotalAssets),
    ("jpcrp_cor:TotalAssetsSummaryOfBusinessResults", CanonicalKey::TotalAssets),
    ("jppfs_cor:Equity", CanonicalKey::NetAssetsOrEquity),
    ("jppfs_cor:NetAssets", CanonicalKey::NetAssetsOrEquity),
    ("ifrs-full:Equity", CanonicalKey::NetAssetsOrEquity),
    ("jpcrp_cor:NetAssetsSummaryOfBusinessResults", CanonicalKey::NetAssetsOrEquity),
    (
        "jpcrp_cor:EquityToAssetRatioSummaryOfBusinessResults",
        CanonicalKey::EquityRatioPercent,
    ),
    // CF
    ("jppfs_cor:NetCashProvidedByUsedInOperatingActivities", CanonicalKey::OperatingCF),
    ("ifrs-full:CashFlowsFromUsedInOperatingActivities", CanonicalKey::OperatingCF),
    ("jppfs_cor:NetCashProvidedByUsedInInvestingActivities", CanonicalKey::InvestingCF),
    ("ifrs-full:CashFlowsFromUsedInInvestingActivities", CanonicalKey::InvestingCF),
    ("jppfs_cor:NetCashProvidedByUsedInFinancingActivities", CanonicalKey::FinancingCF),
    ("ifrs-full:CashFlowsFromUsedInFinancingActivities", CanonicalKey::FinancingCF),
];

// --- Synonyms ---
// Declaration order is the tie-break. Keys whose labels contain another key's
// synonym (売上総利益 contains 売上, "equity ratio" contains "equity") come first.
static SYNONYMS: &[(CanonicalKey, &[&str])] = &[
    (CanonicalKey::GrossProfit, &["売上総利益", "粗利益", "gross profit"]),
    (CanonicalKey::Revenue, &["売上高", "売上", "営業収益", "sales", "revenue", "net sales"]),
    (CanonicalKey::OperatingIncome, &["営業利益", "operating income", "operating profit"]),
    (
        CanonicalKey::NetIncome,
        &["当期純利益", "純利益", "profit attributable", "net income", "当期利益"],
    ),
    (
        CanonicalKey::EquityRatioPercent,
        &["自己資本比率", "equity ratio", "自己資本比率（％）", "自己資本比率(%)"],
    ),
    (CanonicalKey::TotalAssets, &["総資産", "total assets"]),
    (CanonicalKey::NetAssetsOrEquity, &["純資産", "株主資本", "net assets", "equity"]),
    (
        CanonicalKey::OperatingCF,
        &["営業活動によるキャッシュフロー", "営業cf", "cash flows from operating", "cfo"],
    ),
    (
        CanonicalKey::InvestingCF,
        &["投資活動によるキャッシュフロー", "投資cf", "cash flows from investing", "cfi"],
    ),
    (
        CanonicalKey::FinancingCF,
        &["財務活動によるキャッシュフロー", "財務cf", "cash flows from financing", "cff"],
    ),
];

// Keyed by lowercased tag: the lenient parser lowercases element names
static TAG_INDEX: Lazy<HashMap<String, CanonicalKey>> = Lazy::new(|| {
    let mut index = HashMap::with_capacity(TAGS.len());
    for (tag, key) in TAGS {
        index.entry(tag.to_ascii_lowercase()).or_insert(*key);
    }
    index
});

// Synonyms normalized once, in declaration order
static SYNONYM_INDEX: Lazy<Vec<(CanonicalKey, Vec<String>)>> = Lazy::new(|| {
    SYNONYMS
        .iter()
        .map(|(key, synonyms)| {
            let normalized = synonyms
                .iter()
                .map(|s| normalize_label(s))
                .filter(|s| !s.is_empty())
                .collect();
            (*key, normalized)
        })
        .collect()
});

const SEPARATORS: &[char] = &['_', '-', '‐', '・', ':', '：', '/', '\\', '(', ')', '（', '）'];

/// Folds width, lowercases, and drops whitespace and separator characters.
pub fn normalize_label(label: &str) -> String {
    fold_width(label)
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !SEPARATORS.contains(c))
        .collect()
}

/// Exact tag lookup, ignoring ASCII case.
pub fn lookup_tag(name: &str) -> Option<CanonicalKey> {
    TAG_INDEX.get(&name.to_ascii_lowercase()).copied()
}

/// First key (in declaration order) with a synonym contained in the label or
/// containing it.
pub fn match_synonym(label: &str) -> Option<CanonicalKey> {
    let normalized = normalize_label(label);
    if normalized.is_empty() {
        return None;
    }
    SYNONYM_INDEX
        .iter()
        .find(|(_, synonyms)| {
            synonyms
                .iter()
                .any(|s| normalized.contains(s.as_str()) || s.contains(normalized.as_str()))
        })
        .map(|(key, _)| *key)
}

/// Exact tag lookup first, then synonym matching.
pub fn resolve(name: &str) -> Option<CanonicalKey> {
    if let Some(key) = lookup_tag(name) {
        tracing::trace!("'{}' -> {:?} (tag)", name, key);
        return Some(key);
    }
    let key = match_synonym(name)?;
    tracing::trace!("'{}' -> {:?} (synonym)", name, key);
    Some(key)
}
