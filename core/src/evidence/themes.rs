/// The seven canonical maturity theme codes, fixed by the rubric.
pub const THEME_CODES: [&str; 7] = ["TSP", "OSP", "DM", "GHG", "RD", "EI", "RMM"];

/// Finding-theme → canonical code mapping. This is data: provider extractors
/// label findings with their own vocabulary and this table normalizes it.
/// Unknown themes pass through unchanged.
pub const THEME_MAPPING: &[(&str, &str)] = &[
    ("TSP", "TSP"),
    ("Target Setting & Planning", "TSP"),
    ("Climate", "TSP"),
    ("OSP", "OSP"),
    ("Operations", "OSP"),
    ("Governance", "OSP"),
    ("DM", "DM"),
    ("Data", "DM"),
    ("GHG", "GHG"),
    ("Emissions", "GHG"),
    ("RD", "RD"),
    ("Reporting", "RD"),
    ("Disclosure", "RD"),
    ("EI", "EI"),
    ("Energy", "EI"),
    ("RMM", "RMM"),
    ("Risk", "RMM"),
];

pub fn canonical_theme_code(theme: &str) -> String {
    for (from, to) in THEME_MAPPING {
        if *from == theme {
            return (*to).to_string();
        }
    }
    theme.to_string()
}

/// Keyword table for tagging chunks into theme partitions. First theme (in
/// `THEME_CODES` order) with a matching keyword wins.
pub const THEME_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "TSP",
        &[
            "net-zero",
            "net zero",
            "science based targets",
            "sbti",
            "target",
            "transition plan",
        ],
    ),
    (
        "OSP",
        &["governance", "board", "oversight", "committee", "management responsibility"],
    ),
    ("DM", &["data quality", "methodology", "baseline", "measurement"]),
    (
        "GHG",
        &["scope 1", "scope 2", "scope 3", "emissions", "co2", "ghg", "carbon"],
    ),
    ("RD", &["disclosure", "tcfd", "gri", "sasb", "cdp", "report"]),
    ("EI", &["renewable", "energy", "solar", "wind", "efficiency"]),
    ("RMM", &["risk", "mitigation", "resilience", "adaptation"]),
];

pub fn tag_theme(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    for code in THEME_CODES {
        if let Some((_, keywords)) = THEME_KEYWORDS.iter().find(|(c, _)| *c == code) {
            if keywords.iter().any(|k| lowered.contains(k)) {
                return Some(code);
            }
        }
    }
    None
}

/// Deterministic retrieval query per theme: the keyword vocabulary itself.
pub fn theme_query(code: &str) -> String {
    THEME_KEYWORDS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, keywords)| keywords.join(" "))
        .unwrap_or_else(|| code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_themes_map_to_codes() {
        assert_eq!(canonical_theme_code("Climate"), "TSP");
        assert_eq!(canonical_theme_code("Governance"), "OSP");
        assert_eq!(canonical_theme_code("Risk"), "RMM");
        assert_eq!(canonical_theme_code("GHG"), "GHG");
    }

    #[test]
    fn unknown_themes_pass_through() {
        assert_eq!(canonical_theme_code("Biodiversity"), "Biodiversity");
    }

    #[test]
    fn tagging_prefers_earlier_theme_codes() {
        assert_eq!(
            tag_theme("Our net-zero emissions target for 2050"),
            Some("TSP")
        );
        assert_eq!(tag_theme("Scope 1 emissions fell by 7%"), Some("GHG"));
        assert_eq!(tag_theme("nothing relevant here"), None);
    }

    #[test]
    fn every_theme_code_has_keywords_and_query() {
        for code in THEME_CODES {
            assert!(THEME_KEYWORDS.iter().any(|(c, _)| *c == code));
            assert!(!theme_query(code).is_empty());
        }
    }
}
