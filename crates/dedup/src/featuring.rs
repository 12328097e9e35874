use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Featured-artist markers, tried in order; the first hit wins.
static FEATURING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // "Hero (feat. Bob)"
        Regex::new(r"(?i)\(feat\.?\s+([^)]+)\)").unwrap(),
        // "Hero (ft. Bob)"
        Regex::new(r"(?i)\(ft\.?\s+([^)]+)\)").unwrap(),
        // "Hero feat. Bob"
        Regex::new(r"(?i)\s+feat\.?\s+(.+)$").unwrap(),
        // "Hero ft. Bob"
        Regex::new(r"(?i)\s+ft\.?\s+(.+)$").unwrap(),
        // "Hero featuring Bob"
        Regex::new(r"(?i)\s+featuring\s+(.+)$").unwrap(),
    ]
});

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Featuring {
    pub has_featuring: bool,
    pub main_part: String,
    pub featuring_part: String,
}

pub fn parse_featuring(value: &str) -> Featuring {
    for pattern in FEATURING_PATTERNS.iter() {
        let Some(captures) = pattern.captures(value) else {
            continue;
        };
        let featuring_part = captures
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let main_part = pattern.replace(value, "").trim().to_string();
        return Featuring {
            has_featuring: true,
            main_part,
            featuring_part,
        };
    }

    Featuring {
        has_featuring: false,
        main_part: value.to_string(),
        featuring_part: String::new(),
    }
}
