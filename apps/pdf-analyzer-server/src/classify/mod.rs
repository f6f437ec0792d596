//! Page text classification
//!
//! Scores normalized OCR text against [`MEDICAL_CATEGORIES`]. Each keyword
//! found as a substring is worth one point; vital-sign readings and lab
//! analyte names add [`PATTERN_BOOST_SCORE`] to their category. The best
//! category reaching its minimum score wins.

mod categories;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub use categories::{Category, PatternBoost, MEDICAL_CATEGORIES, PATTERN_BOOST_SCORE};

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex compile"));

static VITAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(bp\s*\d{2,3}/\d{2,3})|(spo2\s*\d{2,3})|(pulse\s*\d{2,3})|(temp\s*\d{2,3})")
        .expect("static regex compile")
});

static LAB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(hb|wbc|rbc|platelet|creatinine|urea|sodium|potassium)")
        .expect("static regex compile")
});

static FILENAME_UNSAFE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_]").expect("static regex compile"));

/// Best matching category for a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: &'static str,
    pub score: u32,
}

/// Lowercase, collapse whitespace and rejoin letters OCR tends to space out
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    WHITESPACE_RE
        .replace_all(&lowered, " ")
        .replace("b p", "bp")
        .replace("s p o 2", "spo2")
        .replace("t e m p", "temp")
}

/// Turn a category name into a safe file stem
pub fn clean_filename(text: &str) -> String {
    let lowered = text.to_lowercase().replace(' ', "_");
    FILENAME_UNSAFE_RE.replace_all(&lowered, "").into_owned()
}

fn boost_matches(boost: PatternBoost, text: &str) -> bool {
    match boost {
        PatternBoost::Vitals => VITAL_RE.is_match(text),
        PatternBoost::LabAnalytes => LAB_RE.is_match(text),
    }
}

/// Score `text` against a single category
pub fn score_category(category: &Category, text: &str) -> u32 {
    let mut score = category
        .keywords
        .iter()
        .filter(|kw| text.contains(**kw))
        .count() as u32;

    if let Some(boost) = category.boost {
        if boost_matches(boost, text) {
            score += PATTERN_BOOST_SCORE;
        }
    }

    score
}

/// Classify normalized page text
///
/// Returns `None` when no category reaches its minimum score.
pub fn classify_text(text: &str) -> Option<Classification> {
    let mut best: Option<Classification> = None;

    for category in MEDICAL_CATEGORIES {
        let score = score_category(category, text);
        if score < category.min_score {
            continue;
        }
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(Classification {
                category: category.name,
                score,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_collapses_and_rejoins() {
        assert_eq!(normalize_text("B P  120/80\n\tS P O 2 98"), "bp 120/80 spo2 98");
        assert_eq!(normalize_text("T E M P 37"), "temp 37");
        assert_eq!(normalize_text("  Chest X-Ray  "), " chest x-ray ");
    }

    #[test]
    fn test_clean_filename() {
        assert_eq!(clean_filename("CT Scan"), "ct_scan");
        assert_eq!(clean_filename("Lab-Report #2"), "labreport_2");
    }

    #[test]
    fn test_single_keyword_category() {
        let result = classify_text(&normalize_text("Chest X-Ray PA view"));
        assert_eq!(
            result,
            Some(Classification {
                category: "xray",
                score: 1
            })
        );
    }

    #[test]
    fn test_min_score_not_reached() {
        // one drug keyword is below the drug threshold of 2
        assert_eq!(classify_text("dose 5mg"), None);
        assert_eq!(classify_text("nothing medical here"), None);
    }

    #[test]
    fn test_vitals_pattern_boost() {
        let text = normalize_text("B P 120/80 recorded at noon");
        let result = classify_text(&text).unwrap();
        assert_eq!(result.category, "vital_chart");
        assert_eq!(result.score, 2);
    }

    #[test]
    fn test_lab_pattern_boost() {
        let result = classify_text("haematology panel: wbc 11.2").unwrap();
        assert_eq!(result.category, "lab_report");
        assert_eq!(result.score, 2);
    }

    #[test]
    fn test_highest_score_wins() {
        let text = "drug chart medication prescription dosage with an ecg strip";
        let result = classify_text(text).unwrap();
        assert_eq!(result.category, "drug");
        assert_eq!(result.score, 4);
    }

    #[test]
    fn test_ties_go_to_earlier_category() {
        let result = classify_text("mri and ultrasound").unwrap();
        assert_eq!(result.category, "mri");
        assert_eq!(result.score, 1);
    }
}
