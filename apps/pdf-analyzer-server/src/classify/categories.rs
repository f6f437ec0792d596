//! Medical document categories and their keyword rules

use serde::Serialize;

/// Extra scoring applied when a category's text pattern matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternBoost {
    /// Blood pressure, SpO2, pulse or temperature readings
    Vitals,
    /// Common lab analyte names
    LabAnalytes,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Category {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub min_score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost: Option<PatternBoost>,
}

/// Points added by a matching [`PatternBoost`]
pub const PATTERN_BOOST_SCORE: u32 = 2;

/// Every known category. Order decides ties.
pub const MEDICAL_CATEGORIES: &[Category] = &[
    Category {
        name: "drug",
        keywords: &["drug chart", "medication", "prescription", "dose", "dosage"],
        min_score: 2,
        boost: None,
    },
    Category {
        name: "xray",
        keywords: &["x-ray", "xray", "radiograph"],
        min_score: 1,
        boost: None,
    },
    Category {
        name: "ct_scan",
        keywords: &["ct scan", "computed tomography"],
        min_score: 1,
        boost: None,
    },
    Category {
        name: "mri",
        keywords: &["mri", "magnetic resonance"],
        min_score: 1,
        boost: None,
    },
    Category {
        name: "ultrasound",
        keywords: &["ultrasound", "usg"],
        min_score: 1,
        boost: None,
    },
    Category {
        name: "ecg",
        keywords: &["ecg", "electrocardiogram"],
        min_score: 1,
        boost: None,
    },
    Category {
        name: "echo",
        keywords: &["echo", "echocardiography"],
        min_score: 1,
        boost: None,
    },
    Category {
        name: "treatment_plan",
        keywords: &["treatment plan", "management plan", "therapy"],
        min_score: 2,
        boost: None,
    },
    Category {
        name: "icu",
        keywords: &["icu", "intensive care", "critical care"],
        min_score: 1,
        boost: None,
    },
    Category {
        name: "gcs",
        keywords: &["gcs", "glasgow coma scale"],
        min_score: 1,
        boost: None,
    },
    Category {
        name: "lab_report",
        keywords: &["lab report", "hematology", "biochemistry", "pathology"],
        min_score: 2,
        boost: Some(PatternBoost::LabAnalytes),
    },
    Category {
        name: "vital_chart",
        keywords: &["vital signs", "temperature", "pulse", "respiration"],
        min_score: 2,
        boost: Some(PatternBoost::Vitals),
    },
];
