use serde::{Deserialize, Serialize};

pub const EMOTIONAL_TERMS: &[&str] = &[
    "compensate",
    "revenge",
    "fomo",
    "reversal",
    "make back",
    "win back",
    "get even",
    "recover losses",
    "double down",
    "can't lose",
    "sure thing",
    "all in",
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionalCheck {
    pub flagged: bool,
    pub matched_terms: Vec<String>,
    pub warning: Option<String>,
}

/// Case-insensitive substring screen of a trade rationale. Advisory: the
/// result never blocks a trade.
pub fn check_for_emotional_trading(text: &str) -> EmotionalCheck {
    let lowered = text.to_lowercase().replace('\u{2019}', "'");
    let matched_terms: Vec<String> = EMOTIONAL_TERMS
        .iter()
        .filter(|term| lowered.contains(*term))
        .map(|term| term.to_string())
        .collect();

    if matched_terms.is_empty() {
        return EmotionalCheck::default();
    }
    let warning = format!(
        "Rationale contains emotional trading language: {}",
        matched_terms.join(", ")
    );
    EmotionalCheck {
        flagged: true,
        matched_terms,
        warning: Some(warning),
    }
}
