//! Selector-quality interface types.
//!
//! Scoring how robust a picked selector is (and what labeling would
//! improve it) is an external, replaceable concern; these are the data
//! shapes it produces. `cake-core` ships a simple default scorer, but
//! nothing in the execution core depends on the exact point values.

use serde::{Deserialize, Serialize};

/// One candidate way of addressing an element, with a robustness score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorStrategy {
    /// Robustness score, 0..=100.
    pub score: u8,

    /// The selector this strategy would use.
    pub selector: String,

    /// Whether the element supports this strategy at all.
    pub available: bool,
}

impl SelectorStrategy {
    /// A strategy that is not available for the element.
    pub fn unavailable() -> Self {
        Self {
            score: 0,
            selector: String::new(),
            available: false,
        }
    }
}

/// Scored selector strategies for one element, plus labeling hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorQuality {
    /// `[data-testid=...]` based strategy.
    pub testid: SelectorStrategy,

    /// `[role=...]` based strategy.
    pub accessibility: SelectorStrategy,

    /// Accessible-name (`[aria-label=...]`) based strategy.
    pub name: SelectorStrategy,

    /// Structural CSS path fallback; always available.
    pub css: SelectorStrategy,

    /// Suggested markup improvements (missing role, label, test id).
    #[serde(default)]
    pub improvements: Vec<String>,
}

impl SelectorQuality {
    /// The available strategy with the highest score.
    ///
    /// The CSS fallback is always available, so this never returns an
    /// unavailable strategy.
    pub fn best(&self) -> &SelectorStrategy {
        [&self.testid, &self.accessibility, &self.name, &self.css]
            .into_iter()
            .filter(|s| s.available)
            .max_by_key(|s| s.score)
            .unwrap_or(&self.css)
    }
}
