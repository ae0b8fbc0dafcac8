//! Selector-quality scoring.
//!
//! Given a picked element, produces the candidate selector strategies
//! with robustness scores and labeling improvement hints. The scoring
//! is deliberately behind a trait: the execution core never depends on
//! the point values, and a product can swap in its own heuristics.

use crate::page::PageElement;
use cake_proto::{SelectorQuality, SelectorStrategy};

/// Scores how robustly an element can be addressed.
pub trait QualityScorer: Send + Sync {
    /// Scores the element; `css_path` is the structural fallback
    /// selector the picker generated for it.
    fn score(&self, element: &dyn PageElement, css_path: &str) -> SelectorQuality;
}

/// Built-in scorer.
///
/// Prefers `data-testid` (95) over role (90) over accessible name
/// (85); the structural CSS path starts at 70 and loses 10 points per
/// nesting level, floored at 30.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultQualityScorer;

impl DefaultQualityScorer {
    /// Creates the scorer.
    pub fn new() -> Self {
        Self
    }
}

impl QualityScorer for DefaultQualityScorer {
    fn score(&self, element: &dyn PageElement, css_path: &str) -> SelectorQuality {
        let tag = element.tag();
        let role = element
            .attribute("role")
            .or_else(|| implicit_role(&tag, element));
        let aria_label = element.attribute("aria-label").filter(|v| !v.trim().is_empty());
        let testid = element.attribute("data-testid");

        let testid_strategy = match &testid {
            Some(id) => SelectorStrategy {
                score: 95,
                selector: format!("[data-testid=\"{id}\"]"),
                available: true,
            },
            None => SelectorStrategy::unavailable(),
        };

        let accessibility = match &role {
            Some(role) => SelectorStrategy {
                score: 90,
                selector: format!("[role=\"{role}\"]"),
                available: true,
            },
            None => SelectorStrategy::unavailable(),
        };

        let name = match &aria_label {
            Some(label) => SelectorStrategy {
                score: 85,
                selector: format!("[aria-label=\"{label}\"]"),
                available: true,
            },
            None => SelectorStrategy::unavailable(),
        };

        let depth = css_path.split('>').count();
        let penalty = (depth * 10).min(70) as u8;
        let css = SelectorStrategy {
            score: (70 - penalty).max(30),
            selector: css_path.to_string(),
            available: true,
        };

        let mut improvements = Vec::new();
        if role.is_none() {
            improvements.push("add an explicit role attribute".to_string());
        }
        if aria_label.is_none() && is_interactive(&tag, element) {
            improvements.push("add an aria-label or an associated label".to_string());
        }
        if testid.is_none() {
            improvements.push("add a data-testid attribute for stable selection".to_string());
        }

        SelectorQuality {
            testid: testid_strategy,
            accessibility,
            name,
            css,
            improvements,
        }
    }
}

/// Implicit ARIA role for common tags.
fn implicit_role(tag: &str, element: &dyn PageElement) -> Option<String> {
    let role = match tag {
        "button" => "button",
        "a" => {
            if element.has_attribute("href") {
                "link"
            } else {
                return None;
            }
        }
        "input" => match element.attribute("type").as_deref() {
            Some("button" | "submit" | "reset") => "button",
            Some("checkbox") => "checkbox",
            Some("radio") => "radio",
            Some("range") => "slider",
            Some("search") => "searchbox",
            _ => "textbox",
        },
        "select" => "combobox",
        "textarea" => "textbox",
        "nav" => "navigation",
        "main" => "main",
        "header" => "banner",
        "footer" => "contentinfo",
        "aside" => "complementary",
        "section" => "region",
        "article" => "article",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
        _ => return None,
    };
    Some(role.to_string())
}

fn is_interactive(tag: &str, element: &dyn PageElement) -> bool {
    matches!(tag, "button" | "a" | "input" | "select" | "textarea")
        || element.has_attribute("role")
        || element.has_attribute("onclick")
}
