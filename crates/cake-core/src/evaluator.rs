//! Single-shot assertion evaluation.
//!
//! [`evaluate`] performs one check against current page state, with no
//! timeout or retry; the polling loop lives in [`crate::engine`]. The
//! function is total over every [`AssertionKind`]: each kind either
//! produces an [`Evaluation`] or a typed error (bad selector, missing
//! operand), never a silent `false`.
//!
//! Negative kinds (`element_not_exists`, `element_hidden`, ...) are
//! computed by running the positive counterpart and inverting its
//! verdict. The observed `actual` and the fact-stating message are kept
//! as-is, so a paired positive/negative evaluation can never disagree
//! about what the page looked like.

use crate::page::{PageAccessor, PageElement, PageError};
use cake_proto::{AssertionKind, SpecError, SpecValue};
use thiserror::Error;

/// Outcome of one evaluation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Whether the check held.
    pub success: bool,

    /// Fact-stating description of what was observed.
    pub message: String,

    /// Observed value; `None` when the target could not be located
    /// (for value-producing kinds).
    pub actual: Option<SpecValue>,
}

/// Errors that abort an evaluation attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The selector could not be parsed.
    #[error(transparent)]
    Page(#[from] PageError),

    /// The spec is missing an operand or has a bad count expectation.
    #[error(transparent)]
    Spec(#[from] SpecError),
}

const NOT_FOUND: &str = "element not found";

/// Evaluates one assertion against current page state.
pub fn evaluate(
    page: &dyn PageAccessor,
    selector: &str,
    kind: AssertionKind,
    expected: &SpecValue,
    attribute: Option<&str>,
    css_property: Option<&str>,
) -> Result<Evaluation, EvalError> {
    use AssertionKind::*;
    match kind {
        ElementExists => check_exists(page, selector),
        ElementNotExists => Ok(invert(check_exists(page, selector)?)),
        ElementVisible => check_visible(page, selector),
        ElementHidden => Ok(invert(check_visible(page, selector)?)),
        TextEquals => check_text_equals(page, selector, expected),
        TextContains => check_text_contains(page, selector, expected),
        TextNotContains => Ok(invert(check_text_contains(page, selector, expected)?)),
        AttributeEquals => check_attribute_equals(page, selector, expected, attribute),
        AttributeExists => check_attribute_exists(page, selector, attribute),
        AttributeNotExists => Ok(invert(check_attribute_exists(page, selector, attribute)?)),
        CssPropertyEquals => check_css_equals(page, selector, expected, css_property),
        ElementEnabled => check_enabled(page, selector),
        ElementDisabled => Ok(invert(check_enabled(page, selector)?)),
        ElementChecked => check_checked(page, selector),
        ElementUnchecked => Ok(invert(check_checked(page, selector)?)),
        ValueEquals => check_value_equals(page, selector, expected),
        ValueNotEquals => Ok(invert(check_value_equals(page, selector, expected)?)),
        CountEquals | CountGreaterThan | CountLessThan => {
            check_count(page, selector, kind, expected)
        }
    }
}

/// Flips the verdict while keeping the observed facts unchanged.
fn invert(eval: Evaluation) -> Evaluation {
    Evaluation {
        success: !eval.success,
        message: eval.message,
        actual: eval.actual,
    }
}

fn check_exists(page: &dyn PageAccessor, selector: &str) -> Result<Evaluation, EvalError> {
    let exists = page.query(selector)?.is_some();
    Ok(Evaluation {
        success: exists,
        message: if exists {
            "element exists".to_string()
        } else {
            "element does not exist".to_string()
        },
        actual: Some(SpecValue::Bool(exists)),
    })
}

fn check_visible(page: &dyn PageAccessor, selector: &str) -> Result<Evaluation, EvalError> {
    let Some(el) = page.query(selector)? else {
        return Ok(Evaluation {
            success: false,
            message: NOT_FOUND.to_string(),
            actual: Some(SpecValue::Bool(false)),
        });
    };
    let (width, height) = el.box_size();
    let visible = el.computed_style("display") != "none"
        && el.computed_style("visibility") != "hidden"
        && el.computed_style("opacity") != "0"
        && width > 0.0
        && height > 0.0;
    Ok(Evaluation {
        success: visible,
        message: if visible {
            "element is visible".to_string()
        } else {
            "element is hidden".to_string()
        },
        actual: Some(SpecValue::Bool(visible)),
    })
}

fn check_text_equals(
    page: &dyn PageAccessor,
    selector: &str,
    expected: &SpecValue,
) -> Result<Evaluation, EvalError> {
    let Some(el) = page.query(selector)? else {
        return Ok(not_found());
    };
    let actual = el.text().trim().to_string();
    let expected_text = expected.as_text();
    let success = actual == expected_text;
    Ok(Evaluation {
        message: format!(
            "text {}: \"{actual}\" vs \"{expected_text}\"",
            if success { "match" } else { "mismatch" }
        ),
        actual: Some(SpecValue::Str(actual)),
        success,
    })
}

fn check_text_contains(
    page: &dyn PageAccessor,
    selector: &str,
    expected: &SpecValue,
) -> Result<Evaluation, EvalError> {
    let Some(el) = page.query(selector)? else {
        return Ok(not_found());
    };
    let actual = el.text().trim().to_string();
    let expected_text = expected.as_text();
    let contains = actual.contains(&expected_text);
    Ok(Evaluation {
        message: format!(
            "text {} \"{expected_text}\" in \"{actual}\"",
            if contains {
                "contains"
            } else {
                "does not contain"
            }
        ),
        actual: Some(SpecValue::Str(actual)),
        success: contains,
    })
}

fn check_attribute_equals(
    page: &dyn PageAccessor,
    selector: &str,
    expected: &SpecValue,
    attribute: Option<&str>,
) -> Result<Evaluation, EvalError> {
    let attribute =
        attribute.ok_or(SpecError::MissingAttribute(AssertionKind::AttributeEquals))?;
    let Some(el) = page.query(selector)? else {
        return Ok(not_found());
    };
    let actual = el.attribute(attribute);
    let expected_text = expected.as_text();
    let success = actual.as_deref() == Some(expected_text.as_str());
    Ok(Evaluation {
        message: format!(
            "attribute {attribute} {}: {} vs \"{expected_text}\"",
            if success { "match" } else { "mismatch" },
            match &actual {
                Some(v) => format!("\"{v}\""),
                None => "null".to_string(),
            }
        ),
        actual: actual.map(SpecValue::Str),
        success,
    })
}

fn check_attribute_exists(
    page: &dyn PageAccessor,
    selector: &str,
    attribute: Option<&str>,
) -> Result<Evaluation, EvalError> {
    let attribute =
        attribute.ok_or(SpecError::MissingAttribute(AssertionKind::AttributeExists))?;
    let Some(el) = page.query(selector)? else {
        return Ok(Evaluation {
            success: false,
            message: NOT_FOUND.to_string(),
            actual: Some(SpecValue::Bool(false)),
        });
    };
    let exists = el.has_attribute(attribute);
    Ok(Evaluation {
        success: exists,
        message: format!(
            "attribute {attribute} {}",
            if exists { "present" } else { "absent" }
        ),
        actual: Some(SpecValue::Bool(exists)),
    })
}

fn check_css_equals(
    page: &dyn PageAccessor,
    selector: &str,
    expected: &SpecValue,
    css_property: Option<&str>,
) -> Result<Evaluation, EvalError> {
    let property = css_property.ok_or(SpecError::MissingCssProperty(
        AssertionKind::CssPropertyEquals,
    ))?;
    let Some(el) = page.query(selector)? else {
        return Ok(not_found());
    };
    let actual = el.computed_style(property);
    let expected_text = expected.as_text();
    let success = actual == expected_text;
    Ok(Evaluation {
        message: format!(
            "css property {property} {}: \"{actual}\" vs \"{expected_text}\"",
            if success { "match" } else { "mismatch" }
        ),
        actual: Some(SpecValue::Str(actual)),
        success,
    })
}

fn check_enabled(page: &dyn PageAccessor, selector: &str) -> Result<Evaluation, EvalError> {
    let Some(el) = page.query(selector)? else {
        return Ok(Evaluation {
            success: false,
            message: NOT_FOUND.to_string(),
            actual: Some(SpecValue::Bool(false)),
        });
    };
    let enabled = !el.is_disabled();
    Ok(Evaluation {
        success: enabled,
        message: if enabled {
            "element is enabled".to_string()
        } else {
            "element is disabled".to_string()
        },
        actual: Some(SpecValue::Bool(enabled)),
    })
}

fn check_checked(page: &dyn PageAccessor, selector: &str) -> Result<Evaluation, EvalError> {
    let Some(el) = page.query(selector)? else {
        return Ok(Evaluation {
            success: false,
            message: NOT_FOUND.to_string(),
            actual: Some(SpecValue::Bool(false)),
        });
    };
    let checked = el.is_checked();
    Ok(Evaluation {
        success: checked,
        message: if checked {
            "element is checked".to_string()
        } else {
            "element is unchecked".to_string()
        },
        actual: Some(SpecValue::Bool(checked)),
    })
}

fn check_value_equals(
    page: &dyn PageAccessor,
    selector: &str,
    expected: &SpecValue,
) -> Result<Evaluation, EvalError> {
    let Some(el) = page.query(selector)? else {
        return Ok(not_found());
    };
    let actual = el.value();
    let expected_text = expected.as_text();
    let success = actual == expected_text;
    Ok(Evaluation {
        message: format!(
            "value {}: \"{actual}\" vs \"{expected_text}\"",
            if success { "match" } else { "mismatch" }
        ),
        actual: Some(SpecValue::Str(actual)),
        success,
    })
}

fn check_count(
    page: &dyn PageAccessor,
    selector: &str,
    kind: AssertionKind,
    expected: &SpecValue,
) -> Result<Evaluation, EvalError> {
    // Parsed before any element work so a bad expectation is reported
    // as a configuration error, not a polling failure.
    let expected_count = expected.as_count()?;
    let actual = page.query_all(selector)?.len();

    let (success, message) = match kind {
        AssertionKind::CountEquals => (
            actual == expected_count,
            format!(
                "element count {}: {actual} vs {expected_count}",
                if actual == expected_count {
                    "match"
                } else {
                    "mismatch"
                }
            ),
        ),
        AssertionKind::CountGreaterThan => (
            actual > expected_count,
            format!(
                "element count: {actual} {} {expected_count}",
                if actual > expected_count { ">" } else { "<=" }
            ),
        ),
        AssertionKind::CountLessThan => (
            actual < expected_count,
            format!(
                "element count: {actual} {} {expected_count}",
                if actual < expected_count { "<" } else { ">=" }
            ),
        ),
        // Routed here only for the three count kinds.
        _ => unreachable!("non-count kind routed to check_count"),
    };

    Ok(Evaluation {
        success,
        message,
        actual: Some(SpecValue::Num(actual as f64)),
    })
}

fn not_found() -> Evaluation {
    Evaluation {
        success: false,
        message: NOT_FOUND.to_string(),
        actual: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_page::MemoryPage;
    use serde_json::json;

    fn page() -> MemoryPage {
        MemoryPage::from_value(json!({
            "tag": "html",
            "children": [{
                "tag": "body",
                "children": [
                    {"tag": "div", "id": "status", "text": "Welcome back"},
                    {
                        "tag": "input", "id": "email",
                        "attrs": {"type": "email", "data-testid": "email"},
                        "value": "user@example.com"
                    },
                    {"tag": "input", "id": "agree", "attrs": {"type": "checkbox"}, "checked": true},
                    {"tag": "button", "id": "save", "disabled": true, "text": "Save"},
                    {"tag": "div", "id": "ghost", "style": {"display": "none"}},
                    {"tag": "div", "id": "flat", "width": 0.0, "height": 0.0},
                    {"tag": "li", "classes": ["row"]},
                    {"tag": "li", "classes": ["row"]}
                ]
            }]
        }))
        .unwrap()
    }

    fn eval(
        page: &MemoryPage,
        selector: &str,
        kind: AssertionKind,
        expected: SpecValue,
    ) -> Evaluation {
        evaluate(page, selector, kind, &expected, None, None).unwrap()
    }

    #[test]
    fn test_exists_and_not_exists() {
        let page = page();
        let hit = eval(&page, "#status", AssertionKind::ElementExists, true.into());
        assert!(hit.success);
        assert_eq!(hit.actual, Some(SpecValue::Bool(true)));

        let miss = eval(&page, "#nope", AssertionKind::ElementExists, true.into());
        assert!(!miss.success);
        assert_eq!(miss.actual, Some(SpecValue::Bool(false)));

        let not = eval(&page, "#nope", AssertionKind::ElementNotExists, true.into());
        assert!(not.success);
    }

    #[test]
    fn test_visibility_rules() {
        let page = page();
        assert!(eval(&page, "#status", AssertionKind::ElementVisible, true.into()).success);
        // display:none defeats visibility even with a box.
        assert!(!eval(&page, "#ghost", AssertionKind::ElementVisible, true.into()).success);
        // A zero-size box defeats visibility even with visible style.
        assert!(!eval(&page, "#flat", AssertionKind::ElementVisible, true.into()).success);
        assert!(eval(&page, "#flat", AssertionKind::ElementHidden, true.into()).success);
    }

    #[test]
    fn test_text_kinds() {
        let page = page();
        let eq = eval(
            &page,
            "#status",
            AssertionKind::TextEquals,
            "Welcome back".into(),
        );
        assert!(eq.success);
        assert_eq!(eq.actual, Some(SpecValue::Str("Welcome back".into())));

        let contains = eval(&page, "#status", AssertionKind::TextContains, "Welcome".into());
        assert!(contains.success);

        let not_contains = eval(
            &page,
            "#status",
            AssertionKind::TextNotContains,
            "Error".into(),
        );
        assert!(not_contains.success);
        assert_eq!(
            not_contains.actual,
            Some(SpecValue::Str("Welcome back".into()))
        );
    }

    #[test]
    fn test_text_missing_element_actual_is_null() {
        let page = page();
        let miss = eval(&page, "#nope", AssertionKind::TextEquals, "x".into());
        assert!(!miss.success);
        assert_eq!(miss.actual, None);
    }

    #[test]
    fn test_attribute_kinds() {
        let page = page();
        let eq = evaluate(
            &page,
            "#email",
            AssertionKind::AttributeEquals,
            &"email".into(),
            Some("type"),
            None,
        )
        .unwrap();
        assert!(eq.success);

        let exists = evaluate(
            &page,
            "#email",
            AssertionKind::AttributeExists,
            &true.into(),
            Some("data-testid"),
            None,
        )
        .unwrap();
        assert!(exists.success);

        let absent = evaluate(
            &page,
            "#email",
            AssertionKind::AttributeNotExists,
            &true.into(),
            Some("aria-hidden"),
            None,
        )
        .unwrap();
        assert!(absent.success);
    }

    #[test]
    fn test_missing_attribute_operand_is_config_error() {
        let page = page();
        let err = evaluate(
            &page,
            "#email",
            AssertionKind::AttributeEquals,
            &"x".into(),
            None,
            None,
        );
        assert!(matches!(err, Err(EvalError::Spec(SpecError::MissingAttribute(_)))));
    }

    #[test]
    fn test_css_property_equals() {
        let page = page();
        let hit = evaluate(
            &page,
            "#ghost",
            AssertionKind::CssPropertyEquals,
            &"none".into(),
            None,
            Some("display"),
        )
        .unwrap();
        assert!(hit.success);

        let err = evaluate(
            &page,
            "#ghost",
            AssertionKind::CssPropertyEquals,
            &"none".into(),
            None,
            None,
        );
        assert!(matches!(
            err,
            Err(EvalError::Spec(SpecError::MissingCssProperty(_)))
        ));
    }

    #[test]
    fn test_enabled_disabled_checked_value() {
        let page = page();
        assert!(eval(&page, "#email", AssertionKind::ElementEnabled, true.into()).success);
        assert!(eval(&page, "#save", AssertionKind::ElementDisabled, true.into()).success);
        assert!(eval(&page, "#agree", AssertionKind::ElementChecked, true.into()).success);
        assert!(
            eval(
                &page,
                "#email",
                AssertionKind::ValueEquals,
                "user@example.com".into()
            )
            .success
        );
        assert!(eval(&page, "#email", AssertionKind::ValueNotEquals, "other".into()).success);
    }

    #[test]
    fn test_count_kinds() {
        let page = page();
        let eq = eval(&page, "li.row", AssertionKind::CountEquals, 2usize.into());
        assert!(eq.success);
        assert_eq!(eq.actual, Some(SpecValue::Num(2.0)));

        assert!(eval(&page, "li.row", AssertionKind::CountGreaterThan, 1usize.into()).success);
        assert!(!eval(&page, "li.row", AssertionKind::CountLessThan, 2usize.into()).success);
        // Numeric strings are accepted.
        assert!(eval(&page, "li.row", AssertionKind::CountEquals, "2".into()).success);
    }

    #[test]
    fn test_count_bad_expectation_is_config_error() {
        let page = page();
        let err = evaluate(
            &page,
            "li.row",
            AssertionKind::CountEquals,
            &"several".into(),
            None,
            None,
        );
        assert!(matches!(err, Err(EvalError::Spec(SpecError::InvalidCount(_)))));
    }

    #[test]
    fn test_invalid_selector_is_error() {
        let page = page();
        let err = evaluate(
            &page,
            "a, b",
            AssertionKind::ElementExists,
            &true.into(),
            None,
            None,
        );
        assert!(matches!(err, Err(EvalError::Page(PageError::InvalidSelector(_)))));
    }

    #[test]
    fn test_negation_pairs_invert_success_and_share_actual() {
        let page = page();
        let attribute = Some("data-testid");
        for selector in ["#status", "#email", "#agree", "#save", "#ghost", "#nope"] {
            for kind in AssertionKind::all() {
                let Some(negative) = kind.negation_of() else {
                    continue;
                };
                let expected: SpecValue = "user@example.com".into();
                let pos = evaluate(&page, selector, *kind, &expected, attribute, None).unwrap();
                let neg = evaluate(&page, selector, negative, &expected, attribute, None).unwrap();
                assert_eq!(
                    pos.success, !neg.success,
                    "pair {kind}/{negative} disagreed on {selector}"
                );
                assert_eq!(
                    pos.actual, neg.actual,
                    "pair {kind}/{negative} actual drifted on {selector}"
                );
            }
        }
    }

    #[test]
    fn test_read_only_evaluation_is_idempotent() {
        let page = page();
        let first = eval(&page, "#status", AssertionKind::ElementExists, true.into());
        let second = eval(&page, "#status", AssertionKind::ElementExists, true.into());
        assert_eq!(first.success, second.success);
        assert_eq!(first.actual, second.actual);
    }
}
