//! Assertion specifications and results.
//!
//! An [`AssertionSpec`] describes one boolean check against page state:
//! a [`AssertionKind`] picking the comparison semantics, an expected
//! value, and optional `attribute`/`cssProperty` operands required by
//! some kinds. Which fields a kind requires is a validation invariant
//! checked by [`AssertionSpec::validate`] before any evaluation, so a
//! malformed spec fails fast instead of silently mis-evaluating.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default evaluation deadline for an assertion.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default delay between evaluation attempts.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 500;

/// The closed set of assertion comparisons.
///
/// Wire names are the snake_case variant names (`element_exists`,
/// `count_greater_than`, ...). Negative kinds are always evaluated by
/// delegating to their positive counterpart and inverting, so the
/// pairs in [`AssertionKind::negation_of`] can never drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    ElementExists,
    ElementNotExists,
    ElementVisible,
    ElementHidden,
    TextEquals,
    TextContains,
    TextNotContains,
    AttributeEquals,
    AttributeExists,
    AttributeNotExists,
    CssPropertyEquals,
    ElementEnabled,
    ElementDisabled,
    ElementChecked,
    ElementUnchecked,
    ValueEquals,
    ValueNotEquals,
    CountEquals,
    CountGreaterThan,
    CountLessThan,
}

impl AssertionKind {
    /// All kinds, in declaration order.
    pub fn all() -> &'static [AssertionKind] {
        use AssertionKind::*;
        &[
            ElementExists,
            ElementNotExists,
            ElementVisible,
            ElementHidden,
            TextEquals,
            TextContains,
            TextNotContains,
            AttributeEquals,
            AttributeExists,
            AttributeNotExists,
            CssPropertyEquals,
            ElementEnabled,
            ElementDisabled,
            ElementChecked,
            ElementUnchecked,
            ValueEquals,
            ValueNotEquals,
            CountEquals,
            CountGreaterThan,
            CountLessThan,
        ]
    }

    /// The snake_case wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        use AssertionKind::*;
        match self {
            ElementExists => "element_exists",
            ElementNotExists => "element_not_exists",
            ElementVisible => "element_visible",
            ElementHidden => "element_hidden",
            TextEquals => "text_equals",
            TextContains => "text_contains",
            TextNotContains => "text_not_contains",
            AttributeEquals => "attribute_equals",
            AttributeExists => "attribute_exists",
            AttributeNotExists => "attribute_not_exists",
            CssPropertyEquals => "css_property_equals",
            ElementEnabled => "element_enabled",
            ElementDisabled => "element_disabled",
            ElementChecked => "element_checked",
            ElementUnchecked => "element_unchecked",
            ValueEquals => "value_equals",
            ValueNotEquals => "value_not_equals",
            CountEquals => "count_equals",
            CountGreaterThan => "count_greater_than",
            CountLessThan => "count_less_than",
        }
    }

    /// Short human-readable label for UI display.
    pub fn label(&self) -> &'static str {
        use AssertionKind::*;
        match self {
            ElementExists => "element exists",
            ElementNotExists => "element absent",
            ElementVisible => "element visible",
            ElementHidden => "element hidden",
            TextEquals => "text equals",
            TextContains => "text contains",
            TextNotContains => "text does not contain",
            AttributeEquals => "attribute equals",
            AttributeExists => "attribute exists",
            AttributeNotExists => "attribute absent",
            CssPropertyEquals => "CSS property equals",
            ElementEnabled => "element enabled",
            ElementDisabled => "element disabled",
            ElementChecked => "element checked",
            ElementUnchecked => "element unchecked",
            ValueEquals => "value equals",
            ValueNotEquals => "value differs",
            CountEquals => "count equals",
            CountGreaterThan => "count greater than",
            CountLessThan => "count less than",
        }
    }

    /// The paired kind this one logically negates, if any.
    ///
    /// The relation is symmetric: `element_exists` maps to
    /// `element_not_exists` and vice versa.
    pub fn negation_of(&self) -> Option<AssertionKind> {
        use AssertionKind::*;
        match self {
            ElementExists => Some(ElementNotExists),
            ElementNotExists => Some(ElementExists),
            ElementVisible => Some(ElementHidden),
            ElementHidden => Some(ElementVisible),
            TextContains => Some(TextNotContains),
            TextNotContains => Some(TextContains),
            AttributeExists => Some(AttributeNotExists),
            AttributeNotExists => Some(AttributeExists),
            ElementEnabled => Some(ElementDisabled),
            ElementDisabled => Some(ElementEnabled),
            ElementChecked => Some(ElementUnchecked),
            ElementUnchecked => Some(ElementChecked),
            ValueEquals => Some(ValueNotEquals),
            ValueNotEquals => Some(ValueEquals),
            _ => None,
        }
    }

    /// True for the `attribute_*` kinds, which need an `attribute` operand.
    pub fn requires_attribute(&self) -> bool {
        matches!(
            self,
            AssertionKind::AttributeEquals
                | AssertionKind::AttributeExists
                | AssertionKind::AttributeNotExists
        )
    }

    /// True for `css_property_equals`, which needs a `cssProperty` operand.
    pub fn requires_css_property(&self) -> bool {
        matches!(self, AssertionKind::CssPropertyEquals)
    }

    /// True for the `count_*` kinds, which compare multi-match counts.
    pub fn is_count(&self) -> bool {
        matches!(
            self,
            AssertionKind::CountEquals
                | AssertionKind::CountGreaterThan
                | AssertionKind::CountLessThan
        )
    }
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An expected or actual assertion value: string, number, or boolean.
///
/// Serializes untagged, so the JSON form is the bare value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecValue {
    Bool(bool),
    Num(f64),
    Str(String),
}

impl SpecValue {
    /// The value as comparison text.
    ///
    /// Strings are returned as-is; numbers and booleans use their
    /// canonical display form.
    pub fn as_text(&self) -> String {
        match self {
            SpecValue::Str(s) => s.clone(),
            SpecValue::Num(n) => format_num(*n),
            SpecValue::Bool(b) => b.to_string(),
        }
    }

    /// Parses the value as an element count.
    ///
    /// Accepts a non-negative integral number or a numeric string.
    /// Anything else is a configuration error, reported before any
    /// polling starts.
    pub fn as_count(&self) -> Result<usize, SpecError> {
        match self {
            SpecValue::Num(n) if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as usize),
            SpecValue::Str(s) => s
                .trim()
                .parse::<usize>()
                .map_err(|_| SpecError::InvalidCount(s.clone())),
            other => Err(SpecError::InvalidCount(other.as_text())),
        }
    }
}

impl fmt::Display for SpecValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for SpecValue {
    fn from(s: &str) -> Self {
        SpecValue::Str(s.to_string())
    }
}

impl From<String> for SpecValue {
    fn from(s: String) -> Self {
        SpecValue::Str(s)
    }
}

impl From<bool> for SpecValue {
    fn from(b: bool) -> Self {
        SpecValue::Bool(b)
    }
}

impl From<u64> for SpecValue {
    fn from(n: u64) -> Self {
        SpecValue::Num(n as f64)
    }
}

impl From<usize> for SpecValue {
    fn from(n: usize) -> Self {
        SpecValue::Num(n as f64)
    }
}

fn format_num(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Errors produced by spec validation.
///
/// These are configuration errors: retrying a malformed spec cannot
/// succeed, so the engine reports them immediately without polling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// An `attribute_*` kind is missing its `attribute` operand.
    #[error("assertion `{0}` requires an `attribute` field")]
    MissingAttribute(AssertionKind),

    /// `css_property_equals` is missing its `cssProperty` operand.
    #[error("assertion `{0}` requires a `cssProperty` field")]
    MissingCssProperty(AssertionKind),

    /// A count expectation is not a non-negative integer.
    #[error("count assertion expects a non-negative integer, got `{0}`")]
    InvalidCount(String),
}

/// One configured assertion: kind, expectation, operands, and the
/// timeout/retry budget the engine polls with.
///
/// Immutable once constructed; owned by the step that carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionSpec {
    /// Comparison semantics.
    #[serde(rename = "type")]
    pub kind: AssertionKind,

    /// Expected value; its meaning depends on `kind`.
    pub expected: SpecValue,

    /// Attribute name, required by the `attribute_*` kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    /// CSS property name, required by `css_property_equals`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_property: Option<String>,

    /// Optional user-facing description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Polling deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay between evaluation attempts in milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_retry_interval_ms() -> u64 {
    DEFAULT_RETRY_INTERVAL_MS
}

impl AssertionSpec {
    /// Creates a spec with default timeout and retry interval.
    pub fn new(kind: AssertionKind, expected: impl Into<SpecValue>) -> Self {
        Self {
            kind,
            expected: expected.into(),
            attribute: None,
            css_property: None,
            description: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
        }
    }

    /// Sets the attribute operand.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Sets the CSS property operand.
    pub fn with_css_property(mut self, property: impl Into<String>) -> Self {
        self.css_property = Some(property.into());
        self
    }

    /// Sets the polling deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Sets the delay between evaluation attempts.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval_ms = interval.as_millis() as u64;
        self
    }

    /// The polling deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The retry interval as a [`Duration`].
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Checks the kind/field invariant.
    ///
    /// A spec whose kind requires an operand the spec does not carry,
    /// or whose count expectation is non-numeric, is rejected here so
    /// the engine never polls a spec that cannot succeed.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.kind.requires_attribute() && self.attribute.is_none() {
            return Err(SpecError::MissingAttribute(self.kind));
        }
        if self.kind.requires_css_property() && self.css_property.is_none() {
            return Err(SpecError::MissingCssProperty(self.kind));
        }
        if self.kind.is_count() {
            self.expected.as_count()?;
        }
        Ok(())
    }
}

/// Outcome of one assertion execution.
///
/// Produced fresh per evaluation and never mutated afterwards.
/// `actual` is `None` when the target element could not be located.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    /// Whether the assertion held.
    pub success: bool,

    /// Human-readable verdict, embedding actual vs expected.
    pub message: String,

    /// Observed value, if the target could be located.
    pub actual: Option<SpecValue>,

    /// The configured expectation, echoed back.
    pub expected: SpecValue,

    /// Wall-clock start of the execution, millis since epoch.
    pub timestamp_ms: i64,

    /// Total execution time including retries, in milliseconds.
    pub duration_ms: u64,

    /// Exception or transport detail when the failure was not a plain
    /// comparison mismatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}
