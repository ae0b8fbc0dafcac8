//! Page access capability.
//!
//! The evaluator and runner never touch a document directly; they go
//! through [`PageAccessor`], a capability trait over whatever page
//! context the process has. This keeps the execution core testable
//! against [`crate::MemoryPage`] without a rendering engine, and lets
//! the bridge's page-side responder reuse the same seam.

use thiserror::Error;

/// Errors surfaced by page access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    /// The selector could not be parsed.
    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    /// A page fixture could not be loaded.
    #[error("invalid page fixture: {0}")]
    Fixture(String),
}

/// A handle to one resolved element.
///
/// Reads reflect the element's state at call time; interactions mutate
/// the underlying document.
pub trait PageElement: Send + Sync {
    /// Lowercase tag name.
    fn tag(&self) -> String;

    /// Concatenated text content of the element's subtree.
    fn text(&self) -> String;

    /// Attribute value, `None` when absent.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Whether the attribute is present at all.
    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Computed style value for a property; empty string when the
    /// property resolves to nothing.
    fn computed_style(&self, property: &str) -> String;

    /// Current value of a form control (empty for non-controls).
    fn value(&self) -> String;

    /// Whether a checkbox/radio is checked.
    fn is_checked(&self) -> bool;

    /// Whether the control is disabled.
    fn is_disabled(&self) -> bool;

    /// Rendered box dimensions, `(width, height)`.
    fn box_size(&self) -> (f64, f64);

    /// Dispatches click semantics on the element.
    fn click(&self) -> Result<(), PageError>;

    /// Sets a form control's value and dispatches input/change
    /// notifications.
    fn set_value(&self, value: &str) -> Result<(), PageError>;
}

/// Read access to a page document.
pub trait PageAccessor: Send + Sync {
    /// Resolves a selector to its first match in document order.
    fn query(&self, selector: &str) -> Result<Option<Box<dyn PageElement>>, PageError>;

    /// Resolves a selector to all matches in document order.
    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>, PageError>;
}
