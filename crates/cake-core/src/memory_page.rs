//! In-memory page document.
//!
//! [`MemoryPage`] implements [`PageAccessor`] over a plain node tree,
//! so the evaluator, runner, and bridge responder can be exercised
//! end-to-end without a rendering engine. Pages are built from JSON
//! fixtures; fixture nodes may declare click effects (set another
//! element's text, attribute, or style) so scenarios have reactive
//! behavior to assert against.

use crate::page::{PageAccessor, PageElement, PageError};
use crate::selector::{AttrCond, Combinator, Selector, SelectorPart};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const DEFAULT_BOX_WIDTH: f64 = 100.0;
const DEFAULT_BOX_HEIGHT: f64 = 20.0;

/// A mutation applied to the document when an element is clicked.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClickEffect {
    /// Replace the text of every element matching `selector`.
    SetText { selector: String, text: String },

    /// Set an attribute on every element matching `selector`.
    SetAttribute {
        selector: String,
        name: String,
        value: String,
    },

    /// Set a style property on every element matching `selector`.
    SetStyle {
        selector: String,
        property: String,
        value: String,
    },
}

impl ClickEffect {
    fn selector(&self) -> &str {
        match self {
            ClickEffect::SetText { selector, .. }
            | ClickEffect::SetAttribute { selector, .. }
            | ClickEffect::SetStyle { selector, .. } => selector,
        }
    }
}

/// One node of a page fixture.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NodeSpec {
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub style: BTreeMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub on_click: Vec<ClickEffect>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<usize>,
    children: Vec<usize>,
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    text: String,
    value: String,
    checked: bool,
    disabled: bool,
    width: f64,
    height: f64,
    on_click: Vec<ClickEffect>,
    click_count: u32,
    events: Vec<String>,
}

#[derive(Debug, Default)]
struct PageDoc {
    /// Nodes in document (DFS preorder) order; index 0 is the root.
    nodes: Vec<Node>,
}

impl PageDoc {
    fn insert(&mut self, spec: NodeSpec, parent: Option<usize>) -> Result<usize, PageError> {
        for effect in &spec.on_click {
            Selector::parse(effect.selector())
                .map_err(|e| PageError::Fixture(format!("bad click effect selector: {e}")))?;
        }

        let index = self.nodes.len();
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            tag: spec.tag.to_ascii_lowercase(),
            id: spec.id,
            classes: spec.classes,
            attrs: spec.attrs,
            style: spec.style,
            text: spec.text,
            value: spec.value,
            checked: spec.checked,
            disabled: spec.disabled,
            width: spec.width.unwrap_or(DEFAULT_BOX_WIDTH),
            height: spec.height.unwrap_or(DEFAULT_BOX_HEIGHT),
            on_click: spec.on_click,
            click_count: 0,
            events: Vec::new(),
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(index);
        }
        for child in spec.children {
            self.insert(child, Some(index))?;
        }
        Ok(index)
    }

    fn step_matches(&self, index: usize, part: &SelectorPart) -> bool {
        let node = &self.nodes[index];
        let step = &part.step;

        if let Some(tag) = &step.tag
            && node.tag != *tag
        {
            return false;
        }
        if let Some(id) = &step.id
            && node.id.as_deref() != Some(id.as_str())
        {
            return false;
        }
        for class in &step.classes {
            if !node.classes.iter().any(|c| c == class) {
                return false;
            }
        }
        for cond in &step.attrs {
            match cond {
                AttrCond::Exists(name) => {
                    if !node.attrs.contains_key(name) {
                        return false;
                    }
                }
                AttrCond::Eq(name, value) => {
                    if node.attrs.get(name) != Some(value) {
                        return false;
                    }
                }
            }
        }
        if let Some(n) = step.nth_of_type
            && self.nth_of_type(index) != n
        {
            return false;
        }
        true
    }

    /// 1-based position of the node among same-tag siblings.
    fn nth_of_type(&self, index: usize) -> usize {
        let node = &self.nodes[index];
        let Some(parent) = node.parent else {
            return 1;
        };
        let mut nth = 0;
        for &sibling in &self.nodes[parent].children {
            if self.nodes[sibling].tag == node.tag {
                nth += 1;
            }
            if sibling == index {
                break;
            }
        }
        nth
    }

    /// Matches a selector chain ending at `index`, walking ancestors
    /// right-to-left.
    fn chain_matches(&self, index: usize, parts: &[SelectorPart]) -> bool {
        let Some((last, rest)) = parts.split_last() else {
            return false;
        };
        if !self.step_matches(index, last) {
            return false;
        }
        if rest.is_empty() {
            return true;
        }
        match last.combinator {
            Some(Combinator::Child) => self.nodes[index]
                .parent
                .is_some_and(|p| self.chain_matches(p, rest)),
            Some(Combinator::Descendant) => {
                let mut ancestor = self.nodes[index].parent;
                while let Some(a) = ancestor {
                    if self.chain_matches(a, rest) {
                        return true;
                    }
                    ancestor = self.nodes[a].parent;
                }
                false
            }
            // A multi-part chain always carries a combinator on the
            // non-first parts; an absent one cannot match.
            None => false,
        }
    }

    fn query_indices(&self, selector: &Selector) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| self.chain_matches(i, &selector.parts))
            .collect()
    }

    fn subtree_text(&self, index: usize, out: &mut String) {
        out.push_str(&self.nodes[index].text);
        for &child in &self.nodes[index].children {
            self.subtree_text(child, out);
        }
    }

    fn apply_click(&mut self, index: usize) {
        self.nodes[index].click_count += 1;
        self.nodes[index].events.push("click".to_string());

        let is_input = self.nodes[index].tag == "input";
        let input_type = self.nodes[index].attrs.get("type").cloned();
        if is_input {
            match input_type.as_deref() {
                Some("checkbox") => self.nodes[index].checked = !self.nodes[index].checked,
                Some("radio") => self.nodes[index].checked = true,
                _ => {}
            }
        }

        let effects = self.nodes[index].on_click.clone();
        for effect in effects {
            // Effect selectors were validated when the fixture loaded.
            let Ok(sel) = Selector::parse(effect.selector()) else {
                continue;
            };
            for target in self.query_indices(&sel) {
                match &effect {
                    ClickEffect::SetText { text, .. } => {
                        self.nodes[target].text = text.clone();
                    }
                    ClickEffect::SetAttribute { name, value, .. } => {
                        self.nodes[target].attrs.insert(name.clone(), value.clone());
                    }
                    ClickEffect::SetStyle {
                        property, value, ..
                    } => {
                        self.nodes[target]
                            .style
                            .insert(property.clone(), value.clone());
                    }
                }
            }
        }
    }
}

/// An in-memory page sharing one mutable document across handles.
#[derive(Clone, Default)]
pub struct MemoryPage {
    doc: Arc<RwLock<PageDoc>>,
}

impl MemoryPage {
    /// Builds a page from a fixture node tree.
    pub fn from_spec(root: NodeSpec) -> Result<Self, PageError> {
        let mut doc = PageDoc::default();
        doc.insert(root, None)?;
        Ok(Self {
            doc: Arc::new(RwLock::new(doc)),
        })
    }

    /// Builds a page from fixture JSON.
    pub fn from_json(json: &str) -> Result<Self, PageError> {
        let spec: NodeSpec =
            serde_json::from_str(json).map_err(|e| PageError::Fixture(e.to_string()))?;
        Self::from_spec(spec)
    }

    /// Builds a page from an in-memory fixture value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, PageError> {
        let spec: NodeSpec =
            serde_json::from_value(value).map_err(|e| PageError::Fixture(e.to_string()))?;
        Self::from_spec(spec)
    }

    fn read(&self) -> RwLockReadGuard<'_, PageDoc> {
        self.doc.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PageDoc> {
        self.doc
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// How many times the first match of `selector` was clicked.
    /// Test/diagnostic accessor.
    pub fn click_count(&self, selector: &str) -> Result<u32, PageError> {
        let sel = Selector::parse(selector)?;
        let doc = self.read();
        Ok(doc
            .query_indices(&sel)
            .first()
            .map(|&i| doc.nodes[i].click_count)
            .unwrap_or(0))
    }

    /// Events dispatched on the first match of `selector`, in order.
    /// Test/diagnostic accessor.
    pub fn dispatched_events(&self, selector: &str) -> Result<Vec<String>, PageError> {
        let sel = Selector::parse(selector)?;
        let doc = self.read();
        Ok(doc
            .query_indices(&sel)
            .first()
            .map(|&i| doc.nodes[i].events.clone())
            .unwrap_or_default())
    }
}

impl PageAccessor for MemoryPage {
    fn query(&self, selector: &str) -> Result<Option<Box<dyn PageElement>>, PageError> {
        let sel = Selector::parse(selector)?;
        let first = self.read().query_indices(&sel).into_iter().next();
        Ok(first.map(|index| {
            Box::new(MemoryElement {
                doc: Arc::clone(&self.doc),
                index,
            }) as Box<dyn PageElement>
        }))
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>, PageError> {
        let sel = Selector::parse(selector)?;
        Ok(self
            .read()
            .query_indices(&sel)
            .into_iter()
            .map(|index| {
                Box::new(MemoryElement {
                    doc: Arc::clone(&self.doc),
                    index,
                }) as Box<dyn PageElement>
            })
            .collect())
    }
}

struct MemoryElement {
    doc: Arc<RwLock<PageDoc>>,
    index: usize,
}

impl MemoryElement {
    fn read(&self) -> RwLockReadGuard<'_, PageDoc> {
        self.doc.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PageDoc> {
        self.doc
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl PageElement for MemoryElement {
    fn tag(&self) -> String {
        self.read().nodes[self.index].tag.clone()
    }

    fn text(&self) -> String {
        let doc = self.read();
        let mut out = String::new();
        doc.subtree_text(self.index, &mut out);
        out
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.read().nodes[self.index].attrs.get(name).cloned()
    }

    fn computed_style(&self, property: &str) -> String {
        let doc = self.read();
        if let Some(v) = doc.nodes[self.index].style.get(property) {
            return v.clone();
        }
        match property {
            "display" => "block".to_string(),
            "visibility" => "visible".to_string(),
            "opacity" => "1".to_string(),
            _ => String::new(),
        }
    }

    fn value(&self) -> String {
        self.read().nodes[self.index].value.clone()
    }

    fn is_checked(&self) -> bool {
        self.read().nodes[self.index].checked
    }

    fn is_disabled(&self) -> bool {
        let doc = self.read();
        let node = &doc.nodes[self.index];
        node.disabled || node.attrs.contains_key("disabled")
    }

    fn box_size(&self) -> (f64, f64) {
        let doc = self.read();
        let node = &doc.nodes[self.index];
        (node.width, node.height)
    }

    fn click(&self) -> Result<(), PageError> {
        self.write().apply_click(self.index);
        Ok(())
    }

    fn set_value(&self, value: &str) -> Result<(), PageError> {
        let mut doc = self.write();
        let node = &mut doc.nodes[self.index];
        node.value = value.to_string();
        node.events.push("input".to_string());
        node.events.push("change".to_string());
        Ok(())
    }
}
