//! CSS selector parsing.
//!
//! Covers the grammar the element picker's path generator emits, plus
//! the attribute forms the selector-quality strategies produce: tag,
//! `*`, `#id`, `.class`, `[attr]`, `[attr="value"]`,
//! `:nth-of-type(n)`, and the descendant / `>` combinators. Anything
//! else (comma groups, sibling combinators, other pseudo-classes) is
//! rejected as [`PageError::InvalidSelector`] rather than silently
//! matching nothing.

use crate::page::PageError;

/// Relation of a compound step to the step on its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

/// One attribute condition inside `[...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrCond {
    Exists(String),
    Eq(String, String),
}

/// One compound selector step (`input.field[type="email"]`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorStep {
    pub tag: Option<String>,
    pub universal: bool,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrCond>,
    /// 1-based `:nth-of-type(n)` position, if present.
    pub nth_of_type: Option<usize>,
}

impl SelectorStep {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && !self.universal
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.nth_of_type.is_none()
    }
}

/// A step together with its combinator; the first part of a chain has
/// no combinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorPart {
    pub step: SelectorStep,
    pub combinator: Option<Combinator>,
}

/// A parsed selector chain, matched right-to-left against a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub parts: Vec<SelectorPart>,
}

impl Selector {
    /// Parses a selector string.
    pub fn parse(selector: &str) -> Result<Self, PageError> {
        let trimmed = selector.trim();
        if trimmed.is_empty() {
            return Err(PageError::InvalidSelector(selector.to_string()));
        }

        let tokens = tokenize(trimmed).ok_or_else(|| invalid(selector))?;
        let mut parts = Vec::new();
        let mut pending: Option<Combinator> = None;

        for token in tokens {
            if token == ">" {
                if pending.is_some() || parts.is_empty() {
                    return Err(invalid(selector));
                }
                pending = Some(Combinator::Child);
                continue;
            }
            let step = parse_step(&token).ok_or_else(|| invalid(selector))?;
            let combinator = if parts.is_empty() {
                None
            } else {
                Some(pending.take().unwrap_or(Combinator::Descendant))
            };
            parts.push(SelectorPart { step, combinator });
        }

        if parts.is_empty() || pending.is_some() {
            return Err(invalid(selector));
        }
        Ok(Selector { parts })
    }
}

fn invalid(selector: &str) -> PageError {
    PageError::InvalidSelector(selector.to_string())
}

/// Splits a chain into compound-step tokens and `>` combinators,
/// keeping bracketed and parenthesized sections intact.
fn tokenize(selector: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;
    let mut paren_depth = 0usize;

    let mut flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.trim().is_empty() {
            tokens.push(current.trim().to_string());
        }
        current.clear();
    };

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                bracket_depth = bracket_depth.checked_sub(1)?;
                current.push(ch);
            }
            '(' => {
                paren_depth += 1;
                current.push(ch);
            }
            ')' => {
                paren_depth = paren_depth.checked_sub(1)?;
                current.push(ch);
            }
            ',' if bracket_depth == 0 && paren_depth == 0 => return None,
            '>' if bracket_depth == 0 && paren_depth == 0 => {
                flush(&mut current, &mut tokens);
                tokens.push(">".to_string());
            }
            c if c.is_ascii_whitespace() && bracket_depth == 0 && paren_depth == 0 => {
                flush(&mut current, &mut tokens);
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 || paren_depth != 0 {
        return None;
    }
    flush(&mut current, &mut tokens);
    if tokens.is_empty() { None } else { Some(tokens) }
}

fn parse_step(token: &str) -> Option<SelectorStep> {
    let bytes = token.as_bytes();
    let mut step = SelectorStep::default();
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if step.universal || step.tag.is_some() {
                    return None;
                }
                step.universal = true;
                i += 1;
            }
            b'#' => {
                let (ident, next) = parse_ident(token, i + 1)?;
                if step.id.replace(ident).is_some() {
                    return None;
                }
                i = next;
            }
            b'.' => {
                let (class, next) = parse_ident(token, i + 1)?;
                step.classes.push(class);
                i = next;
            }
            b'[' => {
                let (cond, next) = parse_attr(token, i)?;
                step.attrs.push(cond);
                i = next;
            }
            b':' => {
                let (nth, next) = parse_nth_of_type(token, i)?;
                if step.nth_of_type.replace(nth).is_some() {
                    return None;
                }
                i = next;
            }
            _ => {
                if step.tag.is_some()
                    || step.universal
                    || step.id.is_some()
                    || !step.classes.is_empty()
                {
                    return None;
                }
                let (tag, next) = parse_ident(token, i)?;
                step.tag = Some(tag.to_ascii_lowercase());
                i = next;
            }
        }
    }

    if step.is_empty() { None } else { Some(step) }
}

/// Reads a CSS identifier (letters, digits, `-`, `_`) starting at
/// `start`; returns the identifier and the index just past it.
fn parse_ident(token: &str, start: usize) -> Option<(String, usize)> {
    let bytes = token.as_bytes();
    let mut end = start;
    while end < bytes.len() {
        let b = bytes[end];
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            end += 1;
        } else {
            break;
        }
    }
    if end == start {
        return None;
    }
    Some((token[start..end].to_string(), end))
}

/// Parses `[name]` or `[name="value"]` starting at the `[`.
fn parse_attr(token: &str, start: usize) -> Option<(AttrCond, usize)> {
    let close = token[start..].find(']')? + start;
    let body = token[start + 1..close].trim();
    let next = close + 1;

    if let Some((name, raw_value)) = body.split_once('=') {
        let name = name.trim();
        let raw_value = raw_value.trim();
        let value = raw_value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| {
                raw_value
                    .strip_prefix('\'')
                    .and_then(|v| v.strip_suffix('\''))
            })
            .unwrap_or(raw_value);
        if name.is_empty() {
            return None;
        }
        Some((AttrCond::Eq(name.to_string(), value.to_string()), next))
    } else {
        if body.is_empty() {
            return None;
        }
        Some((AttrCond::Exists(body.to_string()), next))
    }
}

/// Parses `:nth-of-type(n)` starting at the `:`.
fn parse_nth_of_type(token: &str, start: usize) -> Option<(usize, usize)> {
    let tail = token.get(start + 1..)?;
    let rest = tail.strip_prefix("nth-of-type(")?;
    let close = rest.find(')')?;
    let n: usize = rest[..close].trim().parse().ok()?;
    if n == 0 {
        return None;
    }
    let next = start + 1 + "nth-of-type(".len() + close + 1;
    Some((n, next))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(selector: &str) -> Selector {
        Selector::parse(selector).unwrap()
    }

    #[test]
    fn test_parse_simple_forms() {
        assert_eq!(parse("div").parts[0].step.tag.as_deref(), Some("div"));
        assert_eq!(parse("#login-btn").parts[0].step.id.as_deref(), Some("login-btn"));
        assert_eq!(parse(".card").parts[0].step.classes, vec!["card".to_string()]);
        assert!(parse("*").parts[0].step.universal);
    }

    #[test]
    fn test_parse_compound_step() {
        let sel = parse("input.field#email[type=\"email\"]:nth-of-type(2)");
        let step = &sel.parts[0].step;
        assert_eq!(step.tag.as_deref(), Some("input"));
        assert_eq!(step.id.as_deref(), Some("email"));
        assert_eq!(step.classes, vec!["field".to_string()]);
        assert_eq!(
            step.attrs,
            vec![AttrCond::Eq("type".to_string(), "email".to_string())]
        );
        assert_eq!(step.nth_of_type, Some(2));
    }

    #[test]
    fn test_parse_attr_exists() {
        let sel = parse("[data-testid]");
        assert_eq!(
            sel.parts[0].step.attrs,
            vec![AttrCond::Exists("data-testid".to_string())]
        );
    }

    #[test]
    fn test_parse_combinators() {
        let sel = parse("div > span b");
        assert_eq!(sel.parts.len(), 3);
        assert_eq!(sel.parts[0].combinator, None);
        assert_eq!(sel.parts[1].combinator, Some(Combinator::Child));
        assert_eq!(sel.parts[2].combinator, Some(Combinator::Descendant));
    }

    #[test]
    fn test_parse_picker_path_shape() {
        // The shape the picker's cssPath generator produces.
        let sel = parse("div#root > form:nth-of-type(1) > input:nth-of-type(2)");
        assert_eq!(sel.parts.len(), 3);
        assert_eq!(sel.parts[2].step.nth_of_type, Some(2));
    }

    #[test]
    fn test_tag_is_lowercased() {
        assert_eq!(parse("DIV").parts[0].step.tag.as_deref(), Some("div"));
    }

    #[test]
    fn test_rejects_unsupported() {
        for bad in ["", "  ", "a, b", "div >", "> div", "div + p", ":nth-of-type(0)", "[=x]", "[unclosed"] {
            assert!(Selector::parse(bad).is_err(), "expected rejection: {bad:?}");
        }
    }

    #[test]
    fn test_rejects_sibling_combinator_token() {
        // `+`/`~` are not identifiers, so the step parse fails.
        assert!(Selector::parse("p ~ span").is_err());
    }
}
