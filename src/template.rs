//! Mustache-style templates rendered against feature attributes.
//!
//! Tag templates and the notification template are parsed once at startup
//! and rendered for every feature. Supported tags:
//!
//! | Tag | Meaning |
//! |-----|---------|
//! | `{{key}}`, `{{{key}}}`, `{{& key}}` | attribute value, never HTML-escaped |
//! | `{{#key}}...{{/key}}` | body rendered when `key` is truthy, once per item for lists |
//! | `{{^key}}...{{/key}}` | body rendered when `key` is falsy or missing |
//! | `{{! ...}}` | comment |
//! | `{{.}}` | the current section value |
//!
//! Null, `false`, `0`, `""` and `[]` are falsy. Missing or null variables
//! render as empty text. Partials and delimiter changes are rejected.

use serde_json::{Map, Value};

use crate::error::{ImportError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Var(String),
    Section {
        name: String,
        inverted: bool,
        body: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

/// A section that has been opened but not yet closed.
struct OpenSection {
    name: String,
    inverted: bool,
    outer: Vec<Node>,
}

impl Template {
    /// Parse a template. An unclosed `{{` is kept as literal text.
    ///
    /// # Errors
    ///
    /// [`ImportError::Configuration`] for unbalanced sections, partials and
    /// delimiter changes.
    pub fn parse(source: &str) -> Result<Self> {
        let fail = |message: String| {
            ImportError::Configuration(format!("invalid template {:?}: {}", source, message))
        };

        let mut nodes: Vec<Node> = Vec::new();
        let mut open: Vec<OpenSection> = Vec::new();
        let mut text = String::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            text.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            let triple = after_open.starts_with('{');
            let body_start = usize::from(triple);
            let close = if triple { "}}}" } else { "}}" };

            let Some(end) = after_open[body_start..].find(close) else {
                text.push_str(&rest[start..]);
                rest = "";
                break;
            };
            let tag = after_open[body_start..body_start + end].trim();
            rest = &after_open[body_start + end + close.len()..];

            if !text.is_empty() {
                nodes.push(Node::Text(std::mem::take(&mut text)));
            }
            if triple {
                nodes.push(Node::Var(tag.to_string()));
                continue;
            }

            let (sigil, name) = match tag.chars().next() {
                Some(c @ ('!' | '#' | '^' | '/' | '&' | '>' | '=')) => {
                    (Some(c), tag[c.len_utf8()..].trim())
                }
                _ => (None, tag),
            };
            match sigil {
                Some('!') => {}
                Some('#') | Some('^') => open.push(OpenSection {
                    name: name.to_string(),
                    inverted: sigil == Some('^'),
                    outer: std::mem::take(&mut nodes),
                }),
                Some('/') => {
                    let section = open
                        .pop()
                        .ok_or_else(|| fail(format!("{{{{/{}}}}} closes nothing", name)))?;
                    if section.name != name {
                        return Err(fail(format!(
                            "{{{{/{}}}}} closes section {:?}",
                            name, section.name
                        )));
                    }
                    let body = std::mem::replace(&mut nodes, section.outer);
                    nodes.push(Node::Section {
                        name: section.name,
                        inverted: section.inverted,
                        body,
                    });
                }
                Some('>') => return Err(fail("partials are not supported".to_string())),
                Some('=') => return Err(fail("delimiter changes are not supported".to_string())),
                _ => nodes.push(Node::Var(name.to_string())),
            }
        }
        text.push_str(rest);
        if !text.is_empty() {
            nodes.push(Node::Text(text));
        }
        if let Some(section) = open.pop() {
            return Err(fail(format!("section {:?} is never closed", section.name)));
        }

        Ok(Self { nodes })
    }

    pub fn render(&self, attributes: &Map<String, Value>) -> String {
        let mut out = String::new();
        let mut stack = vec![Context::Root(attributes)];
        render_nodes(&self.nodes, &mut stack, &mut out);
        out
    }
}

#[derive(Clone, Copy)]
enum Context<'a> {
    Root(&'a Map<String, Value>),
    Value(&'a Value),
}

fn lookup<'a>(stack: &[Context<'a>], name: &str) -> Option<&'a Value> {
    if name == "." {
        return match stack.last()? {
            Context::Value(v) => Some(*v),
            Context::Root(_) => None,
        };
    }
    stack.iter().rev().find_map(|ctx| match *ctx {
        Context::Root(map) => map.get(name),
        Context::Value(Value::Object(map)) => map.get(name),
        Context::Value(_) => None,
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn render_nodes<'a>(nodes: &[Node], stack: &mut Vec<Context<'a>>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Var(name) => {
                if let Some(value) = lookup(stack, name) {
                    push_value(out, value);
                }
            }
            Node::Section {
                name,
                inverted,
                body,
            } => {
                let value = lookup(stack, name).filter(|v| is_truthy(v));
                match (value, *inverted) {
                    (None, true) => render_nodes(body, stack, out),
                    (Some(Value::Array(items)), false) => {
                        for item in items {
                            stack.push(Context::Value(item));
                            render_nodes(body, stack, out);
                            stack.pop();
                        }
                    }
                    (Some(value), false) => {
                        stack.push(Context::Value(value));
                        render_nodes(body, stack, out);
                        stack.pop();
                    }
                    _ => {}
                }
            }
        }
    }
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        other => out.push_str(&other.to_string()),
    }
}
