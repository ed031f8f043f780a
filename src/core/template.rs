//! Minimal `{{field}}` filler for DOCX templates.
//!
//! Only text content is touched; markup, including attribute values such as
//! a picture's alt-text marker, is copied through. A tag whose name still
//! spans run boundaries keeps those boundaries after the substituted value,
//! so the part stays well-formed.

use crate::domain::model::DocumentContainer;
use crate::domain::ports::TemplateEngine;
use crate::utils::error::{DocError, Result, TemplateIssue};
use serde_json::Value;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, Default)]
pub struct PlaceholderTemplateEngine;

impl PlaceholderTemplateEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateEngine for PlaceholderTemplateEngine {
    fn render(&self, mut template: DocumentContainer, data: &Value) -> Result<DocumentContainer> {
        let mut issues = Vec::new();
        let mut rendered = Vec::new();

        for part in template.markup_parts() {
            let (text, mut part_issues) = render_part(&part.name, &part.text, data);
            issues.append(&mut part_issues);
            rendered.push((part.name, text));
        }

        if !issues.is_empty() {
            return Err(DocError::TemplateRenderError {
                message: format!("{} malformed template tag(s)", issues.len()),
                details: issues,
            });
        }

        for (name, text) in rendered {
            template.replace(&name, text.into_bytes());
        }
        Ok(template)
    }
}

fn render_part(part: &str, xml: &str, data: &Value) -> (String, Vec<TemplateIssue>) {
    let mut out = String::with_capacity(xml.len());
    let mut issues = Vec::new();
    let mut i = 0;

    while i < xml.len() {
        let rest = &xml[i..];
        if rest.starts_with('<') {
            let end = tag_end(xml, i);
            out.push_str(&xml[i..end]);
            i = end;
        } else if rest.starts_with(OPEN) {
            match read_tag(xml, i + OPEN.len()) {
                Some(tag) => {
                    out.push_str(&escape_xml(&lookup(data, tag.name.trim())));
                    out.push_str(&tag.markup);
                    i = tag.end;
                }
                None => {
                    issues.push(issue(part, i, "unclosed tag"));
                    out.push_str(OPEN);
                    i += OPEN.len();
                }
            }
        } else if rest.starts_with(CLOSE) {
            issues.push(issue(part, i, "unopened tag"));
            out.push_str(CLOSE);
            i += CLOSE.len();
        } else {
            let next = rest
                .find(['<', '{', '}'])
                .map(|n| if n == 0 { 1 } else { n })
                .unwrap_or(rest.len());
            out.push_str(&rest[..next]);
            i += next;
        }
    }

    (out, issues)
}

struct Tag {
    name: String,
    markup: String,
    end: usize,
}

/// Reads a tag body starting just after `{{`. `None` when the paragraph ends or
/// another `{{` starts before the closing `}}`.
fn read_tag(xml: &str, start: usize) -> Option<Tag> {
    let mut name = String::new();
    let mut markup = String::new();
    let mut i = start;

    while i < xml.len() {
        let rest = &xml[i..];
        if rest.starts_with(CLOSE) {
            return Some(Tag {
                name,
                markup,
                end: i + CLOSE.len(),
            });
        }
        if rest.starts_with(OPEN) || rest.starts_with("</w:p>") {
            return None;
        }
        if rest.starts_with('<') {
            let end = tag_end(xml, i);
            markup.push_str(&xml[i..end]);
            i = end;
            continue;
        }
        let next = rest
            .find(['<', '{', '}'])
            .map(|n| if n == 0 { 1 } else { n })
            .unwrap_or(rest.len());
        name.push_str(&rest[..next]);
        i += next;
    }
    None
}

fn tag_end(xml: &str, start: usize) -> usize {
    xml[start..]
        .find('>')
        .map(|n| start + n + 1)
        .unwrap_or(xml.len())
}

fn issue(part: &str, offset: usize, kind: &str) -> TemplateIssue {
    TemplateIssue {
        part: part.to_string(),
        offset,
        kind: kind.to_string(),
    }
}

/// Dotted path lookup; missing values and null render as empty text.
fn lookup(data: &Value, path: &str) -> String {
    let mut current = data;
    for key in path.split('.') {
        current = match current {
            Value::Object(map) => match map.get(key) {
                Some(v) => v,
                None => return String::new(),
            },
            Value::Array(items) => match key.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(v) => v,
                None => return String::new(),
            },
            _ => return String::new(),
        };
    }
    match current {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
