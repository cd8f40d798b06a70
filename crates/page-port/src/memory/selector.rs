//! Locator evaluation for [`MemoryPage`](super::MemoryPage).
//!
//! Covers the shapes that recorded mappings actually contain:
//! - CSS compounds `tag#id.class[attr]`, `[attr=v]`, `[attr*=v]`, `[attr^=v]`
//!   joined by commas
//! - XPath `//tag` or `//*` with predicates `[@attr]`, `[@attr='v']`,
//!   `[text()='v']`, `[.='v']` and `[contains(@attr|text()|., 'v')]`
//!
//! Combinators and positional predicates are reported as invalid selectors.

use formfill_core_types::{SelectorEntry, SelectorKind};

use super::MemoryNode;
use crate::errors::PageError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Compiled {
    Css(Vec<Compound>),
    Xpath(XpathQuery),
}

impl Compiled {
    pub(crate) fn parse(entry: &SelectorEntry) -> Result<Self, PageError> {
        let source = entry.value.trim();
        if source.is_empty() {
            return Err(PageError::invalid_selector(&entry.value, "empty selector"));
        }
        match entry.kind {
            SelectorKind::Css => parse_css(source).map(Compiled::Css),
            SelectorKind::Xpath => parse_xpath(source).map(Compiled::Xpath),
        }
    }

    pub(crate) fn matches(&self, node: &MemoryNode) -> bool {
        match self {
            Compiled::Css(groups) => groups.iter().any(|compound| compound.matches(node)),
            Compiled::Xpath(query) => query.matches(node),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Compound {
    fn matches(&self, node: &MemoryNode) -> bool {
        if let Some(tag) = &self.tag {
            if !tag.eq_ignore_ascii_case(&node.tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.get_attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        let classes: Vec<&str> = node
            .get_attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default();
        if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
            return false;
        }
        self.attrs.iter().all(|test| test.matches(node))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct AttrTest {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, PartialEq)]
enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
}

impl AttrTest {
    fn matches(&self, node: &MemoryNode) -> bool {
        let Some(actual) = node.get_attr(&self.name) else {
            return false;
        };
        match &self.op {
            AttrOp::Exists => true,
            AttrOp::Equals(expected) => actual == expected,
            AttrOp::Contains(needle) => actual.contains(needle.as_str()),
            AttrOp::Prefix(prefix) => actual.starts_with(prefix.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct XpathQuery {
    tag: Option<String>,
    predicates: Vec<XPredicate>,
}

#[derive(Debug, Clone, PartialEq)]
enum XPredicate {
    Attr(AttrTest),
    TextEquals(String),
    TextContains(String),
}

impl XpathQuery {
    fn matches(&self, node: &MemoryNode) -> bool {
        if let Some(tag) = &self.tag {
            if !tag.eq_ignore_ascii_case(&node.tag) {
                return false;
            }
        }
        self.predicates.iter().all(|predicate| match predicate {
            XPredicate::Attr(test) => test.matches(node),
            XPredicate::TextEquals(expected) => node.text.trim() == expected,
            XPredicate::TextContains(needle) => node.text.contains(needle.as_str()),
        })
    }
}

fn parse_css(source: &str) -> Result<Vec<Compound>, PageError> {
    split_top_level(source, ',')
        .into_iter()
        .map(|group| parse_compound(source, group.trim()))
        .collect()
}

fn parse_compound(source: &str, group: &str) -> Result<Compound, PageError> {
    let invalid = |reason: &str| PageError::invalid_selector(source, reason);
    if group.is_empty() {
        return Err(invalid("empty selector group"));
    }
    let chars: Vec<char> = group.chars().collect();
    let mut pos = 0;
    let mut compound = Compound {
        tag: None,
        id: None,
        classes: Vec::new(),
        attrs: Vec::new(),
    };

    if chars[0] == '*' {
        pos = 1;
    } else {
        let tag = read_ident(&chars, &mut pos);
        if !tag.is_empty() {
            compound.tag = Some(tag.to_ascii_lowercase());
        }
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                pos += 1;
                let id = read_ident(&chars, &mut pos);
                if id.is_empty() {
                    return Err(invalid("expected id after '#'"));
                }
                compound.id = Some(id);
            }
            '.' => {
                pos += 1;
                let class = read_ident(&chars, &mut pos);
                if class.is_empty() {
                    return Err(invalid("expected class after '.'"));
                }
                compound.classes.push(class);
            }
            '[' => {
                pos += 1;
                compound.attrs.push(parse_css_attr(&chars, &mut pos).map_err(|r| invalid(&r))?);
            }
            c if c.is_whitespace() || c == '>' || c == '+' || c == '~' => {
                return Err(invalid("combinators are not supported"));
            }
            ':' => return Err(invalid("pseudo-classes are not supported")),
            other => return Err(invalid(&format!("unexpected character '{}'", other))),
        }
    }
    Ok(compound)
}

fn parse_css_attr(chars: &[char], pos: &mut usize) -> Result<AttrTest, String> {
    skip_ws(chars, pos);
    let name = read_ident(chars, pos);
    if name.is_empty() {
        return Err("expected attribute name".into());
    }
    skip_ws(chars, pos);
    let op = match chars.get(*pos) {
        Some(']') => {
            *pos += 1;
            return Ok(AttrTest {
                name,
                op: AttrOp::Exists,
            });
        }
        Some('=') => {
            *pos += 1;
            "="
        }
        Some(c @ ('*' | '^')) if chars.get(*pos + 1) == Some(&'=') => {
            *pos += 2;
            if *c == '*' {
                "*="
            } else {
                "^="
            }
        }
        _ => return Err("unsupported attribute operator".into()),
    };
    skip_ws(chars, pos);
    let value = match chars.get(*pos) {
        Some(quote @ ('"' | '\'')) => {
            let quote = *quote;
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != quote {
                *pos += 1;
            }
            if *pos >= chars.len() {
                return Err("unterminated attribute value".into());
            }
            let value: String = chars[start..*pos].iter().collect();
            *pos += 1;
            value
        }
        _ => read_ident(chars, pos),
    };
    skip_ws(chars, pos);
    if chars.get(*pos) != Some(&']') {
        return Err("expected ']'".into());
    }
    *pos += 1;
    let op = match op {
        "=" => AttrOp::Equals(value),
        "*=" => AttrOp::Contains(value),
        _ => AttrOp::Prefix(value),
    };
    Ok(AttrTest { name, op })
}

fn parse_xpath(source: &str) -> Result<XpathQuery, PageError> {
    let invalid = |reason: &str| PageError::invalid_selector(source, reason);
    let rest = source
        .strip_prefix("//")
        .ok_or_else(|| invalid("expected '//' axis"))?;
    let chars: Vec<char> = rest.chars().collect();
    let mut pos = 0;
    let tag = if chars.first() == Some(&'*') {
        pos = 1;
        None
    } else {
        let tag = read_ident(&chars, &mut pos);
        if tag.is_empty() {
            return Err(invalid("expected node test"));
        }
        Some(tag.to_ascii_lowercase())
    };

    let mut predicates = Vec::new();
    while pos < chars.len() {
        if chars[pos] != '[' {
            return Err(invalid("only a single step with predicates is supported"));
        }
        pos += 1;
        let start = pos;
        let mut quote: Option<char> = None;
        while pos < chars.len() {
            match (quote, chars[pos]) {
                (None, q @ ('"' | '\'')) => quote = Some(q),
                (Some(q), c) if c == q => quote = None,
                (None, ']') => break,
                _ => {}
            }
            pos += 1;
        }
        if pos >= chars.len() {
            return Err(invalid("unterminated predicate"));
        }
        let body: String = chars[start..pos].iter().collect();
        pos += 1;
        predicates.push(parse_predicate(body.trim()).map_err(|r| invalid(&r))?);
    }
    Ok(XpathQuery { tag, predicates })
}

fn parse_predicate(body: &str) -> Result<XPredicate, String> {
    if let Some(args) = body
        .strip_prefix("contains(")
        .and_then(|inner| inner.strip_suffix(')'))
    {
        let (target, literal) = args
            .split_once(',')
            .ok_or_else(|| "contains() takes two arguments".to_string())?;
        let needle = unquote(literal.trim())?;
        return match target.trim() {
            "text()" | "." => Ok(XPredicate::TextContains(needle)),
            attr if attr.starts_with('@') => Ok(XPredicate::Attr(AttrTest {
                name: attr[1..].to_string(),
                op: AttrOp::Contains(needle),
            })),
            other => Err(format!("unsupported contains() target '{}'", other)),
        };
    }
    if let Some((lhs, rhs)) = body.split_once('=') {
        let value = unquote(rhs.trim())?;
        return match lhs.trim() {
            "text()" | "." => Ok(XPredicate::TextEquals(value)),
            attr if attr.starts_with('@') && attr.len() > 1 => Ok(XPredicate::Attr(AttrTest {
                name: attr[1..].to_string(),
                op: AttrOp::Equals(value),
            })),
            other => Err(format!("unsupported predicate '{}'", other)),
        };
    }
    match body.strip_prefix('@') {
        Some(name) if !name.is_empty() => Ok(XPredicate::Attr(AttrTest {
            name: name.to_string(),
            op: AttrOp::Exists,
        })),
        _ => Err(format!("unsupported predicate '{}'", body)),
    }
}

fn unquote(literal: &str) -> Result<String, String> {
    let mut chars = literal.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open @ ('"' | '\'')), Some(close)) if open == close && literal.len() >= 2 => {
            Ok(chars.collect())
        }
        _ => Err(format!("expected quoted literal, got '{}'", literal)),
    }
}

fn read_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && (chars[*pos].is_alphanumeric() || matches!(chars[*pos], '-' | '_'))
    {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn skip_ws(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && chars[*pos].is_whitespace() {
        *pos += 1;
    }
}

/// Split on `sep` outside brackets and quotes.
fn split_top_level(source: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, c) in source.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                parts.push(&source[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&source[start..]);
    parts
}
