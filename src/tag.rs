// Smart-contract scripting engine for Open-Transactions
//
// SPDX-License-Identifier: Apache-2.0
//
// Written in 2010-2025 by the Open-Transactions Developers.
//
// Copyright (C) 2010-2025 Open-Transactions Developers.
// All rights under the above copyrights are reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except
// in compliance with the License. You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express
// or implied. See the License for the specific language governing permissions and limitations under
// the License.

//! Hierarchical tagged text used both for contract persistence and for
//! content-addressing.
//!
//! Writing goes through the [`Tag`] builder, whose [`Display`] output is
//! canonical: the same tree always renders to the same bytes. Reading is done
//! with the pull-style [`TagReader`], from which [`Tag::from_str`] rebuilds the
//! tree. Callers then consume children with fixed-count reads driven by the
//! count attributes written next to them.

use core::fmt::{self, Display, Formatter, Write};
use core::str::FromStr;

use crate::armor::ArmorError;

#[derive(Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum ParseError {
    /// malformed contract text at byte {pos}: {details}.
    Syntax { pos: usize, details: String },

    /// contract text ends before all open tags are closed.
    UnexpectedEof,

    /// contract text contains no root tag.
    NoRoot,

    /// contract text contains more than one root tag.
    MultipleRoots,

    /// expected tag `{expected}`, found `{found}`.
    UnexpectedTag { expected: String, found: String },

    /// tag `{tag}` lacks required attribute `{attr}`.
    MissingAttribute { tag: String, attr: String },

    /// tag `{tag}` has invalid value `{value}` for attribute `{attr}`.
    InvalidAttribute { tag: String, attr: String, value: String },

    /// tag `{tag}` declares {expected} `{child}` children, but {found} are present.
    CountMismatch { tag: String, child: String, expected: usize, found: usize },

    /// tag `{0}` has no text content.
    MissingText(String),

    /// invalid contract content: {0}.
    InvalidContent(String),

    #[from]
    #[display(inner)]
    Armor(ArmorError),
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Tag {
    name: String,
    attrs: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<Tag>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self { Tag { name: name.into(), ..none!() } }

    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut tag = Tag::new(name);
        tag.set_text(text);
        tag
    }

    pub fn add_attribute(&mut self, name: impl Into<String>, value: impl ToString) {
        self.attrs.push((name.into(), value.to_string()));
    }

    pub fn add_tag(&mut self, child: Tag) { self.children.push(child); }

    pub fn set_text(&mut self, text: impl Into<String>) { self.text = Some(text.into()); }

    pub fn name(&self) -> &str { &self.name }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> Option<&str> { self.text.as_deref() }

    pub fn children(&self) -> &[Tag] { &self.children }

    pub fn expect_name(&self, name: &str) -> Result<(), ParseError> {
        if self.name != name {
            return Err(ParseError::UnexpectedTag { expected: name.to_owned(), found: self.name.clone() });
        }
        Ok(())
    }

    pub fn required_attr(&self, name: &str) -> Result<&str, ParseError> {
        self.attr(name).ok_or_else(|| ParseError::MissingAttribute {
            tag: self.name.clone(),
            attr: name.to_owned(),
        })
    }

    /// Attribute which may be absent; absence reads as an empty string.
    pub fn optional_attr(&self, name: &str) -> &str { self.attr(name).unwrap_or_default() }

    pub fn parse_attr<T: FromStr>(&self, name: &str) -> Result<T, ParseError> {
        let value = self.required_attr(name)?;
        value.parse().map_err(|_| self.invalid_attr(name, value))
    }

    pub fn bool_attr(&self, name: &str) -> Result<bool, ParseError> {
        match self.required_attr(name)? {
            "true" => Ok(true),
            "false" => Ok(false),
            value => Err(self.invalid_attr(name, value)),
        }
    }

    pub fn required_text(&self) -> Result<&str, ParseError> {
        self.text().ok_or_else(|| ParseError::MissingText(self.name.clone()))
    }

    /// Reads exactly `count` children named `child`, failing if the tag carries
    /// a different number of them.
    pub fn children_named(&self, child: &str, count: usize) -> Result<Vec<&Tag>, ParseError> {
        let found = self
            .children
            .iter()
            .filter(|tag| tag.name == child)
            .collect::<Vec<_>>();
        if found.len() != count {
            return Err(ParseError::CountMismatch {
                tag: self.name.clone(),
                child: child.to_owned(),
                expected: count,
                found: found.len(),
            });
        }
        Ok(found)
    }

    /// First child with the given name, if any.
    pub fn child(&self, child: &str) -> Option<&Tag> {
        self.children.iter().find(|tag| tag.name == child)
    }

    fn invalid_attr(&self, name: &str, value: &str) -> ParseError {
        ParseError::InvalidAttribute {
            tag: self.name.clone(),
            attr: name.to_owned(),
            value: value.to_owned(),
        }
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (key, value) in &self.attrs {
            write!(f, " {key}=\"")?;
            write_escaped(f, value)?;
            f.write_char('"')?;
        }
        if self.text.is_none() && self.children.is_empty() {
            return f.write_str("/>");
        }
        f.write_str(">\n")?;
        if let Some(text) = &self.text {
            write_escaped(f, text)?;
            f.write_char('\n')?;
        }
        for child in &self.children {
            writeln!(f, "{child}")?;
        }
        write!(f, "</{}>", self.name)
    }
}

impl FromStr for Tag {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn close(stack: &mut Vec<Tag>, root: &mut Option<Tag>, tag: Tag) {
            match stack.last_mut() {
                Some(parent) => parent.children.push(tag),
                None => *root = Some(tag),
            }
        }

        let mut reader = TagReader::new(s);
        let mut stack: Vec<Tag> = vec![];
        let mut root = None;
        while let Some(event) = reader.next_event()? {
            match event {
                TagEvent::Start { name, attrs, empty } => {
                    if root.is_some() {
                        return Err(ParseError::MultipleRoots);
                    }
                    let tag = Tag { name, attrs, ..none!() };
                    if empty {
                        close(&mut stack, &mut root, tag);
                    } else {
                        stack.push(tag);
                    }
                }
                TagEvent::Text(text) => {
                    let Some(tag) = stack.last_mut() else {
                        return Err(reader.syntax("text outside of the root tag"));
                    };
                    match &mut tag.text {
                        Some(existing) => {
                            existing.push('\n');
                            existing.push_str(&text);
                        }
                        None => tag.text = Some(text),
                    }
                }
                TagEvent::End(name) => {
                    let tag = stack.pop().ok_or_else(|| reader.syntax("unbalanced closing tag"))?;
                    if tag.name != name {
                        return Err(ParseError::UnexpectedTag { expected: tag.name, found: name });
                    }
                    close(&mut stack, &mut root, tag);
                }
            }
        }
        if !stack.is_empty() {
            return Err(ParseError::UnexpectedEof);
        }
        root.ok_or(ParseError::NoRoot)
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum TagEvent {
    Start { name: String, attrs: Vec<(String, String)>, empty: bool },
    Text(String),
    End(String),
}

/// Pull reader over contract text.
#[derive(Clone, Debug)]
pub struct TagReader<'src> {
    src: &'src str,
    pos: usize,
}

impl<'src> TagReader<'src> {
    pub fn new(src: &'src str) -> Self { TagReader { src, pos: 0 } }

    pub fn position(&self) -> usize { self.pos }

    pub fn next_event(&mut self) -> Result<Option<TagEvent>, ParseError> {
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Ok(None);
            }
            if let Some(decl) = rest.strip_prefix("<?") {
                let end = decl
                    .find("?>")
                    .ok_or_else(|| self.syntax("unterminated declaration"))?;
                self.pos += 2 + end + 2;
                continue;
            }
            if let Some(comment) = rest.strip_prefix("<!--") {
                let end = comment
                    .find("-->")
                    .ok_or_else(|| self.syntax("unterminated comment"))?;
                self.pos += 4 + end + 3;
                continue;
            }
            if rest.starts_with("</") {
                self.pos += 2;
                let name = self.read_name()?;
                self.skip_whitespace();
                if !self.rest().starts_with('>') {
                    return Err(self.syntax("closing tag is not terminated"));
                }
                self.pos += 1;
                return Ok(Some(TagEvent::End(name)));
            }
            if rest.starts_with('<') {
                return self.read_start().map(Some);
            }

            let end = rest.find('<').unwrap_or(rest.len());
            let raw = rest[..end].trim();
            let start = self.pos;
            self.pos += end;
            if raw.is_empty() {
                continue;
            }
            let text = unescape(raw).map_err(|details| ParseError::Syntax { pos: start, details })?;
            return Ok(Some(TagEvent::Text(text)));
        }
    }

    fn read_start(&mut self) -> Result<TagEvent, ParseError> {
        self.pos += 1;
        let name = self.read_name()?;
        let mut attrs = vec![];
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok(TagEvent::Start { name, attrs, empty: true });
            }
            if rest.starts_with('>') {
                self.pos += 1;
                return Ok(TagEvent::Start { name, attrs, empty: false });
            }
            if rest.is_empty() {
                return Err(self.syntax(format!("tag `{name}` is not terminated")));
            }

            let key = self.read_name()?;
            self.skip_whitespace();
            if !self.rest().starts_with('=') {
                return Err(self.syntax(format!("attribute `{key}` has no value")));
            }
            self.pos += 1;
            self.skip_whitespace();
            let quote = match self.rest().chars().next() {
                Some(quote @ ('"' | '\'')) => quote,
                _ => return Err(self.syntax(format!("value of attribute `{key}` is not quoted"))),
            };
            self.pos += 1;
            let len = self
                .rest()
                .find(quote)
                .ok_or_else(|| self.syntax(format!("value of attribute `{key}` is not terminated")))?;
            let start = self.pos;
            let value = unescape(&self.rest()[..len])
                .map_err(|details| ParseError::Syntax { pos: start, details })?;
            self.pos += len + 1;
            attrs.push((key, value));
        }
    }

    fn read_name(&mut self) -> Result<String, ParseError> {
        let rest = self.rest();
        let len = rest
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | ':' | '.')))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.syntax("name expected"));
        }
        self.pos += len;
        Ok(rest[..len].to_owned())
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn rest(&self) -> &'src str { &self.src[self.pos..] }

    fn syntax(&self, details: impl ToString) -> ParseError {
        ParseError::Syntax { pos: self.pos, details: details.to_string() }
    }
}

fn write_escaped(f: &mut Formatter<'_>, s: &str) -> fmt::Result {
    for ch in s.chars() {
        match ch {
            '&' => f.write_str("&amp;")?,
            '<' => f.write_str("&lt;")?,
            '>' => f.write_str("&gt;")?,
            '"' => f.write_str("&quot;")?,
            '\'' => f.write_str("&apos;")?,
            ch => f.write_char(ch)?,
        }
    }
    Ok(())
}

fn unescape(s: &str) -> Result<String, String> {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let end = rest
            .find(';')
            .ok_or_else(|| format!("unterminated entity in `{s}`"))?;
        match &rest[..=end] {
            "&amp;" => out.push('&'),
            "&lt;" => out.push('<'),
            "&gt;" => out.push('>'),
            "&quot;" => out.push('"'),
            "&apos;" => out.push('\''),
            entity => return Err(format!("unknown entity `{entity}`")),
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> Tag {
        let mut root = Tag::new("bylaw");
        root.add_attribute("name", "main");
        root.add_attribute("note", "a<b & \"c\"");
        root.add_attribute("numClauses", 2);
        root.add_tag(Tag::with_text("clause", "Y29kZQ=="));
        let mut hook = Tag::new("hook");
        hook.add_attribute("name", "hook_a");
        root.add_tag(hook);
        root.add_tag(Tag::with_text("clause", "bW9yZQ=="));
        root
    }

    #[test]
    fn canonical_text() {
        assert_eq!(
            sample().to_string(),
            "<bylaw name=\"main\" note=\"a&lt;b &amp; &quot;c&quot;\" numClauses=\"2\">\n<clause>\nY29kZQ==\n</clause>\n<hook name=\"hook_a\"/>\n<clause>\nbW9yZQ==\n</clause>\n</bylaw>"
        );
    }

    #[test]
    fn reparses_into_same_tree() {
        let tag = sample();
        let parsed = Tag::from_str(&tag.to_string()).unwrap();
        assert_eq!(parsed, tag);
        assert_eq!(parsed.attr("note"), Some("a<b & \"c\""));
        assert_eq!(parsed.parse_attr::<usize>("numClauses").unwrap(), 2);
        assert_eq!(parsed.children_named("clause", 2).unwrap().len(), 2);
    }

    #[test]
    fn fixed_count_reads() {
        let tag = sample();
        assert_eq!(
            tag.children_named("clause", 3).unwrap_err(),
            ParseError::CountMismatch {
                tag: s!("bylaw"),
                child: s!("clause"),
                expected: 3,
                found: 2
            }
        );
        assert!(matches!(
            tag.required_attr("language").unwrap_err(),
            ParseError::MissingAttribute { .. }
        ));
        assert!(matches!(tag.bool_attr("name").unwrap_err(), ParseError::InvalidAttribute { .. }));
    }

    #[test]
    fn pull_reader_events() {
        let mut reader = TagReader::new("<?xml version=\"1.0\"?>\n<!-- c --><a x='1'>t<b/></a>");
        assert_eq!(
            reader.next_event().unwrap(),
            Some(TagEvent::Start { name: s!("a"), attrs: vec![(s!("x"), s!("1"))], empty: false })
        );
        assert_eq!(reader.next_event().unwrap(), Some(TagEvent::Text(s!("t"))));
        assert_eq!(
            reader.next_event().unwrap(),
            Some(TagEvent::Start { name: s!("b"), attrs: vec![], empty: true })
        );
        assert_eq!(reader.next_event().unwrap(), Some(TagEvent::End(s!("a"))));
        assert_eq!(reader.next_event().unwrap(), None);
    }

    #[test]
    fn malformed_text() {
        assert_eq!(Tag::from_str("<a><b></a>").unwrap_err(), ParseError::UnexpectedTag {
            expected: s!("b"),
            found: s!("a")
        });
        assert_eq!(Tag::from_str("<a>").unwrap_err(), ParseError::UnexpectedEof);
        assert_eq!(Tag::from_str("  ").unwrap_err(), ParseError::NoRoot);
        assert_eq!(Tag::from_str("<a/><b/>").unwrap_err(), ParseError::MultipleRoots);
        assert!(matches!(Tag::from_str("<a x=1/>").unwrap_err(), ParseError::Syntax { .. }));
        assert!(matches!(Tag::from_str("<a x=\"&bogus;\"/>").unwrap_err(), ParseError::Syntax { .. }));
    }
}
