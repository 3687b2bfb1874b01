// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Convert XML documents into generic nested maps.
//!
//! A document is first parsed into an [`Element`] tree with namespaces
//! resolved to `{uri}local` tags, then [`normalize`] turns every element
//! into an [`XmlNode`]:
//!
//! - attributes become `@name` fields,
//! - the text before the first child becomes `$content` (null when blank),
//! - the namespace becomes `$namespace` (null when absent),
//! - children are merged by local tag, a tag seen twice turns into a list.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use sigproxy_core::{Error, Result};

static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\{(.*?)\})?(.*)$").expect("tag pattern must be valid"));

/// A parsed XML element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    /// `{namespace}local` or `local`.
    pub tag: String,
    /// Attributes in document order, namespaced ones as `{namespace}local`.
    pub attributes: Vec<(String, String)>,
    /// Text before the first child element.
    pub text: Option<String>,
    pub children: Vec<Element>,
}

/// A normalized element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub namespace: Option<String>,
    /// Keyed by `@` + attribute name.
    pub attributes: IndexMap<String, String>,
    pub content: Option<String>,
    pub children: IndexMap<String, FieldValue>,
}

/// The value of a child tag: one element, or every element sharing the tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Single(XmlNode),
    Many(Vec<XmlNode>),
}

impl FieldValue {
    fn push(self, node: XmlNode) -> Self {
        match self {
            FieldValue::Single(first) => FieldValue::Many(vec![first, node]),
            FieldValue::Many(mut nodes) => {
                nodes.push(node);
                FieldValue::Many(nodes)
            }
        }
    }
}

impl Serialize for XmlNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer
            .serialize_map(Some(2 + self.attributes.len() + self.children.len()))?;
        for (k, v) in &self.attributes {
            map.serialize_entry(k, v)?;
        }
        map.serialize_entry("$content", &self.content)?;
        map.serialize_entry("$namespace", &self.namespace)?;
        for (k, v) in &self.children {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Single(node) => node.serialize(serializer),
            FieldValue::Many(nodes) => nodes.serialize(serializer),
        }
    }
}

/// Split a raw tag into its namespace and local name.
pub fn split_tag(tag: &str) -> (Option<&str>, &str) {
    match TAG_PATTERN.captures(tag) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str()),
            caps.get(2).map(|m| m.as_str()).unwrap_or_default(),
        ),
        None => (None, tag),
    }
}

/// Normalize `element` into its local tag and fields.
pub fn normalize(element: &Element) -> (String, XmlNode) {
    let (namespace, tag) = split_tag(&element.tag);

    let mut node = XmlNode {
        namespace: namespace.map(str::to_string),
        attributes: element
            .attributes
            .iter()
            .map(|(k, v)| (format!("@{k}"), v.clone()))
            .collect(),
        content: element
            .text
            .as_ref()
            .filter(|text| !text.trim().is_empty())
            .cloned(),
        children: IndexMap::new(),
    };

    for child in &element.children {
        let (child_tag, child_node) = normalize(child);
        match node.children.get_mut(&child_tag) {
            Some(existing) => {
                let previous = std::mem::replace(existing, FieldValue::Many(Vec::new()));
                *existing = previous.push(child_node);
            }
            None => {
                node.children
                    .insert(child_tag, FieldValue::Single(child_node));
            }
        }
    }

    (tag.to_string(), node)
}

/// Parse an XML document into its root element.
pub fn parse(input: &str) -> Result<Element> {
    let mut reader = NsReader::from_str(input);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let (resolved, event) = reader
            .read_resolved_event()
            .map_err(|e| Error::malformed_response_body("xml is malformed").with_source(e))?;
        let namespace = namespace_of(resolved)?;

        match event {
            Event::Start(start) => {
                ensure_no_root(&root)?;
                stack.push(open_element(&reader, namespace, &start)?);
            }
            Event::Empty(start) => {
                ensure_no_root(&root)?;
                let element = open_element(&reader, namespace, &start)?;
                close_element(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    Error::malformed_response_body("xml has an end tag without start tag")
                })?;
                close_element(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| {
                    Error::malformed_response_body("xml text is malformed").with_source(e)
                })?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(data) => {
                let text = std::str::from_utf8(&data).map_err(|e| {
                    Error::malformed_response_body("xml cdata is not valid utf-8").with_source(e)
                })?;
                push_text(&mut stack, text)?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes
            // carry nothing we keep.
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::malformed_response_body(format!(
            "xml element `{}` is not closed",
            open.tag
        )));
    }
    root.ok_or_else(|| Error::malformed_response_body("xml has no root element"))
}

fn namespace_of(resolved: ResolveResult) -> Result<Option<String>> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(utf8(ns.as_ref())?.to_string())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(Error::malformed_response_body(format!(
            "xml namespace prefix `{}` is not declared",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| {
        Error::malformed_response_body("xml name is not valid utf-8").with_source(e)
    })
}

fn qualify(namespace: Option<String>, local: &str) -> String {
    match namespace {
        Some(ns) => format!("{{{ns}}}{local}"),
        None => local.to_string(),
    }
}

fn ensure_no_root(root: &Option<Element>) -> Result<()> {
    match root {
        Some(root) => Err(Error::malformed_response_body(format!(
            "xml has content after root element `{}`",
            root.tag
        ))),
        None => Ok(()),
    }
}

fn open_element(
    reader: &NsReader<&[u8]>,
    namespace: Option<String>,
    start: &BytesStart,
) -> Result<Element> {
    let local = start.local_name();
    let mut element = Element {
        tag: qualify(namespace, utf8(local.as_ref())?),
        ..Default::default()
    };

    for attr in start.attributes() {
        let attr = attr.map_err(|e| {
            Error::malformed_response_body("xml attribute is malformed").with_source(e)
        })?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let name = qualify(namespace_of(resolved)?, utf8(local.as_ref())?);
        let value = attr.decode_and_unescape_value(reader.decoder()).map_err(|e| {
            Error::malformed_response_body(format!("xml attribute `{name}` is malformed"))
                .with_source(e)
        })?;
        element.attributes.push((name, value.into_owned()));
    }

    Ok(element)
}

fn close_element(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn push_text(stack: &mut [Element], text: &str) -> Result<()> {
    let Some(current) = stack.last_mut() else {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(Error::malformed_response_body(
            "xml has text outside of the root element",
        ));
    };
    // Text after a child is that child's tail, which is not kept.
    if current.children.is_empty() {
        current.text.get_or_insert_with(String::new).push_str(text);
    }
    Ok(())
}
