//! A generic XML decoder.
//!
//! Flex Web Service responses come in several shapes depending on the protocol phase and report
//! configuration, so instead of deserializing them into fixed structures they are decoded into a
//! loosely typed tree which is then inspected by the classification and normalization code.
//!
//! Elements and attributes share the same namespace: `<A b="1"><c>2</c></A>` is decoded as
//! `{A: {b: 1, c: 2}}`. Repeated keys turn into lists and text of an element with attributes or
//! children is stored under the `#text` key.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use quick_xml::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;
use serde::Serialize;

use crate::types::Decimal;

pub const TEXT_KEY: &str = "#text";

// These fields may look like numbers but must be compared and displayed as is
const IDENTIFIER_FIELDS: &[&str] = &[
    "accountId", "acctAlias", "conid", "cusip", "figi", "isin", "issuerCountryCode",
    "listingExchange", "principalAdjustFactor", "queryId", "securityID", "serialNumber", "symbol",
    "underlyingConid", "underlyingListingExchange", "underlyingSecurityID", "underlyingSymbol",
    "ErrorCode", "ReferenceCode",
];

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DecodeError(String);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(Decimal),
    Text(String),
}

impl Scalar {
    fn parse(name: &str, value: String) -> Scalar {
        lazy_static! {
            static ref NUMBER_REGEX: Regex = Regex::new(r"^-?(?:0|[1-9]\d*)(?:\.\d+)?$").unwrap();
        }

        if IDENTIFIER_FIELDS.contains(&name) {
            return Scalar::Text(value);
        }

        match value.as_str() {
            "true" => return Scalar::Bool(true),
            "false" => return Scalar::Bool(false),
            _ => {},
        }

        if NUMBER_REGEX.is_match(&value) {
            if let Ok(number) = Decimal::from_str(&value) {
                return Scalar::Number(number);
            }
        }

        Scalar::Text(value)
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Scalar::Text(text) => Cow::Borrowed(text),
            other => Cow::Owned(other.to_string()),
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Scalar::Number(number) => Some(*number),
            Scalar::Text(text) => Decimal::from_str(text.trim()).ok(),
            Scalar::Bool(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scalar::Bool(value) => value.fmt(f),
            Scalar::Number(value) => value.fmt(f),
            Scalar::Text(value) => value.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    Node(Node),
    List(Vec<Value>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Node {
    fields: BTreeMap<String, Value>,
}

impl Node {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the child node (the first one if the element is repeated).
    pub fn node(&self, key: &str) -> Option<&Node> {
        self.nodes(key).into_iter().next()
    }

    /// Returns all child nodes with the specified name: none, a single one or all repetitions.
    pub fn nodes(&self, key: &str) -> Vec<&Node> {
        match self.fields.get(key) {
            Some(Value::Node(node)) => vec![node],
            Some(Value::List(values)) => values.iter().filter_map(|value| match value {
                Value::Node(node) => Some(node),
                _ => None,
            }).collect(),
            _ => Vec::new(),
        }
    }

    /// Returns scalar value of the specified attribute or text-only element.
    pub fn scalar(&self, key: &str) -> Option<&Scalar> {
        match self.fields.get(key)? {
            Value::Scalar(scalar) => Some(scalar),
            Value::Node(node) => match node.fields.get(TEXT_KEY)? {
                Value::Scalar(scalar) => Some(scalar),
                _ => None,
            },
            Value::List(_) => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.scalar(key).map(Scalar::as_text)
    }

    /// Returns non-empty text value of the specified field.
    pub fn non_empty_text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.text(key).filter(|text| !text.trim().is_empty())
    }

    pub fn decimal(&self, key: &str) -> Option<Decimal> {
        self.scalar(key).and_then(Scalar::as_decimal)
    }

    pub fn insert(&mut self, key: String, value: Value) {
        match self.fields.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            },
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                if let Value::List(values) = existing {
                    values.push(value);
                } else {
                    let first = std::mem::replace(existing, Value::List(Vec::new()));
                    *existing = Value::List(vec![first, value]);
                }
            },
        }
    }
}

struct Element {
    name: String,
    node: Node,
    text: String,
}

impl Element {
    fn new(start: &BytesStart) -> Result<Element, DecodeError> {
        let name = decode_utf8(start.name().as_ref())?.to_owned();
        let mut node = Node::default();

        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| DecodeError(format!(
                "Invalid {name} element attribute: {e}")))?;

            let key = decode_utf8(attribute.key.as_ref())?.to_owned();
            let value = unescape(decode_utf8(&attribute.value)?)?;

            let value = Scalar::parse(&key, value.into_owned());
            node.insert(key, Value::Scalar(value));
        }

        Ok(Element {name, node, text: String::new()})
    }

    fn into_value(self) -> (String, Value) {
        let Element {name, mut node, text} = self;
        let text = text.trim().to_owned();

        let value = if node.is_empty() {
            Value::Scalar(Scalar::parse(&name, text))
        } else {
            if !text.is_empty() {
                node.insert(TEXT_KEY.to_owned(), Value::Scalar(Scalar::parse(&name, text)));
            }
            Value::Node(node)
        };

        (name, value)
    }
}

/// Decodes an XML document into a tree rooted at a node which contains the document's root
/// element.
pub fn decode(data: &str) -> Result<Node, DecodeError> {
    // Text is split at entity references, so it's trimmed only when the element is closed
    let mut reader = Reader::from_str(data);

    let mut document = Node::default();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| DecodeError(format!(
            "Invalid XML document at position {}: {e}", reader.buffer_position())))?;

        match event {
            Event::Start(start) => {
                stack.push(Element::new(&start)?);
            },
            Event::Empty(start) => {
                let (name, value) = Element::new(&start)?.into_value();
                parent(&mut stack, &mut document).insert(name, value);
            },
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| DecodeError(s!(
                    "Invalid XML document: unexpected closing tag")))?;
                let (name, value) = element.into_value();
                parent(&mut stack, &mut document).insert(name, value);
            },
            Event::Text(text) => {
                let text = unescape(decode_utf8(&text)?)?;
                append_text(&mut stack, &text)?;
            },
            Event::CData(data) => {
                let text = decode_utf8(&data)?;
                append_text(&mut stack, text)?;
            },
            Event::GeneralRef(reference) => {
                let reference = format!("&{};", decode_utf8(&reference)?);
                let text = unescape(&reference)?;
                append_text(&mut stack, &text)?;
            },
            Event::Eof => break,
            _ => {},
        }
    }

    if let Some(element) = stack.last() {
        return Err(DecodeError(format!(
            "Invalid XML document: {} element is not closed", element.name)));
    } else if document.is_empty() {
        return Err(DecodeError(s!("Invalid XML document: root element is missing")));
    }

    Ok(document)
}

fn parent<'a>(stack: &'a mut [Element], document: &'a mut Node) -> &'a mut Node {
    match stack.last_mut() {
        Some(element) => &mut element.node,
        None => document,
    }
}

fn append_text(stack: &mut [Element], text: &str) -> Result<(), DecodeError> {
    match stack.last_mut() {
        Some(element) => element.text.push_str(text),
        None if text.trim().is_empty() => {},
        None => return Err(DecodeError(s!("Invalid XML document: text outside of the root element"))),
    }
    Ok(())
}

fn decode_utf8(data: &[u8]) -> Result<&str, DecodeError> {
    std::str::from_utf8(data).map_err(|e| DecodeError(format!(
        "Invalid XML document: {e}")))
}

fn unescape(data: &str) -> Result<Cow<'_, str>, DecodeError> {
    escape::unescape(data).map_err(|e| DecodeError(format!(
        "Invalid XML document: {e}")))
}
