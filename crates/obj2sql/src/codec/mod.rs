//! Text encoding of primitive values.
//!
//! Every primitive is stored as a self-describing tagged string such as
//! `int(1)`, `text("a")` or `list(int(1), text("2"))`. Decoding is a typed
//! parse of that grammar; stored text is never evaluated.
//!
//! Untagged text decodes as callable source, which is how method columns
//! store their values.

use sha2::{Digest, Sha256};

use crate::core::classify;
use crate::core::object::ObjectId;
use crate::core::value::{ArrayCode, AssociationRef, NumArray, Number, PrimitiveKind, Value};
use crate::error::{MapperError, Result};

/// Encoding of a null element inside a container.
const NONE_TOKEN: &str = "none";

/// Encode a value for storage. Null encodes to `None` (SQL NULL).
///
/// Composite objects and type objects are rejected; the persister replaces
/// composites by their association reference before encoding.
pub fn encode(value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::Callable(source) => Ok(Some(source.clone())),
        Value::Ref(r) => Ok(Some(r.to_string())),
        other => {
            let mut out = String::new();
            encode_into(other, &mut out)?;
            Ok(Some(out))
        }
    }
}

fn encode_into(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Null => out.push_str(NONE_TOKEN),
        Value::Int(v) => {
            out.push_str("int(");
            out.push_str(&v.to_string());
            out.push(')');
        }
        Value::Real(v) => {
            out.push_str("real(");
            out.push_str(&format_real(*v));
            out.push(')');
        }
        Value::Bool(v) => {
            out.push_str(if *v { "bool(true)" } else { "bool(false)" });
        }
        Value::Text(s) => tagged_string(out, "text", s)?,
        Value::Callable(s) => tagged_string(out, "callable", s)?,
        Value::Ref(r) => tagged_string(out, "ref", &r.to_string())?,
        Value::Opaque(table) => tagged_string(out, "object", table)?,
        Value::Array(array) => {
            out.push_str("array(");
            out.push_str(&serde_json::to_string(&array.code().code().to_string())?);
            for item in array.items() {
                out.push_str(", ");
                match item {
                    Number::Int(v) => out.push_str(&v.to_string()),
                    Number::Real(v) => out.push_str(&format_real(*v)),
                }
            }
            out.push(')');
        }
        Value::List(items) => sequence(out, "list", items)?,
        Value::Tuple(items) => sequence(out, "tuple", items)?,
        Value::Set(items) => sequence(out, "set", items)?,
        Value::Map(entries) => {
            out.push_str("map(");
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                element(out, k)?;
                out.push_str(": ");
                element(out, v)?;
            }
            out.push(')');
        }
        Value::Object(o) => {
            if !classify::is_opaque(o.as_ref()) {
                return Err(MapperError::invalid(format!(
                    "composite value of type {} must be persisted, not encoded",
                    value.type_name()
                )));
            }
            tagged_string(out, "object", &o.class().table_name())?;
        }
        Value::Type(c) => {
            return Err(MapperError::invalid(format!(
                "type object {} cannot be encoded",
                c.table_name()
            )))
        }
    }
    Ok(())
}

fn element(out: &mut String, value: &Value) -> Result<()> {
    if classify::is_composite(value) {
        return Err(MapperError::invalid(format!(
            "containers hold primitives only, found {}",
            value.type_name()
        )));
    }
    encode_into(value, out)
}

fn sequence(out: &mut String, tag: &str, items: &[Value]) -> Result<()> {
    out.push_str(tag);
    out.push('(');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        element(out, item)?;
    }
    out.push(')');
    Ok(())
}

fn tagged_string(out: &mut String, tag: &str, text: &str) -> Result<()> {
    out.push_str(tag);
    out.push('(');
    out.push_str(&serde_json::to_string(text)?);
    out.push(')');
    Ok(())
}

/// Shortest repr that parses back to the same float.
fn format_real(v: f64) -> String {
    format!("{:?}", v)
}

/// Content identity of a primitive value.
///
/// Equal primitives share one row in their value table, so the identity is
/// derived from the encoding rather than allocated.
pub fn content_identity(value: &Value) -> Result<ObjectId> {
    let encoded = encode(value)?.unwrap_or_else(|| NONE_TOKEN.to_string());
    let digest = Sha256::digest(encoded.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    Ok(ObjectId::from_raw((u64::from_be_bytes(bytes) >> 1) as i64))
}

/// Decode stored text.
pub fn decode(text: &str) -> Result<Value> {
    if AssociationRef::is_encoded(text) {
        return Ok(Value::Ref(text.parse()?));
    }
    let mut parser = Parser::new(text);
    match parser.peek_tag() {
        Some(tag) if is_known_tag(tag) => {
            let value = parser.value()?;
            parser.skip_ws();
            if !parser.at_end() {
                return Err(parser.error("trailing characters"));
            }
            Ok(value)
        }
        _ => Ok(Value::Callable(text.to_string())),
    }
}

/// Decode stored text that must be of the given primitive kind.
pub fn decode_as(text: &str, kind: PrimitiveKind) -> Result<Value> {
    let value = decode(text)?;
    match value.primitive_kind() {
        Some(k) if k == kind => Ok(value),
        _ => Err(MapperError::decode(format!(
            "expected {} but found {} in {:?}",
            kind,
            value.type_name(),
            text
        ))),
    }
}

fn is_known_tag(tag: &str) -> bool {
    matches!(
        tag,
        "none"
            | "int"
            | "real"
            | "bool"
            | "text"
            | "array"
            | "list"
            | "tuple"
            | "set"
            | "map"
            | "callable"
            | "ref"
            | "object"
    )
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn error(&self, what: &str) -> MapperError {
        MapperError::decode(format!("{} at offset {} in {:?}", what, self.pos, self.src))
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    /// Leading identifier without consuming it.
    fn peek_tag(&self) -> Option<&'a str> {
        let rest = self.rest();
        let end = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        let tag = &rest[..end];
        let after = &rest[end..];
        if tag == NONE_TOKEN || after.starts_with('(') {
            Some(tag)
        } else {
            None
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        self.skip_ws();
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c)))
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn value(&mut self) -> Result<Value> {
        self.skip_ws();
        let tag = self.peek_tag().ok_or_else(|| self.error("expected a value"))?;
        self.pos += tag.len();
        if tag == NONE_TOKEN {
            return Ok(Value::Null);
        }
        self.expect('(')?;
        let value = match tag {
            "int" => Value::Int(self.integer()?),
            "real" => Value::Real(self.real()?),
            "bool" => match self.word() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(self.error("expected true or false")),
            },
            "text" => Value::Text(self.string()?),
            "callable" => Value::Callable(self.string()?),
            "object" => Value::Opaque(self.string()?),
            "ref" => Value::Ref(self.string()?.parse()?),
            "array" => Value::Array(self.array()?),
            "list" => Value::List(self.elements()?),
            "tuple" => Value::Tuple(self.elements()?),
            "set" => Value::Set(self.elements()?),
            "map" => Value::Map(self.entries()?),
            other => return Err(self.error(&format!("unknown tag {}", other))),
        };
        self.expect(')')?;
        Ok(value)
    }

    /// Run of characters that can make up a number or keyword.
    fn word(&mut self) -> &'a str {
        self.skip_ws();
        let rest = self.rest();
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-')))
            .unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn integer(&mut self) -> Result<i64> {
        let word = self.word();
        word.parse::<i64>()
            .map_err(|_| self.error(&format!("invalid integer {:?}", word)))
    }

    fn real(&mut self) -> Result<f64> {
        let word = self.word();
        word.parse::<f64>()
            .map_err(|_| self.error(&format!("invalid real {:?}", word)))
    }

    /// JSON string literal.
    fn string(&mut self) -> Result<String> {
        self.skip_ws();
        let rest = self.rest();
        if !rest.starts_with('"') {
            return Err(self.error("expected string literal"));
        }
        let mut escaped = false;
        let mut end = None;
        for (i, c) in rest.char_indices().skip(1) {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => {
                    end = Some(i + 1);
                    break;
                }
                _ => {}
            }
        }
        let end = end.ok_or_else(|| self.error("unterminated string literal"))?;
        let text: String = serde_json::from_str(&rest[..end])
            .map_err(|e| self.error(&format!("invalid string literal: {}", e)))?;
        self.pos += end;
        Ok(text)
    }

    fn array(&mut self) -> Result<NumArray> {
        let code = self.string()?;
        let mut chars = code.chars();
        let code = match (chars.next(), chars.next()) {
            (Some(c), None) => {
                ArrayCode::from_code(c).ok_or_else(|| self.error(&format!("unknown array type code {:?}", c)))?
            }
            _ => return Err(self.error("array type code must be one character")),
        };
        let mut items = Vec::new();
        while self.eat(',') {
            if code.is_float() {
                items.push(Number::Real(self.real()?));
            } else {
                items.push(Number::Int(self.integer()?));
            }
        }
        NumArray::new(code, items).map_err(|e| MapperError::decode(e.to_string()))
    }

    fn elements(&mut self) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        self.skip_ws();
        if self.rest().starts_with(')') {
            return Ok(items);
        }
        loop {
            items.push(self.value()?);
            if !self.eat(',') {
                break;
            }
        }
        Ok(items)
    }

    fn entries(&mut self) -> Result<Vec<(Value, Value)>> {
        let mut entries = Vec::new();
        self.skip_ws();
        if self.rest().starts_with(')') {
            return Ok(entries);
        }
        loop {
            let key = self.value()?;
            self.expect(':')?;
            let value = self.value()?;
            entries.push((key, value));
            if !self.eat(',') {
                break;
            }
        }
        Ok(entries)
    }
}
