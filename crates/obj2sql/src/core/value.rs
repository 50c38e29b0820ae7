//! Runtime values the mapper can store.
//!
//! [`Value`] is the attribute currency of the class model: primitives are
//! stored inline in a single column, objects ([`Value::Object`]) get their own
//! table and are replaced by an [`AssociationRef`] in the referencing row.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MapperError, Result};

use super::class::ClassDef;
use super::naming::{self, ColumnRole, SEPARATOR};
use super::object::Persistable;

/// Primitive pseudo-classes, each stored in its own `builtins$<kind>` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Int,
    Real,
    Bool,
    Text,
    Array,
    List,
    Tuple,
    Set,
    Map,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 9] = [
        PrimitiveKind::Int,
        PrimitiveKind::Real,
        PrimitiveKind::Bool,
        PrimitiveKind::Text,
        PrimitiveKind::Array,
        PrimitiveKind::List,
        PrimitiveKind::Tuple,
        PrimitiveKind::Set,
        PrimitiveKind::Map,
    ];

    /// Type name used in encodings and table names.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Int => "int",
            PrimitiveKind::Real => "real",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Text => "text",
            PrimitiveKind::Array => "array",
            PrimitiveKind::List => "list",
            PrimitiveKind::Tuple => "tuple",
            PrimitiveKind::Set => "set",
            PrimitiveKind::Map => "map",
        }
    }

    /// Look a kind up by its type name.
    pub fn from_name(name: &str) -> Option<PrimitiveKind> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Table holding saved values of this kind.
    pub fn table_name(self) -> String {
        naming::primitive_table_name(self.name())
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element type of a numeric array, named by its one-letter type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayCode {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    F32,
    F64,
}

impl ArrayCode {
    pub const ALL: [ArrayCode; 9] = [
        ArrayCode::I8,
        ArrayCode::U8,
        ArrayCode::I16,
        ArrayCode::U16,
        ArrayCode::I32,
        ArrayCode::U32,
        ArrayCode::I64,
        ArrayCode::F32,
        ArrayCode::F64,
    ];

    pub fn code(self) -> char {
        match self {
            ArrayCode::I8 => 'b',
            ArrayCode::U8 => 'B',
            ArrayCode::I16 => 'h',
            ArrayCode::U16 => 'H',
            ArrayCode::I32 => 'i',
            ArrayCode::U32 => 'I',
            ArrayCode::I64 => 'q',
            ArrayCode::F32 => 'f',
            ArrayCode::F64 => 'd',
        }
    }

    pub fn from_code(code: char) -> Option<ArrayCode> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn is_float(self) -> bool {
        matches!(self, ArrayCode::F32 | ArrayCode::F64)
    }

    /// Inclusive integer range of the element type.
    fn int_range(self) -> (i64, i64) {
        match self {
            ArrayCode::I8 => (i8::MIN as i64, i8::MAX as i64),
            ArrayCode::U8 => (0, u8::MAX as i64),
            ArrayCode::I16 => (i16::MIN as i64, i16::MAX as i64),
            ArrayCode::U16 => (0, u16::MAX as i64),
            ArrayCode::I32 => (i32::MIN as i64, i32::MAX as i64),
            ArrayCode::U32 => (0, u32::MAX as i64),
            ArrayCode::I64 | ArrayCode::F32 | ArrayCode::F64 => (i64::MIN, i64::MAX),
        }
    }
}

/// One element of a numeric array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Number {
    Int(i64),
    Real(f64),
}

/// Fixed-element-type numeric array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumArray {
    code: ArrayCode,
    items: Vec<Number>,
}

impl NumArray {
    /// Build an array, checking every element against the type code.
    pub fn new(code: ArrayCode, items: Vec<Number>) -> Result<Self> {
        for item in &items {
            match (code.is_float(), item) {
                (true, Number::Real(_)) => {}
                (false, Number::Int(v)) => {
                    let (lo, hi) = code.int_range();
                    if *v < lo || *v > hi {
                        return Err(MapperError::invalid(format!(
                            "array element {} out of range for type code '{}'",
                            v,
                            code.code()
                        )));
                    }
                }
                _ => {
                    return Err(MapperError::invalid(format!(
                        "array element {:?} does not match type code '{}'",
                        item,
                        code.code()
                    )))
                }
            }
        }
        Ok(Self { code, items })
    }

    /// Integer array.
    pub fn ints(code: ArrayCode, items: impl IntoIterator<Item = i64>) -> Result<Self> {
        Self::new(code, items.into_iter().map(Number::Int).collect())
    }

    /// Floating point array.
    pub fn reals(code: ArrayCode, items: impl IntoIterator<Item = f64>) -> Result<Self> {
        Self::new(code, items.into_iter().map(Number::Real).collect())
    }

    pub fn code(&self) -> ArrayCode {
        self.code
    }

    pub fn items(&self) -> &[Number] {
        &self.items
    }
}

/// Encoded pointer to a row of another class table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssociationRef {
    pub table: String,
    pub row_id: i64,
}

impl AssociationRef {
    pub fn new(table: impl Into<String>, row_id: i64) -> Self {
        Self {
            table: table.into(),
            row_id,
        }
    }

    /// Whether stored text looks like an association reference.
    pub fn is_encoded(text: &str) -> bool {
        ColumnRole::of(text) == Some(ColumnRole::AssociationRef)
    }
}

impl fmt::Display for AssociationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            ColumnRole::AssociationRef.prefix(),
            SEPARATOR,
            self.table,
            SEPARATOR,
            self.row_id
        )
    }
}

impl FromStr for AssociationRef {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self> {
        let body = s
            .strip_prefix(ColumnRole::AssociationRef.prefix())
            .and_then(|rest| rest.strip_prefix(SEPARATOR))
            .ok_or_else(|| MapperError::decode(format!("not an association reference: {}", s)))?;
        let (table, row) = body
            .rsplit_once(SEPARATOR)
            .ok_or_else(|| MapperError::decode(format!("association reference without row id: {}", s)))?;
        let row_id = row
            .parse::<i64>()
            .map_err(|_| MapperError::decode(format!("invalid row id in association reference: {}", s)))?;
        naming::parse_table_name(table)?;
        Ok(Self::new(table, row_id))
    }
}

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    /// Absent value, stored as SQL NULL.
    Null,
    Int(i64),
    Real(f64),
    Bool(bool),
    Text(String),
    Array(NumArray),
    /// Ordered container.
    List(Vec<Value>),
    /// Ordered, fixed-size container.
    Tuple(Vec<Value>),
    /// Unordered container (element order is preserved as given).
    Set(Vec<Value>),
    /// Key/value container.
    Map(Vec<(Value, Value)>),
    /// Source text of a callable, stored verbatim.
    Callable(String),
    /// Stored pointer to another row (produced by the read path).
    Ref(AssociationRef),
    /// Inline encoding of an instance without fields, naming its table.
    Opaque(String),
    /// Live object with its own table.
    Object(Rc<dyn Persistable>),
    /// A class object; structural, never stored as data.
    Type(Rc<ClassDef>),
}

impl Value {
    /// Wrap a persistable object.
    pub fn object<P: Persistable + 'static>(object: Rc<P>) -> Value {
        Value::Object(object)
    }

    pub fn text(s: impl Into<String>) -> Value {
        Value::Text(s.into())
    }

    pub fn callable(source: impl Into<String>) -> Value {
        Value::Callable(source.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Primitive table this value is saved into when saved on its own.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Value::Int(_) => Some(PrimitiveKind::Int),
            Value::Real(_) => Some(PrimitiveKind::Real),
            Value::Bool(_) => Some(PrimitiveKind::Bool),
            Value::Text(_) => Some(PrimitiveKind::Text),
            Value::Array(_) => Some(PrimitiveKind::Array),
            Value::List(_) => Some(PrimitiveKind::List),
            Value::Tuple(_) => Some(PrimitiveKind::Tuple),
            Value::Set(_) => Some(PrimitiveKind::Set),
            Value::Map(_) => Some(PrimitiveKind::Map),
            _ => None,
        }
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Callable(_) => "callable".to_string(),
            Value::Ref(_) => "reference".to_string(),
            Value::Opaque(table) => table.clone(),
            Value::Object(o) => o.class().table_name(),
            Value::Type(c) => format!("type[{}]", c.table_name()),
            other => other
                .primitive_kind()
                .map(|k| k.name().to_string())
                .unwrap_or_default(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Value::Real(v) => f.debug_tuple("Real").field(v).finish(),
            Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Value::Text(v) => f.debug_tuple("Text").field(v).finish(),
            Value::Array(v) => f.debug_tuple("Array").field(v).finish(),
            Value::List(v) => f.debug_tuple("List").field(v).finish(),
            Value::Tuple(v) => f.debug_tuple("Tuple").field(v).finish(),
            Value::Set(v) => f.debug_tuple("Set").field(v).finish(),
            Value::Map(v) => f.debug_tuple("Map").field(v).finish(),
            Value::Callable(v) => f.debug_tuple("Callable").field(v).finish(),
            Value::Ref(v) => f.debug_tuple("Ref").field(v).finish(),
            Value::Opaque(v) => f.debug_tuple("Opaque").field(v).finish(),
            Value::Object(o) => write!(f, "Object({}#{})", o.class().table_name(), o.identity()),
            Value::Type(c) => write!(f, "Type({})", c.table_name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a == b,
            // Objects compare by identity, not by field values.
            (Value::Object(a), Value::Object(b)) => a.identity() == b.identity(),
            (Value::Type(a), Value::Type(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NumArray> for Value {
    fn from(v: NumArray) -> Self {
        Value::Array(v)
    }
}

impl From<AssociationRef> for Value {
    fn from(v: AssociationRef) -> Self {
        Value::Ref(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_kind_names() {
        for kind in PrimitiveKind::ALL {
            assert_eq!(PrimitiveKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(PrimitiveKind::Int.table_name(), "builtins$int");
        assert_eq!(PrimitiveKind::from_name("object"), None);
    }

    #[test]
    fn test_array_codes() {
        for code in ArrayCode::ALL {
            assert_eq!(ArrayCode::from_code(code.code()), Some(code));
        }
        assert_eq!(ArrayCode::from_code('z'), None);
    }

    #[test]
    fn test_num_array_validation() {
        assert!(NumArray::ints(ArrayCode::I32, [1, 2, 3]).is_ok());
        assert!(NumArray::ints(ArrayCode::U8, [256]).is_err());
        assert!(NumArray::ints(ArrayCode::U16, [-1]).is_err());
        assert!(NumArray::reals(ArrayCode::F64, [1.5]).is_ok());
        assert!(NumArray::reals(ArrayCode::I64, [1.5]).is_err());
        assert!(NumArray::ints(ArrayCode::F32, [1]).is_err());
    }

    #[test]
    fn test_association_ref_roundtrip() {
        let r = AssociationRef::new("demo_classes$AssociatedClass", 2);
        let text = r.to_string();
        assert_eq!(text, "ASSOCIATION_REF$demo_classes$AssociatedClass$2");
        assert!(AssociationRef::is_encoded(&text));
        assert_eq!(text.parse::<AssociationRef>().unwrap(), r);
    }

    #[test]
    fn test_association_ref_rejects_garbage() {
        assert!("int(1)".parse::<AssociationRef>().is_err());
        assert!("ASSOCIATION_REF$demo$A$x".parse::<AssociationRef>().is_err());
        assert!("ASSOCIATION_REF$nosep".parse::<AssociationRef>().is_err());
        assert!(!AssociationRef::is_encoded("text(\"ASSOCIATION_REF$a$b$1\")"));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(1i32), Value::Int(1));
        assert_eq!(Value::from("s"), Value::Text("s".into()));
        assert_eq!(
            Value::from(vec![1i64, 2]),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_primitive_kind_of_values() {
        assert_eq!(Value::Int(1).primitive_kind(), Some(PrimitiveKind::Int));
        assert_eq!(Value::Map(vec![]).primitive_kind(), Some(PrimitiveKind::Map));
        assert_eq!(Value::Null.primitive_kind(), None);
        assert_eq!(Value::callable("fn f() {}").primitive_kind(), None);
    }
}
