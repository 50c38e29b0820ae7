//! Primitive vs composite classification.
//!
//! Primitive values are stored inline in a single column; composite values
//! (objects whose class or instance carries data fields) get their own table
//! and are referenced through an association reference.

use super::class::ClassDef;
use super::object::Persistable;
use super::value::Value;

/// Whether a class stores no data fields of its own or inherited.
pub fn is_primitive_class(class: &ClassDef) -> bool {
    !class.descriptor().has_fields()
}

/// Whether an object has nothing to store beyond its class name.
pub fn is_opaque(object: &dyn Persistable) -> bool {
    is_primitive_class(&object.class()) && object.fields().is_empty()
}

/// Whether a value is stored inline.
///
/// Type objects are neither primitive nor composite.
pub fn is_primitive(value: &Value) -> bool {
    match value {
        Value::Object(o) => is_opaque(o.as_ref()),
        Value::Type(_) => false,
        _ => true,
    }
}

/// Whether a value is stored in a table of its own.
pub fn is_composite(value: &Value) -> bool {
    matches!(value, Value::Object(o) if !is_opaque(o.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::object::Object;
    use crate::core::value::{ArrayCode, AssociationRef, NumArray};

    #[test]
    fn test_builtin_values_are_primitive() {
        let values = vec![
            Value::Null,
            Value::Int(1),
            Value::Real(2.5),
            Value::Bool(true),
            Value::text("a"),
            Value::Array(NumArray::ints(ArrayCode::I32, [1, 2]).unwrap()),
            Value::List(vec![Value::Int(1)]),
            Value::Tuple(vec![]),
            Value::Set(vec![Value::Int(1)]),
            Value::Map(vec![(Value::Int(1), Value::text("x"))]),
            Value::callable("fn f() {}"),
            Value::Ref(AssociationRef::new("demo$A", 2)),
        ];
        for v in values {
            assert!(is_primitive(&v), "{:?}", v);
            assert!(!is_composite(&v), "{:?}", v);
        }
    }

    #[test]
    fn test_object_with_fields_is_composite() {
        let class = ClassDef::builder("demo", "A").field("a", 0i64).build();
        let obj = Object::new(&class).value();
        assert!(is_composite(&obj));
        assert!(!is_primitive(&obj));
        assert!(!is_primitive_class(&class));
    }

    #[test]
    fn test_fieldless_object_is_opaque() {
        let class = ClassDef::builder("demo", "Marker")
            .method("run", "fn run(&self) {}")
            .build();
        assert!(is_primitive_class(&class));
        let obj = Object::new(&class);
        assert!(is_primitive(&obj.value()));

        obj.set("late", 1i64);
        assert!(is_composite(&obj.value()));
    }

    #[test]
    fn test_inherited_fields_make_class_composite() {
        let base = ClassDef::builder("demo", "A").field("a", 0i64).build();
        let derived = ClassDef::builder("demo", "B").base(&base).build();
        assert!(!is_primitive_class(&derived));
    }

    #[test]
    fn test_type_objects_are_neither() {
        let class = ClassDef::builder("demo", "A").build();
        let t = Value::Type(class);
        assert!(!is_primitive(&t));
        assert!(!is_composite(&t));
    }
}
