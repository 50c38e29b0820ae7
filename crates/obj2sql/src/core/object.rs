//! Persistable instances.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use uuid::Uuid;

use super::class::ClassDef;
use super::value::Value;

/// Stable identity token of an instance.
///
/// Stored in the `origin_id` column so a re-save of the same instance
/// updates its row instead of adding one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(i64);

impl ObjectId {
    /// Fresh random token, positive and fitting a SQLite INTEGER.
    pub fn new() -> Self {
        let bits = Uuid::new_v4().as_u128() as u64;
        Self((bits >> 1) as i64)
    }

    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An instance the mapper can save and delete.
///
/// Implementors describe their class and hand out their current attribute
/// values. Attributes not returned by [`Persistable::fields`] are stored with
/// the class default.
pub trait Persistable {
    /// Class of the instance.
    fn class(&self) -> Rc<ClassDef>;

    /// Identity of the instance; must not change over its lifetime.
    fn identity(&self) -> ObjectId;

    /// Instance-level attribute values.
    fn fields(&self) -> Vec<(String, Value)>;

    /// Value of one attribute, falling back to the class default.
    fn field(&self, name: &str) -> Option<Value> {
        self.fields()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .or_else(|| self.class().field_default(name))
    }
}

/// Dynamically shaped instance of a [`ClassDef`].
pub struct Object {
    class: Rc<ClassDef>,
    id: ObjectId,
    attrs: RefCell<Vec<(String, Value)>>,
}

impl Object {
    pub fn new(class: &Rc<ClassDef>) -> Rc<Object> {
        Self::with_id(class, ObjectId::new())
    }

    pub fn with_id(class: &Rc<ClassDef>, id: ObjectId) -> Rc<Object> {
        Rc::new(Object {
            class: Rc::clone(class),
            id,
            attrs: RefCell::new(Vec::new()),
        })
    }

    /// Set an instance attribute.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        let mut attrs = self.attrs.borrow_mut();
        match attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => attrs.push((name, value)),
        }
    }

    /// Instance attribute, else the class default.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.field(name)
    }

    /// Drop an instance attribute so the class default shows through again.
    pub fn remove(&self, name: &str) -> Option<Value> {
        let mut attrs = self.attrs.borrow_mut();
        let pos = attrs.iter().position(|(n, _)| n == name)?;
        Some(attrs.remove(pos).1)
    }

    /// Wrap as a [`Value`].
    pub fn value(self: &Rc<Self>) -> Value {
        Value::Object(Rc::clone(self) as Rc<dyn Persistable>)
    }
}

impl Persistable for Object {
    fn class(&self) -> Rc<ClassDef> {
        Rc::clone(&self.class)
    }

    fn identity(&self) -> ObjectId {
        self.id
    }

    fn fields(&self) -> Vec<(String, Value)> {
        self.attrs.borrow().clone()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class.table_name())
            .field("id", &self.id)
            .field("attrs", &self.attrs.borrow())
            .finish()
    }
}
