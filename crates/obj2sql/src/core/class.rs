//! Explicit class descriptions.
//!
//! A [`ClassDef`] plays the part of a runtime type: it names its module, its
//! immediate bases and its declared members, and it keeps weak links to the
//! classes derived from it. Members can be added, replaced and removed at any
//! time; the mapper recomputes the [`ClassDescriptor`] on every save and
//! evolves the table to the last-seen shape.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use super::naming::{self, ColumnRole};
use super::value::Value;

/// What a declared member is.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    /// Instance data field with its class-level default.
    Field(Value),
    /// Instance method, as source text.
    Method(String),
    /// Class-level attribute value.
    ClassAttr(Value),
    /// Class-level method, as source text.
    ClassMethod(String),
}

/// A named member declared by a class.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
}

impl Member {
    /// Column role the member is stored under.
    pub fn role(&self) -> ColumnRole {
        match self.kind {
            MemberKind::Field(_) => ColumnRole::ObjectAttr,
            MemberKind::Method(_) => ColumnRole::ObjectMethod,
            MemberKind::ClassAttr(_) => ColumnRole::ClassAttr,
            MemberKind::ClassMethod(_) => ColumnRole::ClassMethod,
        }
    }

    /// Column name of the member.
    pub fn column(&self) -> String {
        naming::column_name(self.role(), &self.name)
    }

    /// Declared value: the default of a field, the value of a class
    /// attribute, or the source of a method.
    pub fn value(&self) -> Value {
        match &self.kind {
            MemberKind::Field(v) | MemberKind::ClassAttr(v) => v.clone(),
            MemberKind::Method(src) | MemberKind::ClassMethod(src) => Value::Callable(src.clone()),
        }
    }
}

/// A class definition.
pub struct ClassDef {
    module: String,
    name: String,
    bases: Vec<Rc<ClassDef>>,
    subclasses: RefCell<Vec<Weak<ClassDef>>>,
    members: RefCell<Vec<Member>>,
}

impl ClassDef {
    /// Start describing a class.
    pub fn builder(module: impl Into<String>, name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            module: module.into(),
            name: name.into(),
            bases: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table this class is stored in.
    pub fn table_name(&self) -> String {
        naming::table_name(&self.module, &self.name)
    }

    /// Immediate bases, in declaration order.
    pub fn bases(&self) -> &[Rc<ClassDef>] {
        &self.bases
    }

    /// Live immediate subclasses, in registration order.
    pub fn subclasses(&self) -> Vec<Rc<ClassDef>> {
        let mut subclasses = self.subclasses.borrow_mut();
        subclasses.retain(|weak| weak.strong_count() > 0);
        subclasses.iter().filter_map(Weak::upgrade).collect()
    }

    /// Snapshot of the own declared members.
    pub fn members(&self) -> Vec<Member> {
        self.members.borrow().clone()
    }

    /// Look up an own member by name.
    pub fn member(&self, name: &str) -> Option<Member> {
        self.members.borrow().iter().find(|m| m.name == name).cloned()
    }

    /// Declare or replace an instance data field.
    pub fn set_field(&self, name: impl Into<String>, default: impl Into<Value>) {
        self.upsert(name.into(), MemberKind::Field(default.into()));
    }

    /// Declare or replace an instance method.
    pub fn set_method(&self, name: impl Into<String>, source: impl Into<String>) {
        self.upsert(name.into(), MemberKind::Method(source.into()));
    }

    /// Declare or replace a class-level attribute.
    pub fn set_class_attr(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.upsert(name.into(), MemberKind::ClassAttr(value.into()));
    }

    /// Declare or replace a class-level method.
    pub fn set_class_method(&self, name: impl Into<String>, source: impl Into<String>) {
        self.upsert(name.into(), MemberKind::ClassMethod(source.into()));
    }

    /// Remove an own member. Returns whether it existed.
    pub fn remove_member(&self, name: &str) -> bool {
        let mut members = self.members.borrow_mut();
        let before = members.len();
        members.retain(|m| m.name != name);
        members.len() != before
    }

    fn upsert(&self, name: String, kind: MemberKind) {
        let mut members = self.members.borrow_mut();
        match members.iter_mut().find(|m| m.name == name) {
            Some(existing) => existing.kind = kind,
            None => members.push(Member { name, kind }),
        }
    }

    /// Default of a data field declared here or on any ancestor.
    pub fn field_default(&self, name: &str) -> Option<Value> {
        if let Some(Member {
            kind: MemberKind::Field(default),
            ..
        }) = self.member(name)
        {
            return Some(default);
        }
        self.bases.iter().find_map(|base| base.field_default(name))
    }

    /// Compute the current descriptor of this class.
    pub fn descriptor(&self) -> ClassDescriptor {
        let mut fields = Vec::new();
        let mut seen = HashSet::new();
        self.collect_fields(&mut fields, &mut seen, false);
        ClassDescriptor {
            module: self.module.clone(),
            name: self.name.clone(),
            table: self.table_name(),
            fields,
            bases: self.bases.iter().map(|b| b.table_name()).collect(),
        }
    }

    fn collect_fields(
        &self,
        out: &mut Vec<FieldDescriptor>,
        seen: &mut HashSet<String>,
        inherited: bool,
    ) {
        for member in self.members.borrow().iter() {
            if let MemberKind::Field(default) = &member.kind {
                if seen.insert(member.name.clone()) {
                    out.push(FieldDescriptor {
                        name: member.name.clone(),
                        default: default.clone(),
                        inherited,
                        owner: self.table_name(),
                    });
                }
            }
        }
        for base in &self.bases {
            base.collect_fields(out, seen, true);
        }
    }
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("module", &self.module)
            .field("name", &self.name)
            .field(
                "bases",
                &self.bases.iter().map(|b| b.table_name()).collect::<Vec<_>>(),
            )
            .field("members", &self.members.borrow())
            .finish()
    }
}

/// Builder for [`ClassDef`].
pub struct ClassBuilder {
    module: String,
    name: String,
    bases: Vec<Rc<ClassDef>>,
    members: Vec<Member>,
}

impl ClassBuilder {
    /// Add an immediate base class.
    pub fn base(mut self, base: &Rc<ClassDef>) -> Self {
        self.bases.push(Rc::clone(base));
        self
    }

    pub fn field(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.member(name, MemberKind::Field(default.into()))
    }

    pub fn method(self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.member(name, MemberKind::Method(source.into()))
    }

    pub fn class_attr(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.member(name, MemberKind::ClassAttr(value.into()))
    }

    pub fn class_method(self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.member(name, MemberKind::ClassMethod(source.into()))
    }

    fn member(mut self, name: impl Into<String>, kind: MemberKind) -> Self {
        let name = name.into();
        self.members.retain(|m| m.name != name);
        self.members.push(Member { name, kind });
        self
    }

    /// Finish the class and register it with its bases.
    pub fn build(self) -> Rc<ClassDef> {
        let class = Rc::new(ClassDef {
            module: self.module,
            name: self.name,
            bases: self.bases,
            subclasses: RefCell::new(Vec::new()),
            members: RefCell::new(self.members),
        });
        for base in &class.bases {
            base.subclasses.borrow_mut().push(Rc::downgrade(&class));
        }
        class
    }
}

/// Shape of a class at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDescriptor {
    pub module: String,
    pub name: String,
    pub table: String,
    /// Own fields first, then inherited ones (depth-first over the bases).
    pub fields: Vec<FieldDescriptor>,
    /// Tables of the immediate bases.
    pub bases: Vec<String>,
}

impl ClassDescriptor {
    pub fn own_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.inherited)
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }
}

/// A declared data field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub default: Value,
    pub inherited: bool,
    /// Table of the class that declares the field.
    pub owner: String,
}
