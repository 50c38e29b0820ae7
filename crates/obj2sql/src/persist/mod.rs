//! Saving instances and values.
//!
//! An object is written as one row in its class table plus one slice row in
//! the table of every ancestor, all sharing the object's identity in
//! `origin_id`. Composite attributes are saved first and replaced by their
//! association reference; primitives are encoded inline. Primitive values
//! saved on their own go to `builtins$<kind>` keyed by a content identity.

mod delete;
pub mod session;

use std::rc::Rc;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter};
use tracing::{debug, info, warn};

use crate::codec;
use crate::core::class::{ClassDef, MemberKind};
use crate::core::classify;
use crate::core::identifier::{quote, quote_list};
use crate::core::naming::{self, SENTINEL_ROW_ID};
use crate::core::object::{ObjectId, Persistable};
use crate::core::value::{AssociationRef, PrimitiveKind, Value};
use crate::error::{MapperError, Result};
use crate::mapper::Mapper;

use delete::Visited;
use session::Session;

impl Mapper {
    /// Save a value. Returns the row id it is stored under.
    ///
    /// Re-saving the same object updates its row; saving an equal primitive
    /// again returns the existing row.
    pub fn save(&self, value: &Value) -> Result<i64> {
        match value {
            Value::Object(object) => self.save_object(object),
            other => self.save_primitive(other),
        }
    }

    /// Save an object and everything reachable from it.
    pub fn save_object(&self, object: &Rc<dyn Persistable>) -> Result<i64> {
        let mut session = Session::new();
        let reference = self.persist_object(object, &mut session)?;
        debug!(
            "Saved {} ({} objects written)",
            reference,
            session.objects_saved()
        );
        Ok(reference.row_id)
    }

    /// Save a value into a chosen row.
    ///
    /// A value already in that row is deleted first, with its base slices and,
    /// per the cascade policy, the objects it references. The saved value's
    /// identity then moves to the row. Row 1 of a class table is the sentinel row and
    /// cannot be chosen.
    pub fn save_with_explicit_id(&self, value: &Value, row_id: i64) -> Result<i64> {
        if row_id < 1 {
            return Err(MapperError::invalid(format!(
                "row id must be positive, got {}",
                row_id
            )));
        }
        let table = match value {
            Value::Object(object) => {
                if row_id == SENTINEL_ROW_ID {
                    return Err(MapperError::invalid(format!(
                        "row {} of a class table is reserved",
                        SENTINEL_ROW_ID
                    )));
                }
                object.class().table_name()
            }
            other => self.primitive_kind_of(other)?.table_name(),
        };

        let current = self.save(value)?;
        if current == row_id {
            return Ok(row_id);
        }

        let quoted = quote(&table)?;
        let conn = self.store().conn()?;
        let tx = conn.unchecked_transaction()?;
        if self.store().row_exists(&table, row_id)? {
            // The evicted occupant goes the way of a regular delete: its base
            // slices with it, its references per the cascade policy.
            let mut visited = Visited::new();
            visited.insert((table.clone(), current));
            self.delete_row(&table, row_id, &mut visited)?;
        }
        tx.execute(
            &format!("UPDATE {} SET ID = ?1 WHERE ID = ?2", quoted),
            params![row_id, current],
        )?;
        tx.commit()?;
        info!("Moved {} row {} to row {}", table, current, row_id);
        Ok(row_id)
    }

    fn primitive_kind_of(&self, value: &Value) -> Result<PrimitiveKind> {
        value.primitive_kind().ok_or_else(|| {
            MapperError::invalid(format!(
                "a {} value cannot be saved on its own",
                value.type_name()
            ))
        })
    }

    fn save_primitive(&self, value: &Value) -> Result<i64> {
        let kind = self.primitive_kind_of(value)?;
        let table = self.ensure_value_schema(kind)?;
        let origin = codec::content_identity(value)?;
        if let Some(row) = self.store().row_for_origin(&table, origin.as_i64())? {
            debug!("{} already holds this value in row {}", table, row);
            return Ok(row);
        }
        let encoded = codec::encode(value)?;
        self.store().execute(
            &format!(
                "INSERT INTO {} (origin_id, value) VALUES (?1, ?2)",
                quote(&table)?
            ),
            params![origin.as_i64(), encoded],
        )?;
        Ok(self.store().conn()?.last_insert_rowid())
    }

    pub(crate) fn persist_object(
        &self,
        object: &Rc<dyn Persistable>,
        session: &mut Session,
    ) -> Result<AssociationRef> {
        let id = object.identity();
        if let Some(reference) = session.saved(id) {
            return Ok(reference.clone());
        }
        let class = object.class();

        if session.is_in_progress(id) {
            let table = class.table_name();
            let row = self.reserve_row(&table, id)?;
            debug!("Cycle through {}#{}, using row {}", table, id, row);
            return Ok(AssociationRef::new(table, row));
        }

        session.begin_object(id);
        let table = self.ensure_class_schema_in(&class, session)?;
        warn_undeclared(object.as_ref(), &class);
        let row = self.save_slice(object.as_ref(), &class, session)?;
        let reference = AssociationRef::new(table, row);
        session.finish_object(id, reference.clone());
        Ok(reference)
    }

    /// Encode an attribute value, saving it first if it is composite.
    pub(crate) fn encode_attr(&self, value: &Value, session: &mut Session) -> Result<Option<String>> {
        match value {
            Value::Object(object) if !classify::is_opaque(object.as_ref()) => {
                Ok(Some(self.persist_object(object, session)?.to_string()))
            }
            other => codec::encode(other),
        }
    }

    /// Write the slice of `object` that belongs to `class`, bases first.
    fn save_slice(
        &self,
        object: &dyn Persistable,
        class: &ClassDef,
        session: &mut Session,
    ) -> Result<i64> {
        let mut columns = Vec::new();
        let mut values = Vec::new();

        for base in class.bases() {
            let row = self.save_slice(object, base, session)?;
            columns.push(naming::base_ref_column(&base.table_name()));
            values.push(SqlValue::Integer(row));
        }

        let fields = object.fields();
        for member in class.members() {
            match &member.kind {
                MemberKind::Field(Value::Type(_)) => {}
                MemberKind::Field(default) => {
                    let value = fields
                        .iter()
                        .find(|(name, _)| *name == member.name)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_else(|| default.clone());
                    if let Value::Type(_) = value {
                        debug!("{}: skipping type-valued attribute {}", class.table_name(), member.name);
                        continue;
                    }
                    let encoded = self.encode_attr(&value, session)?;
                    columns.push(member.column());
                    values.push(encoded.map_or(SqlValue::Null, SqlValue::Text));
                }
                MemberKind::Method(source) => {
                    columns.push(member.column());
                    values.push(SqlValue::Text(source.clone()));
                }
                MemberKind::ClassAttr(_) | MemberKind::ClassMethod(_) => {}
            }
        }

        self.upsert_row(&class.table_name(), object.identity(), &columns, values)
    }

    /// Update the row holding `origin`, or insert one.
    fn upsert_row(
        &self,
        table: &str,
        origin: ObjectId,
        columns: &[String],
        mut values: Vec<SqlValue>,
    ) -> Result<i64> {
        let quoted = quote(table)?;
        match self.store().row_for_origin(table, origin.as_i64())? {
            Some(row) => {
                if !columns.is_empty() {
                    let assignments = columns
                        .iter()
                        .enumerate()
                        .map(|(i, c)| Ok(format!("{} = ?{}", quote(c)?, i + 1)))
                        .collect::<Result<Vec<_>>>()?;
                    let sql = format!(
                        "UPDATE {} SET {} WHERE ID = ?{}",
                        quoted,
                        assignments.join(", "),
                        columns.len() + 1
                    );
                    values.push(SqlValue::Integer(row));
                    self.store().execute(&sql, params_from_iter(values))?;
                }
                debug!("Updated {} row {}", table, row);
                Ok(row)
            }
            None => {
                let mut names = vec![naming::ORIGIN_COLUMN.to_string()];
                names.extend(columns.iter().cloned());
                let placeholders = (1..=names.len())
                    .map(|i| format!("?{}", i))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    quoted,
                    quote_list(&names)?,
                    placeholders
                );
                values.insert(0, SqlValue::Integer(origin.as_i64()));
                self.store().execute(&sql, params_from_iter(values))?;
                let row = self.store().conn()?.last_insert_rowid();
                debug!("Inserted {} row {}", table, row);
                Ok(row)
            }
        }
    }

    /// Row for an object met again while its own save is still running.
    fn reserve_row(&self, table: &str, id: ObjectId) -> Result<i64> {
        if let Some(row) = self.store().row_for_origin(table, id.as_i64())? {
            return Ok(row);
        }
        self.upsert_row(table, id, &[], Vec::new())
    }
}

fn warn_undeclared(object: &dyn Persistable, class: &ClassDef) {
    for (name, _) in object.fields() {
        if class.field_default(&name).is_none() {
            warn!(
                "{}: attribute {} is not declared by the class and was not saved",
                class.table_name(),
                name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::object::Object;
    use crate::core::value::{ArrayCode, NumArray};

    fn attr_text(mapper: &Mapper, table: &str, row: i64, field: &str) -> Option<String> {
        let sql = format!(
            "SELECT {} FROM {} WHERE ID = ?1",
            quote(&naming::column_name(naming::ColumnRole::ObjectAttr, field)).unwrap(),
            quote(table).unwrap()
        );
        mapper
            .store()
            .conn()
            .unwrap()
            .query_row(&sql, params![row], |r| r.get(0))
            .unwrap()
    }

    // ==========================================================================
    // Primitives
    // ==========================================================================

    #[test]
    fn test_save_primitive_dedups_equal_values() {
        let mapper = Mapper::open_in_memory().unwrap();
        let a = mapper.save(&Value::Int(1)).unwrap();
        let b = mapper.save(&Value::Int(1)).unwrap();
        let c = mapper.save(&Value::Int(2)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(mapper.store().row_count("builtins$int").unwrap(), 2);
    }

    #[test]
    fn test_save_primitive_kinds_use_own_tables() {
        let mapper = Mapper::open_in_memory().unwrap();
        mapper.save(&Value::text("some str")).unwrap();
        mapper.save(&Value::List(vec![Value::Int(1), Value::Int(2)])).unwrap();
        mapper
            .save(&Value::Array(NumArray::ints(ArrayCode::I64, [1, 2]).unwrap()))
            .unwrap();
        let tables = mapper.store().tables().unwrap();
        assert!(tables.contains(&"builtins$text".to_string()));
        assert!(tables.contains(&"builtins$list".to_string()));
        assert!(tables.contains(&"builtins$array".to_string()));
    }

    #[test]
    fn test_save_rejects_non_storable_values() {
        let mapper = Mapper::open_in_memory().unwrap();
        for value in [Value::Null, Value::callable("fn f() {}")] {
            assert!(matches!(
                mapper.save(&value),
                Err(MapperError::InvalidArgument(_))
            ));
        }
        assert!(mapper.store().tables().unwrap().is_empty());
    }

    // ==========================================================================
    // Objects
    // ==========================================================================

    #[test]
    fn test_resave_updates_in_place() {
        let mapper = Mapper::open_in_memory().unwrap();
        let class = ClassDef::builder("demo", "P").field("x", 0i64).build();
        let p = Object::new(&class);
        let row = mapper.save(&p.value()).unwrap();
        assert_eq!(row, 2);
        p.set("x", 9i64);
        assert_eq!(mapper.save(&p.value()).unwrap(), row);
        assert_eq!(mapper.store().row_count("demo$P").unwrap(), 2);
        assert_eq!(attr_text(&mapper, "demo$P", row, "x").as_deref(), Some("int(9)"));
    }

    #[test]
    fn test_defaults_fill_unset_fields() {
        let mapper = Mapper::open_in_memory().unwrap();
        let class = ClassDef::builder("demo", "D").field("name", "anon").build();
        let row = mapper.save(&Object::new(&class).value()).unwrap();
        assert_eq!(
            attr_text(&mapper, "demo$D", row, "name").as_deref(),
            Some("text(\"anon\")")
        );
    }

    #[test]
    fn test_base_slices_share_origin() {
        let mapper = Mapper::open_in_memory().unwrap();
        let a = ClassDef::builder("demo", "A").field("a", 1i64).build();
        let c = ClassDef::builder("demo", "C").base(&a).field("nc", 2i64).build();
        let obj = Object::new(&c);
        obj.set("a", 10i64);
        let row = mapper.save(&obj.value()).unwrap();

        let slice: i64 = mapper
            .store()
            .conn()
            .unwrap()
            .query_row(
                "SELECT \"BASE_REF$demo$A\" FROM \"demo$C\" WHERE ID = ?1",
                params![row],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(
            mapper.store().row_for_origin("demo$A", obj.identity().as_i64()).unwrap(),
            Some(slice)
        );
        assert_eq!(attr_text(&mapper, "demo$A", slice, "a").as_deref(), Some("int(10)"));
    }

    #[test]
    fn test_shared_sub_object_saved_once() {
        let mapper = Mapper::open_in_memory().unwrap();
        let leaf = ClassDef::builder("demo", "Leaf").field("v", 0i64).build();
        let pair = ClassDef::builder("demo", "Pair")
            .field("left", Value::Null)
            .field("right", Value::Null)
            .build();
        let shared = Object::new(&leaf);
        let p = Object::new(&pair);
        p.set("left", shared.value());
        p.set("right", shared.value());
        let row = mapper.save(&p.value()).unwrap();

        assert_eq!(mapper.store().row_count("demo$Leaf").unwrap(), 2);
        assert_eq!(
            attr_text(&mapper, "demo$Pair", row, "left"),
            attr_text(&mapper, "demo$Pair", row, "right")
        );
    }

    #[test]
    fn test_cycle_terminates_with_consistent_refs() {
        let mapper = Mapper::open_in_memory().unwrap();
        let node = ClassDef::builder("demo", "Node").field("next", Value::Null).build();
        let a = Object::new(&node);
        let b = Object::new(&node);
        a.set("next", b.value());
        b.set("next", a.value());

        let row_a = mapper.save(&a.value()).unwrap();
        let row_b = mapper
            .store()
            .row_for_origin("demo$Node", b.identity().as_i64())
            .unwrap()
            .unwrap();
        assert_eq!(mapper.store().row_count("demo$Node").unwrap(), 3);
        assert_eq!(
            attr_text(&mapper, "demo$Node", row_a, "next"),
            Some(format!("ASSOCIATION_REF$demo$Node${}", row_b))
        );
        assert_eq!(
            attr_text(&mapper, "demo$Node", row_b, "next"),
            Some(format!("ASSOCIATION_REF$demo$Node${}", row_a))
        );
    }

    #[test]
    fn test_self_reference() {
        let mapper = Mapper::open_in_memory().unwrap();
        let node = ClassDef::builder("demo", "Loop").field("me", Value::Null).build();
        let a = Object::new(&node);
        a.set("me", a.value());
        let row = mapper.save(&a.value()).unwrap();
        assert_eq!(mapper.store().row_count("demo$Loop").unwrap(), 2);
        assert_eq!(
            attr_text(&mapper, "demo$Loop", row, "me"),
            Some(format!("ASSOCIATION_REF$demo$Loop${}", row))
        );
    }

    #[test]
    fn test_container_with_composite_rejected() {
        let mapper = Mapper::open_in_memory().unwrap();
        let leaf = ClassDef::builder("demo", "Leaf").field("v", 0i64).build();
        let bag = ClassDef::builder("demo", "Bag").field("items", Value::List(vec![])).build();
        let b = Object::new(&bag);
        b.set("items", Value::List(vec![Object::new(&leaf).value()]));
        assert!(matches!(
            mapper.save(&b.value()),
            Err(MapperError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_undeclared_attribute_not_stored() {
        let mapper = Mapper::open_in_memory().unwrap();
        let class = ClassDef::builder("demo", "U").field("a", 0i64).build();
        let u = Object::new(&class);
        u.set("stray", 1i64);
        mapper.save(&u.value()).unwrap();
        let names: Vec<_> = mapper
            .store()
            .columns("demo$U")
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert!(!names.iter().any(|n| n.contains("stray")));
    }

    #[test]
    fn test_opaque_object_saved_in_class_table() {
        let mapper = Mapper::open_in_memory().unwrap();
        let marker = ClassDef::builder("demo", "Marker").method("ping", "fn ping() {}").build();
        let m = Object::new(&marker);
        let row = mapper.save(&m.value()).unwrap();
        assert_eq!(row, 2);
        assert_eq!(mapper.save(&m.value()).unwrap(), 2);
    }

    // ==========================================================================
    // Explicit ids
    // ==========================================================================

    #[test]
    fn test_save_with_explicit_id_moves_row() {
        let mapper = Mapper::open_in_memory().unwrap();
        let class = ClassDef::builder("demo", "X").field("v", 0i64).build();
        let x = Object::new(&class);
        assert_eq!(mapper.save_with_explicit_id(&x.value(), 10).unwrap(), 10);
        assert_eq!(
            mapper.store().row_for_origin("demo$X", x.identity().as_i64()).unwrap(),
            Some(10)
        );
        assert_eq!(mapper.store().row_count("demo$X").unwrap(), 2);
        assert_eq!(mapper.save(&x.value()).unwrap(), 10);
    }

    #[test]
    fn test_save_with_explicit_id_overwrites_other_value() {
        let mapper = Mapper::open_in_memory().unwrap();
        let first = mapper.save(&Value::Int(1)).unwrap();
        mapper.save_with_explicit_id(&Value::Int(2), first).unwrap();
        assert_eq!(mapper.store().row_count("builtins$int").unwrap(), 1);
        let text: String = mapper
            .store()
            .conn()
            .unwrap()
            .query_row("SELECT value FROM \"builtins$int\" WHERE ID = ?1", params![first], |r| r.get(0))
            .unwrap();
        assert_eq!(text, "int(2)");
    }

    #[test]
    fn test_save_with_explicit_id_evicts_occupant_with_slices() {
        let mapper = Mapper::open_in_memory().unwrap();
        let leaf = ClassDef::builder("demo", "Leaf").field("v", 0i64).build();
        let base = ClassDef::builder("demo", "Base").field("a", 0i64).build();
        let derived = ClassDef::builder("demo", "Derived")
            .base(&base)
            .field("leaf", Value::Null)
            .build();

        let occupant = Object::new(&derived);
        occupant.set("leaf", Object::new(&leaf).value());
        let target = mapper.save(&occupant.value()).unwrap();
        let mover = Object::new(&derived);
        mover.set("a", 7i64);
        let from = mapper.save(&mover.value()).unwrap();
        assert_ne!(from, target);

        assert_eq!(mapper.save_with_explicit_id(&mover.value(), target).unwrap(), target);

        // Sentinel plus the mover in each table; the occupant's base slice
        // and its leaf are gone.
        assert_eq!(mapper.store().row_count("demo$Derived").unwrap(), 2);
        assert_eq!(mapper.store().row_count("demo$Base").unwrap(), 2);
        assert_eq!(mapper.store().row_count("demo$Leaf").unwrap(), 1);
        assert_eq!(
            mapper.store().row_for_origin("demo$Derived", mover.identity().as_i64()).unwrap(),
            Some(target)
        );
        assert!(mapper
            .store()
            .row_for_origin("demo$Base", occupant.identity().as_i64())
            .unwrap()
            .is_none());
        assert_eq!(
            attr_text(&mapper, "demo$Base", from, "a").as_deref(),
            Some("int(7)")
        );
    }

    #[test]
    fn test_save_with_explicit_id_rejects_sentinel_and_non_positive() {
        let mapper = Mapper::open_in_memory().unwrap();
        let class = ClassDef::builder("demo", "X").field("v", 0i64).build();
        let x = Object::new(&class);
        assert!(matches!(
            mapper.save_with_explicit_id(&x.value(), 1),
            Err(MapperError::InvalidArgument(_))
        ));
        assert!(matches!(
            mapper.save_with_explicit_id(&Value::Int(1), 0),
            Err(MapperError::InvalidArgument(_))
        ));
    }
}
