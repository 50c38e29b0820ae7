//! Whole class trees: save or drop a class and everything derived from it.

use std::collections::HashSet;
use std::rc::Rc;

use tracing::info;

use crate::core::class::ClassDef;
use crate::error::{MapperError, Result};
use crate::mapper::Mapper;

/// Classes of the tree rooted at `root`, pre-order.
///
/// Each class appears once even when reachable through several bases. A class
/// met again on the current path is a cycle.
pub fn walk(root: &Rc<ClassDef>) -> Result<Vec<Rc<ClassDef>>> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut path = Vec::new();
    visit(root, &mut order, &mut seen, &mut path)?;
    Ok(order)
}

fn visit(
    class: &Rc<ClassDef>,
    order: &mut Vec<Rc<ClassDef>>,
    seen: &mut HashSet<*const ClassDef>,
    path: &mut Vec<*const ClassDef>,
) -> Result<()> {
    let key = Rc::as_ptr(class);
    if path.contains(&key) {
        return Err(MapperError::HierarchyCycle(class.table_name()));
    }
    if !seen.insert(key) {
        return Ok(());
    }
    order.push(Rc::clone(class));
    path.push(key);
    for sub in class.subclasses() {
        visit(&sub, order, seen, path)?;
    }
    path.pop();
    Ok(())
}

impl Mapper {
    /// Ensure the table of `root` and of every class derived from it.
    /// Returns the tables in visiting order.
    pub fn save_hierarchy(&self, root: &Rc<ClassDef>) -> Result<Vec<String>> {
        let classes = walk(root)?;
        let mut tables = Vec::with_capacity(classes.len());
        for class in &classes {
            tables.push(self.save_class(class)?);
        }
        info!("Saved hierarchy of {} ({} classes)", root.table_name(), tables.len());
        Ok(tables)
    }

    /// Drop the table of `root` and of every class derived from it.
    /// Returns the tables in visiting order.
    pub fn delete_hierarchy(&self, root: &Rc<ClassDef>, cascade: bool) -> Result<Vec<String>> {
        let classes = walk(root)?;
        let mut tables = Vec::with_capacity(classes.len());
        for class in &classes {
            self.delete_class(class, cascade)?;
            tables.push(class.table_name());
        }
        info!("Deleted hierarchy of {} ({} classes)", root.table_name(), tables.len());
        Ok(tables)
    }
}
