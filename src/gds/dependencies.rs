//! Direct and transitive dependency queries

use super::rawcell::{Dependency, RawCell, RawCellMap};
use std::collections::HashSet;
use std::rc::Rc;

impl RawCell {
    /// Cells referenced by this cell, keyed by name.
    ///
    /// With `recursive`, the whole reference closure is returned; each cell
    /// appears once, in depth-first post-order of the edges.
    pub fn dependencies(&self, recursive: bool) -> RawCellMap {
        let mut result = RawCellMap::new();
        self.collect_dependencies(recursive, &mut result);
        result
    }

    /// Accumulate dependencies into `result`, skipping cells already in it
    pub fn collect_dependencies(&self, recursive: bool, result: &mut RawCellMap) {
        let mut visiting = HashSet::new();
        visiting.insert(self.name.clone());
        self.walk_dependencies(recursive, result, &mut visiting);
    }

    fn walk_dependencies(&self, recursive: bool, result: &mut RawCellMap, visiting: &mut HashSet<String>) {
        for cell in self.dependencies.iter().filter_map(Dependency::resolved) {
            let name = cell.borrow().name.clone();
            if recursive {
                let seen = result.get(&name).is_some_and(|known| Rc::ptr_eq(known, &cell));
                // `visiting` holds the cells on the current path
                if !seen && visiting.insert(name.clone()) {
                    cell.borrow().walk_dependencies(true, result, visiting);
                    visiting.remove(&name);
                }
            }
            result.insert(name, cell);
        }
    }
}
