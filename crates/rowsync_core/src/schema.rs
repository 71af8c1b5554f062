//! Table introspection and the topological apply order.

use crate::error::{CoreError, CoreResult};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Columns managed by the engine on every mirrored table.
pub const SYSTEM_COLUMNS: [&str; 4] = ["id", "updated_at", "version", "deleted_at"];

/// Returns true if `column` is one of the engine-managed columns.
///
/// The distinction drives dirty-field suppression: a write that touches
/// only system columns is not a meaningful change.
pub fn is_system_column(column: &str) -> bool {
    SYSTEM_COLUMNS.contains(&column)
}

/// Description of one mirrored table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Domain column names (system columns are implicit).
    pub columns: Vec<String>,
    /// Foreign keys as `(column, target table)` pairs.
    pub fk_edges: Vec<(String, String)>,
}

impl TableDef {
    /// Creates a table description with no foreign keys.
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            fk_edges: Vec::new(),
        }
    }

    /// Declares that `column` references rows of `target`.
    pub fn with_fk(mut self, column: impl Into<String>, target: impl Into<String>) -> Self {
        self.fk_edges.push((column.into(), target.into()));
        self
    }
}

/// The set of mirrored tables and their apply order.
///
/// `apply_order` is a topological sort in which every foreign key's
/// target table precedes the referring table, so incoming changes can
/// be applied parents-first without constraint violations.
#[derive(Debug, Clone)]
pub struct Schema {
    tables: BTreeMap<String, TableDef>,
    apply_order: Vec<String>,
}

impl Schema {
    /// Builds a schema from table descriptions.
    ///
    /// Fails with [`CoreError::UnknownTable`] if a foreign key targets a
    /// table that is not part of the schema, and with
    /// [`CoreError::SchemaCycle`] naming the cycle if the foreign keys
    /// are not acyclic.
    pub fn build(defs: Vec<TableDef>) -> CoreResult<Self> {
        let tables: BTreeMap<String, TableDef> =
            defs.into_iter().map(|d| (d.name.clone(), d)).collect();

        for def in tables.values() {
            for (_, target) in &def.fk_edges {
                if !tables.contains_key(target) {
                    return Err(CoreError::UnknownTable(target.clone()));
                }
            }
        }

        let apply_order = topo_sort(&tables)?;
        Ok(Self {
            tables,
            apply_order,
        })
    }

    /// Tables in parents-first order.
    pub fn apply_order(&self) -> &[String] {
        &self.apply_order
    }

    /// Looks up a table description.
    pub fn table(&self, name: &str) -> CoreResult<&TableDef> {
        self.tables
            .get(name)
            .ok_or_else(|| CoreError::UnknownTable(name.to_string()))
    }

    /// Returns true if the schema knows the table.
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Iterates table names in lexicographic order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Foreign keys of a table, empty for unknown tables.
    pub fn fk_edges(&self, name: &str) -> &[(String, String)] {
        self.tables
            .get(name)
            .map(|d| d.fk_edges.as_slice())
            .unwrap_or(&[])
    }
}

/// Kahn's algorithm over the FK graph, parents before children.
fn topo_sort(tables: &BTreeMap<String, TableDef>) -> CoreResult<Vec<String>> {
    let parents: BTreeMap<&str, BTreeSet<&str>> = tables
        .iter()
        .map(|(name, def)| {
            let set = def
                .fk_edges
                .iter()
                .map(|(_, target)| target.as_str())
                .collect();
            (name.as_str(), set)
        })
        .collect();

    let mut indegree: BTreeMap<&str, usize> = parents
        .iter()
        .map(|(name, ps)| (*name, ps.len()))
        .collect();

    let mut queue: VecDeque<&str> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut order = Vec::with_capacity(tables.len());
    while let Some(table) = queue.pop_front() {
        order.push(table.to_string());
        for (&child, ps) in &parents {
            if ps.contains(table) {
                if let Some(d) = indegree.get_mut(child) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }
    }

    if order.len() != tables.len() {
        let remaining: BTreeSet<&str> = tables
            .keys()
            .map(String::as_str)
            .filter(|name| !order.iter().any(|o| o == name))
            .collect();
        return Err(CoreError::SchemaCycle {
            cycle: trace_cycle(&parents, &remaining),
        });
    }
    Ok(order)
}

/// Walks parent edges inside the unresolved set until a table repeats.
fn trace_cycle(
    parents: &BTreeMap<&str, BTreeSet<&str>>,
    remaining: &BTreeSet<&str>,
) -> Vec<String> {
    let Some(start) = remaining.iter().next().copied() else {
        return Vec::new();
    };
    let mut path = vec![start];
    let mut current = start;
    loop {
        let next = parents
            .get(current)
            .and_then(|ps| ps.iter().find(|p| remaining.contains(*p)).copied());
        let Some(next) = next else {
            // Unresolved tables always have an unresolved parent; report
            // the partial path if that invariant is somehow broken.
            return path.iter().map(|t| t.to_string()).collect();
        };
        if let Some(pos) = path.iter().position(|t| *t == next) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|t| t.to_string()).collect();
            cycle.push(next.to_string());
            return cycle;
        }
        path.push(next);
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_columns() {
        assert!(is_system_column("id"));
        assert!(is_system_column("updated_at"));
        assert!(is_system_column("version"));
        assert!(is_system_column("deleted_at"));
        assert!(!is_system_column("name"));
    }

    #[test]
    fn parents_precede_children() {
        let schema = Schema::build(vec![
            TableDef::new("orders", ["total", "customer_id"])
                .with_fk("customer_id", "customers"),
            TableDef::new("customers", ["name"]),
        ])
        .unwrap();

        let order = schema.apply_order();
        let customers = order.iter().position(|t| t == "customers").unwrap();
        let orders = order.iter().position(|t| t == "orders").unwrap();
        assert!(customers < orders);
    }

    #[test]
    fn diamond_dependencies() {
        let schema = Schema::build(vec![
            TableDef::new("a", ["x"]),
            TableDef::new("b", ["a_id"]).with_fk("a_id", "a"),
            TableDef::new("c", ["a_id"]).with_fk("a_id", "a"),
            TableDef::new("d", ["b_id", "c_id"])
                .with_fk("b_id", "b")
                .with_fk("c_id", "c"),
        ])
        .unwrap();

        let order = schema.apply_order();
        let pos = |t: &str| order.iter().position(|o| o == t).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn cycle_is_reported_with_its_members() {
        let err = Schema::build(vec![
            TableDef::new("invoices", ["order_id"]).with_fk("order_id", "orders"),
            TableDef::new("orders", ["invoice_id"]).with_fk("invoice_id", "invoices"),
            TableDef::new("customers", ["name"]),
        ])
        .unwrap_err();

        match err {
            CoreError::SchemaCycle { cycle } => {
                assert!(cycle.contains(&"orders".to_string()));
                assert!(cycle.contains(&"invoices".to_string()));
                assert_eq!(cycle.first(), cycle.last());
            }
            other => panic!("expected SchemaCycle, got {other:?}"),
        }
    }

    #[test]
    fn unknown_fk_target_is_rejected() {
        let err = Schema::build(vec![
            TableDef::new("orders", ["customer_id"]).with_fk("customer_id", "nowhere"),
        ])
        .unwrap_err();
        assert!(matches!(err, CoreError::UnknownTable(t) if t == "nowhere"));
    }

    #[test]
    fn table_lookup() {
        let schema = Schema::build(vec![TableDef::new("customers", ["name"])]).unwrap();
        assert!(schema.contains("customers"));
        assert!(schema.table("customers").is_ok());
        assert!(matches!(
            schema.table("orders"),
            Err(CoreError::UnknownTable(_))
        ));
    }
}
