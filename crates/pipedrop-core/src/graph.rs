use std::collections::{BTreeMap, BTreeSet};

use crate::schema::{Schema, Table};

/// Parent to children index built once from a schema.
#[derive(Debug, Clone)]
pub struct TableTree<'s> {
    schema: &'s Schema,
    children: BTreeMap<&'s str, Vec<&'s str>>,
}

impl<'s> TableTree<'s> {
    pub fn build(schema: &'s Schema) -> Self {
        let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for table in schema.tables.values() {
            if let Some(parent) = table.parent.as_deref() {
                children.entry(parent).or_default().push(table.name.as_str());
            }
        }
        Self { schema, children }
    }

    /// Direct children of `name`, ordered by table name.
    pub fn children(&self, name: &str) -> &[&'s str] {
        self.children.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The table and all of its descendants, each parent before its children.
    pub fn subtree(&self, name: &str) -> Vec<&'s Table> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![name];

        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(table) = self.schema.tables.get(current) else {
                continue;
            };
            out.push(table);
            // reversed so that the first child is visited first
            for child in self.children(current).iter().rev() {
                stack.push(*child);
            }
        }

        out
    }
}

/// Group tables by owning resource, keeping only resources accepted by `matches`.
///
/// Each group lists root tables followed by their descendants, parents first.
/// Resources without tables are never present in the result.
pub fn group_tables_by_resource<F>(schema: &Schema, matches: F) -> BTreeMap<String, Vec<Table>>
where
    F: Fn(&str) -> bool,
{
    let tree = TableTree::build(schema);
    let mut groups: BTreeMap<String, Vec<Table>> = BTreeMap::new();

    for table in schema.tables.values().filter(|table| table.is_root()) {
        let Some(resource) = table.resource.as_deref() else {
            continue;
        };
        if !matches(resource) {
            continue;
        }
        groups
            .entry(resource.to_string())
            .or_default()
            .extend(tree.subtree(&table.name).into_iter().cloned());
    }

    groups
}

/// Tables caught in a parent cycle, or `None` when every chain ends at a root.
pub fn find_parent_cycle(schema: &Schema) -> Option<Vec<String>> {
    toposort(&build_adjacency(schema)).err()
}

fn build_adjacency(schema: &Schema) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for table in schema.tables.values() {
        graph.entry(table.name.clone()).or_default();
        if let Some(parent) = &table.parent {
            graph
                .entry(parent.clone())
                .or_default()
                .insert(table.name.clone());
        }
    }

    graph
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<&str, usize> =
        graph.keys().map(|node| (node.as_str(), 0)).collect();
    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.as_str()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| *node)
        .collect();
    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());
        if let Some(targets) = graph.get(node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target.as_str()) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.as_str());
                    }
                }
            }
        }
    }

    if order.len() == indegree.len() {
        Ok(order)
    } else {
        Err(indegree
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(node, _)| node.to_string())
            .collect())
    }
}
