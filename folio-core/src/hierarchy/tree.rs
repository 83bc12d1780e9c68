//! Four-level asset-class hierarchy.
//!
//! Two table shapes build the same recursive tree:
//! - instrument hierarchy: `level1_asset_class .. level4_instrument` plus
//!   `instrument_type`; each row adds one instrument leaf under its level4 label
//! - node hierarchy: `level1 .. level4` plus a unique `node_id`; each row adds
//!   one node leaf

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::table::{Table, ValidationError};

pub const INSTRUMENT_HIERARCHY_COLUMNS: [&str; 5] = [
    "level1_asset_class",
    "level2_sub_asset_class",
    "level3_strategy_style",
    "level4_instrument",
    "instrument_type",
];

pub const NODE_HIERARCHY_COLUMNS: [&str; 5] = ["level1", "level2", "level3", "level4", "node_id"];

/// A leaf beneath a level4 label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Leaf {
    Instrument {
        ticker: String,
        instrument_type: String,
    },
    Node(String),
}

/// One tree node: either more labelled levels or the leaves under a level4 label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HierarchyNode {
    Branch(BTreeMap<String, HierarchyNode>),
    Leaves(Vec<Leaf>),
}

/// The labelled level1 children of the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Hierarchy {
    pub roots: BTreeMap<String, HierarchyNode>,
}

impl Hierarchy {
    /// Build from an instrument hierarchy table.
    ///
    /// Only `level1_asset_class` and `level4_instrument` must be non-blank. The
    /// level4 label is the instrument ticker.
    pub fn from_instrument_table(table: &Table) -> Result<Self, ValidationError> {
        table.require_columns(&INSTRUMENT_HIERARCHY_COLUMNS)?;
        table.require_rows()?;
        table.require_non_blank(&["level1_asset_class", "level4_instrument"])?;

        let mut hierarchy = Hierarchy::default();
        for row in 0..table.len() {
            let path: Vec<&str> = INSTRUMENT_HIERARCHY_COLUMNS[..4]
                .iter()
                .map(|c| table.cell(row, c))
                .collect();
            let leaf = Leaf::Instrument {
                ticker: path[3].to_string(),
                instrument_type: table.cell(row, "instrument_type").to_string(),
            };
            insert(&mut hierarchy.roots, &path, leaf);
        }
        Ok(hierarchy)
    }

    /// Build from a node hierarchy table. Every column must be non-blank and
    /// `node_id` unique across the whole table.
    pub fn from_node_table(table: &Table) -> Result<Self, ValidationError> {
        table.require_columns(&NODE_HIERARCHY_COLUMNS)?;
        table.require_rows()?;
        table.require_non_blank(&NODE_HIERARCHY_COLUMNS)?;
        table.require_unique("node_id")?;

        let mut hierarchy = Hierarchy::default();
        for row in 0..table.len() {
            let path: Vec<&str> = NODE_HIERARCHY_COLUMNS[..4]
                .iter()
                .map(|c| table.cell(row, c))
                .collect();
            let leaf = Leaf::Node(table.cell(row, "node_id").to_string());
            insert(&mut hierarchy.roots, &path, leaf);
        }
        Ok(hierarchy)
    }

    /// Every node_id leaf in the tree.
    pub fn node_ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        collect_leaves(&self.roots, &mut |leaf: &Leaf| {
            if let Leaf::Node(id) = leaf {
                ids.insert(id.clone());
            }
        });
        ids
    }

    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        collect_leaves(&self.roots, &mut |_: &Leaf| count += 1);
        count
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

fn insert(children: &mut BTreeMap<String, HierarchyNode>, path: &[&str], leaf: Leaf) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    let child = children.entry(head.to_string()).or_insert_with(|| {
        if rest.is_empty() {
            HierarchyNode::Leaves(Vec::new())
        } else {
            HierarchyNode::Branch(BTreeMap::new())
        }
    });
    match child {
        HierarchyNode::Branch(grandchildren) => insert(grandchildren, rest, leaf),
        HierarchyNode::Leaves(leaves) => leaves.push(leaf),
    }
}

fn collect_leaves(children: &BTreeMap<String, HierarchyNode>, visit: &mut dyn FnMut(&Leaf)) {
    for node in children.values() {
        match node {
            HierarchyNode::Branch(grandchildren) => collect_leaves(grandchildren, visit),
            HierarchyNode::Leaves(leaves) => leaves.iter().for_each(&mut *visit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_table(rows: &[&[&str]]) -> Table {
        Table::from_rows("hierarchy CSV", &NODE_HIERARCHY_COLUMNS, rows)
    }

    #[test]
    fn builds_instrument_tree() {
        let table = Table::from_rows(
            "hierarchy CSV",
            &INSTRUMENT_HIERARCHY_COLUMNS,
            &[
                &["Equity", "US", "Core", "SPY", "etf"],
                &["Equity", "US", "Core", "SPY", "future"],
                &["Bonds", "US", "Long", "TLT", "etf"],
            ],
        );
        let h = Hierarchy::from_instrument_table(&table).unwrap();
        assert_eq!(h.roots.len(), 2);
        assert_eq!(h.leaf_count(), 3);
    }

    #[test]
    fn instrument_tree_allows_blank_middle_levels() {
        let table = Table::from_rows(
            "hierarchy CSV",
            &INSTRUMENT_HIERARCHY_COLUMNS,
            &[&["Equity", "", "", "SPY", "etf"]],
        );
        assert!(Hierarchy::from_instrument_table(&table).is_ok());
    }

    #[test]
    fn instrument_tree_rejects_blank_level4() {
        let table = Table::from_rows(
            "hierarchy CSV",
            &INSTRUMENT_HIERARCHY_COLUMNS,
            &[&["Equity", "US", "Core", " ", "etf"]],
        );
        let err = Hierarchy::from_instrument_table(&table).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Malformed hierarchy CSV: column 'level4_instrument' contains blank values"
        );
    }

    #[test]
    fn node_tree_collects_ids() {
        let h = Hierarchy::from_node_table(&node_table(&[
            &["Equity", "US", "Core", "Large", "EQ_US"],
            &["Bonds", "US", "Govt", "Long", "BD_US"],
        ]))
        .unwrap();
        let ids: Vec<String> = h.node_ids().into_iter().collect();
        assert_eq!(ids, vec!["BD_US".to_string(), "EQ_US".to_string()]);
    }

    #[test]
    fn node_tree_rejects_duplicate_ids() {
        let err = Hierarchy::from_node_table(&node_table(&[
            &["Equity", "US", "Core", "Large", "X"],
            &["Bonds", "US", "Govt", "Long", "X"],
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("node_id must be unique"));
        assert!(err.to_string().contains("\"X\""));
    }

    #[test]
    fn node_tree_rejects_empty_table() {
        let err = Hierarchy::from_node_table(&node_table(&[])).unwrap_err();
        assert_eq!(err.to_string(), "Malformed hierarchy CSV: file contains no rows");
    }
}
