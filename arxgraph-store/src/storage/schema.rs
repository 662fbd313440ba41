//! Database schema definitions for arxgraph.
//!
//! Nodes and relationships have no primary key: a full replace deletes and
//! re-inserts the same keys inside one transaction, which DuckDB rejects for
//! unique indexes. Key uniqueness is enforced by the session instead.

/// SQL schema for creating the arxgraph tables.
pub const SCHEMA_SQL: &str = r#"
-- Nodes table: real and virtual graph nodes
CREATE TABLE IF NOT EXISTS nodes (
    node_key VARCHAR NOT NULL,
    kind VARCHAR NOT NULL,
    label VARCHAR NOT NULL,
    name VARCHAR,
    path VARCHAR,
    properties VARCHAR NOT NULL
);

-- Relationships table: containment and reference edges
CREATE TABLE IF NOT EXISTS relationships (
    source_key VARCHAR NOT NULL,
    source_kind VARCHAR NOT NULL,
    target_key VARCHAR NOT NULL,
    target_kind VARCHAR NOT NULL,
    type VARCHAR NOT NULL,
    properties VARCHAR
);

-- Import records: one per successful import batch
CREATE TABLE IF NOT EXISTS import_records (
    id VARCHAR NOT NULL,
    sources VARCHAR NOT NULL,
    imported_at VARCHAR NOT NULL,
    node_count BIGINT NOT NULL,
    relationship_count BIGINT NOT NULL,
    virtual_node_count BIGINT NOT NULL,
    unresolved_count BIGINT NOT NULL
);

-- Metadata table: schema version
CREATE TABLE IF NOT EXISTS metadata (
    key VARCHAR PRIMARY KEY,
    value VARCHAR
);
"#;

/// Schema version stored in the metadata table.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// A lookup index the store keeps on its tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static str,
}

impl IndexSpec {
    pub fn create_sql(&self) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {}({})",
            self.name, self.table, self.columns
        )
    }
}

/// Indexes for key lookups during upserts and for common queries.
pub const INDEXES: &[IndexSpec] = &[
    IndexSpec { name: "idx_nodes_key", table: "nodes", columns: "node_key" },
    IndexSpec { name: "idx_nodes_label", table: "nodes", columns: "label" },
    IndexSpec { name: "idx_nodes_path", table: "nodes", columns: "path" },
    IndexSpec { name: "idx_relationships_source", table: "relationships", columns: "source_key" },
    IndexSpec { name: "idx_relationships_target", table: "relationships", columns: "target_key" },
    IndexSpec { name: "idx_relationships_type", table: "relationships", columns: "type" },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_names_unique() {
        let mut names: Vec<_> = INDEXES.iter().map(|i| i.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), INDEXES.len());
    }

    #[test]
    fn test_create_sql() {
        assert_eq!(
            INDEXES[0].create_sql(),
            "CREATE INDEX IF NOT EXISTS idx_nodes_key ON nodes(node_key)"
        );
    }
}
