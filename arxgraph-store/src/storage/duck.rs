//! DuckStore - DuckDB-based storage for the extracted graph.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use duckdb::{params, Config, Connection};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use arxgraph_core::{Extraction, GraphNode, ImportRecord, NodeKey, Properties, Relationship};

use super::schema::{INDEXES, SCHEMA_SQL, SCHEMA_VERSION};
use super::{merge_properties, GraphStore, StoreSession};

/// Database access mode for concurrent access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Read-write mode (exclusive lock, for imports)
    #[default]
    ReadWrite,
    /// Read-only mode (shared access, for stats and graph loading)
    ReadOnly,
}

/// DuckStore - DuckDB-based storage for the property graph.
pub struct DuckStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl DuckStore {
    /// Open or create a database file in read-write mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_mode(path, AccessMode::ReadWrite)
    }

    /// Open an existing database file in read-only mode.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_mode(path, AccessMode::ReadOnly)
    }

    /// Open a database file with the specified access mode.
    pub fn open_with_mode(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self> {
        let path = path.as_ref();

        let conn = match mode {
            AccessMode::ReadWrite => Connection::open(path)
                .with_context(|| format!("Failed to open database: {:?}", path))?,
            AccessMode::ReadOnly => {
                let config = Config::default()
                    .access_mode(duckdb::AccessMode::ReadOnly)
                    .map_err(|e| anyhow::anyhow!("Failed to set read-only mode: {}", e))?;
                Connection::open_with_flags(path, config).with_context(|| {
                    format!("Failed to open database in read-only mode: {:?}", path)
                })?
            }
        };

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };

        if mode == AccessMode::ReadWrite {
            store.init_schema()?;
        }

        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Database file, if the store is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Acquire the database connection lock, handling PoisonError gracefully.
    /// If the mutex is poisoned (previous holder panicked), we still acquire
    /// the lock and continue. An open transaction of the panicked holder was
    /// rolled back when its session dropped.
    fn acquire_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        match self.conn.lock() {
            Ok(guard) => Ok(guard),
            Err(poisoned) => {
                warn!("Recovering from poisoned database mutex");
                Ok(poisoned.into_inner())
            }
        }
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.acquire_conn()?;

        let existing_version = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                [],
                |row| row.get::<_, String>(0),
            )
            .ok();

        if let Some(version) = existing_version.filter(|v| v != SCHEMA_VERSION) {
            anyhow::bail!(
                "Database schema version {} is incompatible with {}.\n\
                 Please delete the database file and import again.",
                version,
                SCHEMA_VERSION
            );
        }

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize schema")?;

        for index in INDEXES {
            conn.execute_batch(&index.create_sql())
                .with_context(|| format!("Failed to create index {}", index.name))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)",
            params![SCHEMA_VERSION],
        )
        .context("Failed to set schema version")?;

        Ok(())
    }

    /// Get graph statistics.
    pub fn stats(&self) -> Result<GraphStats> {
        let conn = self.acquire_conn()?;

        let node_count: usize = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE kind = 'real'",
            [],
            |row| row.get(0),
        )?;
        let virtual_node_count: usize = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE kind = 'virtual'",
            [],
            |row| row.get(0),
        )?;
        let relationship_count: usize =
            conn.query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))?;

        let label_counts = grouped_counts(&conn, "SELECT label, COUNT(*) FROM nodes GROUP BY label")?;
        let type_counts =
            grouped_counts(&conn, "SELECT type, COUNT(*) FROM relationships GROUP BY type")?;

        let last_import = latest_import_record(&conn)?;

        Ok(GraphStats {
            node_count,
            virtual_node_count,
            relationship_count,
            label_counts,
            type_counts,
            last_import,
        })
    }

    /// Load the stored graph back into memory.
    ///
    /// Nodes come back ordered by label then key. The unresolved list is
    /// always empty: it is reported at import time, not persisted.
    pub fn load_graph(&self) -> Result<Extraction> {
        let conn = self.acquire_conn()?;
        let mut extraction = Extraction::default();

        let mut stmt =
            conn.prepare("SELECT node_key, kind, label, properties FROM nodes ORDER BY label, node_key")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let kind: String = row.get(1)?;
            let properties: String = row.get(3)?;

            let node = GraphNode {
                key: stored_key(&kind, key)?,
                label: row.get(2)?,
                properties: parse_properties(&properties)?,
            };
            if node.is_virtual() {
                extraction.virtual_nodes.push(node);
            } else {
                extraction.nodes.push(node);
            }
        }

        let mut stmt = conn.prepare(
            "SELECT source_key, source_kind, target_key, target_kind, type, properties
             FROM relationships ORDER BY type, source_key, target_key",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let source_kind: String = row.get(1)?;
            let target_kind: String = row.get(3)?;
            let properties: Option<String> = row.get(5)?;

            extraction.relationships.push(Relationship {
                rel_type: row.get(4)?,
                from: stored_key(&source_kind, row.get::<_, String>(0)?)?,
                to: stored_key(&target_kind, row.get::<_, String>(2)?)?,
                properties: properties
                    .as_deref()
                    .map(parse_properties)
                    .transpose()?
                    .unwrap_or_default(),
            });
        }

        Ok(extraction)
    }
}

impl GraphStore for DuckStore {
    type Session<'a> = DuckSession<'a>;

    fn begin(&self) -> Result<DuckSession<'_>> {
        let conn = self.acquire_conn()?;
        conn.execute_batch("BEGIN TRANSACTION")
            .context("Failed to begin transaction")?;
        debug!("Transaction started");
        Ok(DuckSession {
            conn,
            finished: false,
        })
    }
}

/// One DuckDB transaction. Holds the connection lock until dropped.
pub struct DuckSession<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl DuckSession<'_> {
    fn node_exists(&self, key: &NodeKey) -> Result<bool> {
        let count: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE kind = ? AND node_key = ?",
            params![key.kind(), key.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

impl StoreSession for DuckSession<'_> {
    fn clear_all(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                "DELETE FROM relationships;
                 DELETE FROM nodes;
                 DELETE FROM import_records;",
            )
            .context("Failed to clear graph")?;
        debug!("Cleared all graph data");
        Ok(())
    }

    fn ensure_indexes(&mut self) -> Result<()> {
        let mut existing = HashSet::new();
        {
            let mut stmt = self.conn.prepare("SELECT index_name FROM duckdb_indexes()")?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                existing.insert(row.get::<_, String>(0)?);
            }
        }

        for index in INDEXES.iter().filter(|i| !existing.contains(i.name)) {
            warn!(index = index.name, "Recreating missing index");
            self.conn
                .execute_batch(&index.create_sql())
                .with_context(|| format!("Failed to create index {}", index.name))?;
        }
        Ok(())
    }

    fn upsert_nodes(&mut self, label: &str, nodes: &[GraphNode]) -> Result<usize> {
        // Merge repeated keys within the batch first.
        let mut batch: Vec<GraphNode> = Vec::with_capacity(nodes.len());
        let mut slots: HashMap<&NodeKey, usize> = HashMap::with_capacity(nodes.len());
        for node in nodes {
            match slots.get(&node.key) {
                Some(&slot) => merge_properties(&mut batch[slot].properties, &node.properties),
                None => {
                    slots.insert(&node.key, batch.len());
                    batch.push(node.clone());
                }
            }
        }

        let mut updated = Vec::new();
        {
            let mut select = self
                .conn
                .prepare("SELECT properties FROM nodes WHERE kind = ? AND node_key = ?")?;
            for node in batch.iter_mut() {
                let mut rows = select.query(params![node.key.kind(), node.key.as_str()])?;
                if let Some(row) = rows.next()? {
                    let stored: String = row.get(0)?;
                    let mut merged = parse_properties(&stored)?;
                    merge_properties(&mut merged, &node.properties);
                    node.properties = merged;
                    updated.push(node.key.clone());
                }
            }
        }

        if !updated.is_empty() {
            let mut delete = self
                .conn
                .prepare("DELETE FROM nodes WHERE kind = ? AND node_key = ?")?;
            for key in &updated {
                delete.execute(params![key.kind(), key.as_str()])?;
            }
        }

        {
            let mut appender = self
                .conn
                .appender("nodes")
                .context("Failed to create node appender")?;
            for node in &batch {
                let properties = serde_json::to_string(&node.properties)
                    .context("Failed to serialize node properties")?;
                appender.append_row(params![
                    node.key.as_str(),
                    node.key.kind(),
                    node.label,
                    node.name(),
                    node.path(),
                    properties,
                ])?;
            }
            appender.flush()?;
        }

        debug!(
            label,
            created = batch.len() - updated.len(),
            updated = updated.len(),
            "Upserted nodes"
        );
        Ok(batch.len())
    }

    fn upsert_relationships(&mut self, rel_type: &str, relationships: &[Relationship]) -> Result<usize> {
        let mut known: HashMap<NodeKey, bool> = HashMap::new();
        let mut batch: Vec<Relationship> = Vec::with_capacity(relationships.len());
        let mut slots: HashMap<(&NodeKey, &NodeKey, &str), usize> = HashMap::new();
        let mut skipped = 0;

        for relationship in relationships {
            let mut present = true;
            for key in [&relationship.from, &relationship.to] {
                let exists = match known.get(key) {
                    Some(&exists) => exists,
                    None => {
                        let exists = self.node_exists(key)?;
                        known.insert(key.clone(), exists);
                        exists
                    }
                };
                present &= exists;
            }
            if !present {
                debug!(
                    rel_type = %relationship.rel_type,
                    from = %relationship.from,
                    to = %relationship.to,
                    "Relationship endpoint missing, skipping"
                );
                skipped += 1;
                continue;
            }

            let identity = (
                &relationship.from,
                &relationship.to,
                relationship.rel_type.as_str(),
            );
            match slots.get(&identity) {
                Some(&slot) => merge_properties(&mut batch[slot].properties, &relationship.properties),
                None => {
                    slots.insert(identity, batch.len());
                    batch.push(relationship.clone());
                }
            }
        }

        let mut updated = 0;
        {
            let mut select = self.conn.prepare(
                "SELECT properties FROM relationships
                 WHERE source_kind = ? AND source_key = ? AND target_kind = ? AND target_key = ? AND type = ?",
            )?;
            let mut delete = self.conn.prepare(
                "DELETE FROM relationships
                 WHERE source_kind = ? AND source_key = ? AND target_kind = ? AND target_key = ? AND type = ?",
            )?;
            for relationship in batch.iter_mut() {
                let identity = params![
                    relationship.from.kind(),
                    relationship.from.as_str(),
                    relationship.to.kind(),
                    relationship.to.as_str(),
                    relationship.rel_type,
                ];
                let stored: Option<Option<String>> = {
                    let mut rows = select.query(identity)?;
                    match rows.next()? {
                        Some(row) => Some(row.get(0)?),
                        None => None,
                    }
                };
                if let Some(stored) = stored {
                    let mut merged = stored
                        .as_deref()
                        .map(parse_properties)
                        .transpose()?
                        .unwrap_or_default();
                    merge_properties(&mut merged, &relationship.properties);
                    relationship.properties = merged;
                    delete.execute(identity)?;
                    updated += 1;
                }
            }
        }

        {
            let mut appender = self
                .conn
                .appender("relationships")
                .context("Failed to create relationship appender")?;
            for relationship in &batch {
                let properties = serde_json::to_string(&relationship.properties)
                    .context("Failed to serialize relationship properties")?;
                appender.append_row(params![
                    relationship.from.as_str(),
                    relationship.from.kind(),
                    relationship.to.as_str(),
                    relationship.to.kind(),
                    relationship.rel_type,
                    properties,
                ])?;
            }
            appender.flush()?;
        }

        debug!(
            rel_type,
            written = batch.len(),
            updated,
            skipped,
            "Upserted relationships"
        );
        Ok(batch.len())
    }

    fn write_import_record(&mut self, record: &ImportRecord) -> Result<()> {
        let sources =
            serde_json::to_string(&record.sources).context("Failed to serialize import sources")?;
        self.conn
            .execute(
                r#"INSERT INTO import_records
                   (id, sources, imported_at, node_count, relationship_count, virtual_node_count, unresolved_count)
                   VALUES (?, ?, ?, ?, ?, ?, ?)"#,
                params![
                    record.id,
                    sources,
                    record.imported_at.to_rfc3339(),
                    record.node_count as i64,
                    record.relationship_count as i64,
                    record.virtual_node_count as i64,
                    record.unresolved_count as i64,
                ],
            )
            .with_context(|| format!("Failed to write import record {}", record.id))?;
        Ok(())
    }

    fn commit(mut self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .context("Failed to commit transaction")?;
        self.finished = true;
        info!("Transaction committed");
        Ok(())
    }
}

impl Drop for DuckSession<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => warn!("Transaction rolled back"),
            Err(e) => warn!("Failed to roll back transaction: {}", e),
        }
    }
}

/// Statistics about the stored graph.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub virtual_node_count: usize,
    pub relationship_count: usize,
    pub label_counts: BTreeMap<String, usize>,
    pub type_counts: BTreeMap<String, usize>,
    pub last_import: Option<ImportRecord>,
}

fn grouped_counts(conn: &Connection, sql: &str) -> Result<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let count: usize = row.get(1)?;
        counts.insert(name, count);
    }
    Ok(counts)
}

fn latest_import_record(conn: &Connection) -> Result<Option<ImportRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, sources, imported_at, node_count, relationship_count, virtual_node_count, unresolved_count
         FROM import_records ORDER BY imported_at DESC LIMIT 1",
    )?;
    let mut rows = stmt.query([])?;

    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let sources: String = row.get(1)?;
    let imported_at: String = row.get(2)?;
    let count = |i: usize| -> Result<usize> {
        let value: i64 = row.get(i)?;
        Ok(usize::try_from(value).unwrap_or_default())
    };

    Ok(Some(ImportRecord {
        id: row.get(0)?,
        sources: serde_json::from_str(&sources).context("Corrupt import sources")?,
        imported_at: DateTime::parse_from_rfc3339(&imported_at)
            .context("Corrupt import timestamp")?
            .with_timezone(&Utc),
        node_count: count(3)?,
        relationship_count: count(4)?,
        virtual_node_count: count(5)?,
        unresolved_count: count(6)?,
    }))
}

fn stored_key(kind: &str, key: String) -> Result<NodeKey> {
    NodeKey::from_parts(kind, key).with_context(|| format!("Unknown node kind in store: {}", kind))
}

fn parse_properties(raw: &str) -> Result<Properties> {
    serde_json::from_str(raw).context("Corrupt properties JSON")
}
