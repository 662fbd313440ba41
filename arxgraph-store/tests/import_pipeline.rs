//! Import pipeline integration tests against an on-disk DuckDB store.
//!
//! Covers the full-replace contract:
//! - repeated imports of the same input produce the same graph
//! - a store failure mid-plan leaves the previous snapshot intact
//! - an empty merge is a successful no-op

use std::sync::Arc;

use anyhow::Result;
use arxgraph_core::{Element, ExtractConfig, GraphNode, ImportRecord, NodeKey, Relationship};
use arxgraph_store::storage::DuckSession;
use arxgraph_store::{DuckStore, GraphStore, ImportBatch, ImportError, ImportPipeline, StoreSession};
use serde_json::json;
use tempfile::{tempdir, TempDir};

// ============================================================================
// Fixtures
// ============================================================================

fn component_document(target: &str) -> Element {
    let document = json!({
        "AUTOSAR": { "AR-PACKAGES": { "AR-PACKAGE": {
            "$": { "UUID": "pkg1" },
            "SHORT-NAME": "Pkg1",
            "ELEMENTS": {
                "APPLICATION-SW-COMPONENT-TYPE": {
                    "$": { "UUID": "comp1" },
                    "SHORT-NAME": "Comp1",
                    "PORTS": { "P-PORT-PROTOTYPE": [
                        {
                            "$": { "UUID": "port1" },
                            "SHORT-NAME": "Port1",
                            "PROVIDED-INTERFACE-TREF": { "$": { "DEST": "SENDER-RECEIVER-INTERFACE" }, "_": target }
                        },
                        {
                            "$": { "UUID": "port2" },
                            "SHORT-NAME": "Port2",
                            "PROVIDED-INTERFACE-TREF": { "_": "/Pkg1/Missing/Y" }
                        }
                    ] }
                }
            }
        } } }
    });
    Element::from_document(&document).expect("fixture should be well-formed")
}

fn interface_document() -> Element {
    let document = json!({
        "AUTOSAR": { "AR-PACKAGES": { "AR-PACKAGE": {
            "$": { "UUID": "pkg2" },
            "SHORT-NAME": "Interfaces",
            "ELEMENTS": {
                "SENDER-RECEIVER-INTERFACE": { "$": { "UUID": "iface1" }, "SHORT-NAME": "IFace1" }
            }
        } } }
    });
    Element::from_document(&document).expect("fixture should be well-formed")
}

fn batch() -> ImportBatch {
    ImportBatch::new()
        .with_document("components.json", component_document("/Interfaces/IFace1"))
        .with_document("interfaces.json", interface_document())
}

fn open_store() -> (TempDir, DuckStore) {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = DuckStore::open(dir.path().join("graph.duckdb")).expect("Failed to open store");
    (dir, store)
}

// ============================================================================
// Full replace
// ============================================================================

#[tokio::test]
async fn test_import_persists_resolved_graph() {
    let (_dir, store) = open_store();
    let pipeline = ImportPipeline::new(store, ExtractConfig::default());

    let summary = pipeline.run(batch()).await.unwrap();
    assert!(summary.success);
    assert_eq!(summary.node_count, 6);
    assert_eq!(summary.unresolved_count, 1);
    assert_eq!(summary.unresolved[0].source_id, "port2");
    assert_eq!(summary.virtual_node_count, 2);

    let store = pipeline.store();
    let store = store.lock().await;
    let graph = store.load_graph().unwrap();
    assert_eq!(graph.nodes.len(), 6);
    assert_eq!(graph.virtual_nodes.len(), 2);
    assert!(graph.has_relationship(
        &NodeKey::real("port1"),
        &NodeKey::real("iface1"),
        "PROVIDED-INTERFACE-TREF"
    ));
    assert!(graph.has_relationship(
        &NodeKey::real("port2"),
        &NodeKey::virtual_path("/Pkg1/Missing/Y"),
        "PROVIDED-INTERFACE-TREF"
    ));
    assert!(graph.has_relationship(
        &NodeKey::real("pkg1"),
        &NodeKey::virtual_path("/Pkg1/Missing"),
        "CONTAINS"
    ));

    let stats = store.stats().unwrap();
    assert_eq!(stats.node_count, 6);
    assert_eq!(stats.virtual_node_count, 2);
    assert_eq!(stats.relationship_count, summary.relationship_count);
    let record = stats.last_import.unwrap();
    assert_eq!(Some(record.id), summary.import_id);
    assert_eq!(record.sources, vec!["components.json", "interfaces.json"]);
}

#[tokio::test]
async fn test_repeated_import_is_idempotent() {
    let (_dir, store) = open_store();
    let pipeline = ImportPipeline::new(store, ExtractConfig::default());

    let first = pipeline.run(batch()).await.unwrap();
    let first_stats = pipeline.store().lock().await.stats().unwrap();

    let second = pipeline.run(batch()).await.unwrap();
    let second_stats = pipeline.store().lock().await.stats().unwrap();

    assert_eq!(first.node_count, second.node_count);
    assert_eq!(first.relationship_count, second.relationship_count);
    assert_eq!(first.unresolved_count, second.unresolved_count);
    assert_eq!(first_stats.node_count, second_stats.node_count);
    assert_eq!(first_stats.relationship_count, second_stats.relationship_count);
    assert_eq!(first_stats.label_counts, second_stats.label_counts);
    assert_ne!(first.import_id, second.import_id);
}

#[tokio::test]
async fn test_import_replaces_previous_graph() {
    let (_dir, store) = open_store();
    let pipeline = ImportPipeline::new(store, ExtractConfig::default());

    pipeline.run(batch()).await.unwrap();
    let summary = pipeline
        .run(ImportBatch::new().with_document("interfaces.json", interface_document()))
        .await
        .unwrap();
    assert_eq!(summary.node_count, 2);

    let graph = pipeline.store().lock().await.load_graph().unwrap();
    assert_eq!(graph.nodes.len(), 2);
    assert!(graph.virtual_nodes.is_empty());
    assert!(graph.node("port1").is_none());
}

#[tokio::test]
async fn test_empty_merge_does_not_touch_store() {
    let (_dir, store) = open_store();
    let pipeline = ImportPipeline::new(store, ExtractConfig::default());
    pipeline.run(batch()).await.unwrap();

    let empty = Element::from_document(&json!({ "AUTOSAR": { "AR-PACKAGES": {} } })).unwrap();
    let summary = pipeline
        .run(ImportBatch::new().with_document("empty.json", empty))
        .await
        .unwrap();
    assert!(summary.success);
    assert_eq!(summary.node_count, 0);

    let stats = pipeline.store().lock().await.stats().unwrap();
    assert_eq!(stats.node_count, 6);
}

// ============================================================================
// Rollback
// ============================================================================

/// DuckDB store whose sessions fail on one relationship type.
struct FailingStore {
    inner: DuckStore,
    fail_on: &'static str,
}

struct FailingSession<'a> {
    inner: DuckSession<'a>,
    fail_on: &'static str,
}

impl GraphStore for FailingStore {
    type Session<'a> = FailingSession<'a>;

    fn begin(&self) -> Result<FailingSession<'_>> {
        Ok(FailingSession {
            inner: self.inner.begin()?,
            fail_on: self.fail_on,
        })
    }
}

impl StoreSession for FailingSession<'_> {
    fn clear_all(&mut self) -> Result<()> {
        self.inner.clear_all()
    }

    fn ensure_indexes(&mut self) -> Result<()> {
        self.inner.ensure_indexes()
    }

    fn upsert_nodes(&mut self, label: &str, nodes: &[GraphNode]) -> Result<usize> {
        self.inner.upsert_nodes(label, nodes)
    }

    fn upsert_relationships(&mut self, rel_type: &str, relationships: &[Relationship]) -> Result<usize> {
        if rel_type == self.fail_on {
            anyhow::bail!("connection reset");
        }
        self.inner.upsert_relationships(rel_type, relationships)
    }

    fn write_import_record(&mut self, record: &ImportRecord) -> Result<()> {
        self.inner.write_import_record(record)
    }

    fn commit(self) -> Result<()> {
        self.inner.commit()
    }
}

#[tokio::test]
async fn test_failure_mid_plan_keeps_previous_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("graph.duckdb");

    {
        let pipeline = ImportPipeline::new(DuckStore::open(&path).unwrap(), ExtractConfig::default());
        pipeline
            .run(ImportBatch::new().with_document("interfaces.json", interface_document()))
            .await
            .unwrap();
    }

    let failing = FailingStore {
        inner: DuckStore::open(&path).unwrap(),
        fail_on: "PROVIDED-INTERFACE-TREF",
    };
    let pipeline = ImportPipeline::new(failing, ExtractConfig::default());
    let err = pipeline.run(batch()).await.unwrap_err();

    match &err {
        ImportError::Persistence { message, .. } => {
            assert!(message.contains("connection reset"), "{}", message);
            assert!(message.contains("PROVIDED-INTERFACE-TREF"), "{}", message);
        }
        other => panic!("expected persistence error, got {:?}", other),
    }

    let summary = pipeline.import(batch()).await;
    assert!(!summary.success);
    assert!(summary.error.unwrap().starts_with("Persistence failed"));

    let store = pipeline.store();
    let store = store.lock().await;
    let graph = store.inner.load_graph().unwrap();
    let keys: Vec<_> = graph.nodes.iter().map(|n| n.key.clone()).collect();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&NodeKey::real("pkg2")));
    assert!(keys.contains(&NodeKey::real("iface1")));
    assert_eq!(
        store.inner.stats().unwrap().last_import.unwrap().sources,
        vec!["interfaces.json"]
    );
}

#[tokio::test]
async fn test_pipelines_sharing_a_store_serialize() {
    let (_dir, store) = open_store();
    let shared = Arc::new(tokio::sync::Mutex::new(store));
    let a = ImportPipeline::with_shared_store(Arc::clone(&shared), ExtractConfig::default());
    let b = ImportPipeline::with_shared_store(Arc::clone(&shared), ExtractConfig::default());

    let (first, second) = tokio::join!(a.run(batch()), b.run(batch()));
    assert!(first.unwrap().success);
    assert!(second.unwrap().success);

    let stats = shared.lock().await.stats().unwrap();
    assert_eq!(stats.node_count, 6);
}
