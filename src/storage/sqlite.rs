//! SQLite-backed graph index

use super::traits::{OpenStore, StorageError, StorageResult};
use crate::graph::{to_mutation, Edge, GraphMutation, Node, NodeId};
use crate::sync::{Category, Document, DocumentId, GraphIndex, IndexError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// How long a writer waits for a competing transaction before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite graph store
///
/// Uses a single SQLite database file with tables for synced documents,
/// nodes and edges. Thread-safe via internal mutex on the connection.
/// Each document is applied in one transaction, so a document is either
/// fully present (entities plus its synced marker) or absent. Clones share
/// the connection.
#[derive(Clone)]
pub struct SqliteGraphIndex {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGraphIndex {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            r#"
            -- Documents already materialized into the graph
            CREATE TABLE IF NOT EXISTS synced_documents (
                category TEXT NOT NULL,
                document_id TEXT NOT NULL,
                run_node_id TEXT NOT NULL,
                synced_at TEXT NOT NULL,
                PRIMARY KEY (category, document_id)
            );

            -- Nodes table
            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                node_type TEXT NOT NULL,
                key TEXT NOT NULL,
                properties_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_type
                ON nodes(node_type);

            -- Edges table
            CREATE TABLE IF NOT EXISTS edges (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                relationship TEXT NOT NULL,
                properties_json TEXT NOT NULL,
                FOREIGN KEY (source_id) REFERENCES nodes(id) ON DELETE CASCADE,
                FOREIGN KEY (target_id) REFERENCES nodes(id) ON DELETE CASCADE
            );

            -- Indexes for edge traversal
            CREATE INDEX IF NOT EXISTS idx_edges_source
                ON edges(source_id);
            CREATE INDEX IF NOT EXISTS idx_edges_target
                ON edges(target_id);
            CREATE INDEX IF NOT EXISTS idx_edges_relationship
                ON edges(relationship);

            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- Enable WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Whether a document has been synced
    pub fn is_synced(&self, category: Category, id: &DocumentId) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM synced_documents WHERE category = ?1 AND document_id = ?2",
                params![category.slug(), id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// When a document was synced
    pub fn synced_at(&self, category: Category, id: &DocumentId) -> StorageResult<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn
            .query_row(
                "SELECT synced_at FROM synced_documents WHERE category = ?1 AND document_id = ?2",
                params![category.slug(), id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StorageError::DateParse(e.to_string()))
        })
        .transpose()
    }

    /// Upsert a document's entities and mark it synced, atomically
    pub fn apply(&self, category: Category, id: &DocumentId, mutation: &GraphMutation) -> StorageResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        for node in mutation.nodes() {
            tx.execute(
                r#"
                INSERT INTO nodes (id, node_type, key, properties_json, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    properties_json = json_patch(nodes.properties_json, excluded.properties_json),
                    updated_at = excluded.updated_at
                "#,
                params![
                    node.id.to_string(),
                    node.node_type,
                    node.key,
                    serde_json::to_string(&node.properties)?,
                    now,
                ],
            )?;
        }

        for edge in mutation.edges() {
            tx.execute(
                r#"
                INSERT INTO edges (id, source_id, target_id, relationship, properties_json)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    properties_json = excluded.properties_json
                "#,
                params![
                    edge.id.to_string(),
                    edge.source.to_string(),
                    edge.target.to_string(),
                    edge.relationship,
                    serde_json::to_string(&edge.properties)?,
                ],
            )?;
        }

        let run_node = crate::graph::transform::run_node_id(category, id.as_str());
        tx.execute(
            r#"
            INSERT INTO synced_documents (category, document_id, run_node_id, synced_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(category, document_id) DO UPDATE SET
                run_node_id = excluded.run_node_id,
                synced_at = excluded.synced_at
            "#,
            params![category.slug(), id.as_str(), run_node.to_string(), now],
        )?;

        tx.commit()?;
        debug!(
            %category,
            document_id = %id,
            nodes = mutation.nodes().len(),
            edges = mutation.edges().len(),
            "applied graph mutation"
        );
        Ok(())
    }

    /// Load a node by ID
    pub fn load_node(&self, id: &NodeId) -> StorageResult<Option<Node>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT node_type, key, properties_json FROM nodes WHERE id = ?1",
                params![id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((node_type, key, properties_json)) = row else {
            return Ok(None);
        };
        Ok(Some(Node {
            id: *id,
            node_type,
            key,
            properties: serde_json::from_str(&properties_json)?,
        }))
    }

    /// Get edges originating from a node
    pub fn edges_from(&self, id: &NodeId) -> StorageResult<Vec<Edge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, target_id, relationship, properties_json FROM edges WHERE source_id = ?1",
        )?;
        let rows = stmt.query_map(params![id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut edges = Vec::new();
        for row in rows {
            let (edge_id, target, relationship, properties_json) = row?;
            edges.push(Edge {
                id: crate::graph::EdgeId::from_uuid(parse_uuid(&edge_id)?),
                source: *id,
                target: NodeId::from_uuid(parse_uuid(&target)?),
                relationship,
                properties: serde_json::from_str(&properties_json)?,
            });
        }
        Ok(edges)
    }

    pub fn node_count(&self) -> StorageResult<usize> {
        self.count("SELECT COUNT(*) FROM nodes", params![])
    }

    pub fn edge_count(&self) -> StorageResult<usize> {
        self.count("SELECT COUNT(*) FROM edges", params![])
    }

    pub fn node_count_of_type(&self, node_type: &str) -> StorageResult<usize> {
        self.count("SELECT COUNT(*) FROM nodes WHERE node_type = ?1", params![node_type])
    }

    pub fn synced_count(&self, category: Category) -> StorageResult<usize> {
        self.count(
            "SELECT COUNT(*) FROM synced_documents WHERE category = ?1",
            params![category.slug()],
        )
    }

    fn count<P: rusqlite::Params>(&self, sql: &str, params: P) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(sql, params, |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn parse_uuid(raw: &str) -> StorageResult<uuid::Uuid> {
    uuid::Uuid::parse_str(raw).map_err(|e| StorageError::Corrupt(format!("invalid id {raw:?}: {e}")))
}

impl OpenStore for SqliteGraphIndex {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

/// Map a storage failure onto the index error contract
pub(crate) fn index_error(err: StorageError) -> IndexError {
    if err.is_write_conflict() {
        IndexError::RetryTransaction(err.to_string())
    } else {
        IndexError::Storage(err)
    }
}

/// Run rusqlite work off the async worker threads
async fn run_blocking<T, F>(work: F) -> Result<T, IndexError>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| IndexError::Storage(StorageError::Task(e.to_string())))?
        .map_err(index_error)
}

#[async_trait]
impl GraphIndex for SqliteGraphIndex {
    async fn exists(&self, category: Category, id: &DocumentId) -> Result<bool, IndexError> {
        let store = self.clone();
        let id = id.clone();
        run_blocking(move || store.is_synced(category, &id)).await
    }

    async fn insert(&self, category: Category, document: &Document) -> Result<(), IndexError> {
        let mutation = to_mutation(document).map_err(|e| IndexError::insertion(e.to_string()))?;
        let store = self.clone();
        let id = document.id.clone();
        run_blocking(move || store.apply(category, &id, &mutation)).await
    }
}
