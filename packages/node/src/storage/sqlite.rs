//! SQLite-backed graph store.
//!
//! Uses `rusqlite` (with bundled SQLite). Writes (graph import, lookups by
//! IRI or pattern) go through one connection behind a `Mutex`. Every read
//! transaction opens its **own** connection and runs `BEGIN` … `COMMIT` on
//! it, so closure workers never share a connection or a transaction.
//!
//! # Schema
//!
//! - `nodes`: integer id, unique IRI, labels as a JSON array.
//! - `edges`: `(source, target, rel)` with indexes for both directions.

use std::sync::{Mutex, MutexGuard, PoisonError};

use ontoweft::{
    Direction, Entity, GraphDocument, GraphStore, IriPattern, NodeId, ReadTransaction,
    RelationshipSpec, StoreError,
};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS nodes (
    id      INTEGER PRIMARY KEY,
    iri     TEXT NOT NULL UNIQUE,
    labels  TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS edges (
    source  INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    target  INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    rel     TEXT NOT NULL,
    PRIMARY KEY (source, target, rel)
);
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target, rel);
CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source, rel);
";

// ---------------------------------------------------------------------------
// SqliteGraph
// ---------------------------------------------------------------------------

/// SQLite-backed implementation of [`GraphStore`].
pub struct SqliteGraph {
    /// Path or `file:` URI every transaction connection opens.
    location: String,
    flags: OpenFlags,
    /// Shared connection for imports and single-statement lookups. For the
    /// in-memory variant it also keeps the database alive.
    conn: Mutex<Connection>,
}

impl SqliteGraph {
    /// Open (or create) the SQLite database at `path` and apply the schema.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        let flags = OpenFlags::default();
        let conn = Connection::open_with_flags(path, flags)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::init(path.to_string(), flags, conn)
    }

    /// Open a private in-memory database (data is lost when dropped).
    ///
    /// The database is a uniquely named shared-cache one, so transaction
    /// connections opened later see the same data.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let location = format!("file:oweft-{}?mode=memory&cache=shared", uuid::Uuid::now_v7());
        let flags = OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(&location, flags)?;
        Self::init(location, flags, conn)
    }

    fn init(location: String, flags: OpenFlags, conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            location,
            flags,
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Import a [`GraphDocument`] in one transaction.
    ///
    /// Nodes already present (by IRI) are kept; duplicate edges are ignored.
    /// An edge naming an unknown IRI aborts the whole import.
    pub fn import(&self, doc: &GraphDocument) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(unavailable)?;
        {
            let mut insert_node = tx
                .prepare_cached("INSERT OR IGNORE INTO nodes (iri, labels) VALUES (?1, ?2)")
                .map_err(internal)?;
            for node in &doc.nodes {
                let labels = serde_json::to_string(&node.labels)
                    .map_err(|e| StoreError::Internal(format!("JSON error: {e}")))?;
                insert_node
                    .execute(params![node.iri, labels])
                    .map_err(internal)?;
            }

            let mut insert_edge = tx
                .prepare_cached(
                    "INSERT OR IGNORE INTO edges (source, target, rel)
                     SELECT s.id, t.id, ?3 FROM nodes s, nodes t
                     WHERE s.iri = ?1 AND t.iri = ?2",
                )
                .map_err(internal)?;
            for edge in &doc.edges {
                let inserted = insert_edge
                    .execute(params![edge.source, edge.target, edge.rel])
                    .map_err(internal)?;
                if inserted == 0 && !edge_exists(&tx, &edge.source, &edge.target, &edge.rel)? {
                    return Err(StoreError::Internal(format!(
                        "edge {} -[{}]-> {} references an unknown node",
                        edge.source, edge.rel, edge.target
                    )));
                }
            }
        }
        tx.commit().map_err(unavailable)?;
        tracing::info!(
            nodes = doc.nodes.len(),
            edges = doc.edges.len(),
            "imported graph document"
        );
        Ok(())
    }

    pub fn node_count(&self) -> Result<usize, StoreError> {
        count(&self.lock(), "SELECT COUNT(*) FROM nodes")
    }

    pub fn edge_count(&self) -> Result<usize, StoreError> {
        count(&self.lock(), "SELECT COUNT(*) FROM edges")
    }
}

impl GraphStore for SqliteGraph {
    fn begin_read(&self) -> Result<Box<dyn ReadTransaction>, StoreError> {
        let conn = Connection::open_with_flags(&self.location, self.flags).map_err(unavailable)?;
        conn.execute_batch("BEGIN").map_err(unavailable)?;
        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }

    fn node_by_iri(&self, iri: &str) -> Result<Option<NodeId>, StoreError> {
        self.lock()
            .query_row("SELECT id FROM nodes WHERE iri = ?1", params![iri], |row| {
                row.get::<_, i64>(0)
            })
            .optional()
            .map_err(internal)?
            .map(node_id)
            .transpose()
    }

    fn find_by_pattern(
        &self,
        pattern: &IriPattern,
        limit: usize,
    ) -> Result<Vec<Entity>, StoreError> {
        let prefix = pattern.literal_prefix();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.lock();
        // substr() compares the literal prefix exactly; LIKE would treat `_`
        // and `%` in the namespace as wildcards.
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, iri, labels FROM nodes
                 WHERE substr(iri, 1, ?1) = ?2
                 ORDER BY id LIMIT ?3",
            )
            .map_err(internal)?;
        let rows = stmt
            .query_map(
                params![prefix.chars().count() as i64, prefix, limit],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .map_err(internal)?;

        let mut entities = Vec::new();
        for row in rows {
            let (id, iri, labels) = row.map_err(internal)?;
            let labels: Vec<String> = serde_json::from_str(&labels)
                .map_err(|e| StoreError::Internal(format!("JSON error: {e}")))?;
            entities.push(Entity {
                id: node_id(id)?,
                iri,
                labels,
            });
        }
        Ok(entities)
    }
}

// ---------------------------------------------------------------------------
// SqliteTransaction
// ---------------------------------------------------------------------------

/// A read transaction on its own connection. Dropped without
/// [`commit`](ReadTransaction::commit), it rolls back.
struct SqliteTransaction {
    conn: Connection,
    finished: bool,
}

impl ReadTransaction for SqliteTransaction {
    fn contains(&self, node: NodeId) -> Result<bool, StoreError> {
        let id = sql_id(node)?;
        self.conn
            .prepare_cached("SELECT 1 FROM nodes WHERE id = ?1")
            .and_then(|mut stmt| stmt.exists(params![id]))
            .map_err(internal)
    }

    fn neighbours(
        &self,
        node: NodeId,
        spec: RelationshipSpec,
    ) -> Result<Vec<NodeId>, StoreError> {
        if !self.contains(node)? {
            return Err(StoreError::NodeNotFound(node));
        }
        let id = sql_id(node)?;
        let rel = spec.relationship.name();
        let mut out = Vec::new();
        if matches!(spec.direction, Direction::Incoming | Direction::Both) {
            out.extend(self.ids(
                "SELECT source FROM edges WHERE target = ?1 AND rel = ?2 ORDER BY rowid",
                id,
                rel,
            )?);
        }
        if matches!(spec.direction, Direction::Outgoing | Direction::Both) {
            out.extend(self.ids(
                "SELECT target FROM edges WHERE source = ?1 AND rel = ?2 ORDER BY rowid",
                id,
                rel,
            )?);
        }
        Ok(out)
    }

    fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT").map_err(unavailable)?;
        self.finished = true;
        Ok(())
    }
}

impl SqliteTransaction {
    fn ids(&self, sql: &str, id: i64, rel: &str) -> Result<Vec<NodeId>, StoreError> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(internal)?;
        let rows = stmt
            .query_map(params![id, rel], |row| row.get::<_, i64>(0))
            .map_err(internal)?;
        rows.map(|r| r.map_err(internal).and_then(node_id)).collect()
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!("rollback of read transaction failed: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn internal(e: rusqlite::Error) -> StoreError {
    StoreError::Internal(e.to_string())
}

fn unavailable(e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn node_id(id: i64) -> Result<NodeId, StoreError> {
    u64::try_from(id)
        .map(NodeId)
        .map_err(|_| StoreError::Internal(format!("negative node id {id}")))
}

fn sql_id(node: NodeId) -> Result<i64, StoreError> {
    i64::try_from(node.get()).map_err(|_| StoreError::NodeNotFound(node))
}

fn count(conn: &Connection, sql: &str) -> Result<usize, StoreError> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0)).map_err(internal)?;
    Ok(usize::try_from(n).unwrap_or(0))
}

fn edge_exists(
    conn: &Connection,
    source: &str,
    target: &str,
    rel: &str,
) -> Result<bool, StoreError> {
    conn.prepare_cached(
        "SELECT 1 FROM edges e
         JOIN nodes s ON s.id = e.source
         JOIN nodes t ON t.id = e.target
         WHERE s.iri = ?1 AND t.iri = ?2 AND e.rel = ?3",
    )
    .and_then(|mut stmt| stmt.exists(params![source, target, rel]))
    .map_err(internal)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
