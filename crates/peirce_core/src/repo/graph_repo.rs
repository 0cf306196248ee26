//! Saved graph repository.
//!
//! # Responsibility
//! - Persist a `GraphSnapshot` as rows of `graph_objects`.
//! - Load it back in creation order.
//!
//! # Invariants
//! - `save` replaces the whole stored graph in one transaction.
//! - Levels are never stored; loaded graphs must be resolved before use.

use crate::graph::store::{GraphSnapshot, ObjectRecord};
use crate::model::object::{BoundaryHandle, ObjectKind, SymbolLabel};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use log::info;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

/// Persistence contract for the single saved graph.
pub trait GraphRepository {
    /// Replaces the stored graph with `snapshot`.
    fn save(&self, snapshot: &GraphSnapshot) -> RepoResult<()>;
    /// Loads the stored graph; empty when nothing was saved.
    fn load(&self) -> RepoResult<GraphSnapshot>;
    /// Deletes every stored object.
    fn clear(&self) -> RepoResult<()>;
}

/// SQLite-backed graph repository.
pub struct SqliteGraphRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGraphRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            "graph_objects",
            &["object_uuid", "kind", "parent_uuid", "boundary", "label", "seq"],
        )?;
        Ok(Self { conn })
    }
}

impl GraphRepository for SqliteGraphRepository<'_> {
    fn save(&self, snapshot: &GraphSnapshot) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM graph_objects;", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO graph_objects (object_uuid, kind, parent_uuid, boundary, label, seq)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            )?;
            for (seq, record) in snapshot.objects.iter().enumerate() {
                let boundary = i64::try_from(record.boundary.value()).map_err(|_| {
                    RepoError::InvalidData(format!(
                        "boundary {} of {} does not fit in sqlite integer",
                        record.boundary, record.id
                    ))
                })?;
                insert.execute(params![
                    record.id.to_string(),
                    record.kind.as_str(),
                    record.parent.map(|parent| parent.to_string()),
                    boundary,
                    record.label.as_ref().map(SymbolLabel::as_str),
                    seq as i64,
                ])?;
            }
        }
        tx.commit()?;

        info!(
            "event=graph_save module=repo status=ok objects={}",
            snapshot.objects.len()
        );
        Ok(())
    }

    fn load(&self) -> RepoResult<GraphSnapshot> {
        let mut stmt = self.conn.prepare(
            "SELECT object_uuid, kind, parent_uuid, boundary, label
             FROM graph_objects
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut objects = Vec::new();
        while let Some(row) = rows.next()? {
            objects.push(parse_record(row)?);
        }

        info!(
            "event=graph_load module=repo status=ok objects={}",
            objects.len()
        );
        Ok(GraphSnapshot { objects })
    }

    fn clear(&self) -> RepoResult<()> {
        self.conn.execute("DELETE FROM graph_objects;", [])?;
        Ok(())
    }
}

fn parse_record(row: &Row<'_>) -> RepoResult<ObjectRecord> {
    let id_text: String = row.get(0)?;
    let kind_text: String = row.get(1)?;
    let parent_text: Option<String> = row.get(2)?;
    let boundary: i64 = row.get(3)?;
    let label_text: Option<String> = row.get(4)?;

    let id = parse_uuid(&id_text, "object_uuid")?;
    let kind = ObjectKind::parse(&kind_text)
        .ok_or_else(|| RepoError::InvalidData(format!("unknown object kind `{kind_text}`")))?;
    let parent = parent_text
        .as_deref()
        .map(|value| parse_uuid(value, "parent_uuid"))
        .transpose()?;
    let boundary = u64::try_from(boundary)
        .map(BoundaryHandle::new)
        .map_err(|_| RepoError::InvalidData(format!("negative boundary {boundary} for {id}")))?;
    let label = label_text
        .map(|value| {
            SymbolLabel::try_from(value)
                .map_err(|err| RepoError::InvalidData(format!("label of {id}: {err}")))
        })
        .transpose()?;

    Ok(ObjectRecord {
        id,
        kind,
        boundary,
        parent,
        label,
    })
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
