//! Table writer: maps event documents to rows through a column map
//!
//! Storage is behind [`TableSink`]. Two sinks ship with the crate: a SQLite
//! database file and an in-memory table.

use crate::core::{LoggerError, Payload, PayloadKind, Result, Writer};
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// How long an insert waits for another connection's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Column name -> value
pub type Row = BTreeMap<String, Value>;

/// Append-style row storage
pub trait TableSink: Send + Sync {
    fn insert(&self, table: &str, row: Row) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;
}

/// Which document fields land in which columns
///
/// `fields` maps top-level document keys (`message`, `level`, ...) and
/// `context` maps context keys. An empty map stores every top-level field
/// under its own name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, key: impl Into<String>, column: impl Into<String>) -> Self {
        self.fields.insert(key.into(), column.into());
        self
    }

    #[must_use]
    pub fn context_field(mut self, key: impl Into<String>, column: impl Into<String>) -> Self {
        self.context.insert(key.into(), column.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.context.is_empty()
    }

    /// Build a row; unmapped keys are ignored, missing ones become NULL
    pub fn row(&self, document: &Value) -> Row {
        if self.is_empty() {
            return document
                .as_object()
                .map(|doc| doc.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
        }

        let mut row = Row::new();
        for (key, column) in &self.fields {
            row.insert(column.clone(), document.get(key).cloned().unwrap_or(Value::Null));
        }
        let context = document.get("context");
        for (key, column) in &self.context {
            let value = context.and_then(|c| c.get(key)).cloned().unwrap_or(Value::Null);
            row.insert(column.clone(), value);
        }
        row
    }
}

pub struct DbWriter {
    table: String,
    columns: ColumnMap,
    sink: Arc<dyn TableSink>,
}

impl DbWriter {
    pub fn new(table: impl Into<String>, columns: ColumnMap, sink: Arc<dyn TableSink>) -> Self {
        Self {
            table: table.into(),
            columns,
            sink,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl Writer for DbWriter {
    fn write(&self, payload: &Payload) -> Result<()> {
        let Payload::Document(document) = payload else {
            return Err(LoggerError::delivery(
                "db",
                format!("cannot store {:?} payload", payload.kind()),
            ));
        };
        self.sink.insert(&self.table, self.columns.row(document))
    }

    fn flush(&self) -> Result<()> {
        self.sink.flush()
    }

    fn name(&self) -> &str {
        "db"
    }

    fn accepts(&self, kind: PayloadKind) -> bool {
        kind == PayloadKind::Document
    }
}

/// Inserts rows into a SQLite database
///
/// A table is created on first use with one untyped column per row key.
/// Booleans are stored as integers and nested values as JSON text.
pub struct SqliteTableSink {
    path: PathBuf,
    state: Mutex<SqliteState>,
}

struct SqliteState {
    conn: Connection,
    created: HashSet<String>,
}

impl SqliteTableSink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(SqliteState {
                conn,
                created: HashSet::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableSink for SqliteTableSink {
    fn insert(&self, table: &str, row: Row) -> Result<()> {
        if row.is_empty() {
            return Err(LoggerError::delivery("db", "row has no columns"));
        }
        let columns: Vec<String> = row.keys().map(String::as_str).map(quote).collect();

        let mut state = self.state.lock();
        if !state.created.contains(table) {
            state.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} ({});",
                quote(table),
                columns.join(", ")
            ))?;
            state.created.insert(table.to_string());
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(table),
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        state
            .conn
            .execute(&sql, params_from_iter(row.values().map(sql_value)))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite_table"
    }
}

/// Quote an identifier
fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(n) => match n.as_i64() {
            Some(int) => SqlValue::Integer(int),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        nested => SqlValue::Text(nested.to_string()),
    }
}

/// Keeps rows in memory; clones share the table
#[derive(Debug, Clone, Default)]
pub struct MemoryTableSink {
    rows: Arc<Mutex<Vec<(String, Row)>>>,
}

impl MemoryTableSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<(String, Row)> {
        self.rows.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

impl TableSink for MemoryTableSink {
    fn insert(&self, table: &str, row: Row) -> Result<()> {
        self.rows.lock().push((table.to_string(), row));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory_table"
    }
}
