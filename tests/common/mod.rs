//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use squall::backends::sqlite::SqliteDatabase;
use squall::compiler::Compiler;
use squall::database::{
    ColumnInfo, ConnectionDescriptor, Database, LinkError, RawCursor, RawLink, WireConverters,
    WireParam,
};
use squall::error::SquallResult;
use squall::expr::{Column, Expr};
use squall::value::{Row, Value};
use squall::variables::Variable;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A database file under the temp dir, removed on drop.
pub struct TempDb {
    pub path: PathBuf,
}

impl TempDb {
    pub fn new(label: &str) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let unique = format!(
            "squall-{label}-{}-{}.db",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let path = std::env::temp_dir().join(unique);
        let _ = std::fs::remove_file(&path);
        Self { path }
    }

    pub fn descriptor(&self) -> ConnectionDescriptor {
        ConnectionDescriptor::new("sqlite")
            .database(self.path.to_string_lossy())
            .with_option("journal_mode", "wal")
    }

    pub fn database(&self) -> Arc<dyn Database> {
        Arc::new(SqliteDatabase::new(&self.descriptor()).unwrap())
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let mut path = self.path.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

pub const CREATE_TEST_TABLE: &str =
    "CREATE TABLE test (id INTEGER PRIMARY KEY, title VARCHAR(50), data BLOB)";

pub fn id() -> Column {
    Column::qualified("test", "id")
}

pub fn title() -> Column {
    Column::qualified("test", "title")
}

pub fn data() -> Column {
    Column::qualified("test", "data")
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

#[derive(Debug, Default)]
struct Server {
    generation: AtomicU64,
    down: AtomicBool,
}

/// A SQLite database whose "server" can be restarted or stopped.
///
/// `restart` invalidates every open link: their next call fails with an I/O
/// error, as a dropped TCP session would. `stop` also refuses new links until
/// `start`.
#[derive(Debug, Clone)]
pub struct FlakyDatabase {
    inner: Arc<SqliteDatabase>,
    server: Arc<Server>,
}

impl FlakyDatabase {
    pub fn new(db: &TempDb) -> Self {
        Self {
            inner: Arc::new(SqliteDatabase::new(&db.descriptor()).unwrap()),
            server: Arc::new(Server::default()),
        }
    }

    pub fn restart(&self) {
        self.server.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.server.down.store(true, Ordering::SeqCst);
        self.restart();
    }

    pub fn start(&self) {
        self.server.down.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Database for FlakyDatabase {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn compiler(&self) -> Arc<Compiler> {
        self.inner.compiler()
    }

    async fn connect(&self) -> Result<Box<dyn RawLink>, LinkError> {
        if self.server.down.load(Ordering::SeqCst) {
            return Err(LinkError::Io("connection refused".to_string()));
        }
        let inner = self.inner.connect().await?;
        Ok(Box::new(FlakyLink {
            inner,
            server: Arc::clone(&self.server),
            generation: self.server.generation.load(Ordering::SeqCst),
        }))
    }

    fn default_converters(&self) -> WireConverters {
        self.inner.default_converters()
    }

    fn from_wire_row(&self, columns: &[ColumnInfo], row: Row) -> SquallResult<Row> {
        self.inner.from_wire_row(columns, row)
    }

    fn insert_identity(
        &self,
        last_insert_id: Option<i64>,
        primary_columns: &[Column],
        primary_variables: &[Variable],
    ) -> SquallResult<Expr> {
        self.inner
            .insert_identity(last_insert_id, primary_columns, primary_variables)
    }
}

struct FlakyLink {
    inner: Box<dyn RawLink>,
    server: Arc<Server>,
    generation: u64,
}

impl FlakyLink {
    fn check(&self) -> Result<(), LinkError> {
        if self.server.generation.load(Ordering::SeqCst) != self.generation {
            return Err(LinkError::Io("server has gone away".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RawLink for FlakyLink {
    async fn begin(&mut self) -> Result<(), LinkError> {
        self.check()?;
        self.inner.begin().await
    }

    async fn execute(&mut self, sql: &str, params: Vec<WireParam>) -> Result<RawCursor, LinkError> {
        self.check()?;
        self.inner.execute(sql, params).await
    }

    async fn commit(&mut self) -> Result<(), LinkError> {
        self.check()?;
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> Result<(), LinkError> {
        self.check()?;
        self.inner.rollback().await
    }

    async fn close(self: Box<Self>) -> Result<(), LinkError> {
        self.inner.close().await
    }
}
