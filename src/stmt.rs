use crate::driver::Statement;
use crate::fanout::fan_out;
use crate::selector::Selector;
use crate::types::{ExecResult, QueryRow, Rows, Value};
use crate::{Result, must};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// A statement prepared on every physical database of a [`Db`](crate::Db).
///
/// Statements are index-aligned with the databases they were prepared on:
/// writes use the primary's statement, reads take the next secondary from the
/// same counter as the `Db` that prepared it.
pub struct Stmt {
    selector: Arc<Selector>,
    stmts: Vec<Arc<dyn Statement>>,
}

impl Stmt {
    pub(crate) fn new(selector: Arc<Selector>, stmts: Vec<Arc<dyn Statement>>) -> Self {
        debug_assert!(!stmts.is_empty());
        Self { selector, stmts }
    }

    /// Number of per-database statements.
    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    fn primary(&self) -> &dyn Statement {
        self.stmts[0].as_ref()
    }

    fn secondary(&self) -> &dyn Statement {
        self.stmts[self.selector.next(self.stmts.len())].as_ref()
    }

    pub async fn exec(&self, args: &[Value]) -> Result<ExecResult> {
        self.primary().exec(args).await
    }

    /// Like [`exec`](Self::exec) but panics if the statement fails.
    pub async fn must_exec(&self, args: &[Value]) -> ExecResult {
        must(self.exec(args).await)
    }

    pub async fn query(&self, args: &[Value]) -> Result<Rows> {
        self.secondary().query(args).await
    }

    pub async fn query_row(&self, args: &[Value]) -> QueryRow {
        QueryRow::new(self.secondary().query_row(args).await)
    }

    pub async fn select<T: DeserializeOwned>(&self, args: &[Value]) -> Result<Vec<T>> {
        self.query(args).await?.decode_all()
    }

    pub async fn get<T: DeserializeOwned>(&self, args: &[Value]) -> Result<T> {
        self.query_row(args).await.scan()
    }

    /// Close the statement on every database, even if some fail.
    pub async fn close(&self) -> Result<()> {
        close_all(&self.stmts).await
    }
}

pub(crate) async fn close_all(stmts: &[Arc<dyn Statement>]) -> Result<()> {
    fan_out(stmts.len(), |i| {
        let stmt = stmts[i].clone();
        async move { stmt.close().await }
    })
    .await
}
