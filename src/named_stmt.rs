use crate::driver::NamedStatement;
use crate::fanout::fan_out;
use crate::selector::Selector;
use crate::types::{ExecResult, NamedArgs, QueryRow, Rows};
use crate::{Result, must};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// [`Stmt`](crate::Stmt) counterpart for statements with named parameters.
pub struct NamedStmt {
    selector: Arc<Selector>,
    stmts: Vec<Arc<dyn NamedStatement>>,
}

impl NamedStmt {
    pub(crate) fn new(selector: Arc<Selector>, stmts: Vec<Arc<dyn NamedStatement>>) -> Self {
        debug_assert!(!stmts.is_empty());
        Self { selector, stmts }
    }

    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    fn secondary(&self) -> &dyn NamedStatement {
        self.stmts[self.selector.next(self.stmts.len())].as_ref()
    }

    /// Execute on the primary.
    pub async fn exec(&self, args: &NamedArgs) -> Result<ExecResult> {
        self.stmts[0].exec(args).await
    }

    /// Execute on the primary with parameters taken from a serializable
    /// struct or map.
    pub async fn exec_from<A: Serialize + ?Sized>(&self, arg: &A) -> Result<ExecResult> {
        self.exec(&NamedArgs::from_serialize(arg)?).await
    }

    pub async fn must_exec(&self, args: &NamedArgs) -> ExecResult {
        must(self.exec(args).await)
    }

    pub async fn query(&self, args: &NamedArgs) -> Result<Rows> {
        self.secondary().query(args).await
    }

    pub async fn query_from<A: Serialize + ?Sized>(&self, arg: &A) -> Result<Rows> {
        self.query(&NamedArgs::from_serialize(arg)?).await
    }

    pub async fn query_row(&self, args: &NamedArgs) -> QueryRow {
        QueryRow::new(self.secondary().query_row(args).await)
    }

    pub async fn select<T: DeserializeOwned>(&self, args: &NamedArgs) -> Result<Vec<T>> {
        self.query(args).await?.decode_all()
    }

    pub async fn get<T: DeserializeOwned>(&self, args: &NamedArgs) -> Result<T> {
        self.query_row(args).await.scan()
    }

    pub async fn close(&self) -> Result<()> {
        close_all(&self.stmts).await
    }
}

pub(crate) async fn close_all(stmts: &[Arc<dyn NamedStatement>]) -> Result<()> {
    fan_out(stmts.len(), |i| {
        let stmt = stmts[i].clone();
        async move { stmt.close().await }
    })
    .await
}
