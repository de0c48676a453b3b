use async_trait::async_trait;
use parking_lot::Mutex;
use sqlfanout::{
    Conn, Driver, Error, ExecResult, NamedArgs, NamedStatement, Result, Row, Rows, Statement, Tx,
    TxOptions, Value,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Calls made against mock databases, as `(dsn, operation)` in call order.
#[derive(Default)]
pub struct CallLog {
    calls: Mutex<Vec<(String, String)>>,
}

impl CallLog {
    fn record(&self, dsn: &str, op: &str) {
        self.calls.lock().push((dsn.to_string(), op.to_string()));
    }

    /// DSNs that saw `op`, in call order.
    pub fn targets(&self, op: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(_, o)| o == op)
            .map(|(dsn, _)| dsn.clone())
            .collect()
    }

    #[allow(dead_code)]
    pub fn count(&self, op: &str) -> usize {
        self.targets(op).len()
    }

    #[allow(dead_code)]
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// A driver whose databases answer every query with a single `dsn` column
/// naming the database that served it.
#[derive(Default)]
pub struct MockDriver {
    name: String,
    pub log: Arc<CallLog>,
    fail_connect: HashSet<String>,
    fail_prepare: HashSet<String>,
    fail_close: HashSet<String>,
    fail_exec: HashSet<String>,
}

#[allow(dead_code)]
impl MockDriver {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    pub fn fail_connect(mut self, dsn: &str) -> Self {
        self.fail_connect.insert(dsn.to_string());
        self
    }

    pub fn fail_prepare(mut self, dsn: &str) -> Self {
        self.fail_prepare.insert(dsn.to_string());
        self
    }

    /// Closing the database or any statement prepared on it fails.
    pub fn fail_close(mut self, dsn: &str) -> Self {
        self.fail_close.insert(dsn.to_string());
        self
    }

    /// Every exec on the database or its statements fails.
    pub fn fail_exec(mut self, dsn: &str) -> Self {
        self.fail_exec.insert(dsn.to_string());
        self
    }

    pub fn into_arc(self) -> Arc<MockDriver> {
        Arc::new(self)
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, dsn: &str) -> Result<Arc<dyn Conn>> {
        self.log.record(dsn, "connect");
        if self.fail_connect.contains(dsn) {
            return Err(Error::Driver(format!("cannot reach {dsn}")));
        }
        Ok(Arc::new(MockConn {
            driver: self.name.clone(),
            dsn: dsn.to_string(),
            log: self.log.clone(),
            fail_prepare: self.fail_prepare.contains(dsn),
            fail_close: self.fail_close.contains(dsn),
            fail_exec: self.fail_exec.contains(dsn),
        }))
    }
}

pub struct MockConn {
    driver: String,
    dsn: String,
    log: Arc<CallLog>,
    fail_prepare: bool,
    fail_close: bool,
    fail_exec: bool,
}

fn exec_outcome(dsn: &str, fail: bool) -> Result<ExecResult> {
    if fail {
        return Err(Error::Driver(format!("exec failed on {dsn}")));
    }
    Ok(ExecResult { rows_affected: 1, last_insert_id: None })
}

fn served_by(dsn: &str) -> Rows {
    let columns: Arc<[String]> = Arc::from(vec!["dsn".to_string()]);
    let row = Row::new(columns.clone(), vec![Value::Text(dsn.to_string())]);
    Rows::new(columns, vec![row])
}

#[async_trait]
impl Conn for MockConn {
    fn driver(&self) -> Arc<dyn Driver> {
        Arc::new(MockDriver::new(&self.driver))
    }

    fn dsn(&self) -> &str {
        &self.dsn
    }

    async fn ping(&self) -> Result<()> {
        self.log.record(&self.dsn, "ping");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.log.record(&self.dsn, "close");
        if self.fail_close {
            return Err(Error::Driver(format!("close failed on {}", self.dsn)));
        }
        Ok(())
    }

    fn set_max_idle_conns(&self, n: usize) {
        self.log.record(&self.dsn, &format!("max_idle={n}"));
    }

    fn set_max_open_conns(&self, n: usize) {
        self.log.record(&self.dsn, &format!("max_open={n}"));
    }

    fn set_conn_max_lifetime(&self, lifetime: Option<Duration>) {
        self.log.record(&self.dsn, &format!("lifetime={lifetime:?}"));
    }

    async fn begin(&self, _opts: TxOptions) -> Result<Box<dyn Tx>> {
        self.log.record(&self.dsn, "begin");
        Ok(Box::new(MockTx { dsn: self.dsn.clone(), log: self.log.clone() }))
    }

    async fn exec(&self, _sql: &str, _args: &[Value]) -> Result<ExecResult> {
        self.log.record(&self.dsn, "exec");
        exec_outcome(&self.dsn, self.fail_exec)
    }

    async fn query(&self, _sql: &str, _args: &[Value]) -> Result<Rows> {
        self.log.record(&self.dsn, "query");
        Ok(served_by(&self.dsn))
    }

    async fn named_exec(&self, _sql: &str, _args: &NamedArgs) -> Result<ExecResult> {
        self.log.record(&self.dsn, "named_exec");
        exec_outcome(&self.dsn, self.fail_exec)
    }

    async fn named_query(&self, _sql: &str, _args: &NamedArgs) -> Result<Rows> {
        self.log.record(&self.dsn, "named_query");
        Ok(served_by(&self.dsn))
    }

    async fn prepare(&self, _sql: &str) -> Result<Box<dyn Statement>> {
        self.log.record(&self.dsn, "prepare");
        if self.fail_prepare {
            return Err(Error::Driver(format!("prepare failed on {}", self.dsn)));
        }
        Ok(Box::new(MockStmt {
            dsn: self.dsn.clone(),
            log: self.log.clone(),
            fail_close: self.fail_close,
            fail_exec: self.fail_exec,
        }))
    }

    async fn prepare_named(&self, _sql: &str) -> Result<Box<dyn NamedStatement>> {
        self.log.record(&self.dsn, "prepare_named");
        if self.fail_prepare {
            return Err(Error::Driver(format!("prepare failed on {}", self.dsn)));
        }
        Ok(Box::new(MockStmt {
            dsn: self.dsn.clone(),
            log: self.log.clone(),
            fail_close: self.fail_close,
            fail_exec: self.fail_exec,
        }))
    }
}

pub struct MockStmt {
    dsn: String,
    log: Arc<CallLog>,
    fail_close: bool,
    fail_exec: bool,
}

impl MockStmt {
    fn close_inner(&self) -> Result<()> {
        self.log.record(&self.dsn, "stmt.close");
        if self.fail_close {
            return Err(Error::Driver(format!("statement close failed on {}", self.dsn)));
        }
        Ok(())
    }
}

#[async_trait]
impl Statement for MockStmt {
    async fn exec(&self, _args: &[Value]) -> Result<ExecResult> {
        self.log.record(&self.dsn, "stmt.exec");
        exec_outcome(&self.dsn, self.fail_exec)
    }

    async fn query(&self, _args: &[Value]) -> Result<Rows> {
        self.log.record(&self.dsn, "stmt.query");
        Ok(served_by(&self.dsn))
    }

    async fn close(&self) -> Result<()> {
        self.close_inner()
    }
}

#[async_trait]
impl NamedStatement for MockStmt {
    async fn exec(&self, _args: &NamedArgs) -> Result<ExecResult> {
        self.log.record(&self.dsn, "stmt.exec");
        exec_outcome(&self.dsn, self.fail_exec)
    }

    async fn query(&self, _args: &NamedArgs) -> Result<Rows> {
        self.log.record(&self.dsn, "stmt.query");
        Ok(served_by(&self.dsn))
    }

    async fn close(&self) -> Result<()> {
        self.close_inner()
    }
}

pub struct MockTx {
    dsn: String,
    log: Arc<CallLog>,
}

#[async_trait]
impl Tx for MockTx {
    async fn exec(&self, _sql: &str, _args: &[Value]) -> Result<ExecResult> {
        self.log.record(&self.dsn, "tx.exec");
        Ok(ExecResult { rows_affected: 1, last_insert_id: None })
    }

    async fn query(&self, _sql: &str, _args: &[Value]) -> Result<Rows> {
        self.log.record(&self.dsn, "tx.query");
        Ok(served_by(&self.dsn))
    }

    async fn named_exec(&self, _sql: &str, _args: &NamedArgs) -> Result<ExecResult> {
        self.log.record(&self.dsn, "tx.named_exec");
        Ok(ExecResult { rows_affected: 1, last_insert_id: None })
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.log.record(&self.dsn, "commit");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.log.record(&self.dsn, "rollback");
        Ok(())
    }
}
