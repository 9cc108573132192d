//! Commands: text, parameters and execution.

use tracing::debug;

use crate::binder::{self, BindPlan};
use crate::config::log_statement;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::parameter::{Parameter, Parameters};
use crate::reader::DataReader;
use crate::session::Session;
use crate::types::{Oid, Value};

/// A statement prepared by the executor, with its rewritten text and
/// parameter OIDs.
#[derive(Debug)]
pub struct PreparedStatement<S> {
    handle: S,
    sql: String,
    param_oids: Vec<Oid>,
}

impl<S> PreparedStatement<S> {
    pub(crate) fn new(handle: S, sql: String, param_oids: Vec<Oid>) -> Self {
        Self {
            handle,
            sql,
            param_oids,
        }
    }

    /// Native statement handle.
    pub fn handle(&self) -> &S {
        &self.handle
    }

    /// Text as prepared, with `$1..$n` placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_oids(&self) -> &[Oid] {
        &self.param_oids
    }
}

fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        Err(Error::EmptyCommand)
    } else {
        Ok(())
    }
}

/// A SQL command bound to a connection.
///
/// Text starting with `select` is a query and runs through a cursor; any
/// other text is a non-query and runs to completion on execution.
///
/// # Example
///
/// ```
/// use pldotnet_spi_bridge::{Connection, Executor, Result};
///
/// fn scores<E: Executor>(conn: &mut Connection<E>, user_id: i64) -> Result<Vec<i32>> {
///     let mut cmd = conn
///         .create_command("select score from results where user_id = @id")?
///         .with_parameter("@id", user_id);
///
///     let mut scores = Vec::new();
///     let mut reader = cmd.execute_reader()?;
///     while reader.read()? {
///         scores.push(reader.get(0)?);
///     }
///     Ok(scores)
/// }
/// ```
pub struct Command<'c, E: Executor> {
    connection: &'c mut Connection<E>,
    text: String,
    parameters: Parameters,
    plan: Option<BindPlan>,
}

impl<'c, E: Executor> Command<'c, E> {
    pub(crate) fn new(connection: &'c mut Connection<E>, text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        validate_text(&text)?;
        Ok(Self {
            connection,
            text,
            parameters: Parameters::new(),
            plan: None,
        })
    }

    /// Command text. Named placeholders are replaced by `$1..$n` once the
    /// command has been prepared or executed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the command text.
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        validate_text(&text)?;
        self.text = text;
        self.plan = None;
        Ok(())
    }

    /// Whether the command runs through a cursor.
    pub fn is_query(&self) -> bool {
        self.text.trim_start().to_lowercase().starts_with("select")
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut Parameters {
        self.plan = None;
        &mut self.parameters
    }

    /// Add a named parameter.
    pub fn with_parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters_mut().add(Parameter::named(name, value));
        self
    }

    /// Add a positional parameter.
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.parameters_mut().add(Parameter::positional(value));
        self
    }

    /// Check parameters, rewrite placeholders and resolve parameter types
    /// ahead of execution.
    ///
    /// The plan is kept until the text or parameters change. No executor
    /// call is made.
    pub fn prepare(&mut self) -> Result<&BindPlan> {
        let plan = match self.plan.take() {
            Some(plan) => plan,
            None => {
                let plan = binder::plan(&self.text, &self.parameters)?;
                self.text.clone_from(&plan.sql);
                plan
            }
        };
        Ok(self.plan.insert(plan))
    }

    /// Execute the command and return a reader over its rows.
    ///
    /// Non-queries are executed to completion; the returned reader has no
    /// rows and reports the affected-row count.
    pub fn execute_reader(&mut self) -> Result<DataReader<'_, E>> {
        if !self.is_query() {
            let affected = self.execute_non_query()?;
            return Ok(DataReader::exhausted(affected));
        }

        let plan = self.prepare()?.clone();
        let options = self.connection.options().clone();
        let mut session = Session::begin(self.connection.executor_mut())?;
        let executor = session.executor();

        let handle = executor.prepare(&plan.sql, &plan.oids)?;
        debug!(sql = %plan.sql, parameters = plan.oids.len(), "prepared statement");
        let (datums, nulls) = binder::bind_values(&self.parameters, &plan.oids, executor)?;
        let cursor = executor.cursor_open(&handle, &datums, &nulls)?;
        log_statement(&options, &plan.sql, "opened cursor", None);

        let statement = PreparedStatement::new(handle, plan.sql, plan.oids);
        Ok(DataReader::open(session, statement, cursor))
    }

    /// Execute the command to completion, returning the affected-row count.
    pub fn execute_non_query(&mut self) -> Result<u64> {
        let plan = self.prepare()?.clone();
        let options = self.connection.options().clone();
        let mut session = Session::begin(self.connection.executor_mut())?;
        let executor = session.executor();

        let affected = if plan.oids.is_empty() {
            executor.execute(&plan.sql, options.read_only, options.count_limit)?
        } else {
            let handle = executor.prepare(&plan.sql, &plan.oids)?;
            debug!(sql = %plan.sql, parameters = plan.oids.len(), "prepared statement");
            let (datums, nulls) = binder::bind_values(&self.parameters, &plan.oids, executor)?;
            executor.execute_prepared(
                &handle,
                &datums,
                &nulls,
                options.read_only,
                options.count_limit,
            )?
        };
        session.finish();

        log_statement(&options, &plan.sql, "executed", Some(affected));
        Ok(affected)
    }

    /// First column of the first row, or [`Value::Null`] if there are no
    /// rows.
    pub fn execute_scalar(&mut self) -> Result<Value> {
        let mut reader = self.execute_reader()?;
        let value = if reader.read()? {
            reader.get_value(0)?
        } else {
            Value::Null
        };
        reader.close();
        Ok(value)
    }
}
