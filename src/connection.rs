//! Connection and data source API.
//!
//! There is no network connection: a [`Connection`] wraps the in-process
//! executor and the options its commands run with. A [`DataSource`] hands
//! out connections that share one set of options.

use tracing::{debug, Level};

use crate::command::Command;
use crate::config::BridgeOptions;
use crate::error::{Error, Result};
use crate::executor::Executor;

#[cfg(feature = "spi")]
use crate::executor::spi::SpiExecutor;

/// A connection to the in-process executor.
///
/// Commands borrow the connection mutably, so at most one command (and one
/// open reader) is active per connection.
pub struct Connection<E: Executor> {
    executor: E,
    options: BridgeOptions,
    open: bool,
}

impl<E: Executor> Connection<E> {
    /// Connection with default options.
    pub fn new(executor: E) -> Self {
        Self::with_options(executor, BridgeOptions::default())
    }

    pub fn with_options(executor: E, options: BridgeOptions) -> Self {
        Self {
            executor,
            options,
            open: false,
        }
    }

    /// Confirm the executor is ready to accept statements.
    pub fn open(&mut self) -> Result<()> {
        if !self.executor.ready() {
            return Err(Error::executor(-1, "executor is not ready"));
        }
        self.open = true;
        debug!("connection opened");
        Ok(())
    }

    /// Mark the connection closed. Executor contexts are owned by commands
    /// and readers, so there is nothing to release here.
    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Create a command for `text`.
    ///
    /// Returns [`Error::EmptyCommand`] for empty or whitespace text.
    pub fn create_command(&mut self, text: impl Into<String>) -> Result<Command<'_, E>> {
        Command::new(self, text)
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }
}

#[cfg(feature = "spi")]
impl Connection<SpiExecutor> {
    /// Connection to the SPI executor of the current backend.
    pub fn spi() -> Self {
        Self::new(SpiExecutor::new())
    }
}

/// Builder for a [`DataSource`].
#[derive(Debug, Clone, Default)]
pub struct DataSourceBuilder {
    options: BridgeOptions,
}

impl DataSourceBuilder {
    /// Start from a connection string.
    ///
    /// Only `Read Only` and `Command Count` have an effect; host,
    /// credentials and the like are accepted and ignored.
    pub fn new(conn_str: &str) -> Result<Self> {
        Ok(Self {
            options: BridgeOptions::parse(conn_str)?,
        })
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.options.read_only = read_only;
        self
    }

    pub fn count_limit(mut self, count_limit: i64) -> Self {
        self.options.count_limit = count_limit;
        self
    }

    pub fn log_statements(mut self, level: Option<Level>) -> Self {
        self.options.log_statements = level;
        self
    }

    pub fn build(self) -> DataSource {
        DataSource {
            options: self.options,
        }
    }
}

/// Factory for connections sharing one set of options.
#[derive(Debug, Clone, Default)]
pub struct DataSource {
    options: BridgeOptions,
}

impl DataSource {
    /// Data source for a connection string.
    pub fn create(conn_str: &str) -> Result<Self> {
        Ok(DataSourceBuilder::new(conn_str)?.build())
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Unopened connection over `executor`.
    pub fn create_connection<E: Executor>(&self, executor: E) -> Connection<E> {
        Connection::with_options(executor, self.options.clone())
    }

    /// Opened connection over `executor`.
    pub fn open_connection<E: Executor>(&self, executor: E) -> Result<Connection<E>> {
        let mut connection = self.create_connection(executor);
        connection.open()?;
        Ok(connection)
    }

    /// Opened connection to the SPI executor of the current backend.
    #[cfg(feature = "spi")]
    pub fn open_spi_connection(&self) -> Result<Connection<SpiExecutor>> {
        self.open_connection(SpiExecutor::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::{Call, MockExecutor};

    #[test]
    fn test_open_and_close() {
        let mut conn = Connection::new(MockExecutor::new());
        assert!(!conn.is_open());
        conn.open().unwrap();
        assert!(conn.is_open());
        conn.close();
        assert!(!conn.is_open());
        assert_eq!(conn.executor().calls(), &[Call::Ready]);
    }

    #[test]
    fn test_open_not_ready() {
        let mut executor = MockExecutor::new();
        executor.set_ready(false);
        let mut conn = Connection::new(executor);
        assert!(conn.open().unwrap_err().is_executor());
        assert!(!conn.is_open());
    }

    #[test]
    fn test_data_source_options_flow_to_connections() {
        let source = DataSourceBuilder::new("Host=localhost;Username=postgres;Read Only=true")
            .unwrap()
            .count_limit(100)
            .log_statements(None)
            .build();

        let conn = source.open_connection(MockExecutor::new()).unwrap();
        assert!(conn.is_open());
        assert!(conn.options().read_only);
        assert_eq!(conn.options().count_limit, 100);
        assert_eq!(conn.options().log_statements, None);
    }

    #[test]
    fn test_data_source_rejects_bad_connection_string() {
        assert!(matches!(
            DataSource::create("Command Count=lots"),
            Err(Error::InvalidConnectionString { .. })
        ));
    }
}
