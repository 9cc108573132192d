//! In-process SPI query bridge
//!
//! An ADO.NET-shaped command API (connections, commands, parameters, data
//! readers) that runs SQL through the embedded executor of the backend it is
//! loaded into, instead of over a network connection.
//!
//! The executor is reached through the [`executor::Executor`] trait. The
//! `spi` feature links the production binding in [`executor::spi`]; the
//! `mock` feature adds `executor::mock::MockExecutor`, a scripted stand-in.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "spi")]
//! # fn main() -> pldotnet_spi_bridge::Result<()> {
//! use pldotnet_spi_bridge::DataSource;
//!
//! let source = DataSource::create("Read Only=false")?;
//! let mut conn = source.open_spi_connection()?;
//!
//! let inserted = conn
//!     .create_command("insert into users (name) values (@name)")?
//!     .with_parameter("@name", "alice")
//!     .execute_non_query()?;
//! println!("inserted {inserted}");
//!
//! let mut cmd = conn.create_command("select id, name from users where name = @name")?;
//! cmd.parameters_mut().add_with_value("@name", "alice");
//! let mut reader = cmd.execute_reader()?;
//! while reader.read()? {
//!     let id: i64 = reader.get(0)?;
//!     let name: Option<String> = reader.get_by_name("name")?;
//!     println!("{id}: {name:?}");
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "spi"))]
//! # fn main() {}
//! ```

pub mod binder;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod parameter;
pub mod reader;
mod session;
pub mod types;

// Re-export main types
pub use command::{Command, PreparedStatement};
pub use config::BridgeOptions;
pub use connection::{Connection, DataSource, DataSourceBuilder};
pub use error::{Error, Result};
pub use executor::{Datum, Executor};
pub use parameter::{Parameter, ParameterStyle, Parameters};
pub use reader::DataReader;
pub use types::{BaseType, Column, ColumnInfo, DbType, FromValue, Oid, Value, ValueError};
