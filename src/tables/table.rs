/*!
 This module defines traits and helpers shared by database tables.
*/

use std::path::Path;

use rusqlite::{Connection, Error, OpenFlags, Result, Row, Statement};

use crate::error::table::TableError;

/// Defines behavior for SQL Table data
pub trait Table {
    /// Deserialize a single row of data into an instance of the struct that implements this Trait
    fn from_row(row: &Row) -> Result<Self>
    where
        Self: Sized;
    /// Get a statement that selects every row of the table
    fn get(db: &Connection) -> Result<Statement, TableError>;
    /// Map a row returned by a query into the struct, or the error that prevented it
    fn extract(item: Result<Result<Self, Error>, Error>) -> Result<Self, TableError>
    where
        Self: Sized;
}

/// Get a read-only connection to the iMessage `SQLite` database
pub fn get_connection(path: &Path) -> Result<Connection, TableError> {
    if !path.exists() {
        return Err(TableError::CannotConnect(format!(
            "Database not found at {}",
            path.display()
        )));
    }

    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(|why| {
        TableError::CannotConnect(format!(
            "Unable to read from chat database: {why}\nEnsure full disk access is enabled for your terminal emulator in System Settings > Security and Privacy > Full Disk Access"
        ))
    })
}

/// Message table name
pub const MESSAGE: &str = "message";
