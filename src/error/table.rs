/*!
 Errors that can happen when extracting data from a `SQLite` table.
*/

use std::{
    error::Error,
    fmt::{Display, Formatter, Result},
};

/// Errors that can happen when extracting data from a `SQLite` table
#[derive(Debug)]
pub enum TableError {
    Messages(rusqlite::Error),
    CannotConnect(String),
}

impl Display for TableError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        match self {
            TableError::Messages(why) => write!(fmt, "Failed to parse messages row: {why}"),
            TableError::CannotConnect(why) => write!(fmt, "{why}"),
        }
    }
}

impl Error for TableError {}
