/*!
 This module represents the columns of the `message` table needed to display a message body.

 Newer messages often leave the `text` column empty and store their content only in `attributedBody`,
 so both columns are read and handed to the [`Decoder`].
*/

use rusqlite::{Connection, Error, Result, Row, Statement};

use crate::{
    error::table::TableError,
    tables::{
        messages::body::Decoder,
        table::{Table, MESSAGE},
    },
};

/// Represents the body columns of a single row in the `message` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub rowid: i32,
    /// The plain text of the message, if the client wrote it
    pub text: Option<String>,
    /// The archived `NSAttributedString` holding the message text and its formatting
    pub attributed_body: Option<Vec<u8>>,
}

impl Table for Message {
    fn from_row(row: &Row) -> Result<Message> {
        Ok(Message {
            rowid: row.get("rowid")?,
            text: row.get("text").unwrap_or(None),
            attributed_body: row.get("attributedBody").unwrap_or(None),
        })
    }

    fn get(db: &Connection) -> Result<Statement, TableError> {
        db.prepare(&format!(
            "SELECT m.ROWID AS rowid, m.text, m.attributedBody FROM {MESSAGE} AS m ORDER BY m.ROWID"
        ))
        .map_err(TableError::Messages)
    }

    fn extract(message: Result<Result<Self, Error>, Error>) -> Result<Self, TableError> {
        match message {
            Ok(Ok(message)) => Ok(message),
            Err(why) | Ok(Err(why)) => Err(TableError::Messages(why)),
        }
    }
}

impl Message {
    /// Get the text to display for this message using the default [`Decoder`]
    pub fn body(&self) -> Option<String> {
        self.body_with(&Decoder::default())
    }

    /// Get the text to display for this message using a configured [`Decoder`]
    pub fn body_with(&self, decoder: &Decoder) -> Option<String> {
        decoder.decode(self.attributed_body.as_deref(), self.text.as_deref())
    }

    /// Call `callback` with every row of the `message` table, in `ROWID` order
    ///
    /// # Example:
    ///
    /// ```
    /// use rusqlite::Connection;
    /// use imessage_body::tables::messages::Message;
    ///
    /// let db = Connection::open_in_memory().unwrap();
    /// db.execute_batch("CREATE TABLE message (text TEXT, attributedBody BLOB); INSERT INTO message (text) VALUES ('Hi');").unwrap();
    ///
    /// let mut bodies = vec![];
    /// Message::stream(&db, |message| bodies.push(message.body())).unwrap();
    /// assert_eq!(bodies, vec![Some("Hi".to_string())]);
    /// ```
    pub fn stream<F>(db: &Connection, mut callback: F) -> Result<(), TableError>
    where
        F: FnMut(Message),
    {
        let mut statement = Message::get(db)?;
        let messages = statement
            .query_map([], |row| Ok(Message::from_row(row)))
            .map_err(TableError::Messages)?;

        for message in messages {
            callback(Message::extract(message)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::env::current_dir;
    use std::fs::File;
    use std::io::Read;

    use rusqlite::{params, Connection};

    use crate::tables::messages::{
        body::{Decoder, DecoderConfig},
        Message,
    };

    fn read_fixture(folder: &str, name: &str) -> Vec<u8> {
        let path = current_dir()
            .unwrap()
            .as_path()
            .join("test_data")
            .join(folder)
            .join(name);
        let mut file = File::open(path).unwrap();
        let mut bytes = vec![];
        file.read_to_end(&mut bytes).unwrap();
        bytes
    }

    fn fake_db(rows: &[(Option<&str>, Option<Vec<u8>>)]) -> Connection {
        let db = Connection::open_in_memory().unwrap();
        db.execute_batch("CREATE TABLE message (text TEXT, attributedBody BLOB)")
            .unwrap();
        for (text, body) in rows {
            db.execute(
                "INSERT INTO message (text, attributedBody) VALUES (?1, ?2)",
                params![text, body],
            )
            .unwrap();
        }
        db
    }

    fn read_all(db: &Connection) -> Vec<Message> {
        let mut messages = vec![];
        Message::stream(db, |message| messages.push(message)).unwrap();
        messages
    }

    #[test]
    fn can_read_rows() {
        let body = read_fixture("typedstream", "AttributedBodyTextOnly");
        let db = fake_db(&[(None, Some(body.clone())), (Some("Plain"), None)]);
        let messages = read_all(&db);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].rowid, 1);
        assert_eq!(messages[0].text, None);
        assert_eq!(messages[0].attributed_body, Some(body));
        assert_eq!(messages[1].rowid, 2);
        assert_eq!(messages[1].text, Some("Plain".to_string()));
        assert_eq!(messages[1].attributed_body, None);
    }

    #[test]
    fn can_decode_rows() {
        let db = fake_db(&[
            (None, Some(read_fixture("typedstream", "AttributedBodyTextOnly"))),
            (Some("ignored"), Some(read_fixture("plist", "HelloWorld"))),
            (Some("Unknown"), None),
            (Some("Fallback"), Some(read_fixture("plist", "Corrupt"))),
            (None, Some(read_fixture("plist", "Garbage"))),
            (None, None),
        ]);
        let bodies: Vec<Option<String>> = read_all(&db).iter().map(Message::body).collect();

        assert_eq!(
            bodies,
            vec![
                Some("Noter test".to_string()),
                Some("Hello, world!".to_string()),
                Some("Unknown".to_string()),
                Some("Fallback".to_string()),
                None,
                None,
            ]
        );
    }

    #[test]
    fn can_decode_with_config() {
        let message = Message {
            rowid: 1,
            text: Some("Hi".to_string()),
            attributed_body: Some(read_fixture("plist", "Garbage")),
        };
        assert_eq!(message.body(), Some("Hi".to_string()));

        let decoder = Decoder::new(DecoderConfig {
            fallback_on_rejected_body: false,
            ..DecoderConfig::default()
        });
        assert_eq!(message.body_with(&decoder), None);
    }

    #[test]
    fn cant_read_missing_table() {
        let db = Connection::open_in_memory().unwrap();
        assert!(Message::stream(&db, |_| {}).is_err());
    }
}
