/*!
 This module contains logic to read message rows from the iMessage database.
*/

pub mod messages;
pub mod table;
