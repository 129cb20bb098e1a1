/*!
 Data structures and models used to read and decode message bodies.
*/

pub use message::Message;

pub mod body;
pub mod message;
pub mod models;
