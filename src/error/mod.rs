/*!
 Errors that can happen while reading message rows and decoding their archived body data.
*/

pub mod plist;
pub mod table;
pub mod typedstream;
