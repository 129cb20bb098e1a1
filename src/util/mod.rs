/*!
 This module defines the decoding stages used to recover text from message bodies.
*/

pub mod format;
pub mod garbage;
pub mod metadata;
pub mod plist;
pub mod typedstream;
