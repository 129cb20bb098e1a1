/*!
 Contains logic and data structures used to parse and deserialize `typedstream` data into native Rust data structures.

 ## Overview

 The typedstream format is a binary serialization protocol designed for `C` and `Objective-C` data structures.
 It is primarily used in Apple's Foundation framework, specifically within the `NSArchiver` and `NSUnarchiver` classes.
 Older `attributedBody` data is stored in this format.

 ## Origin

 The format is derived from the data structure used by NeXTSTEP's `NXTypedStream` APIs.

 ## Features

 - Pure Rust implementation for efficient and safe deserialization
 - No dependencies on Apple frameworks
 - Robust error handling for malformed or incomplete `typedstream` data
*/

pub mod extractor;
pub mod models;
pub mod parser;
