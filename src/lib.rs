//! # orderstruct
//!
//! Two small, independent ordered-data primitives built from scratch:
//!
//! - [`skiplist`]: a probabilistic skip list implementing an ordered set of
//!   `(score, value)` pairs with ranked insert/delete/update.
//! - [`packed_list`]: a packed byte buffer storing a sequence of small
//!   integers and byte strings with no per-element heap allocation.
//!
//! They share nothing but [`bytestr::ByteStr`], the byte-string primitive
//! both use for values and comparisons.

pub mod bytestr;
pub mod error;
pub mod packed_list;
pub mod skiplist;

pub use bytestr::ByteStr;
pub use error::{Error, Result};
pub use packed_list::{entry::Value, PackedList};
pub use skiplist::{NodeHandle, SkipList};
