//! Writing new objects into an incremental update.
//!
//! Most of an incremental update is produced by splicing bytes that already
//! exist (see [`crate::patch`]). The pieces here cover the rest: turning a
//! parsed [`Value`](crate::object::Value) back into PDF syntax, and copying
//! an object graph out of another document.
//!
//! ## Architecture
//!
//! ```text
//! source PdfDocument
//!     ↓
//! [ObjectCopier] (reachable objects, fresh numbers in the target)
//!     ↓
//! [ObjectSerializer] (Value → bytes, references renumbered)
//!     ↓
//! target edit buffer
//! ```

mod object_copier;
mod object_serializer;

pub use object_copier::ObjectCopier;
pub use object_serializer::{ObjectSerializer, format_number};
