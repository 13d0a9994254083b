//! Validating containers for aeroschema
//!
//! Wrappers around list and dict field values bound to a path, the live
//! schema of a reference, and a nesting level. Every mutation validates the
//! incoming value before it lands; reads are pass-through.
//!
//! Containers are only built by the reference, by records, or by other
//! containers, so every container is bound to a schema position.

mod dict;
mod list;
mod validate;

pub use dict::ValidatingDict;
pub use list::ValidatingList;
pub use validate::{Binding, Validated};

pub(crate) use validate::validate_field;
