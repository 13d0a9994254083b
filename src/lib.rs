//! aeroschema - evolving document schemas with transactional merge and
//! write-time enforcement
//!
//! - `schema`: field types, persisted type descriptors, document classes
//! - `validator`: validator trees per backing collection and their checks
//! - `containers`: list and dict wrappers that validate every mutation
//! - `reference`: dataset lifecycle (create, load, commit, delete)
//! - `store`: backing document store with transactions

pub mod cli;
pub mod config;
pub mod containers;
pub mod observability;
pub mod reference;
pub mod schema;
pub mod store;
pub mod validator;
