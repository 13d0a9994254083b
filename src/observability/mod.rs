//! Observability subsystem for aeroschema
//!
//! This module provides:
//! - Structured logging with deterministic field ordering
//! - Typed lifecycle events
//! - Begin/complete scopes around multi-step operations
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use aeroschema::observability::{Event, Logger, ObservationScope};
//!
//! Logger::info(Event::DatasetCreated.as_str(), &[("name", "ds1")]);
//!
//! let scope = ObservationScope::new("COMMIT");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{render_fields, Logger, Severity};
pub use scope::ObservationScope;
