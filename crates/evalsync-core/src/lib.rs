//! evalsync-core - Wire protocol and pure components for the evalsync engine
//!
//! This crate holds everything that needs no I/O: the JSON frame types
//! exchanged with the evaluation service, the evaluated-schema models
//! (parameters, options, validations, diagnostics), and the three pure
//! components of the sync pipeline:
//!
//! - [`Correlator`] - matches responses to requests by monotonically
//!   increasing id and rejects stale ones
//! - [`projector`] - turns an accepted response into stably ordered,
//!   widget-classified field descriptors
//! - [`report`] - maps service diagnostics to display records
//!
//! The connection and session machinery lives in `evalsync-client`.

pub mod correlator;
pub mod models;
pub mod projector;
pub mod protocol;
pub mod report;

pub use correlator::Correlator;
pub use models::*;
pub use projector::{project, FieldDescriptor, WidgetKind};
pub use protocol::{Request, Response};
pub use report::{display_record, display_records, DisplayRecord, Level};
