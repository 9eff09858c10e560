//! Evaluated-schema models shared between the wire protocol and the projector

mod diagnostic;
mod parameter;

pub use diagnostic::*;
pub use parameter::*;
