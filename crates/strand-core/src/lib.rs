//! # strand-core
//!
//! Types shared by every part of the Strand data-app runtime: records and
//! payloads, the [`Function`] transform contract, the [`StrandError`] taxonomy
//! and app/process configuration.
//!
//! Runners live in `strand-runtime`; the function server in `strand-server`.

pub mod config;
pub mod error;
pub mod function;
pub mod record;

pub use config::{AppConfig, ProcessConfig};
pub use error::{ApiError, ErrorCategory, StrandError, StrandResult};
pub use function::{Function, function_name};
pub use record::{Payload, PayloadError, Record, RecordWithError};

/// Prelude for data app authors.
///
/// ```ignore
/// use strand_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{StrandError, StrandResult};
    pub use crate::function::Function;
    pub use crate::record::{Payload, Record, RecordWithError};
}
