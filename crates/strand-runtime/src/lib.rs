//! # strand-runtime
//!
//! Runners for Strand data apps.
//!
//! - [`LocalRuntime`] reads fixture files and runs functions in-process.
//! - [`PlatformRuntime`] provisions pipelines, connectors and functions on a
//!   [`ControlPlane`], or only records them into a deploy spec.
//!
//! Both implement [`Runtime`], so the same [`App`] runs unchanged under either.

pub mod contract;
pub mod local;
pub mod platform;
pub mod registry;
pub mod secrets;
pub mod v0;

pub use contract::{App, Records, RecordsWithErrors, Resource, ResourceConfigs, Runtime};
pub use local::{DiagnosticSink, LocalRuntime};
pub use platform::spec::{DeploySpec, RustcProbe, SpecStamp, ToolchainProbe};
pub use platform::{
    ControlPlane, HttpControlPlane, InMemoryControlPlane, PlatformRuntime, ResourceUsage,
};
pub use registry::FunctionRegistry;
pub use secrets::{ProcessEnv, SecretSource};
