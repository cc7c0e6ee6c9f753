//! Isolated Python execution engine.
//!
//! One [`Sandbox`] owns one virtual environment. It runs scripts under a
//! wall-clock timeout, installs and lists packages with the environment's own
//! pip, and can tear the environment down and rebuild it. Every operation
//! returns an [`ExecutionResult`]; faults never escape as errors or panics.
//!
//! Isolation means a separate installation and package set. Scripts run with
//! the caller's privileges and full filesystem and network access.

pub mod common;
pub mod env;
pub mod error;
pub mod log;
pub mod packages;
pub mod result;
pub mod runner;
pub mod sandbox;

#[cfg(test)]
pub(crate) mod testing;

pub use env::builder::{Installation, Provisioner, VenvProvisioner};
pub use error::SandboxError;
pub use packages::PackageRequest;
pub use result::ExecutionResult;
pub use sandbox::{Sandbox, SandboxInfo};
