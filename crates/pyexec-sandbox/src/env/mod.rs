//! The isolated installation: a Python venv at one stable location.
//!
//! `builder` owns creation, verification and teardown. Execution and package
//! management receive the `Installation` only through the `Sandbox` lock.

pub mod builder;
