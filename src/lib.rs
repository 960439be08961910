//! gokart - build, check and test tooling for Go projects.
//!
//! gokart merges standalone Go programs into a single vendored tree that
//! one binary can dispatch into, runs a fixed set of analysis tools and
//! normalizes what they print into issues, and runs `go test` over every
//! package of a project.
//!
//! # Architecture
//!
//! Go sources are read with tree-sitter:
//!
//! - `gosrc`: Go syntax access, build constraints and import grouping
//! - `paths`: workspace roots, import paths and reported-path normalization
//! - `amalgomate`: copying, rewriting and isolating programs, dispatch file
//! - `dispatch`: argv-prefix dispatch to routines inside one executable
//! - `issue`: the issue model and the line parsers that produce issues
//! - `filter`: issue filters and the exclude descriptor
//! - `check`: check definitions, the driver and the built-in checks
//! - `gotest`: `go test` orchestration, placeholders and JUnit output
//! - `config`: YAML configuration documents
//! - `report`: output formatting (text, JSON)
//! - `shutdown`: exit handlers run on SIGINT/SIGTERM
//!
//! # Adding a Check
//!
//! Add a [`check::CheckDefinition`] to `check::DEFINITIONS`. Checks written
//! in Rust also go into `check::builtin::dispatcher`.

pub mod amalgomate;
pub mod check;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod gosrc;
pub mod gotest;
pub mod issue;
pub mod logging;
pub mod packages;
pub mod paths;
pub mod process;
pub mod report;
pub mod shutdown;

pub use amalgomate::{Amalgomator, Manifest};
pub use check::{CheckDefinition, CheckResult, Driver, PackageSelection};
pub use config::{AmalgomateConfig, CheckConfig, TestConfig};
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use gotest::{Orchestrator, TestReport};
pub use issue::Issue;
