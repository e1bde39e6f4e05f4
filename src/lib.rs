//! ScanHub Pipeline Library
//!
//! This library provides the core functionality for ScanHub: a uniform
//! execution and reporting pipeline for a fixed catalog of security
//! analysis tools. Tools are either in-process rule evaluators or
//! out-of-process analyzer scripts supervised as bounded child processes.

pub mod config;
pub mod error;
pub mod metrics;
pub mod persist;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod request;
pub mod server;
pub mod supervisor;
pub mod tools;
