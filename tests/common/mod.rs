//! Common test utilities for graph-sync integration tests
//!
//! Scripted collaborators that count their calls, plus helpers for laying
//! out result documents on disk.

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;

pub use fakes::{RecordingMetrics, ScriptedIndex, ScriptedSource};
pub use fixtures::{solver_payload, write_document, write_solver_documents};
