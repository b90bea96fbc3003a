//! Cube Slicer - HTTP query layer for OLAP cubes
//!
//! This library turns slicer-style HTTP requests into engine queries:
//! - Cut parsing (`date:2024,1-2024,6|product:tea;coffee`) into typed cuts
//! - Cell building with per-dimension replacement and authorization restriction
//! - Parameter normalization for drilldown, paging, ordering, depth and fields
//! - Dispatch to a pluggable browser for aggregate, cell, facts, fact,
//!   members and report queries

#![warn(clippy::all)]

pub mod calendar;
pub mod cell;
pub mod error;
pub mod model;
pub mod request;

/// Configuration management with TOML support
pub mod config;

/// Browser and authorizer traits, the workspace and the in-memory browser
pub mod engine;

/// Query requests, report parsing and per-endpoint dispatch
pub mod query;

/// Axum router, handlers and shared server state
pub mod api;

// Re-export main types
pub use cell::{Cell, Cut, CutKind};
pub use engine::{Workspace, WorkspaceBuilder};
pub use error::{Error, Result};
pub use model::{Cube, Model};
