//! changegate engine - change-workflow orchestration
//!
//! Coordinates the core vocabulary with a versioned store reached through an
//! injected `SessionFactory`. Every command opens its own session, bound to
//! one branch, and drops it when the command returns.

pub mod commands;
