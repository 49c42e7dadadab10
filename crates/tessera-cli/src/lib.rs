//! # Tessera CLI
//!
//! Operator commands for a running Tessera deployment: counting, inspecting
//! and revoking refresh sessions in the configured store.
//!
//! ## Usage
//!
//! ```ignore
//! use tessera_cli::commands;
//!
//! let live = commands::count(&ctx, Some("web")).await?;
//! let flushed = commands::flush_namespace(&ctx, Some("web")).await?;
//! ```

pub mod commands;
