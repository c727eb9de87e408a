//! Code generation for plugforge
//!
//! Renders the per-platform bootstrap class that adapts a host's native
//! entry point to the unified plugin lifecycle.

pub mod bootstrap;
pub mod template;

pub use bootstrap::{CodeEmitter, GENERATOR_VERSION};
pub use template::{render_str, Template, TemplateError, TemplateVars};
