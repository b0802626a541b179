//! Main library for Canon, used by its CLI.
//!
//! Canon turns a directory of coding-standard rule documents and a layered
//! configuration into a resolved rule set, then renders that rule set into
//! prompts for code-generation agents.

pub mod config;
pub mod conflicts;
pub mod overrides;
pub mod prompt;
pub mod rules;
pub mod snippet;
pub mod template;

