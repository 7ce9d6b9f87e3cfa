//! Workflow stages
//!
//! Each stage is one transformation of the [`RunState`](super::RunState).
//! Stages emit `started` on entry and `completed` or `failed` on exit.

pub mod generate;
pub mod grade;
pub mod retrieve;
pub mod route;
pub mod web_search;

/// Separator between document contents in the generation context
pub const CONTEXT_SEPARATOR: &str = "\n\n";
