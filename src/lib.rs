/*!
 * treegen - Render a project tree and its sources as an LLM prompt template
 *
 * This library walks a project directory, filters it with exclusion rules,
 * optionally strips comments, docstrings and functions from the sources,
 * and renders everything as a single deterministic text. The chosen
 * configuration can be saved and restored as a versioned session.
 */

pub mod config;
pub mod error;
pub mod matcher;
pub mod report;
pub mod scanner;
pub mod session;
pub mod transform;
pub mod types;
pub mod utils;
pub mod writer;

#[cfg(test)]
mod tests;

// Re-export main components for easier access
pub use config::{Args, Config, EmptyDirPolicy, FileSettings, OutputFormat};
pub use error::{PersistenceError, Result, TransformError, TreegenError};
pub use matcher::{should_exclude, Rule, RuleKind};
pub use report::{FileReportInfo, Reporter, ScanReport};
pub use scanner::{Scanner, ScannerStatistics};
pub use session::{SessionRecord, SessionStore, SCHEMA_VERSION};
pub use transform::{transform, Language, TransformOptions, TransformResult};
pub use types::{Diagnostic, DiagnosticKind, DirectoryNode, FileNode, Node};
pub use utils::{count_files, format_file_size};
pub use writer::TemplateWriter;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
