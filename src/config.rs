/*!
 * Configuration handling for treegen
 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::matcher::Rule;
use crate::session::DEFAULT_SESSION_FILE;
use crate::transform::TransformOptions;
use crate::utils::DEFAULT_IGNORE;
use crate::{ensure, error};

/// Output format of the rendered template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Indented tree followed by fenced content blocks
    #[default]
    Text,
    /// The same information as an XML document
    Xml,
}

/// What to do with directories left empty after filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyDirPolicy {
    /// Keep them as empty directory nodes
    #[default]
    Show,
    /// Leave them out of the tree
    Hide,
}

/// Per-file selection saved alongside a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    /// Whether the file's content is included
    #[serde(default = "default_true")]
    pub include: bool,
    /// Transform flags overriding the global ones for this file
    #[serde(default)]
    pub transform: Option<TransformOptions>,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            include: true,
            transform: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Command-line arguments for treegen
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "treegen",
    version = env!("CARGO_PKG_VERSION"),
    about = "Render a project tree and its sources as an LLM prompt template",
    long_about = "Walks a project directory, lists its structure and appends the (optionally stripped) content of the selected files, producing a single text ready to paste into a Large Language Model prompt."
)]
pub struct Args {
    /// Run non-interactively (no prompts)
    #[clap(long)]
    pub cli: bool,

    /// Project root to scan
    #[clap(long, default_value = ".")]
    pub dir: PathBuf,

    /// Output file, relative to the project root ("-" for stdout)
    #[clap(short, long, default_value = "template.txt")]
    pub output: PathBuf,

    /// Output format
    #[clap(long, value_enum, default_value_t = OutputFormat::default())]
    pub format: OutputFormat,

    /// Comma-separated exclusion rules (names, globs, or name:/glob: prefixed)
    #[clap(short, long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Do not apply the built-in exclusion list
    #[clap(long)]
    pub no_default_excludes: bool,

    /// Only include the content of recognized source files
    #[clap(long)]
    pub source_only: bool,

    /// Remove comments from included files
    #[clap(long)]
    pub strip_comments: bool,

    /// Remove docstrings from included files
    #[clap(long)]
    pub strip_docstrings: bool,

    /// Keep only function signatures (and docstrings)
    #[clap(long)]
    pub skeleton: bool,

    /// Comma-separated names of functions/methods to remove
    #[clap(long = "remove-function", value_delimiter = ',')]
    pub remove_functions: Vec<String>,

    /// Keep runs of blank lines as they are
    #[clap(long)]
    pub keep_blank_lines: bool,

    /// Leave directories that end up empty out of the tree
    #[clap(long)]
    pub hide_empty_dirs: bool,

    /// Honour .gitignore files
    #[clap(long)]
    pub respect_gitignore: bool,

    /// Project description placed at the top of the template
    #[clap(long)]
    pub description: Option<String>,

    /// Files larger than this (in bytes) are listed without content
    #[clap(long, default_value_t = 1_048_576)]
    pub max_file_size: u64,

    /// Number of threads used to read and transform files
    #[clap(long, default_value = "4")]
    pub threads: usize,

    /// Session file, relative to the project root
    #[clap(long, default_value = DEFAULT_SESSION_FILE)]
    pub session: PathBuf,

    /// Replace the configuration with the saved session
    #[clap(long)]
    pub load_session: bool,

    /// Save the configuration after a successful run
    #[clap(long)]
    pub save_session: bool,

    /// Generate shell completions
    #[clap(long = "generate", value_enum)]
    pub generate: Option<Shell>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress logs, progress and the summary report
    #[clap(short, long)]
    pub quiet: bool,
}

/// Application configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Project root to scan
    pub root: PathBuf,

    /// Output file (relative paths resolve against the root)
    pub output_file: PathBuf,

    /// Output format
    pub format: OutputFormat,

    /// Exclusion rules
    pub rules: Vec<Rule>,

    /// Only include content of recognized source files
    pub source_only: bool,

    /// Whether to respect .gitignore files
    pub respect_gitignore: bool,

    /// Policy for directories emptied by filtering
    pub empty_dirs: EmptyDirPolicy,

    /// Size limit for included content
    pub max_file_size: u64,

    /// Description placed at the top of the template
    pub description: Option<String>,

    /// Global transform flags
    pub transform: TransformOptions,

    /// Per-file selections keyed by `/`-separated relative path
    pub file_settings: BTreeMap<String, FileSettings>,

    /// Number of threads to use for processing
    pub num_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            output_file: PathBuf::from("template.txt"),
            format: OutputFormat::Text,
            rules: Vec::new(),
            source_only: false,
            respect_gitignore: false,
            empty_dirs: EmptyDirPolicy::Show,
            max_file_size: 1_048_576,
            description: None,
            transform: TransformOptions::default(),
            file_settings: BTreeMap::new(),
            num_threads: 4,
        }
    }
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args(args: Args) -> Self {
        let mut rules = if args.no_default_excludes {
            Vec::new()
        } else {
            default_rules()
        };
        rules.extend(
            args.exclude
                .iter()
                .filter(|s| !s.trim().is_empty())
                .map(|s| Rule::parse(s)),
        );

        Self {
            root: args.dir,
            output_file: args.output,
            format: args.format,
            rules,
            source_only: args.source_only,
            respect_gitignore: args.respect_gitignore,
            empty_dirs: if args.hide_empty_dirs {
                EmptyDirPolicy::Hide
            } else {
                EmptyDirPolicy::Show
            },
            max_file_size: args.max_file_size,
            description: args.description.filter(|d| !d.trim().is_empty()),
            transform: TransformOptions {
                strip_comments: args.strip_comments,
                strip_docstrings: args.strip_docstrings,
                strip_function_bodies: args.skeleton,
                removed_functions: args
                    .remove_functions
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                collapse_blank_lines: !args.keep_blank_lines,
            },
            file_settings: BTreeMap::new(),
            num_threads: args.threads,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.root.is_dir(),
            Config,
            "Target directory not found: {}",
            self.root.display()
        );

        if let Some(path) = self.output_path() {
            if let Some(parent) = path.parent() {
                ensure!(
                    parent.as_os_str().is_empty() || parent.exists(),
                    Config,
                    "Output directory not found: {}",
                    parent.display()
                );
            }
        }

        if self.num_threads == 0 {
            return Err(error!(InvalidArgument, "--threads must be at least 1"));
        }

        Ok(())
    }

    /// Where the template is written; `None` means stdout
    pub fn output_path(&self) -> Option<PathBuf> {
        if self.output_file == Path::new("-") {
            None
        } else if self.output_file.is_absolute() {
            Some(self.output_file.clone())
        } else {
            Some(self.root.join(&self.output_file))
        }
    }

    /// Transform flags in effect for a file
    pub fn transform_for(&self, relative: &str) -> &TransformOptions {
        self.file_settings
            .get(relative)
            .and_then(|s| s.transform.as_ref())
            .unwrap_or(&self.transform)
    }

    /// Whether the user deselected a file
    pub fn is_deselected(&self, relative: &str) -> bool {
        self.file_settings
            .get(relative)
            .is_some_and(|s| !s.include)
    }
}

/// Built-in exclusion rules
pub fn default_rules() -> Vec<Rule> {
    DEFAULT_IGNORE
        .iter()
        .map(|p| Rule::parse(p))
        .chain(std::iter::once(Rule::name(DEFAULT_SESSION_FILE)))
        .collect()
}
