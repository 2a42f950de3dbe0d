/*!
 * Utility functions for treegen
 */

use std::path::Path;

use ignore::WalkBuilder;
use once_cell::sync::Lazy;
use walkdir::WalkDir;

use crate::config::Config;
use crate::matcher::should_exclude;

/// Count files the scanner will visit, for progress tracking
pub fn count_files(config: &Config) -> u64 {
    let root = config.root.clone();
    let rules = config.rules.clone();
    let excluded = move |path: &Path| {
        path.strip_prefix(&root)
            .map(|rel| !rel.as_os_str().is_empty() && should_exclude(rel, &rules))
            .unwrap_or(false)
    };

    if config.respect_gitignore {
        WalkBuilder::new(&config.root)
            .hidden(false)
            .require_git(false)
            .filter_entry(move |e| !excluded(e.path()))
            .build()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_some_and(|ft| !ft.is_dir()))
            .count() as u64
    } else {
        WalkDir::new(&config.root)
            .into_iter()
            .filter_entry(|e| !excluded(e.path()))
            .filter_map(Result::ok)
            .filter(|e| !e.file_type().is_dir())
            .count() as u64
    }
}

/// Format a human-readable file size
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

/// Default exclusion patterns, parsed with [`crate::matcher::Rule::parse`]
pub static DEFAULT_IGNORE: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        // Version Control
        ".git",
        ".svn",
        ".hg",
        ".bzr",
        // OS Files
        ".DS_Store",
        "Thumbs.db",
        "desktop.ini",
        // Dependencies
        "node_modules",
        "bower_components",
        ".npm",
        "package-lock.json",
        "yarn.lock",
        ".yarn",
        ".pnpm-store",
        // Python
        "__pycache__",
        ".pytest_cache",
        ".mypy_cache",
        ".tox",
        "venv",
        ".venv",
        "*.pyc",
        "*.pyo",
        "*.egg-info",
        // Rust
        "target",
        "Cargo.lock",
        // IDEs & Editors
        ".idea",
        ".vscode",
        ".vs",
        "*.swp",
        "*.swo",
        "*~",
        // Caches
        ".cache",
        ".sass-cache",
        ".eslintcache",
        // Other Build Tools
        ".gradle",
        "*.class",
        // JavaScript/TypeScript
        ".next",
        ".nuxt",
        "*.tsbuildinfo",
        // Terraform
        ".terraform",
    ]
});
