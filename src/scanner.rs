/*!
 * Directory and file scanning functionality
 *
 * The walk is depth-first and iterative: every directory being built lives
 * in a [`Frame`] on an explicit stack together with the canonical paths of
 * its ancestors, which is what symbolic link cycle detection checks against.
 */

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ignore::WalkBuilder;
use indicatif::ProgressBar;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::{Config, EmptyDirPolicy};
use crate::error::{Result, TreegenError};
use crate::matcher::{matching_rules, should_exclude, slash_path};
use crate::report::FileReportInfo;
use crate::transform::{transform, Language};
use crate::types::{Diagnostic, DiagnosticKind, DirectoryNode, FileNode, Node};
use crate::utils::format_file_size;

/// Bytes sampled when deciding whether a file is binary
const SAMPLE_SIZE: usize = 8192;

/// Scanner statistics
#[derive(Debug, Clone, Default)]
pub struct ScannerStatistics {
    /// Directories in the tree (root excluded)
    pub directories: usize,
    /// Files in the structural listing
    pub files_listed: usize,
    /// Files whose content is part of the template
    pub files_included: usize,
    /// Entries skipped by exclusion rules
    pub excluded_entries: usize,
    /// Total number of lines of included content
    pub total_lines: usize,
    /// Total number of characters of included content
    pub total_chars: usize,
    /// Details for each included file, keyed by relative path
    pub file_details: BTreeMap<String, FileReportInfo>,
    /// Skipped or degraded entries, sorted by path
    pub diagnostics: Vec<Diagnostic>,
}

/// Kind of a listed directory entry, without following links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Directory,
    File,
    /// Symbolic link pointing at a directory
    LinkedDirectory,
    /// Symbolic link pointing at a file
    LinkedFile,
    BrokenLink,
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    abs: PathBuf,
    rel: PathBuf,
    kind: EntryKind,
}

/// A directory whose node is still under construction
struct Frame {
    node: DirectoryNode,
    /// Subdirectories not yet visited, in listing order
    pending: std::vec::IntoIter<Entry>,
    /// File nodes, appended after the subdirectories on completion
    files: Vec<Node>,
    /// Canonical paths of this directory and all its ancestors
    ancestors: Vec<PathBuf>,
}

/// Result of processing one file
struct FileOutcome {
    node: FileNode,
    info: Option<FileReportInfo>,
    diagnostic: Option<Diagnostic>,
}

/// Scanner for directory contents
pub struct Scanner {
    /// Scanner configuration
    config: Config,
    /// Progress bar
    pub progress: Arc<ProgressBar>,
    /// Scanner statistics
    statistics: Mutex<ScannerStatistics>,
    /// Absolute path of the output file, never listed
    output_abs: Option<PathBuf>,
}

impl Scanner {
    /// Create a new scanner
    pub fn new(config: Config, progress: Arc<ProgressBar>) -> Self {
        let output_abs = config.output_path().and_then(|path| {
            let parent = fs::canonicalize(path.parent()?).ok()?;
            Some(parent.join(path.file_name()?))
        });
        Self {
            config,
            progress,
            statistics: Mutex::new(ScannerStatistics::default()),
            output_abs,
        }
    }

    /// Get scanner statistics
    pub fn get_statistics(&self) -> ScannerStatistics {
        let mut stats = self.stats().clone();
        stats.diagnostics.sort();
        stats
    }

    fn stats(&self) -> std::sync::MutexGuard<'_, ScannerStatistics> {
        self.statistics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Scan the root directory and return the directory tree
    pub fn scan(&self) -> Result<DirectoryNode> {
        let root = fs::canonicalize(&self.config.root).map_err(|e| {
            TreegenError::Config(format!(
                "Target directory not found: {}: {}",
                self.config.root.display(),
                e
            ))
        })?;
        if !root.is_dir() {
            crate::bail!(Config, "Not a directory: {}", self.config.root.display());
        }

        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        log::info!("Scanning {}", root.display());

        let entries = self.list(&root, Path::new("")).map_err(|e| TreegenError::FileAccess {
            path: root.clone(),
            source: e,
        })?;
        let mut stack = vec![self.open_frame(name, PathBuf::new(), entries, vec![root])];

        while let Some(frame) = stack.last_mut() {
            if let Some(sub) = frame.pending.next() {
                let ancestors = frame.ancestors.clone();
                if let Some(child) = self.descend(sub, ancestors) {
                    stack.push(child);
                }
                continue;
            }

            let Some(done) = stack.pop() else { break };
            let mut node = done.node;
            node.contents.extend(done.files);

            match stack.last_mut() {
                Some(parent) => {
                    if node.contents.is_empty() && self.config.empty_dirs == EmptyDirPolicy::Hide {
                        log::debug!("Hiding empty directory {}", node.path.display());
                        continue;
                    }
                    self.stats().directories += 1;
                    parent.node.contents.push(Node::Directory(node));
                }
                None => return Ok(node),
            }
        }

        crate::bail!(InvalidArgument, "scan stack emptied before the root completed")
    }

    /// Enter a subdirectory unless it closes a symbolic link cycle
    fn descend(&self, entry: Entry, mut ancestors: Vec<PathBuf>) -> Option<Frame> {
        let canonical = match fs::canonicalize(&entry.abs) {
            Ok(path) => path,
            Err(e) => {
                self.diagnose(&entry.rel, DiagnosticKind::Unreadable, e.to_string());
                return None;
            }
        };
        if ancestors.contains(&canonical) {
            log::warn!(
                "Not following {}: points back to {}",
                entry.rel.display(),
                canonical.display()
            );
            self.stats().excluded_entries += 1;
            self.diagnose(
                &entry.rel,
                DiagnosticKind::CyclicLink,
                format!("points back to ancestor {}", canonical.display()),
            );
            return None;
        }

        let entries = match self.list(&entry.abs, &entry.rel) {
            Ok(entries) => entries,
            Err(e) => {
                self.diagnose(&entry.rel, DiagnosticKind::Unreadable, e.to_string());
                Vec::new()
            }
        };
        ancestors.push(canonical);
        Some(self.open_frame(entry.name, entry.rel, entries, ancestors))
    }

    /// Start a directory: split its entries and process the files right away
    fn open_frame(
        &self,
        name: String,
        rel: PathBuf,
        entries: Vec<Entry>,
        ancestors: Vec<PathBuf>,
    ) -> Frame {
        let (dirs, files): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| {
            matches!(e.kind, EntryKind::Directory | EntryKind::LinkedDirectory)
        });

        // Order is preserved by the indexed parallel iterator
        let outcomes: Vec<FileOutcome> = files.par_iter().map(|e| self.process_file(e)).collect();

        let mut file_nodes = Vec::with_capacity(outcomes.len());
        {
            let mut stats = self.stats();
            for outcome in outcomes {
                stats.files_listed += 1;
                if let Some(info) = outcome.info {
                    stats.files_included += 1;
                    stats.total_lines += info.lines;
                    stats.total_chars += info.chars;
                    stats
                        .file_details
                        .insert(slash_path(&outcome.node.path), info);
                }
                if let Some(diagnostic) = outcome.diagnostic {
                    stats.diagnostics.push(diagnostic);
                }
                file_nodes.push(Node::File(outcome.node));
            }
        }

        Frame {
            node: DirectoryNode {
                name,
                path: rel,
                contents: Vec::new(),
            },
            pending: dirs.into_iter(),
            files: file_nodes,
            ancestors,
        }
    }

    /// List one directory level, excluded entries removed, sorted by name
    fn list(&self, abs: &Path, rel: &Path) -> std::io::Result<Vec<Entry>> {
        let mut entries = Vec::new();

        if self.config.respect_gitignore {
            let walker = WalkBuilder::new(abs)
                .max_depth(Some(1))
                .hidden(false)
                .require_git(false)
                .follow_links(false)
                .build();
            for result in walker {
                let entry = match result {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::warn!("Skipping entry in {}: {}", abs.display(), e);
                        continue;
                    }
                };
                if entry.depth() == 0 {
                    continue;
                }
                let is_symlink = entry.path_is_symlink();
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                if let Some(e) = self.entry(entry.path(), rel, is_symlink, is_dir) {
                    entries.push(e);
                }
            }
        } else {
            for result in WalkDir::new(abs).min_depth(1).max_depth(1) {
                let entry = result.map_err(std::io::Error::from)?;
                let ft = entry.file_type();
                if let Some(e) = self.entry(entry.path(), rel, ft.is_symlink(), ft.is_dir()) {
                    entries.push(e);
                }
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Classify a listed path; `None` if an exclusion rule matches
    fn entry(&self, path: &Path, parent_rel: &Path, is_symlink: bool, is_dir: bool) -> Option<Entry> {
        let name = path.file_name()?.to_string_lossy().into_owned();
        let rel = parent_rel.join(&name);

        if self.is_excluded(path, &rel) {
            self.stats().excluded_entries += 1;
            return None;
        }

        let kind = if is_symlink {
            match fs::metadata(path) {
                Ok(meta) if meta.is_dir() => EntryKind::LinkedDirectory,
                Ok(_) => EntryKind::LinkedFile,
                Err(_) => EntryKind::BrokenLink,
            }
        } else if is_dir {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        Some(Entry {
            name,
            abs: path.to_path_buf(),
            rel,
            kind,
        })
    }

    /// Check an entry against the exclusion rules and the output file
    pub fn is_excluded(&self, abs: &Path, rel: &Path) -> bool {
        if self.output_abs.as_deref() == Some(abs) {
            log::debug!("Skipping output file {}", rel.display());
            return true;
        }
        if !should_exclude(rel, &self.config.rules) {
            return false;
        }
        if log::log_enabled!(log::Level::Debug) {
            let rules: Vec<String> = matching_rules(rel, &self.config.rules)
                .iter()
                .map(|r| r.to_string())
                .collect();
            log::debug!("Excluding {} ({})", rel.display(), rules.join(", "));
        }
        true
    }

    /// Process a single file and return its node representation
    fn process_file(&self, entry: &Entry) -> FileOutcome {
        self.progress.inc(1);
        let display_name = if entry.name.len() > 40 {
            let cut = entry.name.len().saturating_sub(37);
            let cut = (cut..entry.name.len())
                .find(|&i| entry.name.is_char_boundary(i))
                .unwrap_or(entry.name.len());
            format!("...{}", &entry.name[cut..])
        } else {
            entry.name.clone()
        };
        self.progress.set_message(format!("Current file: {}", display_name));

        let language = Language::from_path(&entry.abs);
        let relative = slash_path(&entry.rel);
        let listed = |diagnostic: Option<(DiagnosticKind, String)>| FileOutcome {
            node: FileNode::listed(entry.name.clone(), entry.rel.clone(), language),
            info: None,
            diagnostic: diagnostic.map(|(kind, message)| Diagnostic {
                path: entry.rel.clone(),
                kind,
                message,
            }),
        };

        if entry.kind == EntryKind::BrokenLink {
            let target = fs::read_link(&entry.abs)
                .map(|t| t.display().to_string())
                .unwrap_or_default();
            return listed(Some((
                DiagnosticKind::BrokenLink,
                format!("target {} does not exist", target),
            )));
        }
        if self.config.is_deselected(&relative) {
            return listed(None);
        }
        if self.config.source_only && !language.is_some_and(|l| l.is_source()) {
            return listed(None);
        }

        let content = match self.read_text(entry) {
            Ok(content) => content,
            Err(diagnostic) => return listed(Some(diagnostic)),
        };

        let result = transform(&content, language, self.config.transform_for(&relative));
        if !result.removed.is_empty() {
            log::trace!("{}: {} removals", relative, result.removed.len());
        }
        let diagnostic = result.fallback.map(|err| Diagnostic {
            path: entry.rel.clone(),
            kind: DiagnosticKind::TransformFallback,
            message: err.to_string(),
        });

        let info = FileReportInfo {
            lines: result.text.lines().count(),
            chars: result.text.chars().count(),
        };
        FileOutcome {
            node: FileNode::included(entry.name.clone(), entry.rel.clone(), language, result.text),
            info: Some(info),
            diagnostic,
        }
    }

    /// Read a file as UTF-8 text, classifying failures
    fn read_text(&self, entry: &Entry) -> std::result::Result<String, (DiagnosticKind, String)> {
        let unreadable = |e: std::io::Error| (DiagnosticKind::Unreadable, e.to_string());

        let metadata = fs::metadata(&entry.abs).map_err(unreadable)?;
        if metadata.len() > self.config.max_file_size {
            return Err((
                DiagnosticKind::TooLarge,
                format!(
                    "{} exceeds the {} limit",
                    format_file_size(metadata.len()),
                    format_file_size(self.config.max_file_size)
                ),
            ));
        }

        let mut bytes = Vec::with_capacity(metadata.len() as usize);
        File::open(&entry.abs)
            .and_then(|mut file| file.read_to_end(&mut bytes))
            .map_err(unreadable)?;

        if looks_binary(&bytes) {
            return Err((DiagnosticKind::Binary, "binary content".to_string()));
        }
        String::from_utf8(bytes)
            .map_err(|e| (DiagnosticKind::Binary, format!("not valid UTF-8: {}", e.utf8_error())))
    }

    fn diagnose(&self, rel: &Path, kind: DiagnosticKind, message: String) {
        log::warn!("{}: {} ({})", rel.display(), kind, message);
        self.stats().diagnostics.push(Diagnostic {
            path: rel.to_path_buf(),
            kind,
            message,
        });
    }
}

/// NUL bytes or a high share of control characters in the leading sample
pub fn looks_binary(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(SAMPLE_SIZE)];
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }
    let control = sample
        .iter()
        .filter(|&&b| b < 9 || (b > 13 && b < 32))
        .count();
    control as f32 / sample.len() as f32 >= 0.1
}
