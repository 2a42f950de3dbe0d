/*!
 * Core types and data structures for treegen
 */

use std::fmt;
use std::path::PathBuf;

use crate::transform::Language;

/// Represents a directory in the scanned tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryNode {
    /// Directory name
    pub name: String,
    /// Relative path from scan root (empty for the root itself)
    pub path: PathBuf,
    /// Directory contents: subdirectories first, then files, each by name
    pub contents: Vec<Node>,
}

/// Represents a file in the scanned tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    /// File name
    pub name: String,
    /// Relative path from scan root
    pub path: PathBuf,
    /// Language hint derived from the extension
    pub language: Option<Language>,
    /// Whether the file's content is part of the template
    pub included: bool,
    /// (Possibly transformed) content; always `None` when not included
    pub content: Option<String>,
}

impl FileNode {
    /// A file whose content is part of the template
    pub fn included(
        name: String,
        path: PathBuf,
        language: Option<Language>,
        content: String,
    ) -> Self {
        Self {
            name,
            path,
            language,
            included: true,
            content: Some(content),
        }
    }

    /// A file that only appears in the structural listing
    pub fn listed(name: String, path: PathBuf, language: Option<Language>) -> Self {
        Self {
            name,
            path,
            language,
            included: false,
            content: None,
        }
    }
}

/// A generic tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Directory node
    Directory(DirectoryNode),
    /// File node
    File(FileNode),
}

impl Node {
    /// Entry name
    pub fn name(&self) -> &str {
        match self {
            Node::Directory(dir) => &dir.name,
            Node::File(file) => &file.name,
        }
    }
}

impl DirectoryNode {
    /// Every file in the subtree, in listing (depth-first) order
    pub fn files(&self) -> Vec<&FileNode> {
        fn collect<'a>(dir: &'a DirectoryNode, out: &mut Vec<&'a FileNode>) {
            for node in &dir.contents {
                match node {
                    Node::Directory(sub) => collect(sub, out),
                    Node::File(file) => out.push(file),
                }
            }
        }

        let mut files = Vec::new();
        collect(self, &mut files);
        files
    }

    /// Number of nodes below this directory
    pub fn entry_count(&self) -> usize {
        self.contents
            .iter()
            .map(|node| match node {
                Node::Directory(dir) => 1 + dir.entry_count(),
                Node::File(_) => 1,
            })
            .sum()
    }
}

/// Why a file was skipped or degraded during a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticKind {
    /// File or directory could not be read
    Unreadable,
    /// File exceeds the configured size limit
    TooLarge,
    /// File is binary or not valid UTF-8
    Binary,
    /// Transformation failed; original text was used
    TransformFallback,
    /// Symbolic link target does not exist
    BrokenLink,
    /// Symbolic link points back to one of its ancestors
    CyclicLink,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unreadable => "unreadable",
            Self::TooLarge => "too large",
            Self::Binary => "binary",
            Self::TransformFallback => "untransformed",
            Self::BrokenLink => "broken link",
            Self::CyclicLink => "cyclic link",
        };
        f.write_str(label)
    }
}

/// A skipped or degraded entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Diagnostic {
    /// Relative path from scan root
    pub path: PathBuf,
    /// Category
    pub kind: DiagnosticKind,
    /// Human readable detail
    pub message: String,
}
