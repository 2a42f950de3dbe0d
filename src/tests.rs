/*!
 * Tests for treegen functionality
 */

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::ProgressBar;
use quick_xml::events::Event;
use quick_xml::Reader;
use tempfile::tempdir;
use walkdir::WalkDir;

use crate::config::{default_rules, Config, EmptyDirPolicy, FileSettings, OutputFormat};
use crate::error::{PersistenceError, Result, TreegenError};
use crate::matcher::{slash_path, Rule};
use crate::scanner::{Scanner, ScannerStatistics};
use crate::session::SessionStore;
use crate::types::{DiagnosticKind, DirectoryNode, FileNode, Node};
use crate::writer::TemplateWriter;

// Helper function to create a test directory structure
fn setup_test_directory() -> io::Result<tempfile::TempDir> {
    let temp_dir = tempdir()?;

    // Create a simple directory structure
    fs::create_dir(temp_dir.path().join("dir1"))?;
    fs::create_dir(temp_dir.path().join("dir2"))?;
    fs::create_dir(temp_dir.path().join("dir1").join("subdir"))?;

    // Create text files
    let mut file1 = File::create(temp_dir.path().join("file1.txt"))?;
    writeln!(file1, "This is a text file with content")?;

    let mut file2 = File::create(temp_dir.path().join("dir1").join("file2.txt"))?;
    writeln!(file2, "This is another text file\nwith multiple lines")?;

    let mut file3 = File::create(
        temp_dir
            .path()
            .join("dir1")
            .join("subdir")
            .join("file3.txt"),
    )?;
    writeln!(file3, "Nested file content")?;

    let mut script = File::create(temp_dir.path().join("dir1").join("tool.py"))?;
    writeln!(script, "def run():\n    return 1")?;

    Ok(temp_dir)
}

// Helper function adding entries that are skipped by default or degraded
fn setup_noisy_directory() -> io::Result<tempfile::TempDir> {
    let temp_dir = setup_test_directory()?;

    fs::create_dir(temp_dir.path().join(".git"))?;
    let mut git_file = File::create(temp_dir.path().join(".git").join("config"))?;
    writeln!(git_file, "[core]\n\trepositoryformatversion = 0")?;

    let mut bin_file = File::create(temp_dir.path().join("binary.bin"))?;
    bin_file.write_all(&[0u8, 1u8, 2u8, 3u8])?;

    Ok(temp_dir)
}

fn config_for(dir: &Path) -> Config {
    Config {
        root: dir.to_path_buf(),
        output_file: PathBuf::from("-"),
        num_threads: 1,
        ..Config::default()
    }
}

fn scan(config: &Config) -> Result<(DirectoryNode, ScannerStatistics)> {
    let scanner = Scanner::new(config.clone(), Arc::new(ProgressBar::hidden()));
    let root = scanner.scan()?;
    Ok((root, scanner.get_statistics()))
}

fn find_file<'a>(root: &'a DirectoryNode, relative: &str) -> Option<&'a FileNode> {
    root.files()
        .into_iter()
        .find(|f| slash_path(&f.path) == relative)
}

fn structure_lines(rendered: &str) -> Vec<&str> {
    rendered
        .split("\nFile contents:")
        .next()
        .unwrap_or_default()
        .lines()
        .skip(2)
        .collect()
}

// Test basic scanning and writing
#[test]
fn test_basic_scan() -> Result<()> {
    let temp_dir = setup_noisy_directory()?;
    let output_file = temp_dir.path().join("output.txt");

    let config = Config {
        output_file: output_file.clone(),
        rules: default_rules(),
        ..config_for(temp_dir.path())
    };

    let (root, stats) = scan(&config)?;
    TemplateWriter::new(config).write(&root)?;

    assert!(output_file.exists());
    let content = fs::read_to_string(&output_file)?;

    assert!(content.starts_with("Project structure:\n"));
    assert!(content.contains("├── dir1/\n"));
    assert!(content.contains("### dir1/subdir/file3.txt\n"));
    assert!(content.contains("This is a text file with content"));
    assert!(content.contains("```py\ndef run():"));

    // The .git directory is excluded by default
    assert!(!content.contains(".git"));

    // The binary file is listed without content
    assert!(content.contains("binary.bin"));
    assert!(!content.contains("### binary.bin"));
    assert_eq!(stats.diagnostics.len(), 1);
    assert_eq!(stats.diagnostics[0].kind, DiagnosticKind::Binary);
    assert_eq!(stats.diagnostics[0].path, PathBuf::from("binary.bin"));

    assert_eq!(stats.files_listed, 5);
    assert_eq!(stats.files_included, 4);
    assert_eq!(stats.excluded_entries, 1);
    assert_eq!(stats.directories, 3);

    Ok(())
}

// Every filesystem entry appears exactly once when no rule applies
#[test]
fn test_one_entry_per_filesystem_entry() -> Result<()> {
    let temp_dir = setup_noisy_directory()?;
    let config = config_for(temp_dir.path());

    let (root, _) = scan(&config)?;
    let on_disk = WalkDir::new(temp_dir.path()).min_depth(1).into_iter().count();
    assert_eq!(root.entry_count(), on_disk);

    let rendered = TemplateWriter::new(config).render(&root);
    assert_eq!(structure_lines(&rendered).len(), on_disk);

    Ok(())
}

// Directories first, then files, each sorted by name
#[test]
fn test_listing_order() -> Result<()> {
    let temp_dir = setup_test_directory()?;
    let (root, _) = scan(&config_for(temp_dir.path()))?;

    let names: Vec<&str> = root.contents.iter().map(Node::name).collect();
    assert_eq!(names, vec!["dir1", "dir2", "file1.txt"]);

    let files: Vec<String> = root.files().iter().map(|f| slash_path(&f.path)).collect();
    assert_eq!(
        files,
        vec![
            "dir1/subdir/file3.txt",
            "dir1/file2.txt",
            "dir1/tool.py",
            "file1.txt"
        ]
    );

    Ok(())
}

// Excluding a directory prunes its whole subtree
#[test]
fn test_directory_exclusion_prunes_subtree() -> Result<()> {
    let temp_dir = setup_test_directory()?;
    let config = Config {
        rules: vec![Rule::name("dir1")],
        ..config_for(temp_dir.path())
    };

    let (root, stats) = scan(&config)?;
    assert!(root.files().iter().all(|f| !f.path.starts_with("dir1")));

    let rendered = TemplateWriter::new(config).render(&root);
    assert!(!rendered.contains("dir1"));
    assert!(!rendered.contains("subdir"));
    assert!(!rendered.contains("file2.txt"));
    assert!(!rendered.contains("file3.txt"));
    assert!(rendered.contains("file1.txt"));
    assert_eq!(stats.excluded_entries, 1);

    Ok(())
}

// Glob rules match on the relative path as well as the name
#[test]
fn test_glob_rules() -> Result<()> {
    let temp_dir = setup_test_directory()?;
    let config = Config {
        rules: vec![Rule::parse("*.txt"), Rule::parse("dir1/subdir")],
        ..config_for(temp_dir.path())
    };

    let (root, _) = scan(&config)?;
    let files: Vec<String> = root.files().iter().map(|f| slash_path(&f.path)).collect();
    assert_eq!(files, vec!["dir1/tool.py"]);

    Ok(())
}

// A source file with a comment and docstring next to an excluded build dir
#[test]
fn test_strip_with_excluded_build_dir() -> Result<()> {
    let temp_dir = tempdir()?;
    fs::create_dir(temp_dir.path().join("src"))?;
    fs::create_dir(temp_dir.path().join("build"))?;
    fs::write(
        temp_dir.path().join("src").join("main.py"),
        "\"\"\"Entry module.\"\"\"\n# comment\ndef main():\n    \"\"\"Run it.\"\"\"\n    print(\"hello # not a comment\")\n",
    )?;
    fs::write(
        temp_dir.path().join("build").join("output.bin"),
        [0u8, 159, 146, 150],
    )?;

    let mut config = Config {
        rules: vec![Rule::name("build")],
        ..config_for(temp_dir.path())
    };
    config.transform.strip_comments = true;
    config.transform.strip_docstrings = true;

    let (root, stats) = scan(&config)?;
    let rendered = TemplateWriter::new(config).render(&root);

    assert!(rendered.contains("### src/main.py\n"));
    assert!(!rendered.contains("build"));
    assert!(!rendered.contains("output.bin"));
    assert!(!rendered.contains("# comment"));
    assert!(!rendered.contains("Entry module"));
    assert!(!rendered.contains("Run it"));
    assert!(rendered.contains("def main():"));
    assert!(rendered.contains("print(\"hello # not a comment\")"));
    assert!(stats.diagnostics.is_empty());

    Ok(())
}

// A link back to the root is reported, not followed
#[cfg(unix)]
#[test]
fn test_symlink_cycle_is_not_followed() -> Result<()> {
    let temp_dir = setup_test_directory()?;
    std::os::unix::fs::symlink(temp_dir.path(), temp_dir.path().join("loop"))?;
    std::os::unix::fs::symlink("..", temp_dir.path().join("dir1").join("up"))?;

    let (root, stats) = scan(&config_for(temp_dir.path()))?;

    assert!(root.contents.iter().all(|n| n.name() != "loop"));
    let cyclic: Vec<String> = stats
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::CyclicLink)
        .map(|d| slash_path(&d.path))
        .collect();
    assert_eq!(cyclic, vec!["dir1/up", "loop"]);
    assert_eq!(root.files().len(), 4);

    Ok(())
}

// Links to files are read through; broken links are listed with a diagnostic
#[cfg(unix)]
#[test]
fn test_file_and_broken_symlinks() -> Result<()> {
    let temp_dir = setup_test_directory()?;
    std::os::unix::fs::symlink(
        temp_dir.path().join("file1.txt"),
        temp_dir.path().join("alias.txt"),
    )?;
    std::os::unix::fs::symlink(
        temp_dir.path().join("missing.txt"),
        temp_dir.path().join("dangling.txt"),
    )?;

    let (root, stats) = scan(&config_for(temp_dir.path()))?;

    let alias = find_file(&root, "alias.txt").expect("alias listed");
    assert!(alias.included);
    assert_eq!(
        alias.content.as_deref(),
        Some("This is a text file with content\n")
    );

    let dangling = find_file(&root, "dangling.txt").expect("dangling listed");
    assert!(!dangling.included);
    assert!(dangling.content.is_none());
    assert!(stats
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::BrokenLink && d.path == Path::new("dangling.txt")));

    Ok(())
}

// Only recognized source files carry content with source_only
#[test]
fn test_source_only() -> Result<()> {
    let temp_dir = setup_test_directory()?;
    fs::write(temp_dir.path().join("Cargo.toml"), "[package]\n")?;

    let config = Config {
        source_only: true,
        ..config_for(temp_dir.path())
    };
    let (root, stats) = scan(&config)?;

    let included: Vec<String> = root
        .files()
        .iter()
        .filter(|f| f.included)
        .map(|f| slash_path(&f.path))
        .collect();
    assert_eq!(included, vec!["dir1/tool.py"]);

    let listed = find_file(&root, "Cargo.toml").expect("still listed");
    assert!(!listed.included);
    assert!(listed.content.is_none());
    assert!(stats.diagnostics.is_empty());

    Ok(())
}

// Binary, invalid UTF-8 and oversized files degrade to listed entries
#[test]
fn test_unreadable_content_is_diagnosed() -> Result<()> {
    let temp_dir = setup_noisy_directory()?;
    fs::write(temp_dir.path().join("latin1.txt"), [b'c', b'a', b'f', 0xe9, b'\n'])?;
    fs::write(temp_dir.path().join("large.txt"), "x".repeat(2048))?;

    let config = Config {
        rules: vec![Rule::name(".git")],
        max_file_size: 1024,
        ..config_for(temp_dir.path())
    };
    let (root, stats) = scan(&config)?;

    let kinds: Vec<(String, DiagnosticKind)> = stats
        .diagnostics
        .iter()
        .map(|d| (slash_path(&d.path), d.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("binary.bin".to_string(), DiagnosticKind::Binary),
            ("large.txt".to_string(), DiagnosticKind::TooLarge),
            ("latin1.txt".to_string(), DiagnosticKind::Binary),
        ]
    );
    for path in ["binary.bin", "large.txt", "latin1.txt"] {
        let file = find_file(&root, path).expect("listed");
        assert!(!file.included);
        assert!(file.content.is_none());
    }
    assert!(find_file(&root, "file1.txt").is_some_and(|f| f.included));

    Ok(())
}

// A transform that cannot lex the file falls back to the original text
#[test]
fn test_transform_fallback_keeps_original() -> Result<()> {
    let temp_dir = tempdir()?;
    let source = "x = 1  # note\ny = \"\"\"never closed\n";
    fs::write(temp_dir.path().join("broken.py"), source)?;

    let mut config = config_for(temp_dir.path());
    config.transform.strip_comments = true;
    let (root, stats) = scan(&config)?;

    let file = find_file(&root, "broken.py").expect("listed");
    assert!(file.included);
    assert_eq!(file.content.as_deref(), Some(source));
    assert_eq!(stats.diagnostics.len(), 1);
    assert_eq!(stats.diagnostics[0].kind, DiagnosticKind::TransformFallback);

    Ok(())
}

// Per-file settings deselect files and override transforms
#[test]
fn test_file_settings() -> Result<()> {
    let temp_dir = setup_test_directory()?;
    fs::write(temp_dir.path().join("keep.py"), "x = 1  # kept\n")?;
    fs::write(temp_dir.path().join("strip.py"), "y = 2  # dropped\n")?;

    let mut config = config_for(temp_dir.path());
    config.transform.strip_comments = true;
    config.file_settings.insert(
        "keep.py".to_string(),
        FileSettings {
            include: true,
            transform: Some(Default::default()),
        },
    );
    config.file_settings.insert(
        "dir1/file2.txt".to_string(),
        FileSettings {
            include: false,
            transform: None,
        },
    );

    let (root, _) = scan(&config)?;
    assert_eq!(
        find_file(&root, "keep.py").and_then(|f| f.content.as_deref()),
        Some("x = 1  # kept\n")
    );
    assert_eq!(
        find_file(&root, "strip.py").and_then(|f| f.content.as_deref()),
        Some("y = 2\n")
    );
    assert!(find_file(&root, "dir1/file2.txt").is_some_and(|f| !f.included));

    Ok(())
}

// Directories emptied by filtering are shown or hidden per policy
#[test]
fn test_empty_directory_policy() -> Result<()> {
    let temp_dir = setup_test_directory()?;
    fs::create_dir(temp_dir.path().join("logs"))?;
    fs::write(temp_dir.path().join("logs").join("run.log"), "noise")?;

    let mut config = Config {
        rules: vec![Rule::glob("*.log")],
        ..config_for(temp_dir.path())
    };

    let (shown, _) = scan(&config)?;
    let names: Vec<&str> = shown.contents.iter().map(Node::name).collect();
    assert_eq!(names, vec!["dir1", "dir2", "logs", "file1.txt"]);
    let rendered = TemplateWriter::new(config.clone()).render(&shown);
    assert!(rendered.contains("├── logs/\n"));

    config.empty_dirs = EmptyDirPolicy::Hide;
    let (hidden, stats) = scan(&config)?;
    let names: Vec<&str> = hidden.contents.iter().map(Node::name).collect();
    assert_eq!(names, vec!["dir1", "file1.txt"]);
    assert_eq!(stats.directories, 2);

    Ok(())
}

// Rendering the same tree twice is byte-identical, as is rescanning
#[test]
fn test_render_is_deterministic() -> Result<()> {
    let temp_dir = setup_noisy_directory()?;
    let mut config = config_for(temp_dir.path());
    config.num_threads = 4;

    let (root, _) = scan(&config)?;
    let writer = TemplateWriter::new(config.clone());
    assert_eq!(writer.render(&root), writer.render(&root));
    assert_eq!(writer.render_xml(&root)?, writer.render_xml(&root)?);

    let (again, _) = scan(&config)?;
    assert_eq!(root, again);

    Ok(())
}

// Test XML structure validity
#[test]
fn test_xml_validity() -> Result<()> {
    let temp_dir = setup_noisy_directory()?;
    fs::write(
        temp_dir.path().join("markup.rs"),
        "fn lt() -> bool { 1 < 2 && \"</file>\".is_empty() }\n",
    )?;
    let output_file = temp_dir.path().join("output.xml");

    let config = Config {
        output_file: output_file.clone(),
        format: OutputFormat::Xml,
        description: Some("Sample & friends".to_string()),
        ..config_for(temp_dir.path())
    };

    let (root, _) = scan(&config)?;
    TemplateWriter::new(config).write(&root)?;

    let file_content = fs::read_to_string(&output_file)?;
    let mut reader = Reader::from_str(&file_content);

    let mut depth = 0;
    let mut buf = Vec::new();
    let mut texts = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => depth -= 1,
            Ok(Event::Text(t)) => texts.push(t.unescape().map(|s| s.into_owned()).unwrap_or_default()),
            Ok(Event::Eof) => break,
            Err(e) => panic!("Error parsing XML: {}", e),
            _ => (),
        }
        buf.clear();
    }

    assert_eq!(depth, 0, "XML structure is not well-balanced");
    assert!(texts.iter().any(|t| t.contains("1 < 2 && \"</file>\"")));
    assert!(texts.iter().any(|t| t == "Sample & friends"));

    Ok(())
}

// The output file is never part of its own template
#[test]
fn test_output_file_is_not_listed() -> Result<()> {
    let temp_dir = setup_test_directory()?;
    fs::write(temp_dir.path().join("template.txt"), "previous run")?;

    let config = Config {
        output_file: PathBuf::from("template.txt"),
        ..config_for(temp_dir.path())
    };

    let (root, _) = scan(&config)?;
    assert!(find_file(&root, "template.txt").is_none());

    TemplateWriter::new(config.clone()).write(&root)?;
    let (again, _) = scan(&config)?;
    assert!(find_file(&again, "template.txt").is_none());
    assert!(!fs::read_to_string(temp_dir.path().join("template.txt"))?.contains("previous run"));

    Ok(())
}

// Test respecting .gitignore files
#[test]
fn test_respect_gitignore() -> Result<()> {
    let temp_dir = setup_noisy_directory()?;

    let mut gitignore = File::create(temp_dir.path().join(".gitignore"))?;
    writeln!(gitignore, "# Ignore all .txt files")?;
    writeln!(gitignore, "*.txt")?;
    writeln!(gitignore, "binary.bin")?;

    let mut not_ignored = File::create(temp_dir.path().join("not_ignored.md"))?;
    writeln!(not_ignored, "# This file shouldn't be ignored")?;

    let config = Config {
        respect_gitignore: true,
        rules: vec![Rule::name(".git"), Rule::name(".gitignore")],
        ..config_for(temp_dir.path())
    };
    let (root, _) = scan(&config)?;
    let rendered = TemplateWriter::new(config).render(&root);

    assert!(!rendered.contains("file1.txt"));
    assert!(!rendered.contains("file2.txt"));
    assert!(!rendered.contains("file3.txt"));
    assert!(!rendered.contains("binary.bin"));
    assert!(rendered.contains("not_ignored.md"));
    assert!(rendered.contains("tool.py"));

    Ok(())
}

// A missing root is a configuration error
#[test]
fn test_missing_root_is_config_error() {
    let temp_dir = tempdir().unwrap();
    let config = config_for(&temp_dir.path().join("nope"));

    assert!(config.validate().unwrap_err().is_config());
    assert!(scan(&config).unwrap_err().is_config());
}

// A session from a newer schema leaves the live configuration alone
#[test]
fn test_newer_session_keeps_configuration() -> Result<()> {
    let temp_dir = setup_test_directory()?;
    let store = SessionStore::in_root(temp_dir.path(), Path::new("session.json"));

    let mut config = Config {
        rules: vec![Rule::name("dir2")],
        ..config_for(temp_dir.path())
    };
    store.save(&config)?;

    let mut raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path())?)?;
    raw["version"] = serde_json::Value::from(7);
    fs::write(store.path(), raw.to_string())?;

    let before = config.clone();
    let err = store.restore_into(&mut config).unwrap_err();
    assert!(matches!(
        err,
        TreegenError::Persistence(PersistenceError::VersionMismatch { found: 7, supported: 1 })
    ));
    assert_eq!(config, before);

    Ok(())
}
