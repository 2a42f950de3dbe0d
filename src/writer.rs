/*!
 * Template rendering for treegen
 *
 * Both formats are pure functions of the tree: rendering the same tree
 * twice yields byte-identical output.
 */

use std::borrow::Cow;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::config::{Config, OutputFormat};
use crate::error::Result;
use crate::matcher::slash_path;
use crate::types::{DirectoryNode, FileNode, Node};

/// Renders a scanned tree as a prompt template
pub struct TemplateWriter {
    /// Writer configuration
    config: Config,
}

impl TemplateWriter {
    /// Create a new template writer
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Render in the configured format and write to the output file (or stdout)
    pub fn write(&self, root: &DirectoryNode) -> Result<()> {
        let rendered = match self.config.format {
            OutputFormat::Text => self.render(root),
            OutputFormat::Xml => self.render_xml(root)?,
        };

        match self.config.output_path() {
            Some(path) => {
                fs::write(&path, rendered.as_bytes())?;
                log::info!("Wrote template to {}", path.display());
            }
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(rendered.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }

    /// Render the text template: description, structure, then file contents
    pub fn render(&self, root: &DirectoryNode) -> String {
        let mut out = String::new();

        if let Some(description) = &self.config.description {
            out.push_str(description.trim_end());
            out.push_str("\n\n");
        }

        out.push_str("Project structure:\n");
        out.push_str(&root.name);
        out.push_str("/\n");
        render_children(root, "", &mut out);

        let files: Vec<&FileNode> = root.files().into_iter().filter(|f| f.included).collect();
        if files.is_empty() {
            return out;
        }

        out.push_str("\nFile contents:\n");
        for file in files {
            let content = file.content.as_deref().unwrap_or_default();
            let fence = "`".repeat(longest_backtick_run(content).max(2) + 1);
            let tag = file.language.map(|l| l.fence_tag()).unwrap_or_default();

            let _ = write!(out, "\n### {}\n{}{}\n", slash_path(&file.path), fence, tag);
            out.push_str(content);
            if !content.is_empty() && !content.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&fence);
            out.push('\n');
        }

        out
    }

    /// Render the same information as an XML document
    pub fn render_xml(&self, root: &DirectoryNode) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut project = BytesStart::new("project");
        project.push_attribute(("name", root.name.as_str()));
        writer.write_event(Event::Start(project))?;

        if let Some(description) = &self.config.description {
            write_text_element(&mut writer, "description", description)?;
        }

        writer.write_event(Event::Start(BytesStart::new("structure")))?;
        for node in &root.contents {
            write_node(&mut writer, node)?;
        }
        writer.write_event(Event::End(BytesEnd::new("structure")))?;

        writer.write_event(Event::Start(BytesStart::new("files")))?;
        for file in root.files().into_iter().filter(|f| f.included) {
            let path = slash_path(&file.path);
            let mut start = BytesStart::new("content");
            start.push_attribute(("path", xml_safe(&path).as_ref()));
            if let Some(language) = file.language {
                start.push_attribute(("language", language.to_string().as_str()));
            }
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Text(BytesText::new(&xml_safe(
                file.content.as_deref().unwrap_or_default(),
            ))))?;
            writer.write_event(Event::End(BytesEnd::new("content")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("files")))?;

        writer.write_event(Event::End(BytesEnd::new("project")))?;

        let mut xml = String::from_utf8(writer.into_inner())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        xml.push('\n');
        Ok(xml)
    }
}

/// Draw the children of `dir` with tree connectors
fn render_children(dir: &DirectoryNode, prefix: &str, out: &mut String) {
    let count = dir.contents.len();
    for (i, node) in dir.contents.iter().enumerate() {
        let last = i + 1 == count;
        let connector = if last { "└── " } else { "├── " };
        match node {
            Node::Directory(sub) => {
                let _ = writeln!(out, "{}{}{}/", prefix, connector, sub.name);
                let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
                render_children(sub, &child_prefix, out);
            }
            Node::File(file) => {
                let _ = writeln!(out, "{}{}{}", prefix, connector, file.name);
            }
        }
    }
}

fn write_node<W: Write>(writer: &mut Writer<W>, node: &Node) -> io::Result<()> {
    match node {
        Node::Directory(dir) => {
            let path = slash_path(&dir.path);
            let mut start = BytesStart::new("directory");
            start.push_attribute(("name", xml_safe(&dir.name).as_ref()));
            start.push_attribute(("path", xml_safe(&path).as_ref()));
            if dir.contents.is_empty() {
                writer.write_event(Event::Empty(start))?;
                return Ok(());
            }
            writer.write_event(Event::Start(start))?;
            for child in &dir.contents {
                write_node(writer, child)?;
            }
            writer.write_event(Event::End(BytesEnd::new("directory")))?;
        }
        Node::File(file) => {
            let path = slash_path(&file.path);
            let mut start = BytesStart::new("file");
            start.push_attribute(("name", xml_safe(&file.name).as_ref()));
            start.push_attribute(("path", xml_safe(&path).as_ref()));
            start.push_attribute(("included", if file.included { "true" } else { "false" }));
            writer.write_event(Event::Empty(start))?;
        }
    }
    Ok(())
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(&xml_safe(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Drop the C0 control characters XML 1.0 cannot carry
fn xml_safe(text: &str) -> Cow<'_, str> {
    let invalid = |c: char| c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r' | '\x7f');
    if text.contains(invalid) {
        Cow::Owned(text.chars().filter(|&c| !invalid(c)).collect())
    } else {
        Cow::Borrowed(text)
    }
}

fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}
