//! Language hints and their lexical rules

use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// How definition bodies are delimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStyle {
    /// Body is the indented block after a `:` header
    Indent,
    /// Body is a `{ ... }` block
    Braces,
    /// Definitions cannot be located lexically
    Unsupported,
}

/// Static lexical table for one language
#[derive(Debug, Clone, Copy)]
pub struct LexicalRules {
    /// Markers starting a comment running to end of line
    pub line_comments: &'static [&'static str],
    /// Line comments open only at the start of text or after whitespace
    pub comment_at_word_start: bool,
    /// Block comment open/close delimiters
    pub block_comment: Option<(&'static str, &'static str)>,
    /// Whether block comments nest
    pub nested_blocks: bool,
    /// String delimiters honouring backslash escapes, longest first
    pub quotes: &'static [&'static str],
    /// String delimiters without escapes
    pub raw_quotes: &'static [&'static str],
    /// Delimiters allowed to span lines (besides raw quotes)
    pub multiline_quotes: &'static [&'static str],
    /// `'` opens a string only when it looks like a char literal
    pub char_literal_heuristic: bool,
    /// `r#"..."#` raw strings
    pub hash_raw_strings: bool,
    /// First-statement string literals are documentation
    pub docstrings: bool,
    /// Body delimiting for function removal
    pub block_style: BlockStyle,
    /// Keywords introducing a function definition
    pub function_keywords: &'static [&'static str],
    /// Definitions may appear without a keyword (`int main(void) {`)
    pub keywordless_functions: bool,
    /// Line prefixes of decorators/attributes attached to the next definition
    pub decorators: &'static [&'static str],
    /// Placeholder body used when stripping function bodies
    pub body_placeholder: &'static str,
}

const C_LIKE: LexicalRules = LexicalRules {
    line_comments: &["//"],
    comment_at_word_start: false,
    block_comment: Some(("/*", "*/")),
    nested_blocks: false,
    quotes: &["\"", "'"],
    raw_quotes: &[],
    multiline_quotes: &[],
    char_literal_heuristic: false,
    hash_raw_strings: false,
    docstrings: false,
    block_style: BlockStyle::Braces,
    function_keywords: &[],
    keywordless_functions: true,
    decorators: &["@"],
    body_placeholder: "...",
};

const HASH_COMMENTS: LexicalRules = LexicalRules {
    line_comments: &["#"],
    comment_at_word_start: false,
    block_comment: None,
    nested_blocks: false,
    quotes: &["\"", "'"],
    raw_quotes: &[],
    multiline_quotes: &[],
    char_literal_heuristic: false,
    hash_raw_strings: false,
    docstrings: false,
    block_style: BlockStyle::Unsupported,
    function_keywords: &[],
    keywordless_functions: false,
    decorators: &[],
    body_placeholder: "...",
};

/// Language hint derived from a file extension
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Rust,
    C,
    Cpp,
    CSharp,
    Java,
    Kotlin,
    Go,
    JavaScript,
    TypeScript,
    Swift,
    Shell,
    Ruby,
    Toml,
    Yaml,
}

impl Language {
    /// File extensions mapped to this language
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Python => &[
                "py", "pyw", "pyx", "pyi", "pxd", "pxi", "pyp", "pyt", "py3", "pyde",
            ],
            Self::Rust => &["rs"],
            Self::C => &["c", "h"],
            Self::Cpp => &["cc", "cpp", "cxx", "hh", "hpp", "hxx"],
            Self::CSharp => &["cs"],
            Self::Java => &["java"],
            Self::Kotlin => &["kt", "kts"],
            Self::Go => &["go"],
            Self::JavaScript => &["js", "mjs", "cjs", "jsx"],
            Self::TypeScript => &["ts", "mts", "cts", "tsx"],
            Self::Swift => &["swift"],
            Self::Shell => &["sh", "bash", "zsh"],
            Self::Ruby => &["rb"],
            Self::Toml => &["toml"],
            Self::Yaml => &["yml", "yaml"],
        }
    }

    /// Detect the language hint of a path from its extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::iter().find(|lang| lang.extensions().contains(&ext.as_str()))
    }

    /// Whether the language counts as source code for `--source-only`
    pub fn is_source(&self) -> bool {
        !matches!(self, Self::Toml | Self::Yaml)
    }

    /// Info string used on fenced code blocks
    pub fn fence_tag(&self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::Rust => "rust",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Java => "java",
            Self::Kotlin => "kotlin",
            Self::Go => "go",
            Self::JavaScript => "js",
            Self::TypeScript => "ts",
            Self::Swift => "swift",
            Self::Shell => "sh",
            Self::Ruby => "ruby",
            Self::Toml => "toml",
            Self::Yaml => "yaml",
        }
    }

    /// Lexical rules used by the transformer
    pub fn rules(&self) -> LexicalRules {
        match self {
            Self::Python => LexicalRules {
                line_comments: &["#"],
                comment_at_word_start: false,
                block_comment: None,
                nested_blocks: false,
                quotes: &["\"\"\"", "'''", "\"", "'"],
                raw_quotes: &[],
                multiline_quotes: &["\"\"\"", "'''"],
                char_literal_heuristic: false,
                hash_raw_strings: false,
                docstrings: true,
                block_style: BlockStyle::Indent,
                function_keywords: &["def"],
                keywordless_functions: false,
                decorators: &["@"],
                body_placeholder: "pass",
            },
            Self::Rust => LexicalRules {
                nested_blocks: true,
                char_literal_heuristic: true,
                hash_raw_strings: true,
                multiline_quotes: &["\""],
                function_keywords: &["fn"],
                keywordless_functions: false,
                decorators: &["#["],
                ..C_LIKE
            },
            Self::C | Self::Cpp | Self::CSharp | Self::Java => C_LIKE,
            Self::Kotlin => LexicalRules {
                quotes: &["\"\"\"", "\"", "'"],
                multiline_quotes: &["\"\"\""],
                function_keywords: &["fun"],
                keywordless_functions: false,
                ..C_LIKE
            },
            Self::Swift => LexicalRules {
                nested_blocks: true,
                quotes: &["\"\"\"", "\""],
                multiline_quotes: &["\"\"\""],
                function_keywords: &["func"],
                keywordless_functions: false,
                ..C_LIKE
            },
            Self::Go => LexicalRules {
                quotes: &["\"", "'"],
                raw_quotes: &["`"],
                function_keywords: &["func"],
                keywordless_functions: false,
                decorators: &[],
                ..C_LIKE
            },
            Self::JavaScript | Self::TypeScript => LexicalRules {
                quotes: &["\"", "'", "`"],
                multiline_quotes: &["`"],
                function_keywords: &["function"],
                ..C_LIKE
            },
            Self::Shell => LexicalRules {
                quotes: &["\""],
                raw_quotes: &["'"],
                multiline_quotes: &["\""],
                block_style: BlockStyle::Braces,
                function_keywords: &["function"],
                keywordless_functions: true,
                body_placeholder: ":;",
                comment_at_word_start: true,
                ..HASH_COMMENTS
            },
            Self::Ruby => LexicalRules {
                multiline_quotes: &["\"", "'"],
                ..HASH_COMMENTS
            },
            Self::Toml => HASH_COMMENTS,
            Self::Yaml => LexicalRules {
                comment_at_word_start: true,
                ..HASH_COMMENTS
            },
        }
    }
}
