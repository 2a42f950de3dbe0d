/*!
 * Reporting functionality for treegen
 *
 * Provides a run summary and a table of skipped or degraded files, rendered
 * with the tabled library. Reports go to stderr so the template stays clean.
 */

use std::collections::BTreeMap;
use std::time::Duration;

use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::types::Diagnostic;

/// Information about an included file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReportInfo {
    /// Number of lines after transformation
    pub lines: usize,
    /// Number of characters after transformation
    pub chars: usize,
}

/// Statistics for a completed run
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Where the template went
    pub output: String,
    /// Time taken to scan and write
    pub duration: Duration,
    /// Number of directories in the tree
    pub directories: usize,
    /// Number of files in the structural listing
    pub files_listed: usize,
    /// Number of files with content in the template
    pub files_included: usize,
    /// Entries skipped by exclusion rules
    pub excluded_entries: usize,
    /// Total number of lines
    pub total_lines: usize,
    /// Total number of characters
    pub total_chars: usize,
    /// Details for each included file
    pub file_details: BTreeMap<String, FileReportInfo>,
    /// Skipped or degraded entries
    pub diagnostics: Vec<Diagnostic>,
}

/// Report generator for scan results
#[derive(Debug, Default)]
pub struct Reporter;

impl Reporter {
    /// Create a new reporter
    pub fn new() -> Self {
        Self
    }

    /// Format a number with human-readable units
    fn format_number(&self, num: usize) -> String {
        if num >= 1_000_000 {
            format!("{:.1}M", num as f64 / 1_000_000.0)
        } else if num >= 1_000 {
            format!("{:.1}K", num as f64 / 1_000.0)
        } else {
            num.to_string()
        }
    }

    /// Generate the report text
    pub fn generate_report(&self, report: &ScanReport) -> String {
        let mut out = String::new();

        if !report.file_details.is_empty() {
            let title = if report.file_details.len() > 15 {
                "TOP 10 LARGEST FILES BY CHARACTER COUNT"
            } else {
                "INCLUDED FILES"
            };
            out.push_str(&format!("{}\n{}\n\n", title, self.create_files_table(report)));
        }

        if !report.diagnostics.is_empty() {
            out.push_str(&format!(
                "SKIPPED OR DEGRADED ({})\n{}\n\n",
                report.diagnostics.len(),
                self.create_diagnostics_table(report)
            ));
        }

        out.push_str(&format!(
            "TEMPLATE COMPLETE\n{}",
            self.create_summary_table(report)
        ));
        out
    }

    /// Print the report to stderr
    pub fn print_report(&self, report: &ScanReport) {
        eprintln!("\n{}", self.generate_report(report));
    }

    // Keep the tail of long paths
    fn format_path(&self, path: &str, max_len: usize) -> String {
        if path.chars().count() <= max_len {
            return path.to_string();
        }

        let mut len = 3;
        let mut segments = Vec::new();
        for part in path.split('/').rev() {
            let part_len = part.chars().count() + 1;
            if len + part_len > max_len {
                break;
            }
            segments.push(part);
            len += part_len;
        }

        if segments.is_empty() {
            let tail: String = path
                .chars()
                .rev()
                .take(max_len.saturating_sub(3))
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            return format!("...{}", tail);
        }

        let mut result = String::from("...");
        for part in segments.iter().rev() {
            result.push('/');
            result.push_str(part);
        }
        result
    }

    fn style(table: &mut Table) -> String {
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));
        table.to_string()
    }

    fn create_summary_table(&self, report: &ScanReport) -> String {
        #[derive(Tabled)]
        struct SummaryRow {
            #[tabled(rename = "Metric")]
            key: &'static str,

            #[tabled(rename = "Value")]
            value: String,
        }

        let rows = vec![
            SummaryRow {
                key: "Output",
                value: report.output.clone(),
            },
            SummaryRow {
                key: "Process Time",
                value: format!("{:.4?}", report.duration),
            },
            SummaryRow {
                key: "Directories",
                value: self.format_number(report.directories),
            },
            SummaryRow {
                key: "Files Listed",
                value: self.format_number(report.files_listed),
            },
            SummaryRow {
                key: "Files Included",
                value: self.format_number(report.files_included),
            },
            SummaryRow {
                key: "Excluded Entries",
                value: self.format_number(report.excluded_entries),
            },
            SummaryRow {
                key: "Total Lines",
                value: self.format_number(report.total_lines),
            },
            SummaryRow {
                key: "LLM Tokens",
                value: format!(
                    "{} tokens (estimated)",
                    self.format_number(report.total_chars / 4)
                ),
            },
        ];

        Self::style(&mut Table::new(rows))
    }

    fn create_files_table(&self, report: &ScanReport) -> String {
        #[derive(Tabled)]
        struct FileRow {
            #[tabled(rename = "File Path")]
            path: String,

            #[tabled(rename = "Lines")]
            lines: String,

            #[tabled(rename = "Est. Tokens")]
            tokens: String,
        }

        // Largest first, ties by path
        let mut files: Vec<_> = report.file_details.iter().collect();
        files.sort_by(|(pa, a), (pb, b)| b.chars.cmp(&a.chars).then_with(|| pa.cmp(pb)));
        if files.len() > 15 {
            files.truncate(10);
        }

        let rows: Vec<FileRow> = files
            .iter()
            .map(|(path, info)| FileRow {
                path: self.format_path(path, 60),
                lines: self.format_number(info.lines),
                tokens: self.format_number(info.chars / 4),
            })
            .collect();

        Self::style(&mut Table::new(rows))
    }

    fn create_diagnostics_table(&self, report: &ScanReport) -> String {
        #[derive(Tabled)]
        struct DiagnosticRow {
            #[tabled(rename = "Path")]
            path: String,

            #[tabled(rename = "Reason")]
            kind: String,

            #[tabled(rename = "Detail")]
            message: String,
        }

        let rows: Vec<DiagnosticRow> = report
            .diagnostics
            .iter()
            .map(|d| DiagnosticRow {
                path: self.format_path(&crate::matcher::slash_path(&d.path), 60),
                kind: d.kind.to_string(),
                message: d.message.clone(),
            })
            .collect();

        Self::style(&mut Table::new(rows))
    }
}
