//! Output formatters for scan reports.
//!
//! This module provides trait-based formatters for rendering scan records
//! in various output formats (human-readable, JSON, compact).

use crate::summary::Summary;
use crate::types::{Category, ScanRecord};
use serde::Serialize;
use tracing::warn;

const RULE_WIDTH: usize = 25;
const INDENT: &str = "     ";

/// Trait for formatting scan reports.
///
/// Implementors render each component of a report; the default
/// [`ReportFormatter::format_report`] stitches them together, listing
/// libraries before executables.
pub trait ReportFormatter {
    /// Format the heading for one category group.
    fn format_group_header(&self, category: Category, count: usize) -> Option<String>;

    /// Format one record.
    fn format_record(&self, record: &ScanRecord) -> String;

    /// Format the closing summary.
    fn format_summary(&self, summary: &Summary) -> Option<String>;

    /// Format the complete report.
    fn format_report(&self, records: &[ScanRecord], summary: &Summary) -> String {
        let mut out = String::new();
        for category in [Category::Library, Category::Executable] {
            let group: Vec<&ScanRecord> =
                records.iter().filter(|r| r.category == category).collect();
            if let Some(s) = self.format_group_header(category, group.len()) {
                out.push_str(&s);
            }
            for record in group {
                out.push_str(&self.format_record(record));
            }
        }
        if let Some(s) = self.format_summary(summary) {
            out.push_str(&s);
        }
        out
    }
}

/// Human-readable output formatter.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    /// Show the machine description under native results
    pub verbose: bool,
    /// One line per file, no headings
    pub quiet: bool,
}

impl HumanFormatter {
    /// Create a new human formatter with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a verbose formatter.
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            quiet: false,
        }
    }

    /// Create a quiet formatter.
    pub fn quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
        }
    }
}

impl ReportFormatter for HumanFormatter {
    fn format_group_header(&self, category: Category, count: usize) -> Option<String> {
        if self.quiet {
            return None;
        }
        let lead = match category {
            Category::Library => "",
            Category::Executable => "\n",
        };
        Some(if count == 0 {
            format!("{lead}No {category} files found.\n")
        } else {
            format!("{lead}Scanning {category} files:\n")
        })
    }

    fn format_record(&self, record: &ScanRecord) -> String {
        let result = record.classification.result_text();
        if self.quiet {
            return format!("{}: {}\n", record.relative_path, result);
        }

        let mut s = format!("{}. File: {}\n", record.index, record.relative_path);
        for line in record.classification.diagnostics() {
            s.push_str(&format!("{INDENT}{line}\n"));
        }
        s.push_str(&format!("{INDENT}Result: {result}"));
        // Executables pinned to one bitness are the usual source of mismatches.
        if record.category == Category::Executable && result.to_lowercase().contains("only") {
            s.push_str("  <-- check");
        }
        s.push('\n');
        if self.verbose {
            if let Some(machine) = record.classification.machine {
                s.push_str(&format!(
                    "{INDENT}Machine: {}\n",
                    crate::pe::machine_description(machine)
                ));
            }
        }
        s.push_str(&"-".repeat(RULE_WIDTH));
        s.push('\n');
        s
    }

    fn format_summary(&self, summary: &Summary) -> Option<String> {
        if self.quiet {
            return None;
        }
        let mut s = String::from("\nSummary:\n");
        for (label, count) in summary.lines() {
            s.push_str(&format!("   {label}: {count}\n"));
        }
        Some(s)
    }
}

/// JSON output formatter.
///
/// A full report is one document holding `records` and `summary`; a single
/// record or summary renders as its own object.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    /// Pretty-print the document
    pub pretty: bool,
}

impl JsonFormatter {
    /// Serialize `value`, falling back to `null` if serde rejects it.
    fn render<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| {
            warn!(error = %e, "cannot serialize report");
            "null".to_string()
        })
    }
}

impl ReportFormatter for JsonFormatter {
    fn format_group_header(&self, _category: Category, _count: usize) -> Option<String> {
        None
    }

    fn format_record(&self, record: &ScanRecord) -> String {
        let mut out = self.render(record);
        out.push('\n');
        out
    }

    fn format_summary(&self, summary: &Summary) -> Option<String> {
        let mut out = self.render(summary);
        out.push('\n');
        Some(out)
    }

    fn format_report(&self, records: &[ScanRecord], summary: &Summary) -> String {
        #[derive(Serialize)]
        struct Report<'a> {
            records: &'a [ScanRecord],
            summary: &'a Summary,
        }

        let mut out = self.render(&Report { records, summary });
        out.push('\n');
        out
    }
}

/// Compact single-line output formatter.
#[derive(Debug, Clone, Default)]
pub struct ShortFormatter;

impl ReportFormatter for ShortFormatter {
    fn format_group_header(&self, _category: Category, _count: usize) -> Option<String> {
        None
    }

    fn format_record(&self, record: &ScanRecord) -> String {
        format!(
            "{}\t{}\t{}\n",
            record.relative_path, record.category, record.classification.verdict
        )
    }

    fn format_summary(&self, _summary: &Summary) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::SummaryPolicy;
    use crate::types::{ArchitectureVerdict, Classification, ImageKind, ProcessorArchitecture};
    use pretty_assertions::assert_eq;

    fn records() -> Vec<ScanRecord> {
        vec![
            ScanRecord {
                index: 1,
                relative_path: "Core.dll".into(),
                category: Category::Library,
                classification: Classification {
                    verdict: ArchitectureVerdict::AnyCpu,
                    image_kind: ImageKind::Managed,
                    machine: Some(0x014C),
                    processor_architecture: Some(ProcessorArchitecture::Msil),
                    diagnostic_line1: "ProcessorArchitecture = MSIL.".into(),
                    diagnostic_line2: "Type: Managed assembly".into(),
                },
            },
            ScanRecord {
                index: 2,
                relative_path: "app.exe".into(),
                category: Category::Executable,
                classification: Classification {
                    verdict: ArchitectureVerdict::X64Only,
                    image_kind: ImageKind::Native,
                    machine: Some(0x8664),
                    processor_architecture: None,
                    diagnostic_line1: "Machine type = 0x8664.".into(),
                    diagnostic_line2: "Type: Native image".into(),
                },
            },
        ]
    }

    fn summary(records: &[ScanRecord]) -> Summary {
        Summary::from_classifications(
            records.iter().map(|r| &r.classification),
            SummaryPolicy::default(),
        )
    }

    #[test]
    fn test_human_report() {
        let records = records();
        let out = HumanFormatter::new().format_report(&records, &summary(&records));
        let expected = "\
Scanning DLL files:
1. File: Core.dll
     ProcessorArchitecture = MSIL.
     Type: Managed assembly
     Result: AnyCPU (runs on both 32-bit and 64-bit EXEs)
-------------------------

Scanning EXE files:
2. File: app.exe
     Machine type = 0x8664.
     Type: Native image
     Result: 64-bit only (native)  <-- check
-------------------------

Summary:
   AnyCPU: 1
   64-bit only: 1
   32-bit only: 0
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_human_empty_groups() {
        let out = HumanFormatter::new().format_report(&[], &Summary::default());
        assert!(out.starts_with("No DLL files found.\n\nNo EXE files found.\n"));
    }

    #[test]
    fn test_quiet_report() {
        let records = records();
        let out = HumanFormatter::quiet().format_report(&records, &summary(&records));
        assert_eq!(
            out,
            "Core.dll: AnyCPU (runs on both 32-bit and 64-bit EXEs)\napp.exe: 64-bit only (native)\n"
        );
    }

    #[test]
    fn test_verbose_shows_machine() {
        let out = HumanFormatter::verbose().format_record(&records()[1]);
        assert!(out.contains("Machine: AMD64 / x86-64"));
    }

    #[test]
    fn test_short_report() {
        let records = records();
        let out = ShortFormatter.format_report(&records, &summary(&records));
        assert_eq!(out, "Core.dll\tDLL\tAnyCPU\napp.exe\tEXE\tX64Only\n");
    }

    #[test]
    fn test_json_report() {
        let records = records();
        let out = JsonFormatter::default().format_report(&records, &summary(&records));
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["records"][0]["verdict"], "AnyCPU");
        assert_eq!(value["records"][1]["category"], "executable");
        assert_eq!(value["records"][1]["machine"], 0x8664);
        assert_eq!(value["summary"]["x64_only"], 1);
    }

    #[test]
    fn test_json_record_and_summary() {
        let records = records();
        let formatter = JsonFormatter::default();

        let line = formatter.format_record(&records[0]);
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["relative_path"], "Core.dll");
        assert_eq!(value["verdict"], "AnyCPU");

        let line = formatter.format_summary(&summary(&records)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["any_cpu"], 1);
        assert!(value.get("any_cpu_prefer32").is_none());
    }

    #[test]
    fn test_json_pretty_matches_compact() {
        let records = records();
        let summary = summary(&records);
        let compact = JsonFormatter { pretty: false }.format_report(&records, &summary);
        let pretty = JsonFormatter { pretty: true }.format_report(&records, &summary);
        assert_eq!(compact.lines().count(), 1);
        assert!(pretty.lines().count() > 1);
        let a: serde_json::Value = serde_json::from_str(&compact).unwrap();
        let b: serde_json::Value = serde_json::from_str(&pretty).unwrap();
        assert_eq!(a, b);
    }
}
