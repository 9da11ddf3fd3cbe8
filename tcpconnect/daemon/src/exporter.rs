//! Metrics exporters
//!
//! Renders a [`CountsReport`] as Prometheus text (served on `/metrics`) or
//! writes it to a file as JSON or Prometheus text.

use crate::types::CountsReport;
use anyhow::{Context, Result};
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

/// Content type of the Prometheus text exposition format
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Trait for metrics exporters
pub trait MetricsExporter {
    /// Export a report
    ///
    /// # Arguments
    ///
    /// * `report` - Collected counts to export
    fn export(&self, report: &CountsReport) -> Result<()>;
}

/// Export format type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterType {
    /// JSON format
    Json,
    /// Prometheus format
    Prometheus,
}

/// JSON exporter
pub struct JsonExporter {
    output_path: PathBuf,
    pretty: bool,
}

impl JsonExporter {
    /// Create a new JSON exporter
    ///
    /// # Arguments
    ///
    /// * `output_path` - Path to output file
    /// * `pretty` - Enable pretty-printing
    pub fn new(output_path: PathBuf, pretty: bool) -> Self {
        Self {
            output_path,
            pretty,
        }
    }
}

impl MetricsExporter for JsonExporter {
    fn export(&self, report: &CountsReport) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };

        write_file(&self.output_path, json.as_bytes())
    }
}

/// Prometheus exporter
pub struct PrometheusExporter {
    output_path: PathBuf,
}

impl PrometheusExporter {
    /// Create a new Prometheus exporter
    ///
    /// # Arguments
    ///
    /// * `output_path` - Path to output file
    pub fn new(output_path: PathBuf) -> Self {
        Self { output_path }
    }
}

impl MetricsExporter for PrometheusExporter {
    fn export(&self, report: &CountsReport) -> Result<()> {
        write_file(&self.output_path, to_prometheus_format(report).as_bytes())
    }
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create output file: {:?}", path))?;

    file.write_all(data)
        .with_context(|| format!("Failed to write to output file: {:?}", path))?;

    Ok(())
}

/// Convert a report to Prometheus text format
pub fn to_prometheus_format(report: &CountsReport) -> String {
    let mut output = String::new();

    // Per-PID counts
    output.push_str("# HELP tcp_connects_by_pid Number of tcp_connect() calls observed per PID\n");
    output.push_str("# TYPE tcp_connects_by_pid gauge\n");
    for entry in &report.entries {
        output.push_str(&format!(
            "tcp_connects_by_pid{{pid=\"{}\",comm=\"{}\"}} {}\n",
            entry.pid,
            escape_label_value(&entry.comm),
            entry.count
        ));
    }
    output.push('\n');

    // Table occupancy, to spot dropped PIDs
    output.push_str("# HELP tcp_connect_table_entries Distinct PIDs currently in the counter map\n");
    output.push_str("# TYPE tcp_connect_table_entries gauge\n");
    output.push_str(&format!("tcp_connect_table_entries {}\n", report.distinct_pids()));
    output.push('\n');

    output.push_str("# HELP tcp_connect_table_capacity Maximum number of PIDs the counter map holds\n");
    output.push_str("# TYPE tcp_connect_table_capacity gauge\n");
    output.push_str(&format!("tcp_connect_table_capacity {}\n", report.capacity));

    output
}

/// Escape a label value per the text exposition format
fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CountEntry;

    fn create_test_report() -> CountsReport {
        CountsReport::new(vec![
            CountEntry {
                pid: 100,
                comm: "curl".to_string(),
                count: 5,
            },
            CountEntry {
                pid: 200,
                comm: "we\"ird\\name".to_string(),
                count: 3,
            },
        ])
    }

    #[test]
    fn test_prometheus_format() {
        let report = create_test_report();
        let prometheus = to_prometheus_format(&report);

        assert!(prometheus.contains("# TYPE tcp_connects_by_pid gauge"));
        assert!(prometheus.contains("tcp_connects_by_pid{pid=\"100\",comm=\"curl\"} 5"));
        assert!(prometheus.contains("tcp_connect_table_entries 2"));
        assert!(prometheus.contains("tcp_connect_table_capacity 8192"));
    }

    #[test]
    fn test_prometheus_escapes_labels() {
        let report = create_test_report();
        let prometheus = to_prometheus_format(&report);

        assert!(prometheus.contains("comm=\"we\\\"ird\\\\name\"} 3"));
    }

    #[test]
    fn test_escape_newline() {
        assert_eq!(escape_label_value("a\nb"), "a\\nb");
    }

    #[test]
    fn test_json_export_to_file() {
        let path = std::env::temp_dir().join(format!(
            "tcpconnect-export-{}.json",
            std::process::id()
        ));
        let report = create_test_report();

        JsonExporter::new(path.clone(), false).export(&report).unwrap();

        let written: CountsReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.entries, report.entries);
        assert_eq!(written.total_connects, 8);

        std::fs::remove_file(&path).unwrap();
    }
}
