//! Rendering of the relative entropy report
//!
//! The destination is always an explicit path handed to
//! [`OutputManager::write_report`]. Three formats are available: TSV, JSON
//! and a single-element XML document.

use crate::config::{OutputFormat, OutputSettings};
use crate::entropy::RelativeEntropy;
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Provenance written next to the statistic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub net_disk: PathBuf,
    pub net_name: String,
}

impl ReportMetadata {
    pub fn new(run_id: Uuid, net_disk: impl Into<PathBuf>, net_name: impl Into<String>) -> Self {
        Self {
            run_id,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            net_disk: net_disk.into(),
            net_name: net_name.into(),
        }
    }
}

/// Trait for report writers
pub trait OutputFormatter {
    /// Write the whole report; `metadata` is omitted when `None`
    fn write_report(&mut self, metadata: Option<&ReportMetadata>, report: &RelativeEntropy) -> Result<()>;
}

/// `total_p`, `total_q`, `entropy` columns, metadata as `#` comments
pub struct TsvFormatter<W: Write> {
    writer: W,
    precision: usize,
}

impl<W: Write> TsvFormatter<W> {
    pub fn new(writer: W, precision: usize) -> Self {
        Self { writer, precision }
    }
}

impl<W: Write> OutputFormatter for TsvFormatter<W> {
    fn write_report(&mut self, metadata: Option<&ReportMetadata>, report: &RelativeEntropy) -> Result<()> {
        if let Some(metadata) = metadata {
            writeln!(self.writer, "# treestats {}", metadata.version)?;
            writeln!(self.writer, "# run_id\t{}", metadata.run_id)?;
            writeln!(
                self.writer,
                "# timestamp\t{}",
                metadata.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
            )?;
            writeln!(self.writer, "# net_disk\t{}", metadata.net_disk.display())?;
            writeln!(self.writer, "# net_name\t{}", metadata.net_name)?;
        }
        writeln!(self.writer, "total_p\ttotal_q\tentropy")?;
        writeln!(
            self.writer,
            "{:.p$}\t{:.p$}\t{:.p$}",
            report.total_p,
            report.total_q,
            report.entropy,
            p = self.precision
        )?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Pretty JSON object; non-finite values serialize as `null`
pub struct JsonFormatter<W: Write> {
    writer: W,
}

impl<W: Write> JsonFormatter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a ReportMetadata>,
    relative_entropy: &'a RelativeEntropy,
}

impl<W: Write> OutputFormatter for JsonFormatter<W> {
    fn write_report(&mut self, metadata: Option<&ReportMetadata>, report: &RelativeEntropy) -> Result<()> {
        let document = JsonReport {
            metadata,
            relative_entropy: report,
        };
        serde_json::to_writer_pretty(&mut self.writer, &document)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// `<treeStats>` element wrapping one `<relativeEntropy/>`
pub struct XmlFormatter<W: Write> {
    writer: W,
    precision: usize,
}

impl<W: Write> XmlFormatter<W> {
    pub fn new(writer: W, precision: usize) -> Self {
        Self { writer, precision }
    }
}

impl<W: Write> OutputFormatter for XmlFormatter<W> {
    fn write_report(&mut self, metadata: Option<&ReportMetadata>, report: &RelativeEntropy) -> Result<()> {
        writeln!(self.writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        match metadata {
            Some(metadata) => writeln!(
                self.writer,
                r#"<treeStats version="{}" runId="{}" timestamp="{}" netDisk="{}" netName="{}">"#,
                escape_attribute(&metadata.version),
                metadata.run_id,
                metadata.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                escape_attribute(&metadata.net_disk.display().to_string()),
                escape_attribute(&metadata.net_name),
            )?,
            None => writeln!(self.writer, "<treeStats>")?,
        }
        writeln!(
            self.writer,
            r#"  <relativeEntropy totalP="{:.p$}" totalQ="{:.p$}" entropy="{:.p$}"/>"#,
            report.total_p,
            report.total_q,
            report.entropy,
            p = self.precision
        )?;
        writeln!(self.writer, "</treeStats>")?;
        self.writer.flush()?;
        Ok(())
    }
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Chooses a formatter and writes reports to files
pub struct OutputManager {
    settings: OutputSettings,
}

impl OutputManager {
    pub fn new(settings: OutputSettings) -> Self {
        Self { settings }
    }

    /// Configured format, else the one implied by the file extension
    pub fn format_for(&self, path: &Path) -> OutputFormat {
        self.settings
            .format
            .unwrap_or_else(|| OutputFormat::from_extension(path))
    }

    pub fn formatter<'w, W: Write + 'w>(&self, format: OutputFormat, writer: W) -> Box<dyn OutputFormatter + 'w> {
        match format {
            OutputFormat::Tsv => Box::new(TsvFormatter::new(writer, self.settings.precision)),
            OutputFormat::Json => Box::new(JsonFormatter::new(writer)),
            OutputFormat::Xml => Box::new(XmlFormatter::new(writer, self.settings.precision)),
        }
    }

    /// Create or truncate `path` and write the report into it
    pub fn write_report(
        &self,
        path: &Path,
        metadata: &ReportMetadata,
        report: &RelativeEntropy,
    ) -> Result<OutputFormat> {
        let format = self.format_for(path);
        let file = File::create(path)?;
        let mut formatter = self.formatter(format, BufWriter::new(file));
        let metadata = self.settings.include_metadata.then_some(metadata);
        formatter.write_report(metadata, report)?;
        Ok(format)
    }
}
