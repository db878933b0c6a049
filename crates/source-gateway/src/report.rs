use async_trait::async_trait;
use opportunity_core::{RenderError, ReportDocument, ReportRenderer, ReportTable};
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Writes the report as a markdown file named after a hash of the question
#[derive(Debug, Clone)]
pub struct MarkdownReportWriter {
    out_dir: PathBuf,
}

impl MarkdownReportWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// `report-<16 hex chars>.md`, stable for a given question
    pub fn file_name(question: &str) -> String {
        let digest = Sha256::digest(question.as_bytes());
        format!("report-{}.md", hex::encode(&digest[..8]))
    }
}

fn cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn write_table(out: &mut String, table: &ReportTable) {
    if table.rows.is_empty() {
        return;
    }
    let _ = writeln!(out, "## {}\n", table.title);
    let _ = writeln!(out, "| {} |", table.headers.iter().map(|h| cell(h)).collect::<Vec<_>>().join(" | "));
    let _ = writeln!(out, "|{}|", vec!["---"; table.headers.len()].join("|"));
    for row in &table.rows {
        let _ = writeln!(out, "| {} |", row.iter().map(|c| cell(c)).collect::<Vec<_>>().join(" | "));
    }
    out.push('\n');
}

pub fn render_markdown(document: &ReportDocument) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", document.title);
    let _ = writeln!(out, "**Question:** {}\n", document.question);
    let _ = writeln!(out, "## Executive Summary\n\n{}\n", document.summary.trim());
    for table in &document.tables {
        write_table(&mut out, table);
    }
    out
}

#[async_trait]
impl ReportRenderer for MarkdownReportWriter {
    async fn render(&self, document: &ReportDocument) -> Result<PathBuf, RenderError> {
        tokio::fs::create_dir_all(&self.out_dir).await?;
        let path = self.out_dir.join(Self::file_name(&document.question));
        tokio::fs::write(&path, render_markdown(document)).await?;
        tracing::info!("Report written to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opportunity_core::{MetricRecord, ScoredRecord};

    fn document() -> ReportDocument {
        let ranked = vec![ScoredRecord {
            record: MetricRecord::failed("ILD", "offline"),
            score: 0.5,
        }];
        ReportDocument::from_ranked("Title", "Which disease?", "Summary | text", &ranked, &[])
    }

    #[test]
    fn test_file_name_is_stable() {
        let a = MarkdownReportWriter::file_name("Which disease?");
        assert_eq!(a, MarkdownReportWriter::file_name("Which disease?"));
        assert_ne!(a, MarkdownReportWriter::file_name("Another question"));
        assert_eq!(a.len(), "report-".len() + 16 + ".md".len());
    }

    #[test]
    fn test_markdown_skips_empty_tables() {
        let markdown = render_markdown(&document());
        assert!(markdown.starts_with("# Title"));
        assert!(markdown.contains("## Disease Rankings"));
        assert!(markdown.contains("| ILD | 0.500 |"));
        assert!(!markdown.contains("Internal Knowledge References"));
    }

    #[tokio::test]
    async fn test_render_writes_into_out_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("reports");
        let writer = MarkdownReportWriter::new(&dir);
        assert_eq!(writer.out_dir(), dir.as_path());

        let path = writer.render(&document()).await.unwrap();
        assert!(path.starts_with(&dir));
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some(MarkdownReportWriter::file_name("Which disease?").as_str())
        );
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("**Question:** Which disease?"));
    }
}
