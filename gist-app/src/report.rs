//! Report assembly: markdown-flavoured text or JSON, plus file persistence.
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use gist_common::{BatchOutcome, BatchReport, SummaryFormat, SummaryLength, SummaryOptions};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use uuid::Uuid;

#[derive(Serialize)]
struct JsonReport<'a> {
    run_id: Uuid,
    generated_at: DateTime<Utc>,
    length: SummaryLength,
    format: SummaryFormat,
    total: usize,
    succeeded: usize,
    failed: usize,
    results: &'a [BatchOutcome],
    #[serde(skip_serializing_if = "Option::is_none")]
    comparative: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparative_error: Option<&'a str>,
}

/// Render `report` for stdout and file output.
pub fn render(report: &BatchReport, opts: &SummaryOptions, run_id: Uuid, json: bool) -> Result<String> {
    if json {
        render_json(report, opts, run_id)
    } else {
        Ok(render_text(report, opts))
    }
}

fn render_json(report: &BatchReport, opts: &SummaryOptions, run_id: Uuid) -> Result<String> {
    let doc = JsonReport {
        run_id,
        generated_at: Utc::now(),
        length: opts.length,
        format: opts.format,
        total: report.outcomes.len(),
        succeeded: report.successes(),
        failed: report.failures(),
        results: &report.outcomes,
        comparative: report.comparative.as_deref(),
        comparative_error: report.comparative_error.as_deref(),
    };
    serde_json::to_string_pretty(&doc).context("failed to serialize report")
}

fn heading(outcome: &BatchOutcome) -> &str {
    if outcome.metadata.title.is_empty() {
        &outcome.url
    } else {
        &outcome.metadata.title
    }
}

fn render_text(report: &BatchReport, opts: &SummaryOptions) -> String {
    let mut out = String::new();
    let single = report.outcomes.len() == 1;
    if !single {
        let _ = writeln!(out, "# Web Page Summaries\n");
    }

    for (i, outcome) in report.outcomes.iter().enumerate() {
        if single {
            let _ = writeln!(out, "# {}\n", heading(outcome));
        } else {
            let _ = writeln!(out, "## {}. {}\n", i + 1, heading(outcome));
        }
        let _ = writeln!(out, "**URL:** {}", outcome.url);
        if opts.include_metadata && outcome.is_success() {
            let meta = &outcome.metadata;
            if !meta.description.is_empty() {
                let _ = writeln!(out, "**Description:** {}", meta.description);
            }
            let _ = writeln!(
                out,
                "**Captured:** {}",
                meta.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
            );
        }
        if let Some(n) = outcome.retry_count {
            let _ = writeln!(out, "**Retries:** {n}");
        }
        out.push('\n');
        match &outcome.error {
            Some(err) => {
                let _ = writeln!(out, "**Error:** {err}\n");
            }
            None => {
                let _ = writeln!(out, "{}\n", outcome.summary.trim());
            }
        }
    }

    if let Some(text) = &report.comparative {
        let _ = writeln!(out, "## Comparative Analysis\n\n{}\n", text.trim());
    } else if let Some(err) = &report.comparative_error {
        let _ = writeln!(out, "## Comparative Analysis\n\n**Error:** {err}\n");
    }

    if !single {
        let _ = writeln!(
            out,
            "---\n{} of {} pages summarized.",
            report.successes(),
            report.outcomes.len()
        );
    }
    out.trim_end().to_string() + "\n"
}

/// Write the rendered report, creating parent directories as needed.
pub async fn save(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gist_common::{GistError, PageMetadata};

    fn meta(url: &str, title: &str) -> PageMetadata {
        PageMetadata {
            title: title.into(),
            description: "About things".into(),
            ..PageMetadata::bare(url)
        }
    }

    fn batch() -> BatchReport {
        BatchReport {
            outcomes: vec![
                BatchOutcome::success("First summary.".into(), meta("https://a.test/", "Alpha"), 0),
                BatchOutcome::failure(
                    "https://b.test/",
                    &GistError::permanent("HTTP 404 Not Found"),
                    0,
                ),
                BatchOutcome::success("Third summary.".into(), meta("https://c.test/", ""), 2),
            ],
            comparative: Some("They differ.".into()),
            comparative_error: None,
        }
    }

    #[test]
    fn text_report_lists_every_outcome_in_order() {
        let text = render_text(&batch(), &SummaryOptions::default());
        let alpha = text.find("## 1. Alpha").unwrap();
        let failed = text.find("## 2. https://b.test/").unwrap();
        let third = text.find("## 3. https://c.test/").unwrap();
        assert!(alpha < failed && failed < third);
        assert!(text.contains("**Error:** HTTP 404 Not Found"));
        assert!(text.contains("**Retries:** 2"));
        assert!(text.contains("## Comparative Analysis\n\nThey differ."));
        assert!(text.ends_with("2 of 3 pages summarized.\n"));
        assert!(!text.contains("**Description:**"));
    }

    #[test]
    fn single_report_uses_title_heading_and_metadata() {
        let report = BatchReport {
            outcomes: vec![BatchOutcome::success(
                "Only summary.".into(),
                meta("https://a.test/", "Alpha"),
                0,
            )],
            ..Default::default()
        };
        let opts = SummaryOptions {
            include_metadata: true,
            ..Default::default()
        };
        let text = render_text(&report, &opts);
        assert!(text.starts_with("# Alpha\n"));
        assert!(text.contains("**Description:** About things"));
        assert!(text.contains("**Captured:** "));
        assert!(!text.contains("pages summarized"));
    }

    #[test]
    fn json_report_carries_counts_and_outcomes() {
        let run_id = Uuid::new_v4();
        let rendered = render(&batch(), &SummaryOptions::default(), run_id, true).unwrap();
        let v: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(v["run_id"], run_id.to_string());
        assert_eq!(v["total"], 3);
        assert_eq!(v["succeeded"], 2);
        assert_eq!(v["failed"], 1);
        assert_eq!(v["length"], "medium");
        assert_eq!(v["results"][1]["error"], "HTTP 404 Not Found");
        assert!(v["results"][0].get("retry_count").is_none());
        assert_eq!(v["results"][2]["retry_count"], 2);
        assert_eq!(v["comparative"], "They differ.");
        assert!(v.get("comparative_error").is_none());
    }

    #[tokio::test]
    async fn save_creates_parent_directories() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("reports").join("run.md");
        save(&path, "# Report\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Report\n");
    }
}
