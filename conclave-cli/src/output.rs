//! Result rendering

use anyhow::Result;
use clap::ValueEnum;
use conclave_core::dispatch::CompletedReview;
use conclave_core::Severity;

/// Output format for completed reviews
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Pretty,
    /// One JSON document with every result
    Json,
    /// Markdown report
    Markdown,
}

/// Render the batch's successful reviews
pub fn render(completed: &[CompletedReview], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Pretty => Ok(render_pretty(completed)),
        OutputFormat::Json => render_json(completed),
        OutputFormat::Markdown => Ok(render_markdown(completed)),
    }
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "LOW",
        Severity::Medium => "MEDIUM",
        Severity::High => "HIGH",
        Severity::Critical => "CRITICAL",
    }
}

fn render_pretty(completed: &[CompletedReview]) -> String {
    let mut out = String::new();
    for review in completed {
        out.push_str(&format!(
            "\n{} [{}]\n",
            review.job.display_path(),
            severity_tag(review.result.severity)
        ));
        out.push_str(&format!("  {}\n", review.result.summary));

        for issue in &review.result.issues {
            let location = issue
                .line_number
                .map(|line| format!(" (line {})", line))
                .unwrap_or_default();
            out.push_str(&format!(
                "  - [{}]{} {}\n",
                severity_tag(issue.severity),
                location,
                issue.description
            ));
        }

        if let Some(ref fix) = review.result.code_fix {
            out.push_str(&format!("  Suggested fix:\n{}\n", indent(fix, "    ")));
        }
    }

    if completed.is_empty() {
        out.push_str("No reviews completed.\n");
    }
    out
}

fn render_json(completed: &[CompletedReview]) -> Result<String> {
    let documents: Vec<serde_json::Value> = completed
        .iter()
        .map(|review| {
            Ok(serde_json::json!({
                "file": review.job.display_path(),
                "correlation_id": review.job.correlation_id.to_string(),
                "review": serde_json::to_value(&review.result)?,
            }))
        })
        .collect::<Result<_>>()?;
    Ok(serde_json::to_string_pretty(&documents)?)
}

fn render_markdown(completed: &[CompletedReview]) -> String {
    let mut out = String::from("# Code Review Report\n");
    for review in completed {
        out.push_str(&format!(
            "\n## {}: {}\n\n{}\n",
            review.job.display_path(),
            severity_tag(review.result.severity),
            review.result.summary
        ));

        if !review.result.issues.is_empty() {
            out.push('\n');
            for issue in &review.result.issues {
                let location = issue
                    .line_number
                    .map(|line| format!(" (line {})", line))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "- **{}**{}: {}\n",
                    severity_tag(issue.severity),
                    location,
                    issue.description
                ));
            }
        }
    }
    out
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_core::review::{Issue, IssueCategory};
    use conclave_core::{ReviewJob, ReviewResult};

    fn completed() -> Vec<CompletedReview> {
        let mut result = ReviewResult::clean("One issue found");
        result.severity = Severity::High;
        result.issues.push(Issue {
            description: "Unbounded recursion".to_string(),
            severity: Severity::High,
            category: IssueCategory::Bug,
            line_number: Some(17),
            code_snippet: None,
            related_files: Vec::new(),
            suggested_priority: Some(8),
            references: Vec::new(),
            auto_fixable: false,
        });
        vec![CompletedReview {
            job: ReviewJob::new("src/walk.rs"),
            result,
        }]
    }

    #[test]
    fn test_pretty_lists_issues_with_lines() {
        let text = render(&completed(), OutputFormat::Pretty).unwrap();
        assert!(text.contains("src/walk.rs [HIGH]"));
        assert!(text.contains("(line 17) Unbounded recursion"));
    }

    #[test]
    fn test_markdown_has_headings() {
        let text = render(&completed(), OutputFormat::Markdown).unwrap();
        assert!(text.starts_with("# Code Review Report"));
        assert!(text.contains("## src/walk.rs: HIGH"));
    }

    #[test]
    fn test_json_is_parseable() {
        let text = render(&completed(), OutputFormat::Json).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0]["file"], "src/walk.rs");
        assert_eq!(parsed[0]["review"]["severity"], "high");
    }

    #[test]
    fn test_pretty_empty_batch() {
        let text = render(&[], OutputFormat::Pretty).unwrap();
        assert!(text.contains("No reviews completed."));
    }
}
