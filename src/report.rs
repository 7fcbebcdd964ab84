//! Console rendering for upload reports and search results.

use std::io::{self, Write};

use crate::corpus::MetadataStamp;
use crate::upload::{ChunkOutcome, UploadReport, UploadStatus};
use crate::vector_store::ChunkMatch;

/// Characters of content shown per search match.
pub const PREVIEW_CHARS: usize = 150;

/// Writes the tool banner.
pub fn render_banner<W: Write>(out: &mut W, stamp: &MetadataStamp, model: &str) -> io::Result<()> {
    writeln!(out, "{} Framework Vectorization", stamp.framework)?;
    writeln!(out, "Created by: {}", stamp.author)?;
    writeln!(out, "Embedding model: {model}")?;
    writeln!(out, "{}", "=".repeat(60))
}

/// Writes the line announcing how many chunks will be processed.
pub fn render_upload_start<W: Write>(out: &mut W, total: usize) -> io::Result<()> {
    writeln!(out, "Total chunks processed: {total}")
}

/// Writes the progress line for one finished chunk.
pub fn render_outcome<W: Write>(
    out: &mut W,
    index: usize,
    total: usize,
    outcome: &ChunkOutcome,
) -> io::Result<()> {
    match &outcome.status {
        UploadStatus::Uploaded(ack) => match &ack.row_id {
            Some(row_id) => writeln!(
                out,
                "[{index}/{total}] uploaded {} (row {row_id})",
                outcome.chunk_id
            ),
            None => writeln!(out, "[{index}/{total}] uploaded {}", outcome.chunk_id),
        },
        UploadStatus::Failed(error) => writeln!(
            out,
            "[{index}/{total}] failed {}: {error}",
            outcome.chunk_id
        ),
    }
}

/// Writes the summary counts; the readiness line only follows a run with no failures.
pub fn render_upload_summary<W: Write>(
    out: &mut W,
    report: &UploadReport,
    stamp: &MetadataStamp,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Vectorization complete")?;
    writeln!(out, "Successful uploads: {}", report.successful())?;
    writeln!(out, "Failed uploads: {}", report.failed())?;
    if report.is_complete() {
        writeln!(
            out,
            "The {} framework is now vectorized and ready for retrieval.",
            stamp.framework
        )?;
    }
    Ok(())
}

/// Writes the ranked matches for a query.
pub fn render_matches<W: Write>(out: &mut W, query: &str, matches: &[ChunkMatch]) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Search for '{query}'")?;
    writeln!(
        out,
        "Found {} relevant chunk{}:",
        matches.len(),
        if matches.len() == 1 { "" } else { "s" }
    )?;
    for (idx, found) in matches.iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "{}. {}", idx + 1, found.metadata.chunk_id)?;
        writeln!(out, "   Similarity: {:.3}", found.similarity)?;
        writeln!(out, "   Category: {}", found.metadata.category)?;
        writeln!(out, "   Content: {}", preview(&found.content, PREVIEW_CHARS))?;
    }
    Ok(())
}

/// Writes the failure line and the missing-function hint.
pub fn render_search_failure<W: Write>(
    out: &mut W,
    error: &anyhow::Error,
    function: &str,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Search failed: {error:#}")?;
    writeln!(
        out,
        "Note: the `{function}` function may not exist yet; `framework-vectorizer schema` prints the SQL to create it."
    )
}

/// First `max_chars` characters of `text`, with `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::ChunkMetadata;
    use crate::vector_store::InsertAck;
    use pretty_assertions::assert_eq;

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn upload_summary_lists_outcomes() {
        let report = UploadReport {
            outcomes: vec![
                ChunkOutcome {
                    chunk_id: "framework_philosophy_001".to_string(),
                    status: UploadStatus::Uploaded(InsertAck {
                        row_id: Some("11".to_string()),
                    }),
                },
                ChunkOutcome {
                    chunk_id: "lesson_structure_opening_001".to_string(),
                    status: UploadStatus::Failed("failed to embed: timeout".to_string()),
                },
            ],
        };
        let text = render(|out| {
            render_upload_start(out, report.total())?;
            for (idx, outcome) in report.outcomes.iter().enumerate() {
                render_outcome(out, idx + 1, report.total(), outcome)?;
            }
            render_upload_summary(out, &report, &MetadataStamp::default())
        });
        assert_eq!(
            text,
            "Total chunks processed: 2\n\
             [1/2] uploaded framework_philosophy_001 (row 11)\n\
             [2/2] failed lesson_structure_opening_001: failed to embed: timeout\n\
             \n\
             Vectorization complete\n\
             Successful uploads: 1\n\
             Failed uploads: 1\n"
        );
    }

    #[test]
    fn clean_upload_announces_readiness() {
        let report = UploadReport {
            outcomes: vec![ChunkOutcome {
                chunk_id: "a".to_string(),
                status: UploadStatus::Uploaded(InsertAck::default()),
            }],
        };
        let line = render(|out| render_outcome(out, 1, 1, &report.outcomes[0]));
        assert_eq!(line, "[1/1] uploaded a\n");
        let text = render(|out| render_upload_summary(out, &report, &MetadataStamp::default()));
        assert!(text.ends_with("The SHE IS AI framework is now vectorized and ready for retrieval.\n"));
    }

    #[test]
    fn empty_upload_reports_zero_counts() {
        let text = render(|out| {
            render_upload_start(out, 0)?;
            render_upload_summary(out, &UploadReport::default(), &MetadataStamp::default())
        });
        assert!(text.starts_with("Total chunks processed: 0\n"));
        assert!(text.contains("Successful uploads: 0\n"));
        assert!(text.contains("Failed uploads: 0\n"));
        assert!(text.contains("ready for retrieval"));
    }

    #[test]
    fn failures_suppress_readiness() {
        let report = UploadReport {
            outcomes: vec![ChunkOutcome {
                chunk_id: "a".to_string(),
                status: UploadStatus::Failed("timeout".to_string()),
            }],
        };
        let text = render(|out| render_upload_summary(out, &report, &MetadataStamp::default()));
        assert!(!text.contains("ready for retrieval"), "{text}");
    }

    #[test]
    fn matches_show_rank_score_category_and_preview() {
        let matches = vec![ChunkMatch {
            id: Some("5".to_string()),
            content: "x".repeat(200),
            metadata: ChunkMetadata {
                chunk_id: "core_concepts_ethics_001".to_string(),
                category: "Core Content".to_string(),
                ..ChunkMetadata::default()
            },
            similarity: 0.61234,
        }];
        let text = render(|out| render_matches(out, "bias in AI education", &matches));
        let expected = format!(
            "\nSearch for 'bias in AI education'\nFound 1 relevant chunk:\n\n\
             1. core_concepts_ethics_001\n   Similarity: 0.612\n   Category: Core Content\n   Content: {}...\n",
            "x".repeat(150)
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        assert_eq!(preview("héllo wörld", 5), "héllo...");
        assert_eq!(preview("short", 150), "short");
        assert_eq!(preview("exact", 5), "exact");
    }

    #[test]
    fn failure_hint_names_function() {
        let err = anyhow::anyhow!("404 Not Found");
        let text = render(|out| render_search_failure(out, &err, "match_framework_chunks_hf"));
        assert!(text.contains("Search failed: 404 Not Found"));
        assert!(text.contains("`match_framework_chunks_hf` function may not exist yet"));
    }
}
