//! Answer document output.
//!
//! Renders the ordered answers of a run under a student/group header as
//! Markdown, plain text, a single JSON object, or JSON Lines.

use crate::pipeline::ResultTable;
use crate::text::strip_markdown_bold;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Document format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Markdown,
    /// Markdown with the bold markers removed
    Text,
    /// Single JSON object with header and answers
    Json,
    /// One JSON object per answer (newline-delimited JSON)
    JsonLines,
}

impl DocumentFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Some(Self::Markdown),
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Text => "txt",
            Self::Json => "json",
            Self::JsonLines => "jsonl",
        }
    }
}

/// One answer as written to JSON output.
#[derive(Debug, Serialize)]
struct AnswerRecord<'a> {
    index: usize,
    title: &'a str,
    answer: &'a str,
    error: bool,
}

#[derive(Debug, Serialize)]
struct DocumentRecord<'a> {
    student: &'a str,
    group: &'a str,
    answers: Vec<AnswerRecord<'a>>,
}

/// The answers of a run, ready to be written out.
#[derive(Debug, Clone)]
pub struct AnswerDocument {
    pub student_name: String,
    pub group: String,
    /// `(title, body)` pairs in input order
    pub answers: Vec<(String, String)>,
}

impl AnswerDocument {
    pub fn new(
        student_name: impl Into<String>,
        group: impl Into<String>,
        answers: Vec<(String, String)>,
    ) -> Self {
        Self {
            student_name: student_name.into(),
            group: group.into(),
            answers,
        }
    }

    pub fn from_results(
        student_name: impl Into<String>,
        group: impl Into<String>,
        results: &ResultTable,
    ) -> Self {
        Self::new(student_name, group, results.pairs())
    }

    /// File name (without extension) for a document.
    ///
    /// A non-empty `custom` name wins; otherwise student and group with
    /// spaces replaced by underscores, joined by `_`.
    pub fn output_filename(student_name: &str, group: &str, custom: &str) -> String {
        if !custom.is_empty() {
            return custom.to_string();
        }
        format!("{}_{}", student_name.replace(' ', "_"), group.replace(' ', "_"))
    }

    /// Write the document in `format`.
    pub fn render<W: Write>(&self, writer: &mut W, format: DocumentFormat) -> io::Result<()> {
        match format {
            DocumentFormat::Markdown => writer.write_all(self.to_markdown().as_bytes()),
            DocumentFormat::Text => {
                writer.write_all(strip_markdown_bold(&self.to_markdown()).as_bytes())
            }
            DocumentFormat::Json => {
                let document = DocumentRecord {
                    student: &self.student_name,
                    group: &self.group,
                    answers: self.records().collect(),
                };
                serde_json::to_writer_pretty(&mut *writer, &document).map_err(io::Error::other)?;
                writeln!(writer)
            }
            DocumentFormat::JsonLines => {
                // JSONL is never pretty-printed (one object per line)
                for record in self.records() {
                    serde_json::to_writer(&mut *writer, &record).map_err(io::Error::other)?;
                    writeln!(writer)?;
                }
                Ok(())
            }
        }
    }

    /// Render into a string.
    pub fn render_to_string(&self, format: DocumentFormat) -> io::Result<String> {
        let mut buffer = Vec::new();
        self.render(&mut buffer, format)?;
        String::from_utf8(buffer).map_err(io::Error::other)
    }

    /// Write the document to `dir/filename`, appending the format's extension
    /// if `filename` lacks it. Creates `dir` if needed.
    pub fn save(&self, dir: &Path, filename: &str, format: DocumentFormat) -> io::Result<PathBuf> {
        let extension = format.extension();
        let filename = if filename.ends_with(&format!(".{extension}")) {
            filename.to_string()
        } else {
            format!("{filename}.{extension}")
        };

        std::fs::create_dir_all(dir)?;
        let path = dir.join(filename);
        let mut file = io::BufWriter::new(std::fs::File::create(&path)?);
        self.render(&mut file, format)?;
        file.flush()?;

        tracing::debug!("Wrote {} answers to {:?}", self.answers.len(), path);
        Ok(path)
    }

    fn to_markdown(&self) -> String {
        let mut out = format!(
            "**Student:** {}\n\n**Group:** {}\n\n",
            self.student_name, self.group
        );
        let bodies: Vec<&str> = self.answers.iter().map(|(_, body)| body.trim_end()).collect();
        out.push_str(&bodies.join("\n\n"));
        if !bodies.is_empty() {
            out.push('\n');
        }
        out
    }

    fn records(&self) -> impl Iterator<Item = AnswerRecord<'_>> {
        self.answers
            .iter()
            .enumerate()
            .map(|(index, (title, body))| AnswerRecord {
                index,
                title,
                answer: body,
                error: body.starts_with(crate::pipeline::ERROR_PREFIX),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::WorkResult;

    fn sample() -> AnswerDocument {
        AnswerDocument::new(
            "Test Student",
            "Test Group",
            vec![
                (String::new(), "**Exercise A**\n1. Answer one\n2. Answer two".to_string()),
                (String::new(), "**Exercise B**\n1. Answer three".to_string()),
            ],
        )
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(
            AnswerDocument::output_filename("John Doe", "Group A", "custom_output"),
            "custom_output"
        );
        assert_eq!(
            AnswerDocument::output_filename("John Doe", "Group A", ""),
            "John_Doe_Group_A"
        );
        assert_eq!(
            AnswerDocument::output_filename("John  Doe", "Group  A", ""),
            "John__Doe_Group__A"
        );
        assert_eq!(AnswerDocument::output_filename("", "Group A", ""), "_Group_A");
        assert_eq!(AnswerDocument::output_filename("", "", ""), "_");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(DocumentFormat::parse("markdown"), Some(DocumentFormat::Markdown));
        assert_eq!(DocumentFormat::parse("MD"), Some(DocumentFormat::Markdown));
        assert_eq!(DocumentFormat::parse("txt"), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::parse("json"), Some(DocumentFormat::Json));
        assert_eq!(DocumentFormat::parse("JSONL"), Some(DocumentFormat::JsonLines));
        assert_eq!(DocumentFormat::parse("pdf"), None);
        assert_eq!(DocumentFormat::JsonLines.extension(), "jsonl");
    }

    #[test]
    fn test_render_markdown() {
        let out = sample().render_to_string(DocumentFormat::Markdown).unwrap();
        assert_eq!(
            out,
            "**Student:** Test Student\n\n**Group:** Test Group\n\n\
             **Exercise A**\n1. Answer one\n2. Answer two\n\n\
             **Exercise B**\n1. Answer three\n"
        );
    }

    #[test]
    fn test_render_text_strips_bold() {
        let out = sample().render_to_string(DocumentFormat::Text).unwrap();
        assert!(out.starts_with("Student: Test Student\n\nGroup: Test Group"));
        assert!(out.contains("Exercise B\n1. Answer three"));
        assert!(!out.contains("**"));
    }

    #[test]
    fn test_render_json() {
        let out = sample().render_to_string(DocumentFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["student"], "Test Student");
        assert_eq!(value["answers"].as_array().unwrap().len(), 2);
        assert_eq!(value["answers"][1]["index"], 1);
        assert_eq!(value["answers"][1]["error"], false);
    }

    #[test]
    fn test_render_jsonl_flags_errors() {
        let mut table = ResultTable::with_len(2);
        table.fill(WorkResult::answer(0, "ok"));
        table.fill(WorkResult::error(1, "Rate limit timeout"));
        let doc = AnswerDocument::from_results("A", "B", &table);

        let out = doc.render_to_string(DocumentFormat::JsonLines).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["answer"], "ok");
        assert_eq!(lines[1]["error"], true);
    }

    #[test]
    fn test_empty_document_has_header_only() {
        let doc = AnswerDocument::new("Test Student", "Test Group", vec![]);
        let out = doc.render_to_string(DocumentFormat::Markdown).unwrap();
        assert_eq!(out, "**Student:** Test Student\n\n**Group:** Test Group\n\n");
    }

    #[test]
    fn test_save_appends_extension_once() {
        let dir = tempfile::tempdir().unwrap();
        let doc = sample();

        let path = doc
            .save(dir.path(), "Test_Student_Test_Group", DocumentFormat::Markdown)
            .unwrap();
        assert_eq!(path, dir.path().join("Test_Student_Test_Group.md"));

        let path = doc.save(dir.path(), "answers.json", DocumentFormat::Json).unwrap();
        assert_eq!(path, dir.path().join("answers.json"));
        assert!(std::fs::read_to_string(path).unwrap().contains("Exercise A"));
    }

    #[test]
    fn test_save_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out/answers");
        let path = sample().save(&nested, "doc", DocumentFormat::Text).unwrap();
        assert!(path.exists());
    }
}
