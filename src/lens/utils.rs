//! Common utility functions for lens modules
//!
//! Output formats shared by every command, and rendering of query results
//! and status messages in those formats.

use crate::database::QueryResult;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unified output format for all lens commands
///
/// This enum provides a consistent set of output formats that can be used
/// across all snowcli commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Pretty table with borders (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// Compact JSON (single line per object)
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
    /// JSON Lines format (one JSON object per line, for streaming)
    JsonLine,
    /// Pipe-separated values with header
    Psv,
}

impl OutputFormat {
    /// Check if this is a JSON variant
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty | Self::JsonLine)
    }

    /// Get a list of all format names for help text
    pub fn all_names() -> &'static [&'static str] {
        &[
            "table",
            "markdown",
            "json",
            "json-pretty",
            "json-line",
            "psv",
        ]
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
            Self::JsonLine => write!(f, "json-line"),
            Self::Psv => write!(f, "psv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "json-line" | "jsonline" | "jsonl" | "ndjson" => Ok(Self::JsonLine),
            "psv" | "pipe" => Ok(Self::Psv),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// Placeholder for SQL NULL in text output
pub const NULL_DISPLAY: &str = "NULL";

fn text_rows(result: &QueryResult) -> Vec<Vec<String>> {
    result
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| v.clone().unwrap_or_else(|| NULL_DISPLAY.to_string()))
                .collect()
        })
        .collect()
}

#[cfg(feature = "display")]
fn render_table(result: &QueryResult, markdown: bool) -> String {
    use tabled::builder::Builder;
    use tabled::settings::Style;

    let mut builder = Builder::default();
    builder.push_record(result.columns.clone());
    for row in text_rows(result) {
        builder.push_record(row);
    }
    let mut table = builder.build();
    if markdown {
        table.with(Style::markdown());
    } else {
        table.with(Style::rounded());
    }
    table.to_string()
}

#[cfg(not(feature = "display"))]
fn render_table(result: &QueryResult, _markdown: bool) -> String {
    render_psv(result)
}

fn render_psv(result: &QueryResult) -> String {
    let mut lines = vec![result.columns.join("|")];
    lines.extend(text_rows(result).into_iter().map(|row| row.join("|")));
    lines.join("\n")
}

/// Render a query result in the requested format
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Table => render_table(result, false),
        OutputFormat::Markdown => render_table(result, true),
        OutputFormat::Json => serde_json::to_string(result)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(result)?,
        OutputFormat::JsonLine => result
            .to_json_rows()
            .into_iter()
            .map(|row| serde_json::to_string(&row))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n"),
        OutputFormat::Psv => render_psv(result),
    })
}

/// Render a single status message; JSON formats wrap it as `{"message": ...}`
pub fn format_message(message: &str, format: OutputFormat) -> Result<String> {
    let value = serde_json::json!({ "message": message });
    Ok(match format {
        OutputFormat::Json | OutputFormat::JsonLine => serde_json::to_string(&value)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&value)?,
        _ => message.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QueryResult {
        QueryResult::new(
            vec!["name".to_string(), "size".to_string()],
            vec![
                vec![Some("a.py".to_string()), Some("12".to_string())],
                vec![Some("b.py".to_string()), None],
            ],
        )
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(
            OutputFormat::from_str("table").unwrap(),
            OutputFormat::Table
        );
        assert_eq!(
            OutputFormat::from_str("pretty").unwrap(),
            OutputFormat::Table
        );
        assert_eq!(
            OutputFormat::from_str("md").unwrap(),
            OutputFormat::Markdown
        );
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert_eq!(
            OutputFormat::from_str("jsonl").unwrap(),
            OutputFormat::JsonLine
        );
        assert_eq!(OutputFormat::from_str("psv").unwrap(), OutputFormat::Psv);
        assert!(OutputFormat::from_str("invalid").is_err());
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Table.to_string(), "table");
        assert_eq!(OutputFormat::JsonPretty.to_string(), "json-pretty");
        assert_eq!(OutputFormat::JsonLine.to_string(), "json-line");
    }

    #[test]
    fn test_output_format_kinds() {
        assert!(OutputFormat::Json.is_json());
        assert!(!OutputFormat::Psv.is_json());
        assert!(OutputFormat::JsonLine.is_json());
    }

    #[test]
    fn test_format_psv() {
        assert_eq!(
            format_query_result(&sample(), OutputFormat::Psv).unwrap(),
            "name|size\na.py|12\nb.py|NULL"
        );
    }

    #[test]
    fn test_format_json() {
        assert_eq!(
            format_query_result(&sample(), OutputFormat::Json).unwrap(),
            r#"[{"name":"a.py","size":"12"},{"name":"b.py","size":null}]"#
        );
        assert_eq!(
            format_query_result(&sample(), OutputFormat::JsonLine).unwrap(),
            "{\"name\":\"a.py\",\"size\":\"12\"}\n{\"name\":\"b.py\",\"size\":null}"
        );
    }

    #[test]
    fn test_format_table() {
        let table = format_query_result(&sample(), OutputFormat::Markdown).unwrap();
        assert!(table.contains("a.py"));
        assert!(table.contains("NULL"));
    }

    #[test]
    fn test_format_message() {
        assert_eq!(
            format_message("done", OutputFormat::Table).unwrap(),
            "done"
        );
        assert_eq!(
            format_message("done", OutputFormat::Json).unwrap(),
            r#"{"message":"done"}"#
        );
    }
}
