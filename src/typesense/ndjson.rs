//! Newline-delimited JSON
//!
//! Import and export bodies are one JSON document per line. A bad line never
//! sinks the batch: it is reported in place, next to the lines that worked.

use crate::error::{NodeError, NodeResult};
use serde_json::{json, Value};

/// Longest slice of an unparsable line echoed back to the user
const MAX_RAW_ECHO: usize = 120;

/// One non-blank line of an NDJSON text
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    /// 1-based line number in the original text
    pub line: usize,
    pub result: Result<Value, String>,
}

/// Parse every non-blank line independently
pub fn parse_lines(text: &str) -> Vec<ParsedLine> {
    text.lines()
        .enumerate()
        .filter(|(_, raw)| !raw.trim().is_empty())
        .map(|(idx, raw)| ParsedLine {
            line: idx + 1,
            result: serde_json::from_str(raw.trim())
                .map_err(|e| format!("Invalid JSON on line {}: {} ({})", idx + 1, e, echo(raw))),
        })
        .collect()
}

/// Serialize documents one per line
pub fn encode_documents(documents: &[Value]) -> NodeResult<String> {
    let mut lines = Vec::with_capacity(documents.len());
    for document in documents {
        let line = serde_json::to_string(document)
            .map_err(|e| NodeError::validation(format!("Failed to serialize document: {}", e)))?;
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

/// Documents to import, as the user supplied them
///
/// A JSON array (inline or as text) yields one entry per element; any other
/// text is read as NDJSON, keeping unparsable lines as errors.
pub fn read_import_input(input: &Value) -> NodeResult<Vec<ParsedLine>> {
    let entries = match input {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(idx, item)| ParsedLine {
                line: idx + 1,
                result: Ok(item.clone()),
            })
            .collect(),
        Value::Object(_) => vec![ParsedLine {
            line: 1,
            result: Ok(input.clone()),
        }],
        Value::String(text) if text.trim_start().starts_with('[') => {
            let parsed: Value = serde_json::from_str(text).map_err(|e| {
                NodeError::validation(format!("Documents must be a valid JSON array: {}", e))
            })?;
            return read_import_input(&parsed);
        }
        Value::String(text) => parse_lines(text),
        _ => {
            return Err(NodeError::validation(
                "Documents must be a JSON array or newline-delimited JSON",
            ))
        }
    };
    Ok(entries)
}

/// Turn parsed export lines into output records
pub fn export_records(text: &str) -> Vec<Value> {
    parse_lines(text)
        .into_iter()
        .map(|parsed| match parsed.result {
            Ok(document) => document,
            Err(error) => json!({ "error": error, "line": parsed.line }),
        })
        .collect()
}

fn echo(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() > MAX_RAW_ECHO {
        let head: String = trimmed.chars().take(MAX_RAW_ECHO).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines_reports_bad_lines_inline() {
        let text = "{\"id\":\"1\"}\n\nnot json\n{\"id\":\"2\"}\n";
        let lines = parse_lines(text);

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].result, Ok(json!({"id": "1"})));
        assert_eq!(lines[1].line, 3);
        assert!(lines[1].result.as_ref().unwrap_err().contains("line 3"));
        assert_eq!(lines[2].line, 4);
    }

    #[test]
    fn test_encode_documents_one_per_line() {
        let text = encode_documents(&[json!({"id": "1"}), json!({"id": "2"})]).unwrap();
        assert_eq!(text, "{\"id\":\"1\"}\n{\"id\":\"2\"}");
    }

    #[test]
    fn test_read_import_input_shapes() {
        assert_eq!(read_import_input(&json!([{"id": "1"}, {"id": "2"}])).unwrap().len(), 2);
        assert_eq!(read_import_input(&json!("[{\"id\": \"1\"}]")).unwrap().len(), 1);
        assert_eq!(read_import_input(&json!({"id": "1"})).unwrap().len(), 1);

        let ndjson = read_import_input(&json!("{\"id\":\"1\"}\n{broken")).unwrap();
        assert!(ndjson[0].result.is_ok());
        assert!(ndjson[1].result.is_err());

        assert!(read_import_input(&json!("[{broken")).is_err());
        assert!(read_import_input(&json!(42)).is_err());
    }

    #[test]
    fn test_export_records_keep_going_after_errors() {
        let records = export_records("{\"id\":\"1\"}\n{oops\n{\"id\":\"3\"}");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["id"], "1");
        assert_eq!(records[1]["line"], 2);
        assert!(records[1]["error"].as_str().unwrap().starts_with("Invalid JSON"));
        assert_eq!(records[2]["id"], "3");
    }
}
