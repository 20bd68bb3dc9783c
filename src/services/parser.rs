#![allow(clippy::result_large_err)]

//! Document parsing seam used by the input stage.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Parsed content of an uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum ParsedDocument {
    /// Header-keyed rows of a tabular file.
    Rows(Vec<Map<String, Value>>),
    Text(String),
    Json(Value),
}

impl ParsedDocument {
    pub fn into_value(self) -> Value {
        match self {
            ParsedDocument::Rows(rows) => Value::Array(rows.into_iter().map(Value::Object).collect()),
            ParsedDocument::Text(text) => Value::String(text),
            ParsedDocument::Json(value) => value,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unsupported file type '{0}'")]
    Unsupported(String),
    #[error("file is empty")]
    Empty,
    #[error("file is not valid UTF-8: {0}")]
    Encoding(String),
    #[error("malformed CSV: {0}")]
    Csv(String),
    #[error("malformed JSON: {0}")]
    Json(String),
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError::with_source(ErrorCategory::InputError, err.to_string(), Box::new(err))
            .with_suggestion("Upload a CSV, JSON or plain text file in the expected layout")
    }
}

pub trait DocumentParser: Send + Sync {
    /// Lowercase extensions with the leading dot.
    fn extensions(&self) -> &'static [&'static str];

    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument, ParseError>;
}

/// Comma-separated values with a header row. Cells that read as numbers or
/// booleans are typed; headers are normalized to snake_case.
#[derive(Debug, Default)]
pub struct CsvParser;

impl DocumentParser for CsvParser {
    fn extensions(&self) -> &'static [&'static str] {
        &[".csv"]
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument, ParseError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError::Empty);
        }
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(bytes);
        let headers: Vec<String> = reader
            .headers()
            .map_err(|err| ParseError::Csv(err.to_string()))?
            .iter()
            .map(normalize_header)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| ParseError::Csv(err.to_string()))?;
            let row: Map<String, Value> = headers
                .iter()
                .zip(record.iter())
                .map(|(header, cell)| (header.clone(), infer_cell(cell)))
                .collect();
            rows.push(row);
        }
        Ok(ParsedDocument::Rows(rows))
    }
}

#[derive(Debug, Default)]
pub struct JsonParser;

impl DocumentParser for JsonParser {
    fn extensions(&self) -> &'static [&'static str] {
        &[".json"]
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument, ParseError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError::Empty);
        }
        serde_json::from_slice(bytes)
            .map(ParsedDocument::Json)
            .map_err(|err| ParseError::Json(err.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct TextParser;

impl DocumentParser for TextParser {
    fn extensions(&self) -> &'static [&'static str] {
        &[".txt"]
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument, ParseError> {
        let text = std::str::from_utf8(bytes).map_err(|err| ParseError::Encoding(err.to_string()))?;
        if text.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        Ok(ParsedDocument::Text(text.to_string()))
    }
}

/// Parsers keyed by file extension.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<&'static str, Arc<dyn DocumentParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the CSV, JSON and text parsers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CsvParser));
        registry.register(Arc::new(JsonParser));
        registry.register(Arc::new(TextParser));
        registry
    }

    pub fn register(&mut self, parser: Arc<dyn DocumentParser>) {
        for extension in parser.extensions() {
            self.parsers.insert(*extension, Arc::clone(&parser));
        }
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.parsers.contains_key(extension.to_lowercase().as_str())
    }

    pub fn parse(&self, file_name: &str, bytes: &[u8]) -> Result<ParsedDocument, AppError> {
        let extension = file_extension(file_name);
        let parser = self
            .parsers
            .get(extension.as_str())
            .ok_or_else(|| ParseError::Unsupported(extension.clone()))?;
        let document = parser.parse(bytes).map_err(|err| AppError::from(err).with_context(file_name))?;
        tracing::debug!(file = file_name, extension = %extension, "document parsed");
        Ok(document)
    }
}

/// Lowercase extension of `file_name` with its leading dot, or "" if none.
pub fn file_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
        .collect()
}

fn infer_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match cell.to_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    // Identifiers such as "007" stay text.
    let leading_zero = cell.len() > 1 && cell.starts_with('0') && !cell.starts_with("0.");
    if !leading_zero {
        if let Ok(integer) = cell.parse::<i64>() {
            return Value::Number(integer.into());
        }
        if let Some(number) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(number);
        }
    }
    Value::String(cell.to_string())
}
