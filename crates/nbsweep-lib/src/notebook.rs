//! Notebook document model (nbformat v4)
//!
//! Only the fields the harness needs are typed. Everything else is kept in
//! `extra` maps so a read-then-write cycle preserves the document. Version 3
//! documents are upgraded to version 4 on read.

use crate::error::{ArtifactError, MetadataError};
use nbsweep_types::ErrorDetail;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,
    #[serde(default)]
    pub nbformat_minor: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_nbformat() -> u32 {
    4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<Value>>,
    /// `Some(Value::Null)` for a code cell that has not run; `None` when the field is absent.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub execution_count: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keeps an explicit `null` distinct from a missing field.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Code,
    Markdown,
    Raw,
}

/// Cell source, stored either as one string or as a list of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    Text(String),
    Lines(Vec<String>),
}

impl Default for Source {
    fn default() -> Self {
        Source::Text(String::new())
    }
}

impl Source {
    pub fn text(&self) -> String {
        match self {
            Source::Text(text) => text.clone(),
            Source::Lines(lines) => lines.concat(),
        }
    }
}

impl Cell {
    pub fn code(source: impl Into<String>) -> Self {
        Self {
            cell_type: CellType::Code,
            source: Source::Text(source.into()),
            metadata: Map::new(),
            outputs: Some(Vec::new()),
            execution_count: Some(Value::Null),
            extra: Map::new(),
        }
    }

    pub fn markdown(source: impl Into<String>) -> Self {
        Self {
            cell_type: CellType::Markdown,
            source: Source::Text(source.into()),
            metadata: Map::new(),
            outputs: None,
            execution_count: None,
            extra: Map::new(),
        }
    }

    pub fn is_code(&self) -> bool {
        self.cell_type == CellType::Code
    }

    pub fn push_output(&mut self, output: Value) {
        self.outputs.get_or_insert_with(Vec::new).push(output);
    }
}

/// A `stream` output as produced by a kernel writing to stdout.
pub fn stream_output(text: &str) -> Value {
    serde_json::json!({ "output_type": "stream", "name": "stdout", "text": text })
}

/// An `error` output carrying an exception.
pub fn error_output(detail: &ErrorDetail) -> Value {
    serde_json::json!({
        "output_type": "error",
        "ename": detail.ename,
        "evalue": detail.evalue,
        "traceback": detail.traceback,
    })
}

impl Notebook {
    pub fn new(kernel_name: &str, cells: Vec<Cell>) -> Self {
        let mut metadata = Map::new();
        metadata.insert(
            "kernelspec".to_string(),
            serde_json::json!({ "name": kernel_name, "display_name": kernel_name }),
        );
        Self {
            cells,
            metadata,
            nbformat: 4,
            nbformat_minor: 5,
            extra: Map::new(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, MetadataError> {
        let raw = std::fs::read_to_string(path).map_err(|source| MetadataError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse = |source| MetadataError::Parse {
            path: path.to_path_buf(),
            source,
        };
        let mut document: Value = serde_json::from_str(&raw).map_err(parse)?;
        if document.get("nbformat").and_then(Value::as_u64) == Some(3) {
            document = upgrade_v3(document);
        }
        serde_json::from_value(document).map_err(parse)
    }

    /// Write as indented JSON, the way Jupyter lays notebooks out on disk.
    pub fn write(&self, path: &Path) -> Result<(), ArtifactError> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)
            .map_err(|source| ArtifactError::Serialize {
                path: path.to_path_buf(),
                source,
            })?;
        buffer.push(b'\n');
        std::fs::write(path, buffer).map_err(|source| ArtifactError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `metadata.kernelspec.name`.
    pub fn kernel_name(&self) -> Result<&str, MetadataError> {
        self.metadata
            .get("kernelspec")
            .and_then(|spec| spec.get("name"))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or(MetadataError::MissingKernelSpec)
    }

    /// The first `error` output in cell order.
    pub fn first_error(&self) -> Option<ErrorDetail> {
        self.cells
            .iter()
            .filter_map(|cell| cell.outputs.as_ref())
            .flatten()
            .find(|output| output.get("output_type").and_then(Value::as_str) == Some("error"))
            .map(|output| {
                let field = |key: &str| {
                    output
                        .get(key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                let traceback: Vec<String> = output
                    .get("traceback")
                    .and_then(Value::as_array)
                    .map(|lines| {
                        lines
                            .iter()
                            .filter_map(|l| l.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                ErrorDetail::new(field("ename"), field("evalue")).with_traceback(traceback)
            })
    }

    /// Number of code cells that carry an execution count.
    pub fn executed_cells(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.is_code())
            .filter(|cell| matches!(cell.execution_count, Some(Value::Number(_))))
            .count()
    }
}

/// Mime types for the short output keys of nbformat v3.
const V3_MIME_KEYS: &[(&str, &str)] = &[
    ("text", "text/plain"),
    ("html", "text/html"),
    ("svg", "image/svg+xml"),
    ("png", "image/png"),
    ("jpeg", "image/jpeg"),
    ("latex", "text/latex"),
    ("json", "application/json"),
    ("javascript", "application/javascript"),
];

/// Rewrite a version 3 document (cells inside `worksheets`) as version 4.
fn upgrade_v3(mut document: Value) -> Value {
    if let Some(root) = document.as_object_mut() {
        upgrade_v3_root(root);
    }
    document
}

fn upgrade_v3_root(root: &mut Map<String, Value>) {
    let worksheets = root.remove("worksheets").unwrap_or(Value::Array(Vec::new()));
    let cells: Vec<Value> = worksheets
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|sheet| sheet.get("cells").and_then(Value::as_array))
        .flatten()
        .cloned()
        .map(upgrade_v3_cell)
        .collect();
    root.insert("cells".to_string(), Value::Array(cells));
    root.insert("nbformat".to_string(), 4.into());
    root.insert("nbformat_minor".to_string(), 0.into());
}

fn upgrade_v3_cell(mut cell: Value) -> Value {
    if let Some(fields) = cell.as_object_mut() {
        upgrade_v3_cell_fields(fields);
    }
    cell
}

fn upgrade_v3_cell_fields(fields: &mut Map<String, Value>) {
    fields.entry("metadata").or_insert_with(|| Value::Object(Map::new()));
    let cell_type = fields.get("cell_type").and_then(Value::as_str).map(str::to_string);
    match cell_type.as_deref() {
        Some("code") => {
            let source = fields.remove("input").unwrap_or(Value::String(String::new()));
            fields.insert("source".to_string(), source);
            let count = fields.remove("prompt_number").unwrap_or(Value::Null);
            fields.insert("execution_count".to_string(), count);
            fields.remove("language");
            if let Some(collapsed) = fields.remove("collapsed") {
                if let Some(metadata) = fields.get_mut("metadata").and_then(Value::as_object_mut) {
                    metadata.insert("collapsed".to_string(), collapsed);
                }
            }
            let outputs = fields
                .remove("outputs")
                .and_then(|outputs| outputs.as_array().cloned())
                .unwrap_or_default()
                .into_iter()
                .map(upgrade_v3_output)
                .collect();
            fields.insert("outputs".to_string(), Value::Array(outputs));
        }
        Some("heading") => {
            let level = fields.remove("level").and_then(|l| l.as_u64()).unwrap_or(1) as usize;
            let text = fields
                .get("source")
                .and_then(|source| Source::deserialize(source).ok())
                .map(|source| source.text())
                .unwrap_or_default();
            let heading = format!("{} {}", "#".repeat(level.clamp(1, 6)), text.replace('\n', " "));
            fields.insert("cell_type".to_string(), "markdown".into());
            fields.insert("source".to_string(), heading.into());
        }
        _ => {}
    }
}

fn upgrade_v3_output(mut output: Value) -> Value {
    if let Some(fields) = output.as_object_mut() {
        upgrade_v3_output_fields(fields);
    }
    output
}

fn upgrade_v3_output_fields(fields: &mut Map<String, Value>) {
    let output_type = fields.get("output_type").and_then(Value::as_str).map(str::to_string);
    match output_type.as_deref() {
        Some("pyerr") => {
            fields.insert("output_type".to_string(), "error".into());
        }
        Some("stream") => {
            if let Some(name) = fields.remove("stream") {
                fields.insert("name".to_string(), name);
            }
        }
        Some(kind @ ("pyout" | "display_data")) => {
            if kind == "pyout" {
                fields.insert("output_type".to_string(), "execute_result".into());
                let count = fields.remove("prompt_number").unwrap_or(Value::Null);
                fields.insert("execution_count".to_string(), count);
            }
            let mut data = Map::new();
            for (short, mime) in V3_MIME_KEYS {
                if let Some(value) = fields.remove(*short) {
                    data.insert((*mime).to_string(), value);
                }
            }
            fields.insert("data".to_string(), Value::Object(data));
            fields.entry("metadata").or_insert_with(|| Value::Object(Map::new()));
        }
        _ => {}
    }
}
