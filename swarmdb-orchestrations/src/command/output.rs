//! Parsing command stdout against its declared contract

use serde_json::Value;

use super::builder::{BuiltCommand, OutputFormat};
use crate::error::{OrchestrationError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Text(String),
    Object(Value),
    Array(Vec<Value>),
}

impl CommandOutput {
    pub fn into_text(self) -> String {
        match self {
            CommandOutput::Text(text) => text,
            CommandOutput::Object(value) => value.to_string(),
            CommandOutput::Array(values) => Value::Array(values).to_string(),
        }
    }

    pub fn into_object(self) -> Value {
        match self {
            CommandOutput::Object(value) => value,
            CommandOutput::Array(mut values) if values.len() == 1 => values.remove(0),
            CommandOutput::Array(values) => Value::Array(values),
            CommandOutput::Text(text) => Value::String(text),
        }
    }

    pub fn into_array(self) -> Vec<Value> {
        match self {
            CommandOutput::Array(values) => values,
            CommandOutput::Object(value) => vec![value],
            CommandOutput::Text(_) => Vec::new(),
        }
    }
}

pub fn parse_output(command: &BuiltCommand, stdout: &str) -> Result<CommandOutput> {
    match command.output {
        OutputFormat::Raw => Ok(CommandOutput::Text(stdout.to_string())),
        OutputFormat::JsonObject => parse_object(stdout)
            .map(CommandOutput::Object)
            .map_err(|message| OrchestrationError::output_parse(command, message)),
        OutputFormat::JsonArray => parse_array(stdout)
            .map(CommandOutput::Array)
            .map_err(|message| OrchestrationError::output_parse(command, message)),
    }
}

/// Accepts a single object, or an inspect-style array holding exactly one
fn parse_object(stdout: &str) -> std::result::Result<Value, String> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err("expected a JSON object, got empty output".to_string());
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Array(mut items) if items.len() == 1 && items[0].is_object() => Ok(items.remove(0)),
        Value::Array(items) => Err(format!("expected a single JSON object, got an array of {}", items.len())),
        other => Err(format!("expected a JSON object, got {}", kind(&other))),
    }
}

/// Accepts a JSON array or newline-delimited JSON documents
fn parse_array(stdout: &str) -> std::result::Result<Vec<Value>, String> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<Value>>(trimmed).map_err(|e| e.to_string());
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            serde_json::from_str::<Value>(line).map_err(|e| format!("line {}: {}", index + 1, e))
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
