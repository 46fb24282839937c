//! Minimal CSV reading and writing.
//!
//! The first row is the header. Fields may be quoted with `"`, with `""` as
//! an escaped quote; quoted fields may span lines.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::TaskError;

/// Parse CSV text into one JSON object per data row, fields in header order.
pub fn parse_records(input: &str) -> Result<Vec<Value>, TaskError> {
    let mut rows = split_rows(input)?.into_iter();

    let (_, header) = rows
        .next()
        .ok_or_else(|| TaskError::MalformedRecord("missing header row".to_string()))?;
    if header.iter().any(|h| h.is_empty()) {
        return Err(TaskError::MalformedRecord(
            "header row has an empty column name".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = header.iter().find(|h| !seen.insert(h.as_str())) {
        return Err(TaskError::MalformedRecord(format!(
            "duplicate column name '{}'",
            dup
        )));
    }

    let mut records = Vec::new();
    for (line, row) in rows {
        if row.len() != header.len() {
            return Err(TaskError::MalformedRecord(format!(
                "line {} has {} fields, expected {}",
                line,
                row.len(),
                header.len()
            )));
        }
        let record: Map<String, Value> = header
            .iter()
            .cloned()
            .zip(row.into_iter().map(Value::String))
            .collect();
        records.push(Value::Object(record));
    }

    Ok(records)
}

/// Render JSON objects as CSV. Columns are the union of record keys, in
/// first-seen order.
pub fn render_records(records: &[Value]) -> Result<String, TaskError> {
    let mut columns: Vec<&str> = Vec::new();
    for (index, record) in records.iter().enumerate() {
        let obj = record.as_object().ok_or_else(|| {
            TaskError::MalformedRecord(format!("record {} is not an object", index))
        })?;
        for key in obj.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let mut out = String::new();
    if columns.is_empty() {
        return Ok(out);
    }

    push_row(&mut out, columns.iter().map(|c| c.to_string()));
    for record in records {
        push_row(
            &mut out,
            columns.iter().map(|c| match record.get(c) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            }),
        );
    }

    Ok(out)
}

fn push_row(out: &mut String, fields: impl Iterator<Item = String>) {
    let fields: Vec<String> = fields.map(|f| escape(&f)).collect();
    out.push_str(&fields.join(","));
    out.push('\n');
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Rows paired with the line each one starts on.
fn split_rows(input: &str) -> Result<Vec<(usize, Vec<String>)>, TaskError> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut row_line = 1;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                finish_row(&mut rows, row_line, std::mem::take(&mut row));
                line += 1;
                row_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(TaskError::MalformedRecord(format!(
            "unterminated quoted field starting on line {}",
            row_line
        )));
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        finish_row(&mut rows, row_line, row);
    }

    Ok(rows)
}

/// Blank lines are skipped.
fn finish_row(rows: &mut Vec<(usize, Vec<String>)>, line: usize, row: Vec<String>) {
    if !(row.len() == 1 && row[0].is_empty()) {
        rows.push((line, row));
    }
}
