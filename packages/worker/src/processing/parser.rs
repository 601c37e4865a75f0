//! Payload decoding: bytes + declared content type -> row records.
//!
//! Rows are ordered maps from field name to raw JSON value. CSV cells decode
//! as strings, JSON rows keep their scalar types. Every failure here is
//! non-retryable: the same bytes would fail the same way on every attempt.

use serde_json::Value;
use thiserror::Error;

/// One decoded record: field name -> raw value, in source order.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Dataset is not valid UTF-8.")]
    NotUtf8,

    #[error("CSV file must include a header row.")]
    MissingCsvHeader,

    #[error("Malformed CSV: {0}")]
    MalformedCsv(String),

    #[error("Invalid JSON payload.")]
    InvalidJson,

    #[error("JSON dataset must be a list of objects.")]
    JsonNotArray,

    #[error("JSON item at index {0} is not an object.")]
    JsonItemNotObject(usize),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Dataset exceeds the limit of {0} rows.")]
    TooManyRows(usize),
}

/// Decode a payload into rows, capped at `max_rows`.
pub fn parse_rows(
    content_type: &str,
    payload: &[u8],
    max_rows: usize,
) -> Result<Vec<Row>, ParseError> {
    let text = std::str::from_utf8(payload).map_err(|_| ParseError::NotUtf8)?;
    // Optional byte-order mark.
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    match content_type {
        "text/csv" => parse_csv_rows(text, max_rows),
        "application/json" => parse_json_rows(text, max_rows),
        other => Err(ParseError::UnsupportedContentType(other.to_string())),
    }
}

/// First non-empty record is the header; short rows are null-padded, extra
/// columns are preserved under synthesized `extra_{column_index}` keys.
fn parse_csv_rows(text: &str, max_rows: usize) -> Result<Vec<Row>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| ParseError::MalformedCsv(e.to_string()))?;

        let Some(fields) = &header else {
            header = Some(record.iter().map(str::to_string).collect());
            continue;
        };

        if rows.len() >= max_rows {
            return Err(ParseError::TooManyRows(max_rows));
        }

        let mut row = Row::new();
        for (idx, field) in fields.iter().enumerate() {
            let value = match record.get(idx) {
                Some(cell) => Value::String(cell.to_string()),
                None => Value::Null,
            };
            row.insert(field.clone(), value);
        }
        for idx in fields.len()..record.len() {
            row.insert(
                format!("extra_{idx}"),
                Value::String(record[idx].to_string()),
            );
        }
        rows.push(row);
    }

    if header.is_none() {
        return Err(ParseError::MissingCsvHeader);
    }
    Ok(rows)
}

/// The top-level value must be an array of objects.
fn parse_json_rows(text: &str, max_rows: usize) -> Result<Vec<Row>, ParseError> {
    let payload: Value = serde_json::from_str(text).map_err(|_| ParseError::InvalidJson)?;

    let Value::Array(items) = payload else {
        return Err(ParseError::JsonNotArray);
    };

    if items.len() > max_rows {
        return Err(ParseError::TooManyRows(max_rows));
    }

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(ParseError::JsonItemNotObject(idx)),
        })
        .collect()
}
