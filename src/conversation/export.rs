//! Chat history as CSV
//!
//! Two columns, `role` and `content`, one row per turn. Fields containing a
//! comma, quote or line break are quoted with doubled inner quotes, so
//! multi-line replies survive a round trip.

use thiserror::Error;

pub const HISTORY_FILENAME: &str = "chat_history.csv";
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

const HEADER: [&str; 2] = ["role", "content"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CsvError {
    #[error("CSV is empty, expected a role,content header")]
    MissingHeader,
    #[error("Unexpected CSV header: {0}")]
    UnexpectedHeader(String),
    #[error("Record {record} has {count} fields, expected 2")]
    WrongFieldCount { record: usize, count: usize },
    #[error("Unterminated quoted field")]
    UnterminatedQuote,
}

/// Encode `(role, content)` rows, header first
pub fn encode_csv<'a, 'b>(rows: impl IntoIterator<Item = (&'a str, &'b str)>) -> String {
    let mut out = String::new();
    push_record(&mut out, HEADER[0], HEADER[1]);
    for (role, content) in rows {
        push_record(&mut out, role, content);
    }
    out
}

fn push_record(out: &mut String, role: &str, content: &str) {
    push_field(out, role);
    out.push(',');
    push_field(out, content);
    out.push('\n');
}

fn push_field(out: &mut String, raw: &str) {
    if raw.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&raw.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(raw);
    }
}

/// Decode a document produced by [`encode_csv`] back into rows
pub fn decode_csv(text: &str) -> Result<Vec<(String, String)>, CsvError> {
    let mut records = split_records(text)?.into_iter();

    let header = records.next().ok_or(CsvError::MissingHeader)?;
    if header != HEADER {
        return Err(CsvError::UnexpectedHeader(header.join(",")));
    }

    records
        .enumerate()
        .map(|(idx, fields)| {
            let count = fields.len();
            let mut fields = fields.into_iter();
            match (fields.next(), fields.next(), fields.next()) {
                (Some(role), Some(content), None) => Ok((role, content)),
                _ => Err(CsvError::WrongFieldCount {
                    record: idx + 1,
                    count,
                }),
            }
        })
        .collect()
}

fn split_records(text: &str) -> Result<Vec<Vec<String>>, CsvError> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut current)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(std::mem::take(&mut current));
                end_record(&mut records, std::mem::take(&mut fields));
            }
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(CsvError::UnterminatedQuote);
    }
    if !current.is_empty() || !fields.is_empty() {
        fields.push(current);
        end_record(&mut records, fields);
    }

    Ok(records)
}

/// Blank lines carry no record
fn end_record(records: &mut Vec<Vec<String>>, fields: Vec<String>) {
    if fields.len() == 1 && fields[0].is_empty() {
        return;
    }
    records.push(fields);
}
