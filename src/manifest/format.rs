// Delimited-text record format shared by manifests and diff reports
//
// Records are comma separated with no header. A field containing the
// delimiter, a double quote or a line break is wrapped in double quotes with
// embedded quotes doubled.

use std::borrow::Cow;

pub const DELIMITER: char = ',';

#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

/// Quote a field if it needs it
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains(&[DELIMITER, '"', '\n', '\r'][..]) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Join fields into one record, without the line terminator
pub fn join_record<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|field| escape_field(field.as_ref()))
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string())
}

/// Split one record into fields, honouring double quotes.
/// An unterminated quote runs to the end of the record.
pub fn split_record(record: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = record.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            c if c == DELIMITER && !in_quotes => fields.push(std::mem::take(&mut field)),
            c => field.push(c),
        }
    }
    fields.push(field);
    fields
}
