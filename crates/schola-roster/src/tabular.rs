//! CSV roster parsing.
//!
//! Accepts the files administrators actually export: UTF-8 with or
//! without a byte order mark, headers in any of the common spellings
//! (`First Name`, `given_name`, `e-mail`, ...), extra columns ignored.
//! Anything that is not valid UTF-8 is rejected up front; a file with
//! headers but no data rows is rejected as an empty import.

use csv::{ReaderBuilder, Trim};
use schola_core::error::{ScholaError, ScholaResult};

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// One parsed data row. `line` is the 1-based data row index used in
/// error reports; blank fields stay as empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub line: usize,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_number: String,
    pub class_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    FirstName,
    LastName,
    Email,
    StudentNumber,
    ClassId,
}

/// Map a header cell to a known column. Comparison ignores case and
/// every non-alphanumeric character, so `First Name`, `first_name`,
/// and `FIRSTNAME` are the same header.
fn recognize_header(header: &str) -> Option<Column> {
    let normalized: String = header
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    match normalized.as_str() {
        "firstname" | "givenname" | "first" => Some(Column::FirstName),
        "lastname" | "surname" | "familyname" | "last" => Some(Column::LastName),
        "email" | "emailaddress" | "mail" => Some(Column::Email),
        "studentid" | "studentnumber" | "studentno" => Some(Column::StudentNumber),
        "classid" | "class" => Some(Column::ClassId),
        _ => None,
    }
}

fn decode_utf8(bytes: &[u8]) -> ScholaResult<&str> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    std::str::from_utf8(bytes).map_err(|e| ScholaError::Encoding {
        message: format!("roster file is not valid UTF-8: {e}"),
    })
}

/// Parse a roster file into rows.
///
/// The file must contain recognizable first and last name columns and
/// at least one data row.
pub fn parse_roster(bytes: &[u8]) -> ScholaResult<Vec<RosterRow>> {
    let text = decode_utf8(bytes)?;
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ScholaError::Encoding {
            message: format!("unreadable header row: {e}"),
        })?
        .clone();
    let columns: Vec<Option<Column>> = headers.iter().map(recognize_header).collect();

    if !columns.contains(&Some(Column::FirstName)) || !columns.contains(&Some(Column::LastName)) {
        return Err(ScholaError::Validation {
            message: "roster file has no recognizable name columns".into(),
        });
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ScholaError::Encoding {
            message: format!("unreadable row {}: {e}", index + 1),
        })?;

        let mut row = RosterRow {
            line: index + 1,
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            student_number: String::new(),
            class_id: String::new(),
        };
        for (column, value) in columns.iter().zip(record.iter()) {
            let slot = match column {
                Some(Column::FirstName) => &mut row.first_name,
                Some(Column::LastName) => &mut row.last_name,
                Some(Column::Email) => &mut row.email,
                Some(Column::StudentNumber) => &mut row.student_number,
                Some(Column::ClassId) => &mut row.class_id,
                None => continue,
            };
            *slot = value.to_string();
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(ScholaError::EmptyImport);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_headers() {
        let data = b"first_name,last_name,email\nAlice,Smith,alice@example.com\n";
        let rows = parse_roster(data).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].first_name, "Alice");
        assert_eq!(rows[0].last_name, "Smith");
        assert_eq!(rows[0].email, "alice@example.com");
        assert_eq!(rows[0].line, 1);
    }

    #[test]
    fn recognizes_header_aliases() {
        let data = b"Given Name,Surname,E-Mail,Student No,Class\nBob,Jones,bob@x.org,2026-004,c1\n";
        let rows = parse_roster(data).unwrap();
        assert_eq!(rows[0].first_name, "Bob");
        assert_eq!(rows[0].last_name, "Jones");
        assert_eq!(rows[0].email, "bob@x.org");
        assert_eq!(rows[0].student_number, "2026-004");
        assert_eq!(rows[0].class_id, "c1");
    }

    #[test]
    fn strips_utf8_bom() {
        let data = b"\xef\xbb\xbffirst,last\nAda,Lovelace\n";
        let rows = parse_roster(data).unwrap();
        assert_eq!(rows[0].first_name, "Ada");
    }

    #[test]
    fn ignores_unknown_columns_and_short_rows() {
        let data = b"first,last,homeroom,email\nEve,Adams,7B\n";
        let rows = parse_roster(data).unwrap();
        assert_eq!(rows[0].first_name, "Eve");
        assert_eq!(rows[0].email, "");
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = parse_roster(b"first,last\n\xff\xfe,x\n").unwrap_err();
        assert!(matches!(err, ScholaError::Encoding { .. }));
    }

    #[test]
    fn rejects_header_only_files() {
        let err = parse_roster(b"first,last,email\n").unwrap_err();
        assert!(matches!(err, ScholaError::EmptyImport));
    }

    #[test]
    fn rejects_files_without_name_columns() {
        let err = parse_roster(b"email,phone\na@b.c,555\n").unwrap_err();
        assert!(matches!(err, ScholaError::Validation { .. }));
    }
}
