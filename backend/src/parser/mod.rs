//! CSV to [`Sheet`] parser with encoding and delimiter auto-detection.
//!
//! Produces the `{headers, rows}` shape the rest of the engine consumes.
//! Nothing contact-specific happens here.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{CsvError, CsvResult, InputShapeError};
use crate::models::Sheet;

/// Candidate delimiters, in tie-break order.
const SEPARATORS: [char; 4] = [';', ',', '\t', '|'];

/// Name given to a blank header cell.
const EMPTY_HEADER: &str = "__EMPTY";

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Header row and data rows
    pub sheet: Sheet,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

impl ParseResult {
    /// Require a header row plus at least one data row.
    pub fn require_rows(&self) -> Result<(), InputShapeError> {
        check_shape(&self.sheet)
    }
}

/// Header row plus at least one data row, with at least one non-blank header.
pub fn check_shape(sheet: &Sheet) -> Result<(), InputShapeError> {
    if sheet.headers.iter().all(|h| h.is_empty() || h.starts_with(EMPTY_HEADER)) {
        return Err(InputShapeError::NoHeaders);
    }
    if sheet.rows.is_empty() {
        return Err(InputShapeError::TooFewRows { found: 0 });
    }
    Ok(())
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let text = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // UTF-8, ASCII and anything unrecognised: lossy UTF-8
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &SEPARATORS {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text with an explicit delimiter.
///
/// Each data row becomes a JSON object keyed by header, in header order.
///
/// # Example
/// ```ignore
/// use reconcile::parser::parse_str;
///
/// let sheet = parse_str("First Name,Email\nAda,ada@example.com", ',').unwrap();
/// assert_eq!(sheet.headers, vec!["First Name", "Email"]);
/// assert_eq!(sheet.rows[0]["Email"], "ada@example.com");
/// ```
pub fn parse_str(content: &str, delimiter: char) -> CsvResult<Sheet> {
    let delimiter = u8::try_from(delimiter).map_err(|_| CsvError::ParseError {
        line: 0,
        message: format!("delimiter '{}' is not a single byte", delimiter),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let header_record = match records.next() {
        Some(record) => record.map_err(to_parse_error)?,
        None => return Err(CsvError::EmptyFile),
    };

    if header_record.is_empty() {
        return Err(CsvError::NoHeaders);
    }

    let headers = dedupe_headers(header_record.iter());

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(to_parse_error)?;

        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        let mut row = Map::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = record.get(i).unwrap_or("");
            row.insert(header.clone(), Value::String(cell.to_string()));
        }
        rows.push(row);
    }

    Ok(Sheet { headers, rows })
}

/// Parse CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    let sheet = parse_str(&content, delimiter)?;

    Ok(ParseResult {
        sheet,
        encoding,
        delimiter,
    })
}

/// Give blank and repeated headers distinct names (`Email`, `Email_1`, ...).
fn dedupe_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut headers = Vec::new();

    for header in raw {
        let base = if header.is_empty() { EMPTY_HEADER } else { header };
        let mut candidate = base.to_string();
        let mut n = 1;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        headers.push(candidate);
    }

    headers
}

fn to_parse_error(e: csv::Error) -> CsvError {
    let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
    CsvError::ParseError {
        line,
        message: e.to_string(),
    }
}
