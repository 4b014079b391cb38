//! Line tokenization and raw text helpers for import files.
//!
//! - [`split_line`] tokenizes one record with RFC 4180 quoting rules
//! - [`remove_quotes`], [`strip_delimiters`], [`split_multivalue`] shape raw cells
//! - [`detect_encoding`], [`decode_content`] turn uploaded bytes into text

use crate::error::TokenizeError;

/// Split one record into its columns.
///
/// Quoted fields may contain the separator and doubled quotes. An empty line
/// yields no columns. Only `\n` ends a record, so a bare `\r` stays in its
/// field; text holding a second record or an unclosed quote is rejected.
pub fn split_line(line: &str, separator: u8) -> Result<Vec<String>, TokenizeError> {
    if has_unterminated_quote(line, separator) {
        return Err(TokenizeError::UnterminatedQuote);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(separator)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Ok(Vec::new());
    }
    let columns = record.iter().map(str::to_string).collect();

    if reader.read_record(&mut record)? {
        return Err(TokenizeError::TrailingRecord);
    }
    Ok(columns)
}

/// Whether a field opens a quote that the line never closes.
///
/// Quotes only open a field when they are its first character; `""` inside a
/// quoted field is an escaped quote.
fn has_unterminated_quote(line: &str, separator: u8) -> bool {
    let mut bytes = line.bytes().peekable();
    let mut at_field_start = true;
    let mut in_quotes = false;

    while let Some(b) = bytes.next() {
        if in_quotes {
            if b == b'"' {
                if bytes.peek() == Some(&b'"') {
                    bytes.next();
                } else {
                    in_quotes = false;
                }
            }
        } else if b == separator {
            at_field_start = true;
        } else {
            if at_field_start && b == b'"' {
                in_quotes = true;
            }
            at_field_start = false;
        }
    }
    in_quotes
}

/// Remove one layer of surrounding double quotes.
pub fn remove_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Remove every occurrence of both delimiter characters.
///
/// `[a;b]` with `('[', ']')` becomes `a;b`. Occurrences inside the text are
/// removed too, not just the wrapping pair.
pub fn strip_delimiters(value: &str, (open, close): (char, char)) -> String {
    value.chars().filter(|c| *c != open && *c != close).collect()
}

/// Split a multivalued cell on a literal separator.
///
/// Trailing empty items are dropped; an empty cell still yields one empty item.
/// Items are not trimmed.
pub fn split_multivalue(value: &str, separator: &str) -> Vec<String> {
    if value.is_empty() || separator.is_empty() {
        return vec![value.to_string()];
    }

    let mut items: Vec<String> = value.split(separator).map(str::to_string).collect();
    while items.last().is_some_and(|item| item.is_empty()) {
        items.pop();
    }
    items
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding.
///
/// Unknown encodings and invalid UTF-8 fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Strip a UTF-8 byte order mark so it does not end up in the first column.
pub fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_line() {
        assert_eq!(split_line("Jane,Doe", b',').unwrap(), vec!["Jane", "Doe"]);
        assert_eq!(split_line("a;b;c", b';').unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_quoted_separator_and_escaped_quotes() {
        let cols = split_line(r#""Doe, Jane","say ""hi""",x"#, b',').unwrap();
        assert_eq!(cols, vec!["Doe, Jane", r#"say "hi""#, "x"]);
    }

    #[test]
    fn test_empty_line_has_no_columns() {
        assert!(split_line("", b',').unwrap().is_empty());
    }

    #[test]
    fn test_missing_values_are_kept() {
        assert_eq!(split_line("1,,3,", b',').unwrap(), vec!["1", "", "3", ""]);
    }

    #[test]
    fn test_whitespace_is_not_trimmed_by_tokenizer() {
        assert_eq!(split_line(" a , b ", b',').unwrap(), vec![" a ", " b "]);
    }

    #[test]
    fn test_bare_carriage_return_stays_in_field() {
        assert_eq!(
            split_line("Jane,Do\re,Paris", b',').unwrap(),
            vec!["Jane", "Do\re", "Paris"]
        );
    }

    #[test]
    fn test_second_record_is_rejected() {
        assert!(matches!(
            split_line("Jane,Doe\nJohn,Smith", b','),
            Err(TokenizeError::TrailingRecord)
        ));
        // A trailing terminator alone is not a second record
        assert_eq!(split_line("Jane,Doe\n", b',').unwrap(), vec!["Jane", "Doe"]);
    }

    #[test]
    fn test_unterminated_quote_is_rejected() {
        assert!(matches!(
            split_line("\"Jane,Doe", b','),
            Err(TokenizeError::UnterminatedQuote)
        ));
        assert!(matches!(
            split_line(r#"Jane,"Doe ""Jr"#, b','),
            Err(TokenizeError::UnterminatedQuote)
        ));
        // Quotes inside an unquoted field are literal
        assert_eq!(split_line(r#"Ja"ne,Doe"#, b',').unwrap(), vec![r#"Ja"ne"#, "Doe"]);
        assert_eq!(split_line(r#""a""b",c"#, b',').unwrap(), vec![r#"a"b"#, "c"]);
    }

    #[test]
    fn test_remove_quotes() {
        assert_eq!(remove_quotes(r#""Jane""#), "Jane");
        assert_eq!(remove_quotes(r#"""Jane"""#), r#""Jane""#);
        assert_eq!(remove_quotes(r#""Jane"#), r#""Jane"#);
        assert_eq!(remove_quotes(r#"""#), r#"""#);
        assert_eq!(remove_quotes("Jane"), "Jane");
    }

    #[test]
    fn test_strip_delimiters_removes_all_occurrences() {
        assert_eq!(strip_delimiters("[a;b;c]", ('[', ']')), "a;b;c");
        assert_eq!(strip_delimiters("[a[x];b]", ('[', ']')), "ax;b");
    }

    #[test]
    fn test_split_multivalue() {
        assert_eq!(split_multivalue("a;b;c", ";"), vec!["a", "b", "c"]);
        assert_eq!(split_multivalue("a; b", ";"), vec!["a", " b"]);
        assert_eq!(split_multivalue("a;;b;;", ";"), vec!["a", "", "b"]);
        assert_eq!(split_multivalue("", ";"), vec![""]);
        assert!(split_multivalue(";;", ";").is_empty());
    }

    #[test]
    fn test_split_multivalue_is_literal() {
        assert_eq!(split_multivalue("a.b|c", "."), vec!["a", "b|c"]);
        assert_eq!(split_multivalue("a|b|c", "|"), vec!["a", "b", "c"]);
        assert_eq!(split_multivalue("a::b", "::"), vec!["a", "b"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom("\u{feff}a,b"), "a,b");
        assert_eq!(strip_bom("a,b"), "a,b");
    }
}
