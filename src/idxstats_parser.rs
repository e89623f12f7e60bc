use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info};
use memchr::memchr_iter;

use crate::error::{HostCheckError, Result};

const BUFFER_SIZE: usize = 256 * 1024;
const TAB_CHAR: u8 = b'\t';
const NEWLINE_CHAR: u8 = b'\n';
const SENTINEL_CHAR: u8 = b'*';

/// Organism key used for contigs whose name carries no `_` prefix.
pub const UNKNOWN_ORGANISM: &str = "unknown";

/// One line of a `samtools idxstats` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigRecord {
    pub reference_name: String,
    pub organism_key: String,
    pub length: u64,
    pub mapped_count: u64,
    pub unmapped_count: u64,
}

impl ContigRecord {
    pub fn new(reference_name: &str, length: u64, mapped_count: u64, unmapped_count: u64) -> Self {
        Self {
            reference_name: reference_name.to_string(),
            organism_key: organism_key(reference_name).to_string(),
            length,
            mapped_count,
            unmapped_count,
        }
    }
}

/// Prefix of the reference name before its first underscore.
pub fn organism_key(reference_name: &str) -> &str {
    match reference_name.split_once('_') {
        Some((prefix, _)) => prefix,
        None => UNKNOWN_ORGANISM,
    }
}

fn malformed(line_number: usize, line: &[u8], reason: String) -> HostCheckError {
    HostCheckError::MalformedInput {
        line_number,
        line: String::from_utf8_lossy(line).into_owned(),
        reason,
    }
}

fn parse_count(field: &str, name: &str, line_number: usize, line: &[u8]) -> Result<u64> {
    field
        .trim()
        .parse::<u64>()
        .map_err(|_| malformed(line_number, line, format!("{} {:?} is not a non-negative integer", name, field)))
}

/// Parses one idxstats line. Returns `Ok(None)` for the `*` sentinel line and for
/// blank lines. `line_number` is 1-based and only used for error reporting.
pub fn parse_line(line: &[u8], line_number: usize) -> Result<Option<ContigRecord>> {
    if line.first() == Some(&SENTINEL_CHAR) {
        debug!("Skipping unplaced-reads line {}", line_number);
        return Ok(None);
    }

    let text = std::str::from_utf8(line)
        .map_err(|_| malformed(line_number, line, "line is not valid UTF-8".to_string()))?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let bytes = text.as_bytes();

    let tab_positions: Vec<usize> = memchr_iter(TAB_CHAR, bytes).take(4).collect();
    if tab_positions.len() < 3 {
        return Err(malformed(
            line_number,
            line,
            format!("expected 4 tab-separated fields, found {}", tab_positions.len() + 1),
        ));
    }

    let field_end = |i: usize| tab_positions.get(i).copied().unwrap_or(bytes.len());
    let reference_name = &text[..tab_positions[0]];
    let length = &text[tab_positions[0] + 1..tab_positions[1]];
    let mapped = &text[tab_positions[1] + 1..tab_positions[2]];
    let unmapped = &text[tab_positions[2] + 1..field_end(3)];

    if reference_name.is_empty() {
        return Err(malformed(line_number, line, "reference name is empty".to_string()));
    }

    Ok(Some(ContigRecord::new(
        reference_name,
        parse_count(length, "length", line_number, line)?,
        parse_count(mapped, "mapped count", line_number, line)?,
        parse_count(unmapped, "unmapped count", line_number, line)?,
    )))
}

/// Parses every retained line of an idxstats stream, in input order.
pub fn parse_idxstats_reader<R: BufRead>(mut reader: R) -> Result<Vec<ContigRecord>> {
    let mut records = Vec::new();
    let mut line_buffer = Vec::with_capacity(256);
    let mut line_number = 0;

    loop {
        line_buffer.clear();
        if reader.read_until(NEWLINE_CHAR, &mut line_buffer)? == 0 {
            break;
        }
        line_number += 1;
        if let Some(record) = parse_line(&line_buffer, line_number)? {
            records.push(record);
        }
    }

    Ok(records)
}

/// Reads an idxstats file from disk.
pub fn parse_idxstats<P: AsRef<Path>>(path: P) -> Result<Vec<ContigRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| HostCheckError::MissingFile {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_idxstats_reader(BufReader::with_capacity(BUFFER_SIZE, file))?;
    info!("Parsed {} contig records from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_line() {
        let record = parse_line(b"dsim_2L\t23513712\t900\t10\n", 1)
            .unwrap()
            .unwrap();
        assert_eq!(record.reference_name, "dsim_2L");
        assert_eq!(record.organism_key, "dsim");
        assert_eq!(record.length, 23513712);
        assert_eq!(record.mapped_count, 900);
        assert_eq!(record.unmapped_count, 10);
    }

    #[test]
    fn test_organism_key() {
        assert_eq!(organism_key("wMel_chr"), "wMel");
        assert_eq!(organism_key("dmel_2L_random"), "dmel");
        assert_eq!(organism_key("chrM"), UNKNOWN_ORGANISM);
        assert_eq!(organism_key("_odd"), "");
    }

    #[test]
    fn test_sentinel_and_blank_lines_are_skipped() {
        assert_eq!(parse_line(b"*\t0\t0\t500\n", 3).unwrap(), None);
        assert_eq!(parse_line(b"*\tNA\t\t", 3).unwrap(), None);
        assert_eq!(parse_line(b"\n", 4).unwrap(), None);
    }

    #[test]
    fn test_crlf_line_endings() {
        let record = parse_line(b"wMel_1\t500\t50\t5\r\n", 1).unwrap().unwrap();
        assert_eq!(record.unmapped_count, 5);
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let err = parse_line(b"dsim_1\t1000\t900\n", 12).unwrap_err();
        match err {
            HostCheckError::MalformedInput { line_number, line, .. } => {
                assert_eq!(line_number, 12);
                assert!(line.starts_with("dsim_1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_field_is_malformed() {
        assert!(matches!(
            parse_line(b"dsim_1\tlong\t900\t10", 2),
            Err(HostCheckError::MalformedInput { line_number: 2, .. })
        ));
        assert!(matches!(
            parse_line(b"dsim_1\t1000\t-5\t10", 2),
            Err(HostCheckError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_parse_reader_keeps_file_order() {
        let input = "wMel_1\t500\t50\t5\ndsim_1\t1000\t900\t10\n*\t0\t0\t500\n";
        let records = parse_idxstats_reader(Cursor::new(input)).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.reference_name.as_str()).collect();
        assert_eq!(names, vec!["wMel_1", "dsim_1"]);
    }

    #[test]
    fn test_malformed_line_number_counts_sentinel() {
        let input = "*\t0\t0\t1\ndsim_1\t1000\t900\t10\nbroken\n";
        let err = parse_idxstats_reader(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, HostCheckError::MalformedInput { line_number: 3, .. }));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            parse_idxstats("/no/such/idxstats.txt"),
            Err(HostCheckError::MissingFile { .. })
        ));
    }
}
