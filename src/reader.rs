//! Tabular source decoding.
//!
//! Historical exports arrive either as UTF-8 (often with a BOM) or as CP949
//! from Korean spreadsheet tools. Records are kept semi-structured here; only
//! the normalizer turns them into typed rows.

use std::collections::BTreeMap;

use csv::ReaderBuilder;
use tracing::{debug, warn};

use crate::error::Result;

/// One source row: column name to raw cell text.
pub type RawRecord = BTreeMap<String, String>;

/// A source file as read, with headers in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}

/// Decodes bytes as UTF-8 (stripping a BOM), falling back to CP949.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            warn!("Source is not valid UTF-8, decoding as CP949");
            let (text, _, had_errors) = encoding_rs::EUC_KR.decode(bytes);
            if had_errors {
                warn!("CP949 decoding replaced malformed sequences");
            }
            text.into_owned()
        }
    }
}

/// Parses CSV bytes into a [`RawTable`].
///
/// Short rows are tolerated; their trailing columns are simply absent from
/// the record.
pub fn parse_table(bytes: &[u8]) -> Result<RawTable> {
    let text = decode_text(bytes);
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut records = Vec::new();

    for result in rdr.records() {
        let row = result?;
        let record: RawRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        records.push(record);
    }

    debug!(columns = headers.len(), rows = records.len(), "Table parsed");
    Ok(RawTable { headers, records })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_utf8_with_bom() {
        let bytes = "\u{feff}일자,지역,환자수\n2023-08-01,서울,3\n".as_bytes();
        let table = parse_table(bytes).unwrap();
        assert_eq!(table.headers, vec!["일자", "지역", "환자수"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0]["지역"], "서울");
    }

    #[test]
    fn test_parse_cp949() {
        let (encoded, _, _) = encoding_rs::EUC_KR.encode("지역,환자수\n부산,7\n");
        assert!(std::str::from_utf8(&encoded).is_err());

        let table = parse_table(&encoded).unwrap();
        assert!(table.has_column("지역"));
        assert_eq!(table.records[0]["환자수"], "7");
    }

    #[test]
    fn test_short_rows_tolerated() {
        let table = parse_table(b"a,b,c\n1,2\n4,5,6\n").unwrap();
        assert_eq!(table.len(), 2);
        assert!(!table.records[0].contains_key("c"));
        assert_eq!(table.records[1]["c"], "6");
    }

    #[test]
    fn test_empty_table() {
        let table = parse_table(b"a,b\n").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.headers.len(), 2);
    }
}
