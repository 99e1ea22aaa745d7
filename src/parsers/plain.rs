use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use tracing::debug;

use crate::parsers::{
    first_value, open_file, ParseError, ParsedVariants, VariantReader, GENE_KEY, STAR_KEY,
};

const ID_COLUMN: usize = 2;
const INFO_COLUMN: usize = 7;

/// Line-oriented VCF reader that needs no format library
pub struct PlainTextReader;

impl PlainTextReader {
    pub fn new() -> Self {
        Self
    }

    fn parse_variant_line(&self, line: &str, record: usize, data: &mut ParsedVariants) {
        let parts: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
        if parts.len() <= INFO_COLUMN {
            debug!("Skipping record {}: only {} columns", record, parts.len());
            return;
        }

        let info_map = self.parse_info_field(parts[INFO_COLUMN]);
        let gene = info_map.get(GENE_KEY).map(|v| first_value(v));
        let star = info_map.get(STAR_KEY).map(|v| first_value(v));

        data.observe(Some(parts[ID_COLUMN]), gene, star);
    }

    fn parse_info_field<'a>(&self, info_str: &'a str) -> HashMap<&'a str, &'a str> {
        let mut info_map = HashMap::new();
        if info_str == "." {
            return info_map;
        }

        // Flags carry no value and never match GENE or STAR.
        for entry in info_str.split(';') {
            if let Some((key, value)) = entry.split_once('=') {
                info_map.insert(key, value);
            }
        }

        info_map
    }
}

impl Default for PlainTextReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VariantReader for PlainTextReader {
    fn name(&self) -> &'static str {
        "plain-text"
    }

    fn read(&self, path: &Path, data: &mut ParsedVariants) -> Result<(), ParseError> {
        let mut reader = open_file(path)?;
        let mut record = 0;

        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).map_err(|e| ParseError::Read {
                path: path.to_path_buf(),
                record,
                message: e.to_string(),
            })?;
            if read == 0 {
                break;
            }
            if buf.starts_with(b"#") || buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            record += 1;
            match std::str::from_utf8(&buf) {
                Ok(line) => self.parse_variant_line(line, record, data),
                Err(e) => debug!("Skipping record {}: {}", record, e),
            }
        }

        Ok(())
    }
}
