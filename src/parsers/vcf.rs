//! Structured VCF reading using noodles-vcf

use std::io;
use std::path::Path;

use noodles_vcf as nvcf;
use nvcf::variant::record::Ids;
use nvcf::variant::record_buf::info::field::Value;
use tracing::debug;

use crate::parsers::{
    first_value, open_file, ParseError, ParsedVariants, VariantReader, GENE_KEY, STAR_KEY,
};

/// VCF reader backed by the noodles record parser
pub struct StructuredVcfReader;

impl StructuredVcfReader {
    pub fn new() -> Self {
        Self
    }

    fn observe_record(&self, record: &nvcf::variant::RecordBuf, data: &mut ParsedVariants) {
        let id = {
            let ids = record.ids();
            if ids.is_empty() {
                None
            } else {
                Some(
                    ids.iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(";"),
                )
            }
        };

        let gene = info_text(record, GENE_KEY);
        let star = info_text(record, STAR_KEY);

        data.observe(id.as_deref(), gene.as_deref(), star.as_deref());
    }
}

impl Default for StructuredVcfReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VariantReader for StructuredVcfReader {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn read(&self, path: &Path, data: &mut ParsedVariants) -> Result<(), ParseError> {
        let mut inner = nvcf::io::Reader::new(open_file(path)?);
        let header = inner.read_header().map_err(|e| ParseError::Header {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut record = nvcf::variant::RecordBuf::default();
        let mut count = 0;

        loop {
            match inner.read_record_buf(&header, &mut record) {
                Ok(0) => break,
                Ok(_) => {
                    count += 1;
                    self.observe_record(&record, data);
                }
                // The offending line has been consumed; move on to the next one.
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    count += 1;
                    debug!("Skipping malformed record {}: {}", count, e);
                }
                Err(e) => {
                    return Err(ParseError::Read {
                        path: path.to_path_buf(),
                        record: count,
                        message: e.to_string(),
                    })
                }
            }
        }

        Ok(())
    }
}

/// Text of an INFO field, reduced to its first element when multi-valued
fn info_text(record: &nvcf::variant::RecordBuf, key: &str) -> Option<String> {
    match record.info().as_ref().get(key) {
        Some(Some(value)) => first_info_value(value),
        _ => None,
    }
}

fn first_info_value(value: &Value) -> Option<String> {
    use nvcf::variant::record_buf::info::field::value::Array;

    match value {
        Value::String(s) => Some(first_value(s).to_string()),
        Value::Integer(v) => Some(v.to_string()),
        Value::Float(v) => Some(v.to_string()),
        Value::Character(v) => Some(v.to_string()),
        Value::Flag => None,
        Value::Array(arr) => match arr {
            Array::String(vals) => vals
                .iter()
                .flatten()
                .next()
                .map(|v| first_value(v).to_string()),
            Array::Integer(vals) => vals.iter().flatten().next().map(|v| v.to_string()),
            Array::Float(vals) => vals.iter().flatten().next().map(|v| v.to_string()),
            Array::Character(vals) => vals.iter().flatten().next().map(|v| v.to_string()),
        },
    }
}
