//! Variant extraction from VCF-style sources.
//!
//! Two readers implement [`VariantReader`]: a structured reader built on
//! noodles-vcf and a line-oriented plain-text fallback. Both feed the same
//! [`ParsedVariants`] accumulator so their output is identical for
//! well-formed input.

use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;

use crate::types::{Detection, QualitySignals};

pub mod plain;
#[cfg(feature = "structured")]
pub mod vcf;

pub use plain::PlainTextReader;
#[cfg(feature = "structured")]
pub use vcf::StructuredVcfReader;

/// INFO key carrying the gene symbol
pub const GENE_KEY: &str = "GENE";
/// INFO key carrying the star allele
pub const STAR_KEY: &str = "STAR";

/// Environment variable forcing a reader backend
pub const READER_ENV: &str = "PGX_GUARD_READER";

/// Fatal faults that abort a parse
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("failed to open {path}: {message}")]
    Open { path: PathBuf, message: String },
    #[error("invalid VCF header in {path}: {message}")]
    Header { path: PathBuf, message: String },
    #[error("read error in {path} after record {record}: {message}")]
    Read {
        path: PathBuf,
        record: usize,
        message: String,
    },
}

/// How a parse pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    /// Read to completion and at least one GENE/STAR record was found
    Complete,
    /// Read to completion but nothing pharmacogenomic was annotated
    NoRelevantAnnotations,
    /// Aborted by a fatal read error; all collected state was dropped
    Failed(ParseError),
}

/// Accumulated output of one parse pass
#[derive(Debug, Clone)]
pub struct ParsedVariants {
    /// Distinct star alleles observed per gene symbol, kept sorted
    pub gene_alleles: BTreeMap<String, BTreeSet<String>>,
    /// Star-annotated records in file order
    pub detections: Vec<Detection>,
    pub quality: QualitySignals,
    pub status: ExtractionStatus,
    pub source_file: String,
}

impl ParsedVariants {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            gene_alleles: BTreeMap::new(),
            detections: Vec::new(),
            quality: QualitySignals::default(),
            status: ExtractionStatus::NoRelevantAnnotations,
            source_file: source_file.into(),
        }
    }

    /// Record one variant's annotations. Records without a STAR value are
    /// ignored; those without a GENE value still count as detections.
    pub fn observe(&mut self, id: Option<&str>, gene: Option<&str>, star: Option<&str>) {
        let Some(star) = star else {
            return;
        };

        self.detections.push(Detection::new(id, star));

        if let Some(gene) = gene {
            self.gene_alleles
                .entry(gene.to_string())
                .or_default()
                .insert(star.to_string());
            self.quality.gene_detected = true;
        }
    }

    pub fn alleles_for(&self, gene: &str) -> Option<&BTreeSet<String>> {
        self.gene_alleles.get(gene)
    }

    fn complete(&mut self) {
        self.quality.vcf_parsing_success = true;
        self.status = if self.quality.gene_detected {
            ExtractionStatus::Complete
        } else {
            ExtractionStatus::NoRelevantAnnotations
        };
    }

    fn fail(&mut self, error: ParseError) {
        self.gene_alleles.clear();
        self.detections.clear();
        self.quality = QualitySignals::default();
        self.status = ExtractionStatus::Failed(error);
    }
}

/// A backend able to stream annotations out of a variant file
pub trait VariantReader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stream every record of `path` into `data`. Malformed records are
    /// skipped; only faults that stop the read are returned.
    fn read(&self, path: &Path, data: &mut ParsedVariants) -> Result<(), ParseError>;
}

/// Reader preference as written in configuration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReaderChoice {
    #[default]
    Auto,
    Structured,
    Plain,
}

impl FromStr for ReaderChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(ReaderChoice::Auto),
            "structured" | "noodles" => Ok(ReaderChoice::Structured),
            "plain" | "text" => Ok(ReaderChoice::Plain),
            other => Err(format!("unknown reader backend: {}", other)),
        }
    }
}

impl ReaderChoice {
    /// Parse the override variable's value. Unrecognised values are logged
    /// and ignored so every caller treats a bad override the same way.
    pub fn from_env_value(value: Option<&str>) -> Option<Self> {
        match value?.parse() {
            Ok(choice) => Some(choice),
            Err(e) => {
                warn!("Ignoring {}: {}", READER_ENV, e);
                None
            }
        }
    }
}

/// Concrete backend in use for this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderBackend {
    Structured,
    PlainText,
}

impl ReaderBackend {
    /// Whether the structured reader was compiled in and works on this platform
    pub fn structured_available() -> bool {
        cfg!(feature = "structured") && !cfg!(windows)
    }

    /// Resolve a configured preference against what this build supports
    pub fn resolve(choice: ReaderChoice) -> Self {
        match choice {
            ReaderChoice::Plain => ReaderBackend::PlainText,
            ReaderChoice::Structured if Self::structured_available() => ReaderBackend::Structured,
            ReaderChoice::Structured => {
                warn!("Structured VCF reader unavailable in this build, using plain-text reader");
                ReaderBackend::PlainText
            }
            ReaderChoice::Auto => {
                if Self::structured_available() {
                    ReaderBackend::Structured
                } else {
                    ReaderBackend::PlainText
                }
            }
        }
    }

    /// Probe the environment, honouring the override variable
    pub fn detect() -> Self {
        let choice = ReaderChoice::from_env_value(std::env::var(READER_ENV).ok().as_deref());
        Self::resolve(choice.unwrap_or_default())
    }

    fn into_reader(self) -> Box<dyn VariantReader> {
        match self {
            #[cfg(feature = "structured")]
            ReaderBackend::Structured => Box::new(StructuredVcfReader::new()),
            #[cfg(not(feature = "structured"))]
            ReaderBackend::Structured => Box::new(PlainTextReader::new()),
            ReaderBackend::PlainText => Box::new(PlainTextReader::new()),
        }
    }
}

/// Entry point of the extraction stage. Never fails: faults are reported
/// through [`ParsedVariants::status`] and the quality signals.
pub struct VariantExtractor {
    reader: Box<dyn VariantReader>,
}

impl VariantExtractor {
    pub fn new(backend: ReaderBackend) -> Self {
        Self {
            reader: backend.into_reader(),
        }
    }

    pub fn detect() -> Self {
        Self::new(ReaderBackend::detect())
    }

    pub fn backend_name(&self) -> &'static str {
        self.reader.name()
    }

    pub fn extract(&self, path: &Path) -> ParsedVariants {
        let mut data = ParsedVariants::new(path.to_string_lossy());
        debug!("Reading {} with the {} reader", path.display(), self.reader.name());

        match self.reader.read(path, &mut data) {
            Ok(()) => {
                data.complete();
                info!(
                    "Parsed {}: {} detections across {} genes",
                    path.display(),
                    data.detections.len(),
                    data.gene_alleles.len()
                );
            }
            Err(e) => {
                warn!("Variant parse aborted: {}", e);
                data.fail(e);
            }
        }

        data
    }
}

/// Open a possibly compressed text file, choosing the decoder by extension
pub fn open_file(path: &Path) -> Result<Box<dyn BufRead>, ParseError> {
    let file = File::open(path).map_err(|e| ParseError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let reader: Box<dyn BufRead> = match extension.as_str() {
        "gz" | "bgz" => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        "bz2" => Box::new(BufReader::new(BzDecoder::new(file))),
        "xz" => Box::new(BufReader::new(XzDecoder::new(file))),
        _ => Box::new(BufReader::new(file)),
    };

    Ok(reader)
}

/// Reduce a multi-valued annotation to its first element
pub fn first_value(value: &str) -> &str {
    value.split(',').next().unwrap_or(value).trim()
}


#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn backends() -> Vec<ReaderBackend> {
        let mut backends = vec![ReaderBackend::PlainText];
        if ReaderBackend::structured_available() {
            backends.push(ReaderBackend::Structured);
        }
        backends
    }

    #[test]
    fn test_extraction_rules() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("patient.vcf");
        std::fs::write(&path, fixtures::sample_vcf())?;

        for backend in backends() {
            let data = VariantExtractor::new(backend).extract(&path);

            assert_eq!(data.status, ExtractionStatus::Complete);
            assert!(data.quality.vcf_parsing_success);
            assert!(data.quality.gene_detected);

            let cyp2d6: Vec<&str> = data
                .alleles_for("CYP2D6")
                .map(|set| set.iter().map(String::as_str).collect())
                .unwrap_or_default();
            assert_eq!(cyp2d6, vec!["*10", "*4"]);
            assert!(data.alleles_for("TPMT").is_none());
            assert!(data.alleles_for("SLCO1B1").is_none());

            // The TPMT record lacks GENE but still counts as a detection.
            let ids: Vec<&str> = data.detections.iter().map(|d| d.rsid.as_str()).collect();
            assert_eq!(
                ids,
                vec!["rs3892097", "rs1065852", "rs4244285", ".", "rs1142345", "rs3918290"]
            );
        }
        Ok(())
    }

    #[test]
    fn test_backends_agree() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("patient.vcf");
        let mut vcf = fixtures::sample_vcf();
        vcf.push_str("22\t42130692\trs3892097\tG\tA\t50\tPASS\tGENE=CYP2D6;STAR=*4\n");
        std::fs::write(&path, vcf)?;

        let plain = VariantExtractor::new(ReaderBackend::PlainText).extract(&path);
        if ReaderBackend::structured_available() {
            let structured = VariantExtractor::new(ReaderBackend::Structured).extract(&path);
            assert_eq!(plain.gene_alleles, structured.gene_alleles);
            assert_eq!(plain.detections, structured.detections);
            assert_eq!(plain.quality, structured.quality);
        }
        // Duplicate detections are kept, duplicate alleles are not.
        assert_eq!(plain.detections.len(), 7);
        assert_eq!(plain.alleles_for("CYP2D6").map(|s| s.len()), Some(2));
        Ok(())
    }

    #[test]
    fn test_missing_file_fails_cleanly() {
        for backend in backends() {
            let data = VariantExtractor::new(backend).extract(Path::new("/nonexistent/patient.vcf"));
            assert!(matches!(data.status, ExtractionStatus::Failed(ParseError::Open { .. })));
            assert!(!data.quality.vcf_parsing_success);
            assert!(!data.quality.gene_detected);
            assert!(data.gene_alleles.is_empty());
            assert!(data.detections.is_empty());
        }
    }

    #[test]
    fn test_no_annotations() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("plain.vcf");
        let mut vcf = fixtures::HEADER.to_string();
        vcf.push_str("1\t100\trs1\tA\tT\t30\tPASS\tDP=10\n");
        std::fs::write(&path, vcf)?;

        for backend in backends() {
            let data = VariantExtractor::new(backend).extract(&path);
            assert_eq!(data.status, ExtractionStatus::NoRelevantAnnotations);
            assert!(data.quality.vcf_parsing_success);
            assert!(!data.quality.gene_detected);
        }
        Ok(())
    }

    #[test]
    fn test_gzip_input() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("patient.vcf.gz");
        let mut encoder = GzEncoder::new(File::create(&path)?, Compression::default());
        encoder.write_all(fixtures::sample_vcf().as_bytes())?;
        encoder.finish()?;

        for backend in backends() {
            let data = VariantExtractor::new(backend).extract(&path);
            assert_eq!(data.status, ExtractionStatus::Complete);
            assert_eq!(data.detections.len(), 6);
        }
        Ok(())
    }

    #[test]
    fn test_bzip2_and_xz_input() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let vcf = fixtures::sample_vcf();

        let bz_path = temp_dir.path().join("patient.vcf.bz2");
        let mut bz = bzip2::write::BzEncoder::new(
            File::create(&bz_path)?,
            bzip2::Compression::default(),
        );
        bz.write_all(vcf.as_bytes())?;
        bz.finish()?;

        let xz_path = temp_dir.path().join("patient.vcf.xz");
        let mut xz = xz2::write::XzEncoder::new(File::create(&xz_path)?, 6);
        xz.write_all(vcf.as_bytes())?;
        xz.finish()?;

        for path in [&bz_path, &xz_path] {
            for backend in backends() {
                let data = VariantExtractor::new(backend).extract(path);
                assert_eq!(data.status, ExtractionStatus::Complete, "{}", path.display());
                assert_eq!(data.detections.len(), 6);
                assert_eq!(data.alleles_for("DPYD").map(|s| s.len()), Some(1));
            }
        }
        Ok(())
    }

    #[test]
    fn test_reader_choice_parsing() {
        assert_eq!("plain".parse::<ReaderChoice>(), Ok(ReaderChoice::Plain));
        assert_eq!(" Structured ".parse::<ReaderChoice>(), Ok(ReaderChoice::Structured));
        assert_eq!("".parse::<ReaderChoice>(), Ok(ReaderChoice::Auto));
        assert!("bcf".parse::<ReaderChoice>().is_err());
        assert_eq!(ReaderBackend::resolve(ReaderChoice::Plain), ReaderBackend::PlainText);

        assert_eq!(ReaderChoice::from_env_value(Some("text")), Some(ReaderChoice::Plain));
        assert_eq!(ReaderChoice::from_env_value(Some("bam")), None);
        assert_eq!(ReaderChoice::from_env_value(None), None);
    }

    #[test]
    fn test_first_value() {
        assert_eq!(first_value("*4,*10"), "*4");
        assert_eq!(first_value("CYP2D6"), "CYP2D6");
    }
}
