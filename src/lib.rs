//! # pgx-guard
//!
//! Pharmacogenomic risk assessment from annotated variant-call files.
//!
//! ## Pipeline
//!
//! - Extract star-allele annotations (`GENE`/`STAR` INFO keys) from a VCF,
//!   plain or compressed, with a structured or a plain-text reader
//! - Build a diplotype per supported gene, defaulting to `*1/*1`
//! - Classify metabolizer phenotypes from activity scores
//! - Look up the drug's governing gene and report risk, severity and confidence
//! - Attach explanatory text and write JSON, CSV, TSV or HTML reports

pub mod analysis;
pub mod config;
pub mod diplotype;
pub mod discovery;
pub mod explain;
pub mod output;
pub mod parsers;
pub mod phenotype;
pub mod risk;
pub mod types;

// Re-export key types
pub use analysis::{parse_drug_list, GenotypeSnapshot, PharmacogenomicAnalyzer};
pub use config::Settings;
pub use diplotype::construct_diplotypes;
pub use discovery::FileDiscovery;
pub use explain::{ExplanationService, OfflineExplainer};
pub use output::{ReportFormat, ReportGenerator};
pub use parsers::{ExtractionStatus, ParsedVariants, ReaderBackend, VariantExtractor};
pub use phenotype::{calculate_phenotypes, classify};
pub use risk::analyze_risk;
pub use types::*;
