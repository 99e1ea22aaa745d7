use chrono::Local;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::diplotype::{construct_diplotypes, truncated_genes, GenotypeMap};
use crate::explain::{
    fallback_explanation, fallback_recommendation, ExplanationRequest, ExplanationService,
    OfflineExplainer,
};
use crate::parsers::{ExtractionStatus, ParsedVariants, VariantExtractor};
use crate::phenotype::{activity_score, calculate_phenotypes, PhenotypeMap};
use crate::risk::analyze_risk;
use crate::types::*;

/// Diplotype shown when the governing gene has no genotype
const UNRESOLVED_DIPLOTYPE: &str = "?/?";

/// Everything derived from one variant file, reused for every drug
#[derive(Debug, Clone)]
pub struct GenotypeSnapshot {
    pub parsed: ParsedVariants,
    pub genotypes: GenotypeMap,
    pub phenotypes: PhenotypeMap,
}

impl GenotypeSnapshot {
    pub fn from_parsed(parsed: ParsedVariants) -> Self {
        let genotypes = construct_diplotypes(&parsed);
        let phenotypes = calculate_phenotypes(&genotypes);
        Self {
            parsed,
            genotypes,
            phenotypes,
        }
    }

    pub fn status(&self) -> &ExtractionStatus {
        &self.parsed.status
    }

    pub fn quality_metrics(&self) -> QualityMetrics {
        QualityMetrics {
            vcf_parsing_success: self.parsed.quality.vcf_parsing_success,
            gene_detected: self.parsed.quality.gene_detected,
            truncated_genes: truncated_genes(&self.genotypes),
        }
    }

    /// Profile of the gene governing an outcome
    pub fn profile_for(&self, outcome: &RiskOutcome) -> PharmacogenomicProfile {
        let diplotype = outcome
            .governing_gene()
            .and_then(|gene| self.genotypes.get(&gene).map(|d| (gene, d)));

        PharmacogenomicProfile {
            primary_gene: outcome.gene.clone(),
            diplotype: diplotype
                .map(|(_, d)| d.to_string())
                .unwrap_or_else(|| UNRESOLVED_DIPLOTYPE.to_string()),
            phenotype: outcome
                .governing_gene()
                .and_then(|gene| self.phenotypes.get(&gene).copied())
                .unwrap_or(Phenotype::Unknown),
            activity_score: diplotype.map(|(gene, d)| activity_score(gene, &d.alleles)),
            detected_variants: self.parsed.detections.clone(),
        }
    }
}

/// Runs the full pipeline: extraction, diplotypes, phenotypes, risk, text
pub struct PharmacogenomicAnalyzer {
    extractor: VariantExtractor,
    explainer: Box<dyn ExplanationService>,
    patient_id: Option<String>,
}

impl PharmacogenomicAnalyzer {
    pub fn new(extractor: VariantExtractor, explainer: Box<dyn ExplanationService>) -> Self {
        Self {
            extractor,
            explainer,
            patient_id: None,
        }
    }

    /// Analyzer with the detected reader and offline explanations
    pub fn offline() -> Self {
        Self::new(VariantExtractor::detect(), Box::new(OfflineExplainer))
    }

    /// Fix the patient identifier instead of deriving it from file names
    pub fn with_patient_id(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    pub fn snapshot(&self, path: &Path) -> GenotypeSnapshot {
        GenotypeSnapshot::from_parsed(self.extractor.extract(path))
    }

    /// Evaluate one drug against an existing snapshot
    pub fn evaluate(
        &self,
        snapshot: &GenotypeSnapshot,
        patient_id: &str,
        drug: &str,
    ) -> AnalysisReport {
        let outcome = analyze_risk(drug, &snapshot.phenotypes);
        let profile = snapshot.profile_for(&outcome);

        let request = ExplanationRequest {
            gene: outcome.gene.clone(),
            drug: drug.to_string(),
            phenotype: profile.phenotype,
            diplotype: profile.diplotype.clone(),
            risk: outcome.risk_label,
            severity: outcome.severity,
        };

        let explanation = self.explainer.explain(&request).unwrap_or_else(|e| {
            warn!("Explanation for {} unavailable: {}", drug, e);
            fallback_explanation(&request)
        });
        let action = self.explainer.recommend(&request).unwrap_or_else(|e| {
            warn!("Recommendation for {} unavailable: {}", drug, e);
            fallback_recommendation(&request)
        });

        AnalysisReport {
            patient_id: patient_id.to_string(),
            drug: drug.to_string(),
            timestamp: Local::now(),
            risk_assessment: RiskAssessment {
                risk_label: outcome.risk_label,
                confidence_score: outcome.confidence,
                severity: outcome.severity,
            },
            pharmacogenomic_profile: profile,
            clinical_recommendation: ClinicalRecommendation {
                action,
                cpic_alignment: true,
            },
            explanation,
            quality_metrics: snapshot.quality_metrics(),
        }
    }

    /// Parse `path` once and evaluate every drug against it
    pub fn analyze(&self, path: &Path, drugs: &[String]) -> Vec<AnalysisReport> {
        let snapshot = self.snapshot(path);
        let patient_id = self
            .patient_id
            .clone()
            .unwrap_or_else(|| sample_id_from_path(path));

        info!(
            "Evaluating {} drug(s) for {} ({:?})",
            drugs.len(),
            patient_id,
            snapshot.status()
        );

        drugs
            .iter()
            .map(|drug| self.evaluate(&snapshot, &patient_id, drug))
            .collect()
    }

    /// Analyze several files in parallel; each file is an independent run
    pub fn analyze_batch(
        &self,
        paths: &[PathBuf],
        drugs: &[String],
    ) -> Vec<(PathBuf, Vec<AnalysisReport>)> {
        paths
            .par_iter()
            .map(|path| (path.clone(), self.analyze(path, drugs)))
            .collect()
    }
}

/// Split a comma-separated drug list, dropping blank entries
pub fn parse_drug_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sample identifier derived from a file name, minus compression and VCF suffixes
pub fn sample_id_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");

    let mut stem = name;
    for suffix in [".gz", ".bgz", ".bz2", ".xz", ".vcf", ".txt"] {
        stem = stem.strip_suffix(suffix).unwrap_or(stem);
    }

    if stem.is_empty() {
        "unknown".to_string()
    } else {
        stem.to_string()
    }
}
