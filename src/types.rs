use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference allele assumed for every supported gene
pub const REFERENCE_ALLELE: &str = "*1";

/// Placeholder used when a record carries no identifier
pub const MISSING_ID: &str = ".";

/// Pharmacogenes covered by the rule set
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum Gene {
    #[serde(rename = "CYP2D6")]
    Cyp2d6,
    #[serde(rename = "CYP2C19")]
    Cyp2c19,
    #[serde(rename = "CYP2C9")]
    Cyp2c9,
    #[serde(rename = "SLCO1B1")]
    Slco1b1,
    #[serde(rename = "TPMT")]
    Tpmt,
    #[serde(rename = "DPYD")]
    Dpyd,
}

impl Gene {
    pub const ALL: [Gene; 6] = [
        Gene::Cyp2d6,
        Gene::Cyp2c19,
        Gene::Cyp2c9,
        Gene::Slco1b1,
        Gene::Tpmt,
        Gene::Dpyd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gene::Cyp2d6 => "CYP2D6",
            Gene::Cyp2c19 => "CYP2C19",
            Gene::Cyp2c9 => "CYP2C9",
            Gene::Slco1b1 => "SLCO1B1",
            Gene::Tpmt => "TPMT",
            Gene::Dpyd => "DPYD",
        }
    }
}

impl fmt::Display for Gene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gene {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Symbols in variant files are matched exactly; CYP2d6 is not CYP2D6.
        Gene::ALL
            .iter()
            .copied()
            .find(|gene| gene.as_str() == s)
            .ok_or_else(|| format!("unsupported gene: {}", s))
    }
}

/// Metabolizer phenotype
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Phenotype {
    #[serde(rename = "PM")]
    Poor,
    #[serde(rename = "IM")]
    Intermediate,
    #[serde(rename = "NM")]
    Normal,
    #[serde(rename = "RM")]
    Rapid,
    #[serde(rename = "URM")]
    UltraRapid,
    Unknown,
}

impl Phenotype {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Phenotype::Poor => "PM",
            Phenotype::Intermediate => "IM",
            Phenotype::Normal => "NM",
            Phenotype::Rapid => "RM",
            Phenotype::UltraRapid => "URM",
            Phenotype::Unknown => "Unknown",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Phenotype::Poor => "Poor Metabolizer",
            Phenotype::Intermediate => "Intermediate Metabolizer",
            Phenotype::Normal => "Normal Metabolizer",
            Phenotype::Rapid => "Rapid Metabolizer",
            Phenotype::UltraRapid => "Ultra-Rapid Metabolizer",
            Phenotype::Unknown => "Unknown Metabolizer Status",
        }
    }
}

impl fmt::Display for Phenotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// Clinical risk label for a drug given a phenotype
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiskLabel {
    Safe,
    #[serde(rename = "Adjust Dosage")]
    AdjustDosage,
    Toxic,
    Ineffective,
    Unknown,
}

impl RiskLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Safe => "Safe",
            RiskLabel::AdjustDosage => "Adjust Dosage",
            RiskLabel::Toxic => "Toxic",
            RiskLabel::Ineffective => "Ineffective",
            RiskLabel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observed variant carrying a star allele annotation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Detection {
    pub rsid: String,
    pub star_allele: String,
}

impl Detection {
    pub fn new(rsid: Option<&str>, star_allele: impl Into<String>) -> Self {
        let rsid = match rsid {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => MISSING_ID.to_string(),
        };
        Self {
            rsid,
            star_allele: star_allele.into(),
        }
    }
}

/// Per-parse quality signals
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QualitySignals {
    pub vcf_parsing_success: bool,
    pub gene_detected: bool,
}

/// Two-allele genotype for one gene
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diplotype {
    pub alleles: [String; 2],
    /// Observed alleles dropped because more than two were called
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discarded: Vec<String>,
}

impl Diplotype {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        let mut alleles = [first.into(), second.into()];
        alleles.sort();
        Self {
            alleles,
            discarded: Vec::new(),
        }
    }

    pub fn homozygous_reference() -> Self {
        Self::new(REFERENCE_ALLELE, REFERENCE_ALLELE)
    }

    pub fn is_truncated(&self) -> bool {
        !self.discarded.is_empty()
    }
}

impl fmt::Display for Diplotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.alleles[0], self.alleles[1])
    }
}

/// Result of evaluating one drug against a phenotype profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskOutcome {
    pub risk_label: RiskLabel,
    pub severity: Severity,
    pub confidence: f64,
    /// Governing gene symbol, or a placeholder when no gene applies
    pub gene: String,
}

impl RiskOutcome {
    pub fn new(
        risk_label: RiskLabel,
        severity: Severity,
        confidence: f64,
        gene: impl Into<String>,
    ) -> Self {
        Self {
            risk_label,
            severity,
            confidence,
            gene: gene.into(),
        }
    }

    /// Governing gene when it names one of the supported genes
    pub fn governing_gene(&self) -> Option<Gene> {
        self.gene.parse().ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    pub risk_label: RiskLabel,
    pub confidence_score: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PharmacogenomicProfile {
    pub primary_gene: String,
    pub diplotype: String,
    pub phenotype: Phenotype,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_score: Option<f64>,
    pub detected_variants: Vec<Detection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicalRecommendation {
    pub action: String,
    pub cpic_alignment: bool,
}

/// Free-text fields produced by the explanation service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Explanation {
    pub summary: String,
    pub biological_mechanism: String,
    pub clinical_implication: String,
    pub dosing_rationale: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QualityMetrics {
    pub vcf_parsing_success: bool,
    pub gene_detected: bool,
    /// Genes whose observed allele set exceeded two and was cut down
    #[serde(default)]
    pub truncated_genes: Vec<Gene>,
}

/// Output record handed to downstream consumers, one per drug
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub patient_id: String,
    pub drug: String,
    pub timestamp: chrono::DateTime<chrono::Local>,
    pub risk_assessment: RiskAssessment,
    pub pharmacogenomic_profile: PharmacogenomicProfile,
    pub clinical_recommendation: ClinicalRecommendation,
    pub explanation: Explanation,
    pub quality_metrics: QualityMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gene_round_trips_through_symbol() {
        for gene in Gene::ALL {
            assert_eq!(gene.as_str().parse::<Gene>(), Ok(gene));
        }
        assert!("CYP3A5".parse::<Gene>().is_err());
        assert!("cyp2d6".parse::<Gene>().is_err());
    }

    #[test]
    fn test_diplotype_sorts_alleles() {
        let diplotype = Diplotype::new("*4", "*1");
        assert_eq!(diplotype.alleles, ["*1".to_string(), "*4".to_string()]);
        assert_eq!(diplotype.to_string(), "*1/*4");
        assert!(!diplotype.is_truncated());
    }

    #[test]
    fn test_detection_placeholder_id() {
        assert_eq!(Detection::new(None, "*4").rsid, ".");
        assert_eq!(Detection::new(Some(""), "*4").rsid, ".");
        assert_eq!(Detection::new(Some("rs3892097"), "*4").rsid, "rs3892097");
    }

    #[test]
    fn test_wire_names() -> serde_json::Result<()> {
        assert_eq!(serde_json::to_string(&Phenotype::UltraRapid)?, "\"URM\"");
        assert_eq!(serde_json::to_string(&RiskLabel::AdjustDosage)?, "\"Adjust Dosage\"");
        assert_eq!(serde_json::to_string(&Severity::Critical)?, "\"critical\"");
        assert_eq!(serde_json::to_string(&Gene::Slco1b1)?, "\"SLCO1B1\"");
        Ok(())
    }
}
