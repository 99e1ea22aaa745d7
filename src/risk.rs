//! Drug/gene/phenotype risk lookup.

use lazy_static::lazy_static;
use std::collections::BTreeMap;

use crate::phenotype::PhenotypeMap;
use crate::types::{Gene, Phenotype, RiskLabel, RiskOutcome, Severity};

/// Confidence when the registry has an entry for the phenotype
pub const CONFIDENCE_MATCHED: f64 = 0.95;
/// Confidence when the drug itself is not registered
pub const CONFIDENCE_UNKNOWN_DRUG: f64 = 0.5;
/// Confidence when the drug is known but the phenotype has no entry
pub const CONFIDENCE_UNMAPPED_PHENOTYPE: f64 = 0.4;
/// Confidence when there is no data to decide on
pub const CONFIDENCE_NO_DATA: f64 = 0.0;

/// Gene placeholder for a blank drug name
pub const GENE_UNSPECIFIED: &str = "Unknown";
/// Gene placeholder for a drug missing from the registry
pub const GENE_UNKNOWN_DRUG: &str = "Gene Unknown";

/// Registry entry: the governing gene and its phenotype outcomes
#[derive(Debug)]
pub struct DrugRule {
    pub gene: Gene,
    pub outcomes: &'static [(Phenotype, RiskLabel, Severity)],
}

impl DrugRule {
    pub fn outcome_for(&self, phenotype: Phenotype) -> Option<(RiskLabel, Severity)> {
        self.outcomes
            .iter()
            .find(|(p, _, _)| *p == phenotype)
            .map(|&(_, risk, severity)| (risk, severity))
    }
}

lazy_static! {
    static ref DRUG_REGISTRY: BTreeMap<&'static str, DrugRule> = BTreeMap::from([
        (
            "CODEINE",
            DrugRule {
                gene: Gene::Cyp2d6,
                outcomes: &[
                    (Phenotype::Poor, RiskLabel::Ineffective, Severity::Moderate),
                    (Phenotype::Intermediate, RiskLabel::AdjustDosage, Severity::Low),
                    (Phenotype::Normal, RiskLabel::Safe, Severity::None),
                    (Phenotype::UltraRapid, RiskLabel::Toxic, Severity::Critical),
                ],
            },
        ),
        (
            "CLOPIDOGREL",
            DrugRule {
                gene: Gene::Cyp2c19,
                outcomes: &[
                    (Phenotype::Poor, RiskLabel::Ineffective, Severity::High),
                    (Phenotype::Intermediate, RiskLabel::Ineffective, Severity::Moderate),
                    (Phenotype::Normal, RiskLabel::Safe, Severity::None),
                    (Phenotype::Rapid, RiskLabel::Safe, Severity::None),
                    (Phenotype::UltraRapid, RiskLabel::Safe, Severity::None),
                ],
            },
        ),
        (
            "WARFARIN",
            DrugRule {
                gene: Gene::Cyp2c9,
                outcomes: &[
                    (Phenotype::Poor, RiskLabel::Toxic, Severity::High),
                    (Phenotype::Intermediate, RiskLabel::AdjustDosage, Severity::Moderate),
                    (Phenotype::Normal, RiskLabel::Safe, Severity::None),
                ],
            },
        ),
        (
            "SIMVASTATIN",
            DrugRule {
                gene: Gene::Slco1b1,
                outcomes: &[
                    // myopathy
                    (Phenotype::Poor, RiskLabel::Toxic, Severity::High),
                    (Phenotype::Intermediate, RiskLabel::AdjustDosage, Severity::Moderate),
                    (Phenotype::Normal, RiskLabel::Safe, Severity::None),
                ],
            },
        ),
        (
            "AZATHIOPRINE",
            DrugRule {
                gene: Gene::Tpmt,
                outcomes: &[
                    // myelosuppression
                    (Phenotype::Poor, RiskLabel::Toxic, Severity::Critical),
                    (Phenotype::Intermediate, RiskLabel::AdjustDosage, Severity::High),
                    (Phenotype::Normal, RiskLabel::Safe, Severity::None),
                ],
            },
        ),
        (
            "FLUOROURACIL",
            DrugRule {
                gene: Gene::Dpyd,
                outcomes: &[
                    (Phenotype::Poor, RiskLabel::Toxic, Severity::Critical),
                    (Phenotype::Intermediate, RiskLabel::AdjustDosage, Severity::High),
                    (Phenotype::Normal, RiskLabel::Safe, Severity::None),
                ],
            },
        ),
    ]);
}

/// Canonical registry key for a user-supplied drug name
pub fn normalize_drug_name(drug: &str) -> String {
    drug.trim().to_uppercase()
}

/// Registry entry for a drug, matched case-insensitively
pub fn lookup_drug(drug: &str) -> Option<&'static DrugRule> {
    DRUG_REGISTRY.get(normalize_drug_name(drug).as_str())
}

/// Registered drugs with their rules, in name order
pub fn supported_drugs() -> impl Iterator<Item = (&'static str, &'static DrugRule)> {
    DRUG_REGISTRY.iter().map(|(&name, rule)| (name, rule))
}

/// Evaluate a drug against a phenotype profile. Every input yields an
/// outcome; the confidence tells apart the different kinds of Unknown.
pub fn analyze_risk(drug: &str, phenotypes: &PhenotypeMap) -> RiskOutcome {
    if drug.trim().is_empty() {
        return RiskOutcome::new(
            RiskLabel::Unknown,
            Severity::None,
            CONFIDENCE_NO_DATA,
            GENE_UNSPECIFIED,
        );
    }

    let Some(rule) = lookup_drug(drug) else {
        return RiskOutcome::new(
            RiskLabel::Unknown,
            Severity::None,
            CONFIDENCE_UNKNOWN_DRUG,
            GENE_UNKNOWN_DRUG,
        );
    };

    let Some(&phenotype) = phenotypes.get(&rule.gene) else {
        return RiskOutcome::new(
            RiskLabel::Unknown,
            Severity::None,
            CONFIDENCE_NO_DATA,
            rule.gene.as_str(),
        );
    };

    match rule.outcome_for(phenotype) {
        Some((risk, severity)) => {
            RiskOutcome::new(risk, severity, CONFIDENCE_MATCHED, rule.gene.as_str())
        }
        None => RiskOutcome::new(
            RiskLabel::Unknown,
            Severity::None,
            CONFIDENCE_UNMAPPED_PHENOTYPE,
            rule.gene.as_str(),
        ),
    }
}
