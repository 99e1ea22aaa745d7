//! Allele activity tables and per-gene phenotype rules.

use lazy_static::lazy_static;
use std::collections::{BTreeMap, HashMap};

use crate::diplotype::GenotypeMap;
use crate::types::{Gene, Phenotype};

/// Activity assumed for alleles missing from a gene's table
pub const DEFAULT_ACTIVITY: f64 = 1.0;

/// Phenotype per gene; genes without a genotype are absent
pub type PhenotypeMap = BTreeMap<Gene, Phenotype>;

lazy_static! {
    static ref CYP2D6_ACTIVITY: HashMap<&'static str, f64> = HashMap::from([
        ("*1", 1.0),
        ("*2", 1.0),
        ("*33", 1.0),
        ("*35", 1.0),
        ("*10", 0.5),
        ("*17", 0.5),
        ("*29", 0.5),
        ("*41", 0.5),
        ("*3", 0.0),
        ("*4", 0.0),
        ("*5", 0.0),
        ("*6", 0.0),
        ("*1XN", 2.0),
        ("*2XN", 2.0),
    ]);
    static ref CYP2C19_ACTIVITY: HashMap<&'static str, f64> =
        HashMap::from([("*1", 1.0), ("*17", 2.0), ("*2", 0.0), ("*3", 0.0)]);
    static ref CYP2C9_ACTIVITY: HashMap<&'static str, f64> =
        HashMap::from([("*1", 1.0), ("*2", 0.5), ("*3", 0.0)]);
    static ref SLCO1B1_ACTIVITY: HashMap<&'static str, f64> =
        HashMap::from([("*1", 1.0), ("*5", 0.0), ("*15", 0.0), ("*17", 0.0)]);
    static ref TPMT_ACTIVITY: HashMap<&'static str, f64> = HashMap::from([
        ("*1", 1.0),
        ("*2", 0.0),
        ("*3A", 0.0),
        ("*3B", 0.0),
        ("*3C", 0.0),
        ("*4", 0.0),
    ]);
    static ref DPYD_ACTIVITY: HashMap<&'static str, f64> =
        HashMap::from([("*1", 1.0), ("*2A", 0.0), ("*13", 0.0), ("*9A", 0.5)]);
}

/// CYP2C19 allele with increased function
const CYP2C19_INCREASED: &str = "*17";
/// CYP2C19 alleles with no function, counted together
const CYP2C19_NO_FUNCTION: [&str; 2] = ["*2", "*3"];

fn activity_table(gene: Gene) -> &'static HashMap<&'static str, f64> {
    match gene {
        Gene::Cyp2d6 => &CYP2D6_ACTIVITY,
        Gene::Cyp2c19 => &CYP2C19_ACTIVITY,
        Gene::Cyp2c9 => &CYP2C9_ACTIVITY,
        Gene::Slco1b1 => &SLCO1B1_ACTIVITY,
        Gene::Tpmt => &TPMT_ACTIVITY,
        Gene::Dpyd => &DPYD_ACTIVITY,
    }
}

/// Activity value of one allele
pub fn allele_activity(gene: Gene, allele: &str) -> f64 {
    activity_table(gene)
        .get(allele)
        .copied()
        .unwrap_or(DEFAULT_ACTIVITY)
}

/// Summed activity of a genotype
pub fn activity_score<S: AsRef<str>>(gene: Gene, alleles: &[S]) -> f64 {
    alleles
        .iter()
        .map(|allele| allele_activity(gene, allele.as_ref()))
        .sum()
}

/// Classify one gene's genotype
pub fn classify<S: AsRef<str>>(gene: Gene, alleles: &[S]) -> Phenotype {
    match gene {
        Gene::Cyp2d6 => classify_cyp2d6(activity_score(gene, alleles)),
        Gene::Cyp2c19 => classify_cyp2c19(alleles),
        Gene::Cyp2c9 | Gene::Dpyd => classify_unit_floor(activity_score(gene, alleles)),
        Gene::Slco1b1 | Gene::Tpmt => classify_zero_floor(activity_score(gene, alleles)),
    }
}

/// Classify every genotype in the map
pub fn calculate_phenotypes(genotypes: &GenotypeMap) -> PhenotypeMap {
    genotypes
        .iter()
        .map(|(&gene, diplotype)| (gene, classify(gene, &diplotype.alleles)))
        .collect()
}

// The 0.5 branch is unreachable after the "< 1.0" branch.
// TODO: confirm the intended CYP2D6 intermediate range before changing the order.
#[allow(clippy::if_same_then_else)]
fn classify_cyp2d6(score: f64) -> Phenotype {
    if score == 0.0 {
        Phenotype::Poor
    } else if score > 0.0 && score < 1.0 {
        Phenotype::Poor
    } else if score == 0.5 {
        Phenotype::Intermediate
    } else if (1.0..=2.0).contains(&score) {
        Phenotype::Normal
    } else if score > 2.0 {
        Phenotype::UltraRapid
    } else {
        Phenotype::Unknown
    }
}

/// CYP2C9 and DPYD: intermediate from 1.0 up to 2.0
fn classify_unit_floor(score: f64) -> Phenotype {
    match score {
        s if s >= 2.0 => Phenotype::Normal,
        s if (1.0..2.0).contains(&s) => Phenotype::Intermediate,
        s if s < 1.0 => Phenotype::Poor,
        _ => Phenotype::Unknown,
    }
}

/// SLCO1B1 and TPMT: any residual activity below 2.0 is intermediate
fn classify_zero_floor(score: f64) -> Phenotype {
    match score {
        s if s >= 2.0 => Phenotype::Normal,
        s if s > 0.0 && s < 2.0 => Phenotype::Intermediate,
        s if s == 0.0 => Phenotype::Poor,
        _ => Phenotype::Unknown,
    }
}

fn classify_cyp2c19<S: AsRef<str>>(alleles: &[S]) -> Phenotype {
    let increased = alleles
        .iter()
        .filter(|a| a.as_ref() == CYP2C19_INCREASED)
        .count();
    let no_function = alleles
        .iter()
        .filter(|a| CYP2C19_NO_FUNCTION.contains(&a.as_ref()))
        .count();

    match (increased, no_function) {
        (0, 0) => Phenotype::Normal,
        (1, 0) => Phenotype::Rapid,
        (2, 0) => Phenotype::UltraRapid,
        (0, 1) => Phenotype::Intermediate,
        (0, 2) => Phenotype::Poor,
        (1, 1) => Phenotype::Intermediate,
        _ => Phenotype::Unknown,
    }
}
