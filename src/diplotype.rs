//! Resolution of observed allele sets into two-allele genotypes.

use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::parsers::ParsedVariants;
use crate::types::{Diplotype, Gene, REFERENCE_ALLELE};

/// Genotype per supported gene
pub type GenotypeMap = BTreeMap<Gene, Diplotype>;

/// Resolve one gene's distinct observed alleles into a diplotype.
///
/// Zero alleles give the homozygous reference, one allele is paired with the
/// reference, two are kept, and beyond two only the first two in sorted order
/// survive. The dropped alleles are kept on the diplotype.
pub fn resolve_diplotype(observed: &BTreeSet<String>) -> Diplotype {
    let mut alleles = observed.iter();

    match (alleles.next(), alleles.next()) {
        (None, _) => Diplotype::homozygous_reference(),
        (Some(only), None) => Diplotype::new(only.clone(), REFERENCE_ALLELE),
        (Some(first), Some(second)) => {
            let mut diplotype = Diplotype::new(first.clone(), second.clone());
            diplotype.discarded = alleles.cloned().collect();
            diplotype
        }
    }
}

/// Build a diplotype for every supported gene from one parse pass
pub fn construct_diplotypes(parsed: &ParsedVariants) -> GenotypeMap {
    let empty = BTreeSet::new();

    Gene::ALL
        .iter()
        .map(|&gene| {
            let observed = parsed.alleles_for(gene.as_str()).unwrap_or(&empty);
            let diplotype = resolve_diplotype(observed);
            if diplotype.is_truncated() {
                warn!(
                    "{} has {} distinct alleles; keeping {} and discarding {}",
                    gene,
                    observed.len(),
                    diplotype,
                    diplotype.discarded.join(", ")
                );
            }
            (gene, diplotype)
        })
        .collect()
}

/// Genes whose diplotype lost alleles during resolution
pub fn truncated_genes(genotypes: &GenotypeMap) -> Vec<Gene> {
    genotypes
        .iter()
        .filter(|(_, diplotype)| diplotype.is_truncated())
        .map(|(&gene, _)| gene)
        .collect()
}
