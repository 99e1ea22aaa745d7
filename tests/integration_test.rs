use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use pgx_guard::{
    analysis::*, discovery::FileDiscovery, explain::OfflineExplainer, output::*, parsers::*,
    types::*,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str = "##fileformat=VCFv4.2\n\
##INFO=<ID=GENE,Number=1,Type=String,Description=\"Gene symbol\">\n\
##INFO=<ID=STAR,Number=1,Type=String,Description=\"Star allele\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

fn write_vcf(dir: &Path, name: &str, records: &[&str]) -> Result<std::path::PathBuf> {
    let path = dir.join(name);
    let mut content = HEADER.to_string();
    for record in records {
        content.push_str(record);
        content.push('\n');
    }
    fs::write(&path, content)?;
    Ok(path)
}

fn analyzer(backend: ReaderBackend) -> PharmacogenomicAnalyzer {
    PharmacogenomicAnalyzer::new(VariantExtractor::new(backend), Box::new(OfflineExplainer))
}

const ONE_PER_GENE: [&str; 6] = [
    "22\t42130692\trs3892097\tG\tA\t50\tPASS\tGENE=CYP2D6;STAR=*4",
    "10\t94781859\trs4244285\tG\tA\t50\tPASS\tGENE=CYP2C19;STAR=*2",
    "10\t94942290\trs1057910\tA\tC\t50\tPASS\tGENE=CYP2C9;STAR=*3",
    "12\t21178615\trs4149056\tT\tC\t50\tPASS\tGENE=SLCO1B1;STAR=*5",
    "6\t18143724\trs1800460\tC\tT\t50\tPASS\tGENE=TPMT;STAR=*3A",
    "1\t97450058\trs3918290\tC\tT\t50\tPASS\tGENE=DPYD;STAR=*2A",
];

#[test]
fn test_round_trip_all_drugs() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = write_vcf(temp_dir.path(), "round_trip.vcf", &ONE_PER_GENE)?;
    let drugs = parse_drug_list(
        "codeine,clopidogrel,warfarin,simvastatin,azathioprine,fluorouracil",
    );

    let expected = [
        ("CYP2D6", "*1/*4", Phenotype::Normal, RiskLabel::Safe, Severity::None),
        ("CYP2C19", "*1/*2", Phenotype::Intermediate, RiskLabel::Ineffective, Severity::Moderate),
        ("CYP2C9", "*1/*3", Phenotype::Intermediate, RiskLabel::AdjustDosage, Severity::Moderate),
        ("SLCO1B1", "*1/*5", Phenotype::Intermediate, RiskLabel::AdjustDosage, Severity::Moderate),
        ("TPMT", "*1/*3A", Phenotype::Intermediate, RiskLabel::AdjustDosage, Severity::High),
        ("DPYD", "*1/*2A", Phenotype::Intermediate, RiskLabel::AdjustDosage, Severity::High),
    ];

    for backend in [ReaderBackend::Structured, ReaderBackend::PlainText] {
        let reports = analyzer(backend).analyze(&path, &drugs);
        assert_eq!(reports.len(), expected.len());

        for (report, (gene, diplotype, phenotype, risk, severity)) in reports.iter().zip(expected) {
            let profile = &report.pharmacogenomic_profile;
            assert_eq!(profile.primary_gene, gene, "{}", report.drug);
            assert_eq!(profile.diplotype, diplotype, "{}", report.drug);
            assert_eq!(profile.phenotype, phenotype, "{}", report.drug);
            assert_eq!(report.risk_assessment.risk_label, risk, "{}", report.drug);
            assert_eq!(report.risk_assessment.severity, severity, "{}", report.drug);
            assert_eq!(report.risk_assessment.confidence_score, 0.95);
            assert_eq!(profile.detected_variants.len(), 6);
            assert!(report.quality_metrics.vcf_parsing_success);
            assert!(report.quality_metrics.gene_detected);
            assert_eq!(report.patient_id, "round_trip");
        }
    }

    Ok(())
}

#[test]
fn test_codeine_extremes() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let poor = write_vcf(
        temp_dir.path(),
        "poor.vcf",
        &[
            "22\t42130692\trs3892097\tG\tA\t50\tPASS\tGENE=CYP2D6;STAR=*4",
            "22\t42126611\trs1065852\tC\tT\t50\tPASS\tGENE=CYP2D6;STAR=*10",
        ],
    )?;
    let ultra = write_vcf(
        temp_dir.path(),
        "ultra.vcf",
        &["22\t42130692\t.\tG\tA\t50\tPASS\tGENE=CYP2D6;STAR=*1XN"],
    )?;

    let analyzer = analyzer(ReaderBackend::PlainText);
    let drugs = vec!["CODEINE".to_string()];

    let report = &analyzer.analyze(&poor, &drugs)[0];
    assert_eq!(report.pharmacogenomic_profile.diplotype, "*10/*4");
    assert_eq!(report.pharmacogenomic_profile.phenotype, Phenotype::Poor);
    assert_eq!(report.risk_assessment.risk_label, RiskLabel::Ineffective);
    assert_eq!(report.risk_assessment.severity, Severity::Moderate);
    assert_eq!(report.risk_assessment.confidence_score, 0.95);

    let report = &analyzer.analyze(&ultra, &drugs)[0];
    assert_eq!(report.pharmacogenomic_profile.phenotype, Phenotype::UltraRapid);
    assert_eq!(report.pharmacogenomic_profile.activity_score, Some(3.0));
    assert_eq!(report.risk_assessment.risk_label, RiskLabel::Toxic);
    assert_eq!(report.risk_assessment.severity, Severity::Critical);
    assert_eq!(report.pharmacogenomic_profile.detected_variants[0].rsid, ".");

    Ok(())
}

#[test]
fn test_unknown_drug_and_missing_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = write_vcf(temp_dir.path(), "patient.vcf", &ONE_PER_GENE)?;
    let analyzer = analyzer(ReaderBackend::PlainText).with_patient_id("PATIENT_001");

    let report = &analyzer.analyze(&path, &["ibuprofen".to_string()])[0];
    assert_eq!(report.patient_id, "PATIENT_001");
    assert_eq!(report.risk_assessment.risk_label, RiskLabel::Unknown);
    assert_eq!(report.risk_assessment.confidence_score, 0.5);
    assert_eq!(report.pharmacogenomic_profile.primary_gene, "Gene Unknown");

    let snapshot = analyzer.snapshot(&temp_dir.path().join("absent.vcf"));
    assert!(matches!(snapshot.status(), ExtractionStatus::Failed(_)));
    assert!(!snapshot.quality_metrics().vcf_parsing_success);
    assert!(snapshot
        .genotypes
        .values()
        .all(|d| d.to_string() == "*1/*1"));

    Ok(())
}

#[test]
fn test_compressed_directory_to_reports() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("input");
    fs::create_dir(&input)?;

    let gz_path = input.join("sample.vcf.gz");
    let mut encoder = GzEncoder::new(fs::File::create(&gz_path)?, Compression::default());
    encoder.write_all(HEADER.as_bytes())?;
    encoder.write_all(b"6\t18143724\trs1800460\tC\tT\t50\tPASS\tGENE=TPMT;STAR=*3A\n")?;
    encoder.write_all(b"6\t18130918\trs1142345\tT\tC\t50\tPASS\tGENE=TPMT;STAR=*3C\n")?;
    encoder.finish()?;

    let files = FileDiscovery::new(false).discover(&[input])?;
    assert_eq!(files, vec![gz_path]);

    let results = analyzer(ReaderBackend::PlainText)
        .analyze_batch(&files, &["azathioprine".to_string()]);
    let reports: Vec<AnalysisReport> = results.into_iter().flat_map(|(_, r)| r).collect();
    assert_eq!(reports[0].patient_id, "sample");
    assert_eq!(reports[0].pharmacogenomic_profile.phenotype, Phenotype::Poor);
    assert_eq!(reports[0].risk_assessment.risk_label, RiskLabel::Toxic);
    assert_eq!(reports[0].risk_assessment.severity, Severity::Critical);

    let out = temp_dir.path().join("reports");
    let written = ReportGenerator::new(&out)?.generate(&reports, ReportFormat::Json)?;
    let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(&written[0])?)?;
    assert_eq!(parsed[0]["drug"], "azathioprine");
    assert_eq!(parsed[0]["risk_assessment"]["risk_label"], "Toxic");
    assert_eq!(parsed[0]["pharmacogenomic_profile"]["diplotype"], "*3A/*3C");

    Ok(())
}
