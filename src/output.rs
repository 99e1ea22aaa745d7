use anyhow::{Context, Result};
use chrono::Local;
use csv::{Writer, WriterBuilder};
use serde::{Deserialize, Serialize};
use serde_json::to_string_pretty;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::types::*;

/// Supported report formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
    Tsv,
    Html,
    All,
}

const TABLE_HEADER: [&str; 14] = [
    "patient_id",
    "drug",
    "timestamp",
    "primary_gene",
    "diplotype",
    "phenotype",
    "activity_score",
    "risk_label",
    "severity",
    "confidence_score",
    "recommendation",
    "detected_variants",
    "vcf_parsing_success",
    "gene_detected",
];

/// Writes analysis reports to an output directory
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(output_dir: &Path) -> Result<Self> {
        if !output_dir.exists() {
            fs::create_dir_all(output_dir).with_context(|| {
                format!("Failed to create output directory {}", output_dir.display())
            })?;
        }

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Generate reports in the requested format(s), returning the written paths
    pub fn generate(&self, reports: &[AnalysisReport], format: ReportFormat) -> Result<Vec<PathBuf>> {
        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

        let written = match format {
            ReportFormat::Json => vec![self.generate_json_report(reports, &stamp)?],
            ReportFormat::Csv => vec![self.generate_table_report(reports, &stamp, b',', "csv")?],
            ReportFormat::Tsv => vec![self.generate_table_report(reports, &stamp, b'\t', "tsv")?],
            ReportFormat::Html => vec![self.generate_html_report(reports, &stamp)?],
            ReportFormat::All => vec![
                self.generate_json_report(reports, &stamp)?,
                self.generate_table_report(reports, &stamp, b',', "csv")?,
                self.generate_table_report(reports, &stamp, b'\t', "tsv")?,
                self.generate_html_report(reports, &stamp)?,
            ],
        };

        Ok(written)
    }

    fn report_path(&self, stamp: &str, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("pgx_report_{}.{}", stamp, extension))
    }

    fn generate_json_report(&self, reports: &[AnalysisReport], stamp: &str) -> Result<PathBuf> {
        let filename = self.report_path(stamp, "json");
        let json_content = to_json_string(reports)?;

        fs::write(&filename, json_content)
            .with_context(|| format!("Failed to write JSON report to {}", filename.display()))?;

        Ok(filename)
    }

    fn generate_table_report(
        &self,
        reports: &[AnalysisReport],
        stamp: &str,
        delimiter: u8,
        extension: &str,
    ) -> Result<PathBuf> {
        let filename = self.report_path(stamp, extension);

        let mut wtr = WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(&filename)
            .with_context(|| format!("Failed to create writer for {}", filename.display()))?;
        write_table(&mut wtr, reports)?;

        Ok(filename)
    }

    fn generate_html_report(&self, reports: &[AnalysisReport], stamp: &str) -> Result<PathBuf> {
        let filename = self.report_path(stamp, "html");

        fs::write(&filename, create_html_content(reports))
            .with_context(|| format!("Failed to write HTML report to {}", filename.display()))?;

        Ok(filename)
    }
}

/// Pretty JSON array of reports, as written by the JSON format and `--stdout`
pub fn to_json_string(reports: &[AnalysisReport]) -> Result<String> {
    to_string_pretty(reports).context("Failed to serialize reports to JSON")
}

/// One flat row per report
pub fn write_table<W: Write>(wtr: &mut Writer<W>, reports: &[AnalysisReport]) -> Result<()> {
    wtr.write_record(TABLE_HEADER)?;

    for report in reports {
        let profile = &report.pharmacogenomic_profile;
        let variants: Vec<String> = profile
            .detected_variants
            .iter()
            .map(|d| format!("{}:{}", d.rsid, d.star_allele))
            .collect();

        let timestamp = report.timestamp.to_rfc3339();
        let activity = profile
            .activity_score
            .map(|s| format!("{:.2}", s))
            .unwrap_or_default();
        let confidence = format!("{:.2}", report.risk_assessment.confidence_score);
        let variants = variants.join("; ");
        let parsed = report.quality_metrics.vcf_parsing_success.to_string();
        let detected = report.quality_metrics.gene_detected.to_string();

        let row: [&str; 14] = [
            &report.patient_id,
            &report.drug,
            &timestamp,
            &profile.primary_gene,
            &profile.diplotype,
            profile.phenotype.abbreviation(),
            &activity,
            report.risk_assessment.risk_label.as_str(),
            report.risk_assessment.severity.as_str(),
            &confidence,
            &report.clinical_recommendation.action,
            &variants,
            &parsed,
            &detected,
        ];
        wtr.write_record(row)?;
    }

    wtr.flush()?;
    Ok(())
}

fn risk_class(risk: RiskLabel) -> &'static str {
    match risk {
        RiskLabel::Safe => "risk-safe",
        RiskLabel::AdjustDosage => "risk-adjust",
        RiskLabel::Ineffective | RiskLabel::Toxic => "risk-alert",
        RiskLabel::Unknown => "risk-unknown",
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn create_html_content(reports: &[AnalysisReport]) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let mut rows = String::new();
    for report in reports {
        let profile = &report.pharmacogenomic_profile;
        rows.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td><td>{}</td></tr>\n",
            risk_class(report.risk_assessment.risk_label),
            escape_html(&report.patient_id),
            escape_html(&report.drug),
            escape_html(&profile.primary_gene),
            escape_html(&profile.diplotype),
            profile.phenotype.description(),
            report.risk_assessment.risk_label,
            report.risk_assessment.severity,
            report.risk_assessment.confidence_score,
            escape_html(&report.clinical_recommendation.action),
        ));
    }

    let table = if reports.is_empty() {
        "<p>No results available.</p>".to_string()
    } else {
        format!(
            "<table>\n<tr><th>Patient</th><th>Drug</th><th>Gene</th><th>Diplotype</th><th>Phenotype</th><th>Risk</th><th>Severity</th><th>Confidence</th><th>Recommendation</th></tr>\n{}</table>",
            rows
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Pharmacogenomic Risk Report</title>
    <style>
        body {{
            font-family: Arial, sans-serif;
            margin: 40px;
            background-color: #f5f5f5;
        }}
        table {{
            width: 100%;
            border-collapse: collapse;
        }}
        th, td {{
            border: 1px solid #ddd;
            padding: 10px;
            text-align: left;
        }}
        th {{
            background-color: #3498db;
            color: white;
        }}
        .risk-safe {{ background-color: #d4edda; }}
        .risk-adjust {{ background-color: #fff3cd; }}
        .risk-alert {{ background-color: #f8d7da; }}
    </style>
</head>
<body>
    <h1>Pharmacogenomic Risk Report</h1>
    <p>Generated on: {}</p>
    <p>{} drug evaluation(s).</p>
    {}
</body>
</html>"#,
        timestamp,
        reports.len(),
        table
    )
}
