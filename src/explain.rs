//! Natural-language explanation and recommendation collaborator.
//!
//! The risk outcome is final before any of this runs; implementations only
//! add text around it and callers fall back to canned wording on error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Explanation, Phenotype, RiskLabel, Severity};

#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("explanation service request failed: {0}")]
    Transport(String),
    #[error("explanation service returned an unusable response: {0}")]
    InvalidResponse(String),
    #[error("explanation service is not configured")]
    Unavailable,
}

/// Facts handed to the explanation service for one drug
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationRequest {
    pub gene: String,
    pub drug: String,
    pub phenotype: Phenotype,
    /// Formatted as `allele1/allele2`
    pub diplotype: String,
    pub risk: RiskLabel,
    pub severity: Severity,
}

pub trait ExplanationService: Send + Sync {
    fn explain(&self, request: &ExplanationRequest) -> Result<Explanation, ExplainError>;

    fn recommend(&self, request: &ExplanationRequest) -> Result<String, ExplainError>;
}

/// Deterministic text used when no remote service is configured
pub struct OfflineExplainer;

impl ExplanationService for OfflineExplainer {
    fn explain(&self, request: &ExplanationRequest) -> Result<Explanation, ExplainError> {
        Ok(Explanation {
            summary: format!(
                "Patient is a {} of {}, leading to {} usage of {}.",
                request.phenotype, request.gene, request.risk, request.drug
            ),
            biological_mechanism: "Explanation unavailable (no explanation service configured)."
                .to_string(),
            clinical_implication: format!("Analysis suggests {} outcome.", request.risk),
            dosing_rationale: "Based on CPIC guidelines for this phenotype.".to_string(),
        })
    }

    fn recommend(&self, request: &ExplanationRequest) -> Result<String, ExplainError> {
        Ok(default_action(request.risk).to_string())
    }
}

/// Action implied by a risk label alone
pub fn default_action(risk: RiskLabel) -> &'static str {
    match risk {
        RiskLabel::Safe => "Use standard dosing.",
        RiskLabel::AdjustDosage => "Modify the dose or increase monitoring.",
        RiskLabel::Ineffective => "Select an alternative therapy.",
        RiskLabel::Toxic => "Avoid this drug.",
        RiskLabel::Unknown => "Proceed with caution and evaluate further.",
    }
}

/// Explanation substituted when the service fails
pub fn fallback_explanation(request: &ExplanationRequest) -> Explanation {
    Explanation {
        summary: format!("Analysis for {} ({}).", request.drug, request.phenotype),
        biological_mechanism: "Explanation unavailable due to service error.".to_string(),
        clinical_implication: format!("Risk: {}", request.risk),
        dosing_rationale: "Consult CPIC guidelines.".to_string(),
    }
}

/// Recommendation substituted when the service fails
pub fn fallback_recommendation(request: &ExplanationRequest) -> String {
    format!(
        "Recommendation unavailable due to service error. Default action: {}",
        default_action(request.risk)
    )
}

#[cfg(feature = "http")]
pub use http::HttpExplainer;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use crate::config::ExplainerSettings;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tracing::debug;

    const SYSTEM_PROMPT: &str = "You are a helpful assistant that outputs JSON only.";

    /// Client for an OpenAI-compatible chat-completions endpoint
    pub struct HttpExplainer {
        client: reqwest::blocking::Client,
        endpoint: String,
        model: String,
        api_key: String,
    }

    impl HttpExplainer {
        pub fn new(settings: &ExplainerSettings, api_key: &str) -> Result<Self, ExplainError> {
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(settings.timeout_secs))
                .build()
                .map_err(|e| ExplainError::Transport(e.to_string()))?;

            Ok(Self {
                client,
                endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
                model: settings.model.clone(),
                api_key: api_key.to_string(),
            })
        }

        fn complete(&self, prompt: &str) -> Result<Value, ExplainError> {
            let body = json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": prompt },
                ],
                "response_format": { "type": "json_object" },
            });

            debug!("Requesting completion from {}", self.endpoint);
            let response: Value = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .and_then(|r| r.error_for_status())
                .map_err(|e| ExplainError::Transport(e.to_string()))?
                .json()
                .map_err(|e| ExplainError::InvalidResponse(e.to_string()))?;

            message_json(&response)
        }
    }

    /// JSON object carried in the first choice's message content
    fn message_json(response: &Value) -> Result<Value, ExplainError> {
        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ExplainError::InvalidResponse("missing message content".into()))?;

        serde_json::from_str(content).map_err(|e| ExplainError::InvalidResponse(e.to_string()))
    }

    fn explanation_from(data: &Value) -> Explanation {
        Explanation {
            summary: field(data, "summary", "Summary unavailable."),
            biological_mechanism: field(data, "biological_mechanism", "Mechanism unavailable."),
            clinical_implication: field(data, "clinical_implication", "Implication unavailable."),
            dosing_rationale: field(data, "dosing_rationale", "Rationale unavailable."),
        }
    }

    fn recommendation_from(data: &Value) -> String {
        field(data, "recommendation_action", "Recommendation unavailable.")
    }

    fn field(data: &Value, key: &str, missing: &str) -> String {
        data.get(key)
            .and_then(Value::as_str)
            .unwrap_or(missing)
            .to_string()
    }

    fn context_block(request: &ExplanationRequest) -> String {
        format!(
            "Gene: {}\nDrug: {}\nDiplotype: {}\nPhenotype: {}\nComputed Risk: {}\nSeverity: {}",
            request.gene,
            request.drug,
            request.diplotype,
            request.phenotype,
            request.risk,
            request.severity
        )
    }

    impl ExplanationService for HttpExplainer {
        fn explain(&self, request: &ExplanationRequest) -> Result<Explanation, ExplainError> {
            let prompt = format!(
                "You are a Clinical Pharmacogenomics Assistant.\n\
                 Generate a structured clinical explanation for the following result.\n\n\
                 STRICT RULES:\n\
                 1. Adhere to the provided risk ({risk}) and phenotype ({phenotype}).\n\
                 2. DO NOT change the risk label.\n\
                 3. Output MUST be valid JSON with keys: \"summary\", \"biological_mechanism\", \
                 \"clinical_implication\", \"dosing_rationale\".\n\n{context}",
                risk = request.risk,
                phenotype = request.phenotype,
                context = context_block(request),
            );

            let data = self.complete(&prompt)?;
            Ok(explanation_from(&data))
        }

        fn recommend(&self, request: &ExplanationRequest) -> Result<String, ExplainError> {
            let prompt = format!(
                "You are a Clinical Pharmacogenomics Decision Support Assistant.\n\
                 Generate ONLY a clinically actionable recommendation for drug therapy.\n\
                 Follow the provided phenotype and risk exactly and do not reinterpret them.\n\
                 The ONLY allowed JSON key is \"recommendation_action\".\n\n{context}\n\n\
                 Guidance:\n\
                 - Safe: recommend standard dosing.\n\
                 - Adjust Dosage: recommend dose modification or enhanced monitoring.\n\
                 - Ineffective: recommend alternative therapy.\n\
                 - Toxic: recommend avoiding the drug.\n\
                 - Unknown: recommend caution and further evaluation.",
                context = context_block(request),
            );

            let data = self.complete(&prompt)?;
            Ok(recommendation_from(&data))
        }
    }

}
