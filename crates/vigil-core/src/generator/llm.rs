//! LLM-backed recommendation generator.
//!
//! Builds a prompt from the patient record, asks the provider for a JSON
//! array of recommendations, and parses the reply. Models often wrap JSON in
//! markdown fences or add prose around it, so the parser looks for the array
//! rather than expecting a bare document.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use vigil_types::config::GeneratorConfig;
use vigil_types::errors::VigilError;
use vigil_types::traits::{LlmProvider, RecommendationGenerator};
use vigil_types::{ChatMessage, ChatRole, CompletionRequest, PatientRecord, TreatmentRecommendation};

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)```").expect("code fence pattern is valid")
});

const SYSTEM_PROMPT: &str = "You are a medical treatment assistant. Propose treatment \
recommendations for the patient described by the user. Every recommendation will be \
reviewed: high and critical risk items require explicit physician confirmation, so \
assess risk conservatively.

Respond with a JSON array only. Each element must have these fields:
- \"name\": short treatment name
- \"category\": one of medication, procedure, therapy, surgery, lifestyle
- \"description\": what the treatment involves
- \"rationale\": why it fits this patient
- \"risk_level\": one of low, medium, high, critical
- \"interactions\": array of known interactions with the patient's current therapy
- \"alternatives\": array of alternative treatments";

/// Asks an LLM provider for recommendations.
pub struct LlmRecommendationGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl LlmRecommendationGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &GeneratorConfig) -> Self {
        Self {
            provider,
            model: config.primary_model().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn build_request(&self, patient: &PatientRecord) -> CompletionRequest {
        CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: patient_prompt(patient),
            }],
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
        }
    }
}

#[async_trait]
impl RecommendationGenerator for LlmRecommendationGenerator {
    async fn generate(
        &self,
        patient: &PatientRecord,
    ) -> Result<Vec<TreatmentRecommendation>, VigilError> {
        let response = self
            .provider
            .complete(self.build_request(patient))
            .await
            .map_err(|e| VigilError::Generation(e.to_string()))?;

        tracing::debug!(
            patient = %patient.patient_id,
            model = %response.model,
            output_tokens = response.usage.output_tokens,
            "LLM recommendations received"
        );

        parse_recommendations(&response.content)
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Render the patient record as the user turn.
pub fn patient_prompt(patient: &PatientRecord) -> String {
    let mut prompt = format!(
        "Patient: {} (ID {}), age {}\n\
         Conditions: {}\n\
         Current medications: {}\n\
         Allergies: {}\n",
        patient.name,
        patient.patient_id,
        patient.age,
        list_or_none(&patient.conditions),
        list_or_none(&patient.medications),
        list_or_none(&patient.allergies),
    );
    if !patient.medical_history.trim().is_empty() {
        prompt.push_str(&format!("Medical history: {}\n", patient.medical_history.trim()));
    }
    prompt.push_str("\nRecommend treatments for this patient.");
    prompt
}

/// Parse an LLM reply into recommendations.
///
/// Accepts a bare JSON array, an array inside a code fence, an array embedded
/// in prose, or an object with a `recommendations` array. Enum values are
/// matched case-insensitively. Recommendations without an id get `TRT-###` in
/// reply order.
pub fn parse_recommendations(content: &str) -> Result<Vec<TreatmentRecommendation>, VigilError> {
    let value = extract_json(content).ok_or_else(|| {
        VigilError::Generation("LLM reply did not contain a JSON recommendation list".to_string())
    })?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("recommendations") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(VigilError::Generation(
                    "LLM reply object has no 'recommendations' array".to_string(),
                ))
            }
        },
        _ => {
            return Err(VigilError::Generation(
                "LLM reply is not a JSON array".to_string(),
            ))
        }
    };

    let mut recommendations = Vec::with_capacity(items.len());
    for (index, mut item) in items.into_iter().enumerate() {
        normalize_enum_field(&mut item, "risk_level");
        normalize_enum_field(&mut item, "category");

        let mut recommendation: TreatmentRecommendation =
            serde_json::from_value(item).map_err(|e| {
                VigilError::Generation(format!("recommendation {} is malformed: {e}", index + 1))
            })?;

        if recommendation.name.trim().is_empty() {
            return Err(VigilError::Generation(format!(
                "recommendation {} has an empty name",
                index + 1
            )));
        }
        if recommendation.treatment_id.trim().is_empty() {
            recommendation.treatment_id = format!("TRT-{:03}", index + 1);
        }
        recommendations.push(recommendation);
    }

    Ok(recommendations)
}

fn extract_json(content: &str) -> Option<Value> {
    let mut candidates: Vec<&str> = CODE_FENCE
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    candidates.push(content);

    for candidate in candidates {
        let trimmed = candidate.trim();
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return Some(value);
        }
        if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
            if start < end {
                if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                    return Some(value);
                }
            }
        }
    }
    None
}

fn normalize_enum_field(item: &mut Value, field: &str) {
    if let Some(Value::String(s)) = item.get_mut(field) {
        *s = s.trim().to_lowercase();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::catalog::builtin_patient;
    use std::sync::Mutex;
    use vigil_types::{CompletionResponse, RiskLevel, TokenUsage, TreatmentCategory};

    struct MockProvider {
        reply: String,
        failure: Option<fn() -> VigilError>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl MockProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: text.to_string(),
                failure: None,
                requests: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, VigilError> {
            self.requests.lock().unwrap().push(request);
            if let Some(fail) = self.failure {
                return Err(fail());
            }
            Ok(CompletionResponse {
                content: self.reply.clone(),
                model: "mock".to_string(),
                usage: TokenUsage::default(),
            })
        }
    }

    const TWO_ITEMS: &str = r#"[
        {"name": "Metformin 500mg", "category": "medication", "description": "Oral",
         "risk_level": "low", "interactions": [], "alternatives": ["Sulfonylureas"]},
        {"name": "Coronary Angioplasty", "category": "Procedure", "description": "Stent",
         "rationale": "Blockage", "risk_level": "HIGH"}
    ]"#;

    #[test]
    fn test_parse_bare_array_assigns_ids() {
        let recs = parse_recommendations(TWO_ITEMS).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].treatment_id, "TRT-001");
        assert_eq!(recs[1].treatment_id, "TRT-002");
        assert_eq!(recs[1].risk_level, RiskLevel::High);
        assert_eq!(recs[1].category, TreatmentCategory::Procedure);
        assert!(recs[1].alternatives.is_empty());
    }

    #[test]
    fn test_parse_code_fenced_reply() {
        let reply = format!("Here are my recommendations:\n```json\n{TWO_ITEMS}\n```\nLet me know.");
        let recs = parse_recommendations(&reply).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].name, "Metformin 500mg");
    }

    #[test]
    fn test_parse_array_embedded_in_prose() {
        let reply = format!("Sure. {TWO_ITEMS} Hope this helps.");
        assert_eq!(parse_recommendations(&reply).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_wrapped_object_keeps_given_ids() {
        let reply = r#"{"recommendations": [
            {"treatment_id": "RX-9", "name": "Walking", "category": "lifestyle",
             "description": "30 minutes daily", "risk_level": "low"}
        ]}"#;
        let recs = parse_recommendations(reply).unwrap();
        assert_eq!(recs[0].treatment_id, "RX-9");
        assert_eq!(recs[0].category, TreatmentCategory::Lifestyle);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_recommendations("I cannot help with that.").unwrap_err();
        assert!(matches!(err, VigilError::Generation(_)));

        let err = parse_recommendations(r#"[{"name": "X", "category": "medication",
            "description": "d", "risk_level": "extreme"}]"#)
        .unwrap_err();
        assert!(err.to_string().contains("recommendation 1"));
    }

    #[test]
    fn test_parse_empty_list_is_valid() {
        assert!(parse_recommendations("[]").unwrap().is_empty());
    }

    #[test]
    fn test_patient_prompt_lists_record() {
        let prompt = patient_prompt(&builtin_patient());
        assert!(prompt.contains("John Doe (ID P12345), age 67"));
        assert!(prompt.contains("Allergies: Penicillin, Sulfa drugs"));
        assert!(prompt.contains("Medical history: History of myocardial infarction"));
    }

    #[tokio::test]
    async fn test_generate_sends_configured_model() {
        let provider = Arc::new(MockProvider::replying(TWO_ITEMS));
        let config = GeneratorConfig::default();
        let generator = LlmRecommendationGenerator::new(provider.clone(), &config);

        let recs = generator.generate(&builtin_patient()).await.unwrap();
        assert_eq!(recs.len(), 2);

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4o-mini");
        assert_eq!(requests[0].temperature, Some(0.0));
        assert!(requests[0].system.contains("JSON array"));
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_generation_error() {
        let provider = Arc::new(MockProvider {
            failure: Some(|| VigilError::RateLimitExceeded("429".to_string())),
            ..MockProvider::replying("")
        });
        let generator = LlmRecommendationGenerator::new(provider, &GeneratorConfig::default());

        let err = generator.generate(&builtin_patient()).await.unwrap_err();
        match err {
            VigilError::Generation(msg) => assert!(msg.contains("rate limit")),
            other => panic!("Expected Generation error, got: {other:?}"),
        }
    }
}
