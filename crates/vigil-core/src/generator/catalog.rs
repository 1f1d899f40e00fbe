//! Built-in recommendation catalog.
//!
//! Lets the whole review pipeline run offline: the reference patient P12345
//! and a fixed pair of recommendations (one low-risk medication, one
//! high-risk procedure).

use async_trait::async_trait;

use vigil_types::errors::VigilError;
use vigil_types::traits::RecommendationGenerator;
use vigil_types::{PatientRecord, RiskLevel, TreatmentCategory, TreatmentRecommendation};

/// The reference patient used when no patient file is given.
pub fn builtin_patient() -> PatientRecord {
    PatientRecord {
        patient_id: "P12345".to_string(),
        name: "John Doe".to_string(),
        age: 67,
        conditions: strings(&[
            "Type 2 Diabetes",
            "Coronary Artery Disease",
            "Hypertension",
        ]),
        medications: strings(&["Lisinopril", "Atorvastatin", "Aspirin"]),
        allergies: strings(&["Penicillin", "Sulfa drugs"]),
        medical_history: "History of myocardial infarction 5 years ago. Appendectomy in 2010."
            .to_string(),
    }
}

/// The built-in recommendation set, in review order.
pub fn builtin_recommendations() -> Vec<TreatmentRecommendation> {
    vec![
        TreatmentRecommendation {
            treatment_id: "TRT-001".to_string(),
            category: TreatmentCategory::Medication,
            name: "Metformin 500mg".to_string(),
            description: "Oral medication taken twice daily".to_string(),
            rationale: "First-line treatment for Type 2 Diabetes with good efficacy and safety profile"
                .to_string(),
            risk_level: RiskLevel::Low,
            interactions: strings(&["May interact with certain contrast dyes used in medical tests"]),
            alternatives: strings(&["Lifestyle modifications", "Sulfonylureas"]),
        },
        TreatmentRecommendation {
            treatment_id: "TRT-002".to_string(),
            category: TreatmentCategory::Procedure,
            name: "Coronary Angioplasty".to_string(),
            description: "Minimally invasive procedure to widen narrowed coronary arteries"
                .to_string(),
            rationale: "Patient has significant coronary artery blockage causing angina symptoms"
                .to_string(),
            risk_level: RiskLevel::High,
            interactions: strings(&["Risk increases with current anticoagulant therapy"]),
            alternatives: strings(&[
                "Medical management with anti-anginal medications",
                "Coronary artery bypass graft",
            ]),
        },
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Generator that always returns the same recommendation set.
#[derive(Debug, Clone)]
pub struct CatalogGenerator {
    recommendations: Vec<TreatmentRecommendation>,
}

impl Default for CatalogGenerator {
    fn default() -> Self {
        Self::new(builtin_recommendations())
    }
}

impl CatalogGenerator {
    pub fn new(recommendations: Vec<TreatmentRecommendation>) -> Self {
        Self { recommendations }
    }
}

#[async_trait]
impl RecommendationGenerator for CatalogGenerator {
    async fn generate(
        &self,
        patient: &PatientRecord,
    ) -> Result<Vec<TreatmentRecommendation>, VigilError> {
        tracing::debug!(
            patient = %patient.patient_id,
            count = self.recommendations.len(),
            "serving catalog recommendations"
        );
        Ok(self.recommendations.clone())
    }
}
