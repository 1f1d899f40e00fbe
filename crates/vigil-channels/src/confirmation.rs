//! Reviewer-facing rendering of a confirmation prompt.
//!
//! Shared by every text channel so the reviewer sees the same layout on the
//! console and in a scripted transcript.

use vigil_types::ConfirmationPrompt;

/// Banner at the top of every prompt.
pub const PROMPT_BANNER: &str = "MEDICAL TREATMENT CONFIRMATION REQUIRED";

/// Render the full prompt text, ending with the question line.
pub fn render_prompt(prompt: &ConfirmationPrompt) -> String {
    let rec = &prompt.recommendation;
    let risk = rec.risk_level.as_str().to_uppercase();
    let mut out = String::new();

    if let Some(notice) = &prompt.notice {
        out.push_str(&format!("\n{notice} (attempt {})\n", prompt.attempt));
    }

    out.push_str(&format!("\n{PROMPT_BANNER}\n\n"));
    out.push_str(&format!(
        "Patient: {} (ID {}, age {})\n\n",
        prompt.patient_name, prompt.patient_id, prompt.patient_age
    ));
    out.push_str("RECOMMENDED TREATMENT:\n");
    out.push_str(&format!("- Name: {} [{}]\n", rec.name, rec.treatment_id));
    out.push_str(&format!("- Category: {}\n", rec.category));
    out.push_str(&format!("- Description: {}\n", rec.description));
    if !rec.rationale.is_empty() {
        out.push_str(&format!("- Rationale: {}\n", rec.rationale));
    }
    out.push_str(&format!("- Risk Level: {risk}\n"));
    push_list(&mut out, "Interactions", &rec.interactions);
    push_list(&mut out, "Alternatives", &rec.alternatives);

    out.push_str(&format!(
        "\nTHIS TREATMENT REQUIRES EXPLICIT CONFIRMATION DUE TO ITS {risk} RISK LEVEL.\n\n"
    ));
    out.push_str(&question_line(prompt));
    out
}

/// The final line the reviewer answers.
pub fn question_line(prompt: &ConfirmationPrompt) -> String {
    format!(
        "{}, do you confirm this treatment? (yes/no/modify):",
        prompt.reviewer
    )
}

fn push_list(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        out.push_str(&format!("- {label}: none listed\n"));
    } else {
        out.push_str(&format!("- {label}: {}\n", items.join("; ")));
    }
}
