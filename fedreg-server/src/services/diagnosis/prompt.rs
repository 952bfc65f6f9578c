//! Radiology prompt sent alongside the chest image

/// Build the prompt for one request
pub fn build_prompt(clinical_info: &str) -> String {
    format!(
        "You are an experienced radiologist. Analyze the following pulmonary tuberculosis \
image together with the clinical information.

Clinical information: {clinical_info}

Write a professional diagnosis report with these sections:
1. Whether the patient shows signs of disease
2. Image description
3. Radiological findings
4. Diagnostic opinion
5. Recommendations

Requirements:
1. Use precise, professional medical language.
2. End the report with \"Reporting physician: Attending Radiologist, AI Assistant\" and \
\"Reviewing physician: Associate Chief Radiologist, AI Assistant\".
3. Write the entire report in English.
4. Separate the sections into paragraphs."
    )
}
