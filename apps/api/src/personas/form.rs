//! The persona request form and the section toggles derived from it.

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::errors::AppError;

pub const MIN_PERSONAS: u8 = 2;
pub const MAX_PERSONAS: u8 = 5;
pub const MAX_COMPETITOR_URLS: usize = 5;

fn default_persona_count() -> u8 {
    3
}

/// Accepts any JSON number and clamps it into the supported range.
/// Fractional counts are truncated.
fn lenient_persona_count<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let count = f64::deserialize(deserializer)?;
    if count.is_nan() {
        return Err(de::Error::custom("personaCount must be a number"));
    }
    Ok(count.clamp(f64::from(MIN_PERSONAS), f64::from(MAX_PERSONAS)) as u8)
}

/// The only user input. Field names follow the client's camelCase JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaFormData {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub website_url: String,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default)]
    pub competitor_urls: Vec<String>,
    #[serde(default)]
    pub job_to_be_done: String,
    #[serde(
        default = "default_persona_count",
        deserialize_with = "lenient_persona_count"
    )]
    pub persona_count: u8,
    #[serde(default)]
    pub include_sections: IncludeSections,
    #[serde(default)]
    pub include_demographics: IncludeDemographics,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncludeSections {
    pub interview_guide: bool,
    pub survey: bool,
    pub journey_map: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncludeDemographics {
    pub age: bool,
    pub location: bool,
    pub gender: bool,
    pub income_range: bool,
}

impl IncludeDemographics {
    pub fn any(&self) -> bool {
        self.age || self.location || self.gender || self.income_range
    }

    /// Human-readable names of the requested fields, in form order.
    pub fn labels(&self) -> Vec<&'static str> {
        [
            (self.age, "age range"),
            (self.location, "location/region"),
            (self.gender, "gender"),
            (self.income_range, "income range"),
        ]
        .into_iter()
        .filter_map(|(on, label)| on.then_some(label))
        .collect()
    }
}

/// Which optional output sections a document carries.
///
/// Built from the form for the prompt, and from the result shape for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputSections {
    pub interview_guide: bool,
    pub survey: bool,
    pub journey_map: bool,
    pub demographics: IncludeDemographics,
}

impl PersonaFormData {
    /// Rejects a form missing the product name or the target audience.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.product_name.trim().is_empty() || self.target_audience.trim().is_empty() {
            return Err(AppError::Validation("Missing required fields".to_string()));
        }
        Ok(())
    }

    /// Trims free-text URLs, drops blank competitor entries, caps competitors and
    /// clamps the persona count into the supported range.
    pub fn normalized(mut self) -> Self {
        self.website_url = self.website_url.trim().to_string();
        self.competitor_urls = self
            .competitor_urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .take(MAX_COMPETITOR_URLS)
            .map(String::from)
            .collect();
        self.persona_count = self.persona_count.clamp(MIN_PERSONAS, MAX_PERSONAS);
        self
    }

    pub fn output_sections(&self) -> OutputSections {
        OutputSections {
            interview_guide: self.include_sections.interview_guide,
            survey: self.include_sections.survey,
            journey_map: self.include_sections.journey_map,
            demographics: self.include_demographics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(json: serde_json::Value) -> PersonaFormData {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_minimal_form_uses_defaults() {
        let data = form(serde_json::json!({
            "productName": "Acme",
            "targetAudience": "freelancers"
        }));
        assert_eq!(data.website_url, "");
        assert!(data.competitor_urls.is_empty());
        assert_eq!(data.persona_count, 3);
        assert!(!data.include_sections.interview_guide);
        assert!(!data.include_demographics.any());
        assert!(data.validate().is_ok());
    }

    #[test]
    fn test_blank_required_fields_fail_validation() {
        let data = form(serde_json::json!({
            "productName": "   ",
            "targetAudience": "freelancers"
        }));
        let err = data.validate().unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields");

        let data = form(serde_json::json!({
            "productName": "Acme",
            "targetAudience": ""
        }));
        assert!(data.validate().is_err());
    }

    #[test]
    fn test_normalized_caps_competitors_and_clamps_count() {
        let data = form(serde_json::json!({
            "productName": "Acme",
            "targetAudience": "freelancers",
            "websiteUrl": "  https://acme.test ",
            "competitorUrls": ["a", " ", "b", "c", "d", "e", "f"],
            "personaCount": 9
        }))
        .normalized();
        assert_eq!(data.website_url, "https://acme.test");
        assert_eq!(data.competitor_urls, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(data.persona_count, MAX_PERSONAS);

        let data = form(serde_json::json!({
            "productName": "Acme",
            "targetAudience": "freelancers",
            "personaCount": 0
        }))
        .normalized();
        assert_eq!(data.persona_count, MIN_PERSONAS);
    }

    #[test]
    fn test_persona_count_outside_u8_still_clamps() {
        for (raw, expected) in [
            (serde_json::json!(300), MAX_PERSONAS),
            (serde_json::json!(-1), MIN_PERSONAS),
            (serde_json::json!(3.0), 3),
            (serde_json::json!(4.7), 4),
        ] {
            let data = form(serde_json::json!({
                "productName": "Acme",
                "targetAudience": "freelancers",
                "personaCount": raw
            }));
            assert_eq!(data.persona_count, expected, "personaCount {raw}");
        }
    }

    #[test]
    fn test_demographic_labels_in_form_order() {
        let demographics = IncludeDemographics {
            age: true,
            location: false,
            gender: true,
            income_range: true,
        };
        assert!(demographics.any());
        assert_eq!(
            demographics.labels(),
            vec!["age range", "gender", "income range"]
        );
    }

    #[test]
    fn test_output_sections_mirror_toggles() {
        let data = form(serde_json::json!({
            "productName": "Acme",
            "targetAudience": "freelancers",
            "includeSections": {"interviewGuide": true, "journeyMap": true},
            "includeDemographics": {"incomeRange": true}
        }));
        let sections = data.output_sections();
        assert!(sections.interview_guide);
        assert!(!sections.survey);
        assert!(sections.journey_map);
        assert!(sections.demographics.income_range);
        assert!(!sections.demographics.age);
    }
}
