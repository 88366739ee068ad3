//! Typed view of a generation result.
//!
//! The pipeline passes the model's JSON through untouched; these types are how the
//! renderer and the terminal client read it. Every section is optional and every
//! field is read leniently: a section of the wrong shape is treated as absent, a
//! bare string where a list is expected becomes a one-item list.

use serde::{Deserialize, Serialize};

use crate::personas::form::{IncludeDemographics, OutputSections};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    #[serde(default, deserialize_with = "lenient::personas")]
    pub personas: Vec<Persona>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub interview_guide: Option<InterviewGuide>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub survey_guide: Option<SurveyGuide>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub product_name: String,
}

impl GenerationResult {
    /// The optional sections this result actually carries.
    pub fn output_sections(&self) -> OutputSections {
        let demographics = self
            .personas
            .iter()
            .filter_map(|p| p.demographics.as_ref())
            .fold(IncludeDemographics::default(), |acc, d| IncludeDemographics {
                age: acc.age || d.age_range.is_some(),
                location: acc.location || d.location.is_some(),
                gender: acc.gender || d.gender.is_some(),
                income_range: acc.income_range || d.income_range.is_some(),
            });

        OutputSections {
            interview_guide: self.interview_guide.is_some(),
            survey: self.survey_guide.is_some(),
            journey_map: self.personas.iter().any(|p| p.journey_snapshot.is_some()),
            demographics,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub demographics: Option<Demographics>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub goals: Option<Goals>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub motivations: Option<Motivations>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub needs: Option<Needs>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub behaviors: Option<Behaviors>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub pain_points: Option<PainPoints>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Tasks>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub journey_snapshot: Option<JourneySnapshot>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub context: Option<UsageContext>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub technology: Option<Technology>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub accessibility: Option<Accessibility>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub communication: Option<Communication>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub objections: Option<Objections>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub quotes: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub scenarios: Vec<String>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub insights: Option<Insights>,
    #[serde(default, deserialize_with = "lenient::section", skip_serializing_if = "Option::is_none")]
    pub assumptions: Option<Assumptions>,
}

impl Persona {
    /// Display name, falling back to the position in the result.
    pub fn title(&self, index: usize) -> String {
        self.kind
            .clone()
            .unwrap_or_else(|| format!("Persona {}", index + 1))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Background {
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub work_context: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub domain_familiarity: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    #[serde(default, deserialize_with = "lenient::text")]
    pub age_range: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub education: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub income_range: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(default, deserialize_with = "lenient::text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub responsibilities: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub team_structure: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub decision_authority: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goals {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub primary: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub success_definition: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Motivations {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub intrinsic: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub extrinsic: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Needs {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub core: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub must_haves: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub nice_to_haves: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Behaviors {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub routines: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub frequency: Option<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub preferred_channels: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PainPoints {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub challenges: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub triggers: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub concerns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tasks {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub primary: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub secondary: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub high_value_scenarios: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneySnapshot {
    #[serde(default, deserialize_with = "lenient::text")]
    pub discover: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub evaluate: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub adopt: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub r#use: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub advocate: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageContext {
    #[serde(default, deserialize_with = "lenient::text")]
    pub environment: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub timing: Option<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technology {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub devices: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub tools: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tech_comfort: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessibility {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub considerations: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub assistive_tech: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Communication {
    #[serde(default, deserialize_with = "lenient::text")]
    pub preferred_tone: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub terminology_level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objections {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub barriers: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub switching_costs: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub key_takeaways: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub design_implications: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub opportunities: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assumptions {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub validated: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub to_research: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewGuide {
    #[serde(default, deserialize_with = "lenient::text")]
    pub introduction: Option<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub warmup_questions: Vec<String>,
    #[serde(default, deserialize_with = "lenient::items")]
    pub core_questions: Vec<QuestionCategory>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub closing_questions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionCategory {
    #[serde(default, deserialize_with = "lenient::text")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyGuide {
    #[serde(default, deserialize_with = "lenient::text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::items")]
    pub sections: Vec<SurveySection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveySection {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::items")]
    pub questions: Vec<SurveyQuestion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyQuestion {
    #[serde(default, deserialize_with = "lenient::text")]
    pub question: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient::text")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub options: Vec<String>,
}

/// Field deserializers that never fail on shape mismatches.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::Persona;

    pub fn section<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Ok(None);
        }
        Ok(serde_json::from_value(value).ok())
    }

    pub fn items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(values) => values
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn personas<'de, D>(deserializer: D) -> Result<Vec<Persona>, D::Error>
    where
        D: Deserializer<'de>,
    {
        items(deserializer)
    }

    pub fn strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(values) => values.into_iter().filter_map(scalar_text).collect(),
            other => scalar_text(other).into_iter().collect(),
        })
    }

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(scalar_text(Value::deserialize(deserializer)?))
    }

    pub fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(text(deserializer)?.unwrap_or_default())
    }

    fn scalar_text(value: Value) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}
