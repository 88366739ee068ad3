// Persona prompt template and the conditional fragments spliced into it.
// The system prompt lives in llm_client::prompts.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::personas::form::{OutputSections, PersonaFormData};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern is valid"));

/// Persona generation prompt. Placeholders are filled by `build_persona_prompt`.
pub const PERSONA_PROMPT_TEMPLATE: &str = r#"You are an expert user researcher with deep experience in creating actionable user personas for product teams. Your task is to analyze the provided information and generate {persona_count} distinct, realistic user personas.

## Context

**Product/Feature:** {product_name}

**Target Audience Description:** {target_audience}
{job_to_be_done}
## Source Information

### Primary Website
{website_content}
{competitor_block}{file_block}
## Instructions

Generate {persona_count} distinct user personas that represent different segments of the target audience. Each persona should be realistic, actionable, and grounded in the provided information.

For each persona, provide the following sections:

{sections}

{demographics_instruction}

## Output Format

Return ONLY valid JSON (no markdown code blocks). Use this exact structure:

{
  "personas": [
    {
      "id": "persona-1",
      "type": "The [Descriptive Name]",
      "tagline": "One sentence archetype",
      "background": {
        "summary": "2 sentence overview",
        "workContext": "Their work environment",
        "domainFamiliarity": "Low/Medium/High"
      },{demographics_schema}
      "role": {
        "title": "Job title",
        "responsibilities": ["Responsibility 1"],
        "teamStructure": "Who they work with",
        "decisionAuthority": "What they decide"
      },
      "goals": {
        "primary": ["Goal 1", "Goal 2"],
        "successDefinition": "What success looks like"
      },
      "motivations": {
        "intrinsic": ["Motivator 1"],
        "extrinsic": ["Motivator 1"],
        "values": ["Value 1", "Value 2"]
      },
      "behaviors": {
        "routines": ["Behavior 1", "Behavior 2"],
        "frequency": "Daily/Weekly/Monthly",
        "preferredChannels": ["Desktop", "Mobile"]
      },
      "painPoints": {
        "challenges": ["Challenge 1", "Challenge 2"],
        "triggers": ["Trigger 1"],
        "concerns": ["Concern 1"]
      },
      "needs": {
        "core": ["Need 1", "Need 2"],
        "mustHaves": ["Must-have 1"],
        "niceToHaves": ["Nice-to-have 1"]
      },
      "tasks": {
        "primary": ["Task 1", "Task 2"],
        "secondary": ["Task 1"],
        "highValueScenarios": ["Scenario 1"]
      },{journey_schema}
      "context": {
        "environment": "Where they use the product",
        "timing": "When they use it",
        "constraints": ["Constraint 1"]
      },
      "technology": {
        "devices": ["Device 1"],
        "tools": ["Tool 1"],
        "techComfort": "Low/Medium/High"
      },
      "communication": {
        "preferredTone": "Tone",
        "terminologyLevel": "Plain/Technical"
      },
      "objections": {
        "barriers": ["Barrier 1"],
        "switchingCosts": ["Cost 1"],
        "requirements": ["Requirement 1"]
      },
      "quotes": ["Quote expressing their main goal or frustration"],
      "scenarios": ["Short narrative of the persona using the product"],
      "insights": {
        "keyTakeaways": ["Insight 1", "Insight 2"],
        "designImplications": ["Implication 1"],
        "opportunities": ["Opportunity 1"]
      },
      "assumptions": {
        "validated": ["Assumption backed by the sources"],
        "toResearch": ["Assumption that needs research"]
      }
    }
  ]{interview_guide_schema}{survey_schema}
}

Guidelines:
1. Make each persona distinctly different
2. Be specific and actionable, not generic
3. Return ONLY the JSON, no explanations
4. Ensure valid JSON format"#;

const DEMOGRAPHICS_NOT_REQUIRED: &str = "**Demographics:** Not required for this output.";

const JOURNEY_SCHEMA: &str = r#"
      "journeySnapshot": {
        "discover": "How they find solutions",
        "evaluate": "How they compare options",
        "adopt": "What gets them started",
        "use": "How they use it day to day",
        "advocate": "What makes them recommend it"
      },"#;

const INTERVIEW_GUIDE_SCHEMA: &str = r#",
  "interviewGuide": {
    "introduction": "Brief intro script",
    "warmupQuestions": ["Question 1", "Question 2"],
    "coreQuestions": [
      {"category": "Goals", "questions": ["Q1", "Q2"]},
      {"category": "Pain Points", "questions": ["Q1", "Q2"]}
    ],
    "closingQuestions": ["Final question"]
  }"#;

const SURVEY_SCHEMA: &str = r#",
  "surveyGuide": {
    "title": "Survey title",
    "sections": [
      {
        "name": "Section name",
        "questions": [
          {"question": "Question text", "type": "multiple-choice", "options": ["Option 1", "Option 2"]},
          {"question": "Question text", "type": "open-ended"}
        ]
      }
    ]
  }"#;

/// Everything the prompt is built from. Content strings are already summarized.
pub struct PromptContext<'a> {
    pub form: &'a PersonaFormData,
    pub website_content: &'a str,
    pub competitor_content: &'a str,
    pub file_content: &'a str,
}

/// Assembles the persona prompt. Pure; cannot fail.
pub fn build_persona_prompt(ctx: &PromptContext<'_>) -> String {
    let form = ctx.form;
    let sections = form.output_sections();

    let job_to_be_done = if form.job_to_be_done.trim().is_empty() {
        String::new()
    } else {
        format!("\n**Job to be Done:** {}\n", form.job_to_be_done.trim())
    };
    let competitor_block = optional_block("### Competitor Analysis", ctx.competitor_content);
    let file_block = optional_block("### Additional Research Materials", ctx.file_content);

    let sections_list = build_sections_list(&sections);
    let demographics_instruction = build_demographics_instruction(&sections);
    let demographics_schema = build_demographics_schema(&sections);
    let persona_count = form.persona_count.to_string();

    // Single pass: substituted text is never scanned for placeholders again.
    PLACEHOLDER
        .replace_all(PERSONA_PROMPT_TEMPLATE, |caps: &Captures<'_>| {
            let value = match &caps[1] {
                "sections" => sections_list.as_str(),
                "demographics_instruction" => demographics_instruction.as_str(),
                "demographics_schema" => demographics_schema.as_str(),
                "journey_schema" if sections.journey_map => JOURNEY_SCHEMA,
                "interview_guide_schema" if sections.interview_guide => INTERVIEW_GUIDE_SCHEMA,
                "survey_schema" if sections.survey => SURVEY_SCHEMA,
                "journey_schema" | "interview_guide_schema" | "survey_schema" => "",
                "persona_count" => persona_count.as_str(),
                "job_to_be_done" => job_to_be_done.as_str(),
                "product_name" => form.product_name.trim(),
                "target_audience" => form.target_audience.trim(),
                "competitor_block" => competitor_block.as_str(),
                "file_block" => file_block.as_str(),
                "website_content" => ctx.website_content,
                _ => &caps[0],
            };
            value.to_string()
        })
        .into_owned()
}

fn optional_block(heading: &str, content: &str) -> String {
    if content.trim().is_empty() {
        String::new()
    } else {
        format!("\n{heading}\n{content}\n")
    }
}

/// Numbered list of persona sections; optional entries appear only when requested.
pub fn build_sections_list(sections: &OutputSections) -> String {
    let entries = [
        (true, "**Persona Header** - Type, tagline/archetype label"),
        (true, "**Background & Context** - Summary, work context, domain familiarity"),
        (
            sections.demographics.any(),
            "**Demographics** - As specified in configuration",
        ),
        (true, "**Role & Responsibilities** - Job title, key responsibilities, team structure"),
        (true, "**Goals & Desired Outcomes** - Primary goals, success definition"),
        (true, "**Motivations & Drivers** - Intrinsic/extrinsic motivators, values"),
        (true, "**Needs & Expectations** - Core needs, must-haves, nice-to-haves"),
        (true, "**Behaviors & Habits** - Routines, frequency, preferred channels"),
        (true, "**Pain Points & Frustrations** - Challenges, triggers, concerns"),
        (true, "**Tasks & Key Use Cases** - Primary/secondary tasks, high-value scenarios"),
        (
            sections.journey_map,
            "**User Journey Snapshot** - Discover, evaluate, adopt, use, advocate stages",
        ),
        (true, "**Context of Use** - Environment, timing, constraints"),
        (true, "**Technology Profile** - Devices, tools, tech comfort level"),
        (true, "**Communication Style** - Preferred tone, terminology level"),
        (true, "**Objections & Barriers** - Adoption barriers, switching costs"),
        (true, "**Representative Quotes** - Voice of user quotes"),
        (true, "**Scenarios** - Mini-story narratives"),
        (true, "**Key Insights** - Takeaways, design implications, opportunities"),
        (true, "**Assumptions** - Validated vs. needs research"),
        (
            sections.interview_guide,
            "**Interview Guide** - Introduction, warmup, core, and closing questions",
        ),
        (sections.survey, "**Survey Template** - Questions organized by section"),
    ];

    entries
        .iter()
        .filter(|(included, _)| *included)
        .enumerate()
        .map(|(i, (_, label))| format!("{}. {}", i + 1, label))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_demographics_instruction(sections: &OutputSections) -> String {
    let labels = sections.demographics.labels();
    if labels.is_empty() {
        DEMOGRAPHICS_NOT_REQUIRED.to_string()
    } else {
        format!("**Demographics to include:** {}", labels.join(", "))
    }
}

fn build_demographics_schema(sections: &OutputSections) -> String {
    let demographics = &sections.demographics;
    if !demographics.any() {
        return String::new();
    }

    let mut fields = Vec::new();
    if demographics.age {
        fields.push(r#""ageRange": "e.g., 28-35""#);
    }
    if demographics.location {
        fields.push(r#""location": "e.g., Urban, US""#);
    }
    if demographics.gender {
        fields.push(r#""gender": "e.g., Any""#);
    }
    if demographics.income_range {
        fields.push(r#""incomeRange": "e.g., $60k-$90k""#);
    }
    fields.push(r#""education": "Education level""#);

    let body = fields
        .iter()
        .map(|f| format!("        {f}"))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("\n      \"demographics\": {{\n{body}\n      }},")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personas::form::{IncludeDemographics, IncludeSections};

    fn form() -> PersonaFormData {
        serde_json::from_value(serde_json::json!({
            "productName": "Acme",
            "targetAudience": "freelancers",
            "personaCount": 2
        }))
        .unwrap()
    }

    fn prompt_for(form: &PersonaFormData, competitors: &str, files: &str) -> String {
        build_persona_prompt(&PromptContext {
            form,
            website_content: "(No website provided)",
            competitor_content: competitors,
            file_content: files,
        })
    }

    #[test]
    fn test_prompt_fills_context_and_leaves_no_placeholders() {
        let prompt = prompt_for(&form(), "", "");
        assert!(prompt.contains("generate 2 distinct, realistic user personas"));
        assert!(prompt.contains("**Product/Feature:** Acme"));
        assert!(prompt.contains("**Target Audience Description:** freelancers"));
        assert!(prompt.contains("### Primary Website\n(No website provided)"));
        assert!(!prompt.contains("Job to be Done"));
        for placeholder in [
            "{persona_count}",
            "{product_name}",
            "{sections}",
            "{demographics_schema}",
            "{journey_schema}",
            "{interview_guide_schema}",
            "{survey_schema}",
            "{website_content}",
            "{file_block}",
        ] {
            assert!(!prompt.contains(placeholder), "left {placeholder} in prompt");
        }
    }

    #[test]
    fn test_optional_source_blocks_only_when_present() {
        let prompt = prompt_for(&form(), "", "");
        assert!(!prompt.contains("### Competitor Analysis"));
        assert!(!prompt.contains("### Additional Research Materials"));

        let prompt = prompt_for(&form(), "## Website: Rival", "## Research Document: a.pdf");
        assert!(prompt.contains("### Competitor Analysis\n## Website: Rival"));
        assert!(prompt.contains("### Additional Research Materials\n## Research Document: a.pdf"));
    }

    #[test]
    fn test_placeholder_text_in_inputs_is_kept_verbatim() {
        let mut data = form();
        data.target_audience = "devs who write {website_content} templates".to_string();
        data.product_name = "Acme {file_block}".to_string();
        let prompt = build_persona_prompt(&PromptContext {
            form: &data,
            website_content: "SITE-BODY {competitor_block}",
            competitor_content: "",
            file_content: "doc mentions {website_content}",
        });
        assert!(prompt.contains("**Target Audience Description:** devs who write {website_content} templates"));
        assert!(prompt.contains("**Product/Feature:** Acme {file_block}"));
        assert!(prompt.contains("### Primary Website\nSITE-BODY {competitor_block}"));
        assert!(prompt.contains("doc mentions {website_content}"));
        assert_eq!(prompt.matches("SITE-BODY").count(), 1);
    }

    #[test]
    fn test_job_to_be_done_line() {
        let mut data = form();
        data.job_to_be_done = "Send invoices quickly".to_string();
        let prompt = prompt_for(&data, "", "");
        assert!(prompt.contains("**Job to be Done:** Send invoices quickly"));
    }

    #[test]
    fn test_default_sections_skip_optional_entries() {
        let list = build_sections_list(&OutputSections::default());
        assert!(list.starts_with("1. **Persona Header**"));
        assert!(!list.contains("Demographics"));
        assert!(!list.contains("Interview Guide"));
        assert!(!list.contains("Survey Template"));
        assert!(!list.contains("Journey Snapshot"));
        assert!(list.ends_with("17. **Assumptions** - Validated vs. needs research"));
    }

    #[test]
    fn test_all_sections_numbered_in_order() {
        let sections = OutputSections {
            interview_guide: true,
            survey: true,
            journey_map: true,
            demographics: IncludeDemographics {
                age: true,
                ..IncludeDemographics::default()
            },
        };
        let list = build_sections_list(&sections);
        assert!(list.contains("3. **Demographics**"));
        assert!(list.contains("11. **User Journey Snapshot**"));
        assert!(list.ends_with("21. **Survey Template** - Questions organized by section"));
    }

    #[test]
    fn test_demographics_instruction() {
        assert_eq!(
            build_demographics_instruction(&OutputSections::default()),
            "**Demographics:** Not required for this output."
        );
        let sections = OutputSections {
            demographics: IncludeDemographics {
                location: true,
                income_range: true,
                ..IncludeDemographics::default()
            },
            ..OutputSections::default()
        };
        assert_eq!(
            build_demographics_instruction(&sections),
            "**Demographics to include:** location/region, income range"
        );
    }

    #[test]
    fn test_schema_blocks_follow_toggles() {
        let prompt = prompt_for(&form(), "", "");
        assert!(!prompt.contains("\"demographics\""));
        assert!(!prompt.contains("\"interviewGuide\""));
        assert!(!prompt.contains("\"surveyGuide\""));
        assert!(!prompt.contains("\"journeySnapshot\""));

        let mut data = form();
        data.include_sections = IncludeSections {
            interview_guide: true,
            survey: true,
            journey_map: true,
        };
        data.include_demographics.gender = true;
        let prompt = prompt_for(&data, "", "");
        assert!(prompt.contains("\"demographics\": {\n        \"gender\": \"e.g., Any\",\n        \"education\""));
        assert!(prompt.contains("\"interviewGuide\""));
        assert!(prompt.contains("\"surveyGuide\""));
        assert!(prompt.contains("\"journeySnapshot\""));
        assert!(!prompt.contains("\"ageRange\""));
    }
}
