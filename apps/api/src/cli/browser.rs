//! Plain-text view of a finished result: one section per persona, then the guides.

use std::fmt::Write;

use crate::personas::result::{GenerationResult, Persona};

const RULE: &str = "------------------------------------------------------------";

pub fn render_result(result: &GenerationResult) -> String {
    let mut out = String::new();
    let total = result.personas.len();
    let _ = writeln!(out, "{} - {total} personas", result.product_name);

    for (index, persona) in result.personas.iter().enumerate() {
        let _ = writeln!(out, "\n{RULE}\n[{}/{total}] {}", index + 1, persona.title(index));
        render_persona(&mut out, persona);
    }

    if let Some(guide) = &result.interview_guide {
        let _ = writeln!(out, "\n{RULE}\nInterview Guide");
        if let Some(intro) = &guide.introduction {
            let _ = writeln!(out, "{intro}");
        }
        list(&mut out, "Warmup", &guide.warmup_questions);
        for category in &guide.core_questions {
            list(
                &mut out,
                category.category.as_deref().unwrap_or("Core Questions"),
                &category.questions,
            );
        }
        list(&mut out, "Closing", &guide.closing_questions);
    }

    if let Some(survey) = &result.survey_guide {
        let _ = writeln!(
            out,
            "\n{RULE}\n{}",
            survey.title.as_deref().unwrap_or("Survey Template")
        );
        for section in &survey.sections {
            let questions: Vec<String> = section
                .questions
                .iter()
                .filter_map(|q| q.question.clone())
                .collect();
            list(&mut out, section.name.as_deref().unwrap_or("Questions"), &questions);
        }
    }

    out
}

fn render_persona(out: &mut String, persona: &Persona) {
    if let Some(tagline) = &persona.tagline {
        let _ = writeln!(out, "\"{tagline}\"");
    }
    if let Some(summary) = persona.background.as_ref().and_then(|b| b.summary.as_ref()) {
        let _ = writeln!(out, "\n{summary}");
    }
    if let Some(goals) = &persona.goals {
        list(out, "Goals", &goals.primary);
    }
    if let Some(pains) = &persona.pain_points {
        list(out, "Pain points", &pains.challenges);
    }
    if let Some(needs) = &persona.needs {
        list(out, "Core needs", &needs.core);
    }
    let quotes: Vec<String> = persona.quotes.iter().map(|q| format!("\"{q}\"")).collect();
    list(out, "Quotes", &quotes);
}

fn list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{heading}:");
    for item in items {
        let _ = writeln!(out, "  - {item}");
    }
}
