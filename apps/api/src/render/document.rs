//! Declarative page model for the persona PDF.
//!
//! `compose_document` decides *what* goes on each page from the shape of a
//! `GenerationResult`; `render::pdf` decides where it lands. Every section is
//! optional and is left out when its data is missing.

use chrono::DateTime;

use crate::personas::result::{GenerationResult, InterviewGuide, Persona, SurveyGuide};

pub const BRAND: &str = "Persona Builder";

const MAX_OVERVIEW_BEHAVIORS: usize = 3;
const MAX_OVERVIEW_QUOTES: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStyle {
    /// Centered title page without footer.
    Cover,
    /// Header, flowing blocks, footer with page number.
    Content,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub style: PageStyle,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Large centered cover text.
    CoverTitle(String),
    CoverLine(String),
    /// Page title with a muted subtitle underneath.
    PageHeader { title: String, subtitle: String },
    /// Shaded band carrying a persona's type and tagline.
    Banner { title: String, subtitle: Option<String> },
    Heading(String),
    Label(String),
    Paragraph(String),
    LabelValue { label: String, value: String },
    Bullets(Vec<String>),
    Quote(String),
    Columns { left: Vec<Block>, right: Vec<Block> },
}

impl Page {
    fn content(blocks: Vec<Block>) -> Self {
        Self {
            style: PageStyle::Content,
            blocks,
        }
    }
}

pub fn compose_document(result: &GenerationResult) -> Document {
    let total = result.personas.len();
    let mut pages = vec![cover_page(result)];

    for (index, persona) in result.personas.iter().enumerate() {
        pages.push(overview_page(persona, index, total, &result.product_name));
        pages.push(details_page(persona, index, &result.product_name));
    }
    let sections = result.output_sections();
    if let Some(guide) = result.interview_guide.as_ref().filter(|_| sections.interview_guide) {
        pages.push(interview_guide_page(guide, &result.product_name));
    }
    if let Some(survey) = result.survey_guide.as_ref().filter(|_| sections.survey) {
        pages.push(survey_page(survey, &result.product_name));
    }

    Document { pages }
}

fn cover_page(result: &GenerationResult) -> Page {
    let mut blocks = vec![
        Block::CoverTitle("User Personas".to_string()),
        Block::CoverLine(result.product_name.clone()),
        Block::CoverLine(format!("{} Personas Generated", result.personas.len())),
    ];
    if let Some(date) = result.generated_at.as_deref().and_then(format_date) {
        blocks.push(Block::CoverLine(format!("Generated on {date}")));
    }
    blocks.push(Block::CoverLine(format!("Powered by {BRAND}")));
    Page {
        style: PageStyle::Cover,
        blocks,
    }
}

fn overview_page(persona: &Persona, index: usize, total: usize, product_name: &str) -> Page {
    let mut blocks = vec![
        Block::PageHeader {
            title: format!("Persona {} of {}", index + 1, total),
            subtitle: product_name.to_string(),
        },
        Block::Banner {
            title: persona.title(index),
            subtitle: persona.tagline.clone(),
        },
    ];

    let mut background = Vec::new();
    if let Some(bg) = &persona.background {
        section(&mut background, "Background", {
            let mut b = Vec::new();
            push_paragraph(&mut b, bg.summary.as_deref());
            push_label_value(&mut b, "Work Context", bg.work_context.as_deref());
            push_label_value(&mut b, "Domain Familiarity", bg.domain_familiarity.as_deref());
            b
        });
    }
    let mut demographics = Vec::new();
    if let Some(d) = &persona.demographics {
        section(&mut demographics, "Demographics", {
            let mut b = Vec::new();
            push_label_value(&mut b, "Age Range", d.age_range.as_deref());
            push_label_value(&mut b, "Location", d.location.as_deref());
            push_label_value(&mut b, "Gender", d.gender.as_deref());
            push_label_value(&mut b, "Education", d.education.as_deref());
            push_label_value(&mut b, "Income", d.income_range.as_deref());
            b
        });
    }
    push_row(&mut blocks, background, demographics);

    let mut goals = Vec::new();
    if let Some(g) = &persona.goals {
        section(&mut goals, "Goals & Outcomes", {
            let mut b = Vec::new();
            push_bullets(&mut b, &g.primary);
            push_label_value(&mut b, "Success Looks Like", g.success_definition.as_deref());
            b
        });
    }
    let mut pains = Vec::new();
    if let Some(p) = &persona.pain_points {
        section(&mut pains, "Pain Points", bullets_only(&p.challenges));
    }
    push_row(&mut blocks, goals, pains);

    let mut behaviors = Vec::new();
    if let Some(b) = &persona.behaviors {
        section(&mut behaviors, "Behaviors & Habits", {
            let mut out = Vec::new();
            push_bullets(
                &mut out,
                &b.routines[..b.routines.len().min(MAX_OVERVIEW_BEHAVIORS)],
            );
            push_list_value(&mut out, "Preferred Channels", &b.preferred_channels, ", ");
            out
        });
    }
    let mut needs = Vec::new();
    if let Some(n) = &persona.needs {
        section(&mut needs, "Core Needs", bullets_only(&n.core));
    }
    push_row(&mut blocks, behaviors, needs);

    let quotes: Vec<Block> = persona
        .quotes
        .iter()
        .take(MAX_OVERVIEW_QUOTES)
        .map(|q| Block::Quote(format!("\u{201c}{q}\u{201d}")))
        .collect();
    section(&mut blocks, "Representative Quotes", quotes);

    Page::content(blocks)
}

fn details_page(persona: &Persona, index: usize, product_name: &str) -> Page {
    let mut blocks = vec![Block::PageHeader {
        title: format!("{} - Details", persona.title(index)),
        subtitle: product_name.to_string(),
    }];

    let mut motivations = Vec::new();
    if let Some(m) = &persona.motivations {
        section(&mut motivations, "Motivations & Drivers", {
            let mut b = Vec::new();
            push_list_value(&mut b, "Intrinsic Motivators", &m.intrinsic, ", ");
            push_list_value(&mut b, "Extrinsic Motivators", &m.extrinsic, ", ");
            push_list_value(&mut b, "Values", &m.values, ", ");
            b
        });
    }
    let mut technology = Vec::new();
    if let Some(t) = &persona.technology {
        section(&mut technology, "Technology Profile", {
            let mut b = Vec::new();
            push_list_value(&mut b, "Devices", &t.devices, ", ");
            push_list_value(&mut b, "Tools", &t.tools, ", ");
            push_label_value(&mut b, "Tech Comfort", t.tech_comfort.as_deref());
            b
        });
    }
    push_row(&mut blocks, motivations, technology);

    let mut tasks = Vec::new();
    if let Some(t) = &persona.tasks {
        section(&mut tasks, "Key Tasks", {
            let mut b = Vec::new();
            push_bullets(&mut b, &t.primary);
            push_list_value(&mut b, "High-Value Scenarios", &t.high_value_scenarios, "; ");
            b
        });
    }
    let mut context = Vec::new();
    if let Some(c) = &persona.context {
        section(&mut context, "Context of Use", {
            let mut b = Vec::new();
            push_label_value(&mut b, "Environment", c.environment.as_deref());
            push_label_value(&mut b, "Timing", c.timing.as_deref());
            push_list_value(&mut b, "Constraints", &c.constraints, ", ");
            b
        });
    }
    push_row(&mut blocks, tasks, context);

    if let Some(o) = &persona.objections {
        let row = labelled_pair(
            ("Adoption Barriers", &o.barriers),
            ("Switching Costs", &o.switching_costs),
        );
        section(&mut blocks, "Objections & Barriers", row);
    }

    if let Some(i) = &persona.insights {
        let mut b = Vec::new();
        push_bullets(&mut b, &i.key_takeaways);
        if !i.design_implications.is_empty() {
            b.push(Block::Label("Design Implications".to_string()));
            push_bullets(&mut b, &i.design_implications);
        }
        if !i.opportunities.is_empty() {
            b.push(Block::Label("Opportunities".to_string()));
            push_bullets(&mut b, &i.opportunities);
        }
        section(&mut blocks, "Key Insights & Design Implications", b);
    }

    if let Some(a) = &persona.assumptions {
        let row = labelled_pair(("Validated", &a.validated), ("Needs Research", &a.to_research));
        section(&mut blocks, "Assumptions & Research Needs", row);
    }

    Page::content(blocks)
}

fn interview_guide_page(guide: &InterviewGuide, product_name: &str) -> Page {
    let mut blocks = vec![Block::PageHeader {
        title: "Interview Guide".to_string(),
        subtitle: product_name.to_string(),
    }];

    let mut intro = Vec::new();
    push_paragraph(&mut intro, guide.introduction.as_deref());
    section(&mut blocks, "Introduction", intro);
    section(&mut blocks, "Warmup Questions", bullets_only(&guide.warmup_questions));
    for category in &guide.core_questions {
        let heading = category.category.as_deref().unwrap_or("Core Questions");
        section(&mut blocks, heading, bullets_only(&category.questions));
    }
    section(&mut blocks, "Closing Questions", bullets_only(&guide.closing_questions));

    Page::content(blocks)
}

fn survey_page(survey: &SurveyGuide, product_name: &str) -> Page {
    let mut blocks = vec![Block::PageHeader {
        title: survey
            .title
            .clone()
            .unwrap_or_else(|| "Survey Template".to_string()),
        subtitle: product_name.to_string(),
    }];

    for (i, survey_section) in survey.sections.iter().enumerate() {
        let mut b = Vec::new();
        for (n, question) in survey_section.questions.iter().enumerate() {
            let Some(text) = question.question.as_deref() else {
                continue;
            };
            let kind = question
                .kind
                .as_deref()
                .map(|k| format!(" ({k})"))
                .unwrap_or_default();
            b.push(Block::Paragraph(format!("{}. {text}{kind}", n + 1)));
            push_bullets(&mut b, &question.options);
        }
        let heading = survey_section
            .name
            .clone()
            .unwrap_or_else(|| format!("Section {}", i + 1));
        section(&mut blocks, &heading, b);
    }

    Page::content(blocks)
}

// ────────────────────────────────────────────────────────────────────────────
// Block helpers
// ────────────────────────────────────────────────────────────────────────────

/// Appends a heading and its body, or nothing when the body is empty.
fn section(out: &mut Vec<Block>, heading: &str, body: Vec<Block>) {
    if body.is_empty() {
        return;
    }
    out.push(Block::Heading(heading.to_string()));
    out.extend(body);
}

/// Two sections side by side; collapses to a single column when one side is empty.
fn push_row(out: &mut Vec<Block>, left: Vec<Block>, right: Vec<Block>) {
    match (left.is_empty(), right.is_empty()) {
        (true, true) => {}
        (false, true) => out.extend(left),
        (true, false) => out.extend(right),
        (false, false) => out.push(Block::Columns { left, right }),
    }
}

fn labelled_pair(left: (&str, &[String]), right: (&str, &[String])) -> Vec<Block> {
    let column = |(label, items): (&str, &[String])| {
        if items.is_empty() {
            return Vec::new();
        }
        let mut b = vec![Block::Label(label.to_string())];
        push_bullets(&mut b, items);
        b
    };
    let mut out = Vec::new();
    push_row(&mut out, column(left), column(right));
    out
}

fn bullets_only(items: &[String]) -> Vec<Block> {
    let mut b = Vec::new();
    push_bullets(&mut b, items);
    b
}

fn push_bullets(out: &mut Vec<Block>, items: &[String]) {
    if !items.is_empty() {
        out.push(Block::Bullets(items.to_vec()));
    }
}

fn push_paragraph(out: &mut Vec<Block>, text: Option<&str>) {
    if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
        out.push(Block::Paragraph(text.to_string()));
    }
}

fn push_label_value(out: &mut Vec<Block>, label: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        out.push(Block::LabelValue {
            label: label.to_string(),
            value: value.to_string(),
        });
    }
}

fn push_list_value(out: &mut Vec<Block>, label: &str, items: &[String], separator: &str) {
    if !items.is_empty() {
        push_label_value(out, label, Some(&items.join(separator)));
    }
}

/// `2026-03-01T12:00:00.000Z` -> `March 1, 2026`.
fn format_date(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.format("%B %-d, %Y").to_string())
}
