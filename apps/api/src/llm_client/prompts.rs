// Cross-cutting prompt fragments shared by every LLM call.
// The persona prompt itself lives in generation/prompts.rs.

/// System prompt for persona generation. Demands JSON-only output.
pub const RESEARCHER_SYSTEM: &str = "You are an expert user researcher who writes \
    actionable, evidence-grounded user personas for product teams. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";
