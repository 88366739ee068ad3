// Persona generation: prompt assembly, the model call, response recovery and the
// two delivery modes (SSE stream, background job).
// All LLM calls go through llm_client; nothing here talks to Anthropic directly.

pub mod handlers;
pub mod pipeline;
pub mod prompts;
pub mod response_parser;
pub mod sink;
