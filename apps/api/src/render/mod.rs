// PDF export: compose pages from a generation result, then draw them.
pub mod document;
pub mod handlers;
pub mod metrics;
pub mod pdf;
