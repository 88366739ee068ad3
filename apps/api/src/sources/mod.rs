// Source material for the persona prompt: web pages via the reader API and
// uploaded research documents.

pub mod files;
pub mod reader;
