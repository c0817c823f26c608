// Broadcast summaries: transcript data collection, LLM generation and persistence.
// All LLM calls go through llm_client, never straight to the Anthropic API.

pub mod collector;
pub mod fallback;
pub mod generator;
pub mod handlers;
pub mod prompts;
pub mod sources;
pub mod store;
