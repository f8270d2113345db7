//! Generation backend implementations.

pub mod anthropic_api;
pub mod mock;
pub mod openai_compat;
pub mod registry;

pub use anthropic_api::{AnthropicConfig, AnthropicGenerationService};
pub use mock::{MockGenerationService, RecordedCall};
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatGenerationService};
pub use registry::GenerationRegistry;
