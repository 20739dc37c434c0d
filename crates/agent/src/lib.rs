//! Turn runtime for the booking concierge.
//!
//! One user message runs through a fixed pipeline: intent extraction, routing,
//! provider search, availability lookup, an optional calendar check, and booking
//! creation. Every external system sits behind a trait in `tools`, so the
//! pipeline can run against the fixture catalog, a hosted model, or scripted fakes.
//!
//! # Key Types
//!
//! - `TurnExecutor` - drives one turn through the stage machine (see `runtime`)
//! - `ConversationService` - session-aware entry point used by transports
//! - `Collaborators` - the bundle of extractor, directory, availability,
//!   calendar and booking backends
//!
//! The language model only classifies text. It never chooses providers, slots
//! or bookings; those come from the collaborators and the selection policy.

pub mod assembly;
pub mod conversation;
pub mod fixtures;
pub mod llm;
pub mod reply;
pub mod runtime;
pub mod selection;
pub mod service;
pub mod tools;

pub use assembly::{build_executor, AssemblyError};
pub use conversation::KeywordIntentExtractor;
pub use fixtures::FixtureCatalog;
pub use llm::{AnthropicClient, LlmClient, LlmIntentExtractor};
pub use runtime::{ExecutorSettings, TurnExecutor, TurnInput, TurnOutcome};
pub use selection::{SelectFirstAvailable, SelectionPolicy};
pub use service::{ConversationService, TurnRequest, TurnResponse};
pub use tools::Collaborators;
