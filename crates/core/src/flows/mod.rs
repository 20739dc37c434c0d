pub mod engine;
pub mod states;

pub use engine::{route_intent, BookingFlow, FlowTransitionError, TurnEngine, TurnFlow};
pub use states::{PipelineVariant, TransitionOutcome, TurnEvent, TurnStage};
