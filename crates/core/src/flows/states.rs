use serde::{Deserialize, Serialize};

use crate::domain::intent::{ActionTag, Intent};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineVariant {
    /// Books the first available slot without consulting the user's calendar.
    Simple,
    /// Drops candidate slots that conflict with the user's calendar before booking.
    CalendarAware,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnStage {
    ParseIntent,
    Route,
    SearchProviders,
    GetAvailability,
    CheckCalendar,
    CreateBooking,
    Respond,
}

impl TurnStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Respond)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnEvent {
    IntentParsed,
    Routed(Intent),
    ProvidersFound,
    NoProvidersFound,
    SlotsFound,
    NoSlotsFound,
    SlotCleared,
    AllSlotsConflicted,
    BookingCreated,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: TurnStage,
    pub to: TurnStage,
    pub event: TurnEvent,
    pub actions: Vec<ActionTag>,
}
