use thiserror::Error;

use crate::domain::intent::{ActionTag, Intent};
use crate::flows::states::{PipelineVariant, TransitionOutcome, TurnEvent, TurnStage};

pub trait TurnFlow {
    fn variant(&self) -> PipelineVariant;
    fn initial_stage(&self) -> TurnStage;
    fn transition(
        &self,
        current: &TurnStage,
        event: &TurnEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookingFlow {
    variant: PipelineVariant,
}

impl BookingFlow {
    pub fn new(variant: PipelineVariant) -> Self {
        Self { variant }
    }

    pub fn simple() -> Self {
        Self::new(PipelineVariant::Simple)
    }

    pub fn calendar_aware() -> Self {
        Self::new(PipelineVariant::CalendarAware)
    }
}

impl Default for BookingFlow {
    fn default() -> Self {
        Self::simple()
    }
}

impl TurnFlow for BookingFlow {
    fn variant(&self) -> PipelineVariant {
        self.variant
    }

    fn initial_stage(&self) -> TurnStage {
        TurnStage::ParseIntent
    }

    fn transition(
        &self,
        current: &TurnStage,
        event: &TurnEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_booking(self.variant, current, event)
    }
}

pub struct TurnEngine<F> {
    flow: F,
}

impl<F> TurnEngine<F>
where
    F: TurnFlow,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn variant(&self) -> PipelineVariant {
        self.flow.variant()
    }

    pub fn initial_stage(&self) -> TurnStage {
        self.flow.initial_stage()
    }

    pub fn apply(
        &self,
        current: &TurnStage,
        event: &TurnEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event)
    }
}

impl Default for TurnEngine<BookingFlow> {
    fn default() -> Self {
        Self::new(BookingFlow::default())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {stage:?} using event {event:?}")]
    InvalidTransition { stage: TurnStage, event: TurnEvent },
}

/// Stage that follows the Route decision for a classified intent.
pub fn route_intent(intent: Intent) -> TurnStage {
    match intent {
        // `check` has no calendar-only path yet and is served by the booking path.
        Intent::Search | Intent::Book | Intent::Check => TurnStage::SearchProviders,
        Intent::Unknown => TurnStage::Respond,
    }
}

fn transition_booking(
    variant: PipelineVariant,
    current: &TurnStage,
    event: &TurnEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use ActionTag::{CheckedAvailability, CreatedBooking, SearchedProviders};
    use TurnEvent::{
        AllSlotsConflicted, BookingCreated, IntentParsed, NoProvidersFound, NoSlotsFound,
        ProvidersFound, Routed, SlotCleared, SlotsFound,
    };
    use TurnStage::{
        CheckCalendar, CreateBooking, GetAvailability, ParseIntent, Respond, Route,
        SearchProviders,
    };

    let (to, actions) = match (current, event) {
        (ParseIntent, IntentParsed) => (Route, Vec::new()),
        (Route, Routed(intent)) => (route_intent(*intent), Vec::new()),
        (SearchProviders, ProvidersFound) => (GetAvailability, vec![SearchedProviders]),
        (SearchProviders, NoProvidersFound) => (Respond, vec![SearchedProviders]),
        (GetAvailability, SlotsFound) => {
            let next = match variant {
                PipelineVariant::Simple => CreateBooking,
                PipelineVariant::CalendarAware => CheckCalendar,
            };
            (next, vec![CheckedAvailability])
        }
        (GetAvailability, NoSlotsFound) => (Respond, vec![CheckedAvailability]),
        (CheckCalendar, SlotCleared) if variant == PipelineVariant::CalendarAware => {
            (CreateBooking, Vec::new())
        }
        (CheckCalendar, AllSlotsConflicted) if variant == PipelineVariant::CalendarAware => {
            (Respond, Vec::new())
        }
        (CreateBooking, BookingCreated) => (Respond, vec![CreatedBooking]),
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                stage: *current,
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}

#[cfg(test)]
mod tests {
    use crate::domain::intent::{ActionTag, Intent};
    use crate::flows::engine::{
        route_intent, BookingFlow, FlowTransitionError, TurnEngine, TurnFlow,
    };
    use crate::flows::states::{PipelineVariant, TurnEvent, TurnStage};

    fn run(engine: &TurnEngine<BookingFlow>, events: &[TurnEvent]) -> (TurnStage, Vec<ActionTag>) {
        let mut stage = engine.initial_stage();
        let mut actions = Vec::new();
        for event in events {
            let outcome = engine.apply(&stage, event).expect("transition should be valid");
            actions.extend(outcome.actions);
            stage = outcome.to;
        }
        (stage, actions)
    }

    #[test]
    fn route_decision_is_pure_per_intent() {
        assert_eq!(route_intent(Intent::Search), TurnStage::SearchProviders);
        assert_eq!(route_intent(Intent::Book), TurnStage::SearchProviders);
        assert_eq!(route_intent(Intent::Check), TurnStage::SearchProviders);
        assert_eq!(route_intent(Intent::Unknown), TurnStage::Respond);
    }

    #[test]
    fn simple_flow_happy_path_records_three_actions() {
        let engine = TurnEngine::default();
        let (stage, actions) = run(
            &engine,
            &[
                TurnEvent::IntentParsed,
                TurnEvent::Routed(Intent::Book),
                TurnEvent::ProvidersFound,
                TurnEvent::SlotsFound,
                TurnEvent::BookingCreated,
            ],
        );

        assert_eq!(stage, TurnStage::Respond);
        assert_eq!(
            actions,
            vec![
                ActionTag::SearchedProviders,
                ActionTag::CheckedAvailability,
                ActionTag::CreatedBooking
            ]
        );
    }

    #[test]
    fn simple_flow_skips_calendar_check() {
        let engine = TurnEngine::new(BookingFlow::simple());
        let outcome = engine
            .apply(&TurnStage::GetAvailability, &TurnEvent::SlotsFound)
            .expect("availability -> booking");
        assert_eq!(outcome.to, TurnStage::CreateBooking);

        let error = engine
            .apply(&TurnStage::CheckCalendar, &TurnEvent::SlotCleared)
            .expect_err("simple flow has no calendar stage");
        assert!(matches!(error, FlowTransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn calendar_aware_flow_inserts_calendar_stage() {
        let engine = TurnEngine::new(BookingFlow::calendar_aware());
        assert_eq!(engine.variant(), PipelineVariant::CalendarAware);

        let (stage, actions) = run(
            &engine,
            &[
                TurnEvent::IntentParsed,
                TurnEvent::Routed(Intent::Search),
                TurnEvent::ProvidersFound,
                TurnEvent::SlotsFound,
                TurnEvent::SlotCleared,
                TurnEvent::BookingCreated,
            ],
        );

        assert_eq!(stage, TurnStage::Respond);
        assert_eq!(actions.len(), 3);
    }

    #[test]
    fn early_exits_record_attempted_work_only() {
        let engine = TurnEngine::default();

        let (_, unknown) =
            run(&engine, &[TurnEvent::IntentParsed, TurnEvent::Routed(Intent::Unknown)]);
        assert!(unknown.is_empty());

        let (_, no_providers) = run(
            &engine,
            &[
                TurnEvent::IntentParsed,
                TurnEvent::Routed(Intent::Book),
                TurnEvent::NoProvidersFound,
            ],
        );
        assert_eq!(no_providers, vec![ActionTag::SearchedProviders]);

        let (_, no_slots) = run(
            &engine,
            &[
                TurnEvent::IntentParsed,
                TurnEvent::Routed(Intent::Book),
                TurnEvent::ProvidersFound,
                TurnEvent::NoSlotsFound,
            ],
        );
        assert_eq!(no_slots, vec![ActionTag::SearchedProviders, ActionTag::CheckedAvailability]);
    }

    #[test]
    fn all_conflicts_end_the_turn_without_booking() {
        let engine = TurnEngine::new(BookingFlow::calendar_aware());
        let outcome = engine
            .apply(&TurnStage::CheckCalendar, &TurnEvent::AllSlotsConflicted)
            .expect("conflicts -> respond");

        assert_eq!(outcome.to, TurnStage::Respond);
        assert!(outcome.actions.is_empty());
    }

    #[test]
    fn respond_is_terminal() {
        let flow = BookingFlow::default();
        assert!(TurnStage::Respond.is_terminal());

        let error = flow
            .transition(&TurnStage::Respond, &TurnEvent::IntentParsed)
            .expect_err("respond accepts no events");
        assert_eq!(
            error,
            FlowTransitionError::InvalidTransition {
                stage: TurnStage::Respond,
                event: TurnEvent::IntentParsed
            }
        );
    }

    #[test]
    fn replay_is_deterministic_for_same_event_sequence() {
        let engine = TurnEngine::new(BookingFlow::calendar_aware());
        let events = [
            TurnEvent::IntentParsed,
            TurnEvent::Routed(Intent::Book),
            TurnEvent::ProvidersFound,
            TurnEvent::SlotsFound,
            TurnEvent::AllSlotsConflicted,
        ];

        assert_eq!(run(&engine, &events), run(&engine, &events));
    }
}
