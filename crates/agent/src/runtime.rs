use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use concierge_core::config::WorkflowConfig;
use concierge_core::domain::booking::{Booking, BookingRequest, CustomerProfile, Provider, TimeSlot};
use concierge_core::domain::intent::{ActionTag, Entities, Intent, IntentResult};
use concierge_core::domain::session::SessionId;
use concierge_core::errors::{CollaboratorError, TurnError};
use concierge_core::flows::{BookingFlow, PipelineVariant, TurnEngine, TurnEvent, TurnStage};
use concierge_store::clock::{Clock, SystemClock};

use crate::reply::{Reply, TURN_ERROR_MESSAGE};
use crate::selection::{SelectFirstAvailable, SelectionPolicy};
use crate::tools::Collaborators;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub variant: PipelineVariant,
    pub collaborator_timeout: Duration,
    pub max_candidate_slots: usize,
    pub customer: CustomerProfile,
}

impl From<&WorkflowConfig> for ExecutorSettings {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            variant: config.variant,
            collaborator_timeout: config.collaborator_timeout(),
            max_candidate_slots: config.max_candidate_slots,
            customer: config.customer.clone(),
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from(&WorkflowConfig::default())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnInput {
    pub message: String,
    pub user_id: String,
    pub session_id: SessionId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub reply: String,
    pub actions_taken: Vec<ActionTag>,
    pub intent: Intent,
    pub booking: Option<Booking>,
}

impl TurnOutcome {
    fn failed() -> Self {
        Self {
            reply: TURN_ERROR_MESSAGE.to_string(),
            actions_taken: vec![ActionTag::Error],
            intent: Intent::Unknown,
            booking: None,
        }
    }
}

/// Working state of one turn. Owned by a single `run_turn` call.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnContext {
    pub input: TurnInput,
    pub intent: Intent,
    pub entities: Entities,
    pub search_results: Vec<Provider>,
    pub selected_provider: Option<String>,
    pub available_slots: Vec<TimeSlot>,
    pub booking: Option<Booking>,
    pub actions_taken: Vec<ActionTag>,
}

impl TurnContext {
    pub fn new(input: TurnInput) -> Self {
        Self {
            input,
            intent: Intent::Unknown,
            entities: Entities::default(),
            search_results: Vec::new(),
            selected_provider: None,
            available_slots: Vec::new(),
            booking: None,
            actions_taken: Vec::new(),
        }
    }

    fn reply(&self) -> Reply<'_> {
        if let Some(booking) = &self.booking {
            return Reply::Confirmation(booking);
        }
        if self.intent == Intent::Unknown {
            return Reply::Help;
        }
        let Some(first) = self.search_results.first() else {
            return Reply::NoProviders;
        };
        let selected = self.selected_provider.as_deref().unwrap_or(first.name.as_str());
        Reply::ProviderSummary { selected, providers: &self.search_results }
    }
}

/// Runs a single user turn through the booking stage machine.
///
/// Stages run strictly one after another. Every collaborator call is bounded by
/// `collaborator_timeout`. An extractor failure degrades to the `unknown` intent;
/// any other collaborator failure ends the turn with the generic apology and the
/// `error` action tag. Nothing escapes `run_turn`.
pub struct TurnExecutor {
    engine: TurnEngine<BookingFlow>,
    collaborators: Collaborators,
    selection: Arc<dyn SelectionPolicy>,
    settings: ExecutorSettings,
    clock: Arc<dyn Clock>,
}

impl TurnExecutor {
    pub fn new(collaborators: Collaborators, settings: ExecutorSettings) -> Self {
        Self {
            engine: TurnEngine::new(BookingFlow::new(settings.variant)),
            collaborators,
            selection: Arc::new(SelectFirstAvailable),
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_selection(mut self, selection: Arc<dyn SelectionPolicy>) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn variant(&self) -> PipelineVariant {
        self.engine.variant()
    }

    pub fn extractor_name(&self) -> &'static str {
        self.collaborators.extractor.name()
    }

    pub async fn run_turn(&self, input: TurnInput) -> TurnOutcome {
        let started = Instant::now();
        let session_id = input.session_id.clone();
        let mut context = TurnContext::new(input);

        match self.execute(&mut context).await {
            Ok(()) => {
                let reply = context.reply().render();
                info!(
                    event_name = "turn.completed",
                    session_id = %session_id,
                    intent = context.intent.as_str(),
                    actions = ?context.actions_taken,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "turn completed"
                );
                TurnOutcome {
                    reply,
                    actions_taken: context.actions_taken,
                    intent: context.intent,
                    booking: context.booking,
                }
            }
            Err(error) => {
                warn!(
                    event_name = "turn.failed",
                    session_id = %session_id,
                    error = %error,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "turn failed; replying with generic error"
                );
                TurnOutcome::failed()
            }
        }
    }

    async fn execute(&self, context: &mut TurnContext) -> Result<(), TurnError> {
        let mut stage = self.engine.initial_stage();

        while !stage.is_terminal() {
            debug!(
                event_name = "turn.stage_entered",
                session_id = %context.input.session_id,
                stage = ?stage,
                "entering turn stage"
            );

            let event = match stage {
                TurnStage::ParseIntent => self.parse_intent(context).await,
                TurnStage::Route => TurnEvent::Routed(context.intent),
                TurnStage::SearchProviders => self.search_providers(context).await?,
                TurnStage::GetAvailability => self.get_availability(context).await?,
                TurnStage::CheckCalendar => self.check_calendar(context).await?,
                TurnStage::CreateBooking => self.create_booking(context).await?,
                TurnStage::Respond => break,
            };

            let outcome = self.engine.apply(&stage, &event)?;
            context.actions_taken.extend(outcome.actions);
            stage = outcome.to;
        }

        Ok(())
    }

    async fn parse_intent(&self, context: &mut TurnContext) -> TurnEvent {
        let extractor = &self.collaborators.extractor;
        let result = self
            .bounded("intent_extractor", extractor.extract(&context.input.message))
            .await
            .unwrap_or_else(|error| {
                warn!(
                    event_name = "turn.intent_fallback",
                    session_id = %context.input.session_id,
                    error = %error,
                    "intent extraction failed; treating message as unknown"
                );
                IntentResult::unknown()
            });

        context.intent = result.intent;
        context.entities = result.entities;
        TurnEvent::IntentParsed
    }

    async fn search_providers(&self, context: &mut TurnContext) -> Result<TurnEvent, TurnError> {
        let service = context.entities.service_or_default().to_string();
        let location = context.entities.location_or_default().to_string();

        let providers = self
            .bounded(
                "provider_search",
                self.collaborators.providers.search_providers(&service, &location),
            )
            .await?;

        context.search_results = providers;
        Ok(if context.search_results.is_empty() {
            TurnEvent::NoProvidersFound
        } else {
            TurnEvent::ProvidersFound
        })
    }

    async fn get_availability(&self, context: &mut TurnContext) -> Result<TurnEvent, TurnError> {
        let Some((provider, service)) = self.selection.select_service(&context.search_results)
        else {
            context.selected_provider = context.search_results.first().map(|p| p.name.clone());
            return Ok(TurnEvent::NoSlotsFound);
        };
        let provider_id = provider.id.clone();
        let service_id = service.id.clone();
        context.selected_provider = Some(provider.name.clone());

        let date = resolve_date(context.entities.datetime_or_default(), self.today());
        let slots = self
            .bounded(
                "availability",
                self.collaborators.availability.get_availability(&provider_id, &service_id, date),
            )
            .await?;

        context.available_slots =
            self.selection.select_slots(slots, self.settings.max_candidate_slots);
        Ok(if context.available_slots.is_empty() {
            TurnEvent::NoSlotsFound
        } else {
            TurnEvent::SlotsFound
        })
    }

    async fn check_calendar(&self, context: &mut TurnContext) -> Result<TurnEvent, TurnError> {
        let candidates = std::mem::take(&mut context.available_slots);

        for (index, slot) in candidates.iter().enumerate() {
            let check = self
                .bounded(
                    "calendar",
                    self.collaborators.calendar.check_conflict(
                        slot.start_time,
                        slot.end_time,
                        &context.input.user_id,
                    ),
                )
                .await?;

            if check.available {
                context.available_slots = candidates[index..].to_vec();
                return Ok(TurnEvent::SlotCleared);
            }

            debug!(
                event_name = "turn.calendar_conflict",
                session_id = %context.input.session_id,
                slot_id = %slot.id.0,
                conflicts = check.conflicts.len(),
                "candidate slot conflicts with the user's calendar"
            );
        }

        Ok(TurnEvent::AllSlotsConflicted)
    }

    async fn create_booking(&self, context: &mut TurnContext) -> Result<TurnEvent, TurnError> {
        let (provider, service) = self
            .selection
            .select_service(&context.search_results)
            .ok_or_else(|| CollaboratorError::invalid_response("booking", "no service selected"))?;
        let slot = context
            .available_slots
            .first()
            .ok_or_else(|| CollaboratorError::invalid_response("booking", "no slot selected"))?;

        let request = BookingRequest {
            provider_id: provider.id.clone(),
            service_id: service.id.clone(),
            slot_id: slot.id.clone(),
            customer: self.settings.customer.clone(),
        };
        let booking =
            self.bounded("booking", self.collaborators.booking.create_booking(request)).await?;

        context.booking = Some(booking);
        Ok(TurnEvent::BookingCreated)
    }

    async fn bounded<T, F>(
        &self,
        collaborator: &'static str,
        call: F,
    ) -> Result<T, CollaboratorError>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        let timeout = self.settings.collaborator_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout {
                collaborator,
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }
}

/// Maps the extracted datetime phrase onto the day to query: `today`, a leading
/// `YYYY-MM-DD`, otherwise tomorrow.
pub fn resolve_date(datetime: &str, today: NaiveDate) -> NaiveDate {
    let phrase = datetime.trim().to_lowercase();
    if phrase.contains("today") {
        return today;
    }

    let leading_date =
        phrase.get(..10).and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok());
    if let Some(date) = leading_date {
        return date;
    }

    today.succ_opt().unwrap_or(today)
}
