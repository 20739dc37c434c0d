use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use concierge_core::domain::booking::{
    Booking, BookingRequest, CalendarCheck, Provider, ProviderId, ServiceId, TimeSlot,
};
use concierge_core::domain::intent::IntentResult;
use concierge_core::errors::CollaboratorError;

/// Turns free text into an intent plus entities. Malformed model output should be
/// reported as `Ok(IntentResult::unknown())`, not as an error.
#[async_trait]
pub trait IntentExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    async fn extract(&self, text: &str) -> Result<IntentResult, CollaboratorError>;
}

#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    async fn search_providers(
        &self,
        service: &str,
        location: &str,
    ) -> Result<Vec<Provider>, CollaboratorError>;
}

#[async_trait]
pub trait AvailabilityService: Send + Sync {
    async fn get_availability(
        &self,
        provider_id: &ProviderId,
        service_id: &ServiceId,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, CollaboratorError>;
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    async fn check_conflict(
        &self,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        user_id: &str,
    ) -> Result<CalendarCheck, CollaboratorError>;
}

#[async_trait]
pub trait BookingService: Send + Sync {
    async fn create_booking(&self, request: BookingRequest) -> Result<Booking, CollaboratorError>;
}

/// Everything a turn may call out to.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn IntentExtractor>,
    pub providers: Arc<dyn ProviderDirectory>,
    pub availability: Arc<dyn AvailabilityService>,
    pub calendar: Arc<dyn CalendarService>,
    pub booking: Arc<dyn BookingService>,
}

impl Collaborators {
    /// Uses one backend for the four booking-domain collaborators.
    pub fn from_backend<B>(extractor: Arc<dyn IntentExtractor>, backend: Arc<B>) -> Self
    where
        B: ProviderDirectory + AvailabilityService + CalendarService + BookingService + 'static,
    {
        Self {
            extractor,
            providers: backend.clone(),
            availability: backend.clone(),
            calendar: backend.clone(),
            booking: backend,
        }
    }
}
