use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tracing::debug;

use concierge_core::domain::booking::{
    Booking, BookingId, BookingRequest, BookingStatus, CalendarCheck, Provider, ProviderId,
    Service, ServiceId, SlotId, TimeSlot,
};
use concierge_core::errors::CollaboratorError;
use concierge_store::clock::{Clock, SystemClock};

use crate::tools::{AvailabilityService, BookingService, CalendarService, ProviderDirectory};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const FIRST_SLOT_HOUR: u32 = 9;
const LAST_SLOT_HOUR: u32 = 17;
const SLOT_MINUTES: i64 = 30;
const DEFAULT_AVAILABILITY_RATIO: f64 = 0.7;

/// In-process stand-in for the provider marketplace: two Antibes shops, random
/// half-hour availability, an always-free calendar and instant confirmations.
pub struct FixtureCatalog {
    providers: Vec<Provider>,
    availability_ratio: f64,
    rng: Mutex<StdRng>,
    clock: Arc<dyn Clock>,
}

impl FixtureCatalog {
    pub fn new() -> Self {
        Self::build(StdRng::from_entropy())
    }

    /// Reproducible availability and confirmation codes.
    pub fn with_seed(seed: u64) -> Self {
        Self::build(StdRng::seed_from_u64(seed))
    }

    fn build(rng: StdRng) -> Self {
        Self {
            providers: default_providers(),
            availability_ratio: DEFAULT_AVAILABILITY_RATIO,
            rng: Mutex::new(rng),
            clock: Arc::new(SystemClock),
        }
    }

    /// Out-of-range ratios are clamped; NaN means no slot is available.
    pub fn with_availability_ratio(mut self, ratio: f64) -> Self {
        self.availability_ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn find_service(
        &self,
        provider_id: &ProviderId,
        service_id: &ServiceId,
    ) -> Option<(&Provider, &Service)> {
        let provider = self.providers.iter().find(|provider| &provider.id == provider_id)?;
        let service = provider.services.iter().find(|service| &service.id == service_id)?;
        Some((provider, service))
    }

    fn confirmation_code(&self) -> String {
        let mut rng = self.rng();
        let suffix: String = (0..6)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        format!("CONF{suffix}")
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderDirectory for FixtureCatalog {
    async fn search_providers(
        &self,
        service: &str,
        location: &str,
    ) -> Result<Vec<Provider>, CollaboratorError> {
        let service = service.trim().to_lowercase();
        let location = location.trim().to_lowercase();

        let matches: Vec<Provider> = self
            .providers
            .iter()
            .filter(|provider| provider.address.to_lowercase().contains(&location))
            .filter(|provider| offers_service(provider, &service))
            .cloned()
            .collect();

        debug!(
            event_name = "fixtures.search",
            service = %service,
            location = %location,
            matches = matches.len(),
            "fixture provider search"
        );
        Ok(matches)
    }
}

#[async_trait]
impl AvailabilityService for FixtureCatalog {
    async fn get_availability(
        &self,
        provider_id: &ProviderId,
        service_id: &ServiceId,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, CollaboratorError> {
        let Some((_, service)) = self.find_service(provider_id, service_id) else {
            return Ok(Vec::new());
        };

        let mut rng = self.rng();
        let mut slots = Vec::new();
        for hour in FIRST_SLOT_HOUR..=LAST_SLOT_HOUR {
            for minute in [0, 30] {
                let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) else {
                    continue;
                };
                let start_time = date.and_time(time);
                slots.push(TimeSlot {
                    id: slot_id(provider_id, service_id, date, hour, minute),
                    start_time,
                    end_time: start_time + Duration::minutes(SLOT_MINUTES),
                    available: rng.gen_bool(self.availability_ratio),
                    price: Some(service.price),
                });
            }
        }
        Ok(slots)
    }
}

#[async_trait]
impl CalendarService for FixtureCatalog {
    async fn check_conflict(
        &self,
        _start_time: NaiveDateTime,
        _end_time: NaiveDateTime,
        _user_id: &str,
    ) -> Result<CalendarCheck, CollaboratorError> {
        Ok(CalendarCheck::free())
    }
}

#[async_trait]
impl BookingService for FixtureCatalog {
    async fn create_booking(&self, request: BookingRequest) -> Result<Booking, CollaboratorError> {
        let (provider, service) = self
            .find_service(&request.provider_id, &request.service_id)
            .ok_or_else(|| CollaboratorError::invalid_response("booking", "unknown service"))?;
        let start_time = parse_slot_start(&request.slot_id)
            .ok_or_else(|| CollaboratorError::invalid_response("booking", "unknown slot"))?;

        let now = self.clock.now();
        Ok(Booking {
            id: BookingId(format!("BOOK_{}", now.timestamp_millis())),
            status: BookingStatus::Confirmed,
            provider_name: provider.name.clone(),
            service_name: service.name.clone(),
            start_time,
            end_time: start_time + Duration::minutes(i64::from(service.duration_minutes)),
            confirmation_code: self.confirmation_code(),
            created_at: now,
        })
    }
}

fn slot_id(
    provider_id: &ProviderId,
    service_id: &ServiceId,
    date: NaiveDate,
    hour: u32,
    minute: u32,
) -> SlotId {
    let date = date.format("%Y-%m-%d");
    SlotId(format!("{}_{}_{date}_{hour}_{minute}", provider_id.0, service_id.0))
}

fn offers_service(provider: &Provider, service: &str) -> bool {
    provider.services.iter().any(|offered| offered.name.to_lowercase().contains(service))
}

fn parse_slot_start(slot_id: &SlotId) -> Option<NaiveDateTime> {
    let mut parts = slot_id.0.rsplitn(4, '_');
    let minute = parts.next()?.parse::<u32>().ok()?;
    let hour = parts.next()?.parse::<u32>().ok()?;
    let date = NaiveDate::parse_from_str(parts.next()?, "%Y-%m-%d").ok()?;
    date.and_hms_opt(hour, minute, 0)
}

fn service(id: &str, name: &str, duration_minutes: u32, euros: i64, provider_id: &str) -> Service {
    Service {
        id: ServiceId(id.to_string()),
        name: name.to_string(),
        duration_minutes,
        price: Decimal::new(euros, 0),
        provider_id: ProviderId(provider_id.to_string()),
        description: None,
    }
}

fn default_providers() -> Vec<Provider> {
    vec![
        Provider {
            id: ProviderId("1".to_string()),
            name: "Salon Elegance Antibes".to_string(),
            kind: "salon".to_string(),
            address: "15 Rue de la République, Antibes".to_string(),
            latitude: 43.5807,
            longitude: 7.1255,
            services: vec![
                service("101", "Haircut", 30, 35, "1"),
                service("102", "Hair Color", 90, 85, "1"),
            ],
            rating: Some(4.8),
        },
        Provider {
            id: ProviderId("2".to_string()),
            name: "Le Barbier d'Antibes".to_string(),
            kind: "barber".to_string(),
            address: "8 Place Nationale, Antibes".to_string(),
            latitude: 43.5812,
            longitude: 7.1260,
            services: vec![
                service("201", "Men's Haircut", 25, 28, "2"),
                service("202", "Beard Trim", 15, 18, "2"),
            ],
            rating: Some(4.9),
        },
    ]
}
