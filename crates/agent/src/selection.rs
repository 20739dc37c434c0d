use concierge_core::domain::booking::{Provider, Service, TimeSlot};

/// Chooses which provider, service and slots a turn works with.
pub trait SelectionPolicy: Send + Sync {
    fn select_service<'a>(&self, providers: &'a [Provider]) -> Option<(&'a Provider, &'a Service)>;

    /// Narrows raw availability to the ordered candidate list, at most `limit` long.
    fn select_slots(&self, slots: Vec<TimeSlot>, limit: usize) -> Vec<TimeSlot>;
}

/// Takes the first provider, its first service, and the first available slots in
/// the order the availability backend returned them. No ranking.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectFirstAvailable;

impl SelectionPolicy for SelectFirstAvailable {
    fn select_service<'a>(&self, providers: &'a [Provider]) -> Option<(&'a Provider, &'a Service)> {
        let provider = providers.first()?;
        let service = provider.services.first()?;
        Some((provider, service))
    }

    fn select_slots(&self, slots: Vec<TimeSlot>, limit: usize) -> Vec<TimeSlot> {
        slots.into_iter().filter(|slot| slot.available).take(limit).collect()
    }
}
