pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use config::{AppConfig, ConfigError, LoadOptions};
pub use domain::booking::{
    Booking, BookingId, BookingRequest, BookingStatus, CalendarCheck, CalendarConflict,
    CustomerProfile, Provider, ProviderId, Service, ServiceId, SlotId, TimeSlot,
};
pub use domain::intent::{ActionTag, Entities, Intent, IntentResult};
pub use domain::session::{Channel, Message, Role, Session, SessionId, SessionSummary};
pub use errors::{
    ApplicationError, CollaboratorError, InterfaceError, SessionError, TurnError,
};
pub use flows::{BookingFlow, PipelineVariant, TurnEngine, TurnStage};
