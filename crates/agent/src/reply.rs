use std::fmt::Write as _;

use concierge_core::domain::booking::{Booking, Provider};

pub const HELP_MESSAGE: &str =
    "I can help you book appointments. Try saying 'Book me a haircut tomorrow at 2pm'";
pub const NO_PROVIDERS_MESSAGE: &str =
    "I couldn't find any providers for your request. Please try a different service or location.";
pub const TURN_ERROR_MESSAGE: &str =
    "I encountered an error while processing your request. Please try again.";
pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "I'm sorry, the appointment booking service is currently unavailable. Please try again later.";

const SUMMARY_PROVIDER_LIMIT: usize = 3;
const SUMMARY_SERVICE_LIMIT: usize = 2;

/// The assistant message a finished turn produces. Exactly one per turn.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply<'a> {
    Confirmation(&'a Booking),
    /// Providers were found but nothing could be booked.
    ProviderSummary { selected: &'a str, providers: &'a [Provider] },
    NoProviders,
    Help,
}

impl Reply<'_> {
    pub fn render(&self) -> String {
        match self {
            Self::Confirmation(booking) => format!(
                "✅ Your appointment is confirmed!\n\n\
                 📍 {}\n\
                 💇 {}\n\
                 📅 {}\n\
                 🎫 Confirmation: {}\n\n\
                 You'll receive a confirmation SMS shortly.",
                booking.provider_name,
                booking.service_name,
                booking.start_time.format("%Y-%m-%d %H:%M"),
                booking.confirmation_code,
            ),
            Self::ProviderSummary { selected, providers } => {
                let mut text = format!(
                    "Found {selected} but no available slots for your preferred time. \
                     Please try a different time.\n\nI found these options for you:\n\n"
                );
                for (index, provider) in providers.iter().take(SUMMARY_PROVIDER_LIMIT).enumerate() {
                    let position = index + 1;
                    let _ = writeln!(text, "{position}. {} - {}", provider.name, provider.address);
                    if !provider.services.is_empty() {
                        let services: Vec<&str> = provider
                            .services
                            .iter()
                            .take(SUMMARY_SERVICE_LIMIT)
                            .map(|service| service.name.as_str())
                            .collect();
                        let _ = writeln!(text, "   Services: {}", services.join(", "));
                    }
                }
                text.trim_end().to_string()
            }
            Self::NoProviders => NO_PROVIDERS_MESSAGE.to_string(),
            Self::Help => HELP_MESSAGE.to_string(),
        }
    }
}
