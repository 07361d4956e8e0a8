use log::error;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Prometheus counters for the rental desk
#[derive(Clone)]
pub struct RentalMetrics {
    registry: Registry,
    /// Requests per route and outcome
    pub requests: IntCounterVec,
    /// Accounts created, by kind (customer, admin)
    pub registrations: IntCounterVec,
    /// Successful logins, by kind
    pub logins: IntCounterVec,
    /// Gateway charges created, by transaction type
    pub payments_created: IntCounterVec,
    /// Transactions moved to settlement
    pub settlements: IntCounter,
    /// Rentals written to history
    pub rentals_recorded: IntCounter,
}

impl RentalMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("rental_desk".to_string()), None)?;

        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Handled API requests"),
            &["route", "outcome"],
        )?;
        let registrations = IntCounterVec::new(
            Opts::new("registrations_total", "Accounts registered"),
            &["kind"],
        )?;
        let logins = IntCounterVec::new(Opts::new("logins_total", "Successful logins"), &["kind"])?;
        let payments_created = IntCounterVec::new(
            Opts::new("payments_created_total", "Gateway charges created"),
            &["transaction_type"],
        )?;
        let settlements = IntCounter::new("settlements_total", "Transactions settled")?;
        let rentals_recorded = IntCounter::new("rentals_recorded_total", "Rentals recorded")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(registrations.clone()))?;
        registry.register(Box::new(logins.clone()))?;
        registry.register(Box::new(payments_created.clone()))?;
        registry.register(Box::new(settlements.clone()))?;
        registry.register(Box::new(rentals_recorded.clone()))?;

        Ok(Self {
            registry,
            requests,
            registrations,
            logins,
            payments_created,
            settlements,
            rentals_recorded,
        })
    }

    /// Count one request against a route
    pub fn observe(&self, route: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        self.requests.with_label_values(&[route, outcome]).inc();
    }

    /// Render all metrics in the text exposition format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            error!("Failed to encode metrics: {:?}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
