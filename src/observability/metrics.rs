use metrics::{
    counter, describe_counter, describe_histogram, histogram, Unit,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for the booking engine.
#[derive(Debug, Clone)]
pub struct Metrics {
    initialized: bool,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self { initialized: true }
    }

    pub fn record_booking_created(&self) {
        counter!("booking_sagas_started_total").increment(1);
    }

    pub fn record_booking_confirmed(&self, recovery_confirmed: bool) {
        counter!("booking_sagas_confirmed_total", "recovery" => recovery_confirmed.to_string())
            .increment(1);
    }

    pub fn record_booking_failed(&self, code: &str) {
        counter!("booking_sagas_failed_total", "code" => code.to_string()).increment(1);
    }

    pub fn record_booking_pending_unclear(&self) {
        counter!("booking_sagas_pending_unclear_total").increment(1);
    }

    pub fn record_reservation(&self, nights: u64) {
        counter!("inventory_reservations_total").increment(1);
        histogram!("inventory_reservation_nights").record(nights as f64);
    }

    pub fn record_oversell_rejection(&self) {
        counter!("inventory_oversell_rejections_total").increment(1);
    }

    pub fn record_release(&self, credited: u64) {
        counter!("inventory_releases_total").increment(1);
        histogram!("inventory_release_credited_nights").record(credited as f64);
    }

    pub fn record_holds_reaped(&self, reaped: u64) {
        counter!("inventory_holds_reaped_total").increment(reaped);
    }

    pub fn record_idempotent_replay(&self, service: &str) {
        counter!("idempotent_replays_total", "service" => service.to_string()).increment(1);
    }

    pub fn record_payment(&self, approved: bool) {
        counter!("payments_processed_total", "approved" => approved.to_string()).increment(1);
    }

    pub fn record_recovery_action(&self, action: &str) {
        counter!("recovery_actions_total", "action" => action.to_string()).increment(1);
    }
}

/// Initializes the metrics system and returns the Prometheus handle.
pub fn init_metrics() -> PrometheusHandle {
    let handle = METRICS_HANDLE.get_or_init(|| {
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .expect("Failed to install Prometheus recorder");

        describe_metrics();
        handle
    });

    METRICS.get_or_init(Metrics::new);

    handle.clone()
}

fn describe_metrics() {
    describe_counter!("booking_sagas_started_total", Unit::Count, "Booking sagas started");
    describe_counter!("booking_sagas_confirmed_total", Unit::Count, "Booking sagas confirmed");
    describe_counter!("booking_sagas_failed_total", Unit::Count, "Booking sagas failed");
    describe_counter!("booking_sagas_pending_unclear_total", Unit::Count, "Booking sagas left pending after an unclear remote outcome");

    describe_counter!("inventory_reservations_total", Unit::Count, "Reservations placed");
    describe_counter!("inventory_oversell_rejections_total", Unit::Count, "Reserves rejected by the availability guard");
    describe_counter!("inventory_releases_total", Unit::Count, "Inventory releases");
    describe_counter!("inventory_holds_reaped_total", Unit::Count, "Expired holds reclaimed by the reaper");
    describe_histogram!("inventory_reservation_nights", Unit::Count, "Nights per reservation");
    describe_histogram!("inventory_release_credited_nights", Unit::Count, "Nights credited per release");

    describe_counter!("idempotent_replays_total", Unit::Count, "Requests answered from the idempotency store");
    describe_counter!("payments_processed_total", Unit::Count, "Payments processed");
    describe_counter!("recovery_actions_total", Unit::Count, "Recovery worker actions");
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert!(metrics.initialized);
    }
}
