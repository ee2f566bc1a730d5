use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::NaiveDate;
use kost_core::lifecycle::{
    InMemoryStore, LifecycleError, LifecycleServices, NewRoom, RecordingSink, Room,
};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type InMemoryServices = LifecycleServices<InMemoryStore, RecordingSink>;

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Seed a small inventory so the demo command has rooms to work with.
pub(crate) fn seed_rooms(services: &InMemoryServices) -> Result<Vec<Room>, LifecycleError> {
    let inventory = [
        ("R101", "standard", 1_500_000_u64, 1_u8, 1_u8),
        ("R102", "standard", 1_500_000, 1, 1),
        ("P201", "premium", 2_500_000, 2, 2),
    ];

    inventory
        .into_iter()
        .map(|(number, category, monthly_rate, floor, capacity)| {
            services.rooms.register_room(NewRoom {
                number: number.to_string(),
                category: category.to_string(),
                monthly_rate,
                floor,
                capacity,
            })
        })
        .collect()
}
