//! Dashboard status and health endpoints

use axum::{Json, extract::State};
use chatrelay_core::status::StatusSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::AppState;

pub async fn get_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.reporter.snapshot())
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub bot_running: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        timestamp: Utc::now(),
        bot_running: state.reporter.is_online(),
    })
}
