#![allow(dead_code)]

use axum::Router;
use chrono::{TimeZone, Utc};
use elphi_calendar::components::cache::ManualClock;
use elphi_calendar::components::{CalendarBuilder, UpstreamGateway};
use elphi_calendar::config::Config;
use elphi_calendar::server::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Configuration pointing both upstream services at the mock server
pub fn mock_config(server: &MockServer) -> Config {
    Config {
        favorites_base_url: format!("{}/api/", server.uri()),
        events_base_url: format!("{}/booking/evis/", server.uri()),
        ..Config::default()
    }
}

pub fn builder(server: &MockServer) -> CalendarBuilder {
    builder_with(&mock_config(server))
}

pub fn builder_with(config: &Config) -> CalendarBuilder {
    let gateway = UpstreamGateway::new(config).expect("gateway");
    CalendarBuilder::new(config, gateway).with_clock(Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
    )))
}

pub fn app(server: &MockServer) -> Router {
    app_with(&mock_config(server))
}

pub fn app_with(config: &Config) -> Router {
    build_router(AppState::new(builder_with(config)).expect("state"))
}

/// Event detail body as the event service sends it
pub fn event_json(server: &MockServer, id: &str, title: &str) -> Value {
    json!({
        "title_de": title,
        "subtitle_de": format!("Subtitle {}", id),
        "description_long_de": "<p>Programm: <b>Brahms</b></p>",
        "room_dispname": "<strong>Großer Saal</strong> Elbphilharmonie",
        "website_url": format!("{}/programm/{}", server.uri(), id),
        "date_start": "2024-05-03T20:00:00+02:00",
        "date_end": "2024-05-03T22:00:00+02:00"
    })
}

pub async fn mount_favorites(server: &MockServer, user: &str, ids: &[&str]) {
    let events: serde_json::Map<String, Value> = ids
        .iter()
        .map(|id| (id.to_string(), json!({ "id": id })))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("/api/{}", user)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "events": events })))
        .mount(server)
        .await;
}

pub async fn mount_event(server: &MockServer, id: &str, title: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/booking/evis/{}/", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(event_json(server, id, title)))
        .mount(server)
        .await;
}

/// Single-event feed as served next to the event page
pub fn feed_body(uid: &str) -> String {
    format!(
        "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Elbphilharmonie//DE\r\n\
BEGIN:VEVENT\r\n\
UID:{}\r\n\
SUMMARY:Feed summary\r\n\
DESCRIPTION:Einführung um 19 Uhr\r\n\
DTSTART;TZID=Europe/Berlin:20240503T200000\r\n\
DTEND;TZID=Europe/Berlin:20240503T213000\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n",
        uid
    )
}
