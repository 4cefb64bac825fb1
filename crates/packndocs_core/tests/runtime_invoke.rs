use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{Duration, TimeZone, Utc};
use packndocs_core::{
    attachment::LocalFileSystem,
    clock::ManualClock,
    kv::MemoryKeyValueStore,
    Runtime, RuntimeConfig,
};
use serde_json::{json, Value};
use tempfile::TempDir;

fn invoke(runtime: &Runtime, command: &str, payload: Value) -> Value {
    let request = json!({ "command": command, "payload": payload }).to_string();
    serde_json::from_str(&runtime.invoke_json(&request)).unwrap()
}

fn data(response: Value) -> Value {
    assert_eq!(response["ok"], true, "unexpected failure: {response}");
    response["data"].clone()
}

fn native_runtime(dir: &Path) -> Runtime {
    let config = json!({ "dataDir": dir, "platform": "native", "storage": "file" }).to_string();
    Runtime::new(&config).unwrap()
}

fn record_events(runtime: &Runtime) -> Arc<Mutex<Vec<(String, Value)>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    runtime.set_event_callback(move |event, payload| {
        sink.lock()
            .unwrap()
            .push((event.to_string(), payload["payload"].clone()));
    });
    events
}

#[test]
fn setup_flow_moves_through_stages_and_persists() {
    let temp_dir = TempDir::new().unwrap();
    let runtime = native_runtime(temp_dir.path());

    let state = data(invoke(&runtime, "get_bootstrap_state", Value::Null));
    assert_eq!(state["setupStage"], "onboarding");
    assert_eq!(state["maxFileSizeLabel"], "10.0 MB");

    data(invoke(&runtime, "set_has_onboarded", json!({ "value": true })));
    let state = data(invoke(&runtime, "get_bootstrap_state", Value::Null));
    assert_eq!(state["setupStage"], "target_select");

    let preferences = data(invoke(
        &runtime,
        "complete_setup",
        json!({
            "region": "gb",
            "countryId": "uk",
            "visaPurpose": "family_visit",
            "travelTimeline": "three_to_six_months"
        }),
    ));
    assert_eq!(preferences["selectedCountryId"], "uk");
    drop(runtime);

    let reopened = native_runtime(temp_dir.path());
    let state = data(invoke(&reopened, "get_bootstrap_state", Value::Null));
    assert_eq!(state["setupStage"], "ready");
    assert_eq!(state["preferences"]["visaPurpose"], "family_visit");
    assert_eq!(state["preferences"]["travelTimeline"], "three_to_six_months");
}

#[test]
fn toggling_a_document_twice_restores_it() {
    let temp_dir = TempDir::new().unwrap();
    let runtime = native_runtime(temp_dir.path());
    let events = record_events(&runtime);
    let target = json!({ "countryId": "germany", "documentId": "passport" });

    let status = data(invoke(&runtime, "toggle_document_complete", target.clone()));
    assert_eq!(status, json!({ "documentId": "passport", "completed": true }));
    let count = data(invoke(&runtime, "get_completed_count", json!({ "countryId": "germany" })));
    assert_eq!(count["count"], 1);

    let status = data(invoke(&runtime, "toggle_document_complete", target));
    assert_eq!(status["completed"], false);

    let progress_events = events
        .lock()
        .unwrap()
        .iter()
        .filter(|(event, _)| event == "progress://changed")
        .count();
    assert_eq!(progress_events, 2);
}

#[test]
fn uploads_are_listed_newest_first_across_countries() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 2, 1, 8, 30, 0).unwrap(),
    ));
    let config = RuntimeConfig::from_json(r#"{"platform":"web","storage":"memory"}"#).unwrap();
    let runtime = Runtime::from_parts(
        config,
        Arc::new(MemoryKeyValueStore::new()),
        Arc::new(LocalFileSystem::new()),
        clock.clone(),
    )
    .unwrap();

    data(invoke(
        &runtime,
        "set_document_file",
        json!({
            "countryId": "germany",
            "documentId": "insurance",
            "fileName": "policy.pdf",
            "filePath": "/app/docs/germany_insurance_171.pdf"
        }),
    ));
    clock.advance(Duration::hours(1));
    data(invoke(
        &runtime,
        "set_document_file",
        json!({
            "countryId": "usa",
            "documentId": "photo",
            "fileName": "photo.png",
            "filePath": "/app/docs/usa_photo_172.png"
        }),
    ));

    let documents = data(invoke(&runtime, "load_all_documents", Value::Null));
    let documents = documents.as_array().unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0]["countryId"], "usa");
    assert_eq!(documents[0]["uploadedAt"], "2026-02-01T09:30:00.000Z");
    assert_eq!(documents[1]["countryId"], "germany");
    assert_eq!(documents[1]["countryName"], "Germany");

    let summary = data(invoke(
        &runtime,
        "get_progress_summary",
        json!({ "countryId": "germany" }),
    ));
    assert_eq!(summary["completed"], 1);
}

#[test]
fn attach_share_and_detach_a_real_file() {
    let temp_dir = TempDir::new().unwrap();
    let picked = temp_dir.path().join("picked-insurance.pdf");
    std::fs::write(&picked, b"%PDF-1.7 insurance").unwrap();

    let runtime = native_runtime(&temp_dir.path().join("data"));
    let events = record_events(&runtime);

    let outcome = data(invoke(
        &runtime,
        "attach_document",
        json!({
            "countryId": "germany",
            "documentId": "insurance",
            "pick": {
                "status": "picked",
                "file": {
                    "name": "policy.pdf",
                    "uri": format!("file://{}", picked.display()),
                    "size": 18,
                    "mimeType": "application/pdf"
                }
            }
        }),
    ));
    assert_eq!(outcome["status"], "attached");
    let stored_path = outcome["document"]["uploadedFilePath"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(Path::new(&stored_path).exists());

    let info = data(invoke(&runtime, "get_file_info", json!({ "path": stored_path })));
    assert_eq!(info["exists"], true);
    assert_eq!(info["size"], 18);

    let share = data(invoke(
        &runtime,
        "share_document",
        json!({ "countryId": "germany", "documentId": "insurance" }),
    ));
    assert_eq!(share["uti"], "com.adobe.pdf");
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|(event, payload)| event == "document://share" && payload["displayName"] == "policy.pdf"));

    let removed = data(invoke(
        &runtime,
        "remove_uploaded_document",
        json!({ "countryId": "germany", "documentId": "insurance" }),
    ));
    assert_eq!(removed["removed"], true);
    assert!(!Path::new(&stored_path).exists());
    assert!(data(invoke(&runtime, "load_all_documents", Value::Null))
        .as_array()
        .unwrap()
        .is_empty());
}

#[test]
fn rejected_picks_leave_no_trace() {
    let temp_dir = TempDir::new().unwrap();
    let runtime = native_runtime(temp_dir.path());
    let target = |pick: Value| json!({ "countryId": "usa", "documentId": "ds160", "pick": pick });

    let outcome = data(invoke(
        &runtime,
        "attach_document",
        target(json!({ "status": "cancelled" })),
    ));
    assert_eq!(outcome["status"], "cancelled");

    let response = invoke(
        &runtime,
        "attach_document",
        target(json!({
            "status": "picked",
            "file": { "name": "huge.pdf", "uri": "/tmp/huge.pdf", "size": 11 * 1024 * 1024 }
        })),
    );
    assert_eq!(response["ok"], false);
    assert_eq!(response["error"]["code"], "file_too_large");
    assert_eq!(response["error"]["message"], "file must be smaller than 10MB");

    let response = invoke(
        &runtime,
        "attach_document",
        target(json!({
            "status": "picked",
            "file": { "name": "setup.exe", "uri": "/tmp/setup.exe", "size": 2048 }
        })),
    );
    assert_eq!(response["error"]["code"], "unsupported_file_type");

    let progress = data(invoke(&runtime, "load_progress", json!({ "countryId": "usa" })));
    assert_eq!(progress["documents"], json!([]));
}

#[test]
fn clear_all_data_resets_preferences_and_progress() {
    let temp_dir = TempDir::new().unwrap();
    let runtime = native_runtime(temp_dir.path());
    data(invoke(&runtime, "set_has_onboarded", json!({ "value": true })));
    data(invoke(&runtime, "set_target_region", json!({ "region": "eu" })));
    for country_id in ["germany", "france"] {
        data(invoke(
            &runtime,
            "toggle_document_complete",
            json!({ "countryId": country_id, "documentId": "passport" }),
        ));
    }

    let cleared = data(invoke(&runtime, "clear_all_data", Value::Null));
    assert_eq!(cleared["removed"], 4);

    let preferences = data(invoke(&runtime, "get_preferences", Value::Null));
    assert_eq!(preferences["hasOnboarded"], false);
    assert_eq!(preferences["targetRegion"], Value::Null);
    for country_id in ["germany", "france"] {
        let progress = data(invoke(&runtime, "load_progress", json!({ "countryId": country_id })));
        assert_eq!(progress["documents"], json!([]));
    }
}

#[test]
fn malformed_requests_get_stable_error_codes() {
    let temp_dir = TempDir::new().unwrap();
    let runtime = native_runtime(temp_dir.path());

    let response: Value = serde_json::from_str(&runtime.invoke_json("{not json")).unwrap();
    assert_eq!(response["error"]["code"], "invalid_request");

    let response = invoke(&runtime, "toggle_document_complete", json!({ "countryId": "germany" }));
    assert_eq!(response["error"]["code"], "invalid_payload");

    let response = invoke(
        &runtime,
        "toggle_document_complete",
        json!({ "countryId": "", "documentId": "passport" }),
    );
    assert_eq!(response["error"]["code"], "invalid_payload");

    let response = invoke(
        &runtime,
        "share_document",
        json!({ "countryId": "germany", "documentId": "passport" }),
    );
    assert_eq!(response["error"]["code"], "not_found");

    let response = invoke(&runtime, "list_documents", json!({ "countryId": "atlantis" }));
    assert_eq!(response["error"]["code"], "not_found");
}
