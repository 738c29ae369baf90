use lockbox_sync::protocol::{
    API_PREFIX, ErrorBody, ErrorCode, FetchRequest, HealthResponse, InsertRequest,
    InsertResponse, MAX_BATCH_SIZE, PROTOCOL_VERSION, UpdateRequest, entries_path, fetch_path,
    summaries_path,
};
use lockbox_types::{EntityClass, NewEntry, RemoteId, Timestamp};
use pretty_assertions::assert_eq;
use serde_json::json;

// ── Constants ────────────────────────────────────────────────────

#[test]
fn protocol_version_is_one() {
    assert_eq!(PROTOCOL_VERSION, 1);
}

#[test]
fn max_batch_size_is_100() {
    assert_eq!(MAX_BATCH_SIZE, 100);
}

// ── Paths ────────────────────────────────────────────────────────

#[test]
fn paths_are_scoped_by_class() {
    assert_eq!(API_PREFIX, "/api/v1");
    assert_eq!(summaries_path(EntityClass::Passwords), "/api/v1/passwords/summaries");
    assert_eq!(entries_path(EntityClass::Cards), "/api/v1/cards/entries");
    assert_eq!(fetch_path(EntityClass::Binaries), "/api/v1/binaries/entries/fetch");
}

// ── Bodies ───────────────────────────────────────────────────────

#[test]
fn fetch_request_is_a_plain_id_list() {
    let body = FetchRequest {
        ids: vec![RemoteId::new(1), RemoteId::new(2)],
    };
    assert_eq!(serde_json::to_value(&body).unwrap(), json!({ "ids": [1, 2] }));
}

#[test]
fn insert_request_encodes_data_as_base64() {
    let entry = NewEntry {
        name: "note".into(),
        data: b"hello".to_vec(),
        created_at: Timestamp::from_millis(5),
        updated_at: Timestamp::from_millis(6),
        deleted: false,
    };
    let body = InsertRequest {
        entries: vec![entry],
    };

    assert_eq!(
        serde_json::to_value(&body).unwrap(),
        json!({
            "entries": [{
                "name": "note",
                "data": "aGVsbG8=",
                "created_at": 5,
                "updated_at": 6,
                "deleted": false
            }]
        })
    );
}

#[test]
fn insert_response_parses_ids() {
    let parsed: InsertResponse = serde_json::from_str(r#"{"ids":[7,8,9]}"#).unwrap();
    assert_eq!(parsed.ids.len(), 3);
    assert_eq!(parsed.ids[2], RemoteId::new(9));
}

#[test]
fn update_request_omits_remote_link() {
    let entry = NewEntry::new("bank", b"x".to_vec()).with_id(RemoteId::new(4));
    let value = serde_json::to_value(UpdateRequest {
        entries: vec![entry],
    })
    .unwrap();

    let row = &value["entries"][0];
    assert_eq!(row["id"], json!(4));
    assert!(row.get("remote_link").is_none());
}

#[test]
fn health_ok() {
    let health = HealthResponse::ok();
    assert_eq!(health.status, "ok");
    assert_eq!(health.protocol_version, PROTOCOL_VERSION);
}

#[test]
fn error_codes_are_snake_case() {
    let body = ErrorBody::new(ErrorCode::InvalidEntityClass, "invalid entity class: notes");
    assert_eq!(
        serde_json::to_value(&body).unwrap(),
        json!({ "code": "invalid_entity_class", "error": "invalid entity class: notes" })
    );

    let parsed: ErrorBody = serde_json::from_str(r#"{"code":"not_found","error":"x"}"#).unwrap();
    assert_eq!(parsed.code, ErrorCode::NotFound);
}

#[test]
fn malformed_data_is_rejected() {
    let result: Result<InsertRequest, _> = serde_json::from_str(
        r#"{"entries":[{"name":"n","data":"***","created_at":1,"updated_at":1}]}"#,
    );
    assert!(result.is_err());
}
