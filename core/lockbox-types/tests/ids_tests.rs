use lockbox_types::{LocalId, RemoteId};
use std::collections::HashSet;
use std::str::FromStr;

// ── LocalId ──────────────────────────────────────────────────────

#[test]
fn local_id_raw_roundtrip() {
    let id = LocalId::new(42);
    assert_eq!(id.get(), 42);
}

#[test]
fn local_id_display_and_parse() {
    let id = LocalId::new(7);
    let parsed = LocalId::from_str(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn local_id_parse_invalid() {
    assert!(LocalId::from_str("seven").is_err());
}

#[test]
fn local_id_serializes_as_plain_integer() {
    let json = serde_json::to_string(&LocalId::new(3)).unwrap();
    assert_eq!(json, "3");
}

#[test]
fn local_id_hash_and_eq() {
    let mut set = HashSet::new();
    set.insert(LocalId::new(1));
    set.insert(LocalId::new(1)); // duplicate
    assert_eq!(set.len(), 1);
}

// ── RemoteId ─────────────────────────────────────────────────────

#[test]
fn remote_id_display_and_parse() {
    let id = RemoteId::new(99);
    assert_eq!(id.to_string(), "99");
    assert_eq!(RemoteId::from_str("99").unwrap(), id);
}

#[test]
fn remote_id_parse_invalid() {
    assert!(RemoteId::from_str("").is_err());
}

#[test]
fn zero_link_means_unlinked() {
    assert_eq!(RemoteId::link_from_raw(0), None);
}

#[test]
fn nonzero_link_is_the_server_id() {
    assert_eq!(RemoteId::link_from_raw(12), Some(RemoteId::new(12)));
}

#[test]
fn remote_id_ordering() {
    assert!(RemoteId::new(1) < RemoteId::new(2));
}
