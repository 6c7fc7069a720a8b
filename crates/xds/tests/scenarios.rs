//! End-to-end scenario exercised at the xDS layer: a connected client NACKs
//! a pushed response. `Connection::should_respond` is the seam the gRPC
//! service calls into for every incoming `DeltaDiscoveryRequest`, so driving
//! it directly here exercises the same detection path the real service uses
//! without standing up a tonic server.

use agentgateway_core::resource::NamespacedName;
use agentgateway_xds::{Connection, ShouldRespond};

/// Scenario 6 (detection half): a client acks an initial push, then rejects
/// a later one. The connection must report `Nack` with the client's error
/// detail and must not treat it as a subscription change requiring a
/// response of its own.
#[test]
fn scenario_6_client_nack_is_detected_and_carries_error_detail() {
    let conn = Connection::new(NamespacedName::new("default", "gw"));

    match conn.should_respond("type.googleapis.com/agentgateway.Route", "", None, &["route-1".to_string()], &[]) {
        ShouldRespond::Respond => {}
        _ => panic!("expected the initial subscription to trigger a response"),
    }
    conn.record_sent("type.googleapis.com/agentgateway.Route", "v1-0-nonce");

    match conn.should_respond(
        "type.googleapis.com/agentgateway.Route",
        "v1-0-nonce",
        Some("invalid route: unknown backend"),
        &[],
        &[],
    ) {
        ShouldRespond::Nack { error_detail } => {
            assert_eq!(error_detail, "invalid route: unknown backend");
        }
        _ => panic!("expected Nack"),
    }
}

/// A NACK referencing a nonce the connection never sent (e.g. a retransmit
/// racing a reconnect) is still surfaced as a NACK — the error detail alone
/// decides, regardless of nonce staleness.
#[test]
fn scenario_6_nack_with_stale_nonce_is_still_reported() {
    let conn = Connection::new(NamespacedName::new("default", "gw"));
    conn.record_sent("type.googleapis.com/agentgateway.Route", "v1-0-nonce");

    match conn.should_respond(
        "type.googleapis.com/agentgateway.Route",
        "some-other-nonce",
        Some("invalid route"),
        &[],
        &[],
    ) {
        ShouldRespond::Nack { error_detail } => assert_eq!(error_detail, "invalid route"),
        _ => panic!("expected Nack"),
    }
}
