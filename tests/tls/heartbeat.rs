//! Heartbeat request and response.

use timpl::Error;

use crate::common::*;

const HEARTBEAT: u8 = 24;

#[test]
fn request_is_echoed() {
    let (mut client, mut server) = pair(client_config(), server_config());
    connect(&mut client, &mut server);

    client.prepare_heartbeat_request(b"ping").unwrap();
    let c = drain(&mut client);
    assert_eq!(content_types(&c.packets), vec![HEARTBEAT]);

    deliver(&c.packets, &mut server).unwrap();
    let s = drain(&mut server);
    assert!(s.app_data.is_empty());
    assert!(s.heartbeats.is_empty());
    assert_eq!(content_types(&s.packets), vec![HEARTBEAT]);

    deliver(&s.packets, &mut client).unwrap();
    assert_eq!(drain(&mut client).heartbeats, vec![b"ping".to_vec()]);
}

#[test]
fn server_can_send_requests() {
    let (mut client, mut server) = pair(client_config(), server_config());
    connect(&mut client, &mut server);

    server.prepare_heartbeat_request(&[0xAB; 1000]).unwrap();
    let (_, s) = exchange(&mut client, &mut server);
    assert_eq!(s.heartbeats, vec![vec![0xAB; 1000]]);
}

#[test]
fn only_latest_request_matches() {
    let (mut client, mut server) = pair(client_config(), server_config());
    connect(&mut client, &mut server);

    client.prepare_heartbeat_request(b"first").unwrap();
    client.prepare_heartbeat_request(b"second").unwrap();
    let (c, _) = exchange(&mut client, &mut server);

    assert_eq!(c.heartbeats, vec![b"second".to_vec()]);
    assert!(client.is_connected());
}

#[test]
fn oversized_payload_is_refused() {
    let (mut client, mut server) = pair(client_config(), server_config());
    connect(&mut client, &mut server);

    let payload = vec![0; 16 * 1024];
    assert_eq!(
        client.prepare_heartbeat_request(&payload),
        Err(Error::PayloadTooLarge(payload.len()))
    );
    assert!(client.is_connected());
    assert!(drain(&mut client).packets.is_empty());
}

#[test]
fn heartbeat_needs_connection() {
    let (mut client, _) = pair(client_config(), server_config());
    assert_eq!(
        client.prepare_heartbeat_request(b"ping"),
        Err(Error::NotConnected)
    );
}

#[test]
fn request_during_handshake_is_ignored() {
    let (mut client, mut server) = pair(client_config(), server_config());
    client.handshake(None).unwrap();
    deliver(&drain(&mut client).packets, &mut server).unwrap();
    let flight = drain(&mut server);

    // Plaintext request while the server waits for the key exchange.
    let mut record = vec![HEARTBEAT, 3, 2, 0, 23, 1, 0, 4];
    record.extend_from_slice(b"ping");
    record.extend_from_slice(&[0; 16]);
    assert_eq!(server.process(&record), Ok(0));

    let s = drain(&mut server);
    assert!(s.packets.is_empty());
    assert!(!server.has_failed());

    deliver(&flight.packets, &mut client).unwrap();
    exchange(&mut client, &mut server);
    assert!(client.is_connected());
    assert!(server.is_connected());
}
