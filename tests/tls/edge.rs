//! Error paths, misuse and shutdown.

use timpl::{AlertDescription, AlertLevel, Error};

use crate::common::*;

#[test]
fn corrupted_key_exchange_fails_at_finished() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(client_config(), server_config());
    client.handshake(None).unwrap();
    deliver(&drain(&mut client).packets, &mut server).unwrap();
    deliver(&drain(&mut server).packets, &mut client).unwrap();

    let flight = drain(&mut client);
    assert_eq!(flight.packets.len(), 1);
    let mut records = split_records(&flight.packets[0]);
    assert_eq!(
        records.iter().map(|r| r[0]).collect::<Vec<_>>(),
        vec![HANDSHAKE, CHANGE_CIPHER_SPEC, HANDSHAKE]
    );
    assert_eq!(records[0][5], 16);

    // Inside the RSA ciphertext.
    records[0][20] ^= 0xFF;

    // Nothing distinguishes the bad secret until the Finished record.
    assert_eq!(server.process(&records[0]), Ok(0));
    assert_eq!(server.process(&records[1]), Ok(0));
    assert_eq!(server.process(&records[2]), Err(Error::BadRecordMac));

    let s = drain(&mut server);
    assert_eq!(s.packets, vec![vec![21, 3, 2, 0, 2, 2, 20]]);
}

#[test]
fn server_message_sent_to_server() {
    let (_, mut server) = pair(client_config(), server_config());

    // ServerHelloDone
    let err = server.process(&[22, 3, 1, 0, 4, 14, 0, 0, 0]).unwrap_err();
    assert!(matches!(err, Error::UnexpectedMessage(_)));

    let s = drain(&mut server);
    assert_eq!(s.packets, vec![vec![21, 3, 2, 0, 2, 2, 10]]);
    assert!(s.closed);
}

#[test]
fn early_change_cipher_spec() {
    let (_, mut server) = pair(client_config(), server_config());
    let err = server.process(&[20, 3, 1, 0, 1, 1]).unwrap_err();
    assert!(matches!(err, Error::UnexpectedMessage(_)));
}

#[test]
fn record_inside_fragmented_handshake() {
    let (_, mut server) = pair(client_config(), server_config());

    // First two bytes of a ClientHello header.
    assert_eq!(server.process(&[22, 3, 1, 0, 2, 1, 0]), Ok(0));
    let err = server.process(&[21, 3, 1, 0, 2, 1, 0]).unwrap_err();
    assert!(matches!(err, Error::UnexpectedMessage(_)));
}

#[test]
fn oversized_record_detected_from_header() {
    let (_, mut server) = pair(client_config(), server_config());

    let err = server.process(&[23, 3, 1, 0x48, 0x01]).unwrap_err();
    assert_eq!(err, Error::RecordOverflow(0x4801));

    let s = drain(&mut server);
    assert_eq!(s.packets, vec![vec![21, 3, 2, 0, 2, 2, 22]]);
}

#[test]
fn process_reports_missing_bytes() {
    let (_, mut server) = pair(client_config(), server_config());
    assert_eq!(server.process(&[22, 3]), Ok(3));
    assert_eq!(server.process(&[1, 0, 10]), Ok(10));
    assert_eq!(server.process(&[1, 0, 0]), Ok(7));
}

#[test]
fn api_misuse_is_not_fatal() {
    let (mut client, mut server) = pair(client_config(), server_config());

    assert_eq!(server.handshake(None), Err(Error::NotClient));
    assert_eq!(client.prepare(b"x"), Err(Error::NotConnected));
    assert_eq!(client.signature_ready(b"sig"), Err(Error::NotAwaitingSignature));

    client.handshake(None).unwrap();
    assert_eq!(client.handshake(None), Err(Error::HandshakeInProgress));
    assert!(!client.has_failed());

    exchange(&mut client, &mut server);
    assert!(client.is_connected());

    assert_eq!(client.handshake(None), Err(Error::RenegotiationRefused));
    assert!(client.is_connected());
    assert!(!client.has_failed());
}

#[test]
fn close_notify_both_ways() {
    let (mut client, mut server) = pair(client_config(), server_config());
    connect(&mut client, &mut server);

    client.close(false);
    assert!(!client.is_connected());

    let c = drain(&mut client);
    assert!(c.closed);
    assert_eq!(content_types(&c.packets), vec![ALERT]);

    deliver(&c.packets, &mut server).unwrap();
    let s = drain(&mut server);
    assert!(s.closed);
    assert!(!server.is_connected());
    assert!(!server.has_failed());

    // The answering close_notify reaches a client that already closed.
    assert_eq!(content_types(&s.packets), vec![ALERT]);
    assert_eq!(client.process(&s.packets[0]), Ok(0));
    assert!(drain(&mut client).packets.is_empty());
}

#[test]
fn failed_connection_needs_reset() {
    let (mut client, mut server) = pair(client_config(), server_config());

    assert!(server.process(&[22, 3, 1, 0, 4, 14, 0, 0, 0]).is_err());
    assert!(server.has_failed());
    assert_eq!(server.process(&[22]), Err(Error::ConnectionFailed));
    drain(&mut server);

    server.reset(true);
    assert!(!server.has_failed());
    connect(&mut client, &mut server);
}

#[test]
fn close_can_clear_failure() {
    let (mut client, mut server) = pair(client_config(), server_config());

    client.handshake(None).unwrap();
    deliver(&drain(&mut client).packets, &mut server).unwrap();
    let err = client.process(&[21, 3, 2, 0, 2, 2, 40]).unwrap_err();
    assert_eq!(
        err,
        Error::PeerAlert {
            level: AlertLevel::Fatal,
            description: AlertDescription::HandshakeFailure,
        }
    );
    assert!(client.has_failed());
    assert_eq!(client.handshake(None), Err(Error::ConnectionFailed));

    client.close(true);
    assert!(!client.has_failed());
    client.handshake(None).unwrap();
}
