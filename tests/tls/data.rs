//! Application data integration tests.

use timpl::{CipherSuite, Error, ProtocolVersion};

use crate::common::*;

#[test]
fn hello_is_one_record() {
    let _ = env_logger::try_init();

    let (mut client, mut server) = pair(
        client_config().cipher_suites(&[CipherSuite::RSA_AES128_CBC_SHA]),
        server_config(),
    );
    connect(&mut client, &mut server);

    client.prepare(b"hello").unwrap();
    let c = drain(&mut client);
    assert_eq!(c.packets.len(), 1);

    let records = split_records(&c.packets[0]);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0][0], APPLICATION_DATA);
    assert_eq!(&records[0][1..3], &[3, 2]);
    // Explicit IV, then "hello" and a 20 byte MAC padded to two blocks.
    assert_eq!(records[0].len(), 5 + 16 + 32);

    deliver(&c.packets, &mut server).unwrap();
    let s = drain(&mut server);
    assert_eq!(s.app_data, vec![b"hello".to_vec()]);
}

#[test]
fn both_directions_tls10() {
    let (mut client, mut server) = pair(
        client_config().max_version(ProtocolVersion::TLS1_0),
        server_config(),
    );
    connect(&mut client, &mut server);

    // Several records in a row exercise the chained CBC state.
    for i in 0..5u8 {
        let message = vec![i; 100 + i as usize];
        client.prepare(&message).unwrap();
        deliver(&drain(&mut client).packets, &mut server).unwrap();
        assert_eq!(drain(&mut server).app_data, vec![message.clone()]);

        server.prepare(&message).unwrap();
        deliver(&drain(&mut server).packets, &mut client).unwrap();
        assert_eq!(drain(&mut client).app_data, vec![message]);
    }
}

#[test]
fn large_write_is_split() {
    let (mut client, mut server) = pair(client_config(), server_config());
    connect(&mut client, &mut server);

    let data: Vec<u8> = (0..40_000u32).map(|i| i as u8).collect();
    server.prepare(&data).unwrap();

    let s = drain(&mut server);
    let records: Vec<_> = s.packets.iter().flat_map(|p| split_records(p)).collect();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r[0] == APPLICATION_DATA));

    deliver(&s.packets, &mut client).unwrap();
    let received: Vec<u8> = drain(&mut client).app_data.concat();
    assert_eq!(received, data);
}

#[test]
fn empty_write_sends_nothing() {
    let (mut client, mut server) = pair(client_config(), server_config());
    connect(&mut client, &mut server);

    client.prepare(&[]).unwrap();
    assert!(drain(&mut client).packets.is_empty());
}

#[test]
fn tampered_record_is_bad_record_mac() {
    let (mut client, mut server) = pair(client_config(), server_config());
    connect(&mut client, &mut server);

    client.prepare(b"secret").unwrap();
    let mut packet = drain(&mut client).packets.remove(0);
    let last = packet.len() - 1;
    packet[last] ^= 0x01;

    let err = server.process(&packet).unwrap_err();
    assert_eq!(err, Error::BadRecordMac);
    assert!(server.has_failed());

    // The alert goes out under the server's write keys.
    let s = drain(&mut server);
    assert!(s.closed);
    assert_eq!(content_types(&s.packets), vec![ALERT]);
    assert_eq!(
        client.process(&s.packets[0]).unwrap_err(),
        Error::PeerAlert {
            level: timpl::AlertLevel::Fatal,
            description: timpl::AlertDescription::BadRecordMac,
        }
    );
}

#[test]
fn prepare_after_failure() {
    let (mut client, mut server) = pair(client_config(), server_config());
    connect(&mut client, &mut server);

    server.process(&[23, 3, 2, 0, 16]).unwrap();
    assert!(server.process(&[0; 16]).is_err());
    assert_eq!(server.prepare(b"x"), Err(Error::ConnectionFailed));
}
