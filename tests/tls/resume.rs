//! Session resumption integration tests.

use std::sync::Arc;

use timpl::{Config, MemorySessionCache, SessionCache, Tls};

use crate::common::*;

struct Setup {
    client_cache: Arc<MemorySessionCache>,
    server_cache: Arc<MemorySessionCache>,
    client_config: Arc<Config>,
    server_config: Arc<Config>,
}

fn setup() -> Setup {
    let client_cache = Arc::new(MemorySessionCache::default());
    let server_cache = Arc::new(MemorySessionCache::default());

    let client_config = client_config()
        .session_cache(client_cache.clone())
        .build()
        .unwrap();
    let server_config = server_config()
        .session_cache(server_cache.clone())
        .build()
        .unwrap();

    Setup {
        client_cache,
        server_cache,
        client_config: Arc::new(client_config),
        server_config: Arc::new(server_config),
    }
}

impl Setup {
    fn pair(&self) -> (Tls, Tls) {
        (
            Tls::new_client(Arc::clone(&self.client_config)),
            Tls::new_server(Arc::clone(&self.server_config)),
        )
    }
}

/// Full handshake followed by a clean close on both sides.
fn first_connection(setup: &Setup) -> Vec<u8> {
    let (mut client, mut server) = setup.pair();
    connect(&mut client, &mut server);
    let id = client.session_id().to_vec();

    client.close(false);
    deliver(&drain(&mut client).packets, &mut server).unwrap();
    drain(&mut server);

    id
}

#[test]
fn abbreviated_handshake() {
    let _ = env_logger::try_init();

    let setup = setup();
    let id = first_connection(&setup);
    assert_eq!(setup.client_cache.len(), 1);
    assert_eq!(setup.server_cache.len(), 1);
    assert!(setup.server_cache.get(&id).is_some());

    let (mut client, mut server) = setup.pair();
    client.handshake(Some(&id)).unwrap();
    deliver(&drain(&mut client).packets, &mut server).unwrap();

    // ServerHello, ChangeCipherSpec, Finished. No Certificate.
    let flight = drain(&mut server);
    assert_eq!(
        content_types(&flight.packets),
        vec![HANDSHAKE, CHANGE_CIPHER_SPEC, HANDSHAKE]
    );

    deliver(&flight.packets, &mut client).unwrap();
    let c = drain(&mut client);
    assert!(c.connected);
    assert!(client.is_connected());
    assert_eq!(content_types(&c.packets), vec![CHANGE_CIPHER_SPEC, HANDSHAKE]);

    deliver(&c.packets, &mut server).unwrap();
    assert!(drain(&mut server).connected);
    assert!(server.is_connected());

    assert_eq!(client.session_id(), &id[..]);
    assert_eq!(server.session_id(), &id[..]);
    assert_eq!(client.peer_certificate(), Some(SERVER_CERT));

    client.prepare(b"resumed").unwrap();
    deliver(&drain(&mut client).packets, &mut server).unwrap();
    assert_eq!(drain(&mut server).app_data, vec![b"resumed".to_vec()]);
}

#[test]
fn unknown_id_runs_full_handshake() {
    let setup = setup();
    let (mut client, mut server) = setup.pair();

    client.handshake(Some(&[7; 32])).unwrap();
    let (c, _) = exchange(&mut client, &mut server);

    assert!(client.is_connected());
    assert!(c.peer_cert.is_some());
    assert_ne!(client.session_id(), &[7; 32][..]);
}

#[test]
fn server_without_session_issues_new_id() {
    let setup = setup();
    let id = first_connection(&setup);

    // A server that never saw the session, drawing different ids.
    let other_server = Arc::new(server_config().rng_seed(99).build().unwrap());
    let mut client = Tls::new_client(Arc::clone(&setup.client_config));
    let mut server = Tls::new_server(other_server);

    client.handshake(Some(&id)).unwrap();
    let (c, _) = exchange(&mut client, &mut server);

    assert!(client.is_connected());
    assert!(c.peer_cert.is_some());
    assert_eq!(client.session_id().len(), 32);
    assert_ne!(client.session_id(), &id[..]);
}

#[test]
fn failed_connection_is_not_cached() {
    let setup = setup();
    let (mut client, mut server) = setup.pair();
    connect(&mut client, &mut server);

    client.prepare(b"x").unwrap();
    let mut packet = drain(&mut client).packets.remove(0);
    let last = packet.len() - 1;
    packet[last] ^= 0x80;
    assert!(server.process(&packet).is_err());

    assert!(setup.server_cache.is_empty());
}
