//! Shared helpers for TLS integration tests.

#![allow(unused)]

use std::sync::Arc;

use timpl::{Config, ConfigBuilder, Error, Output, TlsCertificate, Tls};

pub const SERVER_CERT: &[u8] = include_bytes!("../data/server.cert.der");
pub const SERVER_KEY: &[u8] = include_bytes!("../data/server.key.der");
pub const CLIENT_CERT: &[u8] = include_bytes!("../data/client.cert.der");
pub const CLIENT_KEY: &[u8] = include_bytes!("../data/client.key.der");

/// Record content types.
pub const CHANGE_CIPHER_SPEC: u8 = 20;
pub const ALERT: u8 = 21;
pub const HANDSHAKE: u8 = 22;
pub const APPLICATION_DATA: u8 = 23;

/// Collected outputs from polling an endpoint until it is empty.
#[derive(Default, Debug)]
pub struct Drained {
    pub packets: Vec<Vec<u8>>,
    pub connected: bool,
    pub peer_cert: Option<Vec<u8>>,
    pub app_data: Vec<Vec<u8>>,
    pub heartbeats: Vec<Vec<u8>>,
    pub signature_requests: Vec<Vec<u8>>,
    pub warnings: Vec<Error>,
    pub closed: bool,
}

impl Drained {
    fn merge(&mut self, other: Drained) {
        self.packets.extend(other.packets);
        self.connected |= other.connected;
        if other.peer_cert.is_some() {
            self.peer_cert = other.peer_cert;
        }
        self.app_data.extend(other.app_data);
        self.heartbeats.extend(other.heartbeats);
        self.signature_requests.extend(other.signature_requests);
        self.warnings.extend(other.warnings);
        self.closed |= other.closed;
    }
}

/// Poll until there is no more output.
pub fn drain(endpoint: &mut Tls) -> Drained {
    let mut result = Drained::default();
    while let Some(output) = endpoint.poll_output() {
        match output {
            Output::Packet(p) => result.packets.push(p),
            Output::PeerCert(c) => result.peer_cert = Some(c),
            Output::Connected => result.connected = true,
            Output::ApplicationData(d) => result.app_data.push(d),
            Output::Heartbeat(p) => result.heartbeats.push(p),
            Output::SignatureRequest(d) => result.signature_requests.push(d),
            Output::Warning(e) => result.warnings.push(e),
            Output::Closed => result.closed = true,
        }
    }
    result
}

/// Feed packets to `dest`, stopping at the first error.
pub fn deliver(packets: &[Vec<u8>], dest: &mut Tls) -> Result<(), Error> {
    for p in packets {
        dest.process(p)?;
    }
    Ok(())
}

/// Shuttle packets both ways until neither side has anything to send.
pub fn exchange(client: &mut Tls, server: &mut Tls) -> (Drained, Drained) {
    let mut client_all = Drained::default();
    let mut server_all = Drained::default();

    for _ in 0..20 {
        let c = drain(client);
        let s = drain(server);
        let idle = c.packets.is_empty() && s.packets.is_empty();

        deliver(&c.packets, server).expect("server process");
        deliver(&s.packets, client).expect("client process");

        client_all.merge(c);
        server_all.merge(s);

        if idle {
            break;
        }
    }

    client_all.merge(drain(client));
    server_all.merge(drain(server));
    (client_all, server_all)
}

/// Run a complete handshake and return what each side emitted.
pub fn connect(client: &mut Tls, server: &mut Tls) -> (Drained, Drained) {
    client.handshake(None).expect("client handshake");
    let (c, s) = exchange(client, server);
    assert!(client.is_connected(), "client not connected");
    assert!(server.is_connected(), "server not connected");
    (c, s)
}

pub fn client_config() -> ConfigBuilder {
    Config::builder().rng_seed(1)
}

pub fn server_config() -> ConfigBuilder {
    Config::builder()
        .rng_seed(2)
        .certificate(TlsCertificate::new(SERVER_CERT.to_vec(), SERVER_KEY.to_vec()))
}

pub fn pair(client: ConfigBuilder, server: ConfigBuilder) -> (Tls, Tls) {
    let client = Tls::new_client(Arc::new(client.build().expect("client config")));
    let server = Tls::new_server(Arc::new(server.build().expect("server config")));
    (client, server)
}

/// Split a packet into whole records, headers included.
pub fn split_records(packet: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i + 5 <= packet.len() {
        let len = u16::from_be_bytes([packet[i + 3], packet[i + 4]]) as usize;
        out.push(packet[i..i + 5 + len].to_vec());
        i += 5 + len;
    }
    out
}

/// Content types of every record in `packets`.
pub fn content_types(packets: &[Vec<u8>]) -> Vec<u8> {
    packets
        .iter()
        .flat_map(|p| split_records(p))
        .map(|r| r[0])
        .collect()
}
