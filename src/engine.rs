//! The connection engine shared by both roles.
//!
//! Inbound bytes are framed by the [`RecordLayer`], unprotected with the
//! current read [`Mode`](crate::conn_state::Mode) and dispatched by content
//! type. Handshake messages go through the expect-state table in
//! [`handshake`](crate::handshake). Everything the caller needs to see is
//! queued as an [`Output`].
//!
//! Every fatal error goes through [`Engine::fail`]: alert, failed flag, close.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::conn_state::ConnectionStates;
use crate::crypto::HmacProvider;
use crate::handshake::{Expect, HandshakeState};
use crate::message::{Alert, AlertDescription, AlertLevel, ChangeCipherSpec, Heartbeat};
use crate::message::{HeartbeatType, HEARTBEAT_OVERHEAD, HEARTBEAT_PADDING, MAX_FRAGMENT};
use crate::record_layer::{Record, RecordLayer};
use crate::rng::SeededRng;
use crate::session::Session;
use crate::types::{ContentType, Entity};
use crate::{Config, Error, Output};

/// Largest plaintext accepted in a record, after decompression.
const MAX_PLAINTEXT: usize = 1 << 14;

pub(crate) struct Engine {
    pub config: Arc<Config>,

    pub entity: Entity,

    /// Injected random source.
    pub rng: SeededRng,

    /// Framing, reassembly and the outbound queue.
    pub records: RecordLayer,

    /// Current and pending record protection.
    pub states: ConnectionStates,

    /// The session being negotiated or in use.
    pub session: Session,

    /// Per-handshake bookkeeping.
    pub hs: HandshakeState,

    /// Which peer message may come next.
    pub expect: Expect,

    /// Events for the caller.
    pub outputs: VecDeque<Output>,

    /// Payload of the last heartbeat request we sent.
    pub heartbeat_sent: Option<Vec<u8>>,

    pub open: bool,
    pub handshaking: bool,
    pub connected: bool,
    pub failed: bool,
}

impl Engine {
    pub fn new(config: Arc<Config>, entity: Entity) -> Self {
        let provider = config.crypto_provider();
        let rng = SeededRng::new(config.rng_seed(), provider.secure_random);
        let session = Session::new(provider.hash_provider);
        let records = RecordLayer::new(config.max_version());

        Engine {
            entity,
            rng,
            records,
            states: ConnectionStates::new(),
            session,
            hs: HandshakeState::default(),
            expect: Expect::initial(entity),
            outputs: VecDeque::new(),
            heartbeat_sent: None,
            open: false,
            handshaking: false,
            connected: false,
            failed: false,
            config,
        }
    }

    pub fn hmac(&self) -> &'static dyn HmacProvider {
        self.config.crypto_provider().hmac_provider
    }

    /// Feed inbound bytes. Returns how many more bytes the record being read needs.
    pub fn process(&mut self, input: &[u8]) -> Result<usize, Error> {
        if self.failed {
            return Err(Error::ConnectionFailed);
        }

        if !self.open {
            match self.entity {
                // Late data from the server after we closed.
                Entity::Client => return Ok(0),
                Entity::Server => self.start_server(),
            }
        }

        self.records.push_input(input);

        if let Err(e) = self.process_input() {
            return Err(self.fail(e));
        }

        Ok(self.records.deficit())
    }

    /// Run buffered input until it is exhausted, the connection closes or
    /// the handshake suspends for an external signature.
    pub fn process_input(&mut self) -> Result<(), Error> {
        loop {
            if !self.open || self.expect == Expect::ClientSignature {
                return Ok(());
            }

            // Complete handshake messages go before the next record, so a
            // ChangeCipherSpec is seen after everything that preceded it.
            if let Some(message) = self.records.next_handshake()? {
                let result = self.handle_handshake(&message);
                self.records.recycle(message);
                result?;
                continue;
            }

            let Some(record) = self.records.next_record()? else {
                return Ok(());
            };

            self.handle_record(record)?;
        }
    }

    fn handle_record(&mut self, record: Record) -> Result<(), Error> {
        let Record {
            header,
            mut fragment,
        } = record;
        let content_type = header.content_type;

        let hmac = self.hmac();
        self.states
            .read
            .update_read(content_type, &mut fragment, hmac)?;

        if fragment.len() > MAX_PLAINTEXT {
            return Err(Error::RecordOverflow(fragment.len()));
        }

        if content_type != ContentType::Handshake && self.records.has_partial_handshake() {
            return Err(Error::UnexpectedMessage(format!(
                "{:?} record inside a fragmented handshake message",
                content_type
            )));
        }

        let result = match content_type {
            ContentType::Handshake => {
                self.records.push_handshake(&fragment);
                Ok(())
            }
            ContentType::ChangeCipherSpec => self.handle_change_cipher_spec(&fragment),
            ContentType::Alert => self.handle_alert(&fragment),
            ContentType::ApplicationData => self.handle_application_data(&fragment),
            ContentType::Heartbeat => self.handle_heartbeat(&fragment),
            ContentType::Unknown(t) => Err(Error::UnexpectedMessage(format!(
                "Unknown content type {}",
                t
            ))),
        };

        self.records.recycle(fragment);
        result
    }

    fn handle_change_cipher_spec(&mut self, fragment: &[u8]) -> Result<(), Error> {
        if ChangeCipherSpec::parse(fragment).is_none() {
            return Err(Error::ParseError("Malformed ChangeCipherSpec".to_string()));
        }

        let next = match (self.entity, self.expect) {
            (Entity::Client, Expect::ServerChangeCipherSpec) => Expect::ServerFinished,
            (Entity::Server, Expect::ClientChangeCipherSpec) => Expect::ClientFinished,
            _ => {
                return Err(Error::UnexpectedMessage(format!(
                    "ChangeCipherSpec while expecting {:?}",
                    self.expect
                )))
            }
        };

        debug!("Received ChangeCipherSpec");
        self.states.promote_read()?;
        self.expect = next;
        Ok(())
    }

    fn handle_alert(&mut self, fragment: &[u8]) -> Result<(), Error> {
        let (rest, alert) = Alert::parse(fragment)?;
        if !rest.is_empty() {
            return Err(Error::ParseError("Trailing bytes after alert".to_string()));
        }

        match (alert.level, alert.description) {
            (_, AlertDescription::CloseNotify) => {
                debug!("Peer sent close_notify");
                self.close(true);
                Ok(())
            }
            (AlertLevel::Warning, description) => {
                warn!("Peer warning: {}", description);
                self.outputs.push_back(Output::Warning(Error::PeerAlert {
                    level: alert.level,
                    description,
                }));
                Ok(())
            }
            (level, description) => Err(Error::PeerAlert { level, description }),
        }
    }

    fn handle_application_data(&mut self, fragment: &[u8]) -> Result<(), Error> {
        if !self.connected {
            return Err(Error::UnexpectedMessage(
                "Application data before handshake completed".to_string(),
            ));
        }

        // Empty records are legal, some TLS 1.0 stacks send them before
        // every real record.
        if !fragment.is_empty() {
            self.outputs
                .push_back(Output::ApplicationData(fragment.to_vec()));
        }
        Ok(())
    }

    fn handle_heartbeat(&mut self, fragment: &[u8]) -> Result<(), Error> {
        let Ok((_, heartbeat)) = Heartbeat::parse(fragment) else {
            debug!("Dropping malformed heartbeat");
            return Ok(());
        };

        match heartbeat.message_type {
            HeartbeatType::Request => {
                if self.handshaking {
                    trace!("Ignoring heartbeat request during handshake");
                    return Ok(());
                }
                if heartbeat.payload.len() + HEARTBEAT_OVERHEAD > MAX_FRAGMENT {
                    return Ok(());
                }

                let padding: [u8; HEARTBEAT_PADDING] = self.rng.array()?;
                let mut body = Vec::new();
                Heartbeat::new(HeartbeatType::Response, heartbeat.payload)
                    .serialize(&padding, &mut body);
                self.queue(ContentType::Heartbeat, &body)?;
                self.flush();
            }
            HeartbeatType::Response => {
                if self.heartbeat_sent.as_deref() == Some(heartbeat.payload) {
                    self.outputs
                        .push_back(Output::Heartbeat(heartbeat.payload.to_vec()));
                } else {
                    debug!("Dropping unsolicited heartbeat response");
                }
            }
            HeartbeatType::Unknown(t) => {
                debug!("Dropping heartbeat of type {}", t);
            }
        }

        Ok(())
    }

    /// Protect `data` with the current write state and queue it.
    pub fn queue(&mut self, content_type: ContentType, data: &[u8]) -> Result<(), Error> {
        let hmac = self.hmac();
        let write = &mut self.states.write;
        let rng = &mut self.rng;
        self.records.queue(content_type, data, |fragment| {
            write.update_write(content_type, fragment, hmac, rng)
        })
    }

    pub fn queue_alert(&mut self, alert: Alert) -> Result<(), Error> {
        let mut body = Vec::with_capacity(2);
        alert.serialize(&mut body);
        self.queue(ContentType::Alert, &body)
    }

    /// Hand every queued record to the caller as one packet.
    pub fn flush(&mut self) {
        if let Some(packet) = self.records.flush() {
            self.outputs.push_back(Output::Packet(packet));
        }
    }

    /// Queue and flush application data.
    pub fn prepare(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.failed {
            return Err(Error::ConnectionFailed);
        }
        if !self.connected {
            return Err(Error::NotConnected);
        }

        if let Err(e) = self.queue(ContentType::ApplicationData, data) {
            return Err(self.fail(e));
        }
        self.flush();
        Ok(())
    }

    pub fn prepare_heartbeat_request(&mut self, payload: &[u8]) -> Result<(), Error> {
        if self.failed {
            return Err(Error::ConnectionFailed);
        }
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if payload.len() + HEARTBEAT_OVERHEAD > MAX_FRAGMENT {
            return Err(Error::PayloadTooLarge(payload.len()));
        }

        let result = self.rng.array::<HEARTBEAT_PADDING>().and_then(|padding| {
            let mut body = Vec::new();
            Heartbeat::new(HeartbeatType::Request, payload).serialize(&padding, &mut body);
            self.queue(ContentType::Heartbeat, &body)
        });
        if let Err(e) = result {
            return Err(self.fail(e));
        }

        self.heartbeat_sent = Some(payload.to_vec());
        self.flush();
        Ok(())
    }

    /// The single error funnel.
    ///
    /// Sends the fatal alert for `err` if it has one, marks the connection
    /// failed and closes it. Returns `err` for the caller.
    pub fn fail(&mut self, err: Error) -> Error {
        warn!("{} connection failed: {}", self.entity, err);

        if let Some(description) = err.alert() {
            if self.open {
                if let Err(e) = self.queue_alert(Alert::fatal(description)) {
                    debug!("Could not queue fatal alert: {}", e);
                }
                self.flush();
            }
        }

        self.failed = true;
        self.handshaking = false;
        self.connected = false;
        self.close(false);

        err
    }

    /// Close the connection, caching the session if it completed cleanly.
    pub fn close(&mut self, clear_fail: bool) {
        if !self.failed && self.connected {
            if let (Some(cache), Some(snapshot)) =
                (self.config.session_cache(), self.session.snapshot())
            {
                cache.put(snapshot);
            }
        }

        if self.open {
            self.open = false;

            if !self.failed && (self.connected || self.handshaking) {
                if let Err(e) = self.queue_alert(Alert::warning(AlertDescription::CloseNotify)) {
                    debug!("Could not queue close_notify: {}", e);
                }
                self.flush();
            }

            debug!("{} connection closed", self.entity);
            self.outputs.push_back(Output::Closed);
        }

        self.reset(clear_fail);
    }

    /// Discard all connection state. Queued outputs survive.
    pub fn reset(&mut self, clear_fail: bool) {
        let provider = self.config.crypto_provider();

        self.records.reset(self.config.max_version());
        self.states = ConnectionStates::new();
        self.session = Session::new(provider.hash_provider);
        self.hs = HandshakeState::default();
        self.expect = Expect::initial(self.entity);
        self.heartbeat_sent = None;
        self.open = false;
        self.handshaking = false;
        self.connected = false;
        self.failed = self.failed && !clear_fail;
    }

    pub fn poll_output(&mut self) -> Option<Output> {
        self.outputs.pop_front()
    }
}
