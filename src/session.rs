//! Drives the fixed message sequence of the protocol over an application supplied transport.
//!
//! 1. Server → Client: row layout parameters.
//! 2. Server → Client: public seed.
//! 3. Server → Client: one hint per byte-plane.
//! 4. Client → Server: query.
//! 5. Server → Client: response.
//!
//! Steps 1 to 3 happen once per client, steps 4 and 5 once per lookup. Every payload is passed to the transport exactly
//! as produced by `Server` and `Client`; framing is left to the transport.

use crate::{
    HintPIRError,
    client::Client,
    config::PirConfig,
    pir_internals::params::SEED_BYTE_LEN,
    server::{OfflineMessages, Server},
};

/// Identifies a message of the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProtocolStep {
    LayoutParams,
    PublicSeed,
    /// Hint for the byte-plane with given index.
    Hint(usize),
    Query,
    Response,
}

/// Bidirectional message channel between a client and a server.
pub trait Transport {
    /// Sends the payload of the given protocol step to the peer.
    fn send(&mut self, step: ProtocolStep, payload: &[u8]) -> Result<(), HintPIRError>;

    /// Receives the payload of the given protocol step from the peer. Implementations should fail with
    /// `HintPIRError::TransportFailure` if the next message belongs to some other step.
    fn receive(&mut self, step: ProtocolStep) -> Result<Vec<u8>, HintPIRError>;
}

/// Server side of the offline phase: sends layout parameters, seed and all hints.
pub fn send_offline<T: Transport + ?Sized>(transport: &mut T, offline: &OfflineMessages) -> Result<(), HintPIRError> {
    transport.send(ProtocolStep::LayoutParams, &offline.layout_params)?;
    transport.send(ProtocolStep::PublicSeed, &offline.seed)?;

    for (plane, hint) in offline.hints.iter().enumerate() {
        transport.send(ProtocolStep::Hint(plane), hint)?;
    }

    tracing::debug!(num_hints = offline.hints.len(), "Sent offline messages");
    Ok(())
}

/// Client side of the offline phase: receives everything `send_offline` sends, and sets up a client from it.
pub fn receive_offline<T: Transport + ?Sized>(transport: &mut T, config: &PirConfig) -> Result<Client, HintPIRError> {
    let layout_params = transport.receive(ProtocolStep::LayoutParams)?;

    let seed_bytes = transport.receive(ProtocolStep::PublicSeed)?;
    let seed = <[u8; SEED_BYTE_LEN]>::try_from(seed_bytes.as_slice()).map_err(|_| HintPIRError::InvalidSeedLength)?;

    let hints = (0..config.partition())
        .map(|plane| transport.receive(ProtocolStep::Hint(plane)))
        .collect::<Result<Vec<Vec<u8>>, HintPIRError>>()?;

    tracing::debug!(num_hints = hints.len(), "Received offline messages");
    Client::setup(config, &layout_params, &seed, &hints)
}

/// Privately looks up `key`, by sending a query and processing the response.
pub fn lookup<T: Transport + ?Sized>(transport: &mut T, client: &Client, key: &[u8]) -> Result<Option<Vec<u8>>, HintPIRError> {
    let query = client.query(key)?;
    transport.send(ProtocolStep::Query, &query)?;

    let response = transport.receive(ProtocolStep::Response)?;
    tracing::debug!(query_len = query.len(), response_len = response.len(), "Completed lookup round trip");

    client.process_response(key, &response)
}

/// Answers a single query.
pub fn serve_one<T: Transport + ?Sized>(transport: &mut T, server: &Server) -> Result<(), HintPIRError> {
    let query = transport.receive(ProtocolStep::Query)?;
    let response = server.respond(&query)?;

    tracing::debug!(query_len = query.len(), response_len = response.len(), "Answered query");
    transport.send(ProtocolStep::Response, &response)
}
