//! hint_pir: A Rust library implementation of a hint-based, LWE-backed keyword **P**rivate **I**nformation **R**etrieval (PIR) protocol, in the style of SimplePIR.
//!
//! A client retrieves the value associated with a secret key from a server-held key-value database, without revealing the key.
//! In an offline phase the client downloads per byte-plane hints, which it then reuses across any number of online queries.
//! Every online query and response is a noisy linear-algebra computation over Z/2^32Z.
//!
//! ## Features
//!
//! * **Keyword PIR:** Server learns neither the queried key nor the value. It only ever sees LWE-encrypted column selectors.
//! * **Two Row Layouts:** Keys are mapped to database columns either by a keyed hash ("hash-bin"), or by a learned index over
//!   key digests, whose columns overlap by guard rows so that an approximate prediction always lands in the right column.
//! * **Reusable Hints:** One offline phase per client and database version, after which queries are cheap and stateless.
//! * **Versioned Databases:** `versioned::VersionedServer` publishes immutable snapshots, so a database can be rebuilt while
//!   older snapshots finish serving in-flight queries.
//! * **Error Handling:** Comprehensive error handling to catch and report issues during setup, query generation, and response processing.
//!
//! ## Usage
//!
//! This crate is designed to be used in conjunction with other crates which provide communication mechanism between clients and server.
//! Either pass the produced byte payloads around yourself, or implement `session::Transport` and let the `session` module
//! drive the message sequence.
//!
//! ```rust
//! use hint_pir::{
//!     client::Client,
//!     config::{LayoutKind, LweParams, PirConfig},
//!     server::Server,
//!     SEED_BYTE_LEN,
//! };
//! use rand::prelude::*;
//! use rand_chacha::ChaCha20Rng;
//! use std::collections::HashMap;
//!
//! fn main() {
//!     let mut db: HashMap<&[u8], &[u8]> = HashMap::new();
//!     db.insert(b"apple", b"red___");
//!     db.insert(b"banana", b"yellow");
//!
//!     // Both parties agree on these, out-of-band.
//!     let config = PirConfig::new(db.len(), 6, LweParams::default(), LayoutKind::HashBin).expect("Invalid configuration");
//!
//!     // Server setup (offline phase)
//!     let mut seed = [0u8; SEED_BYTE_LEN];
//!     ChaCha20Rng::from_os_rng().fill_bytes(&mut seed);
//!
//!     let (server, offline) = Server::setup(&config, &seed, db).expect("Server setup failed");
//!
//!     // Client setup (offline phase)
//!     let client = Client::setup(&config, &offline.layout_params, &offline.seed, &offline.hints).expect("Client setup failed");
//!
//!     // Client query (online phase)
//!     let key = b"banana";
//!     let query = client.query(key).expect("Failed to generate query");
//!
//!     // Server response (online phase)
//!     let response = server.respond(&query).expect("Server failed to respond");
//!
//!     // Client processes the response (online phase)
//!     match client.process_response(key, &response).expect("Malformed response") {
//!         Some(value) => println!("Retrieved value: '{}'", String::from_utf8_lossy(&value)), // Should print "yellow"
//!         None => println!("Key is not present in the database."),
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! * `config`: Out-of-band parameters, shared by server and clients.
//! * `server`: Contains the `Server` struct, for setting up a PIR server from a key-value database and responding to client queries.
//! * `client`: Contains the `Client` struct, for generating PIR queries and decoding server responses.
//! * `versioned`: Atomically replaceable database snapshots.
//! * `session`: Message sequence over an application supplied `Transport`.

pub use pir_internals::error::HintPIRError;
pub use pir_internals::params::{DIGEST_BYTE_LEN, EPSILON, EPSILON_RECURSIVE, HASH_KEY_BYTE_LEN, SEED_BYTE_LEN};

pub mod client;
pub mod config;
pub mod server;
pub mod session;
pub mod versioned;

mod pir_internals;

mod test_pir;
