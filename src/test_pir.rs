#![cfg(test)]

use crate::{
    HintPIRError,
    client::Client,
    config::{LayoutKind, LweParams, PirConfig},
    pir_internals::{
        digest,
        layout::{ClientLayout, learned_index_geometry},
        params::{EPSILON, SCALE, SEED_BYTE_LEN},
        serialization,
    },
    server::{OfflineMessages, Server},
};
use rand::prelude::*;
use rand_chacha::{ChaCha8Rng, ChaCha20Rng};
use rayon::prelude::*;
use std::collections::HashMap;
use test_case::test_case;

fn generate_random_kv_database(num_kv_pairs: usize, value_byte_len: usize) -> HashMap<Vec<u8>, Vec<u8>> {
    const KEY_BYTE_LEN: usize = 32;

    let mut kv = HashMap::with_capacity(num_kv_pairs);
    let mut rng = ChaCha8Rng::from_os_rng();

    while kv.len() < num_kv_pairs {
        let mut key = vec![0u8; KEY_BYTE_LEN];
        let mut value = vec![0u8; value_byte_len];

        rng.fill_bytes(&mut key);
        rng.fill_bytes(&mut value);

        kv.insert(key, value);
    }

    kv
}

fn random_absent_key(rng: &mut ChaCha8Rng) -> Vec<u8> {
    // Database keys are 32 bytes long, so these can't collide with them.
    let mut key = vec![0u8; 24];
    rng.fill_bytes(&mut key);
    key
}

fn setup(config: &PirConfig, kv_db: &HashMap<Vec<u8>, Vec<u8>>) -> (Server, OfflineMessages, Client) {
    let kv_db_as_ref = kv_db.iter().map(|(k, v)| (k.as_slice(), v.as_slice())).collect::<HashMap<&[u8], &[u8]>>();

    let mut seed = [0u8; SEED_BYTE_LEN];
    ChaCha20Rng::from_os_rng().fill_bytes(&mut seed);

    let (server, offline) = Server::setup(config, &seed, kv_db_as_ref).expect("Server setup failed");
    let client = Client::setup(config, &offline.layout_params, &offline.seed, &offline.hints).expect("Client setup failed");

    (server, offline, client)
}

fn private_lookup(server: &Server, client: &Client, key: &[u8]) -> Option<Vec<u8>> {
    let query_bytes = client.query(key).expect("Client can't generate query");
    let response_bytes = server.respond(&query_bytes).expect("Server can't respond");

    client.process_response(key, &response_bytes).expect("Client can't process response")
}

#[test]
fn test_keyword_pir_with_1000_records_of_16_bytes() {
    const NUM_KV_PAIRS: usize = 1000;
    const VALUE_BYTE_LEN: usize = 16;
    const NUM_ABSENT_KEYS: usize = 1000;

    let config = PirConfig::new(NUM_KV_PAIRS, VALUE_BYTE_LEN, LweParams { dimension: 512, sigma: 6.4 }, LayoutKind::HashBin).unwrap();
    assert_eq!(config.partition(), 24);
    assert_eq!(config.columns(), 155);

    let kv_db = generate_random_kv_database(NUM_KV_PAIRS, VALUE_BYTE_LEN);
    let (server, offline, client) = setup(&config, &kv_db);

    assert_eq!(server.columns(), 155);
    assert_eq!(offline.hints.len(), 24);
    assert!(offline.hints.iter().all(|hint| hint.len() == server.rows() * 512 * 4));

    for (key, value) in &kv_db {
        assert_eq!(private_lookup(&server, &client, key).as_ref(), Some(value));
    }

    let mut rng = ChaCha8Rng::from_os_rng();
    let num_not_found = (0..NUM_ABSENT_KEYS)
        .filter(|_| private_lookup(&server, &client, &random_absent_key(&mut rng)).is_none())
        .count();

    assert!(num_not_found >= NUM_ABSENT_KEYS - 1, "only {} absent keys reported missing", num_not_found);
}

#[test_case(100, 1, 64, 3.2, LayoutKind::HashBin; "Hash-bin, 100 single byte values")]
#[test_case(1000, 16, 512, 6.4, LayoutKind::HashBin; "Hash-bin, 1000 values of 16 bytes")]
#[test_case(5000, 32, 1024, 6.4, LayoutKind::HashBin; "Hash-bin, 5000 values of 32 bytes")]
#[test_case(4, 8, 128, 6.4, LayoutKind::LearnedIndex; "Learned index, as many values as its error bound")]
#[test_case(10, 8, 128, 6.4, LayoutKind::LearnedIndex; "Learned index, 10 values of 8 bytes")]
#[test_case(1000, 16, 512, 6.4, LayoutKind::LearnedIndex; "Learned index, 1000 values of 16 bytes")]
#[test_case(5000, 32, 1024, 6.4, LayoutKind::LearnedIndex; "Learned index, 5000 values of 32 bytes")]
#[test_case(20_000, 4, 1024, 8.0, LayoutKind::LearnedIndex; "Learned index, 20k values of 4 bytes")]
fn test_keyword_pir_round_trip(num_kv_pairs: usize, value_byte_len: usize, dimension: usize, sigma: f64, layout: LayoutKind) {
    const MAX_NUMBER_OF_PIR_QUERIES: usize = 1000;

    let config = PirConfig::new(num_kv_pairs, value_byte_len, LweParams { dimension, sigma }, layout).unwrap();
    let kv_db = generate_random_kv_database(num_kv_pairs, value_byte_len);
    let (server, _, client) = setup(&config, &kv_db);

    let mut rng = ChaCha8Rng::from_os_rng();
    let all_keys = kv_db.keys().collect::<Vec<_>>();
    let queried_keys = all_keys.choose_multiple(&mut rng, MAX_NUMBER_OF_PIR_QUERIES).collect::<Vec<_>>();

    queried_keys.into_par_iter().for_each(|&key| {
        assert_eq!(private_lookup(&server, &client, key).as_ref(), Some(&kv_db[key]));
    });

    for _ in 0..100 {
        assert_eq!(private_lookup(&server, &client, &random_absent_key(&mut rng)), None);
    }
}

#[test]
fn test_learned_index_keys_near_column_boundaries() {
    const NUM_KV_PAIRS: usize = 3000;
    const VALUE_BYTE_LEN: usize = 8;

    let config = PirConfig::new(NUM_KV_PAIRS, VALUE_BYTE_LEN, LweParams { dimension: 256, sigma: 6.4 }, LayoutKind::LearnedIndex).unwrap();
    let kv_db = generate_random_kv_database(NUM_KV_PAIRS, VALUE_BYTE_LEN);
    let (server, _, client) = setup(&config, &kv_db);

    let mut sorted_keys = kv_db.keys().collect::<Vec<_>>();
    sorted_keys.sort_by_key(|key| digest::numeric_key_digest(key));

    let (data_rows, _) = learned_index_geometry(NUM_KV_PAIRS, config.columns());

    let boundary_keys = sorted_keys
        .iter()
        .enumerate()
        .filter(|&(pos, _)| {
            let offset = pos % data_rows;
            offset <= EPSILON || offset + EPSILON + 1 >= data_rows
        })
        .map(|(_, &key)| key)
        .collect::<Vec<_>>();

    assert!(!boundary_keys.is_empty());

    boundary_keys.into_par_iter().for_each(|key| {
        assert_eq!(private_lookup(&server, &client, key).as_ref(), Some(&kv_db[key]));
    });
}

#[test_case(LayoutKind::HashBin; "Hash-bin layout")]
#[test_case(LayoutKind::LearnedIndex; "Learned index layout")]
fn test_query_depends_only_on_column(layout: LayoutKind) {
    const NUM_KV_PAIRS: usize = 500;
    const VALUE_BYTE_LEN: usize = 4;
    const SIGMA: f64 = 6.4;

    let config = PirConfig::new(NUM_KV_PAIRS, VALUE_BYTE_LEN, LweParams { dimension: 128, sigma: SIGMA }, layout).unwrap();
    let kv_db = generate_random_kv_database(NUM_KV_PAIRS, VALUE_BYTE_LEN);
    let (_, offline, client) = setup(&config, &kv_db);

    let client_layout = ClientLayout::from_params(&config, &offline.layout_params).unwrap();

    let keys = kv_db.keys().collect::<Vec<_>>();
    let column_of = |key: &[u8]| client_layout.column_of(key, &mut ChaCha8Rng::from_os_rng());

    let (key_a, key_b) = keys
        .iter()
        .flat_map(|&a| keys.iter().map(move |&b| (a, b)))
        .find(|&(a, b)| a != b && column_of(a.as_slice()) == column_of(b.as_slice()))
        .expect("Some pair of keys must share a column");
    let key_c = keys
        .iter()
        .find(|&&key| column_of(key.as_slice()) != column_of(key_a.as_slice()))
        .expect("Some key must be in another column");

    let query_a = serialization::u32s_from_be_bytes(&client.query(key_a).unwrap()).unwrap();
    let query_b = serialization::u32s_from_be_bytes(&client.query(key_b).unwrap()).unwrap();
    let query_c = serialization::u32s_from_be_bytes(&client.query(key_c).unwrap()).unwrap();

    // Two queries differ by the difference of their noise vectors, plus the scaled selectors of their columns.
    let max_noise_diff = 2 * (6.0 * SIGMA).ceil() as u32;
    let is_noise = |diff: u32| diff <= max_noise_diff || diff >= max_noise_diff.wrapping_neg();

    assert!(query_a.iter().zip(&query_b).all(|(&a, &b)| is_noise(a.wrapping_sub(b))));

    let (col_a, col_c) = (column_of(key_a.as_slice()), column_of(key_c.as_slice()));
    for (idx, (&a, &c)) in query_a.iter().zip(&query_c).enumerate() {
        let diff = a.wrapping_sub(c);

        if idx == col_a {
            assert!(is_noise(diff.wrapping_sub(SCALE)));
        } else if idx == col_c {
            assert!(is_noise(diff.wrapping_add(SCALE)));
        } else {
            assert!(is_noise(diff));
        }
    }

    // Fresh noise for every query.
    assert_ne!(client.query(key_a).unwrap(), client.query(key_a).unwrap());
}

#[test]
fn test_hints_are_reusable_across_many_queries() {
    const NUM_KV_PAIRS: usize = 1000;
    const VALUE_BYTE_LEN: usize = 16;
    const NUM_INTERLEAVED_QUERIES: usize = 1000;

    let config = PirConfig::new(NUM_KV_PAIRS, VALUE_BYTE_LEN, LweParams { dimension: 512, sigma: 6.4 }, LayoutKind::HashBin).unwrap();
    let kv_db = generate_random_kv_database(NUM_KV_PAIRS, VALUE_BYTE_LEN);
    let (server, _, client) = setup(&config, &kv_db);

    let mut rng = ChaCha8Rng::from_os_rng();
    let keys = kv_db.keys().collect::<Vec<_>>();

    let (first, second) = (keys[0], keys[1]);
    assert_eq!(private_lookup(&server, &client, first).as_ref(), Some(&kv_db[first]));
    assert_eq!(private_lookup(&server, &client, second).as_ref(), Some(&kv_db[second]));

    // Prepare many queries up-front, then answer and decode them out of order.
    let mut prepared = (0..NUM_INTERLEAVED_QUERIES)
        .map(|_| {
            let key = if rng.random_bool(0.9) { keys.choose(&mut rng).unwrap().to_vec() } else { random_absent_key(&mut rng) };
            let query = client.query(&key).unwrap();
            (key, query)
        })
        .collect::<Vec<_>>();
    prepared.shuffle(&mut rng);

    let num_found = prepared
        .par_iter()
        .map(|(key, query)| {
            let response = server.respond(query).unwrap();
            let received = client.process_response(key, &response).unwrap();

            assert_eq!(received.as_ref(), kv_db.get(key));
            received.is_some()
        })
        .filter(|&found| found)
        .count();

    assert_eq!(num_found, prepared.iter().filter(|(key, _)| kv_db.contains_key(key)).count());

    // Earlier keys still decode the same.
    assert_eq!(private_lookup(&server, &client, first).as_ref(), Some(&kv_db[first]));
    assert_eq!(private_lookup(&server, &client, second).as_ref(), Some(&kv_db[second]));
}

#[test]
fn test_server_rejects_mismatching_database() {
    let config = PirConfig::new(100, 8, LweParams { dimension: 128, sigma: 6.4 }, LayoutKind::HashBin).unwrap();
    let seed = [0u8; SEED_BYTE_LEN];

    let kv_db = generate_random_kv_database(99, 8);
    let kv_db_as_ref = kv_db.iter().map(|(k, v)| (k.as_slice(), v.as_slice())).collect::<HashMap<&[u8], &[u8]>>();
    assert!(matches!(
        Server::setup(&config, &seed, kv_db_as_ref),
        Err(HintPIRError::RecordCountMismatch { expected: 100, found: 99 })
    ));

    let kv_db = generate_random_kv_database(100, 9);
    let kv_db_as_ref = kv_db.iter().map(|(k, v)| (k.as_slice(), v.as_slice())).collect::<HashMap<&[u8], &[u8]>>();
    assert!(matches!(
        Server::setup(&config, &seed, kv_db_as_ref),
        Err(HintPIRError::ValueLengthMismatch { expected: 8, found: 9 })
    ));

    assert!(matches!(Server::setup(&config, &seed, HashMap::new()), Err(HintPIRError::EmptyKVDatabase)));
}

#[test_case(LayoutKind::HashBin; "Hash-bin layout")]
#[test_case(LayoutKind::LearnedIndex; "Learned index layout")]
fn test_wrong_length_payloads_abort(layout: LayoutKind) {
    let config = PirConfig::new(200, 8, LweParams { dimension: 128, sigma: 6.4 }, layout).unwrap();
    let kv_db = generate_random_kv_database(200, 8);
    let (server, offline, client) = setup(&config, &kv_db);

    let key = kv_db.keys().next().unwrap();
    let query = client.query(key).unwrap();

    assert_eq!(server.respond(&query[..query.len() - 4]), Err(HintPIRError::InvalidQueryVector));
    assert_eq!(server.respond(&[query.clone(), vec![0u8; 4]].concat()), Err(HintPIRError::InvalidQueryVector));
    assert_eq!(server.respond(&query[1..]), Err(HintPIRError::InvalidQueryVector));

    let response = server.respond(&query).unwrap();
    assert_eq!(response.len(), config.partition() * server.rows() * 4);
    assert_eq!(client.process_response(key, &response[..response.len() - 1]), Err(HintPIRError::InvalidResponseVector));

    let mut short_hint = offline.hints.clone();
    short_hint[0].pop();
    assert!(matches!(
        Client::setup(&config, &offline.layout_params, &offline.seed, &short_hint),
        Err(HintPIRError::InvalidHintMatrix)
    ));

    let truncated_params = &offline.layout_params[..offline.layout_params.len() - 1];
    assert!(matches!(
        Client::setup(&config, truncated_params, &offline.seed, &offline.hints),
        Err(HintPIRError::InvalidLayoutParams | HintPIRError::InvalidLearnedIndexBytes)
    ));
}

#[test]
fn test_mismatching_seed_fails_to_decode() {
    let config = PirConfig::new(200, 8, LweParams { dimension: 128, sigma: 6.4 }, LayoutKind::HashBin).unwrap();
    let kv_db = generate_random_kv_database(200, 8);
    let (server, offline, _) = setup(&config, &kv_db);

    let mut wrong_seed = offline.seed;
    wrong_seed[0] ^= 0xff;
    let client = Client::setup(&config, &offline.layout_params, &wrong_seed, &offline.hints).unwrap();

    let num_found = kv_db.keys().take(50).filter(|key| private_lookup(&server, &client, key).is_some()).count();
    assert_eq!(num_found, 0);
}
