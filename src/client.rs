use crate::{
    HintPIRError,
    config::PirConfig,
    pir_internals::{
        branch_opt_util, digest,
        gaussian::GaussianSampler,
        layout::ClientLayout,
        matrix::Matrix,
        params::{DIGEST_BYTE_LEN, SCALE, SEED_BYTE_LEN},
        record, serialization,
        vector::Vector,
    },
};
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

/// What the client keeps from the offline phase: `as = A · s` and `hs_p = hint_p · s` for every plane. The LWE secret `s`,
/// the public matrix `A` and the hints themselves are dropped once these are computed.
#[derive(Clone, Debug)]
pub struct ClientSecret {
    as_vec: Vector,
    hs_vecs: Vec<Vector>,
}

/// Represents a client in the hint-based keyword **P**rivate **I**nformation **R**etrieval scheme.
///
/// A client is set up once, from the offline messages of a server, and can then issue any number of queries, possibly
/// concurrently. Queries don't mutate the client.
#[derive(Clone, Debug)]
pub struct Client {
    config: PirConfig,
    layout: ClientLayout,
    sampler: GaussianSampler,
    secret: ClientSecret,
}

impl Client {
    /// Sets up a client, from the offline messages received from the server.
    ///
    /// # Arguments
    ///
    /// * `config`: Out-of-band configuration, shared with the server.
    /// * `layout_params`: Public parameters of the row layout.
    /// * `seed`: Public seed for generating matrix `A`.
    /// * `hints`: One serialized `rows × dimension` hint matrix per byte-plane.
    ///
    /// # Returns
    ///
    /// A ready-to-query client, or an error if any of the received messages is malformed.
    pub fn setup(config: &PirConfig, layout_params: &[u8], seed: &[u8; SEED_BYTE_LEN], hints: &[Vec<u8>]) -> Result<Client, HintPIRError> {
        let layout = ClientLayout::from_params(config, layout_params)?;
        let sampler = GaussianSampler::new(config.lwe().sigma)?;

        if branch_opt_util::unlikely(hints.len() != config.partition()) {
            return Err(HintPIRError::InvalidHintMatrix);
        }

        let dimension = config.lwe().dimension as u32;
        let rows = u32::try_from(layout.rows()).map_err(|_| HintPIRError::InvalidHintMatrix)?;
        let columns = u32::try_from(layout.columns()).map_err(|_| HintPIRError::InvalidMatrixDimension)?;

        let hint_mats = hints
            .par_iter()
            .map(|hint_bytes| Matrix::from_be_bytes(rows, dimension, hint_bytes).map_err(|_| HintPIRError::InvalidHintMatrix))
            .collect::<Result<Vec<Matrix>, HintPIRError>>()?;

        let pub_mat_a = Matrix::generate_from_seed(columns, dimension, seed)?;

        let mut rng = ChaCha20Rng::from_os_rng();
        let secret_vec_s = Vector::from_values((0..dimension).map(|_| rng.random::<u32>()).collect())?;

        let as_vec = pub_mat_a.mul_vec(&secret_vec_s)?;
        let hs_vecs = hint_mats
            .iter()
            .map(|hint_mat| hint_mat.mul_vec(&secret_vec_s))
            .collect::<Result<Vec<Vector>, HintPIRError>>()?;

        Ok(Client {
            config: *config,
            layout,
            sampler,
            secret: ClientSecret { as_vec, hs_vecs },
        })
    }

    /// Generates a PIR query for the given key, to be sent to the server.
    ///
    /// The query is `as + e + Δ · u_col`, where `e` is fresh Gaussian noise and `u_col` selects the column which holds
    /// `key`. It is serialized as `columns` 32 -bit big-endian integers.
    pub fn query(&self, key: &[u8]) -> Result<Vec<u8>, HintPIRError> {
        let mut rng = ChaCha20Rng::from_os_rng();

        let column = self.layout.column_of(key, &mut rng);
        let error_vec_e = self.sampler.sample_vector(self.layout.columns(), &mut rng)?;

        let mut query_vec = (&self.secret.as_vec + &error_vec_e)?;
        query_vec.add_at(column, SCALE)?;

        Ok(query_vec.to_be_bytes())
    }

    /// Processes the server's response to a query for `key`.
    ///
    /// Every row of the answered column is decoded, and the one starting with the digest of `key` yields the value.
    ///
    /// # Returns
    ///
    /// `Ok(Some(value))` if the key was found, `Ok(None)` if it was not, and an error if the response is malformed. A key
    /// missing from the database and a decoding failure look the same.
    pub fn process_response(&self, key: &[u8], response: &[u8]) -> Result<Option<Vec<u8>>, HintPIRError> {
        let rows = self.layout.rows();
        let partition = self.config.partition();

        if branch_opt_util::unlikely(response.len() != partition * rows * std::mem::size_of::<u32>()) {
            return Err(HintPIRError::InvalidResponseVector);
        }
        let response_words = serialization::u32s_from_be_bytes(response).ok_or(HintPIRError::InvalidResponseVector)?;

        let key_digest = digest::key_digest(key);
        let decode_at = |row: usize, plane: usize| {
            let noisy = response_words[plane * rows + row].wrapping_sub(self.secret.hs_vecs[plane][row]);
            record::decode_byte(noisy)
        };

        for row in 0..rows {
            let decoded_digest = (0..DIGEST_BYTE_LEN).map(|plane| decode_at(row, plane)).collect::<Vec<u8>>();

            if record::starts_with_digest(&decoded_digest, &key_digest) {
                let value = (DIGEST_BYTE_LEN..partition).map(|plane| decode_at(row, plane)).collect::<Vec<u8>>();
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    #[inline(always)]
    pub fn config(&self) -> &PirConfig {
        &self.config
    }
}

#[cfg(test)]
mod test {
    use crate::{
        client::Client,
        config::{LayoutKind, LweParams, PirConfig},
        pir_internals::{error::HintPIRError, params::SEED_BYTE_LEN},
        server::Server,
    };
    use std::collections::HashMap;

    fn setup_pair() -> (PirConfig, Server, Client) {
        let kv = (0u32..64).map(|i| (i.to_be_bytes(), (i * 3).to_le_bytes())).collect::<Vec<_>>();
        let db = kv.iter().map(|(k, v)| (k.as_slice(), v.as_slice())).collect::<HashMap<&[u8], &[u8]>>();

        let config = PirConfig::new(64, 4, LweParams { dimension: 64, sigma: 6.4 }, LayoutKind::HashBin).unwrap();
        let seed = [7u8; SEED_BYTE_LEN];

        let (server, offline) = Server::setup(&config, &seed, db).unwrap();
        let client = Client::setup(&config, &offline.layout_params, &offline.seed, &offline.hints).unwrap();

        (config, server, client)
    }

    #[test]
    fn query_has_one_word_per_column() {
        let (config, _, client) = setup_pair();
        assert_eq!(client.query(b"anything").unwrap().len(), config.columns() * 4);
    }

    #[test]
    fn malformed_responses_are_rejected() {
        let (_, server, client) = setup_pair();

        let key = 5u32.to_be_bytes();
        let response = server.respond(&client.query(&key).unwrap()).unwrap();

        assert_eq!(client.process_response(&key, &response), Ok(Some(15u32.to_le_bytes().to_vec())));
        assert_eq!(client.process_response(&key, &response[4..]), Err(HintPIRError::InvalidResponseVector));
        assert_eq!(client.process_response(&key, &[]), Err(HintPIRError::InvalidResponseVector));
    }

    #[test]
    fn hints_must_match_configured_dimensions() {
        let kv = (0u32..64).map(|i| (i.to_be_bytes(), i.to_le_bytes())).collect::<Vec<_>>();
        let db = kv.iter().map(|(k, v)| (k.as_slice(), v.as_slice())).collect::<HashMap<&[u8], &[u8]>>();

        let config = PirConfig::new(64, 4, LweParams { dimension: 64, sigma: 6.4 }, LayoutKind::HashBin).unwrap();
        let (_, offline) = Server::setup(&config, &[1u8; SEED_BYTE_LEN], db).unwrap();

        let mut missing_plane = offline.hints.clone();
        missing_plane.pop();
        assert!(matches!(
            Client::setup(&config, &offline.layout_params, &offline.seed, &missing_plane),
            Err(HintPIRError::InvalidHintMatrix)
        ));

        let mut truncated = offline.hints.clone();
        let truncated_len = truncated[3].len() - 4;
        truncated[3].truncate(truncated_len);
        assert!(matches!(
            Client::setup(&config, &offline.layout_params, &offline.seed, &truncated),
            Err(HintPIRError::InvalidHintMatrix)
        ));

        let other_config = PirConfig::new(64, 4, LweParams { dimension: 128, sigma: 6.4 }, LayoutKind::HashBin).unwrap();
        assert!(matches!(
            Client::setup(&other_config, &offline.layout_params, &offline.seed, &offline.hints),
            Err(HintPIRError::InvalidHintMatrix)
        ));
    }
}
