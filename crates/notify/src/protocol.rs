//! Call-signaling request shape.
//!
//! The capability descriptor is fixed and must match what the provider
//! expects bit for bit. The key-exchange hash is a placeholder: the provider
//! requires one, but the call is only used to ring the contact's device, so
//! any SHA-256 of fresh random bytes will do.

use rand::{Rng, RngCore};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Protocol layer advertised as both minimum and maximum.
pub const CALL_LAYER: i32 = 92;

/// The single library version advertised.
pub const LIBRARY_VERSION: &str = "1.0.0";

/// Size of the random blob hashed into `g_a_hash`.
const KEY_EXCHANGE_BYTES: usize = 256;

/// Upper bound (exclusive) for the per-call random id.
const MAX_RANDOM_ID: i32 = 0x7fff_ffff;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallProtocol {
    pub udp_p2p: bool,
    pub udp_reflector: bool,
    pub min_layer: i32,
    pub max_layer: i32,
    pub library_versions: Vec<String>,
}

impl Default for CallProtocol {
    fn default() -> Self {
        Self {
            udp_p2p: true,
            udp_reflector: true,
            min_layer: CALL_LAYER,
            max_layer: CALL_LAYER,
            library_versions: vec![LIBRARY_VERSION.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRequest {
    pub random_id: i32,
    #[serde(serialize_with = "as_hex")]
    pub g_a_hash: Vec<u8>,
    pub protocol: CallProtocol,
    pub video: bool,
}

impl CallRequest {
    /// A voice-only request with a fresh random id and handshake hash.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let mut blob = [0u8; KEY_EXCHANGE_BYTES];
        rng.fill_bytes(&mut blob);

        Self {
            random_id: rng.random_range(0..MAX_RANDOM_ID),
            g_a_hash: Sha256::digest(blob).to_vec(),
            protocol: CallProtocol::default(),
            video: false,
        }
    }
}

fn as_hex<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    serializer.serialize_str(&hex)
}
