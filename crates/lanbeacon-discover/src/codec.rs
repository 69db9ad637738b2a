//! Envelope framing for discovery datagrams.
//!
//! Wire layout:
//!
//! ```text
//! +----------------------+---------------------------+
//! | handshake (u64, BE)  | payload (codec-defined)   |
//! +----------------------+---------------------------+
//!        8 bytes              rest of the datagram
//! ```
//!
//! There is no magic number, length prefix or checksum. One datagram
//! carries exactly one envelope.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DiscoverError;
use crate::identity::HandshakeId;

/// Largest payload a single UDP/IPv4 datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Boxed error returned by payload codecs.
pub type CodecError = Box<dyn std::error::Error + Send + Sync>;

/// Serializes request and response bodies.
pub trait PayloadCodec: Send + Sync + 'static {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON payload codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Encode `payload` behind `handshake`.
pub fn encode<C, T>(codec: &C, handshake: HandshakeId, payload: &T) -> Result<Vec<u8>, DiscoverError>
where
    C: PayloadCodec,
    T: Serialize,
{
    let body = codec
        .encode(payload)
        .map_err(|e| DiscoverError::Encoding(e.to_string()))?;

    let total = HandshakeId::LEN + body.len();
    if total > MAX_DATAGRAM_SIZE {
        return Err(DiscoverError::Encoding(format!(
            "envelope is {total} bytes, limit is {MAX_DATAGRAM_SIZE}"
        )));
    }

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&handshake.to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Split a datagram into its handshake and the undecoded payload bytes.
pub fn split(bytes: &[u8]) -> Result<(HandshakeId, &[u8]), DiscoverError> {
    if bytes.len() < HandshakeId::LEN {
        return Err(DiscoverError::MalformedEnvelope(format!(
            "{} bytes is shorter than the {}-byte handshake",
            bytes.len(),
            HandshakeId::LEN
        )));
    }
    let (head, rest) = bytes.split_at(HandshakeId::LEN);
    let mut raw = [0u8; HandshakeId::LEN];
    raw.copy_from_slice(head);
    Ok((HandshakeId::from_be_bytes(raw), rest))
}

/// Decode a full envelope.
pub fn decode<C, T>(codec: &C, bytes: &[u8]) -> Result<(HandshakeId, T), DiscoverError>
where
    C: PayloadCodec,
    T: DeserializeOwned,
{
    let (handshake, body) = split(bytes)?;
    let payload = codec
        .decode(body)
        .map_err(|e| DiscoverError::MalformedEnvelope(e.to_string()))?;
    Ok((handshake, payload))
}
