//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! ```text
//! [version: u8][length: u32 BE][payload: bincode-encoded message]
//! ```
//!
//! - Version is currently `1`
//! - One request or response per frame; the transport pairs them
//!
//! The direction determines the message type: request frames decode as
//! [`Request`](sortis_types::Request), response frames as
//! [`Response`](sortis_types::Response).

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Current wire format version.
pub const WIRE_VERSION: u8 = 1;

/// Upper bound on a frame payload. Catch-up chain transfers dominate frame
/// sizes; anything past this is a protocol violation, not a big chain.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unknown wire version: {0}")]
    UnknownVersion(u8),

    #[error("Frame of {0} bytes exceeds the maximum of {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    #[error("Bincode error: {0}")]
    Bincode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode a message to wire format: version byte, length, payload.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, CodecError> {
    let payload = bincode::serialize(message).map_err(|e| CodecError::Bincode(e.to_string()))?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(payload.len()));
    }

    let mut frame = Vec::with_capacity(1 + 4 + payload.len());
    frame.push(WIRE_VERSION);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Write one framed message to the stream.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message from the stream.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, CodecError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; 5];
    reader.read_exact(&mut header).await?;

    let version = header[0];
    if version != WIRE_VERSION {
        return Err(CodecError::UnknownVersion(version));
    }

    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    bincode::deserialize(&payload).map_err(|e| CodecError::Bincode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sortis_types::{
        Block, Hash, Period, Request, Response, Round, SignedVote, UserId, Value, VoteArgs,
        VoteKind,
    };

    fn make_vote_request() -> Request {
        let voter = UserId("3001".into());
        Request::Vote(VoteArgs {
            vote: SignedVote::sign(&voter, Value::Bottom, VoteKind::Next, Period(2)),
            round: Round(1),
            peer: voter,
        })
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let request = make_vote_request();

        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, &request).await.unwrap();
        let decoded: Request = read_frame(&mut server).await.unwrap();

        assert_eq!(decoded, request);
    }

    #[tokio::test]
    async fn test_response_round_trip() {
        let response = Response::Chain {
            peer: UserId("3002".into()),
            chain: vec![Block::new(Hash::ZERO, vec![])],
        };

        let (mut client, mut server) = tokio::io::duplex(4096);
        write_frame(&mut client, &response).await.unwrap();
        let decoded: Response = read_frame(&mut server).await.unwrap();

        assert_eq!(decoded, response);
    }

    #[tokio::test]
    async fn test_unknown_version() {
        let mut frame = encode(&make_vote_request()).unwrap();
        frame[0] = 99;

        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(&frame).await.unwrap();
        let result: Result<Request, _> = read_frame(&mut server).await;

        assert!(matches!(result, Err(CodecError::UnknownVersion(99))));
    }

    #[tokio::test]
    async fn test_oversized_length_is_refused() {
        let mut frame = vec![WIRE_VERSION];
        frame.extend_from_slice(&(u32::MAX).to_be_bytes());

        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(&frame).await.unwrap();
        let result: Result<Request, _> = read_frame(&mut server).await;

        assert!(matches!(result, Err(CodecError::FrameTooLarge(_))));
    }

    #[test]
    fn test_encode_prefixes_version_and_length() {
        let request = make_vote_request();
        let frame = encode(&request).unwrap();

        assert_eq!(frame[0], WIRE_VERSION);
        let len = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]) as usize;
        assert_eq!(len, frame.len() - 5);
    }
}
