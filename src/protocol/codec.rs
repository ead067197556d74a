//! Frame Encoding and Decoding
//!
//! The decode path drains each part of a frame fully (tokio's `read_exact`
//! retries partial reads until satisfied or the stream closes). A peer that
//! closes the connection at *any* frame boundary (before the length field,
//! mid-tag, or mid-payload) produces the single `Ok(None)` sentinel rather
//! than an error; only malformed frames (bad length, unknown tag) error out.

use std::io::ErrorKind;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::types::{Frame, OpCode, FRAME_OVERHEAD, LEN_FIELD_SIZE, OP_FIELD_SIZE};

/// Upper bound on an inbound frame. The largest legitimate frame is a
/// handshake reply carrying a digest string; anything near this limit is a
/// corrupt length field, not real traffic.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024;

/// Size of one packed integer inside a payload.
pub const INT_FIELD_SIZE: usize = 4;

/// Builds a complete frame: length field, operation tag, payload.
///
/// Fails only if the payload is so large the total length would overflow the
/// 4-byte length field.
pub fn encode_frame(op: OpCode, payload: &[u8]) -> Result<Vec<u8>> {
    let total = payload
        .len()
        .checked_add(FRAME_OVERHEAD)
        .and_then(|len| u32::try_from(len).ok())
        .context("payload too large for the frame length field")?;

    let mut frame = Vec::with_capacity(total as usize);
    frame.extend_from_slice(&total.to_be_bytes());
    frame.extend_from_slice(&op.tag());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Encodes and writes one frame, flushing the stream.
pub async fn write_frame<W>(writer: &mut W, op: OpCode, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(op, payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads exactly one frame off the stream.
///
/// Returns `Ok(None)` when the peer has closed the connection, whether at a
/// clean frame boundary or mid-frame. Returns `Err` for protocol violations:
/// a length below the frame overhead, a length above [`MAX_FRAME_SIZE`], or
/// an operation tag outside the protocol.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; LEN_FIELD_SIZE];
    if read_or_eof(reader, &mut len_buf).await?.is_none() {
        return Ok(None);
    }
    let total = u32::from_be_bytes(len_buf);

    if (total as usize) < FRAME_OVERHEAD {
        bail!("frame length {} below the {}-byte minimum", total, FRAME_OVERHEAD);
    }
    if total > MAX_FRAME_SIZE {
        bail!("frame length {} exceeds the {}-byte limit", total, MAX_FRAME_SIZE);
    }

    let mut tag = [0u8; OP_FIELD_SIZE];
    if read_or_eof(reader, &mut tag).await?.is_none() {
        return Ok(None);
    }
    let op = match OpCode::from_tag(tag) {
        Some(op) => op,
        None => bail!("unknown operation tag {:?}", tag),
    };

    let mut payload = vec![0u8; total as usize - FRAME_OVERHEAD];
    if !payload.is_empty() && read_or_eof(reader, &mut payload).await?.is_none() {
        return Ok(None);
    }

    Ok(Some(Frame::new(op, payload)))
}

/// `read_exact` that maps a close (even mid-buffer) to `Ok(None)`.
async fn read_or_eof<R>(reader: &mut R, buf: &mut [u8]) -> Result<Option<()>>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(Some(())),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Spawns a sidecar task that decodes frames off `reader` and forwards them
/// over the returned channel. The channel closing is the caller's single
/// "connection gone" signal: the sidecar stops on peer close, on an I/O
/// error, or on a malformed frame (logged at debug, since a broken peer is
/// an ordinary disconnect, not a server fault).
pub fn spawn_frame_reader<R>(mut reader: R) -> mpsc::Receiver<Frame>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(frame)) => {
                    if tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("dropping connection: {:#}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Packs an integer into the fixed 4-byte big-endian payload field.
///
/// Values above `u32::MAX` do not fit the wire representation; this is the
/// domain-size bound of the whole system.
pub fn encode_u32(value: u64) -> Result<[u8; INT_FIELD_SIZE]> {
    let narrowed =
        u32::try_from(value).with_context(|| format!("{} does not fit a 4-byte wire integer", value))?;
    Ok(narrowed.to_be_bytes())
}

/// Unpacks one fixed 4-byte big-endian integer; the payload must be exactly
/// the integer, nothing more.
pub fn decode_u32(payload: &[u8]) -> Result<u64> {
    let bytes: [u8; INT_FIELD_SIZE] = payload
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected a 4-byte integer payload, got {} bytes", payload.len()))?;
    Ok(u32::from_be_bytes(bytes) as u64)
}

/// Packs an inclusive `(start, end)` pair as two adjacent 4-byte big-endian
/// integers, no delimiter.
pub fn encode_range(start: u64, end: u64) -> Result<[u8; 2 * INT_FIELD_SIZE]> {
    let mut packed = [0u8; 2 * INT_FIELD_SIZE];
    packed[..INT_FIELD_SIZE].copy_from_slice(&encode_u32(start)?);
    packed[INT_FIELD_SIZE..].copy_from_slice(&encode_u32(end)?);
    Ok(packed)
}

/// Unpacks an inclusive `(start, end)` pair packed by [`encode_range`].
pub fn decode_range(payload: &[u8]) -> Result<(u64, u64)> {
    if payload.len() != 2 * INT_FIELD_SIZE {
        bail!("expected an 8-byte range payload, got {} bytes", payload.len());
    }
    let start = decode_u32(&payload[..INT_FIELD_SIZE])?;
    let end = decode_u32(&payload[INT_FIELD_SIZE..])?;
    if start > end {
        bail!("range start {} is past its end {}", start, end);
    }
    Ok((start, end))
}
