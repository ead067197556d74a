//! Protocol Module Tests
//!
//! Validates the frame layout, the fully-drained decode loop, and the packed
//! integer helpers.
//!
//! ## Test Scopes
//! - **Layout**: byte-exact frame structure (length field, tag, payload).
//! - **Decode Discipline**: close-at-any-boundary sentinel vs. malformed-frame errors.
//! - **Payload Integers**: fixed-width big-endian packing, adjacency, bounds.

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use crate::protocol::codec::MAX_FRAME_SIZE;
    use crate::protocol::{
        decode_range, decode_u32, encode_frame, encode_range, encode_u32, read_frame, write_frame,
        Frame, OpCode,
    };

    // ============================================================
    // FRAME LAYOUT
    // ============================================================

    #[test]
    fn test_frame_layout_is_length_tag_payload() {
        let frame = encode_frame(OpCode::Allocate, &[1, 2, 3, 4]).unwrap();

        // Length counts the entire frame: 4 (length) + 2 (tag) + 4 (payload).
        assert_eq!(frame, vec![0, 0, 0, 10, b'A', b'L', 1, 2, 3, 4]);
    }

    #[test]
    fn test_empty_payload_frame_is_six_bytes() {
        let frame = encode_frame(OpCode::Heartbeat, &[]).unwrap();

        assert_eq!(frame, vec![0, 0, 0, 6, b'H', b'B']);
    }

    #[test]
    fn test_every_opcode_tag_round_trips() {
        for op in [
            OpCode::Handshake,
            OpCode::NotNeeded,
            OpCode::Allocate,
            OpCode::Heartbeat,
            OpCode::Found,
        ] {
            assert_eq!(OpCode::from_tag(op.tag()), Some(op));
        }

        assert_eq!(OpCode::from_tag(*b"XY"), None);
    }

    // ============================================================
    // DECODE DISCIPLINE
    // ============================================================

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(256);

        write_frame(&mut client, OpCode::Handshake, b"a1b2c3").await.unwrap();
        write_frame(&mut client, OpCode::Heartbeat, &[]).await.unwrap();

        let first = read_frame(&mut server).await.unwrap();
        assert_eq!(first, Some(Frame::new(OpCode::Handshake, b"a1b2c3".to_vec())));

        let second = read_frame(&mut server).await.unwrap();
        assert_eq!(second, Some(Frame::new(OpCode::Heartbeat, Vec::new())));
    }

    #[tokio::test]
    async fn test_clean_close_yields_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        assert_eq!(read_frame(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_close_mid_length_yields_none() {
        let (mut client, mut server) = tokio::io::duplex(64);

        client.write_all(&[0, 0]).await.unwrap();
        drop(client);

        assert_eq!(read_frame(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_close_mid_payload_yields_none() {
        let (mut client, mut server) = tokio::io::duplex(64);

        // Announces a 4-byte payload but closes after one byte of it.
        client.write_all(&[0, 0, 0, 10, b'A', b'L', 7]).await.unwrap();
        drop(client);

        assert_eq!(read_frame(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_undersized_length_is_a_violation() {
        let (mut client, mut server) = tokio::io::duplex(64);

        client.write_all(&[0, 0, 0, 3]).await.unwrap();

        assert!(read_frame(&mut server).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_length_is_a_violation() {
        let (mut client, mut server) = tokio::io::duplex(64);

        let absurd = (MAX_FRAME_SIZE + 1).to_be_bytes();
        client.write_all(&absurd).await.unwrap();

        assert!(read_frame(&mut server).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_tag_is_a_violation() {
        let (mut client, mut server) = tokio::io::duplex(64);

        client.write_all(&[0, 0, 0, 6, b'X', b'Y']).await.unwrap();

        assert!(read_frame(&mut server).await.is_err());
    }

    // ============================================================
    // PAYLOAD INTEGERS
    // ============================================================

    #[test]
    fn test_u32_packing_round_trips() {
        let packed = encode_u32(4587).unwrap();

        assert_eq!(packed, [0, 0, 0x11, 0xEB]);
        assert_eq!(decode_u32(&packed).unwrap(), 4587);
    }

    #[test]
    fn test_u32_packing_rejects_oversized_values() {
        assert!(encode_u32(u64::from(u32::MAX)).is_ok());
        assert!(encode_u32(u64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn test_u32_unpacking_rejects_wrong_width() {
        assert!(decode_u32(&[1, 2, 3]).is_err());
        assert!(decode_u32(&[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn test_range_fields_are_adjacent_fixed_width() {
        let packed = encode_range(7, 1234).unwrap();

        // start and end sit back to back, no delimiter byte between them.
        assert_eq!(&packed[..4], &[0, 0, 0, 7]);
        assert_eq!(&packed[4..], &[0, 0, 0x04, 0xD2]);
        assert_eq!(decode_range(&packed).unwrap(), (7, 1234));
    }

    #[test]
    fn test_range_unpacking_rejects_malformed_payloads() {
        assert!(decode_range(&[0, 0, 0, 1]).is_err());

        let single = encode_range(10, 10).unwrap();
        assert_eq!(decode_range(&single).unwrap(), (10, 10));

        // start past end is not a meaningful range
        let mut inverted = [0u8; 8];
        inverted[..4].copy_from_slice(&encode_u32(9).unwrap());
        inverted[4..].copy_from_slice(&encode_u32(3).unwrap());
        assert!(decode_range(&inverted).is_err());
    }
}
