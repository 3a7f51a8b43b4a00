//! `packet_codec` 集成测试：长度前缀分帧的编解码契约。
//!
//! # 测试目标（Why）
//! - 编码产物必须能被同一前缀宽度的解码器原样还原，且在任意切分下成立；
//! - 线格式字节必须与约定一致（前缀、id、负载依次排列）；
//! - 零长度负载与超限负载两个边界必须有确定行为。

mod support;

use bytes::Bytes;
use proptest::prelude::*;
use spark_socket::{LengthPrefix, Packet, PacketCodec, PacketHeader, SocketError};
use support::ScriptedTransport;

fn prefix_strategy() -> impl Strategy<Value = LengthPrefix> {
    prop_oneof![Just(LengthPrefix::U8), Just(LengthPrefix::U16)]
}

proptest! {
    /// 编码后的字节经任意切分回灌给解码器，得到同一报文。
    #[test]
    fn encoded_packets_decode_under_any_chunking(
        prefix in prefix_strategy(),
        id in any::<u8>(),
        payload in proptest::collection::vec(any::<u8>(), 0..=255),
        chunk in 1usize..8,
    ) {
        let packet = Packet::new(id, payload);
        let mut sender = ScriptedTransport::new();
        sender.send_packet(&packet, prefix).expect("编码不应失败");
        prop_assert_eq!(sender.outbound.len(), prefix.width() + 1 + packet.len());

        let mut receiver = ScriptedTransport::new()
            .with_inbound(&sender.outbound)
            .with_chunk(chunk);
        let decoded = receiver.decode_packet(prefix).expect("解码不应失败");
        prop_assert_eq!(decoded, packet);
        prop_assert_eq!(receiver.remaining(), 0);
    }
}

/// id 5、16 位前缀、负载 `[0,1,2,4,5]` 在小端主机上的线格式。
#[cfg(target_endian = "little")]
#[test]
fn wire_layout_matches_host_order_prefix() {
    let mut sender = ScriptedTransport::new();
    sender
        .send_packet(&Packet::new(5, vec![0u8, 1, 2, 4, 5]), LengthPrefix::U16)
        .expect("编码");
    assert_eq!(sender.outbound, vec![5, 0, 5, 0, 1, 2, 4, 5]);
}

#[test]
fn encode_packet_sends_header_then_payload() {
    let mut sender = ScriptedTransport::new();
    sender.encode_packet(&[3, 7], b"abc").expect("编码");
    assert_eq!(sender.outbound, b"\x03\x07abc");
    assert_eq!(sender.calls, 2);
}

#[test]
fn zero_length_payload_round_trips() {
    let mut sender = ScriptedTransport::new();
    sender
        .send_packet(&Packet::new(42, Bytes::new()), LengthPrefix::U16)
        .expect("空负载编码");
    assert_eq!(sender.calls, 1);

    let mut receiver = ScriptedTransport::new().with_inbound(&sender.outbound);
    let header = receiver.decode_header(LengthPrefix::U16).expect("帧头");
    assert_eq!(
        header,
        PacketHeader {
            id: 42,
            payload_len: 0
        }
    );
}

/// 连续的两帧在同一流上依次解出。
#[test]
fn consecutive_frames_stay_aligned() {
    let mut sender = ScriptedTransport::new();
    sender
        .send_packet(&Packet::new(1, b"first".to_vec()), LengthPrefix::U8)
        .expect("第一帧");
    sender
        .send_packet(&Packet::new(2, b"second!".to_vec()), LengthPrefix::U8)
        .expect("第二帧");

    let mut receiver = ScriptedTransport::new()
        .with_inbound(&sender.outbound)
        .with_chunk(3);
    let first = receiver.decode_packet(LengthPrefix::U8).expect("第一帧");
    let second = receiver.decode_packet(LengthPrefix::U8).expect("第二帧");
    assert_eq!((first.id(), &first.payload()[..]), (1, &b"first"[..]));
    assert_eq!((second.id(), &second.payload()[..]), (2, &b"second!"[..]));
}

#[test]
fn oversized_payload_never_reaches_the_wire() {
    let mut sender = ScriptedTransport::new();
    let err = sender
        .send_packet(&Packet::new(1, vec![0u8; 300]), LengthPrefix::U8)
        .expect_err("超过单字节前缀上限");
    assert!(matches!(err, SocketError::PayloadTooLarge { len: 300, max: 255 }));
    assert_eq!(sender.calls, 0);
}

/// 负载截断时返回负载那一步的接收失败。
#[test]
fn truncated_payload_fails_decode() {
    let mut receiver = ScriptedTransport::new().with_inbound(&[4, 9, b'a', b'b']);
    let err = receiver
        .decode_packet(LengthPrefix::U8)
        .expect_err("负载不足");
    assert!(matches!(
        err,
        SocketError::ReceiveFailed {
            expected: 4,
            transferred: 2,
            ..
        }
    ));
}
