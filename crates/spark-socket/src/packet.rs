//! 长度前缀分帧：`长度前缀 | 1 字节报文 id | 负载`。
//!
//! ## 线格式（What）
//! - 长度前缀宽度由 [`LengthPrefix`] 选定，取值为负载字节数（不含前缀与 id）；
//! - 16 位前缀按**主机字节序**编码，异构字节序的两端互通时需要在上层自行约定；
//! - id 紧跟在前缀之后，负载紧跟在 id 之后，帧之间没有分隔符。

use crate::{
    error::{Result, SocketError},
    stream::ReliableByteStream,
    types::MsgFlags,
};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

/// 长度前缀的宽度。
///
/// # 教案式注释
///
/// ## 契约 (What)
/// - `U8`：单字节，零扩展为负载长度，上限 255；
/// - `U16`：两字节主机字节序，上限 65535；
/// - 编码时负载超出上限返回 [`SocketError::PayloadTooLarge`]，解码侧不做上限检查。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum LengthPrefix {
    U8,
    #[default]
    U16,
}

impl LengthPrefix {
    pub const fn width(self) -> usize {
        match self {
            LengthPrefix::U8 => 1,
            LengthPrefix::U16 => 2,
        }
    }

    pub const fn max_payload(self) -> usize {
        match self {
            LengthPrefix::U8 => u8::MAX as usize,
            LengthPrefix::U16 => u16::MAX as usize,
        }
    }

    /// 把负载长度写入 `dst`。
    pub fn put_len(self, len: usize, dst: &mut BytesMut) -> Result<()> {
        match self {
            LengthPrefix::U8 => {
                let value = u8::try_from(len).map_err(|_| self.too_large(len))?;
                dst.put_u8(value);
            }
            LengthPrefix::U16 => {
                let value = u16::try_from(len).map_err(|_| self.too_large(len))?;
                dst.put_u16_ne(value);
            }
        }
        Ok(())
    }

    /// 从恰好 `width()` 字节的前缀中解出负载长度。
    pub fn decode(self, raw: &[u8]) -> u16 {
        match (self, raw) {
            (LengthPrefix::U8, [value, ..]) => u16::from(*value),
            (LengthPrefix::U16, [lo, hi, ..]) => u16::from_ne_bytes([*lo, *hi]),
            _ => 0,
        }
    }

    fn too_large(self, len: usize) -> SocketError {
        SocketError::PayloadTooLarge {
            len,
            max: self.max_payload(),
        }
    }
}

/// 已读出的帧头。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PacketHeader {
    pub id: u8,
    pub payload_len: u16,
}

/// 一个完整的报文：id 加负载。
///
/// 负载以 [`Bytes`] 持有，克隆与切片都不复制底层数据。
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Packet {
    id: u8,
    payload: Bytes,
}

impl Packet {
    pub fn new(id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// 按给定前缀宽度生成 `长度前缀 | id` 帧头字节。
    pub fn header(&self, prefix: LengthPrefix) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(prefix.width() + 1);
        prefix.put_len(self.payload.len(), &mut dst)?;
        dst.put_u8(self.id);
        Ok(dst.freeze())
    }
}

/// 基于 [`ReliableByteStream`] 的报文编解码。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 分帧只依赖“恰好 N 字节”的收发保证，因此以扩展 trait 的形式挂在任何可靠字节流之上，
///   既服务真实连接，也能直接在内存桩上测试。
///
/// ## 逻辑 (How)
/// - 解码：先 `recv_exact(width)` 取前缀，再 `recv_exact(1)` 取 id，最后按长度取负载；
/// - 编码：帧头与负载各自一次 `send_exact`，不合并成单个缓冲。
///
/// ## 契约 (What)
/// - 解码侧每一步都使用空标志位，任一步失败都以该步的
///   [`SocketError::ReceiveFailed`] 原样返回，已读出的部分帧被丢弃；
/// - 编码侧帧头与负载之间没有事务性：帧头发送成功而负载失败时，对端会看到半个帧；
/// - 长度为 0 的负载不会触发任何负载收发。
///
/// ## 注意事项 (Trade-offs)
/// - 解码后流的位置紧贴在下一帧之前，同一连接上可以连续调用而无需额外同步。
pub trait PacketCodec: ReliableByteStream {
    /// 读取 `长度前缀 | id`。
    fn decode_header(&mut self, prefix: LengthPrefix) -> Result<PacketHeader> {
        let raw_len = self.recv_exact(prefix.width(), MsgFlags::empty())?;
        let payload_len = prefix.decode(&raw_len);
        let raw_id = self.recv_exact(1, MsgFlags::empty())?;
        let id = raw_id.first().copied().unwrap_or_default();
        trace!(id, payload_len, "decoded packet header");
        Ok(PacketHeader { id, payload_len })
    }

    /// 读取一个完整报文。
    fn decode_packet(&mut self, prefix: LengthPrefix) -> Result<Packet> {
        let header = self.decode_header(prefix)?;
        let payload = self.recv_exact(usize::from(header.payload_len), MsgFlags::empty())?;
        Ok(Packet::new(header.id, payload))
    }

    /// 原样发送已构造好的帧头字节。
    fn encode_header(&mut self, header: &[u8]) -> Result<()> {
        self.send_exact(header, MsgFlags::empty())
    }

    /// 先发送帧头，再发送负载。
    fn encode_packet(&mut self, header: &[u8], payload: &[u8]) -> Result<()> {
        self.encode_header(header)?;
        self.send_exact(payload, MsgFlags::empty())?;
        trace!(
            header_len = header.len(),
            payload_len = payload.len(),
            "encoded packet"
        );
        Ok(())
    }

    /// 由 [`Packet`] 构造帧头并发送整个报文。
    fn send_packet(&mut self, packet: &Packet, prefix: LengthPrefix) -> Result<()> {
        let header = packet.header(prefix)?;
        self.encode_packet(&header, packet.payload())
    }
}

impl<T: ReliableByteStream + ?Sized> PacketCodec for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Direction, stream::RawTransport};
    use std::{collections::VecDeque, io};

    #[derive(Default)]
    struct Wire {
        inbound: VecDeque<u8>,
        outbound: Vec<u8>,
        sends: usize,
    }

    impl RawTransport for Wire {
        fn raw_send(&mut self, buf: &[u8], _flags: MsgFlags) -> Result<usize> {
            self.sends += 1;
            self.outbound.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn raw_recv(&mut self, buf: &mut [u8], _flags: MsgFlags) -> Result<usize> {
            if self.inbound.is_empty() {
                return Err(SocketError::transfer(
                    Direction::Recv,
                    io::Error::from(io::ErrorKind::UnexpectedEof),
                ));
            }
            let n = buf.len().min(self.inbound.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.inbound.pop_front().unwrap_or_default();
            }
            Ok(n)
        }

        fn raw_read(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.raw_recv(buf, MsgFlags::empty())
        }

        fn raw_write(&mut self, buf: &[u8]) -> Result<usize> {
            self.raw_send(buf, MsgFlags::empty())
        }
    }

    #[test]
    fn u8_prefix_is_zero_extended() {
        assert_eq!(LengthPrefix::U8.decode(&[0xff]), 255);
        assert_eq!(LengthPrefix::U8.width(), 1);
    }

    #[test]
    fn u16_prefix_uses_host_byte_order() {
        let raw = 0x1234u16.to_ne_bytes();
        assert_eq!(LengthPrefix::U16.decode(&raw), 0x1234);
        let mut dst = BytesMut::new();
        LengthPrefix::U16.put_len(0x1234, &mut dst).expect("长度可表达");
        assert_eq!(&dst[..], &raw);
    }

    #[test]
    fn oversized_payload_is_rejected_on_encode() {
        let packet = Packet::new(1, vec![0u8; 256]);
        let err = packet.header(LengthPrefix::U8).expect_err("256 超出单字节前缀");
        assert!(matches!(err, SocketError::PayloadTooLarge { len: 256, max: 255 }));
        assert!(packet.header(LengthPrefix::U16).is_ok());
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn decode_reads_header_then_payload() {
        let mut wire = Wire {
            inbound: [5u8, 0, 5, 0, 1, 2, 4, 5].into_iter().collect(),
            ..Wire::default()
        };
        let packet = wire.decode_packet(LengthPrefix::U16).expect("完整报文");
        assert_eq!(packet.id(), 5);
        assert_eq!(&packet.payload()[..], &[0, 1, 2, 4, 5]);
        assert!(wire.inbound.is_empty());
    }

    #[test]
    fn empty_payload_skips_payload_send() {
        let mut wire = Wire::default();
        wire.send_packet(&Packet::new(9, Bytes::new()), LengthPrefix::U8)
            .expect("空负载");
        assert_eq!(wire.outbound, vec![0, 9]);
        assert_eq!(wire.sends, 1);
    }

    #[test]
    fn truncated_header_reports_receive_failure() {
        let mut wire = Wire {
            inbound: [3u8].into_iter().collect(),
            ..Wire::default()
        };
        let err = wire.decode_header(LengthPrefix::U8).expect_err("缺少 id");
        assert!(matches!(
            err,
            SocketError::ReceiveFailed {
                expected: 1,
                transferred: 0,
                ..
            }
        ));
    }
}
