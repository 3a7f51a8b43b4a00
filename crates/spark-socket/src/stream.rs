use crate::{
    error::{Direction, Result, SocketError},
    types::MsgFlags,
};
use bytes::Bytes;
use std::io;
use tracing::trace;

/// 单次原始传输原语。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 作为 [`Connection`](crate::Connection) 与 [`ReliableByteStream`] 之间的接缝，
///   让完整性策略与分帧协议可以运行在任意“每次调用只保证部分进展”的传输之上。
///
/// ## 契约 (What)
/// - 每个方法恰好发起一次底层传输；
/// - 返回正数表示正常的部分传输；0 字节或错误应报告为
///   [`SocketError::TransferFailed`]（调用方也会把意外的 `Ok(0)` 视为失败）；
/// - `raw_recv`/`raw_read` 只写入 `buf` 的前缀，返回值不得超过 `buf.len()`。
pub trait RawTransport {
    fn raw_send(&mut self, buf: &[u8], flags: MsgFlags) -> Result<usize>;

    fn raw_recv(&mut self, buf: &mut [u8], flags: MsgFlags) -> Result<usize>;

    fn raw_read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn raw_write(&mut self, buf: &[u8]) -> Result<usize>;
}

impl<T: RawTransport + ?Sized> RawTransport for &mut T {
    fn raw_send(&mut self, buf: &[u8], flags: MsgFlags) -> Result<usize> {
        (**self).raw_send(buf, flags)
    }

    fn raw_recv(&mut self, buf: &mut [u8], flags: MsgFlags) -> Result<usize> {
        (**self).raw_recv(buf, flags)
    }

    fn raw_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).raw_read(buf)
    }

    fn raw_write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).raw_write(buf)
    }
}

/// 保证完整的字节流传输：要么恰好传输请求的字节数，要么明确失败。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 操作系统的流式传输允许少于请求的字节数；所有分帧数据的消费者都需要
///   “恰好 N 字节”的保证，因此把“重试或失败”的策略集中在这一处，而不是散落在各个调用点。
///
/// ## 逻辑 (How)
/// - `recv_exact`/`read_exact`：预先分配恰好 `len` 字节的缓冲，以“已填充偏移”这一普通整数
///   状态驱动循环，每次把下一段写入 `buf[filled..]`，直到填满；
/// - `send_exact`/`write_exact`：只发起一次调用，并严格比较返回值与缓冲长度。
///
/// ## 契约 (What)
/// - 接收侧任何一次调用返回 0 字节或错误都会终止整个操作并返回
///   [`SocketError::ReceiveFailed`]，已累积的字节被丢弃，调用方拿不到半满的缓冲；
/// - 发送侧短写即返回 [`SocketError::SendFailed`]，不做重试；
/// - 长度为 0 的请求直接成功，不触达底层传输。
///
/// ## 注意事项 (Trade-offs)
/// - 收发不对称是有意保留的行为：把发送改成循环会改变短写条件下可观测的失败语义。
///   需要循环写满的调用方应在上层自行处理。
pub trait ReliableByteStream: RawTransport {
    /// 循环调用带标志位的 `recv`，直到恰好收满 `len` 字节。
    fn recv_exact(&mut self, len: usize, flags: MsgFlags) -> Result<Bytes> {
        fill_exact(len, Direction::Recv, |buf| self.raw_recv(buf, flags))
    }

    /// 循环调用无标志位的 `read`，直到恰好读满 `len` 字节。
    fn read_exact(&mut self, len: usize) -> Result<Bytes> {
        fill_exact(len, Direction::Read, |buf| self.raw_read(buf))
    }

    /// 单次 `send`，内核必须一次接受全部字节。
    fn send_exact(&mut self, buf: &[u8], flags: MsgFlags) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let outcome = self.raw_send(buf, flags);
        check_whole(Direction::Send, buf.len(), outcome)
    }

    /// 单次 `write`，策略与 [`ReliableByteStream::send_exact`] 相同。
    fn write_exact(&mut self, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let outcome = self.raw_write(buf);
        check_whole(Direction::Write, buf.len(), outcome)
    }
}

impl<T: RawTransport + ?Sized> ReliableByteStream for T {}

fn fill_exact<F>(len: usize, direction: Direction, mut pull: F) -> Result<Bytes>
where
    F: FnMut(&mut [u8]) -> Result<usize>,
{
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let chunk = match pull(&mut buf[filled..]) {
            Ok(0) => Err(SocketError::transfer(
                direction,
                io::Error::new(io::ErrorKind::UnexpectedEof, "zero bytes transferred"),
            )),
            other => other,
        };
        match chunk {
            Ok(transferred) => {
                filled += transferred.min(len - filled);
                trace!(%direction, expected = len, filled, "accumulated chunk");
            }
            Err(cause) => {
                return Err(SocketError::ReceiveFailed {
                    direction,
                    expected: len,
                    transferred: filled,
                    source: Box::new(cause),
                });
            }
        }
    }
    Ok(Bytes::from(buf))
}

fn check_whole(direction: Direction, expected: usize, outcome: Result<usize>) -> Result<()> {
    match outcome {
        Ok(transferred) if transferred == expected => Ok(()),
        Ok(transferred) => Err(SocketError::SendFailed {
            direction,
            expected,
            transferred,
            source: None,
        }),
        Err(cause) => Err(SocketError::SendFailed {
            direction,
            expected,
            transferred: 0,
            source: Some(Box::new(cause)),
        }),
    }
}
