use socket2::Socket;
use std::{fmt, io, time::Duration};

/// 可读写的套接字选项种类。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SocketOptionKind {
    ReuseAddress,
    KeepAlive,
    ReadTimeout,
    WriteTimeout,
    Linger,
    RecvBufferSize,
    SendBufferSize,
    NoSigPipe,
}

impl SocketOptionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            SocketOptionKind::ReuseAddress => "SO_REUSEADDR",
            SocketOptionKind::KeepAlive => "SO_KEEPALIVE",
            SocketOptionKind::ReadTimeout => "SO_RCVTIMEO",
            SocketOptionKind::WriteTimeout => "SO_SNDTIMEO",
            SocketOptionKind::Linger => "SO_LINGER",
            SocketOptionKind::RecvBufferSize => "SO_RCVBUF",
            SocketOptionKind::SendBufferSize => "SO_SNDBUF",
            SocketOptionKind::NoSigPipe => "SO_NOSIGPIPE",
        }
    }
}

impl fmt::Display for SocketOptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 带取值的套接字选项，读写均原样透传给操作系统。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 以类型化的枚举替代 `level/option/value` 裸指针三元组，避免调用方直接操作
///   平台相关常量与长度参数；
/// - 阻塞调用的超时只能通过 `ReadTimeout`/`WriteTimeout` 在调用前配置，
///   本 crate 不提供其它取消手段。
///
/// ## 契约 (What)
/// - `set_option` 成功后选项已在内核生效，失败时返回
///   [`SocketError::OptionFailed`](crate::SocketError::OptionFailed)；
/// - `NoSigPipe` 仅在 Apple 平台映射到 `SO_NOSIGPIPE`；其它平台没有对应的套接字选项：
///   Rust 运行时已忽略 `SIGPIPE`，因此写入 `true` 为空操作，写入 `false` 与读取都返回
///   `Unsupported`，不伪造内核状态。
///
/// ## 注意事项 (Trade-offs)
/// - Linux 会把 `Linger` 向下取整到秒，缓冲区大小也可能被内核翻倍，读回值不保证与写入值相等。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SocketOption {
    ReuseAddress(bool),
    KeepAlive(bool),
    ReadTimeout(Option<Duration>),
    WriteTimeout(Option<Duration>),
    Linger(Option<Duration>),
    RecvBufferSize(usize),
    SendBufferSize(usize),
    NoSigPipe(bool),
}

impl SocketOption {
    pub fn kind(&self) -> SocketOptionKind {
        match self {
            SocketOption::ReuseAddress(_) => SocketOptionKind::ReuseAddress,
            SocketOption::KeepAlive(_) => SocketOptionKind::KeepAlive,
            SocketOption::ReadTimeout(_) => SocketOptionKind::ReadTimeout,
            SocketOption::WriteTimeout(_) => SocketOptionKind::WriteTimeout,
            SocketOption::Linger(_) => SocketOptionKind::Linger,
            SocketOption::RecvBufferSize(_) => SocketOptionKind::RecvBufferSize,
            SocketOption::SendBufferSize(_) => SocketOptionKind::SendBufferSize,
            SocketOption::NoSigPipe(_) => SocketOptionKind::NoSigPipe,
        }
    }
}

pub(crate) fn apply(socket: &Socket, option: SocketOption) -> io::Result<()> {
    match option {
        SocketOption::ReuseAddress(on) => socket.set_reuse_address(on),
        SocketOption::KeepAlive(on) => socket.set_keepalive(on),
        SocketOption::ReadTimeout(timeout) => socket.set_read_timeout(timeout),
        SocketOption::WriteTimeout(timeout) => socket.set_write_timeout(timeout),
        SocketOption::Linger(linger) => socket.set_linger(linger),
        SocketOption::RecvBufferSize(size) => socket.set_recv_buffer_size(size),
        SocketOption::SendBufferSize(size) => socket.set_send_buffer_size(size),
        SocketOption::NoSigPipe(on) => set_nosigpipe(socket, on),
    }
}

pub(crate) fn read(socket: &Socket, kind: SocketOptionKind) -> io::Result<SocketOption> {
    Ok(match kind {
        SocketOptionKind::ReuseAddress => SocketOption::ReuseAddress(socket.reuse_address()?),
        SocketOptionKind::KeepAlive => SocketOption::KeepAlive(socket.keepalive()?),
        SocketOptionKind::ReadTimeout => SocketOption::ReadTimeout(socket.read_timeout()?),
        SocketOptionKind::WriteTimeout => SocketOption::WriteTimeout(socket.write_timeout()?),
        SocketOptionKind::Linger => SocketOption::Linger(socket.linger()?),
        SocketOptionKind::RecvBufferSize => {
            SocketOption::RecvBufferSize(socket.recv_buffer_size()?)
        }
        SocketOptionKind::SendBufferSize => {
            SocketOption::SendBufferSize(socket.send_buffer_size()?)
        }
        SocketOptionKind::NoSigPipe => SocketOption::NoSigPipe(nosigpipe(socket)?),
    })
}

#[cfg(target_vendor = "apple")]
fn set_nosigpipe(socket: &Socket, on: bool) -> io::Result<()> {
    socket.set_nosigpipe(on)
}

#[cfg(not(target_vendor = "apple"))]
fn set_nosigpipe(_socket: &Socket, on: bool) -> io::Result<()> {
    if on { Ok(()) } else { Err(nosigpipe_unsupported()) }
}

#[cfg(target_vendor = "apple")]
fn nosigpipe(socket: &Socket) -> io::Result<bool> {
    socket.nosigpipe()
}

#[cfg(not(target_vendor = "apple"))]
fn nosigpipe(_socket: &Socket) -> io::Result<bool> {
    Err(nosigpipe_unsupported())
}

#[cfg(not(target_vendor = "apple"))]
fn nosigpipe_unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "SO_NOSIGPIPE is only available on apple targets",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use socket2::{Domain, Type};

    fn socket() -> Socket {
        Socket::new(Domain::IPV4, Type::STREAM, None).expect("创建测试套接字")
    }

    #[test]
    fn boolean_options_round_trip_through_kernel() {
        let socket = socket();
        apply(&socket, SocketOption::ReuseAddress(true)).expect("设置 SO_REUSEADDR");
        apply(&socket, SocketOption::KeepAlive(true)).expect("设置 SO_KEEPALIVE");
        assert_eq!(
            read(&socket, SocketOptionKind::ReuseAddress).expect("读取 SO_REUSEADDR"),
            SocketOption::ReuseAddress(true)
        );
        assert_eq!(
            read(&socket, SocketOptionKind::KeepAlive).expect("读取 SO_KEEPALIVE"),
            SocketOption::KeepAlive(true)
        );
    }

    #[test]
    fn read_timeout_is_observable() {
        let socket = socket();
        let timeout = Some(Duration::from_secs(2));
        apply(&socket, SocketOption::ReadTimeout(timeout)).expect("设置 SO_RCVTIMEO");
        assert_eq!(
            read(&socket, SocketOptionKind::ReadTimeout).expect("读取 SO_RCVTIMEO"),
            SocketOption::ReadTimeout(timeout)
        );
    }

    #[cfg(not(target_vendor = "apple"))]
    #[test]
    fn nosigpipe_is_not_reported_without_kernel_support() {
        let socket = socket();
        apply(&socket, SocketOption::NoSigPipe(true)).expect("运行时已忽略 SIGPIPE");
        let err = apply(&socket, SocketOption::NoSigPipe(false)).expect_err("无法恢复 SIGPIPE");
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        let err = read(&socket, SocketOptionKind::NoSigPipe).expect_err("没有可读取的内核状态");
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn kind_matches_value() {
        assert_eq!(
            SocketOption::Linger(None).kind(),
            SocketOptionKind::Linger
        );
        assert_eq!(SocketOptionKind::KeepAlive.to_string(), "SO_KEEPALIVE");
    }
}
