use serde::Deserialize;
use socket2::{Domain, Protocol, Type};
use std::{
    ffi::c_int,
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};

/// 套接字地址族。
///
/// 仅覆盖 IP 协议族：创建套接字与地址解析都必须落在同一族内，
/// 因此不提供 `Unspecified` 这类需要延迟决策的取值。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub(crate) fn domain(self) -> Domain {
        match self {
            AddressFamily::Ipv4 => Domain::IPV4,
            AddressFamily::Ipv6 => Domain::IPV6,
        }
    }

    /// 判断给定地址是否属于该地址族。
    pub fn matches(self, addr: &SocketAddr) -> bool {
        matches!(
            (self, addr),
            (AddressFamily::Ipv4, SocketAddr::V4(_)) | (AddressFamily::Ipv6, SocketAddr::V6(_))
        )
    }

    /// 被动解析（监听）时使用的通配地址。
    pub(crate) fn wildcard(self) -> IpAddr {
        match self {
            AddressFamily::Ipv4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::Ipv6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }

    /// 未给出主机名的主动解析落到回环地址，与系统解析器的行为一致。
    pub(crate) fn loopback(self) -> IpAddr {
        match self {
            AddressFamily::Ipv4 => IpAddr::V4(Ipv4Addr::LOCALHOST),
            AddressFamily::Ipv6 => IpAddr::V6(Ipv6Addr::LOCALHOST),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => f.write_str("ipv4"),
            AddressFamily::Ipv6 => f.write_str("ipv6"),
        }
    }
}

/// 套接字类型。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketType {
    #[default]
    Stream,
    Datagram,
    SeqPacket,
}

impl SocketType {
    pub(crate) fn to_socket2(self) -> Type {
        match self {
            SocketType::Stream => Type::STREAM,
            SocketType::Datagram => Type::DGRAM,
            SocketType::SeqPacket => Type::SEQPACKET,
        }
    }
}

/// 传输层协议；`Default` 交由内核按族与类型推断。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketProtocol {
    #[default]
    Default,
    Tcp,
    Udp,
}

impl SocketProtocol {
    pub(crate) fn to_socket2(self) -> Option<Protocol> {
        match self {
            SocketProtocol::Default => None,
            SocketProtocol::Tcp => Some(Protocol::TCP),
            SocketProtocol::Udp => Some(Protocol::UDP),
        }
    }
}

/// 创建套接字所需的三元组：地址族、类型与协议。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 地址解析与套接字创建必须使用同一组参数，否则解析出的候选地址无法被
///   该套接字连接；将三者聚合为值类型，避免调用方在两处分别传参时出现漂移。
///
/// ## 契约 (What)
/// - `Copy` 值类型，可在 [`Endpoint`](crate::Endpoint) 与
///   [`Connection`](crate::Connection) 之间自由复制；
/// - 默认值为 IPv4 + 字节流 + 内核默认协议，对应最常见的 TCP 客户端。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
pub struct SocketSpec {
    pub family: AddressFamily,
    pub socket_type: SocketType,
    pub protocol: SocketProtocol,
}

impl SocketSpec {
    pub const fn new(
        family: AddressFamily,
        socket_type: SocketType,
        protocol: SocketProtocol,
    ) -> Self {
        Self {
            family,
            socket_type,
            protocol,
        }
    }

    /// IPv4 上的 TCP 字节流。
    pub const fn tcp_v4() -> Self {
        Self::new(AddressFamily::Ipv4, SocketType::Stream, SocketProtocol::Tcp)
    }

    /// IPv6 上的 TCP 字节流。
    pub const fn tcp_v6() -> Self {
        Self::new(AddressFamily::Ipv6, SocketType::Stream, SocketProtocol::Tcp)
    }
}

/// `send`/`recv` 的标志位，原样透传给操作系统。
///
/// 仅收录 POSIX 通用的取值；其余平台私有标志可通过 [`MsgFlags::from_bits`] 构造。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct MsgFlags(c_int);

impl MsgFlags {
    /// 窥视数据而不从接收队列中移除。
    #[cfg(unix)]
    pub const PEEK: MsgFlags = MsgFlags(nix::sys::socket::MsgFlags::MSG_PEEK.bits());

    /// 要求内核尽量等待请求长度的数据全部到达。
    #[cfg(unix)]
    pub const WAITALL: MsgFlags = MsgFlags(nix::sys::socket::MsgFlags::MSG_WAITALL.bits());

    pub const fn empty() -> Self {
        MsgFlags(0)
    }

    pub const fn from_bits(bits: c_int) -> Self {
        MsgFlags(bits)
    }

    pub const fn bits(self) -> c_int {
        self.0
    }

    pub const fn union(self, other: MsgFlags) -> Self {
        MsgFlags(self.0 | other.0)
    }
}
