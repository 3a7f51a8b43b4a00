//! 错误模型：每一类失败对应一个稳定错误码，并保留底层系统错误作为 `source`。
//!
//! ## 设计要求（What）
//! - 所有失败都以 [`SocketError`] 同步返回给发现它的调用方，不做延迟或排队上报；
//! - 除 `recv_exact`/`read_exact` 的累积循环与 `connect_any` 的候选回退外，
//!   任何错误都不会被自动重试；
//! - 错误码沿用 `spark.<组件>.<操作>_failed` 的命名约定，可直接用于告警维度。

use crate::{connection::ConnectionState, options::SocketOptionKind};
use std::{fmt, io};
use thiserror::Error;

/// 描述一次底层操作对应的稳定错误码与默认文案。
#[derive(Clone, Copy, Debug)]
pub(crate) struct OperationKind {
    pub code: &'static str,
    pub message: &'static str,
}

pub(crate) const RESOLVE: OperationKind = OperationKind {
    code: "spark.socket.resolve_failed",
    message: "socket resolve",
};
pub(crate) const CREATE: OperationKind = OperationKind {
    code: "spark.socket.create_failed",
    message: "socket create",
};
pub(crate) const CONNECT: OperationKind = OperationKind {
    code: "spark.socket.connect_failed",
    message: "socket connect",
};
pub(crate) const BIND: OperationKind = OperationKind {
    code: "spark.socket.bind_failed",
    message: "socket bind",
};
pub(crate) const LISTEN: OperationKind = OperationKind {
    code: "spark.socket.listen_failed",
    message: "socket listen",
};
pub(crate) const ACCEPT: OperationKind = OperationKind {
    code: "spark.socket.accept_failed",
    message: "socket accept",
};
pub(crate) const ADDRESS: OperationKind = OperationKind {
    code: "spark.socket.address_query_failed",
    message: "socket address query",
};
pub(crate) const CLOSE: OperationKind = OperationKind {
    code: "spark.socket.close_failed",
    message: "socket close",
};
pub(crate) const TRANSFER: OperationKind = OperationKind {
    code: "spark.socket.transfer_failed",
    message: "socket transfer",
};
pub(crate) const RECEIVE: OperationKind = OperationKind {
    code: "spark.socket.receive_failed",
    message: "socket receive",
};
pub(crate) const SEND: OperationKind = OperationKind {
    code: "spark.socket.send_failed",
    message: "socket send",
};
pub(crate) const CONFIGURE: OperationKind = OperationKind {
    code: "spark.socket.option_failed",
    message: "socket option",
};
pub(crate) const STATE: OperationKind = OperationKind {
    code: "spark.socket.invalid_state",
    message: "socket lifecycle",
};
pub(crate) const ENCODE: OperationKind = OperationKind {
    code: "spark.socket.payload_too_large",
    message: "packet encode",
};

/// 原始传输调用的方向。
///
/// `Send`/`Recv` 对应带标志位的套接字调用，`Read`/`Write` 对应无标志位的流式调用。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    Send,
    Recv,
    Read,
    Write,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Send => "send",
            Direction::Recv => "recv",
            Direction::Read => "read",
            Direction::Write => "write",
        }
    }

    /// 数据是否由对端流入本端。
    pub const fn is_inbound(self) -> bool {
        matches!(self, Direction::Recv | Direction::Read)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 套接字与分帧协议的统一错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：把“异常即控制流”的失败路径全部收敛为可匹配的枚举，调用方可以按
///   变体决定重连、告警或直接终止会话；
/// - **契约 (What)**：
///   - 携带系统错误的变体把 [`io::Error`] 作为 `source` 保留，可通过
///     [`SocketError::raw_os_error`] 取回原始 errno；
///   - `ReceiveFailed`/`SendFailed` 包裹导致失败的那一次原始传输错误，形成错误链；
///   - [`SocketError::code`] 返回稳定错误码，不随文案调整而变化；
/// - **设计权衡 (Trade-offs)**：`AddressResolutionFailed` 额外保存 `host:port` 文本，牺牲一次
///   堆分配换取排障时无需回溯调用栈。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SocketError {
    /// 解析器报告失败，或解析结果中没有所请求地址族的地址。
    ///
    /// `status` 为 `getaddrinfo` 返回的 `EAI_*` 状态码；解析成功但过滤后为空时为 `None`。
    #[error("address resolution failed for `{target}`: {source}")]
    AddressResolutionFailed {
        target: String,
        status: Option<i32>,
        #[source]
        source: io::Error,
    },

    /// 操作系统拒绝分配套接字句柄。
    #[error("socket creation failed: {source}")]
    SocketCreationFailed {
        #[source]
        source: io::Error,
    },

    /// 单次连接失败，或候选序列中的全部地址都连接失败。
    ///
    /// `attempts` 记录实际尝试的候选数量，`source` 为最后一次尝试的系统错误。
    #[error("connect failed after {attempts} attempt(s): {source}")]
    ConnectFailed {
        attempts: usize,
        #[source]
        source: io::Error,
    },

    #[error("bind failed: {source}")]
    BindFailed {
        #[source]
        source: io::Error,
    },

    #[error("listen failed: {source}")]
    ListenFailed {
        #[source]
        source: io::Error,
    },

    #[error("accept failed: {source}")]
    AcceptFailed {
        #[source]
        source: io::Error,
    },

    /// 查询本端或对端地址失败。
    #[error("address query failed: {source}")]
    AddressQueryFailed {
        #[source]
        source: io::Error,
    },

    /// 释放句柄时系统报告错误；句柄依旧视为已释放，不会重试。
    #[error("close failed: {source}")]
    CloseFailed {
        #[source]
        source: io::Error,
    },

    /// 单次原始传输返回 0 字节或错误。
    #[error("{direction} transfer failed: {source}")]
    TransferFailed {
        direction: Direction,
        #[source]
        source: io::Error,
    },

    /// 保证完整的接收/读取未能凑齐目标长度，已累积的字节被丢弃。
    #[error("{direction} of {expected} bytes failed after {transferred} bytes")]
    ReceiveFailed {
        direction: Direction,
        expected: usize,
        transferred: usize,
        #[source]
        source: Box<SocketError>,
    },

    /// 保证完整的发送/写入在单次调用中未被完整接受。
    ///
    /// 短写时 `source` 为空，`transferred` 为内核实际接受的字节数。
    #[error("{direction} of {expected} bytes failed after {transferred} bytes")]
    SendFailed {
        direction: Direction,
        expected: usize,
        transferred: usize,
        #[source]
        source: Option<Box<SocketError>>,
    },

    #[error("socket option {option} failed: {source}")]
    OptionFailed {
        option: SocketOptionKind,
        #[source]
        source: io::Error,
    },

    /// 生命周期误用，例如关闭后再次连接或未绑定即监听。
    #[error("cannot {operation} while connection is {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    /// 负载长度超出所选长度前缀可表达的上限（仅编码侧）。
    #[error("payload of {len} bytes exceeds length prefix maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },
}

impl SocketError {
    /// 为原始传输实现构造 `TransferFailed`。
    pub fn transfer(direction: Direction, source: io::Error) -> Self {
        SocketError::TransferFailed { direction, source }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        self.operation().code
    }

    /// 沿错误链查找首个系统错误码。
    ///
    /// 解析失败返回解析器的 `EAI_*` 状态码（`EAI_SYSTEM` 时为其携带的 errno），
    /// 其余变体返回 errno。
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            SocketError::AddressResolutionFailed { status, source, .. } => {
                source.raw_os_error().or(*status)
            }
            SocketError::SocketCreationFailed { source }
            | SocketError::ConnectFailed { source, .. }
            | SocketError::BindFailed { source }
            | SocketError::ListenFailed { source }
            | SocketError::AcceptFailed { source }
            | SocketError::AddressQueryFailed { source }
            | SocketError::CloseFailed { source }
            | SocketError::TransferFailed { source, .. }
            | SocketError::OptionFailed { source, .. } => source.raw_os_error(),
            SocketError::ReceiveFailed { source, .. } => source.raw_os_error(),
            SocketError::SendFailed { source, .. } => {
                source.as_deref().and_then(SocketError::raw_os_error)
            }
            SocketError::InvalidState { .. } | SocketError::PayloadTooLarge { .. } => None,
        }
    }

    /// 返回该类错误对应操作的默认文案，适合作为日志字段。
    pub fn message(&self) -> &'static str {
        self.operation().message
    }

    fn operation(&self) -> OperationKind {
        match self {
            SocketError::AddressResolutionFailed { .. } => RESOLVE,
            SocketError::SocketCreationFailed { .. } => CREATE,
            SocketError::ConnectFailed { .. } => CONNECT,
            SocketError::BindFailed { .. } => BIND,
            SocketError::ListenFailed { .. } => LISTEN,
            SocketError::AcceptFailed { .. } => ACCEPT,
            SocketError::AddressQueryFailed { .. } => ADDRESS,
            SocketError::CloseFailed { .. } => CLOSE,
            SocketError::TransferFailed { .. } => TRANSFER,
            SocketError::ReceiveFailed { .. } => RECEIVE,
            SocketError::SendFailed { .. } => SEND,
            SocketError::OptionFailed { .. } => CONFIGURE,
            SocketError::InvalidState { .. } => STATE,
            SocketError::PayloadTooLarge { .. } => ENCODE,
        }
    }
}

/// crate 内统一的结果别名。
pub type Result<T, E = SocketError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn codes_are_stable_per_kind() {
        let err = SocketError::ConnectFailed {
            attempts: 2,
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(err.code(), "spark.socket.connect_failed");
        assert_eq!(err.message(), "socket connect");

        let err = SocketError::PayloadTooLarge { len: 300, max: 255 };
        assert_eq!(err.code(), "spark.socket.payload_too_large");
        assert!(err.raw_os_error().is_none());
    }

    /// 接收失败需要把导致失败的那次原始传输错误保留在错误链上。
    #[test]
    fn receive_failure_chains_transfer_error() {
        let transfer = SocketError::transfer(Direction::Recv, io::Error::from_raw_os_error(104));
        let err = SocketError::ReceiveFailed {
            direction: Direction::Recv,
            expected: 8,
            transferred: 3,
            source: Box::new(transfer),
        };
        assert_eq!(err.raw_os_error(), Some(104));
        let source = err.source().expect("应携带底层错误");
        assert!(source.to_string().starts_with("recv transfer failed"));
        assert_eq!(err.to_string(), "recv of 8 bytes failed after 3 bytes");
    }

    #[test]
    fn short_send_has_no_os_error() {
        let err = SocketError::SendFailed {
            direction: Direction::Write,
            expected: 5,
            transferred: 3,
            source: None,
        };
        assert!(err.raw_os_error().is_none());
        assert!(err.source().is_none());
        assert_eq!(err.code(), "spark.socket.send_failed");
    }
}
