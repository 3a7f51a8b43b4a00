#![deny(unsafe_code)]
#![doc = r#"
# spark-socket

## 设计动机（Why）
- **定位**：为数据库类客户端这种“一问一答、强顺序”的场景提供阻塞式的面向连接套接字，
  以及建立在其上的长度前缀分帧协议。
- **架构角色**：自下而上分为四层：
  [`AddressResolver`] 产出有序候选地址；[`Connection`] 独占句柄并提供单次原始传输；
  [`ReliableByteStream`] 把部分传输收敛为“恰好 N 字节或失败”；[`PacketCodec`] 在其上编解码
  `长度前缀 | id | 负载` 报文。
- **设计理念**：失败一律同步返回结构化的 [`SocketError`]，携带稳定错误码并保留系统错误链。

## 核心契约（What）
- **生命周期**：`Created → {Connected | Listening} → Closed`，`Closed` 为终态；
  误用返回 [`SocketError::InvalidState`] 而不触发系统调用；
- **完整性**：接收/读取循环直至凑满，发送/写入只做一次调用并严格校验字节数；
- **序号**：[`ConnectionSequencer`] 在建连、监听与关闭时归零，不写入线路。

## 实现策略（How）
- **系统接口**：套接字创建、选项、收发均通过 `socket2` 完成；Unix 平台上借助 `nix`
  显式关闭句柄以上报释放失败；
- **配置**：[`SocketConfig`] 支持链式构造与 TOML 加载，建连前统一应用 [`SocketOptions`]；
- **观测**：关键生命周期事件以 `tracing` 的 `debug` 级别输出，逐次传输以 `trace` 级别输出。

## 风险与考量（Trade-offs）
- **阻塞模型**：没有内部线程与取消原语，调用方需通过读写超时选项限定等待时长；
- **字节序**：16 位长度前缀使用主机字节序，跨字节序部署需上层另行约定；
- **非事务编码**：帧头与负载分两次发送，负载失败时对端会看到半个帧。
"#]

mod config;
mod connection;
mod error;
mod options;
mod packet;
mod resolver;
mod sequencer;
mod stream;
mod types;

pub use config::{ConfigError, SocketConfig, SocketOptions};
pub use connection::{Connection, ConnectionState};
pub use error::{Direction, Result, SocketError};
pub use options::{SocketOption, SocketOptionKind};
pub use packet::{LengthPrefix, Packet, PacketCodec, PacketHeader};
pub use resolver::{AddressResolver, Endpoint};
pub use sequencer::ConnectionSequencer;
pub use stream::{RawTransport, ReliableByteStream};
pub use types::{AddressFamily, MsgFlags, SocketProtocol, SocketSpec, SocketType};

pub use socket2::SockAddr;
