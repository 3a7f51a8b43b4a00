use crate::{
    config::SocketConfig,
    error::{Direction, Result, SocketError},
    options::{self, SocketOption, SocketOptionKind},
    resolver::{AddressResolver, Endpoint},
    sequencer::ConnectionSequencer,
    stream::RawTransport,
    types::{MsgFlags, SocketSpec},
};
use socket2::{SockAddr, Socket};
use std::{
    ffi::c_int,
    fmt,
    io::{self, Read, Write},
};
use tracing::{debug, trace};

/// 连接生命周期状态。
///
/// `Created → {Connected | Listening} → Closed`；`Closed` 为终态，重连需要新建连接。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ConnectionState {
    Created,
    Connected,
    Listening,
    Closed,
}

impl ConnectionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Created => "created",
            ConnectionState::Connected => "connected",
            ConnectionState::Listening => "listening",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 持有单个操作系统套接字句柄的阻塞式连接。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 把句柄的分配、建连/监听、释放集中到一个独占所有权的值上，关闭即令句柄失效，
///   其它组件无法持有或比它活得更久；
/// - 原始传输原语（`raw_send`/`raw_recv`/`raw_read`/`raw_write`）只做一次系统调用并如实
///   报告部分传输字节数，完整性保证交给 [`ReliableByteStream`](crate::ReliableByteStream)。
///
/// ## 逻辑 (How)
/// - 内部以 `Option<Socket>` 持有句柄，`close` 时取出并显式释放，以便上报释放失败；
/// - 进入 `Connected`/`Listening` 与 `Closed` 时重置 [`ConnectionSequencer`]；
/// - `connect_any` 在同一句柄上按候选顺序逐一尝试，首个成功即停止。
///
/// ## 契约 (What)
/// - 所有操作同步阻塞，没有内部线程，也没有取消原语；超时需通过
///   [`SocketOption::ReadTimeout`]/[`SocketOption::WriteTimeout`] 预先配置；
/// - 生命周期误用返回 [`SocketError::InvalidState`]，不会触发系统调用；
/// - 原始传输返回 0 字节或错误时统一报告为 [`SocketError::TransferFailed`]。
///
/// ## 注意事项 (Trade-offs)
/// - 同一连接不得在无外部同步的情况下被两个线程同时操作；
/// - 通过 `AsRawFd` 暴露的原始句柄仅供信号处理等带外用途，它与进行中的传输不同步，
///   属于尽力而为的机制；
/// - 在 BSD 系协议栈上，一次失败的 `connect` 可能使句柄无法再次连接，
///   `connect_any` 的后续候选此时会相继失败。
#[derive(Debug)]
pub struct Connection {
    socket: Option<Socket>,
    spec: SocketSpec,
    backlog: c_int,
    bound: bool,
    state: ConnectionState,
    sequencer: ConnectionSequencer,
}

impl Connection {
    /// 分配一个新的套接字句柄，初始状态为 `Created`。
    pub fn create(spec: SocketSpec, backlog: i32) -> Result<Self> {
        let socket = Socket::new(
            spec.family.domain(),
            spec.socket_type.to_socket2(),
            spec.protocol.to_socket2(),
        )
        .map_err(|source| SocketError::SocketCreationFailed { source })?;
        debug!(
            family = %spec.family,
            socket_type = ?spec.socket_type,
            protocol = ?spec.protocol,
            backlog,
            "socket created"
        );
        Ok(Self::from_parts(socket, spec, backlog, ConnectionState::Created))
    }

    fn from_parts(
        socket: Socket,
        spec: SocketSpec,
        backlog: c_int,
        state: ConnectionState,
    ) -> Self {
        Self {
            socket: Some(socket),
            spec,
            backlog,
            bound: false,
            state,
            sequencer: ConnectionSequencer::new(),
        }
    }

    /// 按配置创建套接字、应用选项并解析候选地址，但尚不建连。
    ///
    /// # 教案级注释
    ///
    /// ## 逻辑（How）
    /// 1. 以配置中的地址族/类型/协议与 `max_connections` 创建套接字；
    /// 2. 依序写入 [`SocketConfig::options`] 展开的选项；
    /// 3. 通过 [`AddressResolver`] 解析 `host:port`，`for_bind` 决定空主机名时
    ///    落到通配地址还是回环地址。
    ///
    /// ## 契约（What）
    /// - 返回的连接处于 `Created`，候选序列保持解析器原始顺序；
    /// - 任一步失败立即返回，已创建的句柄随连接一并释放。
    pub fn open(config: &SocketConfig, for_bind: bool) -> Result<(Self, Vec<Endpoint>)> {
        let spec = config.spec();
        let mut connection = Self::create(spec, config.max_connections)?;
        connection.apply_options(&config.options.to_options())?;
        let endpoints = AddressResolver::new().resolve(
            config.host.as_deref(),
            config.port,
            spec,
            for_bind,
        )?;
        Ok((connection, endpoints))
    }

    /// 按配置建立客户端连接：`open` 后对全部候选执行 [`Connection::connect_any`]。
    pub fn connect_with_config(config: &SocketConfig) -> Result<Self> {
        let (mut connection, endpoints) = Self::open(config, false)?;
        connection.connect_any(&endpoints)?;
        Ok(connection)
    }

    /// 按配置建立监听端：绑定首个可绑定的候选地址后进入 `Listening`。
    pub fn listen_with_config(config: &SocketConfig) -> Result<Self> {
        let (mut connection, endpoints) = Self::open(config, true)?;
        let mut last_error = None;
        for endpoint in &endpoints {
            match connection.bind(endpoint) {
                Ok(()) => {
                    last_error = None;
                    break;
                }
                Err(err) => {
                    debug!(addr = %endpoint.addr(), error = %err, "bind candidate failed");
                    last_error = Some(err);
                }
            }
        }
        if let Some(err) = last_error {
            return Err(err);
        }
        connection.listen()?;
        Ok(connection)
    }

    /// 连接到单个地址；成功后进入 `Connected` 并重置序号。失败时状态不变。
    pub fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.expect_state("connect", ConnectionState::Created)?;
        self.socket("connect")?
            .connect(&endpoint.sock_addr())
            .map_err(|source| SocketError::ConnectFailed {
                attempts: 1,
                source,
            })?;
        self.state = ConnectionState::Connected;
        self.sequencer.reset();
        debug!(addr = %endpoint.addr(), "socket connected");
        Ok(())
    }

    /// 按顺序逐一尝试候选地址，返回首个连接成功的候选。
    ///
    /// # 教案式注释
    ///
    /// ## 意图 (Why)
    /// - 建连是确定性的顺序回退而非并行竞速：候选顺序由解析器决定，
    ///   本方法不重排、不并发；
    ///
    /// ## 契约 (What)
    /// - 首个成功后立即返回，不再尝试其后的候选；
    /// - 单个候选的失败被吞掉并记录日志，全部失败（或候选为空）时返回
    ///   [`SocketError::ConnectFailed`]，`source` 为最后一次失败的系统错误；
    /// - 调用时连接必须处于 `Created`，否则直接返回 `InvalidState`。
    pub fn connect_any<'e>(&mut self, endpoints: &'e [Endpoint]) -> Result<&'e Endpoint> {
        self.expect_state("connect", ConnectionState::Created)?;
        let mut attempts = 0;
        let mut last_error = None;
        for endpoint in endpoints {
            attempts += 1;
            match self.connect(endpoint) {
                Ok(()) => return Ok(endpoint),
                Err(SocketError::ConnectFailed { source, .. }) => {
                    debug!(
                        addr = %endpoint.addr(),
                        attempt = attempts,
                        error = %source,
                        "connect candidate failed"
                    );
                    last_error = Some(source);
                }
                Err(other) => return Err(other),
            }
        }
        Err(SocketError::ConnectFailed {
            attempts,
            source: last_error.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "no candidate endpoints")
            }),
        })
    }

    /// 绑定本地地址；绑定不改变对外可见的状态，但必须先于 `listen`。
    pub fn bind(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.expect_state("bind", ConnectionState::Created)?;
        self.socket("bind")?
            .bind(&endpoint.sock_addr())
            .map_err(|source| SocketError::BindFailed { source })?;
        self.bound = true;
        debug!(addr = %endpoint.addr(), "socket bound");
        Ok(())
    }

    /// 开始监听；成功后进入 `Listening` 并重置序号。
    pub fn listen(&mut self) -> Result<()> {
        self.expect_state("listen", ConnectionState::Created)?;
        if !self.bound {
            return Err(SocketError::InvalidState {
                operation: "listen before bind",
                state: self.state,
            });
        }
        self.socket("listen")?
            .listen(self.backlog)
            .map_err(|source| SocketError::ListenFailed { source })?;
        self.state = ConnectionState::Listening;
        self.sequencer.reset();
        debug!(backlog = self.backlog, "socket listening");
        Ok(())
    }

    /// 接受一个入站连接，返回处于 `Connected`、序号为 0 的新连接及对端地址。
    pub fn accept(&mut self) -> Result<(Connection, SockAddr)> {
        self.expect_state("accept", ConnectionState::Listening)?;
        let (socket, peer) = self
            .socket("accept")?
            .accept()
            .map_err(|source| SocketError::AcceptFailed { source })?;
        debug!(peer = ?peer.as_socket(), "connection accepted");
        let accepted =
            Self::from_parts(socket, self.spec, self.backlog, ConnectionState::Connected);
        Ok((accepted, peer))
    }

    /// 释放句柄、重置序号并进入 `Closed`。
    ///
    /// 即便系统报告释放失败（[`SocketError::CloseFailed`]），句柄也视为已释放，不做重试。
    pub fn close(&mut self) -> Result<()> {
        let socket = self.socket.take().ok_or(SocketError::InvalidState {
            operation: "close",
            state: self.state,
        })?;
        self.state = ConnectionState::Closed;
        self.sequencer.reset();
        debug!("socket closed");
        release(socket).map_err(|source| SocketError::CloseFailed { source })
    }

    /// 单次 `send` 调用，返回内核接受的字节数。
    pub fn raw_send(&mut self, buf: &[u8], flags: MsgFlags) -> Result<usize> {
        let socket = self.transfer_socket(Direction::Send)?;
        settle(Direction::Send, buf.len(), socket.send_with_flags(buf, flags.bits()))
    }

    /// 单次 `recv` 调用，把收到的字节写入 `buf` 开头并返回字节数。
    pub fn raw_recv(&mut self, buf: &mut [u8], flags: MsgFlags) -> Result<usize> {
        let socket = self.transfer_socket(Direction::Recv)?;
        let requested = buf.len();
        settle(Direction::Recv, requested, recv_into(socket, buf, flags))
    }

    /// 单次无标志位的流式读取。
    pub fn raw_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut socket = self.transfer_socket(Direction::Read)?;
        let requested = buf.len();
        settle(Direction::Read, requested, socket.read(buf))
    }

    /// 单次无标志位的流式写入。
    pub fn raw_write(&mut self, buf: &[u8]) -> Result<usize> {
        let mut socket = self.transfer_socket(Direction::Write)?;
        settle(Direction::Write, buf.len(), socket.write(buf))
    }

    /// 写入一个套接字选项。
    pub fn set_option(&mut self, option: SocketOption) -> Result<()> {
        let socket = self.socket("set option")?;
        options::apply(socket, option).map_err(|source| SocketError::OptionFailed {
            option: option.kind(),
            source,
        })
    }

    /// 读取一个套接字选项的当前值。
    pub fn get_option(&self, kind: SocketOptionKind) -> Result<SocketOption> {
        let socket = self.socket("get option")?;
        options::read(socket, kind).map_err(|source| SocketError::OptionFailed {
            option: kind,
            source,
        })
    }

    /// 依序写入一组选项，首个失败即返回。
    pub fn apply_options(&mut self, options: &[SocketOption]) -> Result<()> {
        options
            .iter()
            .try_for_each(|option| self.set_option(*option))
    }

    pub fn local_addr(&self) -> Result<SockAddr> {
        self.socket("query local address")?
            .local_addr()
            .map_err(|source| SocketError::AddressQueryFailed { source })
    }

    pub fn peer_addr(&self) -> Result<SockAddr> {
        self.expect_state("query peer address", ConnectionState::Connected)?;
        self.socket("query peer address")?
            .peer_addr()
            .map_err(|source| SocketError::AddressQueryFailed { source })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn spec(&self) -> SocketSpec {
        self.spec
    }

    pub fn backlog(&self) -> i32 {
        self.backlog
    }

    /// 当前序号，供上层判断会话是否重新开始。
    pub fn sequence(&self) -> u64 {
        self.sequencer.current()
    }

    /// 上层协议为报文编号时推进序号；连接自身只在状态迁移时重置它。
    pub fn sequencer_mut(&mut self) -> &mut ConnectionSequencer {
        &mut self.sequencer
    }

    fn socket(&self, operation: &'static str) -> Result<&Socket> {
        self.socket.as_ref().ok_or(SocketError::InvalidState {
            operation,
            state: self.state,
        })
    }

    fn transfer_socket(&self, direction: Direction) -> Result<&Socket> {
        self.expect_state(direction.as_str(), ConnectionState::Connected)?;
        self.socket(direction.as_str())
    }

    fn expect_state(&self, operation: &'static str, expected: ConnectionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SocketError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}

impl RawTransport for Connection {
    fn raw_send(&mut self, buf: &[u8], flags: MsgFlags) -> Result<usize> {
        Connection::raw_send(self, buf, flags)
    }

    fn raw_recv(&mut self, buf: &mut [u8], flags: MsgFlags) -> Result<usize> {
        Connection::raw_recv(self, buf, flags)
    }

    fn raw_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Connection::raw_read(self, buf)
    }

    fn raw_write(&mut self, buf: &[u8]) -> Result<usize> {
        Connection::raw_write(self, buf)
    }
}

#[cfg(unix)]
impl std::os::fd::AsRawFd for Connection {
    /// 暴露原始句柄值供信号处理等带外回调使用；关闭后返回 `-1`。
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.socket
            .as_ref()
            .map_or(-1, std::os::fd::AsRawFd::as_raw_fd)
    }
}

/// 将单次系统调用的结果归一化：正数为正常的部分传输，0 与错误均为失败。
fn settle(direction: Direction, requested: usize, result: io::Result<usize>) -> Result<usize> {
    match result {
        Ok(0) => {
            let kind = if direction.is_inbound() {
                io::ErrorKind::UnexpectedEof
            } else {
                io::ErrorKind::WriteZero
            };
            Err(SocketError::transfer(
                direction,
                io::Error::new(kind, "zero bytes transferred"),
            ))
        }
        Ok(transferred) => {
            trace!(%direction, requested, transferred, "raw transfer");
            Ok(transferred)
        }
        Err(source) => Err(SocketError::transfer(direction, source)),
    }
}

#[cfg(unix)]
fn recv_into(socket: &Socket, buf: &mut [u8], flags: MsgFlags) -> io::Result<usize> {
    use nix::sys::socket::{MsgFlags as RecvFlags, recv};
    use std::os::fd::AsRawFd;

    recv(
        socket.as_raw_fd(),
        buf,
        RecvFlags::from_bits_truncate(flags.bits()),
    )
    .map_err(io::Error::from)
}

/// 非 Unix 平台没有可安全传入已初始化缓冲的 `recv`，退化为无标志位读取。
#[cfg(not(unix))]
fn recv_into(mut socket: &Socket, buf: &mut [u8], flags: MsgFlags) -> io::Result<usize> {
    if flags != MsgFlags::empty() {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "recv flags require a unix target",
        ));
    }
    socket.read(buf)
}

#[cfg(unix)]
fn release(socket: Socket) -> io::Result<()> {
    use std::os::fd::IntoRawFd;

    nix::unistd::close(socket.into_raw_fd()).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn release(socket: Socket) -> io::Result<()> {
    drop(socket);
    Ok(())
}
