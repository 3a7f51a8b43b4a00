use crate::{
    error::{Result, SocketError},
    types::{AddressFamily, SocketSpec},
};
use dns_lookup::AddrInfoHints;
use socket2::SockAddr;
use std::{ffi::c_int, io, net::SocketAddr};
use tracing::debug;

/// 已解析、可直接用于连接或绑定的传输层地址。
///
/// # 教案式注释
///
/// ## 契约 (What)
/// - 不可变：构造后地址族、类型、协议与地址本身都不再变化；
/// - `sock_addr`/`addr_len` 给出交给操作系统的原始地址表示；
/// - 由 [`AddressResolver::resolve`] 产出，被 [`Connection::connect`](crate::Connection::connect)
///   或 [`Connection::bind`](crate::Connection::bind) 使用。
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Endpoint {
    spec: SocketSpec,
    addr: SocketAddr,
}

impl Endpoint {
    pub fn new(spec: SocketSpec, addr: SocketAddr) -> Self {
        Self { spec, addr }
    }

    pub fn spec(&self) -> SocketSpec {
        self.spec
    }

    pub fn family(&self) -> AddressFamily {
        self.spec.family
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// 操作系统视角的地址结构。
    pub fn sock_addr(&self) -> SockAddr {
        SockAddr::from(self.addr)
    }

    /// 地址结构的字节长度。
    pub fn addr_len(&self) -> u32 {
        self.sock_addr().len()
    }
}

/// 把主机名与端口解析为有序候选地址序列。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 连接建立采用“按序回退”策略，候选顺序本身就是策略的一部分，因此解析器必须
///   原样保留系统解析器给出的顺序，不排序、不去重。
///
/// ## 逻辑 (How)
/// - 以套接字的地址族、类型与协议作为 `getaddrinfo` 提示，端口以数字服务名传入；
/// - 用于绑定时带 `AI_PASSIVE`，未给出主机名时得到通配地址；
/// - 用于连接时带 `AI_ALL` 请求全部匹配地址，未给出主机名时得到回环地址；
/// - 结果再按地址族过滤一次，确保候选都能被同族套接字使用。
///
/// ## 契约 (What)
/// - 每次调用都重新解析，可重复调用；
/// - 解析失败返回 [`SocketError::AddressResolutionFailed`]，`status` 保留 `EAI_*` 状态码；
/// - 过滤后为空同样返回该错误，此时 `status` 为 `None`。
#[derive(Clone, Copy, Debug, Default)]
pub struct AddressResolver;

impl AddressResolver {
    pub const fn new() -> Self {
        AddressResolver
    }

    pub fn resolve(
        &self,
        host: Option<&str>,
        port: u16,
        spec: SocketSpec,
        for_bind: bool,
    ) -> Result<Vec<Endpoint>> {
        let target = format!("{}:{port}", host.unwrap_or("<none>"));
        let hints = AddrInfoHints {
            flags: hint_flags(for_bind),
            address: c_int::from(spec.family.domain()),
            socktype: c_int::from(spec.socket_type.to_socket2()),
            protocol: spec.protocol.to_socket2().map_or(0, c_int::from),
        };
        let service = port.to_string();
        let infos = dns_lookup::getaddrinfo(host, Some(&service), Some(hints)).map_err(|err| {
            SocketError::AddressResolutionFailed {
                target: target.clone(),
                status: Some(err.error_num()),
                source: io::Error::from(err),
            }
        })?;

        let mut endpoints = Vec::new();
        for info in infos {
            let info = info.map_err(|source| SocketError::AddressResolutionFailed {
                target: target.clone(),
                status: None,
                source,
            })?;
            if spec.family.matches(&info.sockaddr) {
                endpoints.push(Endpoint::new(spec, info.sockaddr));
            }
        }

        if endpoints.is_empty() {
            return Err(SocketError::AddressResolutionFailed {
                target,
                status: None,
                source: io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("no {} address available", spec.family),
                ),
            });
        }

        debug!(
            endpoint = %target,
            family = %spec.family,
            for_bind,
            candidates = endpoints.len(),
            "resolved socket endpoints"
        );
        Ok(endpoints)
    }
}

#[cfg(unix)]
fn hint_flags(for_bind: bool) -> c_int {
    use nix::libc::{AI_ALL, AI_PASSIVE};

    if for_bind { AI_PASSIVE } else { AI_ALL }
}

#[cfg(not(unix))]
fn hint_flags(_for_bind: bool) -> c_int {
    0
}
