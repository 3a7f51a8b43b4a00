//! 套接字配置：描述“连到哪里、用什么套接字、建连前设置哪些选项”。
//!
//! 配置可在代码中以 `with_*` 链式构造，也可从 TOML 文本加载：
//!
//! ```toml
//! host = "db.example.com"
//! port = 3306
//! family = "ipv4"
//! socket_type = "stream"
//! protocol = "tcp"
//! max_connections = 1
//!
//! [options]
//! keepalive = true
//! read_timeout_ms = 5000
//! ```

use crate::{
    options::SocketOption,
    types::{AddressFamily, SocketProtocol, SocketSpec, SocketType},
};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// 配置加载失败。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid socket configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("max_connections must be positive, got {0}")]
    InvalidBacklog(i32),
}

/// 建连前写入套接字的选项集合。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 面向长连接的数据库类客户端，默认开启地址复用、保活并屏蔽对端关闭时的 `SIGPIPE`，
///   让调用方无需逐项调用 `set_option`；
/// - 超时以毫秒整数表达，便于直接写进 TOML。
///
/// ## 契约（What）
/// - `None` 与 `nosigpipe = false` 都表示沿用内核默认值；
/// - 选项按字段声明顺序依次应用，任一失败即中止并返回
///   [`SocketError::OptionFailed`](crate::SocketError::OptionFailed)。
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct SocketOptions {
    pub reuse_address: bool,
    pub keepalive: bool,
    pub nosigpipe: bool,
    pub read_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    pub linger_ms: Option<u64>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            reuse_address: true,
            keepalive: true,
            nosigpipe: true,
            read_timeout_ms: None,
            write_timeout_ms: None,
            linger_ms: None,
        }
    }
}

impl SocketOptions {
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout_ms = timeout.map(duration_to_ms);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout_ms = timeout.map(duration_to_ms);
        self
    }

    pub fn with_linger(mut self, linger: Option<Duration>) -> Self {
        self.linger_ms = linger.map(duration_to_ms);
        self
    }

    /// 展开为待应用的选项序列。
    pub fn to_options(&self) -> Vec<SocketOption> {
        let mut options = vec![
            SocketOption::ReuseAddress(self.reuse_address),
            SocketOption::KeepAlive(self.keepalive),
        ];
        if self.nosigpipe {
            options.push(SocketOption::NoSigPipe(true));
        }
        if let Some(ms) = self.read_timeout_ms {
            options.push(SocketOption::ReadTimeout(timeout_from_ms(ms)));
        }
        if let Some(ms) = self.write_timeout_ms {
            options.push(SocketOption::WriteTimeout(timeout_from_ms(ms)));
        }
        if let Some(ms) = self.linger_ms {
            options.push(SocketOption::Linger(Some(Duration::from_millis(ms))));
        }
        options
    }
}

/// 零超时在内核语义中等价于“永不超时”。
fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// 一条连接（客户端或监听端）的完整配置。
///
/// # 教案式注释
///
/// ## 契约 (What)
/// - `host` 为空时：客户端连接本机回环地址，监听端绑定通配地址；
/// - `max_connections` 即 `listen` 的 backlog，默认 1，必须为正；
/// - `options` 在解析地址之前应用到新建的套接字上。
///
/// ## 注意事项 (Trade-offs)
/// - 地址族必须显式给出：套接字先于解析创建，无法在解析后再决定族。
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    pub host: Option<String>,
    pub port: u16,
    pub family: AddressFamily,
    pub socket_type: SocketType,
    pub protocol: SocketProtocol,
    pub max_connections: i32,
    pub options: SocketOptions,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 0,
            family: AddressFamily::default(),
            socket_type: SocketType::default(),
            protocol: SocketProtocol::default(),
            max_connections: 1,
            options: SocketOptions::default(),
        }
    }
}

impl SocketConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_spec(mut self, spec: SocketSpec) -> Self {
        self.family = spec.family;
        self.socket_type = spec.socket_type;
        self.protocol = spec.protocol;
        self
    }

    pub fn with_max_connections(mut self, max_connections: i32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_options(mut self, options: SocketOptions) -> Self {
        self.options = options;
        self
    }

    pub fn spec(&self) -> SocketSpec {
        SocketSpec::new(self.family, self.socket_type, self.protocol)
    }

    /// 从 TOML 文本加载并校验配置。
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SocketConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections <= 0 {
            return Err(ConfigError::InvalidBacklog(self.max_connections));
        }
        Ok(())
    }
}
