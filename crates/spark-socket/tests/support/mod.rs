//! 集成测试共享的脚本化传输桩。
//!
//! # 设计动机（Why）
//! - 真实内核几乎不会在回环连接上产生短读短写，完整性策略的边界只能靠可编排的桩来触发；
//! - 桩以 crate 公开的 [`RawTransport`] 为接缝，与生产代码走完全相同的调用路径。
//!
//! # 契约说明（What）
//! - 接收侧每次最多交付 `chunk` 字节，数据耗尽后报告 `UnexpectedEof`；
//! - `fail_on_call` 指定第 N 次调用（从 1 计数）返回 `ConnectionReset`；
//! - 发送侧每次最多接受 `accept_limit` 字节，记录实际收到的字节与调用次数。

#![allow(dead_code)]

use spark_socket::{Direction, MsgFlags, RawTransport, Result, SocketError};
use std::{collections::VecDeque, io};

#[derive(Debug)]
pub struct ScriptedTransport {
    inbound: VecDeque<u8>,
    chunk: usize,
    fail_on_call: Option<usize>,
    accept_limit: usize,
    pub outbound: Vec<u8>,
    pub calls: usize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            inbound: VecDeque::new(),
            chunk: usize::MAX,
            fail_on_call: None,
            accept_limit: usize::MAX,
            outbound: Vec::new(),
            calls: 0,
        }
    }

    pub fn with_inbound(mut self, data: &[u8]) -> Self {
        self.inbound.extend(data.iter().copied());
        self
    }

    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn accepting_at_most(mut self, limit: usize) -> Self {
        self.accept_limit = limit;
        self
    }

    pub fn remaining(&self) -> usize {
        self.inbound.len()
    }

    fn tick(&mut self, direction: Direction) -> Result<()> {
        self.calls += 1;
        if self.fail_on_call == Some(self.calls) {
            return Err(SocketError::transfer(
                direction,
                io::Error::from(io::ErrorKind::ConnectionReset),
            ));
        }
        Ok(())
    }

    fn pull(&mut self, buf: &mut [u8], direction: Direction) -> Result<usize> {
        self.tick(direction)?;
        if self.inbound.is_empty() {
            return Err(SocketError::transfer(
                direction,
                io::Error::from(io::ErrorKind::UnexpectedEof),
            ));
        }
        let n = buf.len().min(self.chunk).min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn push(&mut self, buf: &[u8], direction: Direction) -> Result<usize> {
        self.tick(direction)?;
        let n = buf.len().min(self.accept_limit);
        self.outbound.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

impl RawTransport for ScriptedTransport {
    fn raw_send(&mut self, buf: &[u8], _flags: MsgFlags) -> Result<usize> {
        self.push(buf, Direction::Send)
    }

    fn raw_recv(&mut self, buf: &mut [u8], _flags: MsgFlags) -> Result<usize> {
        self.pull(buf, Direction::Recv)
    }

    fn raw_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.pull(buf, Direction::Read)
    }

    fn raw_write(&mut self, buf: &[u8]) -> Result<usize> {
        self.push(buf, Direction::Write)
    }
}
