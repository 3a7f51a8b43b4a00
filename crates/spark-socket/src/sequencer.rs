/// 连接级序号计数器。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 让上层协议在不窥探 [`Connection`](crate::Connection) 内部状态的前提下，
///   感知“新的逻辑会话已经开始”（例如断线重连后）。
///
/// ## 契约 (What)
/// - [`Connection`](crate::Connection) 只在进入 `Connected`/`Listening` 以及 `Closed`
///   时调用 `reset`，除此之外从不修改计数；
/// - 计数不会写到线路上，仅作信息用途；
/// - [`ConnectionSequencer::advance`] 留给为报文编号的上层协议使用，溢出时回绕。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ConnectionSequencer {
    value: u64,
}

impl ConnectionSequencer {
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    /// 当前计数值。
    pub const fn current(&self) -> u64 {
        self.value
    }

    /// 返回当前值并将计数推进一步。
    pub fn advance(&mut self) -> u64 {
        let current = self.value;
        self.value = self.value.wrapping_add(1);
        current
    }

    pub(crate) fn reset(&mut self) {
        self.value = 0;
    }
}
