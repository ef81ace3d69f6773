//! 生命周期状态：`Incomplete → Cancelling → Complete` 的封闭和类型。
//!
//! 每个存活态携带自己的回调表；转移时新态以克隆（指针拷贝）继承旧表，
//! 终态不再持表——胜出转移的发起方手握旧态快照，由它完成通知分发。

use std::sync::Arc;

use crate::fault::JobOutcome;

use super::handlers::HandlerList;

/// 任务生命周期的三个阶段。
///
/// # 契约说明（What）
/// - 合法转移仅有 `Incomplete → Cancelling`、`Incomplete → Complete` 与
///   `Cancelling → Complete`；终态不可再转移；
/// - `Complete` 直接持有 `Arc` 共享的终局结果：取消后补交结果的任务存储
///   取消错误，其余任务存储生产方提交的原始结果。
pub(crate) enum Lifecycle<T> {
    /// 尚未产生结果，也未被取消。
    Incomplete { handlers: HandlerList<T> },
    /// 已请求取消；任务体可能仍在运行。
    Cancelling { handlers: HandlerList<T> },
    /// 终态。回调表已清空，迟到的登记改为内联触发。
    Complete { outcome: Arc<JobOutcome<T>> },
}

impl<T> Lifecycle<T> {
    /// 初始状态：空回调表的 `Incomplete`。
    pub(crate) fn seed() -> Self {
        Lifecycle::Incomplete {
            handlers: HandlerList::empty(),
        }
    }

    /// 读取存活态的回调表；终态返回 `None`。
    pub(crate) fn handlers(&self) -> Option<&HandlerList<T>> {
        match self {
            Lifecycle::Incomplete { handlers } | Lifecycle::Cancelling { handlers } => {
                Some(handlers)
            }
            Lifecycle::Complete { .. } => None,
        }
    }

    /// 面向日志与 `Display` 的阶段名。
    pub(crate) fn phase_name(&self) -> &'static str {
        match self {
            Lifecycle::Incomplete { .. } => "incomplete",
            Lifecycle::Cancelling { .. } => "cancelling",
            Lifecycle::Complete { .. } => "complete",
        }
    }

    /// 向快照中的全部取消回调分发通知。
    ///
    /// 调用方必须持有胜出转移之前的旧态：这保证每个回调只被通知一次，
    /// 且并发移除不影响已捕获的快照。
    pub(crate) fn notify_cancellation(&self) {
        if let Some(handlers) = self.handlers() {
            handlers.for_each(|node| node.fire_cancel());
        }
    }

    /// 以生产方提交的原始结果向快照中的全部完成回调分发通知。
    ///
    /// 注意入参是**原始结果**而非存储终态：取消后补交结果时二者不同
    /// （存储态为取消错误），完成订阅方约定看到前者。
    pub(crate) fn notify_completion(&self, outcome: &JobOutcome<T>) {
        if let Some(handlers) = self.handlers() {
            handlers.for_each(|node| node.fire_completion(outcome));
        }
    }
}
