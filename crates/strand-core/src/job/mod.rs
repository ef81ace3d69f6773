//! Job 生命周期内核：状态机、回调登记与父子取消联动。
//!
//! # 教案级导览
//!
//! - **Why**：本模块是仓库中唯一的无锁并发组件；上层的派发封装、入口函数与
//!   上下文元素全部组合该原语，因此它的契约必须经得起任意线程交错。
//! - **How**：所有公开操作都归约为对单一原子状态格的 CAS 重试循环：读取旧态、
//!   以继承回调表的方式构造候选新态、尝试安装；对外可见的副作用（回调分发、
//!   父订阅释放）严格发生在胜出的 CAS 之后，落败方不产生任何可观察效果。
//! - **What**：
//!   - [`Job`]：类型擦除的生命周期句柄，供父子联动与上下文存放；
//!   - [`JobCore`]：携带结果类型的引擎本体，含 `resume_with`/`on_completed`；
//!   - [`Registration`]：登记回调后获得的幂等注销句柄；
//!   - [`Join`]/[`Settled`]：等待终态的挂起原语；
//!   - [`FaultPolicy`]：顶层任务变体改写未处理失败去向的缝。

use std::fmt;
use std::sync::Arc;

use crate::fault::{Fault, JobOutcome};

mod core;
mod handlers;
mod join;
mod policy;
mod state;

pub use self::core::JobCore;
pub use handlers::{HandlerId, Registration};
pub use join::{Join, Settled};
pub use policy::{FaultPolicy, HookPolicy, SilentPolicy};

/// 取消回调：进入取消流程时恰好调用一次。
pub type OnCancel = Box<dyn Fn() + Send + Sync>;

/// 单位完成回调：终态到达时恰好调用一次，不携带结果。
///
/// 需要观察结果本体的订阅方应使用 [`JobCore::on_completed`]。
pub type OnComplete = Box<dyn Fn() + Send + Sync>;

/// `Job` 是可终结工作单元的类型擦除句柄。
///
/// # 设计背景（Why）
/// - 父子联动、上下文存放与 `join` 等待都不关心结果类型，擦除后的句柄才能在
///   异构任务树中自由流动；
/// - 携带类型的操作（`resume_with`、结果回调）保留在 [`JobCore`] 上。
///
/// # 契约说明（What）
/// - 所有方法都允许任意线程并发调用；
/// - `cancel` 返回 `true` 当且仅当本次调用完成了 `Incomplete → Cancelling`
///   转移，重复调用与对终态任务的调用均为无副作用的 `false`；
/// - 终态之后登记的回调按“迟到即内联触发”的规则立即执行（见各方法文档）。
pub trait Job: Send + Sync + fmt::Debug {
    /// 任务是否仍处于未取消、未完成状态。
    fn is_active(&self) -> bool;

    /// 任务是否已进入终态。
    fn is_completed(&self) -> bool;

    /// 请求取消：首个生效调用同步触发全部取消回调并释放父订阅。
    fn cancel(&self) -> bool;

    /// 登记取消回调；若已处于取消流程或终态则立即内联触发并返回空句柄。
    ///
    /// # 风险提示（Trade-offs）
    /// - 对**正常完成**的任务登记取消回调同样会内联触发——这是被保留的
    ///   历史行为，订阅方若需区分取消与完成，应改用完成回调读取结果。
    fn invoke_on_cancel(&self, on_cancel: OnCancel) -> Registration;

    /// 登记单位完成回调；终态任务上登记立即内联触发并返回空句柄。
    fn invoke_on_completion(&self, on_complete: OnComplete) -> Registration;

    /// 从当前回调表中移除句柄指向的登记；终态任务上为无副作用操作。
    fn remove(&self, registration: &Registration);

    /// 等待任务终结的挂起原语；丢弃返回的 future 即撤销等待。
    fn join(&self) -> Join;

    /// 读取构造时从上下文发现的父任务。
    fn parent(&self) -> Option<Arc<dyn Job>>;

    /// 子任务失败时的父侧入口：取消自身并继续向上递交。
    ///
    /// 返回 `true` 表示失败已在本层或更高层被消费。
    fn handle_child_exception(&self, fault: &Fault) -> bool;
}

/// `Continuation` 是外部驱动方恢复任务的口：以最终结果结束一次计算。
///
/// # 契约说明（What）
/// - `resume_with` 对每个任务至多成功一次；重复调用返回
///   [`crate::fault::codes::JOB_ALREADY_COMPLETED`] 错误；
/// - 已进入取消流程的任务收到结果后仍会终结，但存储的终态错误为取消
///   （完成回调照常收到原始结果，见 [`JobCore::resume_with`]）。
pub trait Continuation<T>: Send + Sync {
    /// 以结果恢复任务，推动其进入终态。
    fn resume_with(&self, outcome: JobOutcome<T>) -> Result<(), Fault>;
}
