//! # Contract-only Dispatcher Surface
//!
//! ## 契约声明
//! * **Contract-only：** 本模块仅定义“把一段续体工作投递到某个执行载体”的最小
//!   抽象，核心状态机自身从不调度工作，只负责在上下文中携带该句柄。
//! * **禁止实现：** 线程池、事件队列等具体执行器属于宿主仓库的职责，不允许在
//!   本 crate 落地；测试替身统一收敛在 [`crate::test_stubs`]。
//!
//! ## 并发与错误语义
//! * 实现必须允许任意线程并发调用 `dispatch`，且不得假设调用方与执行方同线程；
//! * 投递的闭包为 `FnOnce`，实现方需保证其恰好执行一次或在关停时显式丢弃。

/// `Dispatch` 描述续体恢复工作的投递口。
///
/// # 设计背景（Why）
/// - 状态机被 `resume_with` 推入终态后，上层需要把后续回调搬运到目标线程；
///   该关注点与生命周期语义正交，因此只保留对象安全的最小接口。
///
/// # 契约说明（What）
/// - **输入**：`block` 为一次性闭包，满足 `Send + 'static`；
/// - **后置条件**：接口返回不代表闭包已执行，仅代表投递完成；
/// - 实现方通过 [`crate::context::DispatcherRef`] 注入上下文供上层发现。
///
/// # 风险提示（Trade-offs）
/// - 未提供批量投递与优先级参数：本核心的消费方只有回调搬运一种场景，
///   扩展语义应由宿主运行时在自己的接口上表达。
pub trait Dispatch: Send + Sync {
    /// 将一段一次性工作投递到实现方选择的执行载体。
    fn dispatch(&self, block: Box<dyn FnOnce() + Send + 'static>);
}
