//! 未处理失败的去向策略：任务变体改写 `handle_job_exception` 的缝。
//!
//! 失败沿父链上行、逐层取消祖先之后，若没有任何一层消费它，最终会落回
//! 发起任务的策略对象。默认策略静默放行（由引擎记录日志）；顶层“监督式”
//! 变体把失败交付到上下文中的异常处理器元素。

use crate::context::{ExceptionHandler, TaskContext};
use crate::fault::Fault;

/// `FaultPolicy` 决定传播链走到尽头的失败归宿。
///
/// # 设计背景（Why）
/// - 结果自带归宿的任务（结果型变体经 `Settled` 交付失败）与顶层启动器
///   （无人等待，必须主动上报）对未处理失败的需求相反；以带默认实现的
///   trait 作缝，变体只需覆写一个方法。
///
/// # 契约说明（What）
/// - 返回 `true` 表示失败已被消费，引擎不再扩散；
/// - 实现必须幂等且线程安全：调用可能发生在任意完成线程上。
pub trait FaultPolicy: Send + Sync {
    /// 处理走完父链仍未被消费的失败；默认不消费。
    fn handle_job_exception(&self, context: &TaskContext, fault: &Fault) -> bool {
        let _ = (context, fault);
        false
    }
}

/// 默认策略：不消费失败，交由引擎以日志形式暴露。
///
/// 结果型任务使用该策略——失败已经存入终态，等待方迟早会读到。
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentPolicy;

impl FaultPolicy for SilentPolicy {}

/// 监督策略：把失败交付到上下文中的 [`ExceptionHandler`] 元素。
///
/// # 契约说明（What）
/// - 上下文存在异常处理器时交付并返回 `true`；
/// - 否则返回 `false`，失败按未处理路径以错误日志暴露。
#[derive(Clone, Copy, Debug, Default)]
pub struct HookPolicy;

impl FaultPolicy for HookPolicy {
    fn handle_job_exception(&self, context: &TaskContext, fault: &Fault) -> bool {
        match context.get::<ExceptionHandler>() {
            Some(handler) => {
                handler.invoke(context, fault);
                true
            }
            None => false,
        }
    }
}
