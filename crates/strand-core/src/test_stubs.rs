//! 测试桩命名空间：集中暴露框架官方维护的最小实现，供集成测试与示例复用。
//!
//! # 设计定位（Why）
//! - 契约测试经常需要一个满足 [`crate::dispatch::Dispatch`] 或异常处理器
//!   契约的对象，但只关心业务断言本身；
//! - 统一维护避免各测试文件重复定义桩类型，接口调整时获得单点编译错误。
//!
//! # 使用方式（How）
//! - `InlineDispatcher` 直接在调用线程执行投递的闭包，适合验证调用链；
//! - `RecordingHandler` 捕获交付到异常处理器元素的失败，供断言回放。
//!
//! # 风险提示（Trade-offs）
//! - 桩对象完全串行、无调度语义，不能用于验证真实执行器的时序行为。

use std::sync::{Arc, Mutex};

use crate::context::ExceptionHandler;
use crate::dispatch::Dispatch;
use crate::fault::Fault;

/// 在调用线程上立即执行投递闭包的派发器桩。
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineDispatcher;

impl Dispatch for InlineDispatcher {
    fn dispatch(&self, block: Box<dyn FnOnce() + Send + 'static>) {
        block();
    }
}

/// 捕获异常交付的记录器：把收到的失败按序存入内部缓冲。
#[derive(Debug, Default)]
pub struct RecordingHandler {
    faults: Mutex<Vec<Fault>>,
}

impl RecordingHandler {
    /// 构造共享记录器。
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 生成指向本记录器的异常处理器元素。
    pub fn element(this: &Arc<Self>) -> ExceptionHandler {
        let sink = Arc::clone(this);
        ExceptionHandler::new(move |_context, fault| {
            sink.push(fault.clone());
        })
    }

    /// 读取已记录失败的快照。
    pub fn faults(&self) -> Vec<Fault> {
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 是否尚未记录任何失败。
    pub fn is_empty(&self) -> bool {
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    fn push(&self, fault: Fault) {
        self.faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(fault);
    }
}
