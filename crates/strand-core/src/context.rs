//! 任务上下文：以类型为键的不可变元数据集。
//!
//! # 教案级导览
//!
//! - **Why**：任务构造时需要携带一组按键检索的元数据——父任务、名字、异常
//!   处理器、派发器——且该集合必须能在父子任务间零成本共享；可变映射会把
//!   并发修改的同步负担转嫁给每个读者。
//! - **How**：内部是按 `TypeId` 索引的持久化单链表：`with` 在头部前插并与旧表
//!   共享尾部，`get` 自头向尾取第一个命中，因此新元素天然遮蔽同键旧元素。
//! - **What**：`TaskContext` 克隆只拷贝一个 `Option<Arc>`；元素一经放入即不可
//!   变，线程安全由 `Send + Sync` 约束静态保证。

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::dispatch::Dispatch;
use crate::fault::Fault;
use crate::job::Job;

/// `TaskContext` 聚合一次任务构造路径上的全部键控元数据。
///
/// # 契约说明（What）
/// - **前置条件**：元素类型须满足 `Any + Send + Sync`，以类型本身为键；
/// - **后置条件**：`with` 返回的新上下文与旧上下文共享未变部分，二者均可
///   继续独立使用；同键重复放入时后放入者遮蔽先放入者。
///
/// # 设计取舍与风险（Trade-offs）
/// - 检索为 O(n) 线性扫描：上下文元素通常只有个位数，换取零锁共享是合算的；
///   若未来元素数量膨胀，可在不破坏契约的前提下替换为持久化哈希结构。
#[derive(Clone, Default)]
pub struct TaskContext {
    head: Option<Arc<ContextCell>>,
}

struct ContextCell {
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    rest: Option<Arc<ContextCell>>,
}

impl TaskContext {
    /// 构造空上下文。
    pub fn new() -> Self {
        Self { head: None }
    }

    /// 放入一个元素并返回新的上下文，原上下文保持不变。
    pub fn with<E>(&self, element: E) -> Self
    where
        E: Any + Send + Sync,
    {
        Self {
            head: Some(Arc::new(ContextCell {
                key: TypeId::of::<E>(),
                value: Arc::new(element),
                rest: self.head.clone(),
            })),
        }
    }

    /// 按类型检索元素，返回第一个命中（即最近放入者）。
    pub fn get<E>(&self) -> Option<Arc<E>>
    where
        E: Any + Send + Sync,
    {
        let mut cursor = self.head.as_ref();
        while let Some(cell) = cursor {
            if cell.key == TypeId::of::<E>() {
                return Arc::clone(&cell.value).downcast::<E>().ok();
            }
            cursor = cell.rest.as_ref();
        }
        None
    }

    /// 判断上下文中是否存在指定类型的元素。
    pub fn contains<E>(&self) -> bool
    where
        E: Any + Send + Sync,
    {
        self.get::<E>().is_some()
    }

    /// 解析上下文中的任务引用元素，供子任务发现父任务。
    pub fn job(&self) -> Option<Arc<dyn Job>> {
        self.get::<JobRef>().map(|reference| reference.job())
    }

    /// 解析上下文中的任务名元素。
    pub fn name(&self) -> Option<Arc<TaskName>> {
        self.get::<TaskName>()
    }

    fn len(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.head.as_ref();
        while let Some(cell) = cursor {
            count += 1;
            cursor = cell.rest.as_ref();
        }
        count
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("elements", &self.len())
            .finish()
    }
}

/// 任务名元素，仅参与 `Display`/日志输出。
///
/// # 契约说明（What）
/// - 名字对同类任务应保持稳定含义，避免日志聚合碎片化；
/// - 核心不解析名字内容，也不参与任何调度决策。
#[derive(Clone, Debug)]
pub struct TaskName {
    name: Cow<'static, str>,
}

impl TaskName {
    /// 以给定名字构造元素。
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }

    /// 以字符串切片形式读取名字。
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// 任务引用元素：任务以此身份把自己插入上下文，充当子任务的父发现键。
///
/// # 逻辑解析（How）
/// - 子任务构造时读取传入上下文中的 `JobRef` 即得父任务；
/// - 任务随后以自身引用遮蔽该键，使孙代看到正确的父级。
pub struct JobRef {
    job: Arc<dyn Job>,
}

impl JobRef {
    /// 包装一个类型擦除的任务引用。
    pub fn new(job: Arc<dyn Job>) -> Self {
        Self { job }
    }

    /// 取出共享的任务引用。
    pub fn job(&self) -> Arc<dyn Job> {
        Arc::clone(&self.job)
    }
}

impl fmt::Debug for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRef").finish_non_exhaustive()
    }
}

/// 异常处理器元素：顶层任务变体把未处理失败交付到这里。
///
/// # 契约说明（What）
/// - **输入**：触发交付的任务上下文与失败本体；
/// - **前置条件**：回调须自备线程安全，可能在任意完成线程上被调用；
/// - **后置条件**：交付即视为“已消费”，核心不再向运行时扩散该失败。
pub struct ExceptionHandler {
    hook: Arc<dyn Fn(&TaskContext, &Fault) + Send + Sync>,
}

impl ExceptionHandler {
    /// 以处理闭包构造元素。
    pub fn new(hook: impl Fn(&TaskContext, &Fault) + Send + Sync + 'static) -> Self {
        Self {
            hook: Arc::new(hook),
        }
    }

    /// 调用处理闭包。
    pub fn invoke(&self, context: &TaskContext, fault: &Fault) {
        (self.hook)(context, fault);
    }
}

impl fmt::Debug for ExceptionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionHandler").finish_non_exhaustive()
    }
}

/// 派发器元素：上层经由上下文向续体恢复路径注入 [`Dispatch`] 实现。
pub struct DispatcherRef {
    dispatcher: Arc<dyn Dispatch>,
}

impl DispatcherRef {
    /// 包装一个派发器句柄。
    pub fn new(dispatcher: Arc<dyn Dispatch>) -> Self {
        Self { dispatcher }
    }

    /// 取出共享的派发器句柄。
    pub fn dispatcher(&self) -> Arc<dyn Dispatch> {
        Arc::clone(&self.dispatcher)
    }
}

impl fmt::Debug for DispatcherRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherRef").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_element_shadows_earlier_one() {
        let base = TaskContext::new().with(TaskName::new("outer"));
        let derived = base.with(TaskName::new("inner"));

        assert_eq!(
            derived.name().expect("派生上下文必须能检索到名字").as_str(),
            "inner",
            "后放入的元素应遮蔽同键旧元素"
        );
        assert_eq!(
            base.name().expect("原上下文不应被派生操作改写").as_str(),
            "outer",
            "原上下文必须保持不变"
        );
    }

    #[test]
    fn missing_element_yields_none() {
        let context = TaskContext::new();
        assert!(context.name().is_none(), "空上下文不应检索到任何元素");
        assert!(context.job().is_none(), "空上下文不应出现父任务");
        assert!(!context.contains::<TaskName>());
    }

    #[test]
    fn exception_handler_element_invokes_hook() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let hits = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&hits);
        let handler = ExceptionHandler::new(move |_context, fault| {
            assert!(!fault.is_cancellation(), "取消错误不应交付到异常处理器");
            observed.fetch_add(1, Ordering::AcqRel);
        });

        let context = TaskContext::new().with(handler);
        let element = context
            .get::<ExceptionHandler>()
            .expect("上下文必须能检索到异常处理器");
        element.invoke(&context, &Fault::failed("boom"));
        assert_eq!(hits.load(Ordering::Acquire), 1, "处理闭包应恰好执行一次");
    }
}
