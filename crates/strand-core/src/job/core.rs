//! `JobCore`：原子状态格上的生命周期引擎。
//!
//! # 教案级导览
//!
//! - **Why**：取消、完成、回调登记与注销可能在任意线程上并发发生；引擎把
//!   全部共享可变性收敛到一个 `Arc` 状态格里，用 CAS 重试循环保证每次转移
//!   恰好胜出一次。
//! - **How**：每个公开操作遵循同一模式——读取旧态、构造继承回调表的候选
//!   新态、`compare_and_swap` 安装；落败方丢弃候选（及其表的指针拷贝）后
//!   以新观测重试。回调分发、父订阅释放等副作用严格发生在胜出之后，因此
//!   恰好执行一次。
//! - **What**：构造经由 [`JobCore::bind`]；父任务从传入上下文发现，父侧的
//!   取消订阅作为构造的最后一步登记，并在首个取消/终态转移上释放。

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use arc_swap::{ArcSwap, Guard};

use crate::context::{JobRef, TaskContext, TaskName};
use crate::fault::{Fault, JobOutcome};

use super::handlers::{HandlerHost, HandlerId, HandlerNode, Registration};
use super::join::{Join, Settled};
use super::policy::{FaultPolicy, SilentPolicy};
use super::state::Lifecycle;
use super::{Continuation, Job, OnCancel, OnComplete};

/// 取消后补交结果时写入终态的取消消息。
const RESUMED_AFTER_CANCEL: &str = "Result arrived, but cancelled already.";

/// `JobCore<T>` 是携带结果类型的任务引擎本体。
///
/// # 设计背景（Why）
/// - 对应抽象任务对象：原子生命周期、父子取消联动、完成/取消回调分发、
///   跨任务等待与失败上行传播都实现在这一个类型上；
/// - 类型擦除面（[`Job`]）供任务树与上下文使用，类型面（本类型）供生产方
///   与结果订阅方使用。
///
/// # 并发契约（What）
/// - 所有方法允许任意线程并发调用；状态格是唯一同步点；
/// - 胜出 `Complete` 转移的 CAS 与后续读取构成 happens-before：观察到终态
///   的读者必然看到存储的结果与被捕获的回调快照。
///
/// # 生命周期（How）
/// - 经 [`JobCore::bind`] 以 `Arc` 形态诞生于 `Incomplete`；
/// - 生产方以 [`JobCore::resume_with`] 终结，任何一方可 [`JobCore::cancel`]；
/// - 终态后回调表被丢弃、父订阅被释放，任务随最后一个 `Arc` 回收。
pub struct JobCore<T> {
    state: ArcSwap<Lifecycle<T>>,
    base_context: TaskContext,
    full_context: OnceLock<TaskContext>,
    parent: Option<Arc<dyn Job>>,
    parent_handle: Mutex<Option<Registration>>,
    policy: Box<dyn FaultPolicy>,
    weak_self: Weak<JobCore<T>>,
}

impl<T: Send + Sync + 'static> JobCore<T> {
    /// 以默认失败策略（[`SilentPolicy`]）构造任务。
    ///
    /// 见 [`JobCore::bind_with_policy`]。
    pub fn bind(context: TaskContext) -> Arc<Self> {
        Self::bind_with_policy(context, SilentPolicy)
    }

    /// 以指定失败策略构造任务并接入父任务取消链。
    ///
    /// # 契约说明（What）
    /// - **输入**：`context` 为调用方上下文；若其中含 [`JobRef`] 元素，该任务
    ///   即成为新任务的父级；`policy` 决定未处理失败的归宿；
    /// - **后置条件**：任务处于 `Incomplete`；父订阅已作为构造的最后一步
    ///   登记完毕——若父任务此刻已在取消流程，新任务会在本调用内被同步
    ///   取消（迟到登记内联触发的直接推论）。
    ///
    /// # 风险提示（Trade-offs）
    /// - 父侧取消闭包强持有子任务：只要父任务存活且未终结，子任务即保持
    ///   可取消；该强引用在任一方的首个终态/取消转移上被拆除，终结之后
    ///   不存在引用环。
    pub fn bind_with_policy(context: TaskContext, policy: impl FaultPolicy + 'static) -> Arc<Self> {
        let parent = context.job();
        let core = Arc::new_cyclic(|weak| JobCore {
            state: ArcSwap::from_pointee(Lifecycle::seed()),
            base_context: context,
            full_context: OnceLock::new(),
            parent: parent.clone(),
            parent_handle: Mutex::new(None),
            policy: Box::new(policy),
            weak_self: Weak::clone(weak),
        });
        if let Some(parent) = parent {
            let child: Arc<dyn Job> = core.clone();
            let subscription = parent.invoke_on_cancel(Box::new(move || {
                child.cancel();
            }));
            let mut slot = core.parent_handle.lock().unwrap_or_else(|e| e.into_inner());
            *slot = Some(subscription);
        }
        core
    }

    /// 返回把自身注入 [`JobRef`] 元素后的完整上下文。
    ///
    /// 子任务应以该上下文构造，从而把本任务发现为父级；自身条目会遮蔽
    /// 传入上下文中的上一代 [`JobRef`]。
    pub fn context(&self) -> TaskContext {
        self.full_context
            .get_or_init(|| match self.weak_self.upgrade() {
                Some(this) => self.base_context.with(JobRef::new(this as Arc<dyn Job>)),
                // 仅在构造期之外不可达：`&self` 存在即证明 Arc 仍然存活。
                None => self.base_context.clone(),
            })
            .clone()
    }

    /// 以结果恢复任务：生产方侧的终态转移。
    ///
    /// # 契约说明（What）
    /// - `Incomplete` 起：存储提交的结果进入 `Complete`；
    /// - `Cancelling` 起：**无视入参**存储取消错误
    ///   （`"Result arrived, but cancelled already."`）进入 `Complete`——
    ///   被取消的任务永远以取消错误终结；
    /// - `Complete` 起：返回 [`crate::fault::codes::JOB_ALREADY_COMPLETED`]。
    ///
    /// # 副作用次序（How）
    /// 胜出 CAS 之后依次：非取消类终态错误先走父链传播；随后以**原始入参**
    /// 向快照中的完成回调分发（而非存储态——取消后补交的场景二者不同）；
    /// 回调表随快照丢弃而清空；最后释放父订阅。
    pub fn resume_with(&self, outcome: JobOutcome<T>) -> Result<(), Fault> {
        let supplied = Arc::new(outcome);
        let mut observed = self.state.load_full();
        let stored: Arc<JobOutcome<T>>;
        loop {
            let next = match &*observed {
                Lifecycle::Complete { .. } => return Err(Fault::already_completed()),
                Lifecycle::Incomplete { .. } => Arc::clone(&supplied),
                Lifecycle::Cancelling { .. } => {
                    Arc::new(Err(Fault::cancelled(RESUMED_AFTER_CANCEL)))
                }
            };
            let candidate = Arc::new(Lifecycle::Complete {
                outcome: Arc::clone(&next),
            });
            let previous = self.state.compare_and_swap(&observed, candidate);
            if Arc::ptr_eq(&*previous, &observed) {
                stored = next;
                break;
            }
            observed = Guard::into_inner(previous);
        }

        if let Err(fault) = stored.as_ref() {
            if !fault.is_cancellation() && !self.try_handle_exception(fault) {
                tracing::error!(
                    target: "strand_core::job",
                    job = %self,
                    code = fault.code(),
                    "任务失败未被任何层级消费"
                );
            }
        }
        observed.notify_completion(supplied.as_ref());
        self.release_parent_handle();
        tracing::debug!(target: "strand_core::job", job = %self, "任务进入终态");
        Ok(())
    }

    /// 请求取消。
    ///
    /// # 契约说明（What）
    /// - `Incomplete` 起：转移到 `Cancelling`，随后**同步**触发快照中的全部
    ///   取消回调并释放父订阅，返回 `true`；
    /// - `Cancelling`/`Complete` 起：无副作用，返回 `false`。
    pub fn cancel(&self) -> bool {
        let mut observed = self.state.load_full();
        loop {
            let candidate = match &*observed {
                Lifecycle::Incomplete { handlers } => Arc::new(Lifecycle::Cancelling {
                    handlers: handlers.clone(),
                }),
                Lifecycle::Cancelling { .. } | Lifecycle::Complete { .. } => return false,
            };
            let previous = self.state.compare_and_swap(&observed, candidate);
            if Arc::ptr_eq(&*previous, &observed) {
                break;
            }
            observed = Guard::into_inner(previous);
        }
        observed.notify_cancellation();
        self.release_parent_handle();
        tracing::debug!(target: "strand_core::job", job = %self, "任务进入取消流程");
        true
    }

    /// 登记取消回调。
    ///
    /// `Incomplete` 起加入回调表并返回可注销句柄；`Cancelling`/`Complete`
    /// 起立即内联触发并返回空句柄。后者包含**正常完成**的任务——该历史
    /// 行为被契约显式保留（见 [`Job::invoke_on_cancel`]）。
    pub fn invoke_on_cancel(&self, on_cancel: OnCancel) -> Registration {
        let node = HandlerNode::cancel(on_cancel);
        let mut observed = self.state.load_full();
        loop {
            let candidate = match &*observed {
                Lifecycle::Incomplete { handlers } => Arc::new(Lifecycle::Incomplete {
                    handlers: handlers.cons(Arc::clone(&node)),
                }),
                Lifecycle::Cancelling { .. } | Lifecycle::Complete { .. } => {
                    node.fire_cancel();
                    return Registration::noop();
                }
            };
            let previous = self.state.compare_and_swap(&observed, candidate);
            if Arc::ptr_eq(&*previous, &observed) {
                return Registration::bound(self.weak_host(), node.id);
            }
            observed = Guard::into_inner(previous);
        }
    }

    /// 登记携带结果的完成回调。
    ///
    /// # 契约说明（What）
    /// - `Incomplete`/`Cancelling` 起加入回调表——取消流程中的任务仍接受
    ///   完成订阅，这是“登记返回即必达”可见性保证的前提；
    /// - `Complete` 起以存储结果立即内联触发并返回空句柄；
    /// - 回调收到的是生产方的**原始结果**；终态内联触发收到的是存储结果
    ///   （仅在取消后补交的场景二者不同，该不对称被契约保留）。
    pub fn on_completed(
        &self,
        on_complete: impl Fn(&JobOutcome<T>) + Send + Sync + 'static,
    ) -> Registration {
        self.register_completion(HandlerNode::completion(Box::new(on_complete)))
    }

    fn register_completion(&self, node: Arc<HandlerNode<T>>) -> Registration {
        let mut observed = self.state.load_full();
        loop {
            let candidate = match &*observed {
                Lifecycle::Incomplete { handlers } => Arc::new(Lifecycle::Incomplete {
                    handlers: handlers.cons(Arc::clone(&node)),
                }),
                Lifecycle::Cancelling { handlers } => Arc::new(Lifecycle::Cancelling {
                    handlers: handlers.cons(Arc::clone(&node)),
                }),
                Lifecycle::Complete { outcome } => {
                    node.fire_completion(outcome.as_ref());
                    return Registration::noop();
                }
            };
            let previous = self.state.compare_and_swap(&observed, candidate);
            if Arc::ptr_eq(&*previous, &observed) {
                return Registration::bound(self.weak_host(), node.id);
            }
            observed = Guard::into_inner(previous);
        }
    }

    /// 从当前回调表移除句柄指向的登记；空句柄与终态任务上为无副作用操作。
    pub fn remove(&self, registration: &Registration) {
        if let Some(id) = registration.id() {
            self.discard(id);
        }
    }

    /// 等待任务终结的挂起原语。
    ///
    /// # 契约说明（What）
    /// - 目标已是 `Complete`（快路径）：父任务存在且不再活跃时以
    ///   `Cancelled("Parent cancelled.")` 失败，否则立即就绪；
    /// - 否则登记单位完成回调挂起等待，终态到达后以单位值就绪；
    /// - 等待可撤销：丢弃返回的 [`Join`] 即注销该登记，不影响目标任务。
    pub fn join(&self) -> Join {
        Join::new(self.weak_self.upgrade().map(|this| this as Arc<dyn Job>))
    }

    /// 返回解析到存储终局结果的 future：结果型任务变体的等待口。
    pub fn settled(this: &Arc<Self>) -> Settled<T>
    where
        T: Clone,
    {
        Settled::new(Arc::clone(this))
    }

    /// 读取存储的终局结果；尚未终结时返回 `None`。
    ///
    /// 注意：取消后补交结果的任务这里读到取消错误，而完成回调收到的是
    /// 原始结果——观察途径不同，观测值即不同（契约保留的不对称）。
    pub fn outcome(&self) -> Option<JobOutcome<T>>
    where
        T: Clone,
    {
        match &**self.state.load() {
            Lifecycle::Complete { outcome } => Some((**outcome).clone()),
            _ => None,
        }
    }

    /// 任务是否仍处于未取消、未完成状态。
    pub fn is_active(&self) -> bool {
        matches!(&**self.state.load(), Lifecycle::Incomplete { .. })
    }

    /// 任务是否已进入终态。
    pub fn is_completed(&self) -> bool {
        matches!(&**self.state.load(), Lifecycle::Complete { .. })
    }

    /// 读取父任务引用。
    pub fn parent(&self) -> Option<Arc<dyn Job>> {
        self.parent.clone()
    }

    /// 失败上行传播入口。
    ///
    /// # 逻辑解析（How）
    /// - 取消类错误不传播（合法终态）；
    /// - 否则递交父任务的 [`Job::handle_child_exception`]——父侧默认实现取消
    ///   自身并继续上行；任一祖先消费则传播停止；
    /// - 上行返回 `false`（或没有父任务）时，落回本任务的失败策略。
    fn try_handle_exception(&self, fault: &Fault) -> bool {
        if fault.is_cancellation() {
            return false;
        }
        let escalated = match &self.parent {
            Some(parent) => parent.handle_child_exception(fault),
            None => false,
        };
        escalated || self.policy.handle_job_exception(&self.context(), fault)
    }

    /// 释放父侧取消订阅；幂等。
    fn release_parent_handle(&self) {
        let subscription = {
            let mut slot = self.parent_handle.lock().unwrap_or_else(|e| e.into_inner());
            slot.take()
        };
        if let Some(subscription) = subscription {
            subscription.dispose();
        }
    }

    fn weak_host(&self) -> Weak<dyn HandlerHost> {
        let host: Weak<dyn HandlerHost> = self.weak_self.clone();
        host
    }

    #[cfg(test)]
    pub(crate) fn handler_count(&self) -> usize {
        self.state
            .load()
            .handlers()
            .map(|handlers| handlers.len())
            .unwrap_or(0)
    }
}

impl<T: Send + Sync + 'static> HandlerHost for JobCore<T> {
    fn discard(&self, id: HandlerId) {
        let mut observed = self.state.load_full();
        loop {
            let candidate = match &*observed {
                Lifecycle::Complete { .. } => return,
                Lifecycle::Incomplete { handlers } => match handlers.without(id) {
                    Some(trimmed) => Arc::new(Lifecycle::Incomplete { handlers: trimmed }),
                    None => return,
                },
                Lifecycle::Cancelling { handlers } => match handlers.without(id) {
                    Some(trimmed) => Arc::new(Lifecycle::Cancelling { handlers: trimmed }),
                    None => return,
                },
            };
            let previous = self.state.compare_and_swap(&observed, candidate);
            if Arc::ptr_eq(&*previous, &observed) {
                return;
            }
            observed = Guard::into_inner(previous);
        }
    }
}

impl<T: Send + Sync + 'static> Job for JobCore<T> {
    fn is_active(&self) -> bool {
        JobCore::is_active(self)
    }

    fn is_completed(&self) -> bool {
        JobCore::is_completed(self)
    }

    fn cancel(&self) -> bool {
        JobCore::cancel(self)
    }

    fn invoke_on_cancel(&self, on_cancel: OnCancel) -> Registration {
        JobCore::invoke_on_cancel(self, on_cancel)
    }

    fn invoke_on_completion(&self, on_complete: OnComplete) -> Registration {
        self.register_completion(HandlerNode::completion_unit(on_complete))
    }

    fn remove(&self, registration: &Registration) {
        JobCore::remove(self, registration)
    }

    fn join(&self) -> Join {
        JobCore::join(self)
    }

    fn parent(&self) -> Option<Arc<dyn Job>> {
        JobCore::parent(self)
    }

    fn handle_child_exception(&self, fault: &Fault) -> bool {
        self.cancel();
        self.try_handle_exception(fault)
    }
}

impl<T: Send + Sync + 'static> Continuation<T> for JobCore<T> {
    fn resume_with(&self, outcome: JobOutcome<T>) -> Result<(), Fault> {
        JobCore::resume_with(self, outcome)
    }
}

impl<T> fmt::Display for JobCore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.load();
        match self.base_context.get::<TaskName>() {
            Some(name) => write!(f, "{}#{}", name, state.phase_name()),
            None => write!(f, "job#{}", state.phase_name()),
        }
    }
}

impl<T> fmt::Debug for JobCore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCore")
            .field("phase", &self.state.load().phase_name())
            .field("name", &self.base_context.get::<TaskName>().map(|n| n.as_str().to_owned()))
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
