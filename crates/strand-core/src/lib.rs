#![deny(unsafe_code)]
#![doc = "strand-core: 结构化并发任务的 Job 状态机与取消/完成通知内核。"]
#![doc = ""]
#![doc = "== 定位与边界 =="]
#![doc = "本 crate 是任务树的无锁内核契约：原子生命周期状态机、父子取消联动、完成/取消回调分发与跨任务等待。"]
#![doc = "线程池、计时驱动与阻塞式入口等宿主能力不在此落地，只以 [`dispatch::Dispatch`] 等契约形态被消费。"]
#![doc = ""]
#![doc = "== 兼容性与版本治理 =="]
#![doc = "本 Crate 遵守语义化版本 2.0 (SemVer)。错误码（[`fault::codes`]）与回调触发次序属于公开契约，调整视为破坏性变更。"]

pub mod context;
pub mod dispatch;
pub mod fault;
pub mod job;
pub mod prelude;
pub mod test_stubs;

pub use context::{DispatcherRef, ExceptionHandler, JobRef, TaskContext, TaskName};
pub use dispatch::Dispatch;
pub use fault::{codes, Fault, JobOutcome};
pub use job::{
    Continuation, FaultPolicy, HandlerId, HookPolicy, Job, JobCore, Join, OnCancel, OnComplete,
    Registration, Settled, SilentPolicy,
};
