//! 常用类型一揽子导入。
//!
//! 业务侧执行 `use strand_core::prelude::*;` 即可获得构造任务、登记回调、
//! 等待终态所需的最小集合；按名引用细分模块时请直接走具名路径。

pub use crate::context::{DispatcherRef, ExceptionHandler, JobRef, TaskContext, TaskName};
pub use crate::dispatch::Dispatch;
pub use crate::fault::{codes, Fault, JobOutcome};
pub use crate::job::{
    Continuation, FaultPolicy, HookPolicy, Job, JobCore, Join, Registration, Settled, SilentPolicy,
};
