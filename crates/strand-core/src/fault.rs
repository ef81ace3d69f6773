//! 任务域错误模型。
//!
//! # 教案级导览
//!
//! - **Why**：Job 状态机需要一种可在终态中长期保存、又能同时交给多个回调与
//!   父链传播路径的错误载体；`std::error::Error` 对象本身不可克隆，无法满足
//!   “一份错误、多方观察”的共享语义。
//! - **How**：`Fault` 以 `Arc` 包裹内部载荷实现廉价克隆；载荷由稳定错误码、
//!   人类可读消息与可选底层原因三部分构成，`source()` 沿原因链向上游递归。
//! - **What**：错误码遵循 `<域>.<语义>` 约定并集中登记在 [`codes`] 模块；
//!   取消类错误通过 [`Fault::is_cancellation`] 与其它失败区分，因为二者在
//!   父链传播策略上完全不同。

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// 任务结果别名：成功值或 [`Fault`]。
///
/// # 契约说明（What）
/// - 终态存储、完成回调与 `resume_with` 的入参均使用该别名；
/// - “值与错误同时为空”的非法终态在类型层即不可表达，无需运行期断言。
pub type JobOutcome<T> = Result<T, Fault>;

/// 稳定错误码登记表。
///
/// # 设计背景（Why）
/// - 日志、断言与上层治理逻辑都依赖错误码做精确分支，字符串匹配消息文本
///   会随措辞调整而脆化；
/// - 集中登记可避免各调用点散落自定义码值导致语义漂移。
///
/// # 契约说明（What）
/// - 所有码值均为 `'static` 字符串，命名遵循 `<域>.<语义>`；
/// - 新增码值必须同步补充文档与测试，删除或改名视为破坏性变更。
pub mod codes {
    /// 任务被取消：等待方的父任务失效、取消后补交结果等场景均使用该码。
    pub const JOB_CANCELLED: &str = "job.cancelled";
    /// 编程错误：对同一任务重复调用 `resume_with`。
    pub const JOB_ALREADY_COMPLETED: &str = "job.already_completed";
    /// 防御性错误：终态被观测到却无法重构出结果（按构造不可达）。
    pub const JOB_ILLEGAL_TERMINAL: &str = "job.illegal_terminal_state";
    /// 任务体执行失败的通用码，适用于未细分领域的业务错误。
    pub const JOB_FAILED: &str = "job.failed";
}

/// `Fault` 是核心边界上的多态错误值：稳定码 + 消息 + 可选原因链。
///
/// # 设计背景（Why）
/// - 同一个错误会被写入终态、交给若干完成回调、再沿父链向上传播；
///   以 `Arc` 共享载荷使克隆成本降为指针拷贝，且各观察方看到同一实例。
///
/// # 逻辑解析（How）
/// - 构造后不可变；`with_cause` 以重建方式返回携带原因的新实例；
/// - `source()` 暴露原因链，兼容 `std::error::Error` 生态的链式排障约定。
///
/// # 契约说明（What）
/// - **前置条件**：`code` 必须来自 [`codes`] 或调用方自有的稳定约定；
/// - **后置条件**：实例满足 `Send + Sync + 'static`，可跨线程自由传递。
///
/// # 设计取舍与风险（Trade-offs）
/// - 不携带回溯栈：核心面向库内状态机，栈采集留给上层按需包装；
/// - 消息采用 `Cow`，静态文案零分配，动态拼接才触发堆分配。
#[derive(Clone, Debug)]
pub struct Fault {
    inner: Arc<FaultInner>,
}

#[derive(Debug)]
struct FaultInner {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl Fault {
    /// 以稳定错误码与消息构造错误。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            inner: Arc::new(FaultInner {
                code,
                message: message.into(),
                cause: None,
            }),
        }
    }

    /// 构造取消类错误（码值 [`codes::JOB_CANCELLED`]）。
    ///
    /// # 契约说明（What）
    /// - 取消是合法终态而非故障：该类错误不会进入父链传播（见
    ///   `JobCore::try_handle_exception`），调用方也不应将其计入失败指标。
    pub fn cancelled(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(codes::JOB_CANCELLED, message)
    }

    /// 构造“重复完成”编程错误。
    pub fn already_completed() -> Self {
        Self::new(codes::JOB_ALREADY_COMPLETED, "job already completed")
    }

    /// 构造“非法终态”防御性错误。
    pub fn illegal_terminal() -> Self {
        Self::new(
            codes::JOB_ILLEGAL_TERMINAL,
            "terminal state carries no reconstructable outcome",
        )
    }

    /// 构造通用任务失败错误（码值 [`codes::JOB_FAILED`]）。
    pub fn failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(codes::JOB_FAILED, message)
    }

    /// 附带底层原因并返回新的错误实例。
    ///
    /// # 逻辑解析（How）
    /// - 载荷不可变，故以重建方式生成新 `Arc`；旧实例不受影响。
    pub fn with_cause(self, cause: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(FaultInner {
                code: self.inner.code,
                message: self.inner.message.clone(),
                cause: Some(Arc::new(cause)),
            }),
        }
    }

    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        self.inner.code
    }

    /// 获取描述消息。
    pub fn message(&self) -> &str {
        &self.inner.message
    }

    /// 获取底层原因。
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.inner.cause.as_deref()
    }

    /// 判断是否为取消类错误。
    ///
    /// # 语义说明
    /// - 父链传播与失败上报逻辑据此分流：取消不算故障。
    pub fn is_cancellation(&self) -> bool {
        self.inner.code == codes::JOB_CANCELLED
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.inner.code, self.inner.message)
    }
}

impl StdError for Fault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn StdError + 'static))
    }
}
