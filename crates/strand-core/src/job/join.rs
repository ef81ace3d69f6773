//! 等待任务终结的挂起原语。
//!
//! # 教案级导览
//!
//! - **Why**：`join` 是核心唯一的挂起点；在无原生协程的宿主语言里，它被
//!   建模为“经 `invoke_on_completion` 挂接唤醒事件”的 future——等待方的
//!   取消即丢弃 future，丢弃即注销挂接，目标任务不受任何影响。
//! - **How**：首次轮询先走快路径（目标已终态则立即裁决）；否则先存入
//!   唤醒器、再登记完成回调——若登记与终态转移竞争落败，回调会在登记
//!   调用内被内联触发，随后的就绪检查保证不丢唤醒。
//! - **What**：[`Join`] 以单位值就绪；[`Settled`] 在其上解析存储的终局
//!   结果，是结果型任务变体的等待口。

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

use crate::fault::{Fault, JobOutcome};

use super::core::JobCore;
use super::handlers::Registration;
use super::Job;

/// `Join` 等待目标任务进入终态。
///
/// # 契约说明（What）
/// - 目标已终态（快路径）：若目标的父任务存在且不再活跃，以
///   `Cancelled("Parent cancelled.")` 失败；否则立即就绪；
/// - 否则挂起；终态到达后以 `Ok(())` 就绪——裁决只发生在快路径上；
/// - **丢弃即撤销**：`Drop` 注销登记的完成回调，目标任务不受影响；
///   等待方所在任务被取消时，按异步取消惯例丢弃本 future 即可。
pub struct Join {
    target: Option<Arc<dyn Job>>,
    shared: Arc<JoinShared>,
    registration: Option<Registration>,
}

struct JoinShared {
    done: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl Join {
    pub(crate) fn new(target: Option<Arc<dyn Job>>) -> Self {
        Self {
            target,
            shared: Arc::new(JoinShared {
                done: AtomicBool::new(false),
                waker: Mutex::new(None),
            }),
            registration: None,
        }
    }

    fn completed_verdict(target: &Arc<dyn Job>) -> JobOutcome<()> {
        match target.parent() {
            Some(parent) if !parent.is_active() => Err(Fault::cancelled("Parent cancelled.")),
            _ => Ok(()),
        }
    }

    /// 以驻留当前线程的方式驱动等待：面向非异步调用方的阻塞入口。
    ///
    /// # 风险提示（Trade-offs）
    /// - 阻塞期间不响应调用线程所属任务的取消；需要可取消等待的调用方
    ///   应在异步执行器中 `await` 本 future。
    pub fn wait(mut self) -> JobOutcome<()> {
        let waker = Waker::from(Arc::new(ThreadUnparker {
            thread: thread::current(),
        }));
        let mut cx = Context::from_waker(&waker);
        loop {
            match Pin::new(&mut self).poll(&mut cx) {
                Poll::Ready(outcome) => return outcome,
                Poll::Pending => thread::park(),
            }
        }
    }
}

impl Future for Join {
    type Output = JobOutcome<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(target) = this.target.as_ref() else {
            return Poll::Ready(Ok(()));
        };

        if this.registration.is_none() {
            if target.is_completed() {
                return Poll::Ready(Self::completed_verdict(target));
            }
            // 先存唤醒器再登记：登记落败于终态转移时回调被内联触发，
            // 其后的就绪检查避免丢唤醒。
            {
                let mut slot = this.shared.waker.lock().unwrap_or_else(|e| e.into_inner());
                *slot = Some(cx.waker().clone());
            }
            let shared = Arc::clone(&this.shared);
            let registration = target.invoke_on_completion(Box::new(move || {
                shared.done.store(true, Ordering::Release);
                let woken = {
                    let mut slot = shared.waker.lock().unwrap_or_else(|e| e.into_inner());
                    slot.take()
                };
                if let Some(waker) = woken {
                    waker.wake();
                }
            }));
            this.registration = Some(registration);
            if this.shared.done.load(Ordering::Acquire) {
                return Poll::Ready(Ok(()));
            }
            return Poll::Pending;
        }

        if this.shared.done.load(Ordering::Acquire) {
            return Poll::Ready(Ok(()));
        }
        {
            let mut slot = this.shared.waker.lock().unwrap_or_else(|e| e.into_inner());
            *slot = Some(cx.waker().clone());
        }
        // 存入新唤醒器与完成通知可能交错，复查一次补偿被取走的旧唤醒器。
        if this.shared.done.load(Ordering::Acquire) {
            return Poll::Ready(Ok(()));
        }
        Poll::Pending
    }
}

impl Drop for Join {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration.dispose();
        }
    }
}

struct ThreadUnparker {
    thread: Thread,
}

impl Wake for ThreadUnparker {
    fn wake(self: Arc<Self>) {
        self.thread.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.thread.unpark();
    }
}

/// `Settled` 在 [`Join`] 之上解析存储的终局结果。
///
/// # 契约说明（What）
/// - 等待语义与 [`Join`] 完全一致（含快路径的父失效裁决：该裁决错误会
///   原样透传为本 future 的失败）；
/// - 就绪值为**存储终态**的克隆：取消后补交结果的任务在这里读到取消
///   错误，而非生产方的原始结果。
pub struct Settled<T> {
    target: Arc<JobCore<T>>,
    join: Join,
}

impl<T: Send + Sync + 'static> Settled<T> {
    pub(crate) fn new(target: Arc<JobCore<T>>) -> Self {
        let join = target.join();
        Self { target, join }
    }

    /// 阻塞驱动版本，语义同 [`Join::wait`]。
    pub fn wait(mut self) -> JobOutcome<T>
    where
        T: Clone,
    {
        let waker = Waker::from(Arc::new(ThreadUnparker {
            thread: thread::current(),
        }));
        let mut cx = Context::from_waker(&waker);
        loop {
            match Pin::new(&mut self).poll(&mut cx) {
                Poll::Ready(outcome) => return outcome,
                Poll::Pending => thread::park(),
            }
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Future for Settled<T> {
    type Output = JobOutcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.join).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(fault)) => Poll::Ready(Err(fault)),
            Poll::Ready(Ok(())) => Poll::Ready(
                this.target
                    .outcome()
                    .unwrap_or_else(|| Err(Fault::illegal_terminal())),
            ),
        }
    }
}
