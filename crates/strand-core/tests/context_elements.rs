//! 上下文元素集成套件：父发现、名字渲染与派发器注入。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use strand_core::test_stubs::InlineDispatcher;
use strand_core::{Dispatch, DispatcherRef, JobCore, TaskContext, TaskName};

/// 任务把自身注入上下文：子任务经 `context().job()` 发现父级。
#[test]
fn child_discovers_parent_through_context() {
    let parent: Arc<JobCore<()>> = JobCore::bind(TaskContext::new());
    let discovered = parent
        .context()
        .job()
        .expect("任务上下文必须携带自身引用");
    assert!(discovered.is_active(), "发现的引用应指向存活的父任务");

    parent.cancel();
    assert!(!discovered.is_active(), "引用与任务本体共享同一状态");
}

/// 名字元素贯穿 `Display`：`名字#阶段`。
#[test]
fn task_name_flows_into_display() {
    let job: Arc<JobCore<i32>> =
        JobCore::bind(TaskContext::new().with(TaskName::new("uplink")));
    assert_eq!(format!("{job}"), "uplink#incomplete");
    job.cancel();
    assert_eq!(format!("{job}"), "uplink#cancelling");
    job.resume_with(Ok(0)).expect("取消流程中的任务仍可被恢复");
    assert_eq!(format!("{job}"), "uplink#complete");
}

/// 子任务继承上下文元素：名字与派发器对孙代可见，父键被逐层遮蔽。
#[test]
fn derived_context_inherits_elements_and_shadows_job_key() {
    let dispatcher: Arc<dyn Dispatch> = Arc::new(InlineDispatcher);
    let base = TaskContext::new()
        .with(TaskName::new("pipeline"))
        .with(DispatcherRef::new(Arc::clone(&dispatcher)));

    let parent: Arc<JobCore<()>> = JobCore::bind(base);
    let child: Arc<JobCore<()>> = JobCore::bind(parent.context());
    let child_context = child.context();

    assert_eq!(
        child_context
            .name()
            .expect("名字元素应沿上下文继承")
            .as_str(),
        "pipeline"
    );
    assert!(
        child_context.contains::<DispatcherRef>(),
        "派发器元素应沿上下文继承"
    );

    // 父键被子任务自身遮蔽：孙代发现的是 child 而非 parent。
    let seen = child_context.job().expect("子上下文必须携带任务引用");
    child.cancel();
    assert!(!seen.is_active(), "发现的引用必须是子任务本身");
    assert!(parent.is_active(), "父任务不应被子任务遮蔽条目波及");
}

/// 派发器契约桩：投递的闭包在调用线程立即执行。
#[test]
fn inline_dispatcher_runs_block_on_caller_thread() {
    let dispatcher: Arc<dyn Dispatch> = Arc::new(InlineDispatcher);
    let context = TaskContext::new().with(DispatcherRef::new(Arc::clone(&dispatcher)));

    let hits = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&hits);
    let resolved = context
        .get::<DispatcherRef>()
        .expect("上下文必须能检索到派发器元素")
        .dispatcher();
    resolved.dispatch(Box::new(move || {
        observed.fetch_add(1, Ordering::AcqRel);
    }));

    assert_eq!(hits.load(Ordering::Acquire), 1, "内联派发器应立即执行闭包");
}
