//! 结构化日志契约：生命周期转移与未处理失败的事件可见性。

use std::sync::Arc;

use tracing_test::traced_test;

use strand_core::{Fault, JobCore, TaskContext, TaskName};

/// 取消与终态转移各产生一条 debug 事件。
#[traced_test]
#[test]
fn lifecycle_transitions_emit_debug_events() {
    let job: Arc<JobCore<i32>> =
        JobCore::bind(TaskContext::new().with(TaskName::new("emitter")));
    job.cancel();
    job.resume_with(Ok(1)).expect("取消流程中的任务仍可被恢复");

    assert!(
        logs_contain("任务进入取消流程"),
        "取消转移必须产生 debug 事件"
    );
    assert!(logs_contain("任务进入终态"), "终态转移必须产生 debug 事件");
}

/// 传播链无人消费时以 error 事件暴露失败。
#[traced_test]
#[test]
fn unhandled_failure_surfaces_as_error_event() {
    let job: Arc<JobCore<i32>> = JobCore::bind(TaskContext::new());
    job.resume_with(Err(Fault::failed("boom")))
        .expect("失败结果是合法的首次恢复");

    assert!(
        logs_contain("任务失败未被任何层级消费"),
        "未处理失败必须以 error 事件暴露"
    );
}

/// 被消费的失败不触发未处理告警。
#[traced_test]
#[test]
fn consumed_failure_stays_quiet() {
    use strand_core::test_stubs::RecordingHandler;
    use strand_core::HookPolicy;

    let recorder = RecordingHandler::new();
    let context = TaskContext::new().with(RecordingHandler::element(&recorder));
    let job: Arc<JobCore<i32>> = JobCore::bind_with_policy(context, HookPolicy);
    job.resume_with(Err(Fault::failed("handled")))
        .expect("失败结果是合法的首次恢复");

    assert_eq!(recorder.faults().len(), 1, "失败应交付到处理器");
    assert!(
        !logs_contain("任务失败未被任何层级消费"),
        "被消费的失败不得再以未处理事件暴露"
    );
}
