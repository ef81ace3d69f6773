use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use strand_core::{JobCore, TaskContext};

/// 终态转移热路径：构造任务并立即恢复。
///
/// # 设计目的（Why）
/// - `resume_with` 的 CAS 循环与快照分发是整个内核的热路径；
///   基准用于跟踪状态格操作的分配与指针追逐开销回归。
///
/// # 契约说明（What）
/// - 无回调场景：测量纯转移成本，不含用户闭包执行时间。
fn bench_resume_hot_path(c: &mut Criterion) {
    c.bench_function("job_bind_and_resume", |b| {
        b.iter(|| {
            let job: Arc<JobCore<u64>> = JobCore::bind(TaskContext::new());
            job.resume_with(Ok(1)).expect("首次恢复必须成功");
            job
        });
    });
}

/// 回调登记路径：不可变表的头插与 CAS 安装。
fn bench_handler_registration(c: &mut Criterion) {
    c.bench_function("job_register_eight_handlers", |b| {
        b.iter(|| {
            let job: Arc<JobCore<u64>> = JobCore::bind(TaskContext::new());
            for _ in 0..8 {
                job.on_completed(|_outcome| {});
            }
            job.resume_with(Ok(1)).expect("首次恢复必须成功");
            job
        });
    });
}

/// 取消分发路径：快照遍历与父订阅释放。
fn bench_cancel_fanout(c: &mut Criterion) {
    c.bench_function("job_cancel_with_four_handlers", |b| {
        b.iter(|| {
            let job: Arc<JobCore<u64>> = JobCore::bind(TaskContext::new());
            for _ in 0..4 {
                job.invoke_on_cancel(Box::new(|| {}));
            }
            job.cancel();
            job
        });
    });
}

criterion_group!(
    lifecycle_benches,
    bench_resume_hot_path,
    bench_handler_registration,
    bench_cancel_fanout
);
criterion_main!(lifecycle_benches);
