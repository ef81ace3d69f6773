#![cfg(any(loom, strand_loom))]
//! 生命周期 CAS 协议的 Loom 交错模型。
//!
//! # 教案级导览
//!
//! - **Why**：状态格协议的三条并发保证——转移只沿 DAG 前进、胜出转移的
//!   副作用恰好一次、登记与终态转移之间无丢失唤醒——依赖 CAS 线性化点的
//!   精确摆放；Loom 穷举调度交错验证这些保证在所有串行化下成立。
//! - **How**：与生产代码同构的最小影子状态机（生产格是 `arc-swap` 单元，
//!   Loom 无法插桩，故按引擎的原子序列在此重建协议本身），每个模型两到
//!   三个线程，各自执行一次真实调用路径对应的原子序列。
//! - **What**：任何回退转移、重复副作用或丢失的内联触发都会让断言失败。

use loom::{
    model,
    sync::{
        Arc,
        atomic::{AtomicU8, AtomicUsize, Ordering},
    },
    thread,
};

const INCOMPLETE: u8 = 0;
const CANCELLING: u8 = 1;
const COMPLETE: u8 = 2;

/// 与引擎同构的影子状态格：取消与恢复的 CAS 序列。
struct ShadowCell {
    state: AtomicU8,
    cancel_effects: AtomicUsize,
    completion_effects: AtomicUsize,
    stored_cancelled: AtomicUsize,
}

impl ShadowCell {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(INCOMPLETE),
            cancel_effects: AtomicUsize::new(0),
            completion_effects: AtomicUsize::new(0),
            stored_cancelled: AtomicUsize::new(0),
        }
    }

    /// `cancel()` 的原子序列：仅 `Incomplete → Cancelling` 产生副作用。
    fn cancel(&self) {
        if self
            .state
            .compare_exchange(INCOMPLETE, CANCELLING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.cancel_effects.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// `resume_with` 的原子序列：存活态一律推进到终态，取消流程中补交
    /// 存储取消错误。
    fn resume(&self) {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current == COMPLETE {
                return;
            }
            match self.state.compare_exchange(
                current,
                COMPLETE,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(previous) => {
                    if previous == CANCELLING {
                        self.stored_cancelled.store(1, Ordering::Release);
                    }
                    self.completion_effects.fetch_add(1, Ordering::AcqRel);
                    return;
                }
                Err(next) => current = next,
            }
        }
    }
}

/// 取消与恢复竞争：收敛终态，副作用各恰好一次，存储形态与胜负一致。
#[test]
fn cancel_and_resume_race_converges_without_duplicate_effects() {
    model(|| {
        let cell = Arc::new(ShadowCell::new());

        let canceller = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.cancel())
        };
        let producer = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.resume())
        };

        canceller.join().expect("取消线程不应 panic");
        producer.join().expect("生产线程不应 panic");

        assert_eq!(
            cell.state.load(Ordering::Acquire),
            COMPLETE,
            "竞争后必须收敛到终态"
        );
        assert_eq!(
            cell.completion_effects.load(Ordering::Acquire),
            1,
            "终态副作用恰好一次"
        );
        let cancel_effects = cell.cancel_effects.load(Ordering::Acquire);
        assert!(cancel_effects <= 1, "取消副作用至多一次");
        assert_eq!(
            cell.stored_cancelled.load(Ordering::Acquire),
            cancel_effects,
            "存储取消错误当且仅当取消转移先行胜出"
        );
    });
}

/// 登记与终态转移竞争：无论胜负，回调恰好触发一次（无丢失唤醒）。
///
/// 单原子同时承载“终态位”与“登记位”，重建真实引擎里状态与回调表共居
/// 一个 CAS 单元的要点：落败的登记方观察到终态后内联触发。
#[test]
fn registration_versus_terminal_transition_never_loses_the_callback() {
    const TERMINAL: usize = 0b01;
    const REGISTERED: usize = 0b10;

    model(|| {
        let packed = Arc::new(AtomicUsize::new(0));
        let fired = Arc::new(AtomicUsize::new(0));

        let registrar = {
            let packed = Arc::clone(&packed);
            let fired = Arc::clone(&fired);
            thread::spawn(move || {
                let mut current = packed.load(Ordering::Acquire);
                loop {
                    if current & TERMINAL != 0 {
                        // 迟到登记：内联触发。
                        fired.fetch_add(1, Ordering::AcqRel);
                        return;
                    }
                    match packed.compare_exchange(
                        current,
                        current | REGISTERED,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => return,
                        Err(next) => current = next,
                    }
                }
            })
        };

        let completer = {
            let packed = Arc::clone(&packed);
            let fired = Arc::clone(&fired);
            thread::spawn(move || {
                let mut current = packed.load(Ordering::Acquire);
                loop {
                    match packed.compare_exchange(
                        current,
                        current | TERMINAL,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(previous) => {
                            if previous & REGISTERED != 0 {
                                // 胜出转移携带快照：向已登记回调分发。
                                fired.fetch_add(1, Ordering::AcqRel);
                            }
                            return;
                        }
                        Err(next) => current = next,
                    }
                }
            })
        };

        registrar.join().expect("登记线程不应 panic");
        completer.join().expect("完成线程不应 panic");

        assert_eq!(
            fired.load(Ordering::Acquire),
            1,
            "登记返回即必达：两条路径合计恰好触发一次"
        );
    });
}

/// 双取消竞争：转移与副作用恰好一次。
#[test]
fn concurrent_cancels_fire_side_effects_once() {
    model(|| {
        let cell = Arc::new(ShadowCell::new());

        let first = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.cancel())
        };
        let second = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.cancel())
        };

        first.join().expect("取消线程不应 panic");
        second.join().expect("取消线程不应 panic");

        assert_eq!(
            cell.state.load(Ordering::Acquire),
            CANCELLING,
            "双取消收敛到取消流程"
        );
        assert_eq!(
            cell.cancel_effects.load(Ordering::Acquire),
            1,
            "取消副作用必须恰好一次"
        );
    });
}
