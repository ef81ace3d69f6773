//! 回调登记表：不可变单链表与幂等注销句柄。
//!
//! # 教案级导览
//!
//! - **Why**：终态通知必须遍历“与转移原子一致”的快照；若回调表是可变集合，
//!   并发 `remove` 就可能破坏正在遍历的结构。不可变链表让快照成为指针拷贝，
//!   移除只是构造共享尾部的新表。
//! - **How**：`cons` O(1) 头插（遍历顺序因此为后进先出）；`without` O(n) 重建
//!   首个命中之前的前缀并共享其后的尾部；按种类分发是对节点载荷的模式匹配。
//! - **What**：节点身份采用全局单调分配的 [`HandlerId`]，而非地址比较——
//!   节点释放后地址可能被分配器复用，按地址匹配存在 ABA 误删风险。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::fault::JobOutcome;

use super::{OnCancel, OnComplete};

/// 回调登记的稳定身份，进程内单调分配、永不复用。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    pub(crate) fn allocate() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// 携带结果的完成回调。
pub(crate) type CompletionFn<T> = Box<dyn Fn(&JobOutcome<T>) + Send + Sync>;

/// 回调节点载荷：完成种类与取消种类的封闭集合。
pub(crate) enum HandlerKind<T> {
    Completion(CompletionFn<T>),
    Cancel(OnCancel),
}

/// 单个登记节点：身份 + 载荷。
pub(crate) struct HandlerNode<T> {
    pub(crate) id: HandlerId,
    kind: HandlerKind<T>,
}

impl<T> HandlerNode<T> {
    pub(crate) fn completion(callback: CompletionFn<T>) -> Arc<Self> {
        Arc::new(Self {
            id: HandlerId::allocate(),
            kind: HandlerKind::Completion(callback),
        })
    }

    pub(crate) fn completion_unit(callback: OnComplete) -> Arc<Self> {
        Self::completion(Box::new(move |_outcome| callback()))
    }

    pub(crate) fn cancel(callback: OnCancel) -> Arc<Self> {
        Arc::new(Self {
            id: HandlerId::allocate(),
            kind: HandlerKind::Cancel(callback),
        })
    }

    /// 若为取消种类则触发回调，否则跳过。
    pub(crate) fn fire_cancel(&self) {
        if let HandlerKind::Cancel(callback) = &self.kind {
            callback();
        }
    }

    /// 若为完成种类则以给定结果触发回调，否则跳过。
    pub(crate) fn fire_completion(&self, outcome: &JobOutcome<T>) {
        if let HandlerKind::Completion(callback) = &self.kind {
            callback(outcome);
        }
    }
}

/// 不可变回调表：`Nil | Cons(节点, 尾表)`，尾表以 `Arc` 共享。
pub(crate) struct HandlerList<T> {
    head: Option<Arc<ListCell<T>>>,
}

struct ListCell<T> {
    node: Arc<HandlerNode<T>>,
    rest: HandlerList<T>,
}

impl<T> Clone for HandlerList<T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
        }
    }
}

impl<T> HandlerList<T> {
    pub(crate) fn empty() -> Self {
        Self { head: None }
    }

    /// 头插一个节点，O(1)。
    pub(crate) fn cons(&self, node: Arc<HandlerNode<T>>) -> Self {
        Self {
            head: Some(Arc::new(ListCell {
                node,
                rest: self.clone(),
            })),
        }
    }

    /// 移除首个身份命中的节点并返回新表；未命中返回 `None`。
    ///
    /// # 逻辑解析（How）
    /// - 命中之前的前缀节点被逐个重挂到命中点之后的共享尾部上，
    ///   原表及其所有既有快照保持原样。
    pub(crate) fn without(&self, id: HandlerId) -> Option<Self> {
        let mut prefix: Vec<Arc<HandlerNode<T>>> = Vec::new();
        let mut cursor = self.head.as_ref();
        let mut remainder: Option<Self> = None;
        while let Some(cell) = cursor {
            if cell.node.id == id {
                remainder = Some(cell.rest.clone());
                break;
            }
            prefix.push(Arc::clone(&cell.node));
            cursor = cell.rest.head.as_ref();
        }
        let mut rebuilt = remainder?;
        for node in prefix.into_iter().rev() {
            rebuilt = rebuilt.cons(node);
        }
        Some(rebuilt)
    }

    /// 自头向尾遍历全部节点。
    pub(crate) fn for_each(&self, mut visit: impl FnMut(&HandlerNode<T>)) {
        let mut cursor = self.head.as_ref();
        while let Some(cell) = cursor {
            visit(&cell.node);
            cursor = cell.rest.head.as_ref();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        let mut count = 0;
        self.for_each(|_| count += 1);
        count
    }
}

/// 宿主侧注销口：`Registration::dispose` 经由该接口回到所属任务。
pub(crate) trait HandlerHost: Send + Sync {
    /// 从当前回调表移除指定身份的登记；终态任务上为无副作用操作。
    fn discard(&self, id: HandlerId);
}

/// `Registration` 是登记回调后获得的注销句柄。
///
/// # 契约说明（What）
/// - `dispose` 幂等且允许任意线程调用；对已终态的任务调用为静默无操作；
/// - 句柄仅弱引用所属任务：它不会延长任务生命周期，任务释放后 `dispose`
///   自动退化为无操作。
///
/// # 设计取舍与风险（Trade-offs）
/// - “迟到登记”返回的空句柄（[`Registration::noop`]）不携带身份，
///   `dispose` 与 `remove` 对其天然无效，调用方无需区分两种来源。
#[derive(Clone)]
pub struct Registration {
    slot: Option<RegistrationSlot>,
}

#[derive(Clone)]
struct RegistrationSlot {
    host: Weak<dyn HandlerHost>,
    id: HandlerId,
}

impl Registration {
    pub(crate) fn bound(host: Weak<dyn HandlerHost>, id: HandlerId) -> Self {
        Self {
            slot: Some(RegistrationSlot { host, id }),
        }
    }

    /// 构造不指向任何登记的空句柄。
    pub fn noop() -> Self {
        Self { slot: None }
    }

    /// 注销先前的回调登记。幂等；重复调用与对终态任务的调用均安全。
    pub fn dispose(&self) {
        if let Some(slot) = &self.slot {
            if let Some(host) = slot.host.upgrade() {
                host.discard(slot.id);
            }
        }
    }

    /// 读取登记身份；空句柄返回 `None`。
    pub fn id(&self) -> Option<HandlerId> {
        self.slot.as_ref().map(|slot| slot.id)
    }

    /// 是否为空句柄。
    pub fn is_noop(&self) -> bool {
        self.slot.is_none()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id())
            .finish()
    }
}
