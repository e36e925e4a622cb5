//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了失效总线：按规范键登记订阅者，并在通知时扇出。

use crate::key::QueryKey;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, instrument};

/// 订阅者回调
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// 订阅句柄
///
/// 生命周期与消费者的挂载周期绑定，drop 时自动退订。
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    canonical: String,
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 订阅的规范键
    pub fn key(&self) -> &str {
        &self.canonical
    }

    /// 显式退订
    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("key", &self.canonical)
            .finish()
    }
}

/// 失效总线
///
/// 只做精确键匹配，不支持通配或前缀。同一个键的订阅者按登记顺序调用。
pub struct InvalidationBus<E> {
    /// 规范键 -> (订阅编号, 回调)
    subscribers: DashMap<String, Vec<(u64, Listener<E>)>>,
    next_id: AtomicU64,
}

impl<E> Default for InvalidationBus<E> {
    fn default() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<E: 'static> InvalidationBus<E> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 订阅键
    ///
    /// # 参数
    ///
    /// * `key` - 查询键
    /// * `listener` - 通知回调
    ///
    /// # 返回值
    ///
    /// 返回订阅句柄，drop 或调用 `unsubscribe` 即退订
    pub fn subscribe(self: &Arc<Self>, key: &QueryKey, listener: Listener<E>) -> Subscription {
        let canonical = key.canonical();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .entry(canonical.clone())
            .or_default()
            .push((id, listener));
        debug!("InvalidationBus: subscribed id={}, key={}", id, canonical);

        let bus: Weak<Self> = Arc::downgrade(self);
        let slot = canonical.clone();
        Subscription {
            id,
            canonical,
            unsubscribe: Some(Box::new(move || {
                if let Some(bus) = bus.upgrade() {
                    bus.unsubscribe(&slot, id);
                }
            })),
        }
    }

    /// 按编号退订
    ///
    /// # 返回值
    ///
    /// 找到并移除时返回 true
    pub fn unsubscribe(&self, canonical: &str, id: u64) -> bool {
        let removed = match self.subscribers.get_mut(canonical) {
            Some(mut list) => {
                let before = list.len();
                list.retain(|(sid, _)| *sid != id);
                before != list.len()
            }
            None => false,
        };
        self.subscribers.remove_if(canonical, |_, list| list.is_empty());
        if removed {
            debug!("InvalidationBus: unsubscribed id={}, key={}", id, canonical);
        }
        removed
    }

    /// 通知订阅者
    ///
    /// 先对订阅者列表做快照再逐个调用，回调中退订或重新订阅都是安全的。
    ///
    /// # 返回值
    ///
    /// 返回被调用的订阅者数量
    #[instrument(skip(self, event), level = "debug")]
    pub fn notify(&self, key: &QueryKey, event: &E) -> usize {
        let snapshot: Vec<Listener<E>> = match self.subscribers.get(&key.canonical()) {
            Some(list) => list.iter().map(|(_, l)| l.clone()).collect(),
            None => return 0,
        };
        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.subscribers
            .get(&key.canonical())
            .map(|list| list.len())
            .unwrap_or(0)
    }

    pub fn total_subscribers(&self) -> usize {
        self.subscribers.iter().map(|r| r.value().len()).sum()
    }

    /// 移除所有订阅者
    pub fn clear(&self) {
        self.subscribers.clear();
    }
}
