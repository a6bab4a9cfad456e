// ==========================================
// 参数化数据导入 - 数据集互斥
// ==========================================
// 职责: 同一数据集（scope）同一时刻只允许一次导入运行
// 说明: 跨进程的锁由宿主系统提供；这里给出进程内实现
// 生命周期: 读取已有元数据之前获取，全部写入提交后释放
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// 数据集互斥 Trait
pub trait DatasetLock: Send + Sync {
    /// 获取 scope 的独占权（阻塞直至成功或超时）
    fn acquire(&self, scope: &str) -> ImportResult<()>;

    /// 释放 scope 的独占权
    fn release(&self, scope: &str);
}

// ==========================================
// InProcessDatasetLock
// ==========================================
#[derive(Debug, Default)]
pub struct InProcessDatasetLock {
    held: Mutex<HashSet<String>>,
    released: Condvar,
    /// None 表示无限等待
    timeout: Option<Duration>,
}

impl InProcessDatasetLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    pub fn is_held(&self, scope: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(scope))
            .unwrap_or(false)
    }
}

impl DatasetLock for InProcessDatasetLock {
    fn acquire(&self, scope: &str) -> ImportResult<()> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut held = self
            .held
            .lock()
            .map_err(|e| ImportError::DatasetLockError(e.to_string()))?;

        while held.contains(scope) {
            match deadline {
                None => {
                    held = self
                        .released
                        .wait(held)
                        .map_err(|e| ImportError::DatasetLockError(e.to_string()))?;
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ImportError::DatasetLockError(format!(
                            "数据集 {} 正在被其他导入占用",
                            scope
                        )));
                    }
                    let (guard, _) = self
                        .released
                        .wait_timeout(held, deadline - now)
                        .map_err(|e| ImportError::DatasetLockError(e.to_string()))?;
                    held = guard;
                }
            }
        }

        held.insert(scope.to_string());
        debug!(scope = %scope, "获取数据集锁");
        Ok(())
    }

    fn release(&self, scope: &str) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(scope);
        }
        self.released.notify_all();
        debug!(scope = %scope, "释放数据集锁");
    }
}

// ==========================================
// DatasetLockGuard - 作用域结束自动释放
// ==========================================
pub struct DatasetLockGuard {
    lock: Arc<dyn DatasetLock>,
    scope: String,
}

impl DatasetLockGuard {
    pub fn acquire(lock: Arc<dyn DatasetLock>, scope: &str) -> ImportResult<Self> {
        lock.acquire(scope)?;
        Ok(Self {
            lock,
            scope: scope.to_string(),
        })
    }
}

impl Drop for DatasetLockGuard {
    fn drop(&mut self) {
        self.lock.release(&self.scope);
    }
}
