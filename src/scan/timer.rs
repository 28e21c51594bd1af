//! 调度器使用的定时器
//!
//! 每次布置定时器都会分配新的序号。取消或重新布置时旧序号失效，
//! 因此已经在队列里的过期触发会被忽略。

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    PeriodicScan,
    RestartSingleScan,
    RestartConnectivityScan,
    Watchdog,
}

impl TimerKind {
    pub const ALL: [TimerKind; 4] = [
        TimerKind::PeriodicScan,
        TimerKind::RestartSingleScan,
        TimerKind::RestartConnectivityScan,
        TimerKind::Watchdog,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub serial: u64,
}

/// 已布置定时器的序号表
#[derive(Debug, Default)]
pub struct TimerSerials {
    next: u64,
    armed: HashMap<TimerKind, u64>,
}

impl TimerSerials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, kind: TimerKind) -> u64 {
        self.next += 1;
        self.armed.insert(kind, self.next);
        self.next
    }

    /// 返回之前是否处于布置状态
    pub fn disarm(&mut self, kind: TimerKind) -> bool {
        self.armed.remove(&kind).is_some()
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    /// 序号匹配时消费该定时器并返回 true
    pub fn take_if_current(&mut self, fired: TimerFired) -> bool {
        match self.armed.get(&fired.kind) {
            Some(serial) if *serial == fired.serial => {
                self.armed.remove(&fired.kind);
                true
            }
            _ => false,
        }
    }
}

/// 基于 tokio 的定时器，触发后把 [`TimerFired`] 送回事件循环
pub struct TimerWheel {
    tx: mpsc::UnboundedSender<TimerFired>,
    tasks: HashMap<TimerKind, JoinHandle<()>>,
}

impl TimerWheel {
    pub fn new(tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            tx,
            tasks: HashMap::new(),
        }
    }

    pub fn arm(&mut self, kind: TimerKind, serial: u64, delay: Duration) {
        self.cancel(kind);
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // 接收端关闭说明服务已退出
            let _ = tx.send(TimerFired { kind, serial });
        });
        self.tasks.insert(kind, task);
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some(task) = self.tasks.remove(&kind) {
            task.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

impl Drop for TimerWheel {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
