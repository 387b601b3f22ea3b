// ==========================================
// 供应商 WIP 跟踪系统 - 定时任务调度
// ==========================================
// 规则:
// - 每个任务同一时刻最多一个执行（JobGate 单飞）
// - 上一轮未结束时到点的触发直接跳过并记录
// - 收到停止信号后不再触发新一轮，等待进行中的一轮结束
// ==========================================

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

// ==========================================
// JobGate - 单飞守卫
// ==========================================
#[derive(Clone, Default)]
pub struct JobGate {
    running: Arc<AtomicBool>,
}

/// 持有期间任务视为运行中，Drop 时释放
pub struct JobGuard {
    running: Arc<AtomicBool>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl JobGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<JobGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| JobGuard {
                running: self.running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

// ==========================================
// Scheduler - 周期触发
// ==========================================
pub struct Scheduler {
    name: String,
    interval: Duration,
    gate: JobGate,
}

impl Scheduler {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            gate: JobGate::new(),
        }
    }

    /// 运行直到停止信号；返回实际执行的轮数
    pub async fn run<F, Fut>(self, job: F, mut shutdown: watch::Receiver<bool>) -> usize
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<JoinHandle<()>> = None;
        let mut runs = 0usize;

        info!(job = %self.name, interval_secs = self.interval.as_secs(), "调度器启动");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    match self.gate.try_acquire() {
                        Some(guard) => {
                            runs += 1;
                            let fut = job();
                            in_flight = Some(tokio::spawn(async move {
                                let _guard = guard;
                                fut.await;
                            }));
                        }
                        None => warn!(job = %self.name, "上一轮尚未结束，跳过本次触发"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Some(handle) = in_flight {
            info!(job = %self.name, "等待进行中的任务结束");
            if let Err(e) = handle.await {
                warn!(job = %self.name, error = %e, "任务异常结束");
            }
        }
        info!(job = %self.name, runs, "调度器已停止");
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_gate_is_single_flight() {
        let gate = JobGate::new();
        let guard = gate.try_acquire();
        assert!(guard.is_some());
        assert!(gate.is_running());
        assert!(gate.try_acquire().is_none());

        drop(guard);
        assert!(!gate.is_running());
        assert!(gate.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_overlapping_triggers_are_skipped() {
        let (tx, rx) = watch::channel(false);
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        let scheduler = Scheduler::new("slow", Duration::from_millis(10));
        let s = started.clone();
        let f = finished.clone();
        let handle = tokio::spawn(scheduler.run(
            move || {
                let s = s.clone();
                let f = f.clone();
                async move {
                    s.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    f.fetch_add(1, Ordering::SeqCst);
                }
            },
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(80)).await;
        tx.send(true).unwrap();
        let runs = handle.await.unwrap();

        // 第一轮执行期间的触发全部被跳过；停止时等待进行中的一轮完成
        assert_eq!(runs, 1);
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
