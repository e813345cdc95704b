//! 分批调度器 - 编排层
//!
//! 把任务切成大小不超过并发上限的连续批次：
//! - 一批内的任务用 tokio::spawn 并发执行
//! - 等整批全部结束（成功、失败或 panic）才开始下一批
//! - 批次之间暂停 `pacing`，最后一批之后不暂停
//!
//! 任务失败只影响自己，不会中止运行，也不会重试。

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::FutureExt;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult, ConfigError};
use crate::models::{BatchResult, FailureDetail, Outcome, RunSummary};
use crate::utils::logging;

/// 分批调度器
#[derive(Debug, Clone, Copy)]
pub struct BatchScheduler {
    limit: usize,
    pacing: Duration,
}

impl BatchScheduler {
    pub fn new(limit: usize, pacing: Duration) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::invalid("concurrency_limit", "0", "a positive integer"));
        }
        Ok(Self { limit, pacing })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 运行所有任务
    ///
    /// # 参数
    /// - `items`: 任务输入，按此顺序分批
    /// - `job`: 处理单个任务，第二个参数是从 1 开始的序号
    ///
    /// # 返回
    /// 结果按 `items` 的顺序排列
    pub async fn run<T, F, Fut>(&self, items: Vec<T>, job: F) -> RunSummary
    where
        T: Display + Send + 'static,
        F: Fn(T, usize) -> Fut,
        Fut: Future<Output = AppResult<Outcome>> + Send + 'static,
    {
        let started = Instant::now();
        let total = items.len();

        if total == 0 {
            warn!("⚠️ 没有需要处理的任务");
            return RunSummary::default();
        }

        logging::log_items_loaded(total, self.limit);

        let total_batches = (total + self.limit - 1) / self.limit;
        let mut results = Vec::with_capacity(total);
        let mut items = items.into_iter();

        for batch_start in (0..total).step_by(self.limit) {
            let batch_end = (batch_start + self.limit).min(total);
            let batch_num = batch_start / self.limit + 1;

            logging::log_batch_start(batch_num, total_batches, batch_start + 1, batch_end, total);

            let spawned: Vec<_> = items
                .by_ref()
                .take(batch_end - batch_start)
                .enumerate()
                .map(|(offset, item)| {
                    let id = item.to_string();
                    let fut = job(item, batch_start + offset + 1);
                    let begun = Instant::now();
                    // panic 在任务内捕获，耗时照常记录
                    let handle = tokio::spawn(async move {
                        let outcome = AssertUnwindSafe(fut).catch_unwind().await;
                        (outcome, begun.elapsed())
                    });
                    (id, begun, handle)
                })
                .collect();

            let mut ids = Vec::with_capacity(spawned.len());
            let mut handles = Vec::with_capacity(spawned.len());
            for (id, begun, handle) in spawned {
                ids.push((id, begun));
                handles.push(handle);
            }
            let settled = join_all(handles).await;

            let mut batch_ok = 0;
            for ((id, begun), joined) in ids.into_iter().zip(settled) {
                let result = match joined {
                    Ok((Ok(Ok(outcome)), elapsed)) => BatchResult::finished(id, outcome, elapsed),
                    Ok((Ok(Err(e)), elapsed)) => {
                        error!("[{}] ❌ {}", id, e);
                        BatchResult::failed(id, elapsed, FailureDetail::from(&e))
                    }
                    Ok((Err(payload), elapsed)) => {
                        let e = AppError::task(format!("panic: {}", panic_message(&*payload)));
                        error!("[{}] ❌ {}", id, e);
                        BatchResult::failed(id, elapsed, FailureDetail::from(&e))
                    }
                    Err(join_error) => {
                        let e = AppError::task(join_error.to_string());
                        error!("[{}] ❌ 任务执行失败: {}", id, join_error);
                        BatchResult::failed(id, begun.elapsed(), FailureDetail::from(&e))
                    }
                };
                if result.is_success() {
                    batch_ok += 1;
                }
                results.push(result);
            }

            logging::log_batch_complete(batch_num, batch_ok, batch_end - batch_start);

            if batch_end < total && !self.pacing.is_zero() {
                info!("⏳ 等待 {}ms 后开始下一批", self.pacing.as_millis());
                tokio::time::sleep(self.pacing).await;
            }
        }

        RunSummary::from_results(results, started.elapsed())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// 记录同时运行的任务数峰值
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn leave(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn run_with_gauge(limit: usize, count: usize) -> (RunSummary, usize, Vec<usize>) {
        let gauge = Arc::new(Gauge::default());
        let order = Arc::new(Mutex::new(Vec::new()));
        let scheduler = BatchScheduler::new(limit, Duration::ZERO).unwrap();

        let summary = scheduler
            .run((1..=count).collect(), |item: usize, _| {
                let gauge = gauge.clone();
                let order = order.clone();
                async move {
                    gauge.enter();
                    order.lock().unwrap().push(item);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    gauge.leave();
                    Ok::<_, AppError>(Outcome::Done)
                }
            })
            .await;

        let peak = gauge.peak.load(Ordering::SeqCst);
        let order = order.lock().unwrap().clone();
        (summary, peak, order)
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_limit() {
        let (summary, peak, _) = run_with_gauge(3, 10).await;
        assert_eq!(summary.succeeded, 10);
        assert_eq!(peak, 3);
    }

    #[tokio::test]
    async fn limit_one_runs_sequentially_in_order() {
        let (summary, peak, order) = run_with_gauge(1, 4).await;
        assert_eq!(peak, 1);
        assert_eq!(order, vec![1, 2, 3, 4]);
        let ids: Vec<_> = summary.results.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn next_batch_waits_for_previous_batch() {
        let (_, _, order) = run_with_gauge(2, 5).await;
        // 每批内部顺序不定，批次之间有序
        let mut first: Vec<_> = order[0..2].to_vec();
        first.sort();
        let mut second: Vec<_> = order[2..4].to_vec();
        second.sort();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(second, vec![3, 4]);
        assert_eq!(order[4], 5);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_only_between_batches() {
        let scheduler = BatchScheduler::new(1, Duration::from_millis(50)).unwrap();
        let started = tokio::time::Instant::now();
        let summary = scheduler
            .run(vec!["a", "b", "c"], |_, _| async { Ok::<_, AppError>(Outcome::Done) })
            .await;
        let elapsed = started.elapsed();

        assert_eq!(summary.succeeded, 3);
        // 三批，两次暂停；最后一批之后再停一次就会到 150ms
        assert!(elapsed >= Duration::from_millis(100), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(150), "{:?}", elapsed);
    }

    #[tokio::test]
    async fn single_batch_never_pauses() {
        let scheduler = BatchScheduler::new(3, Duration::from_secs(30)).unwrap();
        let started = Instant::now();
        let summary = scheduler
            .run(vec!["a", "b", "c"], |_, _| async { Ok::<_, AppError>(Outcome::Done) })
            .await;

        assert_eq!(summary.succeeded, 3);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn panicked_task_reports_its_running_time() {
        let scheduler = BatchScheduler::new(2, Duration::ZERO).unwrap();
        let summary = scheduler
            .run(vec![1u32, 2], |n, _| async move {
                tokio::time::sleep(Duration::from_millis(40)).await;
                if n == 2 {
                    panic!("page {} exploded", n);
                }
                Ok::<_, AppError>(Outcome::Done)
            })
            .await;

        let failed: Vec<_> = summary.failures().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, "2");
        assert!(failed[0].elapsed >= Duration::from_millis(40));
        let detail = failed[0].error.as_ref().unwrap();
        assert_eq!(detail.code, "TaskFailed");
        assert!(detail.message.contains("page 2 exploded"));
    }

    #[tokio::test]
    async fn failures_and_panics_are_isolated() {
        let scheduler = BatchScheduler::new(2, Duration::ZERO).unwrap();
        let summary = scheduler
            .run(vec![1u32, 2, 3, 4], |n, _| async move {
                match n {
                    2 => Err(AppError::task("boom")),
                    3 => panic!("page 3 exploded"),
                    _ => Ok::<_, AppError>(Outcome::Done),
                }
            })
            .await;

        assert_eq!(summary.discovered, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 2);
        let failed: Vec<_> = summary.failures().map(|r| r.id.as_str()).collect();
        assert_eq!(failed, vec!["2", "3"]);
        assert!(summary.failures().all(|r| r.error.as_ref().unwrap().code == "TaskFailed"));
    }

    #[tokio::test]
    async fn empty_input_is_not_an_error() {
        let scheduler = BatchScheduler::new(3, Duration::from_secs(5)).unwrap();
        let summary = scheduler
            .run(Vec::<String>::new(), |_, _| async { Ok::<_, AppError>(Outcome::Done) })
            .await;
        assert_eq!(summary.discovered, 0);
        assert!(summary.is_success());
    }

    #[test]
    fn zero_limit_is_rejected() {
        tokio_test::assert_err!(BatchScheduler::new(0, Duration::ZERO));
        tokio_test::assert_ok!(BatchScheduler::new(1, Duration::ZERO));
    }

    #[test]
    fn skipped_outcomes_are_counted() {
        tokio_test::block_on(async {
            let scheduler = BatchScheduler::new(4, Duration::ZERO).unwrap();
            let summary = scheduler
                .run(vec!["x", "y"], |item, _| async move {
                    if item == "x" {
                        Ok::<_, AppError>(Outcome::Skipped)
                    } else {
                        Ok::<_, AppError>(Outcome::Done)
                    }
                })
                .await;
            assert_eq!(summary.skipped, 1);
            assert_eq!(summary.succeeded, 2);
        });
    }
}
