use crate::api::InvoiceGateway;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{JobHandle, JobStats, JobStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 一次 watch 的终止结果
#[derive(Debug)]
pub enum JobOutcome {
    /// 服务端处理完成
    Finished(JobStats),
    /// 服务端处理失败，附错误信息
    Failed(String),
    /// 某次轮询请求本身失败 (网络/HTTP/解析)，不重试
    PollFailed(AppError),
    /// 达到最大轮询次数或截止时间
    TimedOut { attempts: u32 },
    Cancelled,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Finished(_))
    }
}

/// 后台任务轮询器
///
/// 拿到句柄后立即查询一次，之后每隔 `interval` 查询，直到 finished / failed。
/// 下一次查询只在上一次响应处理完之后才安排，同一任务不会有并发请求。
#[derive(Clone)]
pub struct JobPoller {
    gateway: Arc<dyn InvoiceGateway>,
    interval: Duration,
    max_attempts: Option<u32>,
    deadline: Option<Duration>,
}

impl JobPoller {
    pub fn new(gateway: Arc<dyn InvoiceGateway>, interval: Duration) -> Self {
        Self {
            gateway,
            interval,
            max_attempts: None,
            deadline: None,
        }
    }

    pub fn from_config(gateway: Arc<dyn InvoiceGateway>, config: &AppConfig) -> Self {
        Self::new(gateway, config.poll_interval())
            .with_max_attempts(config.poll.max_attempts)
            .with_deadline(config.poll_deadline())
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts.filter(|n| *n > 0);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// 轮询任务直到终止
    ///
    /// 每次非终止状态都会回调 `on_update`，即使状态未变化。
    pub async fn watch<F>(
        &self,
        handle: &JobHandle,
        cancel: &CancellationToken,
        mut on_update: F,
    ) -> JobOutcome
    where
        F: FnMut(&JobStatus) + Send,
    {
        let started = Instant::now();
        let expires = self.deadline.map(|limit| started + limit);
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                info!("Job {} watch cancelled after {} polls", handle.job_id, attempts);
                return JobOutcome::Cancelled;
            }

            attempts += 1;
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Job {} watch cancelled during poll {}", handle.job_id, attempts);
                    return JobOutcome::Cancelled;
                }
                polled = self.gateway.job_status(&handle.job_id) => polled,
                _ = wait_until(expires) => {
                    warn!("Job {} poll {} outstanding at deadline, giving up", handle.job_id, attempts);
                    return JobOutcome::TimedOut { attempts };
                }
            };

            let report = match polled {
                Ok(report) => report,
                Err(e) => {
                    warn!("Job {} status poll {} failed: {}", handle.job_id, attempts, e);
                    return JobOutcome::PollFailed(e);
                }
            };
            debug!("Job {} poll {}: {}", handle.job_id, attempts, report.status);

            match report.status {
                JobStatus::Finished => {
                    let stats = report.stats.unwrap_or_default();
                    info!("Job {} ({}) finished: {:?}", handle.job_id, handle.file_name, stats);
                    return JobOutcome::Finished(stats);
                }
                JobStatus::Failed => {
                    let message = report.error.unwrap_or_else(|| "unknown error".to_string());
                    warn!("Job {} ({}) failed: {}", handle.job_id, handle.file_name, message);
                    return JobOutcome::Failed(message);
                }
                ref status => on_update(status),
            }

            if self.max_attempts.is_some_and(|max| attempts >= max)
                || self.deadline.is_some_and(|limit| started.elapsed() >= limit)
            {
                warn!("Job {} still running after {} polls, giving up", handle.job_id, attempts);
                return JobOutcome::TimedOut { attempts };
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Job {} watch cancelled after {} polls", handle.job_id, attempts);
                    return JobOutcome::Cancelled;
                }
                _ = wait_until(expires) => {
                    warn!("Job {} still running at deadline after {} polls, giving up", handle.job_id, attempts);
                    return JobOutcome::TimedOut { attempts };
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

/// 没有截止时间时永不就绪
async fn wait_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        InvoiceUpdate, JobId, ListResponse, RecordId, ServerAck, StatusReport,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 按脚本依次返回状态的假网关
    struct ScriptedStatus {
        script: Mutex<VecDeque<Result<StatusReport, AppError>>>,
        polls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        latency: Duration,
        stalled: bool,
    }

    impl ScriptedStatus {
        fn new(script: Vec<Result<StatusReport, AppError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                polls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                latency: Duration::from_millis(150),
                stalled: false,
            })
        }

        /// 请求发出后永不返回
        fn stalled() -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(VecDeque::new()),
                polls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                latency: Duration::from_millis(150),
                stalled: true,
            })
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    fn report(status: &str) -> Result<StatusReport, AppError> {
        Ok(serde_json::from_value(serde_json::json!({ "status": status })).unwrap())
    }

    #[async_trait]
    impl InvoiceGateway for ScriptedStatus {
        async fn list_invoices(&self, _search: &str) -> Result<ListResponse, AppError> {
            unreachable!("poller never lists")
        }
        async fn submit_upload(&self, _f: &str, _b: Vec<u8>) -> Result<JobHandle, AppError> {
            unreachable!("poller never submits")
        }
        async fn job_status(&self, _job_id: &JobId) -> Result<StatusReport, AppError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if self.stalled {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(self.latency).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| report("processing"))
        }
        async fn update_invoice(&self, _id: &RecordId, _f: &InvoiceUpdate) -> Result<ServerAck, AppError> {
            unreachable!()
        }
        async fn delete_invoice(&self, _id: &RecordId) -> Result<ServerAck, AppError> {
            unreachable!()
        }
        async fn export_zip(&self, _ids: &[RecordId]) -> Result<Vec<u8>, AppError> {
            unreachable!()
        }
        async fn clear_all(&self) -> Result<ServerAck, AppError> {
            unreachable!()
        }
    }

    fn handle() -> JobHandle {
        JobHandle {
            job_id: JobId::new("42"),
            file_name: "batch.zip".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn queued_processing_finished_sequence() {
        let finished: Result<StatusReport, AppError> = Ok(serde_json::from_value(serde_json::json!({
            "status": "finished",
            "stats": {"pdf_found": 4, "processed": 4, "inserted": 3, "duplicates": 1}
        }))
        .unwrap());
        let gateway = ScriptedStatus::new(vec![
            report("queued"),
            report("processing"),
            report("processing"),
            finished,
        ]);
        let poller = JobPoller::new(gateway.clone(), Duration::from_millis(2000));

        let mut updates = Vec::new();
        let start = Instant::now();
        let outcome = poller
            .watch(&handle(), &CancellationToken::new(), |s| updates.push(s.clone()))
            .await;

        assert_eq!(
            updates,
            vec![JobStatus::Queued, JobStatus::Processing, JobStatus::Processing]
        );
        match outcome {
            JobOutcome::Finished(stats) => {
                assert_eq!(stats.found, 4);
                assert_eq!(stats.inserted, 3);
                assert_eq!(stats.duplicates, 1);
            }
            other => panic!("expected Finished, got {:?}", other),
        }
        assert_eq!(gateway.polls(), 4);
        assert_eq!(gateway.max_in_flight.load(Ordering::SeqCst), 1);
        // 首次立即查询，之后三次间隔 + 四次请求耗时
        assert_eq!(start.elapsed(), Duration::from_millis(3 * 2000 + 4 * 150));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_status_ends_watch_without_further_polls() {
        let failed: Result<StatusReport, AppError> = Ok(serde_json::from_value(serde_json::json!({
            "status": "failed", "error": "zip is corrupt"
        }))
        .unwrap());
        let gateway = ScriptedStatus::new(vec![report("processing"), failed, report("finished")]);
        let poller = JobPoller::new(gateway.clone(), Duration::from_millis(2000));

        let mut updates = 0;
        let outcome = poller
            .watch(&handle(), &CancellationToken::new(), |_| updates += 1)
            .await;

        assert!(matches!(outcome, JobOutcome::Failed(ref m) if m == "zip is corrupt"));
        assert_eq!(updates, 1);
        assert_eq!(gateway.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_keeps_polling() {
        let gateway = ScriptedStatus::new(vec![
            report("unpacking"),
            report("not_a_real_state"),
            report("finished"),
        ]);
        let poller = JobPoller::new(gateway.clone(), Duration::from_millis(2000));

        let mut updates = Vec::new();
        let outcome = poller
            .watch(&handle(), &CancellationToken::new(), |s| updates.push(s.to_string()))
            .await;

        assert!(outcome.is_success());
        assert_eq!(updates, vec!["unpacking", "not_a_real_state"]);
        assert_eq!(gateway.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_without_stats_yields_zero_counts() {
        let gateway = ScriptedStatus::new(vec![report("finished")]);
        let poller = JobPoller::new(gateway, Duration::from_millis(2000));

        let outcome = poller.watch(&handle(), &CancellationToken::new(), |_| {}).await;
        assert!(matches!(outcome, JobOutcome::Finished(ref s) if *s == JobStats::default()));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_is_terminal() {
        let gateway = ScriptedStatus::new(vec![
            report("queued"),
            Err(AppError::Unreachable("connection reset".into())),
            report("finished"),
        ]);
        let poller = JobPoller::new(gateway.clone(), Duration::from_millis(2000));

        let outcome = poller.watch(&handle(), &CancellationToken::new(), |_| {}).await;
        match outcome {
            JobOutcome::PollFailed(e) => assert!(e.to_string().contains("connection reset")),
            other => panic!("expected PollFailed, got {:?}", other),
        }
        assert_eq!(gateway.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn max_attempts_produces_timed_out() {
        let gateway = ScriptedStatus::new(vec![]);
        let poller = JobPoller::new(gateway.clone(), Duration::from_millis(2000))
            .with_max_attempts(Some(3));

        let mut updates = 0;
        let outcome = poller
            .watch(&handle(), &CancellationToken::new(), |_| updates += 1)
            .await;

        assert!(matches!(outcome, JobOutcome::TimedOut { attempts: 3 }));
        assert_eq!(updates, 3);
        assert_eq!(gateway.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_produces_timed_out() {
        let gateway = ScriptedStatus::new(vec![]);
        let poller = JobPoller::new(gateway.clone(), Duration::from_millis(2000))
            .with_deadline(Some(Duration::from_secs(5)));

        let start = Instant::now();
        let outcome = poller.watch(&handle(), &CancellationToken::new(), |_| {}).await;

        // 0.15s, 2.3s, 4.45s 三次返回；随后的等待在 5s 处被截止时间打断
        assert!(matches!(outcome, JobOutcome::TimedOut { attempts: 3 }));
        assert_eq!(gateway.polls(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_ends_watch_with_stalled_request() {
        let gateway = ScriptedStatus::stalled();
        let poller = JobPoller::new(gateway.clone(), Duration::from_millis(2000))
            .with_deadline(Some(Duration::from_secs(5)));

        let start = Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_secs(3600),
            poller.watch(&handle(), &CancellationToken::new(), |_| {}),
        )
        .await
        .expect("deadline should end the watch");

        assert!(matches!(outcome, JobOutcome::TimedOut { attempts: 1 }));
        assert_eq!(gateway.polls(), 1);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_between_polls() {
        let gateway = ScriptedStatus::new(vec![]);
        let poller = JobPoller::new(gateway.clone(), Duration::from_millis(2000));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3000)).await;
            trigger.cancel();
        });

        let outcome = poller.watch(&handle(), &cancel, |_| {}).await;
        assert!(matches!(outcome, JobOutcome::Cancelled));
        assert_eq!(gateway.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_outstanding_poll() {
        let gateway = ScriptedStatus::new(vec![]);
        let poller = JobPoller::new(gateway.clone(), Duration::from_millis(2000));
        let cancel = CancellationToken::new();

        // 第二次请求在 2150ms 发出，150ms 后才返回
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2200)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let mut updates = 0;
        let outcome = poller.watch(&handle(), &cancel, |_| updates += 1).await;

        assert!(matches!(outcome, JobOutcome::Cancelled));
        assert_eq!(start.elapsed(), Duration::from_millis(2200));
        assert_eq!(gateway.polls(), 2);
        assert_eq!(updates, 1);

        // 之后不再发起请求
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(gateway.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_never_polls() {
        let gateway = ScriptedStatus::new(vec![report("finished")]);
        let poller = JobPoller::new(gateway.clone(), Duration::from_millis(2000));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = poller.watch(&handle(), &cancel, |_| {}).await;
        assert!(matches!(outcome, JobOutcome::Cancelled));
        assert_eq!(gateway.polls(), 0);
    }
}
