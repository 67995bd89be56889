//! Worker pool and job queues
//!
//! A [`WorkerPool`] owns a fixed set of worker tasks that wait on a shared
//! handoff channel. A [`JobQueue`] borrows the whole pool for one batch:
//! `submit` hands the queue to every worker, streams jobs to them, closes
//! the job channel, waits for every worker to let go of the queue and only
//! then closes the result stream.
//!
//! Both the handoff and each job dispatch are rendezvous: the sender waits
//! until a worker has taken the item. Claiming the pool is serialized, so
//! queues submitted to the same pool at the same time run one after the
//! other and never share workers.

use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use super::{CancelToken, Executor, ExecutorError};
use crate::harness::{HarnessIncludes, IncludeError};
use crate::models::{Job, RunType, TestResult};

/// Fatal failure while running a job
#[derive(Error, Debug)]
pub enum RunError {
    #[error("can't assemble {path} ({run_type}): {source}")]
    Include {
        path: String,
        run_type: RunType,
        #[source]
        source: IncludeError,
    },

    #[error("can't run {path} ({run_type}): {source}")]
    Executor {
        path: String,
        run_type: RunType,
        #[source]
        source: ExecutorError,
    },
}

impl RunError {
    /// Path of the test that triggered the failure
    pub fn path(&self) -> &str {
        match self {
            RunError::Include { path, .. } | RunError::Executor { path, .. } => path,
        }
    }
}

/// Job queue errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("job queue was already submitted")]
    AlreadySubmitted,

    #[error("worker pool has shut down")]
    PoolClosed,
}

/// Item delivered on a result stream
pub type RunOutcome = Result<TestResult, RunError>;

/// Available parallelism minus one, at least one
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

/// Shared by every worker of a pool
struct RunContext {
    executor: Arc<dyn Executor>,
    includes: Arc<HarnessIncludes>,
}

/// A job on its way to a worker. `taken` fires once a worker commits to
/// running it.
struct Dispatch {
    job: Job,
    taken: oneshot::Sender<()>,
}

/// What a worker is handed when a queue claims it
struct QueueBinding {
    jobs: Arc<Mutex<mpsc::Receiver<Dispatch>>>,
    results: mpsc::UnboundedSender<RunOutcome>,
    cancel: CancelToken,
    accepted: oneshot::Sender<()>,
    done: mpsc::UnboundedSender<()>,
}

/// A fixed set of workers fed through a handoff channel
#[derive(Clone)]
pub struct WorkerPool {
    handoff: mpsc::Sender<QueueBinding>,
    // Held by a queue while it claims workers
    claim: Arc<Mutex<()>>,
    worker_count: usize,
}

impl WorkerPool {
    /// Pool sized by [`default_worker_count`]. Must be called inside a
    /// tokio runtime.
    pub fn new(executor: Arc<dyn Executor>, includes: Arc<HarnessIncludes>) -> Self {
        Self::with_workers(default_worker_count(), executor, includes)
    }

    pub fn with_workers(
        worker_count: usize,
        executor: Arc<dyn Executor>,
        includes: Arc<HarnessIncludes>,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let (handoff, handoff_rx) = mpsc::channel(1);
        let handoff_rx = Arc::new(Mutex::new(handoff_rx));
        let context = Arc::new(RunContext { executor, includes });

        for id in 0..worker_count {
            tokio::spawn(worker_loop(id, Arc::clone(&handoff_rx), Arc::clone(&context)));
        }

        info!("Started worker pool with {} workers", worker_count);
        Self {
            handoff,
            claim: Arc::new(Mutex::new(())),
            worker_count,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .finish()
    }
}

/// Idle: wait for a queue. Bound: drain it until its job channel closes.
/// Exits when every pool handle is gone.
async fn worker_loop(
    id: usize,
    handoff: Arc<Mutex<mpsc::Receiver<QueueBinding>>>,
    context: Arc<RunContext>,
) {
    loop {
        let binding = handoff.lock().await.recv().await;
        let Some(binding) = binding else {
            debug!("Worker {} stopping", id);
            return;
        };

        debug!("Worker {} bound to queue", id);
        serve_queue(id, binding, &context).await;
        debug!("Worker {} released queue", id);
    }
}

async fn serve_queue(id: usize, binding: QueueBinding, context: &RunContext) {
    let QueueBinding {
        jobs,
        results,
        cancel,
        accepted,
        done,
    } = binding;
    let _ = accepted.send(());

    loop {
        let dispatch = jobs.lock().await.recv().await;
        let Some(Dispatch { job, taken }) = dispatch else {
            break;
        };

        // A job can still sit in the channel after the queue was cancelled.
        if cancel.is_cancelled() || taken.send(()).is_err() {
            debug!("Worker {} dropping {} after cancel", id, job);
            continue;
        }

        debug!("Worker {} running {}", id, job);
        let outcome = run_job(&job, context).await;
        if let Err(e) = &outcome {
            warn!("Worker {} hit a fatal error, cancelling queue: {}", id, e);
            cancel.cancel();
        }

        // The receiver may be gone if the caller stopped listening.
        let _ = results.send(outcome);
    }

    drop(results);
    let _ = done.send(());
}

/// Assemble, execute and record one job
async fn run_job(job: &Job, context: &RunContext) -> RunOutcome {
    let source = job
        .test
        .assemble_source(job.run_type, &context.includes)
        .map_err(|source| RunError::Include {
            path: job.path().to_string(),
            run_type: job.run_type,
            source,
        })?;

    let execution = context
        .executor
        .execute(&source, job.test.timeout())
        .await
        .map_err(|source| RunError::Executor {
            path: job.path().to_string(),
            run_type: job.run_type,
            source,
        })?;

    let result = TestResult::new(
        job,
        execution.success,
        execution.stderr,
        execution.stdout,
        execution.elapsed,
    );
    job.test.record_result(result.clone());
    Ok(result)
}

struct QueueInner {
    pool: WorkerPool,
    cancel: CancelToken,
    results: parking_lot::Mutex<Option<mpsc::UnboundedSender<RunOutcome>>>,
}

/// Single-use batch of work against a pool
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

impl JobQueue {
    /// Create a queue and the stream its results will arrive on
    pub fn new(pool: &WorkerPool) -> (Self, ResultStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            inner: Arc::new(QueueInner {
                pool: pool.clone(),
                cancel: CancelToken::new(),
                results: parking_lot::Mutex::new(Some(tx)),
            }),
        };
        (queue, ResultStream { rx })
    }

    /// Stop dispatching jobs. Jobs already taken by a worker still finish
    /// and report. Safe to call at any time, any number of times.
    pub fn cancel(&self) {
        if !self.inner.cancel.is_cancelled() {
            info!("Cancelling job queue");
        }
        self.inner.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Run `jobs` on the pool. Returns once every claimed worker has
    /// released the queue; the result stream is closed by then.
    pub async fn submit(&self, jobs: Vec<Job>) -> Result<(), QueueError> {
        let results = self
            .inner
            .results
            .lock()
            .take()
            .ok_or(QueueError::AlreadySubmitted)?;

        let pool = &self.inner.pool;
        let workers = pool.worker_count;
        let (job_tx, job_rx) = mpsc::channel::<Dispatch>(1);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        // Claim the whole pool, however few jobs there are. Each worker
        // confirms before the next one is asked.
        {
            let _claim = pool.claim.lock().await;
            for _ in 0..workers {
                let (accepted, accepted_rx) = oneshot::channel();
                let binding = QueueBinding {
                    jobs: Arc::clone(&job_rx),
                    results: results.clone(),
                    cancel: self.inner.cancel.clone(),
                    accepted,
                    done: done_tx.clone(),
                };
                if pool.handoff.send(binding).await.is_err() || accepted_rx.await.is_err() {
                    return Err(QueueError::PoolClosed);
                }
            }
        }
        drop(done_tx);
        debug!("Queue claimed {} workers for {} jobs", workers, jobs.len());

        let total = jobs.len();
        let mut dispatched = 0;
        for job in jobs {
            if self.inner.cancel.is_cancelled() {
                break;
            }
            let (taken, taken_rx) = oneshot::channel();
            tokio::select! {
                biased;
                _ = self.inner.cancel.cancelled() => break,
                sent = job_tx.send(Dispatch { job, taken }) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
            tokio::select! {
                biased;
                _ = self.inner.cancel.cancelled() => break,
                ack = taken_rx => {
                    if ack.is_err() {
                        break;
                    }
                    dispatched += 1;
                }
            }
        }

        // Workers finish what they hold, drop anything left over, see the
        // closed channel and let go.
        drop(job_tx);
        for _ in 0..workers {
            if done_rx.recv().await.is_none() {
                break;
            }
        }
        drop(results);

        if dispatched < total {
            info!("Queue stopped after dispatching {}/{} jobs", dispatched, total);
        } else {
            debug!("Queue finished all {} jobs", total);
        }
        Ok(())
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Results of one queue, in completion order. Ends when the queue is done.
#[derive(Debug)]
pub struct ResultStream {
    rx: mpsc::UnboundedReceiver<RunOutcome>,
}

impl ResultStream {
    /// Next result, or `None` once the queue has finished
    pub async fn recv(&mut self) -> Option<RunOutcome> {
        self.rx.recv().await
    }

    /// Drain until the stream closes
    pub async fn collect_all(mut self) -> Vec<RunOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}

impl Stream for ResultStream {
    type Item = RunOutcome;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Corpus, CorpusBuilder};
    use crate::exclusions::ExclusionRegistry;
    use crate::executor::Execution;
    use crate::metadata::parse_test_file;
    use crate::models::{SuiteState, TestState};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Succeeds unless the source calls `fail()`
    #[derive(Default)]
    struct MockExecutor {
        delay: Duration,
        launch_error: bool,
        running: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl MockExecutor {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Executor for MockExecutor {
        async fn execute(
            &self,
            source: &str,
            _timeout: Option<Duration>,
        ) -> Result<Execution, ExecutorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.launch_error {
                return Err(ExecutorError::Launch {
                    program: "mock".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no engine"),
                });
            }

            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            Ok(Execution {
                success: !source.contains("fail()"),
                stderr: String::new(),
                stdout: String::new(),
                elapsed: self.delay,
            })
        }
    }

    fn harness() -> Arc<HarnessIncludes> {
        Arc::new(
            HarnessIncludes::new()
                .with("sta.js", "")
                .with("cth.js", "")
                .with("assert.js", ""),
        )
    }

    fn corpus(bodies: &[(&str, &str)]) -> Corpus {
        let mut builder = CorpusBuilder::new("corpus");
        for (name, body) in bodies {
            builder
                .add_test(&format!("corpus/{name}"), parse_test_file(body).unwrap())
                .unwrap();
        }
        builder.finish(ExclusionRegistry::in_memory())
    }

    fn many_tests(count: usize) -> Corpus {
        let names: Vec<String> = (0..count).map(|i| format!("t{i}.js")).collect();
        let bodies: Vec<(&str, &str)> = names
            .iter()
            .map(|n| (n.as_str(), "/*---\nflags: [onlyStrict]\n---*/\nok();\n"))
            .collect();
        corpus(&bodies)
    }

    async fn run(queue: &JobQueue, stream: ResultStream, jobs: Vec<Job>) -> Vec<RunOutcome> {
        let submitter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(jobs).await })
        };
        let outcomes = stream.collect_all().await;
        submitter.await.unwrap().unwrap();
        outcomes
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_end_to_end_single_test() {
        let corpus = corpus(&[("only.js", "ok();\n")]);
        let pool = WorkerPool::with_workers(2, Arc::new(MockExecutor::default()), harness());

        let jobs = corpus.run_jobs("corpus").unwrap();
        assert_eq!(jobs.len(), 2);

        let (queue, stream) = JobQueue::new(&pool);
        let outcomes = run(&queue, stream, jobs).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.as_ref().unwrap().success));

        let test = corpus.test("corpus/only.js").unwrap();
        assert_eq!(corpus.test_state(test, RunType::Strict), TestState::Success);
        assert_eq!(corpus.test_state(test, RunType::NonStrict), TestState::Success);
        assert_eq!(
            corpus.suite_state(corpus.root(), RunType::Strict),
            SuiteState::Success
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_job_reported_once() {
        let corpus = many_tests(40);
        let executor = Arc::new(MockExecutor::with_delay(Duration::from_millis(2)));
        let pool = WorkerPool::with_workers(4, executor.clone(), harness());

        let jobs = corpus.run_jobs("corpus").unwrap();
        let (queue, stream) = JobQueue::new(&pool);
        let outcomes = run(&queue, stream, jobs).await;

        let paths: HashSet<String> = outcomes
            .iter()
            .map(|o| o.as_ref().unwrap().path.clone())
            .collect();
        assert_eq!(outcomes.len(), 40);
        assert_eq!(paths.len(), 40);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 40);
        assert!(executor.peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_shortens_stream() {
        let corpus = many_tests(100);
        let executor = Arc::new(MockExecutor::with_delay(Duration::from_millis(20)));
        let pool = WorkerPool::with_workers(2, executor, harness());

        let jobs = corpus.run_jobs("corpus").unwrap();
        assert_eq!(jobs.len(), 100);

        let (queue, stream) = JobQueue::new(&pool);
        let submitter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(jobs).await })
        };
        queue.cancel();

        let outcomes = tokio::time::timeout(Duration::from_secs(10), stream.collect_all())
            .await
            .expect("result stream must close after cancel");
        submitter.await.unwrap().unwrap();

        assert!(outcomes.len() < 100);
        assert!(outcomes.iter().all(|o| o.is_ok()));
        assert!(queue.is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_mid_run_keeps_in_flight_results() {
        let corpus = many_tests(50);
        let executor = Arc::new(MockExecutor::with_delay(Duration::from_millis(10)));
        let pool = WorkerPool::with_workers(3, executor.clone(), harness());

        let (queue, mut stream) = JobQueue::new(&pool);
        let submitter = {
            let queue = queue.clone();
            let jobs = corpus.run_jobs("corpus").unwrap();
            tokio::spawn(async move { queue.submit(jobs).await })
        };

        let mut received = 0;
        while let Some(outcome) = stream.recv().await {
            outcome.unwrap();
            received += 1;
            if received == 5 {
                queue.cancel();
            }
        }
        submitter.await.unwrap().unwrap();

        // Everything that started was reported
        assert_eq!(received, executor.calls.load(Ordering::SeqCst));
        assert!(received >= 5);
        assert!(received < 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fewer_jobs_than_workers() {
        let corpus = corpus(&[("one.js", "/*---\nflags: [noStrict]\n---*/\nok();\n")]);
        let pool = WorkerPool::with_workers(4, Arc::new(MockExecutor::default()), harness());

        let (queue, stream) = JobQueue::new(&pool);
        let outcomes = tokio::time::timeout(
            Duration::from_secs(10),
            run(&queue, stream, corpus.run_jobs("corpus").unwrap()),
        )
        .await
        .unwrap();
        assert_eq!(outcomes.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_empty_submission_closes_stream() {
        let pool = WorkerPool::with_workers(2, Arc::new(MockExecutor::default()), harness());
        let (queue, stream) = JobQueue::new(&pool);
        let outcomes = run(&queue, stream, Vec::new()).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_is_reusable() {
        let corpus = many_tests(6);
        let executor = Arc::new(MockExecutor::default());
        let pool = WorkerPool::with_workers(2, executor.clone(), harness());

        for _ in 0..3 {
            let (queue, stream) = JobQueue::new(&pool);
            let outcomes = run(&queue, stream, corpus.run_jobs("corpus").unwrap()).await;
            assert_eq!(outcomes.len(), 6);
        }
        assert_eq!(executor.calls.load(Ordering::SeqCst), 18);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_second_submit_is_rejected() {
        let pool = WorkerPool::with_workers(1, Arc::new(MockExecutor::default()), harness());
        let (queue, stream) = JobQueue::new(&pool);
        run(&queue, stream, Vec::new()).await;

        assert_eq!(
            queue.submit(Vec::new()).await,
            Err(QueueError::AlreadySubmitted)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_after_finish_is_harmless() {
        let corpus = many_tests(2);
        let pool = WorkerPool::with_workers(2, Arc::new(MockExecutor::default()), harness());
        let (queue, stream) = JobQueue::new(&pool);
        let outcomes = run(&queue, stream, corpus.run_jobs("corpus").unwrap()).await;
        assert_eq!(outcomes.len(), 2);

        queue.cancel();
        queue.cancel();
        assert!(queue.is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failed_test_is_a_result_not_an_error() {
        let corpus = corpus(&[("good.js", "ok();\n"), ("bad.js", "fail();\n")]);
        let pool = WorkerPool::with_workers(2, Arc::new(MockExecutor::default()), harness());

        let (queue, stream) = JobQueue::new(&pool);
        let outcomes = run(&queue, stream, corpus.run_jobs("corpus").unwrap()).await;
        assert_eq!(outcomes.len(), 4);
        let failures = outcomes
            .iter()
            .filter(|o| !o.as_ref().unwrap().success)
            .count();
        assert_eq!(failures, 2);

        let bad = corpus.test("corpus/bad.js").unwrap();
        assert_eq!(corpus.test_state(bad, RunType::Strict), TestState::Failure);
        assert_eq!(
            corpus.suite_state(corpus.root(), RunType::Strict),
            SuiteState::PartialSuccess
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_launch_failure_is_fatal_and_cancels() {
        let corpus = many_tests(30);
        let executor = Arc::new(MockExecutor {
            launch_error: true,
            ..Default::default()
        });
        let pool = WorkerPool::with_workers(2, executor, harness());

        let (queue, stream) = JobQueue::new(&pool);
        let outcomes = run(&queue, stream, corpus.run_jobs("corpus").unwrap()).await;

        assert!(!outcomes.is_empty());
        assert!(outcomes.len() < 30);
        assert!(matches!(
            outcomes[0],
            Err(RunError::Executor { ref path, .. }) if path.starts_with("corpus/t")
        ));
        assert!(queue.is_cancelled());

        // Nothing was recorded for the failed runs
        assert!(corpus
            .tests()
            .all(|t| corpus.test_state(t, RunType::Strict) == TestState::HasNotRun));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_missing_include_is_fatal() {
        let corpus = corpus(&[("t.js", "ok();\n")]);
        let pool = WorkerPool::with_workers(
            1,
            Arc::new(MockExecutor::default()),
            Arc::new(HarnessIncludes::new()),
        );

        let (queue, stream) = JobQueue::new(&pool);
        let outcomes = run(&queue, stream, corpus.run_jobs("corpus").unwrap()).await;
        assert!(matches!(
            outcomes[0],
            Err(RunError::Include { ref source, .. }) if matches!(source, IncludeError::Unknown(n) if n == "sta.js")
        ));
        assert_eq!(outcomes[0].as_ref().unwrap_err().path(), "corpus/t.js");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_result_stream_as_futures_stream() {
        use futures::StreamExt;

        let corpus = many_tests(5);
        let pool = WorkerPool::with_workers(2, Arc::new(MockExecutor::default()), harness());
        let (queue, stream) = JobQueue::new(&pool);
        let jobs = corpus.run_jobs("corpus").unwrap();
        let submitter = tokio::spawn({
            let queue = queue.clone();
            async move { queue.submit(jobs).await }
        });

        let successes = stream.filter(|o| futures::future::ready(o.is_ok())).count().await;
        submitter.await.unwrap().unwrap();
        assert_eq!(successes, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_queues_do_not_share_workers() {
        let delay = Duration::from_millis(200);
        let corpus_a = many_tests(1);
        let corpus_b = many_tests(1);
        let executor = Arc::new(MockExecutor::with_delay(delay));
        let pool = WorkerPool::with_workers(3, executor.clone(), harness());

        let started = std::time::Instant::now();
        let (queue_a, stream_a) = JobQueue::new(&pool);
        let first = tokio::spawn({
            let queue = queue_a.clone();
            let jobs = corpus_a.run_jobs("corpus").unwrap();
            async move { run(&queue, stream_a, jobs).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        let (queue_b, stream_b) = JobQueue::new(&pool);
        let second = run(&queue_b, stream_b, corpus_b.run_jobs("corpus").unwrap()).await;
        let first = first.await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(executor.peak.load(Ordering::SeqCst), 1);
        assert!(
            elapsed >= delay * 2 - Duration::from_millis(20),
            "queues overlapped: {elapsed:?}"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_leaves_pending_jobs_unrun() {
        let corpus = many_tests(10);
        let executor = Arc::new(MockExecutor::with_delay(Duration::from_millis(100)));
        let pool = WorkerPool::with_workers(1, executor.clone(), harness());

        let (queue, stream) = JobQueue::new(&pool);
        let submitter = {
            let queue = queue.clone();
            let jobs = corpus.run_jobs("corpus").unwrap();
            tokio::spawn(async move { queue.submit(jobs).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        queue.cancel();

        let outcomes = stream.collect_all().await;
        submitter.await.unwrap().unwrap();

        // Only the job the worker had already started
        assert_eq!(outcomes.len(), 1);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_state_readable_while_running() {
        let corpus = Arc::new(many_tests(30));
        let executor = Arc::new(MockExecutor::with_delay(Duration::from_millis(5)));
        let pool = WorkerPool::with_workers(3, executor, harness());
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let reader = tokio::spawn({
            let corpus = Arc::clone(&corpus);
            let finished = Arc::clone(&finished);
            async move {
                let mut last = 0;
                let mut reads = 0;
                while !finished.load(Ordering::SeqCst) {
                    let counts = corpus.suite_results(corpus.root()).strict;
                    assert_eq!(counts.total, 30);
                    assert!(counts.success >= last, "success count went backwards");
                    last = counts.success;

                    let done = corpus
                        .tests()
                        .filter(|t| corpus.test_state(t, RunType::Strict) == TestState::Success)
                        .count();
                    assert!(done as u32 >= last);
                    reads += 1;
                    tokio::task::yield_now().await;
                }
                reads
            }
        });

        let (queue, stream) = JobQueue::new(&pool);
        let outcomes = run(&queue, stream, corpus.run_jobs("corpus").unwrap()).await;
        finished.store(true, Ordering::SeqCst);
        let reads = reader.await.unwrap();

        assert_eq!(outcomes.len(), 30);
        assert!(reads > 0);
        assert_eq!(corpus.suite_results(corpus.root()).strict.success, 30);
        assert_eq!(
            corpus.suite_state(corpus.root(), RunType::Strict),
            SuiteState::Success
        );
    }

    #[test]
    fn test_default_worker_count() {
        assert!(default_worker_count() >= 1);
    }
}
