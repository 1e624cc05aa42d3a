use crate::config::Config;
use futures::future;
use slog::{debug, info, o};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::runtime::Builder;
use tokio::task::{JoinError, JoinHandle};
use volley_client::{Requester, Target};
use volley_metrics::stats::Statistics;
use volley_metrics::{Collector, CollectorError, CollectorHandle, ResultSet};

/// Upper bound on the result slots reserved before the first request goes out.
const MAX_PREALLOCATED: usize = 1 << 16;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("nothing to dispatch: {workers} workers x {requests} requests")]
    EmptyPlan { workers: usize, requests: usize },
    #[error("{workers} workers x {requests} requests is too many results to collect")]
    PlanTooLarge { workers: usize, requests: usize },
    #[error("could not start runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("worker {worker} did not finish: {source}")]
    WorkerFailed {
        worker: usize,
        #[source]
        source: JoinError,
    },
    #[error("worker {worker} could not deliver a result: {source}")]
    ResultLost {
        worker: usize,
        #[source]
        source: CollectorError,
    },
    #[error("collector did not finish: {0}")]
    CollectorFailed(#[source] JoinError),
    #[error("expected {expected} results, collected {actual}")]
    IncompleteResults { expected: usize, actual: usize },
    #[error("worker {worker} delivered {actual} of {expected} results")]
    WorkerShortfall {
        worker: usize,
        expected: usize,
        actual: usize,
    },
}

/// Runs a fixed number of workers against one target and gathers every outcome.
pub struct Dispatcher {
    requester: Requester,
    logger: slog::Logger,
}

impl Dispatcher {
    pub fn new(requester: Requester, logger: slog::Logger) -> Dispatcher {
        Dispatcher {
            requester,
            logger: logger.new(o!("component" => "dispatcher")),
        }
    }

    /// Spawn `workers` tasks, each making `requests` attempts one after another,
    /// and return once every attempt has been collected.
    ///
    /// Must be called from within a tokio runtime. Any error here is fatal for
    /// the whole run; failed requests are not errors.
    pub async fn run(
        &self,
        target: Target,
        workers: usize,
        requests: usize,
    ) -> Result<ResultSet, DispatchError> {
        if workers == 0 || requests == 0 {
            return Err(DispatchError::EmptyPlan { workers, requests });
        }
        let expected = workers
            .checked_mul(requests)
            .ok_or(DispatchError::PlanTooLarge { workers, requests })?;

        let collector = Collector::with_capacity(capacity_hint(expected));
        let handle = collector.handle();
        let draining = tokio::task::spawn_blocking(move || collector.drain());

        info!(self.logger, "starting run";
            "url" => target.url(),
            "workers" => workers,
            "requests_per_worker" => requests);
        let started = Instant::now();
        let target = Arc::new(target);
        let tasks: Vec<_> = (0..workers)
            .map(|id| {
                tokio::spawn(work(
                    self.requester.clone(),
                    target.clone(),
                    id,
                    requests,
                    handle.clone(),
                ))
            })
            .collect();
        // Workers now hold the only senders; the collector stops once they are all done.
        drop(handle);

        let results = join_workers(tasks, draining).await?;
        info!(self.logger, "run finished";
            "results" => results.len(),
            "elapsed" => ?started.elapsed());

        self.verify(&results, workers, requests)?;
        Ok(results)
    }

    fn verify(
        &self,
        results: &ResultSet,
        workers: usize,
        requests: usize,
    ) -> Result<(), DispatchError> {
        if results.len() != workers * requests {
            return Err(DispatchError::IncompleteResults {
                expected: workers * requests,
                actual: results.len(),
            });
        }
        let grouped = results.by_worker();
        for worker in 0..workers {
            let records = grouped.get(&worker).map(Vec::as_slice).unwrap_or(&[]);
            debug!(self.logger, "worker summary";
                "worker" => worker,
                "results" => records.len(),
                "passed" => records.iter().filter(|r| r.success()).count());
            if records.len() != requests {
                return Err(DispatchError::WorkerShortfall {
                    worker,
                    expected: requests,
                    actual: records.len(),
                });
            }
        }
        Ok(())
    }
}

fn capacity_hint(expected: usize) -> usize {
    expected.min(MAX_PREALLOCATED)
}

/// Wait for every worker, then for the collector. The first worker that
/// panicked or lost its collector fails the whole run.
async fn join_workers(
    tasks: Vec<JoinHandle<Result<(), CollectorError>>>,
    draining: JoinHandle<ResultSet>,
) -> Result<ResultSet, DispatchError> {
    for (worker, outcome) in future::join_all(tasks).await.into_iter().enumerate() {
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(source)) => return Err(DispatchError::ResultLost { worker, source }),
            Err(source) => return Err(DispatchError::WorkerFailed { worker, source }),
        }
    }
    draining.await.map_err(DispatchError::CollectorFailed)
}

async fn work(
    requester: Requester,
    target: Arc<Target>,
    id: usize,
    requests: usize,
    handle: CollectorHandle,
) -> Result<(), CollectorError> {
    for _ in 0..requests {
        let result = requester.execute(&target, id).await;
        handle.send(result)?;
    }
    Ok(())
}

/// Run the load described by `config` to completion and reduce it to statistics.
pub fn run_and_report(config: &Config, logger: &slog::Logger) -> Result<Statistics, DispatchError> {
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(DispatchError::Runtime)?;
    let requester = Requester::with_keep_alive(config.keep_alive, logger.clone());
    let dispatcher = Dispatcher::new(requester, logger.clone());
    let results = runtime.block_on(dispatcher.run(config.target(), config.workers, config.requests))?;
    Ok(Statistics::compute_with(results, &config.percentiles))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::FileConfig;
    use http::StatusCode;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Response, Server};
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use volley_metrics::WorkerResult;

    fn logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, o!())
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Requester::new(logger()), logger())
    }

    /// Serves every request after `delay`; every third request gets a 500.
    async fn serve(delay: Duration) -> SocketAddr {
        let served = Arc::new(AtomicUsize::new(0));
        let make_svc = make_service_fn(move |_conn| {
            let served = served.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |_req| {
                    let n = served.fetch_add(1, Ordering::SeqCst);
                    async move {
                        tokio::time::sleep(delay).await;
                        let mut res = Response::new(Body::from("volley"));
                        if n % 3 == 2 {
                            *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                        }
                        Ok::<_, Infallible>(res)
                    }
                }))
            }
        });
        let server = Server::bind(&([127, 0, 0, 1], 0).into()).serve(make_svc);
        let addr = server.local_addr();
        tokio::spawn(server);
        addr
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_attempt_is_collected() {
        let addr = serve(Duration::from_millis(1)).await;
        let target = Target::new(format!("http://{}/", addr), StatusCode::OK);
        let results = dispatcher().run(target, 3, 4).await.unwrap();
        assert_eq!(results.len(), 12);
        let grouped = results.by_worker();
        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(grouped.values().all(|r| r.len() == 4));
        assert_eq!(results.iter().filter(|r| !r.success()).count(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failures_are_still_counted() {
        let target = Target::new("http://exa mple.com/", StatusCode::OK);
        let results = dispatcher().run(target, 3, 4).await.unwrap();
        assert_eq!(results.len(), 12);
        assert!(results.iter().all(|r| !r.success()));
        let stats = Statistics::compute(results);
        assert_eq!(stats.passed(), 0);
        assert_eq!(stats.failed(), 12);
        assert_eq!(stats.mean(), Duration::from_secs(0));
        assert_eq!(stats.percentiles().count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn workers_run_in_parallel() {
        let latency = Duration::from_millis(100);
        let addr = serve(latency).await;
        let target = Target::new(format!("http://{}/", addr), StatusCode::OK);
        let started = Instant::now();
        let results = dispatcher().run(target, 5, 3).await.unwrap();
        let elapsed = started.elapsed();
        assert_eq!(results.len(), 15);
        assert!(elapsed >= latency * 3, "finished too early: {:?}", elapsed);
        // Serially this would take 15 x latency.
        assert!(elapsed < latency * 8, "workers did not overlap: {:?}", elapsed);
    }

    #[tokio::test]
    async fn rejects_empty_plan() {
        let target = Target::new("http://localhost/", StatusCode::OK);
        assert!(matches!(
            dispatcher().run(target.clone(), 0, 4).await,
            Err(DispatchError::EmptyPlan { workers: 0, requests: 4 })
        ));
        assert!(matches!(
            dispatcher().run(target, 2, 0).await,
            Err(DispatchError::EmptyPlan { workers: 2, requests: 0 })
        ));
    }

    #[test]
    fn run_and_report_reduces_results() {
        let server = tokio::runtime::Runtime::new().unwrap();
        let addr = server.block_on(serve(Duration::from_millis(1)));
        let config = Config::resolve(FileConfig {
            url: Some(format!("http://{}/", addr)),
            workers: Some(2),
            requests: Some(3),
            percentiles: Some(vec![50, 100]),
            ..FileConfig::default()
        })
        .unwrap();
        let stats = run_and_report(&config, &logger()).unwrap();
        assert_eq!(stats.total(), 6);
        assert_eq!(stats.passed(), 4);
        assert_eq!(stats.failed(), 2);
        assert!(stats.mean() >= Duration::from_millis(1));
        assert_eq!(stats.percentiles().count(), 2);
    }

    async fn panicking_worker() -> Result<(), CollectorError> {
        panic!("worker died")
    }

    fn finished_collector() -> JoinHandle<ResultSet> {
        tokio::task::spawn_blocking(ResultSet::new)
    }

    #[tokio::test]
    async fn panicked_worker_fails_the_run() {
        let tasks = vec![
            tokio::spawn(async { Ok::<(), CollectorError>(()) }),
            tokio::spawn(panicking_worker()),
        ];
        match join_workers(tasks, finished_collector()).await {
            Err(DispatchError::WorkerFailed { worker: 1, source }) => assert!(source.is_panic()),
            other => panic!("expected a worker failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn dropped_collector_fails_the_run() {
        let collector = Collector::new();
        let handle = collector.handle();
        drop(collector);
        let target = Arc::new(Target::new("http://exa mple.com/", StatusCode::OK));
        let tasks = vec![tokio::spawn(work(
            Requester::new(logger()),
            target,
            0,
            3,
            handle,
        ))];
        match join_workers(tasks, finished_collector()).await {
            Err(DispatchError::ResultLost {
                worker: 0,
                source: CollectorError::Disconnected,
            }) => {}
            other => panic!("expected a lost result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn collector_panic_fails_the_run() {
        let draining = tokio::task::spawn_blocking(|| -> ResultSet { panic!("collector died") });
        let tasks = vec![tokio::spawn(async { Ok::<(), CollectorError>(()) })];
        assert!(matches!(
            join_workers(tasks, draining).await,
            Err(DispatchError::CollectorFailed(_))
        ));
    }

    #[test]
    fn miscounted_results_are_rejected() {
        let d = dispatcher();
        let ms = Duration::from_millis;

        let short: ResultSet = vec![
            WorkerResult::passed(ms(1), 0),
            WorkerResult::failed(ms(2), 1),
            WorkerResult::passed(ms(3), 0),
        ]
        .into();
        assert!(matches!(
            d.verify(&short, 2, 2),
            Err(DispatchError::IncompleteResults { expected: 4, actual: 3 })
        ));

        let skewed: ResultSet = vec![
            WorkerResult::passed(ms(1), 0),
            WorkerResult::passed(ms(2), 0),
            WorkerResult::passed(ms(3), 0),
            WorkerResult::passed(ms(4), 1),
        ]
        .into();
        assert!(matches!(
            d.verify(&skewed, 2, 2),
            Err(DispatchError::WorkerShortfall {
                worker: 0,
                expected: 2,
                actual: 3
            })
        ));

        let even: ResultSet = vec![
            WorkerResult::passed(ms(1), 0),
            WorkerResult::failed(ms(2), 1),
            WorkerResult::passed(ms(3), 1),
            WorkerResult::unsent(0),
        ]
        .into();
        assert!(d.verify(&even, 2, 2).is_ok());
    }

    #[test]
    fn preallocation_is_capped() {
        assert_eq!(capacity_hint(12), 12);
        assert_eq!(capacity_hint(usize::MAX), MAX_PREALLOCATED);
    }
}
