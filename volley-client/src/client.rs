use crate::target::Target;
use http::header::{HeaderValue, LOCATION};
use http::{Request, Response, StatusCode, Uri};
use hyper::client::{Client as HyperClient, HttpConnector};
use hyper::Body;
use slog::{debug, o, trace};
use url::Url;
use volley_metrics::{Stopwatch, WorkerResult};

/// Most requests one attempt may make, the original request included.
const MAX_REQUESTS: usize = 10;

/// Issues single GET attempts and classifies their outcome.
///
/// Cloning is cheap and clones share one connection pool.
#[derive(Clone)]
pub struct Requester {
    client: HyperClient<HttpConnector, Body>,
    logger: slog::Logger,
}

impl Requester {
    pub fn new(logger: slog::Logger) -> Requester {
        Requester::with_keep_alive(true, logger)
    }

    /// With `keep_alive` off every attempt opens a fresh connection.
    pub fn with_keep_alive(keep_alive: bool, logger: slog::Logger) -> Requester {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        let mut builder = HyperClient::builder();
        if !keep_alive {
            builder.pool_max_idle_per_host(0);
        }
        Requester {
            client: builder.build(connector),
            logger: logger.new(o!("component" => "requester")),
        }
    }

    /// Make exactly one attempt at `target` on behalf of `worker_id`.
    ///
    /// Redirects are followed as part of the attempt and timed with it; the
    /// final response's status decides the outcome. Failures never escape: a
    /// request that cannot be built, a transport error, a bad or endless
    /// redirect or an unexpected status all come back as a failed result.
    pub async fn execute(&self, target: &Target, worker_id: usize) -> WorkerResult {
        let mut req = match Request::get(target.url()).body(Body::empty()) {
            Ok(req) => req,
            Err(e) => {
                debug!(self.logger, "create request failed"; "url" => target.url(), "worker" => worker_id, "error" => %e);
                return WorkerResult::unsent(worker_id);
            }
        };

        let stopwatch = Stopwatch::new();
        let mut sent = 0;
        let status = loop {
            let uri = req.uri().clone();
            sent += 1;
            let res = match self.client.request(req).await {
                Ok(res) => res,
                Err(e) => {
                    debug!(self.logger, "perform request failed"; "url" => %uri, "worker" => worker_id, "error" => %e);
                    return stopwatch.finish(worker_id, false);
                }
            };

            let status = res.status();
            let location = redirect_location(&res);
            // The body is consumed here and dropped on every path out.
            if let Err(e) = hyper::body::to_bytes(res.into_body()).await {
                debug!(self.logger, "read response body failed"; "url" => %uri, "worker" => worker_id, "status" => %status, "error" => %e);
                return stopwatch.finish(worker_id, false);
            }

            let location = match location {
                Some(location) => location,
                None => break status,
            };
            if sent >= MAX_REQUESTS {
                debug!(self.logger, "too many redirects"; "url" => target.url(), "worker" => worker_id, "requests" => sent);
                return stopwatch.finish(worker_id, false);
            }
            req = match redirect_request(&uri, &location) {
                Some(next) => next,
                None => {
                    debug!(self.logger, "invalid redirect"; "url" => %uri, "worker" => worker_id, "location" => ?location);
                    return stopwatch.finish(worker_id, false);
                }
            };
        };

        let result = stopwatch.finish(worker_id, target.is_success(status));
        trace!(self.logger, "request finished";
            "worker" => worker_id,
            "status" => %status,
            "requests" => sent,
            "success" => result.success(),
            "latency" => ?result.latency());
        result
    }
}

/// The `Location` of a redirect response, if it is one that should be followed.
fn redirect_location(res: &Response<Body>) -> Option<HeaderValue> {
    match res.status() {
        StatusCode::MOVED_PERMANENTLY
        | StatusCode::FOUND
        | StatusCode::SEE_OTHER
        | StatusCode::TEMPORARY_REDIRECT
        | StatusCode::PERMANENT_REDIRECT => res.headers().get(LOCATION).cloned(),
        _ => None,
    }
}

/// A GET for `location`, resolved against the URI that answered with it.
fn redirect_request(from: &Uri, location: &HeaderValue) -> Option<Request<Body>> {
    let base = Url::parse(&from.to_string()).ok()?;
    let next = base.join(location.to_str().ok()?).ok()?;
    Request::get(next.as_str()).body(Body::empty()).ok()
}
