use anyhow::Result;
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use tracing::{info, warn};

#[derive(Clone)]
pub struct MetricsHandle {
    registry: Registry,
    status_queries: IntCounterVec,
    schedule_appends: IntCounter,
    schedule_rejections: IntCounter,
}

impl MetricsHandle {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let status_queries = IntCounterVec::new(
            Opts::new(
                "market_status_queries_total",
                "Market status resolutions served, by verdict",
            ),
            &["status"],
        )?;
        let schedule_appends = IntCounter::new(
            "market_schedule_appends_total",
            "Schedule versions appended to the store",
        )?;
        let schedule_rejections = IntCounter::new(
            "market_schedule_rejections_total",
            "Schedule updates rejected by validation",
        )?;
        registry.register(Box::new(status_queries.clone()))?;
        registry.register(Box::new(schedule_appends.clone()))?;
        registry.register(Box::new(schedule_rejections.clone()))?;
        Ok(Self {
            registry,
            status_queries,
            schedule_appends,
            schedule_rejections,
        })
    }

    pub fn record_status(&self, status: &str) {
        self.status_queries.with_label_values(&[status]).inc();
    }

    pub fn record_append(&self) {
        self.schedule_appends.inc();
    }

    pub fn record_rejection(&self) {
        self.schedule_rejections.inc();
    }

    /// Text exposition of everything registered.
    pub fn render(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let make_svc = make_service_fn(move |_| {
            let handle = self.clone();
            async move {
                Ok::<_, hyper::Error>(service_fn(move |_req: Request<Body>| {
                    let handle = handle.clone();
                    async move { Ok::<_, hyper::Error>(handle.exposition()) }
                }))
            }
        });

        let server = Server::bind(&addr).serve(make_svc);
        info!(%addr, "metrics exporter listening");
        server.await?;
        Ok(())
    }

    fn exposition(&self) -> Response<Body> {
        match self.render() {
            Ok(buffer) => {
                let mut resp = Response::new(Body::from(buffer));
                if let Ok(value) = TextEncoder::new()
                    .format_type()
                    .parse::<hyper::header::HeaderValue>()
                {
                    resp.headers_mut().insert(hyper::header::CONTENT_TYPE, value);
                }
                resp
            }
            Err(err) => {
                warn!(error = ?err, "metrics encoding failed");
                let mut resp = Response::new(Body::from("metrics encoding failed"));
                *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                resp
            }
        }
    }
}
