use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::handlers::trigger;
use crate::{ActivationQueue, ApiError, ApiResult};

pub struct Server {
    config: crate::Config,
    queue: ActivationQueue,
}

impl Server {
    pub fn new(config: crate::Config, queue: ActivationQueue) -> Self {
        Self { config, queue }
    }

    pub async fn bind(&self) -> ApiResult<TcpListener> {
        let addr = self.config.bind_address();
        TcpListener::bind(&addr)
            .await
            .map_err(|source| ApiError::Bind {
                address: addr.clone(),
                source,
            })
    }

    /// Runs until the listener fails; there is no shutdown path.
    pub async fn serve(&self, listener: TcpListener) -> ApiResult<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("Starting trigger server on {}", addr);
        }

        axum::serve(listener, router(self.queue.clone()))
            .await
            .map_err(ApiError::Serve)
    }
}

pub fn router(queue: ActivationQueue) -> Router {
    Router::new()
        .fallback(trigger)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(queue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::TRIGGER_RESPONSE;
    use crate::queue::tests::CountingActivator;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    #[tokio::test]
    async fn any_method_and_path_triggers_one_activation() {
        let activator = Arc::new(CountingActivator::default());
        let (queue, _worker) = ActivationQueue::spawn(activator.clone(), 8);
        let app = router(queue);

        let probes = [
            (Method::GET, "/"),
            (Method::GET, "/reload/now?x=1"),
            (Method::POST, "/anything"),
            (Method::HEAD, "/"),
        ];

        for (i, (method, path)) in probes.iter().enumerate() {
            let request = Request::builder()
                .method(method.clone())
                .uri(*path)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
            assert_eq!(activator.calls.load(Ordering::SeqCst), i + 1);

            if *method != Method::HEAD {
                let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
                assert_eq!(&body[..], TRIGGER_RESPONSE.as_bytes());
            }
        }
    }

    #[tokio::test]
    async fn replies_even_when_worker_is_gone() {
        let (queue, worker) = ActivationQueue::spawn(Arc::new(CountingActivator::default()), 1);
        worker.abort();
        let _ = worker.await;

        let response = router(queue)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn serves_over_tcp() {
        let activator = Arc::new(CountingActivator::default());
        let (queue, _worker) = ActivationQueue::spawn(activator.clone(), 8);
        let server = Server::new(
            crate::Config {
                bind_ip: std::net::Ipv4Addr::LOCALHOST.into(),
                port: 0,
                queue_depth: 8,
            },
            queue,
        );
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { server.serve(listener).await });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /whatever HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.ends_with(TRIGGER_RESPONSE));
        assert_eq!(activator.calls.load(Ordering::SeqCst), 1);
    }
}
