//! Cosmos DB Gremlin graph backend — a WebSocket Secure connection to a
//! `/dbs/<db>/colls/<graph>` endpoint, authenticated with a primary key.
//!
//! The connection is a lazily-created singleton protected by a mutex: any
//! failure that is not an auth failure discards the handle so the next
//! attempt rebuilds it from scratch.

use std::time::Duration;

use async_trait::async_trait;
use inv_domain::{Error, Result};
use tokio::sync::Mutex;

use crate::model::{Column, QueryParams, QueryResult};
use crate::retry::gremlin_backoff;
use crate::traits::GraphBackend;

const MAX_ATTEMPTS: u32 = 3;

/// Abstraction over the actual wire connection so the retry/reconnect
/// logic can be tested without a real Gremlin server.
#[async_trait]
pub trait GremlinConnection: Send + Sync {
    async fn submit(&self, query: &str) -> std::result::Result<QueryResult, GremlinWireError>;
}

#[derive(Debug, Clone)]
pub enum GremlinWireError {
    /// WSS handshake failed with 401 — never retried.
    AuthFailed,
    /// `GremlinServerError` carrying a retryable status code (429/408).
    ServerError { status: u16, message: String },
    /// Any other connection-level failure — handle is discarded and rebuilt.
    ConnectionFailed(String),
}

type ConnectionFactory =
    Box<dyn Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Box<dyn GremlinConnection>>> + Send>> + Send + Sync>;

pub struct GremlinBackend {
    factory: ConnectionFactory,
    connection: Mutex<Option<Box<dyn GremlinConnection>>>,
}

impl GremlinBackend {
    pub fn new(factory: ConnectionFactory) -> Self {
        Self {
            factory,
            connection: Mutex::new(None),
        }
    }

    async fn ensure_connection<'a>(
        &self,
        guard: &'a mut Option<Box<dyn GremlinConnection>>,
    ) -> Result<&'a dyn GremlinConnection> {
        if guard.is_none() {
            *guard = Some((self.factory)().await?);
        }
        Ok(guard.as_deref().unwrap())
    }

    async fn submit_with_retry(&self, query: &str) -> Result<QueryResult> {
        let mut attempt = 0u32;
        loop {
            let mut guard = self.connection.lock().await;
            let conn = self.ensure_connection(&mut guard).await?;
            match conn.submit(query).await {
                Ok(result) => return Ok(result),
                Err(GremlinWireError::AuthFailed) => {
                    return Err(Error::Unauthorized("gremlin WSS handshake 401".into()));
                }
                Err(GremlinWireError::ServerError { status, message }) if status == 429 || status == 408 => {
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        return Err(Error::RateLimited {
                            retry_after_secs: gremlin_backoff(attempt).as_secs_f64(),
                        });
                    }
                    drop(guard);
                    tokio::time::sleep(gremlin_backoff(attempt)).await;
                    let _ = message;
                }
                Err(GremlinWireError::ServerError { message, .. }) => {
                    return Err(Error::InvalidQuery(message));
                }
                Err(GremlinWireError::ConnectionFailed(detail)) => {
                    *guard = None;
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        return Err(Error::ConnectionDropped(detail));
                    }
                    drop(guard);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
            }
        }
    }
}

#[async_trait]
impl GraphBackend for GremlinBackend {
    async fn execute_query(&self, query: &str, _params: QueryParams) -> Result<QueryResult> {
        self.submit_with_retry(query).await
    }

    async fn ping(&self) -> Result<()> {
        self.submit_with_retry("g.V().limit(1)").await.map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        *self.connection.lock().await = None;
        Ok(())
    }

    fn connector_id(&self) -> &'static str {
        "cosmos-gremlin"
    }
}

// Dummy use so `Column` stays imported for downstream implementers building
// `QueryResult`s from Gremlin vertex/edge maps.
#[allow(dead_code)]
fn _column_marker() -> Column {
    Column {
        name: String::new(),
        type_name: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyConnection {
        fail_times: Arc<AtomicU32>,
    }

    #[async_trait]
    impl GremlinConnection for FlakyConnection {
        async fn submit(&self, _query: &str) -> std::result::Result<QueryResult, GremlinWireError> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(GremlinWireError::ServerError {
                    status: 429,
                    message: "throttled".into(),
                });
            }
            Ok(QueryResult {
                columns: vec![],
                data: vec![],
            })
        }
    }

    fn backend(fail_times: u32) -> GremlinBackend {
        let counter = Arc::new(AtomicU32::new(fail_times));
        GremlinBackend::new(Box::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                let conn: Box<dyn GremlinConnection> = Box::new(FlakyConnection {
                    fail_times: counter,
                });
                Ok(conn)
            })
        }))
    }

    #[tokio::test]
    async fn retries_on_429_then_succeeds() {
        let backend = backend(1);
        let result = backend
            .execute_query("g.V()", QueryParams::default())
            .await
            .unwrap();
        assert!(result.data.is_empty());
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let backend = backend(10);
        let err = backend
            .execute_query("g.V()", QueryParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
    }

    #[tokio::test]
    async fn auth_failure_surfaces_immediately() {
        struct AuthFailConnection;
        #[async_trait]
        impl GremlinConnection for AuthFailConnection {
            async fn submit(&self, _query: &str) -> std::result::Result<QueryResult, GremlinWireError> {
                Err(GremlinWireError::AuthFailed)
            }
        }
        let backend = GremlinBackend::new(Box::new(|| {
            Box::pin(async { Ok(Box::new(AuthFailConnection) as Box<dyn GremlinConnection>) })
        }));
        let err = backend
            .execute_query("g.V()", QueryParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }
}
