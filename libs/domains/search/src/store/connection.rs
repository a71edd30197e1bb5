use async_trait::async_trait;
use database::postgres::{PostgresConfig, connect_from_config};
use sea_orm::{ConnAcquireErr, DatabaseConnection, DbErr};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{SearchError, SearchResult};

/// Outcome of a liveness probe against a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    /// Every pooled connection is checked out; the server itself is fine.
    Saturated,
    Dead,
}

impl Liveness {
    /// Classify the result of a `ping`.
    pub fn from_ping(result: Result<(), DbErr>) -> Self {
        match result {
            Ok(()) => Liveness::Alive,
            Err(DbErr::ConnectionAcquire(ConnAcquireErr::Timeout)) => Liveness::Saturated,
            Err(_) => Liveness::Dead,
        }
    }
}

/// Builds connection pools and probes their liveness.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<DatabaseConnection, DbErr>;

    async fn probe(&self, conn: &DatabaseConnection) -> Liveness {
        Liveness::from_ping(conn.ping().await)
    }
}

/// Production connector: a sqlx-backed pool described by [`PostgresConfig`].
#[derive(Clone, Debug)]
pub struct PgConnector {
    config: PostgresConfig,
}

impl PgConnector {
    pub fn new(config: PostgresConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self) -> Result<DatabaseConnection, DbErr> {
        connect_from_config(&self.config).await
    }
}

/// A pool that is probed before every use and rebuilt at most once per
/// failed probe.
///
/// Requests share the pool; each statement checks a connection out of it
/// and returns it when the statement completes or fails. A saturated pool
/// fails the request but is never rebuilt, so the server never sees more
/// than one pool's worth of connections from this process.
pub struct LiveConnection<C: Connector> {
    connector: C,
    current: RwLock<DatabaseConnection>,
}

impl<C: Connector> LiveConnection<C> {
    pub async fn open(connector: C) -> Result<Self, DbErr> {
        let conn = connector.connect().await?;
        Ok(Self {
            connector,
            current: RwLock::new(conn),
        })
    }

    /// A pool that just answered a liveness probe.
    ///
    /// If the probe finds the backend gone, one reconnect is attempted. When
    /// that fails too the caller gets [`SearchError::ConnectionLost`]; the
    /// next call will try again, once.
    pub async fn acquire(&self) -> SearchResult<DatabaseConnection> {
        let conn = self.current.read().await.clone();
        match self.connector.probe(&conn).await {
            Liveness::Alive => return Ok(conn),
            Liveness::Saturated => return Err(saturated()),
            Liveness::Dead => {}
        }

        let mut current = self.current.write().await;
        // Another task may have reconnected while we waited for the lock.
        match self.connector.probe(&current).await {
            Liveness::Alive => return Ok(current.clone()),
            Liveness::Saturated => return Err(saturated()),
            Liveness::Dead => {}
        }

        warn!("Database connection lost, attempting to reconnect");
        match self.connector.connect().await {
            Ok(fresh) => {
                let stale = std::mem::replace(&mut *current, fresh.clone());
                info!("Reconnected to database");
                tokio::spawn(async move {
                    if let Err(e) = stale.close().await {
                        debug!(error = %e, "Closing replaced pool failed");
                    }
                });
                Ok(fresh)
            }
            Err(e) => {
                error!(error = %e, "Reconnect failed");
                Err(SearchError::ConnectionLost(e.to_string()))
            }
        }
    }

    /// Close the pool. Later calls to [`acquire`](Self::acquire) reconnect.
    pub async fn close(&self) {
        let conn = self.current.read().await.clone();
        match conn.close().await {
            Ok(()) => info!("Database pool closed"),
            Err(e) => error!(error = %e, "Error closing database pool"),
        }
    }
}

fn saturated() -> SearchError {
    warn!("Database pool exhausted, failing request without reconnecting");
    SearchError::ConnectionLost("timed out waiting for a pooled connection".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Connector whose backend can be "killed" or saturated and whose
    /// reconnects can be made to fail.
    #[derive(Clone, Default)]
    struct FlakyConnector {
        alive: Arc<AtomicBool>,
        saturated: Arc<AtomicBool>,
        refuse: Arc<AtomicBool>,
        connects: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        async fn connect(&self) -> Result<DatabaseConnection, DbErr> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return Err(DbErr::Custom("connection refused".to_string()));
            }
            self.alive.store(true, Ordering::SeqCst);
            Ok(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
        }

        async fn probe(&self, _conn: &DatabaseConnection) -> Liveness {
            if self.saturated.load(Ordering::SeqCst) {
                Liveness::Saturated
            } else if self.alive.load(Ordering::SeqCst) {
                Liveness::Alive
            } else {
                Liveness::Dead
            }
        }
    }

    #[tokio::test]
    async fn test_healthy_connection_is_reused() {
        let connector = FlakyConnector::default();
        let live = LiveConnection::open(connector.clone()).await.unwrap();

        live.acquire().await.unwrap();
        live.acquire().await.unwrap();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dead_connection_is_replaced_once() {
        let connector = FlakyConnector::default();
        let live = LiveConnection::open(connector.clone()).await.unwrap();

        connector.alive.store(false, Ordering::SeqCst);
        live.acquire().await.unwrap();
        live.acquire().await.unwrap();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_reconnect_is_connection_lost_after_one_attempt() {
        let connector = FlakyConnector::default();
        let live = LiveConnection::open(connector.clone()).await.unwrap();

        connector.alive.store(false, Ordering::SeqCst);
        connector.refuse.store(true, Ordering::SeqCst);

        let err = live.acquire().await.unwrap_err();
        assert!(matches!(err, SearchError::ConnectionLost(_)));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);

        // The next operation gets its own single attempt, no retry loop.
        assert!(live.acquire().await.is_err());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_recovers_when_backend_comes_back() {
        let connector = FlakyConnector::default();
        let live = LiveConnection::open(connector.clone()).await.unwrap();

        connector.alive.store(false, Ordering::SeqCst);
        connector.refuse.store(true, Ordering::SeqCst);
        assert!(live.acquire().await.is_err());

        connector.refuse.store(false, Ordering::SeqCst);
        assert!(live.acquire().await.is_ok());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_saturated_pool_fails_without_building_another() {
        let connector = FlakyConnector::default();
        let live = LiveConnection::open(connector.clone()).await.unwrap();

        connector.saturated.store(true, Ordering::SeqCst);
        for _ in 0..3 {
            let err = live.acquire().await.unwrap_err();
            assert!(matches!(err, SearchError::ConnectionLost(_)));
        }
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

        connector.saturated.store(false, Ordering::SeqCst);
        assert!(live.acquire().await.is_ok());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ping_classification() {
        assert_eq!(Liveness::from_ping(Ok(())), Liveness::Alive);
        assert_eq!(
            Liveness::from_ping(Err(DbErr::ConnectionAcquire(ConnAcquireErr::Timeout))),
            Liveness::Saturated
        );
        assert_eq!(
            Liveness::from_ping(Err(DbErr::ConnectionAcquire(
                ConnAcquireErr::ConnectionClosed
            ))),
            Liveness::Dead
        );
        assert_eq!(
            Liveness::from_ping(Err(DbErr::Conn(sea_orm::RuntimeErr::Internal(
                "connection reset".into()
            )))),
            Liveness::Dead
        );
    }

    #[tokio::test]
    async fn test_open_propagates_connect_failure() {
        let connector = FlakyConnector::default();
        connector.refuse.store(true, Ordering::SeqCst);

        assert!(LiveConnection::open(connector).await.is_err());
    }
}
