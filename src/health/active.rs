//! Active health checking.
//!
//! # Responsibilities
//! - Periodically dial every service in the pool
//! - Update each service's liveness from the result

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::load_balancer::pool::ServicePool;

pub struct HealthMonitor {
    pool: Arc<ServicePool>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(pool: Arc<ServicePool>, config: HealthCheckConfig) -> Self {
        Self { pool, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            dial_timeout_ms = self.config.dial_timeout_ms,
            "Health monitor starting"
        );

        let interval = self.config.interval();
        // Services were dialed when they joined; first sweep waits a full beat.
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => break,
            }

            // A sweep can take up to one dial timeout; shutdown cuts it short.
            tokio::select! {
                _ = self.check_all() => {}
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Health monitor received shutdown signal, exiting loop");
    }

    /// One sweep: dial every service concurrently, then apply the results.
    pub async fn check_all(&self) {
        let services = self.pool.services();
        tracing::info!(services = services.len(), "Starting health check");

        let results = join_all(services.iter().map(|s| self.pool.probe(s))).await;

        for (service, alive) in services.iter().zip(results) {
            if alive {
                self.pool.mark_alive(service);
            } else {
                self.pool.mark_dead(service);
            }
            tracing::info!(
                service = %service.id(),
                status = if alive { "up" } else { "down" },
                "Health check result"
            );
        }

        tracing::info!("Health check completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn config(interval_secs: u64) -> HealthCheckConfig {
        HealthCheckConfig {
            enabled: true,
            interval_secs,
            dial_timeout_ms: 500,
        }
    }

    #[tokio::test]
    async fn test_sweep_updates_liveness() {
        let pool = Arc::new(ServicePool::default());
        let up = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let down = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let up_svc = pool.add(&up.local_addr().unwrap().to_string()).await.unwrap();
        let down_svc = pool.add(&down.local_addr().unwrap().to_string()).await.unwrap();
        drop(down);

        // Revived services must come back too.
        pool.mark_dead(&up_svc);

        let monitor = HealthMonitor::new(pool.clone(), config(20));
        monitor.check_all().await;

        assert!(up_svc.is_alive());
        assert!(!down_svc.is_alive());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let pool = Arc::new(ServicePool::default());
        let (tx, rx) = broadcast::channel(1);
        let monitor = HealthMonitor::new(pool, config(3600));

        let handle = tokio::spawn(monitor.run(rx));
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sweep() {
        let pool = Arc::new(ServicePool::default());
        // Blackholed address: the dial sits until its timeout.
        pool.register(crate::load_balancer::service::tests::service("10.255.255.1:9"))
            .unwrap();

        let cfg = HealthCheckConfig {
            enabled: true,
            interval_secs: 1,
            dial_timeout_ms: 10_000,
        };
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(HealthMonitor::new(pool, cfg).run(rx));

        // First sweep starts after one beat.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("monitor kept sweeping after shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_disabled_monitor_returns() {
        let pool = Arc::new(ServicePool::default());
        let (_tx, rx) = broadcast::channel(1);
        let mut cfg = config(1);
        cfg.enabled = false;

        tokio::time::timeout(Duration::from_secs(1), HealthMonitor::new(pool, cfg).run(rx))
            .await
            .expect("disabled monitor should return immediately");
    }
}
