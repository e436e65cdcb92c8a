//! Long-running service plumbing.
//!
//! Each process hosts one or more services that run until a shutdown signal
//! cancels the shared token. Services are expected to return promptly once
//! the token is cancelled; whichever service exits first takes the rest of
//! the host down with it.

use anyhow::Result;
use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A long-running unit of work with cooperative shutdown.
#[async_trait]
pub trait Service: Send {
    fn name(&self) -> &'static str;

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()>;
}

/// Runs services until ctrl-c or the first failure.
#[derive(Default)]
pub struct ServiceHost {
    services: Vec<Box<dyn Service>>,
}

impl ServiceHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, service: impl Service + 'static) -> Self {
        self.services.push(Box::new(service));
        self
    }

    pub async fn run_until_shutdown(self) -> Result<()> {
        let shutdown = CancellationToken::new();

        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                signal_token.cancel();
            }
        });

        let mut set = JoinSet::new();
        for service in self.services {
            let name = service.name();
            let token = shutdown.clone();
            set.spawn(async move {
                info!(service = name, "service starting");
                (name, service.run(token).await)
            });
        }

        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            // One service ending, for any reason, ends the process.
            shutdown.cancel();
            match joined {
                Ok((name, Ok(()))) => info!(service = name, "service stopped"),
                Ok((name, Err(e))) => {
                    error!(service = name, error = %e, "service failed");
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    error!(error = %e, "service task panicked");
                    first_error.get_or_insert_with(|| anyhow::anyhow!(e));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
