//! Background refresh of the pod directory
//!
//! Polls the pod source on a fixed interval and swaps the derived records
//! into the directory. A failed poll leaves the last good snapshot in place
//! and the next tick simply tries again.

use crate::directory::PodDirectory;
use crate::k8s::client::PodSource;
use crate::k8s::types::user_pod_records;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument, Span};

pub struct DirectorySynchronizer {
    source: Arc<dyn PodSource>,
    directory: PodDirectory,
    interval: Duration,
    shutdown: CancellationToken,
    span: Span,
}

impl DirectorySynchronizer {
    pub fn new(source: Arc<dyn PodSource>, directory: PodDirectory, interval: Duration) -> Self {
        Self {
            source,
            directory,
            interval,
            shutdown: CancellationToken::new(),
            span: info_span!("directory_sync"),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Run one fetch and replace cycle.
    ///
    /// Returns the number of records installed. On error the directory is
    /// left untouched.
    pub async fn sync_once(&self) -> Result<usize> {
        let pods = self.source.list_pods().await?;
        let records = user_pod_records(&pods);

        for record in &records {
            debug!(
                name = %record.name,
                pod = %record.pod_name,
                address = %record.address,
                port = ?record.port,
                "Pod record"
            );
        }

        let count = records.len();
        self.directory.replace(records);
        Ok(count)
    }

    /// Poll until cancelled. The first cycle runs immediately.
    pub async fn run(&self) {
        info!(interval = ?self.interval, "Starting directory synchronizer");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = self.sync_once() => match result {
                    Ok(count) => debug!(records = count, "Directory refreshed"),
                    Err(e) => warn!(error = %e, "Getting pods info failed, keeping previous records"),
                },
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Directory synchronizer stopped");
    }

    /// Spawn the loop on the current runtime
    pub fn spawn(self) -> JoinHandle<()> {
        let span = self.span.clone();
        tokio::spawn(async move { self.run().await }.instrument(span))
    }
}
