//! # Overview
//!
//! A narrow metrics-sink collaborator for the reservation core. The core
//! never depends on a concrete metrics exporter (one is named as an
//! out-of-scope external collaborator in spec.md §1); it depends only on
//! the [`MetricsSink`] trait here, and the process wires in whichever
//! implementation it likes.
//!
//! # Design
//!
//! Grounded on the teacher's `crates/metrics` crate: a `MetricHandler` that
//! owns an `UnboundedSender<MetricMessage>` and spawns a `MetricConsumer`
//! task to drain the matching receiver. We keep that channel +
//! background-consumer shape for [`ChannelSink`], the non-blocking sink a
//! real deployment would plug in, but drop the `telegraf` dependency the
//! teacher's `MetricConsumer` wrote to — this workspace targets whatever
//! backend the operator configures, via the [`MetricsSink`] trait, not one
//! fixed vendor.
//!
//! [`TracingSink`] is the crate's only built-in implementation: it logs
//! every message as a structured `tracing` event and never fails, matching
//! SPEC_FULL.md's requirement that ambient logging/metrics concerns are
//! carried even though a concrete exporter is a Non-goal.
use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

pub mod error;
pub mod message;
pub mod metrics;

pub use error::MetricError;
pub use message::MetricMessage;
pub use metrics::*;

/// The sink every metric message flows through. Implementations must not
/// block the caller for long — `ChannelSink` and `TracingSink` both return
/// immediately.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn record(&self, message: MetricMessage);
}

/// Logs every metric as a structured `tracing::info!` event. The default
/// sink when no exporter is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl MetricsSink for TracingSink {
    async fn record(&self, message: MetricMessage) {
        tracing::info!(metric = ?message, "metric recorded");
    }
}

/// Decouples submission from processing via an unbounded channel, the
/// teacher's `MetricHandler`/`MetricConsumer` shape. `record` never blocks
/// on the consumer; a send failure (receiver dropped) is logged and
/// swallowed rather than propagated, since metrics delivery is best-effort.
pub struct ChannelSink {
    tx: UnboundedSender<MetricMessage>,
    cancel: CancellationToken,
}

impl ChannelSink {
    /// Spawns a background task that feeds every received message to
    /// `downstream` and returns a sink whose `record()` is a cheap channel
    /// send.
    pub fn spawn(downstream: impl MetricsSink + 'static) -> Self {
        let (tx, rx) = unbounded_channel();
        let cancel = CancellationToken::new();
        let consumer = MetricConsumer {
            rx,
            downstream: Box::new(downstream),
            cancel: cancel.clone(),
        };
        tokio::spawn(consumer.run());
        Self { tx, cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl MetricsSink for ChannelSink {
    async fn record(&self, message: MetricMessage) {
        if self.tx.send(message.clone()).is_err() {
            tracing::warn!(metric = ?message, "metric consumer gone, dropping message");
        }
    }
}

struct MetricConsumer {
    rx: UnboundedReceiver<MetricMessage>,
    downstream: Box<dyn MetricsSink>,
    cancel: CancellationToken,
}

impl MetricConsumer {
    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                message = self.rx.recv() => {
                    match message {
                        Some(m) => self.downstream.record(m).await,
                        None => break,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Id;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CollectingSink(Arc<Mutex<Vec<MetricMessage>>>);

    #[async_trait]
    impl MetricsSink for CollectingSink {
        async fn record(&self, message: MetricMessage) {
            self.0.lock().unwrap().push(message);
        }
    }

    #[tokio::test]
    async fn channel_sink_forwards_to_downstream() {
        let collector = CollectingSink::default();
        let sink = ChannelSink::spawn(collector.clone());

        sink.record(
            AdapterLatencyMetric {
                ts: Timestamp::now(),
                source_id: Id::new(),
                operation: "availability".into(),
                latency_ms: 120,
                success: true,
            }
            .into(),
        )
        .await;

        // allow the consumer task to drain the channel
        tokio::task::yield_now().await;
        for _ in 0..50 {
            if !collector.0.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        assert_eq!(collector.0.lock().unwrap().len(), 1);
        sink.cancel();
    }
}
