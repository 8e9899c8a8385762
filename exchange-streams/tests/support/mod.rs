use exchange_streams::{BridgeConfig, Exchange, PipelineEngine, StreamBridge};
use integration_test_utils::StreamSignal;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const WAIT: Duration = Duration::from_secs(5);

pub(crate) fn test_config(max_inflight_exchanges: usize) -> BridgeConfig {
    BridgeConfig {
        thread_pool_name: "it-bridge".to_string(),
        worker_threads: 2,
        max_inflight_exchanges,
        ..Default::default()
    }
}

pub(crate) fn make_bridge(engine: Arc<dyn PipelineEngine>, max_inflight_exchanges: usize) -> Arc<StreamBridge> {
    Arc::new(
        StreamBridge::new(test_config(max_inflight_exchanges), engine)
            .expect("bridge creation should succeed"),
    )
}

/// Message bodies of the `Next` signals, in order.
pub(crate) fn bodies(signals: &[StreamSignal<Exchange>]) -> Vec<Value> {
    signals
        .iter()
        .filter_map(|signal| match signal {
            StreamSignal::Next(exchange) => Some(exchange.message().body.clone()),
            _ => None,
        })
        .collect()
}
