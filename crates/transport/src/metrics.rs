use dep2p_telemetry::{NopSink, TransportMetricsSink};
use once_cell::sync::OnceCell;

static NOP_SINK: NopSink = NopSink;
pub static SINK: OnceCell<&'static dyn TransportMetricsSink> = OnceCell::new();

pub fn metrics() -> &'static dyn TransportMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}
