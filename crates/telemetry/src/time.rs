use std::time::Instant;

use crate::sinks::TransportMetricsSink;

/// RAII timer that reports a handshake duration to the sink on drop.
pub struct HandshakeTimer<'a> {
    sink: &'a dyn TransportMetricsSink,
    start: Instant,
}

impl<'a> HandshakeTimer<'a> {
    pub fn new(sink: &'a dyn TransportMetricsSink) -> Self {
        Self {
            sink,
            start: Instant::now(),
        }
    }
}

impl Drop for HandshakeTimer<'_> {
    fn drop(&mut self) {
        self.sink
            .observe_handshake_duration(self.start.elapsed().as_secs_f64());
    }
}
