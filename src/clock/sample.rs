//! Four-timestamp round-trip samples

/// Timestamps captured by one completed `client/time` exchange.
///
/// Client stamps are local microseconds, server stamps are sender-clock
/// microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSample {
    pub client_transmitted: i64,
    pub server_received: i64,
    pub server_transmitted: i64,
    pub client_received: i64,
}

impl ClockSample {
    /// Sender clock minus local clock, in microseconds
    pub fn offset_us(&self) -> f64 {
        // In float space: the two clocks may be arbitrarily far apart
        let outbound = self.server_received as f64 - self.client_transmitted as f64;
        let inbound = self.server_transmitted as f64 - self.client_received as f64;
        (outbound + inbound) / 2.0
    }

    /// Network round trip, excluding server processing time. `None` when the
    /// stamps are too far apart to be a real exchange.
    pub fn round_trip_us(&self) -> Option<i64> {
        let elapsed = self.client_received.checked_sub(self.client_transmitted)?;
        let processing = self.server_transmitted.checked_sub(self.server_received)?;
        elapsed.checked_sub(processing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_latency() {
        // Server is 1s ahead, 5ms each way, 1ms processing
        let sample = ClockSample {
            client_transmitted: 10_000,
            server_received: 1_015_000,
            server_transmitted: 1_016_000,
            client_received: 21_000,
        };
        assert_eq!(sample.offset_us(), 1_000_000.0);
        assert_eq!(sample.round_trip_us(), Some(10_000));
    }

    #[test]
    fn test_asymmetric_latency_error_bounded() {
        // True offset -500_000; 2ms out, 8ms back
        let sample = ClockSample {
            client_transmitted: 1_000_000,
            server_received: 502_000,
            server_transmitted: 502_000,
            client_received: 1_010_000,
        };
        let error = (sample.offset_us() - -500_000.0).abs();
        assert_eq!(sample.round_trip_us(), Some(10_000));
        assert!(error <= 5_000.0);
    }

    #[test]
    fn test_unrepresentable_stamps() {
        let sample = ClockSample {
            client_transmitted: 0,
            server_received: i64::MIN,
            server_transmitted: i64::MAX,
            client_received: 10,
        };
        assert_eq!(sample.round_trip_us(), None);
        assert!(sample.offset_us().is_finite());
    }
}
