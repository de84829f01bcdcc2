use crate::timefmt::format_timestamp;
use dht_express_lib::{PushReport, ReportCallback, Sample};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Line-oriented output shared by the poll loop and the report callback.
#[derive(Clone)]
pub struct Console {
    out: Arc<Mutex<dyn Write + Send>>,
}

impl Console {
    pub fn new<W: Write + Send + 'static>(out: Arc<Mutex<W>>) -> Self {
        Self { out }
    }

    pub fn stdout() -> Self {
        Self::new(Arc::new(Mutex::new(io::stdout())))
    }

    /// Write `line` followed by a newline. Failures are logged and
    /// otherwise ignored.
    pub fn emit(&self, line: &str) {
        let Ok(mut out) = self.out.lock() else {
            tracing::warn!("console lock poisoned, dropping line");
            return;
        };

        if let Err(e) = writeln!(out, "{line}") {
            tracing::warn!("failed to write line: {e}");
            return;
        }

        if let Err(e) = out.flush() {
            tracing::warn!("failed to flush console: {e}");
        }
    }
}

// Floats use `{:?}` so integral values keep their trailing `.0`.

pub fn push_line(report: &PushReport) -> String {
    format!(
        "Pin: {} DHT Type: {} Humidity:{:?}, Temperature: {:?} Timestamp: {}",
        report.pin,
        report.sensor_type,
        report.humidity,
        report.temperature,
        format_timestamp(report.timestamp)
    )
}

pub fn poll_line(pin: u8, sample: &Sample) -> String {
    format!(
        "poll pin {pin}: humidity={:?} temp={:?} time of last report: {}",
        sample.humidity,
        sample.temperature,
        format_timestamp(sample.last_update)
    )
}

pub fn poll_placeholder_line(pin: u8) -> String {
    format!("poll pin {pin}: no report yet")
}

/// Callback that prints every push report on `console`.
pub fn report_sink(console: Console) -> ReportCallback {
    Arc::new(move |report: &PushReport| console.emit(&push_line(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dht_express_lib::{PIN_MODE_DHT, SensorType};

    fn captured() -> (Console, Arc<Mutex<Vec<u8>>>) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        (Console::new(buf.clone()), buf)
    }

    fn text(buf: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(buf.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn poll_line_shape() {
        let sample = Sample {
            humidity: 50.0,
            temperature: 22.3,
            last_update: 1_700_000_000,
        };

        assert_eq!(
            poll_line(6, &sample),
            format!(
                "poll pin 6: humidity=50.0 temp=22.3 time of last report: {}",
                format_timestamp(1_700_000_000)
            )
        );
    }

    #[test]
    fn sink_emits_one_push_line_per_report() {
        let (console, buf) = captured();
        let sink = report_sink(console);

        sink(&PushReport {
            pin_mode: PIN_MODE_DHT,
            pin: 7,
            sensor_type: SensorType::Dht11,
            humidity: 41.0,
            temperature: 19.0,
            timestamp: 1_700_000_010,
        });

        assert_eq!(
            text(&buf),
            format!(
                "Pin: 7 DHT Type: 11 Humidity:41.0, Temperature: 19.0 Timestamp: {}\n",
                format_timestamp(1_700_000_010)
            )
        );
    }

    #[test]
    fn write_failure_does_not_panic() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("gone"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Err(io::Error::other("gone"))
            }
        }

        Console::new(Arc::new(Mutex::new(Broken))).emit("lost");
    }
}
