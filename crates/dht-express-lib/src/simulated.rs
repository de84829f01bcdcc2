use crate::{DhtBoard, Error, PIN_MODE_DHT, PinConfig, PushReport, ReportCallback, Result, Sample};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// How often the board samples each DHT pin. The DHT family can't be
/// read faster than this.
pub const SAMPLE_PERIOD: Duration = Duration::from_secs(2);

const INITIAL_HUMIDITY: f64 = 50.0;
const INITIAL_TEMPERATURE: f64 = 22.0;
const HUMIDITY_STEP: f64 = 1.0;
const TEMPERATURE_STEP: f64 = 0.5;

/// In-process board that behaves like a DHT-capable Firmata board.
///
/// A background task samples every configured pin once per
/// [`SAMPLE_PERIOD`], refreshes the cached reading, and pushes a report
/// whenever humidity or temperature moved by at least the pin's
/// differential since the last report.
pub struct SimulatedBoard {
    state: Arc<Mutex<BoardState>>,
    sampler: JoinHandle<()>,
}

#[derive(Default)]
struct BoardState {
    pins: BTreeMap<u8, PinState>,
    closed: bool,
}

struct PinState {
    config: PinConfig,
    callback: Option<ReportCallback>,
    current: Option<Sample>,
    reported: Option<(f64, f64)>,
}

impl SimulatedBoard {
    /// Start a simulated board seeded from the OS.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start() -> Self {
        Self::start_with_rng(StdRng::from_entropy())
    }

    /// Start a simulated board with a fixed seed, for reproducible runs.
    pub fn start_with_seed(seed: u64) -> Self {
        Self::start_with_rng(StdRng::seed_from_u64(seed))
    }

    fn start_with_rng(rng: StdRng) -> Self {
        let state = Arc::new(Mutex::new(BoardState::default()));
        let sampler = tokio::spawn(sample_loop(state.clone(), rng));

        tracing::info!("simulated DHT board started");

        Self { state, sampler }
    }
}

impl Drop for SimulatedBoard {
    fn drop(&mut self) {
        self.sampler.abort();
    }
}

impl DhtBoard for SimulatedBoard {
    type Error = Error;

    async fn configure_dht(&self, config: &PinConfig, callback: Option<ReportCallback>) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(Error::Closed);
        }

        tracing::debug!(
            pin = config.pin,
            sensor = %config.sensor_type,
            differential = config.effective_differential().value(),
            "configure DHT pin"
        );

        match state.pins.get_mut(&config.pin) {
            Some(pin) => {
                pin.config = *config;
                pin.callback = callback;
                pin.reported = None;
            }
            None => {
                state.pins.insert(
                    config.pin,
                    PinState {
                        config: *config,
                        callback,
                        current: None,
                        reported: None,
                    },
                );
            }
        }

        Ok(())
    }

    async fn read_cached_dht(&self, pin: u8) -> Result<Option<Sample>> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(Error::Closed);
        }

        state
            .pins
            .get(&pin)
            .map(|p| p.current)
            .ok_or(Error::PinNotConfigured(pin))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.closed {
            state.closed = true;
            self.sampler.abort();
            tracing::info!("simulated DHT board shut down");
        }

        Ok(())
    }
}

async fn sample_loop(state: Arc<Mutex<BoardState>>, mut rng: StdRng) {
    let mut ticker = interval(SAMPLE_PERIOD);

    loop {
        ticker.tick().await;

        // Callbacks run outside the lock so they may call back into the
        // board.
        let reports = {
            let mut state = state.lock().await;
            if state.closed {
                break;
            }
            state.sample_all(&mut rng, unix_now())
        };

        for (callback, report) in reports {
            callback(&report);
        }
    }
}

impl BoardState {
    fn sample_all(&mut self, rng: &mut impl Rng, now: i64) -> Vec<(ReportCallback, PushReport)> {
        let mut reports = Vec::new();

        for (&pin, state) in self.pins.iter_mut() {
            let sample = state.next_sample(rng, now);
            state.current = Some(sample);

            if !state.should_report(&sample) {
                continue;
            }

            state.reported = Some((sample.humidity, sample.temperature));
            tracing::debug!(pin, humidity = sample.humidity, temperature = sample.temperature, "push report");

            if let Some(callback) = &state.callback {
                let report = PushReport {
                    pin_mode: PIN_MODE_DHT,
                    pin,
                    sensor_type: state.config.sensor_type,
                    humidity: sample.humidity,
                    temperature: sample.temperature,
                    timestamp: sample.last_update,
                };
                reports.push((callback.clone(), report));
            }
        }

        reports
    }
}

impl PinState {
    fn next_sample(&self, rng: &mut impl Rng, now: i64) -> Sample {
        let sensor = self.config.sensor_type;
        let (humidity, temperature, last_update) = match self.current {
            Some(s) => (s.humidity, s.temperature, s.last_update),
            None => (INITIAL_HUMIDITY, INITIAL_TEMPERATURE, now),
        };

        let (h_min, h_max) = sensor.humidity_range();
        let (t_min, t_max) = sensor.temperature_range();

        let humidity = humidity + rng.gen_range(-HUMIDITY_STEP..=HUMIDITY_STEP);
        let temperature = temperature + rng.gen_range(-TEMPERATURE_STEP..=TEMPERATURE_STEP);

        Sample {
            humidity: sensor.quantize(humidity.clamp(h_min, h_max)),
            temperature: sensor.quantize(temperature.clamp(t_min, t_max)),
            last_update: now.max(last_update),
        }
    }

    fn should_report(&self, sample: &Sample) -> bool {
        let differential = self.config.effective_differential();
        match self.reported {
            None => true,
            Some((humidity, temperature)) => {
                differential.is_crossed_by(humidity, sample.humidity)
                    || differential.is_crossed_by(temperature, sample.temperature)
            }
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Differential, SensorType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counting_callback() -> (ReportCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let callback: ReportCallback = Arc::new(move |_: &PushReport| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (callback, count)
    }

    #[tokio::test(start_paused = true)]
    async fn unconfigured_pin_is_an_error() {
        let board = SimulatedBoard::start_with_seed(1);
        assert_eq!(board.read_cached_dht(3).await, Err(Error::PinNotConfigured(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn configured_pin_samples_within_sensor_range() {
        let board = SimulatedBoard::start_with_seed(1);
        board
            .configure_dht(&PinConfig::new(7, SensorType::Dht11), None)
            .await
            .unwrap();

        sleep(SAMPLE_PERIOD + Duration::from_millis(100)).await;

        let sample = board.read_cached_dht(7).await.unwrap().unwrap();
        let (h_min, h_max) = SensorType::Dht11.humidity_range();
        let (t_min, t_max) = SensorType::Dht11.temperature_range();
        assert!((h_min..=h_max).contains(&sample.humidity));
        assert!((t_min..=t_max).contains(&sample.temperature));
        assert_eq!(sample.humidity.fract(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_differential_reports_every_sample() {
        let board = SimulatedBoard::start_with_seed(7);
        let (callback, count) = counting_callback();
        let config = PinConfig::new(6, SensorType::Dht22).with_differential(Differential::new(0.0).unwrap());
        board.configure_dht(&config, Some(callback)).await.unwrap();

        sleep(SAMPLE_PERIOD * 2 + Duration::from_millis(100)).await;

        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_differential_reports_only_the_first_sample() {
        let board = SimulatedBoard::start_with_seed(7);
        let (callback, count) = counting_callback();
        let config = PinConfig::new(6, SensorType::Dht22).with_differential(Differential::new(500.0).unwrap());
        board.configure_dht(&config, Some(callback)).await.unwrap();

        sleep(SAMPLE_PERIOD * 4 + Duration::from_millis(100)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_the_board() {
        let board = SimulatedBoard::start_with_seed(1);
        board
            .configure_dht(&PinConfig::new(6, SensorType::Dht22), None)
            .await
            .unwrap();

        board.shutdown().await.unwrap();
        board.shutdown().await.unwrap();

        assert_eq!(board.read_cached_dht(6).await, Err(Error::Closed));
        assert_eq!(
            board.configure_dht(&PinConfig::new(6, SensorType::Dht22), None).await,
            Err(Error::Closed)
        );
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut pin = PinState {
            config: PinConfig::new(6, SensorType::Dht22),
            callback: None,
            current: None,
            reported: None,
        };

        pin.current = Some(pin.next_sample(&mut rng, 1_700_000_100));
        let later = pin.next_sample(&mut rng, 1_700_000_050);

        assert_eq!(later.last_update, 1_700_000_100);
    }
}
