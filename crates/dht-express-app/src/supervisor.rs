use crate::sink::{Console, poll_line, poll_placeholder_line};
use crate::{BoardErr, Error};
use dht_express_lib::{DhtBoard, Differential, PinConfig, ReportCallback, SensorType};
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::sleep;

/// Time between two polls of the cached samples.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub const DHT22_PIN: u8 = 6;
pub const DHT11_PIN: u8 = 7;

const DHT22_INITIAL_DIFFERENTIAL: f64 = 0.01;
const DHT22_RECONFIGURED_DIFFERENTIAL: f64 = 20.0;
const DHT11_RECONFIGURED_DIFFERENTIAL: f64 = 2.0;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Reconfigure {
    Pending,
    Done,
}

/// Drives both DHT pins: configures them, then polls their cached
/// samples every [`POLL_INTERVAL`], tightening the differentials once
/// after the first poll.
pub struct Supervisor<'a, B: DhtBoard> {
    board: &'a B,
    callback: Option<ReportCallback>,
    console: Console,
    reconfigure: Reconfigure,
}

impl<'a, B: DhtBoard> Supervisor<'a, B> {
    pub fn new(board: &'a B, callback: Option<ReportCallback>, console: Console) -> Self {
        Self {
            board,
            callback,
            console,
            reconfigure: Reconfigure::Pending,
        }
    }

    /// Run until cancelled or until the board reports an error.
    pub async fn run(mut self) -> Result<Infallible, Error<B::Error>> {
        self.configure(initial_configs()?).await?;

        loop {
            sleep(POLL_INTERVAL).await;
            self.tick().await?;
        }
    }

    async fn tick(&mut self) -> Result<(), Error<B::Error>> {
        self.poll(DHT22_PIN).await?;
        self.poll(DHT11_PIN).await?;

        if self.reconfigure == Reconfigure::Pending {
            tracing::info!("applying new differentials");
            self.configure(reconfigured_configs()?).await?;
            self.reconfigure = Reconfigure::Done;
        }

        Ok(())
    }

    async fn poll(&self, pin: u8) -> Result<(), Error<B::Error>> {
        let line = match self.board.read_cached_dht(pin).await.board_err()? {
            Some(sample) => poll_line(pin, &sample),
            None => poll_placeholder_line(pin),
        };

        self.console.emit(&line);
        Ok(())
    }

    async fn configure(&self, configs: [PinConfig; 2]) -> Result<(), Error<B::Error>> {
        for config in &configs {
            self.board
                .configure_dht(config, self.callback.clone())
                .await
                .board_err()?;
        }

        Ok(())
    }
}

fn initial_configs() -> dht_express_lib::Result<[PinConfig; 2]> {
    Ok([
        PinConfig::new(DHT22_PIN, SensorType::Dht22).with_differential(Differential::new(DHT22_INITIAL_DIFFERENTIAL)?),
        PinConfig::new(DHT11_PIN, SensorType::Dht11),
    ])
}

fn reconfigured_configs() -> dht_express_lib::Result<[PinConfig; 2]> {
    Ok([
        PinConfig::new(DHT22_PIN, SensorType::Dht22)
            .with_differential(Differential::new(DHT22_RECONFIGURED_DIFFERENTIAL)?),
        PinConfig::new(DHT11_PIN, SensorType::Dht11)
            .with_differential(Differential::new(DHT11_RECONFIGURED_DIFFERENTIAL)?),
    ])
}
