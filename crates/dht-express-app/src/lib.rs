use clap::Parser;
use color_eyre::Result;
use dht_express_lib::SimulatedBoard;
use thiserror::Error;

pub mod harness;
pub mod sink;
pub mod supervisor;
pub mod timefmt;

pub use harness::{Termination, run_until};
pub use sink::{Console, report_sink};
pub use supervisor::{POLL_INTERVAL, Supervisor};

#[derive(Error, Debug)]
pub enum Error<E> {
    #[error("board client error: {0}")]
    Board(#[source] E),
    #[error("invalid pin configuration: {0}")]
    Config(#[from] dht_express_lib::Error),
}

trait BoardErr {
    type Good;
    type Bad;
    fn board_err(self) -> std::result::Result<Self::Good, Error<Self::Bad>>;
}

impl<T, E> BoardErr for std::result::Result<T, E> {
    type Good = T;
    type Bad = E;
    fn board_err(self) -> std::result::Result<Self::Good, Error<Self::Bad>> {
        self.map_err(Error::Board)
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "dht-express",
    about = "Monitor a DHT22 on pin 6 and a DHT11 on pin 7, by push report and by polling",
    version
)]
pub struct Cli {}

impl Cli {
    /// Run until Ctrl-C, returning the process exit status.
    pub async fn run(&self) -> Result<u8> {
        let console = Console::stdout();
        let board = SimulatedBoard::start();

        let termination = run_until(&board, Some(report_sink(console.clone())), console, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("unable to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;

        Ok(termination.exit_code())
    }
}
