use crate::Error;
use crate::sink::Console;
use crate::supervisor::Supervisor;
use dht_express_lib::{DhtBoard, ReportCallback};
use std::future::Future;

/// How a run ended.
#[derive(Debug)]
pub enum Termination<E> {
    /// The interrupt future resolved first.
    Interrupted,
    /// The supervisor stopped on an error.
    Failed(Error<E>),
}

impl<E> Termination<E> {
    /// Process exit status. Failures are not distinguished from a clean
    /// interrupt.
    pub fn exit_code(&self) -> u8 {
        0
    }
}

/// Run the supervisor on `board` until `interrupt` resolves or the
/// supervisor fails, then shut the board down exactly once.
pub async fn run_until<B, F>(
    board: &B,
    callback: Option<ReportCallback>,
    console: Console,
    interrupt: F,
) -> Termination<B::Error>
where
    B: DhtBoard,
    F: Future<Output = ()>,
{
    let supervisor = Supervisor::new(board, callback, console);

    let termination = tokio::select! {
        result = supervisor.run() => match result {
            Ok(never) => match never {},
            Err(e) => {
                tracing::error!("supervisor stopped: {e}");
                Termination::Failed(e)
            }
        },
        () = interrupt => {
            tracing::info!("interrupted, shutting down");
            Termination::Interrupted
        }
    };

    if let Err(e) = board.shutdown().await {
        tracing::warn!("board shutdown failed: {e}");
    }

    termination
}
