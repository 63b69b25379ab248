//! Adaptive polling loop around a [`JobSupervisor`].
//!
//! One task owns the supervisor. UI commands arrive over an mpsc channel and
//! are serialized with timer ticks through `tokio::select!`, so nothing else
//! ever touches job state. After every command or tick the cadence guard is
//! evaluated again:
//!
//! - **active** (some job running): every tick polls both job kinds;
//! - **ambient** (all idle): every tick only refreshes folder counts.
//!
//! The board is republished on a `watch` channel after each change.

use deed_desk_core::models::JobKind;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::client::{ActionReply, JobClient};
use crate::config::PollingConfig;
use crate::error::DashboardError;
use crate::supervisor::{Board, Cadence, JobSupervisor, StartRequest};

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Start(StartRequest, Reply<Result<ActionReply, DashboardError>>),
    Stop(JobKind, Reply<Result<ActionReply, DashboardError>>),
    Refresh(Reply<Board>),
}

/// Handle to a running supervisor loop.
///
/// Dropping the handle aborts the loop; [`SupervisorHandle::shutdown`] stops
/// it and waits for it to finish.
pub struct SupervisorHandle {
    commands: mpsc::Sender<Command>,
    board: watch::Receiver<Board>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Move `supervisor` into its own task and start polling.
pub fn spawn_supervisor<C>(supervisor: JobSupervisor<C>, polling: PollingConfig) -> SupervisorHandle
where
    C: JobClient + ?Sized + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(16);
    let (board_tx, board_rx) = watch::channel(supervisor.board());
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let task = tokio::spawn(run_loop(
        supervisor,
        polling,
        command_rx,
        board_tx,
        shutdown_rx,
    ));

    SupervisorHandle {
        commands: command_tx,
        board: board_rx,
        shutdown: Some(shutdown_tx),
        task: Some(task),
    }
}

fn loop_gone() -> DashboardError {
    DashboardError::RejectedAction("job supervisor is not running".to_string())
}

impl SupervisorHandle {
    pub async fn start(&self, request: StartRequest) -> Result<ActionReply, DashboardError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Start(request, tx))
            .await
            .map_err(|_| loop_gone())?;
        rx.await.map_err(|_| loop_gone())?
    }

    pub async fn stop(&self, kind: JobKind) -> Result<ActionReply, DashboardError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Stop(kind, tx))
            .await
            .map_err(|_| loop_gone())?;
        rx.await.map_err(|_| loop_gone())?
    }

    /// Poll both job kinds now, regardless of cadence.
    pub async fn refresh(&self) -> Board {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Refresh(tx)).await.is_err() {
            return self.board();
        }
        match rx.await {
            Ok(board) => board,
            Err(_) => self.board(),
        }
    }

    /// Latest published board.
    pub fn board(&self) -> Board {
        self.board.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Board> {
        self.board.clone()
    }

    /// Stop the loop and wait until it has exited.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn publish(tx: &watch::Sender<Board>, board: Board) {
    tx.send_if_modified(|current| {
        if *current == board {
            false
        } else {
            *current = board;
            true
        }
    });
}

async fn run_loop<C>(
    mut supervisor: JobSupervisor<C>,
    polling: PollingConfig,
    mut commands: mpsc::Receiver<Command>,
    board_tx: watch::Sender<Board>,
    mut shutdown: oneshot::Receiver<()>,
) where
    C: JobClient + ?Sized,
{
    // Pick up jobs that were already running before we mounted.
    supervisor.poll_all().await;
    let _ = supervisor.refresh_folders().await;
    publish(&board_tx, supervisor.board());

    let mut cadence = supervisor.cadence(&polling);
    let mut deadline = Instant::now() + cadence.interval();
    debug!(?cadence, "supervisor loop mounted");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            command = commands.recv() => {
                let Some(command) = command else { break };
                handle_command(&mut supervisor, command, &board_tx).await;
            }
            _ = tokio::time::sleep_until(deadline) => {
                tick(&mut supervisor, cadence).await;
                publish(&board_tx, supervisor.board());
                deadline = Instant::now() + cadence.interval();
            }
        }

        let next = supervisor.cadence(&polling);
        if next != cadence {
            debug!(from = ?cadence, to = ?next, "cadence changed");
            cadence = next;
            deadline = Instant::now() + cadence.interval();
        }
    }

    debug!("supervisor loop stopped");
}

async fn tick<C: JobClient + ?Sized>(supervisor: &mut JobSupervisor<C>, cadence: Cadence) {
    match cadence {
        Cadence::Active(_) => {
            supervisor.poll_all().await;
        }
        Cadence::Ambient(_) => {
            let _ = supervisor.refresh_folders().await;
        }
    }
}

async fn handle_command<C: JobClient + ?Sized>(
    supervisor: &mut JobSupervisor<C>,
    command: Command,
    board_tx: &watch::Sender<Board>,
) {
    match command {
        Command::Start(request, reply) => {
            let result = supervisor.start(request).await;
            publish(board_tx, supervisor.board());
            let _ = reply.send(result);
        }
        Command::Stop(kind, reply) => {
            let result = supervisor.stop(kind).await;
            publish(board_tx, supervisor.board());
            let _ = reply.send(result);
        }
        Command::Refresh(reply) => {
            let board = supervisor.poll_all().await;
            publish(board_tx, board.clone());
            let _ = reply.send(board);
        }
    }
}

/// Wait until the board satisfies `done`, or `limit` elapses.
pub async fn wait_for(
    rx: &mut watch::Receiver<Board>,
    limit: Duration,
    done: impl Fn(&Board) -> bool,
) -> Option<Board> {
    let waited = tokio::time::timeout(limit, rx.wait_for(|board| done(board))).await;
    match waited {
        Ok(Ok(board)) => Some((*board).clone()),
        _ => None,
    }
}
