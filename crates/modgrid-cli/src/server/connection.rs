use super::ServerState;
use super::protocol::{
    ClientEvent, ErrorKind, ErrorPayload, OptimizePayload, ProgressPayload, ResultPayload,
    ServerEvent, decode_client, encode_server,
};
use crate::error::Result;
use modgrid::engine::cancel::CancellationToken;
use modgrid::engine::error::EngineError;
use modgrid::engine::progress::{Progress, ProgressReporter, ProgressSnapshot};
use modgrid::workflows::optimize::{OptimizeResult, PreparedJob};
use std::future::pending;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{Span, debug, info, instrument, trace, warn};

type JobOutcome = std::result::Result<OptimizeResult, EngineError>;

/// The job a connection is currently running. Dropping it cancels the worker.
struct RunningJob {
    cancel: CancellationToken,
    handle: JoinHandle<JobOutcome>,
}

impl Drop for RunningJob {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Counts a job as active for as long as its worker holds the guard.
struct ActiveJobGuard(Arc<AtomicUsize>);

impl ActiveJobGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn next_progress(
    progress: &mut Option<mpsc::Receiver<ProgressSnapshot>>,
) -> Option<ProgressSnapshot> {
    match progress.as_mut() {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn job_finished(
    job: &mut Option<RunningJob>,
) -> std::result::Result<JobOutcome, JoinError> {
    match job.as_mut() {
        Some(running) => (&mut running.handle).await,
        None => pending().await,
    }
}

async fn send<W: AsyncWrite + Unpin>(writer: &mut W, event: &ServerEvent) -> Result<()> {
    let line = encode_server(event)?;
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Serves one client until it disconnects.
///
/// A connection runs at most one job at a time. Requests that arrive while a job
/// runs are rejected with a `busy` error; the running job is not affected.
#[instrument(skip_all, name = "connection", fields(peer = %peer))]
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut job: Option<RunningJob> = None;
    let mut progress: Option<mpsc::Receiver<ProgressSnapshot>> = None;

    let outcome = loop {
        let has_progress = progress.is_some();
        let has_job = job.is_some();

        tokio::select! {
            biased;

            snapshot = next_progress(&mut progress), if has_progress => {
                let Some(snapshot) = snapshot else {
                    progress = None;
                    continue;
                };
                let event = ServerEvent::Progress(ProgressPayload::from(&snapshot));
                if let Err(e) = send(&mut writer, &event).await {
                    break Err(e);
                }
            }

            joined = job_finished(&mut job), if has_job => {
                job = None;
                if let Err(e) = finish_job(&mut writer, progress.take(), joined).await {
                    break Err(e);
                }
            }

            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e.into()),
                };
                if line.trim().is_empty() {
                    continue;
                }
                if job.is_some() {
                    debug!("Rejecting request while a job is running.");
                    let event = ServerEvent::Error(ErrorPayload::new(
                        ErrorKind::Busy,
                        "an optimization is already running on this connection",
                    ));
                    if let Err(e) = send(&mut writer, &event).await {
                        break Err(e);
                    }
                    continue;
                }
                match start_job(&line, &state) {
                    Ok((running, rx)) => {
                        job = Some(running);
                        progress = Some(rx);
                    }
                    Err(payload) => {
                        if let Err(e) = send(&mut writer, &ServerEvent::Error(payload)).await {
                            break Err(e);
                        }
                    }
                }
            }
        }
    };

    if job.take().is_some() {
        info!("Client went away; cancelled its running job.");
    }
    info!("Connection closed.");
    outcome
}

/// Decodes a request and hands it to a blocking worker. Preparation (catalog
/// lookups, grid conversion, window search) runs on the worker too, and its
/// failures come back through the job outcome.
fn start_job(
    line: &str,
    state: &Arc<ServerState>,
) -> std::result::Result<(RunningJob, mpsc::Receiver<ProgressSnapshot>), ErrorPayload> {
    let ClientEvent::Optimize(payload) = decode_client(line)?;
    let send_grid_updates = payload.send_grid_updates;

    let cancel = CancellationToken::new();
    let (progress_tx, progress_rx) = mpsc::channel(state.config.server.progress_buffer);
    let guard = ActiveJobGuard::new(Arc::clone(&state.active_jobs));
    let worker_cancel = cancel.clone();
    let worker_state = Arc::clone(state);
    let span = Span::current();

    let handle = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        let _entered = span.enter();
        let job = prepare(payload, &worker_state)?;
        info!(tech = job.tech(), region = job.region().len(), "Starting job.");

        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            if let Progress::Snapshot(snapshot) = event {
                if let Err(e) = progress_tx.try_send(snapshot) {
                    trace!("Dropped progress snapshot: {}", e);
                }
            }
        }))
        .with_grid_updates(send_grid_updates);
        job.run(&reporter, &worker_cancel)
    });

    Ok((RunningJob { cancel, handle }, progress_rx))
}

fn prepare(
    payload: OptimizePayload,
    state: &ServerState,
) -> std::result::Result<PreparedJob, EngineError> {
    let request = payload.into_request()?;
    PreparedJob::prepare(
        &state.catalog,
        request,
        &state.config.annealing,
        &state.config.scoring,
    )
}

/// Flushes buffered progress, then sends the terminal event of a job.
async fn finish_job<W: AsyncWrite + Unpin>(
    writer: &mut W,
    progress: Option<mpsc::Receiver<ProgressSnapshot>>,
    joined: std::result::Result<JobOutcome, JoinError>,
) -> Result<()> {
    if let Some(mut rx) = progress {
        while let Ok(snapshot) = rx.try_recv() {
            send(writer, &ServerEvent::Progress(ProgressPayload::from(&snapshot))).await?;
        }
    }

    let event = match joined {
        Ok(Ok(result)) => {
            info!(
                score = result.score,
                iterations = result.stats.iterations,
                termination = ?result.termination,
                "Job completed."
            );
            ServerEvent::OptimizationResult(ResultPayload::from(&result))
        }
        Ok(Err(e)) => match ErrorPayload::from_engine(&e) {
            Some(payload) if payload.kind != ErrorKind::Internal => {
                debug!("Request rejected: {}", e);
                ServerEvent::Error(payload)
            }
            Some(payload) => {
                warn!("Job failed: {}", e);
                ServerEvent::Error(payload)
            }
            None => {
                debug!("Job was cancelled.");
                return Ok(());
            }
        },
        Err(e) => {
            warn!("Job worker panicked: {}", e);
            ServerEvent::Error(ErrorPayload::new(ErrorKind::Internal, e.to_string()))
        }
    };
    send(writer, &event).await
}
