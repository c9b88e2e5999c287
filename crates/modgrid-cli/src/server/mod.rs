//! TCP job server.
//!
//! Clients send `optimize` frames and receive `progress` frames while the job runs,
//! followed by exactly one `optimization_result` or `error` frame. See
//! [`protocol`] for the frame format.

mod connection;
pub mod protocol;

use crate::config::AppConfig;
use crate::error::Result;
use modgrid::core::catalog::registry::Catalog;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// State shared by every connection.
pub struct ServerState {
    pub catalog: Arc<Catalog>,
    pub config: AppConfig,
    /// Jobs whose worker has not returned yet, cancelled ones included.
    pub active_jobs: Arc<AtomicUsize>,
}

impl ServerState {
    pub fn new(catalog: Catalog, config: AppConfig) -> Self {
        Self {
            catalog: Arc::new(catalog),
            config,
            active_jobs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn active_jobs(&self) -> usize {
        self.active_jobs.load(Ordering::SeqCst)
    }
}

pub struct Server {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl Server {
    pub async fn bind(addr: &str, state: ServerState) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            state: Arc::new(state),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Accepts connections forever, each on its own task.
    pub async fn run(self) -> Result<()> {
        info!(addr = %self.local_addr()?, "Job server listening.");
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Error accepting client: {}", e);
                    continue;
                }
            };
            info!(%peer, "Client connected.");
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                if let Err(e) = connection::handle_connection(stream, peer, state).await {
                    warn!(%peer, "Connection ended with an error: {}", e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::protocol::{ErrorKind, ServerEvent};
    use super::*;
    use crate::config::ServerSettings;
    use modgrid::core::io::dto::GridDto;
    use modgrid::core::scoring::ScoringParams;
    use modgrid::engine::config::{AnnealingParams, AnnealingParamsBuilder};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
    use tokio::net::TcpStream;
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(20);

    fn config(annealing: AnnealingParams) -> AppConfig {
        AppConfig {
            catalog_path: None,
            annealing,
            scoring: ScoringParams::default(),
            server: ServerSettings {
                bind: "127.0.0.1:0".to_string(),
                progress_buffer: 16,
            },
        }
    }

    fn quick() -> AnnealingParams {
        AnnealingParamsBuilder::new()
            .max_iterations(2_000)
            .max_processing_time(30.0)
            .progress_interval_ms(1)
            .build()
            .unwrap()
    }

    /// Runs long enough that only cancellation ends it within the test.
    fn endless() -> AnnealingParams {
        AnnealingParamsBuilder::new()
            .cooling_rate(0.999_999)
            .stopping_temperature(1e-9)
            .max_processing_time(600.0)
            .progress_interval_ms(5)
            .build()
            .unwrap()
    }

    async fn start(annealing: AnnealingParams) -> (SocketAddr, Arc<ServerState>) {
        let state = ServerState::new(Catalog::builtin().unwrap(), config(annealing));
        let server = Server::bind("127.0.0.1:0", state).await.unwrap();
        let addr = server.local_addr().unwrap();
        let shared = server.state();
        tokio::spawn(server.run());
        (addr, shared)
    }

    struct Client {
        lines: Lines<BufReader<OwnedReadHalf>>,
        writer: OwnedWriteHalf,
    }

    impl Client {
        async fn connect(addr: SocketAddr) -> Self {
            let (reader, writer) = TcpStream::connect(addr).await.unwrap().into_split();
            Self {
                lines: BufReader::new(reader).lines(),
                writer,
            }
        }

        async fn send_line(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
        }

        async fn recv(&mut self) -> ServerEvent {
            let line = timeout(WAIT, self.lines.next_line())
                .await
                .expect("timed out waiting for a frame")
                .unwrap()
                .expect("server closed the connection");
            serde_json::from_str(&line).unwrap()
        }

        /// Reads frames until the terminal one, returning the progress frames seen.
        async fn until_terminal(&mut self) -> (Vec<ServerEvent>, ServerEvent) {
            let mut progress = Vec::new();
            loop {
                match self.recv().await {
                    event @ ServerEvent::Progress(_) => progress.push(event),
                    terminal => return (progress, terminal),
                }
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn optimize_streams_progress_then_one_result() {
        let (addr, _) = start(quick()).await;
        let mut client = Client::connect(addr).await;
        client
            .send_line(r#"{"event":"optimize","data":{"ship":"sentinel","tech":"infra","seed":5}}"#)
            .await;

        let (progress, terminal) = client.until_terminal().await;
        let ServerEvent::OptimizationResult(result) = terminal else {
            panic!("expected a result, got {:?}", terminal);
        };
        assert_eq!(result.solve_method, "Simulated Annealing");
        assert!(result.score > 0.0);
        assert!((result.max_bonus - result.score).abs() < 1e-9);
        let placed = result
            .grid
            .cells
            .iter()
            .flatten()
            .filter(|c| c.tech.as_deref() == Some("infra"))
            .count();
        assert_eq!(placed, 5);

        let percents: Vec<f64> = progress
            .iter()
            .map(|event| match event {
                ServerEvent::Progress(p) => p.progress_percent,
                _ => unreachable!(),
            })
            .collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn grid_updates_are_attached_on_request() {
        let (addr, _) = start(quick()).await;
        let mut client = Client::connect(addr).await;
        client
            .send_line(
                r#"{"event":"optimize","data":{"ship":"sentinel","tech":"pulse","seed":1,"send_grid_updates":true}}"#,
            )
            .await;

        let (progress, terminal) = client.until_terminal().await;
        assert!(matches!(terminal, ServerEvent::OptimizationResult(_)));
        assert!(!progress.is_empty());
        for event in progress {
            let ServerEvent::Progress(p) = event else {
                unreachable!()
            };
            let grid: GridDto = p.best_grid.expect("grid update missing");
            assert_eq!((grid.width, grid.height), (6, 4));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn malformed_and_unknown_requests_keep_the_connection_open() {
        let (addr, _) = start(quick()).await;
        let mut client = Client::connect(addr).await;

        client.send_line("this is not json").await;
        match client.recv().await {
            ServerEvent::Error(e) => assert_eq!(e.kind, ErrorKind::MalformedRequest),
            other => panic!("unexpected {:?}", other),
        }

        client
            .send_line(r#"{"event":"optimize","data":{"ship":"sentinel","tech":"warp"}}"#)
            .await;
        match client.recv().await {
            ServerEvent::Error(e) => assert_eq!(e.kind, ErrorKind::UnknownShipOrTech),
            other => panic!("unexpected {:?}", other),
        }

        client
            .send_line(
                r#"{"event":"optimize","data":{"ship":"sentinel","tech":"infra","grid":{"width":4294967296,"height":4294967296,"cells":[]}}}"#,
            )
            .await;
        match client.recv().await {
            ServerEvent::Error(e) => assert_eq!(e.kind, ErrorKind::MalformedRequest),
            other => panic!("unexpected {:?}", other),
        }

        client
            .send_line(r#"{"event":"optimize","data":{"ship":"sentinel","tech":"infra"}}"#)
            .await;
        let (_, terminal) = client.until_terminal().await;
        assert!(matches!(terminal, ServerEvent::OptimizationResult(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn second_request_while_running_is_rejected_as_busy() {
        let (addr, state) = start(endless()).await;
        let mut client = Client::connect(addr).await;
        let request = r#"{"event":"optimize","data":{"ship":"sentinel","tech":"infra"}}"#;
        client.send_line(request).await;
        assert!(matches!(client.recv().await, ServerEvent::Progress(_)));

        client.send_line(request).await;
        loop {
            match client.recv().await {
                ServerEvent::Progress(_) => continue,
                ServerEvent::Error(e) => {
                    assert_eq!(e.kind, ErrorKind::Busy);
                    break;
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(state.active_jobs(), 1);

        drop(client);
        timeout(WAIT, async {
            while state.active_jobs() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn disconnect_cancels_the_running_job() {
        let (addr, state) = start(endless()).await;
        let mut client = Client::connect(addr).await;
        client
            .send_line(r#"{"event":"optimize","data":{"ship":"exosuit","tech":"jetpack"}}"#)
            .await;
        assert!(matches!(client.recv().await, ServerEvent::Progress(_)));
        assert_eq!(state.active_jobs(), 1);

        drop(client);

        timeout(WAIT, async {
            while state.active_jobs() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("job kept running after the client disconnected");
    }
}
