//! Newline-delimited JSON frames of the job protocol.
//!
//! Every frame is one JSON object `{"event": <name>, "data": <payload>}` followed
//! by `\n`.

use modgrid::core::io::dto::GridDto;
use modgrid::engine::error::EngineError;
use modgrid::engine::progress::ProgressSnapshot;
use modgrid::workflows::optimize::{OptimizeRequest, OptimizeResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Optimize(OptimizePayload),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptimizePayload {
    pub ship: String,
    pub tech: String,
    #[serde(default)]
    pub player_owned_rewards: Vec<String>,
    /// Module ids the player has enabled for this tech.
    #[serde(default)]
    pub available_modules: Option<Vec<String>>,
    #[serde(default)]
    pub forced: bool,
    #[serde(default)]
    pub experimental_window_sizing: bool,
    #[serde(default)]
    pub grid: Option<GridDto>,
    /// Attach the best grid to every progress event.
    #[serde(default)]
    pub send_grid_updates: bool,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl OptimizePayload {
    /// Converts the wire payload into an engine request. Fails on a grid that
    /// does not describe a rectangle.
    pub fn into_request(self) -> Result<OptimizeRequest, EngineError> {
        let grid = self
            .grid
            .as_ref()
            .map(modgrid::core::models::grid::Grid::try_from)
            .transpose()?;
        Ok(OptimizeRequest {
            ship: self.ship,
            tech: self.tech,
            player_owned_rewards: self.player_owned_rewards,
            available_modules: self.available_modules,
            forced: self.forced,
            experimental_window_sizing: self.experimental_window_sizing,
            grid,
            seed: self.seed,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Progress(ProgressPayload),
    OptimizationResult(ResultPayload),
    Error(ErrorPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    pub progress_percent: f64,
    pub best_score: f64,
    pub temperature: f64,
    pub elapsed_seconds: f64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_grid: Option<GridDto>,
}

impl From<&ProgressSnapshot> for ProgressPayload {
    fn from(snapshot: &ProgressSnapshot) -> Self {
        Self {
            progress_percent: snapshot.percent(),
            best_score: snapshot.best_score,
            temperature: snapshot.temperature,
            elapsed_seconds: snapshot.elapsed.as_secs_f64(),
            status: "in_progress".to_string(),
            best_grid: snapshot.best_grid.as_ref().map(GridDto::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub grid: GridDto,
    pub score: f64,
    /// Score of the requested tech alone.
    pub max_bonus: f64,
    pub solve_method: String,
}

impl From<&OptimizeResult> for ResultPayload {
    fn from(result: &OptimizeResult) -> Self {
        Self {
            grid: GridDto::from(&result.grid),
            score: result.score,
            max_bonus: result.tech_score,
            solve_method: result.solve_method.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedRequest,
    UnknownShipOrTech,
    Busy,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classifies an engine failure. Returns `None` for cancellation, which is
    /// never reported to the client.
    pub fn from_engine(error: &EngineError) -> Option<Self> {
        let kind = match error {
            EngineError::Cancelled => return None,
            e if e.is_unknown_ship_or_tech() => ErrorKind::UnknownShipOrTech,
            e if e.is_request_error() => ErrorKind::MalformedRequest,
            _ => ErrorKind::Internal,
        };
        Some(Self::new(kind, error.to_string()))
    }
}

/// Parses one frame. Unknown events and invalid payloads are malformed requests.
pub fn decode_client(line: &str) -> Result<ClientEvent, ErrorPayload> {
    serde_json::from_str(line)
        .map_err(|e| ErrorPayload::new(ErrorKind::MalformedRequest, e.to_string()))
}

/// Serializes one frame, including the trailing newline.
pub fn encode_server(event: &ServerEvent) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modgrid::core::catalog::registry::CatalogError;
    use modgrid::core::models::grid::Grid;
    use modgrid::engine::annealing::{AnnealingStats, Termination};
    use std::time::Duration;

    #[test]
    fn decodes_minimal_optimize_event() {
        let line = r#"{"event":"optimize","data":{"ship":"sentinel","tech":"infra"}}"#;
        let event = decode_client(line).unwrap();
        let ClientEvent::Optimize(payload) = event;
        assert_eq!(payload.ship, "sentinel");
        assert_eq!(payload.tech, "infra");
        assert!(payload.player_owned_rewards.is_empty());
        assert!(!payload.forced);
        assert!(!payload.send_grid_updates);
        assert_eq!(payload.grid, None);
        assert_eq!(payload.seed, None);
    }

    #[test]
    fn unknown_event_and_bad_json_are_malformed() {
        for line in [
            r#"{"event":"teleport","data":{}}"#,
            r#"{"event":"optimize","data":{"tech":"infra"}}"#,
            "not json",
        ] {
            let err = decode_client(line).unwrap_err();
            assert_eq!(err.kind, ErrorKind::MalformedRequest, "line: {}", line);
        }
    }

    #[test]
    fn payload_with_grid_becomes_a_request() {
        let payload = OptimizePayload {
            ship: "sentinel".into(),
            tech: "infra".into(),
            grid: Some(GridDto::from(&Grid::new(2, 1).unwrap())),
            seed: Some(3),
            ..OptimizePayload::default()
        };
        let request = payload.into_request().unwrap();
        assert_eq!(request.grid.unwrap().width(), 2);
        assert_eq!(request.seed, Some(3));
    }

    #[test]
    fn available_modules_pass_through_to_the_request() {
        let line = r#"{"event":"optimize","data":{"ship":"sentinel","tech":"infra","available_modules":["IK","Xa"]}}"#;
        let event = decode_client(line).unwrap();
        let ClientEvent::Optimize(payload) = event;
        let request = payload.into_request().unwrap();
        assert_eq!(
            request.available_modules,
            Some(vec!["IK".to_string(), "Xa".to_string()])
        );

        let line = r#"{"event":"optimize","data":{"ship":"s","tech":"t"}}"#;
        let absent = decode_client(line).unwrap();
        let ClientEvent::Optimize(payload) = absent;
        assert_eq!(payload.into_request().unwrap().available_modules, None);
    }

    #[test]
    fn result_payload_reports_tech_score_as_max_bonus() {
        let result = OptimizeResult {
            grid: Grid::new(1, 1).unwrap(),
            score: 3.5,
            tech_score: 2.25,
            seed: 1,
            stats: AnnealingStats::default(),
            termination: Termination::Cooled,
            solve_method: "Simulated Annealing",
        };
        let event = ServerEvent::OptimizationResult(ResultPayload::from(&result));
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["event"], "optimization_result");
        assert_eq!(json["data"]["score"], 3.5);
        assert_eq!(json["data"]["max_bonus"], 2.25);
        assert_eq!(json["data"]["solve_method"], "Simulated Annealing");
    }

    #[test]
    fn oversized_grid_is_rejected_without_allocating() {
        let payload = OptimizePayload {
            ship: "sentinel".into(),
            tech: "infra".into(),
            grid: Some(GridDto {
                width: 1 << 32,
                height: 1 << 32,
                cells: Vec::new(),
            }),
            ..OptimizePayload::default()
        };
        let err = payload.into_request().unwrap_err();
        assert_eq!(
            ErrorPayload::from_engine(&err).unwrap().kind,
            ErrorKind::MalformedRequest
        );
    }

    #[test]
    fn ragged_grid_is_a_request_error() {
        let mut dto = GridDto::from(&Grid::new(2, 2).unwrap());
        dto.cells[1].pop();
        let payload = OptimizePayload {
            ship: "sentinel".into(),
            tech: "infra".into(),
            grid: Some(dto),
            ..OptimizePayload::default()
        };
        let err = payload.into_request().unwrap_err();
        assert_eq!(
            ErrorPayload::from_engine(&err).unwrap().kind,
            ErrorKind::MalformedRequest
        );
    }

    #[test]
    fn server_events_use_event_and_data_keys() {
        let line = encode_server(&ServerEvent::Error(ErrorPayload::new(
            ErrorKind::Busy,
            "a job is already running",
        )))
        .unwrap();
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["event"], "error");
        assert_eq!(value["data"]["kind"], "busy");
    }

    #[test]
    fn progress_payload_omits_grid_unless_present() {
        let snapshot = ProgressSnapshot {
            best_score: 1.5,
            progress: 0.5,
            temperature: 0.1,
            elapsed: Duration::from_millis(1500),
            best_grid: None,
        };
        let payload = ProgressPayload::from(&snapshot);
        assert_eq!(payload.progress_percent, 50.0);
        assert_eq!(payload.elapsed_seconds, 1.5);
        let json = serde_json::to_value(ServerEvent::Progress(payload)).unwrap();
        assert_eq!(json["event"], "progress");
        assert!(json["data"].get("best_grid").is_none());
    }

    #[test]
    fn engine_errors_map_to_kinds() {
        let unknown = EngineError::from(CatalogError::UnknownShip("ufo".into()));
        assert_eq!(
            ErrorPayload::from_engine(&unknown).unwrap().kind,
            ErrorKind::UnknownShipOrTech
        );
        assert_eq!(
            ErrorPayload::from_engine(&EngineError::MalformedRequest("x".into()))
                .unwrap()
                .kind,
            ErrorKind::MalformedRequest
        );
        assert_eq!(
            ErrorPayload::from_engine(&EngineError::Internal("x".into()))
                .unwrap()
                .kind,
            ErrorKind::Internal
        );
        assert!(ErrorPayload::from_engine(&EngineError::Cancelled).is_none());
    }
}
