use serde::{Deserialize, Deserializer, Serialize};

pub type TaskId = String;

/// Estado de una tarea de conversión tal como lo reporta el servidor.
///
/// El servidor usa los nombres de Celery en mayúsculas. Cualquier otro valor
/// ("STARTED", "RETRY", ...) se conserva en `Other` y se trata como no terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskState {
    #[default]
    Pending,
    Progress,
    Success,
    Failure,
    Other(String),
}

impl TaskState {
    /// `SUCCESS` y `FAILURE` cierran el ciclo de polling.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failure)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Progress => "PROGRESS",
            TaskState::Success => "SUCCESS",
            TaskState::Failure => "FAILURE",
            TaskState::Other(s) => s,
        }
    }
}

impl From<String> for TaskState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PENDING" => TaskState::Pending,
            "PROGRESS" => TaskState::Progress,
            "SUCCESS" => TaskState::Success,
            "FAILURE" => TaskState::Failure,
            _ => TaskState::Other(s),
        }
    }
}

impl From<TaskState> for String {
    fn from(state: TaskState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn status_or_pending<'de, D: Deserializer<'de>>(d: D) -> Result<TaskState, D::Error> {
    Ok(Option::<String>::deserialize(d)?
        .map(TaskState::from)
        .unwrap_or_default())
}

/// Respuesta de `GET /api/v1/tasks/{id}/status`.
///
/// Todos los campos son opcionales; los ausentes (o `null`) toman su valor
/// por defecto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    #[serde(default)]
    pub task_id: TaskId,
    /// Sin `status` (o `null`) la tarea se considera pendiente
    #[serde(default, deserialize_with = "status_or_pending")]
    pub status: TaskState,

    /// Porcentaje 0..100
    #[serde(default)]
    pub progress: Option<f64>,

    #[serde(default)]
    pub message: Option<String>,

    /// Hoja que se está procesando en este momento
    #[serde(default)]
    pub current_sheet: Option<String>,

    #[serde(default)]
    pub total_sheets: Option<u32>,

    /// Resultado crudo de la tarea (sólo presente al terminar)
    #[serde(default)]
    pub result: Option<serde_json::Value>,

    #[serde(default)]
    pub error: Option<String>,
}

impl TaskStatusResponse {
    /// Snapshot mínimo con sólo el estado; útil para construir respuestas.
    pub fn with_status(status: TaskState) -> Self {
        Self {
            task_id: TaskId::new(),
            status,
            progress: None,
            message: None,
            current_sheet: None,
            total_sheets: None,
            result: None,
            error: None,
        }
    }

    /// Progreso con el default de 0 cuando el servidor no lo manda.
    pub fn progress_percent(&self) -> f64 {
        self.progress.unwrap_or(0.0)
    }
}
