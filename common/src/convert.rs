use serde::{Deserialize, Serialize};

use crate::status::TaskId;

/// Formato de salida que acepta `/api/v1/convert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
        }
    }
}

/// Respuesta al crear una tarea de conversión.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCreatedResponse {
    pub task_id: TaskId,
    #[serde(default = "default_created_status")]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

fn default_created_status() -> String {
    "pending".to_string()
}

/// Una hoja del libro ya convertida.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetResult {
    pub sheet_name: String,
    pub content: String,
    pub row_count: u64,
    pub column_count: u64,
}

/// Respuesta de `GET /api/v1/tasks/{id}/result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResultResponse {
    pub task_id: TaskId,
    pub status: String,
    pub original_filename: String,
    pub sheets: Vec<SheetResult>,
    pub total_sheets: u32,
    /// Si el servidor armó un ZIP con todas las hojas
    #[serde(default)]
    pub has_zip: bool,
}

/// Cuerpo de error de la API (`{"detail": "..."}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
