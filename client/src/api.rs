use std::path::Path;

use common::{
    ConversionResultResponse, ErrorDetail, HealthResponse, OutputFormat, TaskCreatedResponse,
    TaskStatusResponse,
};
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::poller::StatusSource;
use crate::upload::SelectedFile;

/// Cliente HTTP del convertidor.
#[derive(Debug, Clone)]
pub struct ConverterClient {
    http: Client,
    base_url: String,
}

/// Opciones del formulario de conversión.
#[derive(Debug, Clone, Copy)]
pub struct ConvertOptions {
    /// La primera fila es encabezado
    pub use_headers: bool,
    pub output_format: OutputFormat,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            use_headers: true,
            output_format: OutputFormat::Markdown,
        }
    }
}

impl ConverterClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL absoluta para una ruta del servidor (`/result/abc` -> `http://host/result/abc`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        let resp = self.http.get(self.url("/health")).send().await?;
        decode(resp).await
    }

    /// `GET /api/v1/tasks/{id}/status`
    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse, ApiError> {
        let url = self.url(&format!("/api/v1/tasks/{}/status", task_id));
        let resp = self.http.get(&url).send().await?;
        decode(resp).await
    }

    /// Sube el archivo por multipart a `/api/v1/convert` y devuelve el id de la tarea.
    pub async fn convert(
        &self,
        file: &SelectedFile,
        options: ConvertOptions,
    ) -> Result<TaskCreatedResponse, ApiError> {
        let bytes = tokio::fs::read(&file.path).await.map_err(|source| ApiError::Io {
            path: file.path.display().to_string(),
            source,
        })?;
        info!(file = %file.name, bytes = bytes.len(), "subiendo archivo");

        let part = multipart::Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(mime_for(&file.name))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("use_headers", options.use_headers.to_string())
            .text("output_format", options.output_format.as_str());

        let resp = self
            .http
            .post(self.url("/api/v1/convert"))
            .multipart(form)
            .send()
            .await?;
        let created: TaskCreatedResponse = decode(resp).await?;
        info!(task_id = %created.task_id, "tarea creada");
        Ok(created)
    }

    /// `GET /api/v1/tasks/{id}/result`
    pub async fn task_result(&self, task_id: &str) -> Result<ConversionResultResponse, ApiError> {
        let url = self.url(&format!("/api/v1/tasks/{}/result", task_id));
        let resp = self.http.get(&url).send().await?;
        decode(resp).await
    }

    /// Descarga el resultado (ZIP o archivo único, o `file` si se indica) a `dest`.
    /// Devuelve la cantidad de bytes escritos.
    pub async fn download(
        &self,
        task_id: &str,
        file: Option<&str>,
        dest: &Path,
    ) -> Result<u64, ApiError> {
        let url = self.url(&format!("/api/v1/tasks/{}/download", task_id));
        let mut req = self.http.get(&url);
        if let Some(name) = file {
            req = req.query(&[("file", name)]);
        }
        let resp = check_status(req.send().await?).await?;
        let bytes = resp.bytes().await?;

        tokio::fs::write(dest, &bytes).await.map_err(|source| ApiError::Io {
            path: dest.display().to_string(),
            source,
        })?;
        debug!(task_id, dest = %dest.display(), bytes = bytes.len(), "descarga completa");
        Ok(bytes.len() as u64)
    }
}

impl StatusSource for ConverterClient {
    async fn fetch_status(&self, task_id: &str) -> Result<TaskStatusResponse, ApiError> {
        self.task_status(task_id).await
    }
}

fn mime_for(file_name: &str) -> &'static str {
    match common::extension_of(file_name).as_deref() {
        Some(".xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some(".xls") => "application/vnd.ms-excel",
        _ => "application/octet-stream",
    }
}

/// Convierte respuestas no-2xx en `ApiError::Status`, con el `detail` del
/// servidor cuando viene en el cuerpo.
async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorDetail>(&body)
        .map(|e| e.detail)
        .unwrap_or(body);
    Err(ApiError::Status { status, detail })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let resp = check_status(resp).await?;
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
