use reqwest::StatusCode;
use thiserror::Error;

/// Errores hablando con el convertidor.
///
/// Para el poller cualquiera de estos cuenta como fallo de transporte.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("error HTTP: {0}")]
    Transport(#[from] reqwest::Error),

    /// Respuesta no-2xx; `detail` trae el texto del servidor si lo había.
    #[error("el servidor respondió {status}: {detail}")]
    Status { status: StatusCode, detail: String },

    #[error("respuesta inválida: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no se pudo leer {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errores del formulario de subida.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Invalid file type. Please upload an Excel file (.xls or .xlsx)")]
    InvalidExtension { file_name: String },

    #[error("no hay archivo seleccionado")]
    NoFileSelected,

    #[error("ya hay una subida en curso")]
    SubmissionInProgress,

    #[error("la ruta {0} no tiene nombre de archivo")]
    MissingFileName(String),
}

/// Motivo por el que el polling terminó sin éxito.
///
/// `Display` es el texto que ve el usuario en el panel de error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    /// La tarea terminó en `FAILURE`.
    #[error("{0}")]
    TaskFailed(String),

    /// Se agotaron los intentos con la tarea todavía en curso.
    #[error("Conversion timed out. Please try again.")]
    TimedOut,

    /// Se agotaron los intentos con el último poll fallando.
    #[error("Connection lost. Please refresh the page.")]
    ConnectionLost,
}
