//! Cliente del convertidor de Excel: formulario de subida, seguimiento de la
//! tarea por polling y acceso HTTP a la API.

pub mod api;
pub mod config;
pub mod error;
pub mod poller;
pub mod progress;
pub mod upload;

pub use error::{ApiError, PollError, UploadError};
