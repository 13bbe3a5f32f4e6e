//! Formulario de subida: zona de drop, input de archivo oculto, botón de
//! quitar y botón de enviar.
//!
//! Es un modelo de estado puro; los gestos llegan como [`FormEvent`] y los
//! efectos que dependen del entorno (abrir el selector, cancelar la acción
//! por defecto) vuelven en un [`EventEffect`]. La alerta de archivo inválido
//! se entrega por el callback `notify`.

use std::fmt;
use std::path::{Path, PathBuf};

use common::{extension_of, is_allowed_file_name};
use tracing::{debug, info};

use crate::error::UploadError;

pub const DEFAULT_SUBMIT_LABEL: &str = "Convert";
pub const SUBMITTING_LABEL: &str = "Uploading...";

/// Archivo elegido por el usuario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub path: PathBuf,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Toma el nombre del último componente de la ruta.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| UploadError::MissingFileName(path.display().to_string()))?;
        Ok(Self::new(name, path))
    }

    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

/// Gestos del usuario sobre el formulario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    DropZoneClick,
    DragOver,
    DragLeave,
    Drop(Vec<SelectedFile>),
    FileInputChange(Vec<SelectedFile>),
    RemoveClick,
}

/// Efectos que el entorno tiene que aplicar después de un gesto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventEffect {
    /// Cancelar la acción por defecto (abrir el archivo arrastrado)
    pub prevent_default: bool,
    /// No propagar el gesto a los elementos contenedores
    pub stop_propagation: bool,
    pub open_file_browser: bool,
}

pub type Notify = Box<dyn FnMut(&str) + Send>;

pub struct UploadForm {
    /// false si la página no tiene zona de drop o input: todo es no-op
    bound: bool,
    selected: Option<SelectedFile>,
    drop_active: bool,
    submit_enabled: bool,
    submitting: bool,
    submit_label: String,
    notify: Notify,
}

impl fmt::Debug for UploadForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadForm")
            .field("bound", &self.bound)
            .field("selected", &self.selected)
            .field("drop_active", &self.drop_active)
            .field("submit_enabled", &self.submit_enabled)
            .field("submitting", &self.submitting)
            .field("submit_label", &self.submit_label)
            .finish_non_exhaustive()
    }
}

impl UploadForm {
    pub fn new(notify: impl FnMut(&str) + Send + 'static) -> Self {
        Self {
            bound: true,
            selected: None,
            drop_active: false,
            submit_enabled: false,
            submitting: false,
            submit_label: DEFAULT_SUBMIT_LABEL.to_string(),
            notify: Box::new(notify),
        }
    }

    /// Formulario sin sus elementos: ignora todos los gestos.
    pub fn unbound() -> Self {
        Self {
            bound: false,
            ..Self::new(|_| {})
        }
    }

    pub fn selected(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    /// Nombre que muestra el bloque "archivo seleccionado".
    pub fn file_name_text(&self) -> Option<&str> {
        self.selected.as_ref().map(|f| f.name.as_str())
    }

    /// `true` mientras se muestra el contenido "arrastrá o hacé click".
    pub fn is_empty_state(&self) -> bool {
        self.selected.is_none()
    }

    pub fn is_drop_active(&self) -> bool {
        self.drop_active
    }

    pub fn is_submit_enabled(&self) -> bool {
        self.submit_enabled
    }

    pub fn submit_label(&self) -> &str {
        &self.submit_label
    }

    /// Valida la extensión y, si pasa, deja el archivo como seleccionado.
    ///
    /// Si no pasa se avisa por `notify` y la selección anterior queda intacta.
    pub fn handle_file(&mut self, file: SelectedFile) -> Result<(), UploadError> {
        if !is_allowed_file_name(&file.name) {
            let err = UploadError::InvalidExtension {
                file_name: file.name,
            };
            (self.notify)(&err.to_string());
            return Err(err);
        }

        info!(file = %file.name, "archivo seleccionado");
        self.selected = Some(file);
        self.submit_enabled = true;
        Ok(())
    }

    pub fn clear_file(&mut self) {
        debug!("selección borrada");
        self.selected = None;
        self.submit_enabled = false;
    }

    pub fn dispatch(&mut self, event: FormEvent) -> EventEffect {
        if !self.bound {
            return EventEffect::default();
        }

        match event {
            FormEvent::DropZoneClick => EventEffect {
                open_file_browser: true,
                ..EventEffect::default()
            },
            FormEvent::DragOver => {
                self.drop_active = true;
                Self::suppressed()
            }
            FormEvent::DragLeave => {
                self.drop_active = false;
                Self::suppressed()
            }
            FormEvent::Drop(files) => {
                self.drop_active = false;
                self.take_first(files);
                Self::suppressed()
            }
            FormEvent::FileInputChange(files) => {
                self.take_first(files);
                EventEffect::default()
            }
            FormEvent::RemoveClick => {
                self.clear_file();
                // no debe llegar al click de la zona de drop
                EventEffect {
                    stop_propagation: true,
                    ..EventEffect::default()
                }
            }
        }
    }

    /// Envía el formulario: desactiva el botón y cambia su texto para evitar
    /// envíos duplicados. Devuelve el archivo a subir.
    pub fn submit(&mut self) -> Result<SelectedFile, UploadError> {
        if self.submitting {
            return Err(UploadError::SubmissionInProgress);
        }
        let file = match (&self.selected, self.submit_enabled) {
            (Some(file), true) => file.clone(),
            _ => return Err(UploadError::NoFileSelected),
        };

        self.submitting = true;
        self.submit_enabled = false;
        self.submit_label = SUBMITTING_LABEL.to_string();
        Ok(file)
    }

    fn take_first(&mut self, files: Vec<SelectedFile>) {
        if files.len() > 1 {
            debug!(count = files.len(), "varios archivos, se usa solo el primero");
        }
        if let Some(first) = files.into_iter().next() {
            // el error ya se notificó
            let _ = self.handle_file(first);
        }
    }

    fn suppressed() -> EventEffect {
        EventEffect {
            prevent_default: true,
            stop_propagation: true,
            open_file_browser: false,
        }
    }
}
