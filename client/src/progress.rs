use common::TaskStatusResponse;
use indicatif::{ProgressBar, ProgressStyle};

/// Destino de las actualizaciones del poller (la "página" de progreso).
pub trait ProgressView {
    /// Vuelca un snapshot en la barra, el texto de estado y la línea de detalle.
    fn update_progress(&mut self, snapshot: &TaskStatusResponse);

    /// Oculta el estado en curso y muestra el panel de error. No tiene vuelta atrás.
    fn show_error(&mut self, message: &str);
}

/// Una vista ausente no hace nada: equivale a una página sin los elementos
/// de progreso.
impl<V: ProgressView> ProgressView for Option<V> {
    fn update_progress(&mut self, snapshot: &TaskStatusResponse) {
        if let Some(view) = self {
            view.update_progress(snapshot);
        }
    }

    fn show_error(&mut self, message: &str) {
        if let Some(view) = self {
            view.show_error(message);
        }
    }
}

impl<V: ProgressView + ?Sized> ProgressView for &mut V {
    fn update_progress(&mut self, snapshot: &TaskStatusResponse) {
        (**self).update_progress(snapshot);
    }

    fn show_error(&mut self, message: &str) {
        (**self).show_error(message);
    }
}

pub const INITIAL_STATUS_TEXT: &str = "Starting conversion...";

/// Estado visible del indicador de progreso.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressDisplay {
    /// Ancho de la barra, en porcentaje
    pub fill_percent: f64,
    pub status_text: String,
    pub detail_text: String,
    /// Bloque de progreso (barra + textos) visible
    pub status_visible: bool,
    pub error_visible: bool,
    pub error_text: String,
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self {
            fill_percent: 0.0,
            status_text: INITIAL_STATUS_TEXT.to_string(),
            detail_text: String::new(),
            status_visible: true,
            error_visible: false,
            error_text: String::new(),
        }
    }
}

impl ProgressDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

impl ProgressView for ProgressDisplay {
    fn update_progress(&mut self, snapshot: &TaskStatusResponse) {
        self.fill_percent = snapshot.progress_percent();

        if let Some(message) = non_empty(&snapshot.message) {
            self.status_text = message.to_string();
        }

        // hoja actual > cantidad de hojas > se deja lo que había
        if let Some(sheet) = non_empty(&snapshot.current_sheet) {
            self.detail_text = format!("Processing: {}", sheet);
        } else if let Some(total) = snapshot.total_sheets.filter(|n| *n > 0) {
            self.detail_text = format!("{} sheet(s) found", total);
        }
    }

    fn show_error(&mut self, message: &str) {
        self.status_visible = false;
        self.error_visible = true;
        self.error_text = message.to_string();
    }
}

const BAR_TEMPLATE: &str = "[{bar:30}] {pos:>3}% {msg}";

/// Barra de progreso en la terminal (stderr), montada sobre `indicatif`.
///
/// El estado visible sigue en [`ProgressDisplay`]; la barra sólo lo dibuja.
pub struct TerminalProgress {
    display: ProgressDisplay,
    bar: ProgressBar,
}

impl TerminalProgress {
    pub fn stderr() -> Self {
        Self::with_bar(ProgressBar::new(100))
    }

    /// Usa una barra ya creada (p. ej. `ProgressBar::hidden()`).
    pub fn with_bar(bar: ProgressBar) -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>.");
        bar.set_style(style);
        bar.set_length(100);

        let display = ProgressDisplay::new();
        bar.set_message(bar_message(&display));
        Self { display, bar }
    }

    pub fn display(&self) -> &ProgressDisplay {
        &self.display
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }

    /// Deja la barra completa en pantalla para que lo siguiente no la pise.
    pub fn finish(&mut self) {
        self.bar.finish();
    }
}

/// Posición de la barra: el porcentaje recortado a 0..100.
pub fn bar_position(display: &ProgressDisplay) -> u64 {
    display.fill_percent.clamp(0.0, 100.0).round() as u64
}

/// Texto junto a la barra: `Converting · Processing: Hoja1`
pub fn bar_message(display: &ProgressDisplay) -> String {
    if display.detail_text.is_empty() {
        display.status_text.clone()
    } else {
        format!("{} · {}", display.status_text, display.detail_text)
    }
}

impl ProgressView for TerminalProgress {
    fn update_progress(&mut self, snapshot: &TaskStatusResponse) {
        self.display.update_progress(snapshot);
        self.bar.set_position(bar_position(&self.display));
        self.bar.set_message(bar_message(&self.display));
    }

    fn show_error(&mut self, message: &str) {
        self.display.show_error(message);
        self.bar.abandon_with_message(format!("Error: {}", message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::TaskState;

    fn snapshot() -> TaskStatusResponse {
        TaskStatusResponse::with_status(TaskState::Progress)
    }

    #[test]
    fn progreso_ausente_pone_la_barra_en_cero() {
        let mut view = ProgressDisplay::new();
        view.fill_percent = 50.0;

        view.update_progress(&snapshot());

        assert_eq!(view.fill_percent, 0.0);
        assert_eq!(view.status_text, INITIAL_STATUS_TEXT);
        assert_eq!(view.detail_text, "");
    }

    #[test]
    fn mensaje_reemplaza_el_texto_de_estado() {
        let mut view = ProgressDisplay::new();
        let mut snap = snapshot();
        snap.progress = Some(40.0);
        snap.message = Some("Converting sheets".to_string());

        view.update_progress(&snap);

        assert_eq!(view.fill_percent, 40.0);
        assert_eq!(view.status_text, "Converting sheets");

        // sin mensaje no se toca el texto anterior
        view.update_progress(&snapshot());
        assert_eq!(view.status_text, "Converting sheets");
    }

    #[test]
    fn hoja_actual_gana_sobre_total_de_hojas() {
        let mut view = ProgressDisplay::new();
        let mut snap = snapshot();
        snap.current_sheet = Some("Ventas".to_string());
        snap.total_sheets = Some(4);

        view.update_progress(&snap);
        assert_eq!(view.detail_text, "Processing: Ventas");

        snap.current_sheet = None;
        view.update_progress(&snap);
        assert_eq!(view.detail_text, "4 sheet(s) found");
    }

    #[test]
    fn total_cero_deja_el_detalle_como_estaba() {
        let mut view = ProgressDisplay::new();
        view.detail_text = "Processing: Hoja1".to_string();
        let mut snap = snapshot();
        snap.total_sheets = Some(0);
        snap.current_sheet = Some(String::new());

        view.update_progress(&snap);

        assert_eq!(view.detail_text, "Processing: Hoja1");
    }

    #[test]
    fn show_error_oculta_estado_y_muestra_panel() {
        let mut view = ProgressDisplay::new();
        view.show_error("boom");

        assert!(!view.status_visible);
        assert!(view.error_visible);
        assert_eq!(view.error_text, "boom");
    }

    #[test]
    fn vista_ausente_no_hace_nada() {
        let mut view: Option<ProgressDisplay> = None;
        view.update_progress(&snapshot());
        view.show_error("x");
        assert!(view.is_none());
    }

    #[test]
    fn mensaje_de_la_barra_incluye_detalle() {
        let mut display = ProgressDisplay::new();
        display.status_text = "Converting".to_string();
        assert_eq!(bar_message(&display), "Converting");

        display.detail_text = "2 sheet(s) found".to_string();
        assert_eq!(bar_message(&display), "Converting · 2 sheet(s) found");
    }

    #[test]
    fn posicion_se_recorta_fuera_de_rango() {
        let mut display = ProgressDisplay::new();
        display.fill_percent = 250.0;
        assert_eq!(bar_position(&display), 100);
        display.fill_percent = -3.0;
        assert_eq!(bar_position(&display), 0);
        display.fill_percent = 42.4;
        assert_eq!(bar_position(&display), 42);
    }

    #[test]
    fn terminal_mueve_la_barra_con_cada_snapshot() {
        let mut term = TerminalProgress::with_bar(ProgressBar::hidden());
        let mut snap = snapshot();
        snap.progress = Some(60.0);
        snap.message = Some("Converting".to_string());
        snap.current_sheet = Some("Q2".to_string());

        term.update_progress(&snap);

        assert_eq!(term.bar().position(), 60);
        assert_eq!(term.bar().message(), "Converting · Processing: Q2");
        assert_eq!(term.display().fill_percent, 60.0);

        term.finish();
        assert!(term.bar().is_finished());
    }

    #[test]
    fn terminal_abandona_la_barra_en_error() {
        let mut term = TerminalProgress::with_bar(ProgressBar::hidden());

        term.show_error("Conversion failed");

        assert!(term.bar().is_finished());
        assert_eq!(term.bar().message(), "Error: Conversion failed");
        assert!(term.display().error_visible);
    }
}
