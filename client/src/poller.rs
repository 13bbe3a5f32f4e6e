//! Seguimiento de una tarea de conversión por polling.
//!
//! El poller consulta el estado de la tarea cada `interval`, vuelca cada
//! respuesta en un [`ProgressView`] y termina de una de tres formas:
//! - `SUCCESS`: navega a `/result/{id}` (una sola vez).
//! - `FAILURE`: muestra el error del servidor (o uno genérico).
//! - presupuesto de reintentos agotado: timeout o conexión perdida.
//!
//! Los fallos de transporte esperan el doble del intervalo, pero consumen el
//! mismo contador que los polls normales.

use std::future::Future;
use std::time::Duration;

use common::{TaskId, TaskState, TaskStatusResponse};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::error::{ApiError, PollError};
use crate::progress::ProgressView;

/// Texto cuando la tarea falla sin decir por qué.
pub const GENERIC_FAILURE_MESSAGE: &str = "Conversion failed";

/// Multiplicador del intervalo después de un fallo de transporte.
const TRANSPORT_BACKOFF_FACTOR: u32 = 2;

/// Fuente de snapshots de estado (en producción, el cliente HTTP).
pub trait StatusSource {
    fn fetch_status(
        &self,
        task_id: &str,
    ) -> impl Future<Output = Result<TaskStatusResponse, ApiError>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerState {
    Polling,
    Succeeded,
    Failed(PollError),
}

/// Qué hacer después de procesar un resultado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// Volver a consultar después de esta espera.
    Wait(Duration),
    /// La tarea terminó bien: ir a esta ubicación.
    Navigate(String),
    /// Estado terminal de error; el panel ya se mostró.
    Fail(PollError),
}

/// Poller de una única tarea. Vive lo que dura el seguimiento de esa tarea.
#[derive(Debug, Clone)]
pub struct ProgressPoller {
    task_id: TaskId,
    interval: Duration,
    max_retries: u32,
    retry_count: u32,
    state: PollerState,
}

impl ProgressPoller {
    pub fn new(task_id: impl Into<TaskId>, config: PollConfig) -> Self {
        Self {
            task_id: task_id.into(),
            interval: config.interval,
            max_retries: config.max_retries,
            retry_count: 0,
            state: PollerState::Polling,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn state(&self) -> &PollerState {
        &self.state
    }

    /// Ubicación a la que se navega cuando la tarea termina bien.
    pub fn result_location(&self) -> String {
        format!("/result/{}", self.task_id)
    }

    /// Procesa un snapshot recibido correctamente.
    pub fn on_status<V: ProgressView>(
        &mut self,
        snapshot: &TaskStatusResponse,
        view: &mut V,
    ) -> PollStep {
        if let Some(step) = self.terminal_step() {
            return step;
        }

        view.update_progress(snapshot);

        match &snapshot.status {
            TaskState::Success => {
                info!(task_id = %self.task_id, "tarea completada");
                self.state = PollerState::Succeeded;
                PollStep::Navigate(self.result_location())
            }
            TaskState::Failure => {
                let message = snapshot
                    .error
                    .as_deref()
                    .filter(|e| !e.is_empty())
                    .unwrap_or(GENERIC_FAILURE_MESSAGE);
                warn!(task_id = %self.task_id, error = %message, "la tarea falló");
                self.fail(PollError::TaskFailed(message.to_string()), view)
            }
            other => {
                debug!(
                    task_id = %self.task_id,
                    status = %other,
                    progress = snapshot.progress_percent(),
                    retry = self.retry_count,
                    "tarea en curso"
                );
                self.schedule(self.interval, PollError::TimedOut, view)
            }
        }
    }

    /// Procesa un fallo de red, un status no-2xx o un cuerpo ilegible.
    pub fn on_transport_error<V: ProgressView>(&mut self, err: &ApiError, view: &mut V) -> PollStep {
        if let Some(step) = self.terminal_step() {
            return step;
        }

        warn!(task_id = %self.task_id, error = %err, "error consultando el estado");
        self.schedule(
            self.interval * TRANSPORT_BACKOFF_FACTOR,
            PollError::ConnectionLost,
            view,
        )
    }

    /// Consulta hasta llegar a un estado terminal.
    ///
    /// Hay a lo sumo una consulta en vuelo: la siguiente sólo se programa
    /// después de procesar la anterior. Cancelar es simplemente soltar el future.
    pub async fn run<S, V, N>(
        &mut self,
        source: &S,
        view: &mut V,
        mut navigate: N,
    ) -> Result<(), PollError>
    where
        S: StatusSource,
        V: ProgressView,
        N: FnMut(&str),
    {
        match &self.state {
            PollerState::Succeeded => return Ok(()),
            PollerState::Failed(err) => return Err(err.clone()),
            PollerState::Polling => {}
        }

        info!(
            task_id = %self.task_id,
            interval_ms = self.interval.as_millis() as u64,
            max_retries = self.max_retries,
            "iniciando polling"
        );

        loop {
            let step = match source.fetch_status(&self.task_id).await {
                Ok(snapshot) => self.on_status(&snapshot, view),
                Err(err) => self.on_transport_error(&err, view),
            };

            match step {
                PollStep::Wait(delay) => sleep(delay).await,
                PollStep::Navigate(location) => {
                    navigate(&location);
                    return Ok(());
                }
                PollStep::Fail(err) => return Err(err),
            }
        }
    }

    /// Reintenta si queda presupuesto; si no, termina con `exhausted`.
    fn schedule<V: ProgressView>(
        &mut self,
        delay: Duration,
        exhausted: PollError,
        view: &mut V,
    ) -> PollStep {
        if self.retry_count < self.max_retries {
            self.retry_count += 1;
            PollStep::Wait(delay)
        } else {
            warn!(
                task_id = %self.task_id,
                retries = self.retry_count,
                "sin reintentos disponibles"
            );
            self.fail(exhausted, view)
        }
    }

    fn fail<V: ProgressView>(&mut self, err: PollError, view: &mut V) -> PollStep {
        view.show_error(&err.to_string());
        self.state = PollerState::Failed(err.clone());
        PollStep::Fail(err)
    }

    fn terminal_step(&self) -> Option<PollStep> {
        match &self.state {
            PollerState::Polling => None,
            PollerState::Succeeded => Some(PollStep::Navigate(self.result_location())),
            PollerState::Failed(err) => Some(PollStep::Fail(err.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressDisplay;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn status(state: TaskState) -> TaskStatusResponse {
        TaskStatusResponse::with_status(state)
    }

    fn down() -> ApiError {
        ApiError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: "down".to_string(),
        }
    }

    fn config(max_retries: u32) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1000),
            max_retries,
        }
    }

    #[derive(Clone)]
    enum Reply {
        Status(TaskStatusResponse),
        Down,
    }

    /// Fuente guionada: devuelve las respuestas en orden y repite la última.
    struct Scripted {
        replies: Mutex<VecDeque<Reply>>,
        last: Mutex<Option<Reply>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl Scripted {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                last: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn gaps(&self) -> Vec<Duration> {
            let calls = self.calls.lock().unwrap();
            calls.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    impl StatusSource for Scripted {
        async fn fetch_status(&self, _task_id: &str) -> Result<TaskStatusResponse, ApiError> {
            self.calls.lock().unwrap().push(Instant::now());
            let reply = {
                let mut replies = self.replies.lock().unwrap();
                let mut last = self.last.lock().unwrap();
                if let Some(next) = replies.pop_front() {
                    *last = Some(next);
                }
                last.clone().expect("script vacío")
            };
            match reply {
                Reply::Status(s) => Ok(s),
                Reply::Down => Err(down()),
            }
        }
    }

    /* ============
       PASO A PASO
       ============ */

    #[test]
    fn success_navega_a_la_pagina_de_resultado() {
        let mut poller = ProgressPoller::new("t1", config(300));
        let mut view = ProgressDisplay::new();
        let mut snap = status(TaskState::Success);
        snap.progress = Some(100.0);

        let step = poller.on_status(&snap, &mut view);

        assert_eq!(step, PollStep::Navigate("/result/t1".to_string()));
        assert_eq!(poller.state(), &PollerState::Succeeded);
        // la barra se actualiza antes de navegar
        assert_eq!(view.fill_percent, 100.0);
        assert!(!view.error_visible);
    }

    #[test]
    fn failure_muestra_el_error_del_servidor_tal_cual() {
        let mut poller = ProgressPoller::new("t1", config(300));
        let mut view = ProgressDisplay::new();
        let mut snap = status(TaskState::Failure);
        snap.error = Some("Sheet 'Q1' is corrupt".to_string());

        let step = poller.on_status(&snap, &mut view);

        let expected = PollError::TaskFailed("Sheet 'Q1' is corrupt".to_string());
        assert_eq!(step, PollStep::Fail(expected.clone()));
        assert_eq!(poller.state(), &PollerState::Failed(expected));
        assert!(view.error_visible);
        assert!(!view.status_visible);
        assert_eq!(view.error_text, "Sheet 'Q1' is corrupt");
    }

    #[test]
    fn failure_sin_error_usa_mensaje_generico() {
        for error in [None, Some(String::new())] {
            let mut poller = ProgressPoller::new("t1", config(300));
            let mut view = ProgressDisplay::new();
            let mut snap = status(TaskState::Failure);
            snap.error = error;

            poller.on_status(&snap, &mut view);

            assert_eq!(view.error_text, GENERIC_FAILURE_MESSAGE);
        }
    }

    #[test]
    fn no_terminal_espera_el_intervalo_normal() {
        let mut poller = ProgressPoller::new("t1", config(300));
        let mut view = ProgressDisplay::new();

        for state in [
            TaskState::Pending,
            TaskState::Progress,
            TaskState::Other("STARTED".to_string()),
        ] {
            let step = poller.on_status(&status(state), &mut view);
            assert_eq!(step, PollStep::Wait(Duration::from_millis(1000)));
        }
        assert_eq!(poller.retry_count(), 3);
        assert_eq!(poller.state(), &PollerState::Polling);
    }

    #[test]
    fn snapshot_sin_status_sigue_el_camino_normal() {
        let mut poller = ProgressPoller::new("t1", config(300));
        let mut view = ProgressDisplay::new();
        let snap: TaskStatusResponse =
            serde_json::from_str(r#"{"task_id":"t1","progress":40,"message":"Reading"}"#)
                .unwrap();

        let step = poller.on_status(&snap, &mut view);

        assert_eq!(step, PollStep::Wait(Duration::from_millis(1000)));
        assert_eq!(poller.retry_count(), 1);
        assert_eq!(view.fill_percent, 40.0);
        assert_eq!(view.status_text, "Reading");
    }

    #[test]
    fn fallo_de_transporte_espera_el_doble() {
        let mut poller = ProgressPoller::new("t1", config(300));
        let mut view = ProgressDisplay::new();

        let step = poller.on_transport_error(&down(), &mut view);

        assert_eq!(step, PollStep::Wait(Duration::from_millis(2000)));
        assert_eq!(poller.retry_count(), 1);
        assert!(!view.error_visible);
    }

    #[test]
    fn presupuesto_compartido_entre_fallos_y_polls_normales() {
        let mut poller = ProgressPoller::new("t1", config(2));
        let mut view = ProgressDisplay::new();

        poller.on_transport_error(&down(), &mut view);
        poller.on_status(&status(TaskState::Progress), &mut view);
        assert_eq!(poller.retry_count(), 2);

        let step = poller.on_status(&status(TaskState::Progress), &mut view);
        assert_eq!(step, PollStep::Fail(PollError::TimedOut));
        assert_eq!(view.error_text, "Conversion timed out. Please try again.");
    }

    #[test]
    fn ultimo_intento_fallido_es_conexion_perdida() {
        let mut poller = ProgressPoller::new("t1", config(1));
        let mut view = ProgressDisplay::new();

        poller.on_status(&status(TaskState::Progress), &mut view);
        let step = poller.on_transport_error(&down(), &mut view);

        assert_eq!(step, PollStep::Fail(PollError::ConnectionLost));
        assert_eq!(view.error_text, "Connection lost. Please refresh the page.");
    }

    #[test]
    fn estado_terminal_ignora_resultados_posteriores() {
        let mut poller = ProgressPoller::new("t1", config(300));
        let mut view = ProgressDisplay::new();
        poller.on_status(&status(TaskState::Success), &mut view);

        let mut late = status(TaskState::Progress);
        late.progress = Some(10.0);
        let step = poller.on_status(&late, &mut view);

        assert_eq!(step, PollStep::Navigate("/result/t1".to_string()));
        assert_eq!(view.fill_percent, 0.0);
        assert_eq!(poller.retry_count(), 0);
    }

    /* ============
       LOOP COMPLETO
       ============ */

    #[tokio::test(start_paused = true)]
    async fn run_navega_una_sola_vez_y_deja_de_consultar() {
        let source = Scripted::new(vec![
            Reply::Status(status(TaskState::Pending)),
            Reply::Status(status(TaskState::Progress)),
            Reply::Status(status(TaskState::Success)),
        ]);
        let mut poller = ProgressPoller::new("abc", config(300));
        let mut view = ProgressDisplay::new();
        let mut navigations = Vec::new();

        let outcome = poller
            .run(&source, &mut view, |loc| navigations.push(loc.to_string()))
            .await;

        assert_eq!(outcome, Ok(()));
        assert_eq!(navigations, vec!["/result/abc".to_string()]);
        assert_eq!(source.call_count(), 3);

        // correrlo de nuevo no vuelve a consultar ni a navegar
        let again = poller
            .run(&source, &mut view, |loc| navigations.push(loc.to_string()))
            .await;
        assert_eq!(again, Ok(()));
        assert_eq!(navigations.len(), 1);
        assert_eq!(source.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_respeta_los_tiempos_de_espera() {
        let source = Scripted::new(vec![
            Reply::Down,
            Reply::Status(status(TaskState::Progress)),
            Reply::Down,
            Reply::Status(status(TaskState::Success)),
        ]);
        let mut poller = ProgressPoller::new("abc", config(300));
        let mut view = ProgressDisplay::new();

        poller.run(&source, &mut view, |_| {}).await.unwrap();

        assert_eq!(
            source.gaps(),
            vec![
                Duration::from_millis(2000),
                Duration::from_millis(1000),
                Duration::from_millis(2000),
            ]
        );
        assert_eq!(poller.retry_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_termina_por_timeout_al_agotar_300_intentos() {
        let source = Scripted::new(vec![Reply::Status(status(TaskState::Progress))]);
        let mut poller = ProgressPoller::new("abc", PollConfig::default());
        let mut view = ProgressDisplay::new();
        let mut navigated = false;

        let started = Instant::now();
        let outcome = poller.run(&source, &mut view, |_| navigated = true).await;

        assert_eq!(outcome, Err(PollError::TimedOut));
        assert!(!navigated);
        assert_eq!(poller.retry_count(), 300);
        // 300 reintentos + la consulta inicial
        assert_eq!(source.call_count(), 301);
        assert_eq!(started.elapsed(), Duration::from_secs(300));
        assert!(view.error_visible);
    }

    #[tokio::test(start_paused = true)]
    async fn run_con_servidor_caido_termina_en_conexion_perdida() {
        let source = Scripted::new(vec![Reply::Down]);
        let mut poller = ProgressPoller::new("abc", config(5));
        let mut view = ProgressDisplay::new();

        let started = Instant::now();
        let outcome = poller.run(&source, &mut view, |_| {}).await;

        assert_eq!(outcome, Err(PollError::ConnectionLost));
        assert_eq!(source.call_count(), 6);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert_eq!(view.error_text, "Connection lost. Please refresh the page.");
    }

    #[tokio::test(start_paused = true)]
    async fn run_se_detiene_en_failure() {
        let mut failed = status(TaskState::Failure);
        failed.error = Some("bad workbook".to_string());
        let source = Scripted::new(vec![
            Reply::Status(status(TaskState::Progress)),
            Reply::Status(failed),
            Reply::Status(status(TaskState::Success)),
        ]);
        let mut poller = ProgressPoller::new("abc", config(300));
        let mut view = ProgressDisplay::new();

        let outcome = poller.run(&source, &mut view, |_| panic!("no debe navegar")).await;

        assert_eq!(
            outcome,
            Err(PollError::TaskFailed("bad workbook".to_string()))
        );
        assert_eq!(source.call_count(), 2);
    }
}
