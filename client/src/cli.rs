use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use client::api::{ConvertOptions, ConverterClient};
use client::config::{converter_base_url, PollConfig};
use client::poller::ProgressPoller;
use client::progress::TerminalProgress;
use client::upload::{SelectedFile, UploadForm};
use common::OutputFormat;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "xlsmd")]
#[command(about = "Convierte libros de Excel a Markdown/JSON usando el servidor de conversión")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sube un .xls/.xlsx, sigue el progreso y muestra el resultado
    Convert {
        #[arg(value_name = "ARCHIVO")]
        file: PathBuf,

        /// No tratar la primera fila como encabezado
        #[arg(long)]
        no_headers: bool,

        #[arg(long, value_enum, default_value_t = FormatArg::Markdown)]
        format: FormatArg,

        /// Guarda el resultado en esta ruta al terminar
        #[arg(long, value_name = "RUTA")]
        download: Option<PathBuf>,

        #[command(flatten)]
        poll: PollArgs,
    },
    /// Consulta una vez el estado de una tarea
    Status {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
    /// Sigue una tarea existente hasta que termine
    Watch {
        #[arg(value_name = "TASK_ID")]
        id: String,

        #[command(flatten)]
        poll: PollArgs,
    },
    /// Muestra las hojas convertidas de una tarea
    Result {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
    /// Descarga el resultado de una tarea
    Download {
        #[arg(value_name = "TASK_ID")]
        id: String,

        #[arg(value_name = "RUTA")]
        dest: PathBuf,

        /// Archivo puntual dentro del resultado
        #[arg(long)]
        file: Option<String>,
    },
    /// Verifica que el servidor esté arriba
    Health,
}

#[derive(Args)]
struct PollArgs {
    /// Intervalo entre consultas (default: POLL_INTERVAL_MS o 1000)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Máximo de reintentos (default: POLL_MAX_RETRIES o 300)
    #[arg(long)]
    max_retries: Option<u32>,
}

impl PollArgs {
    fn config(&self) -> PollConfig {
        PollConfig::from_env().with_overrides(self.interval_ms, self.max_retries)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Markdown,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let api = ConverterClient::new(converter_base_url());

    match cli.command {
        Commands::Convert {
            file,
            no_headers,
            format,
            download,
            poll,
        } => {
            // el rechazo llega como error; el "alert" sólo queda en el log
            let mut form = UploadForm::new(|msg| debug!(aviso = %msg, "formulario"));
            form.handle_file(SelectedFile::from_path(&file)?)?;
            let to_send = form.submit()?;

            let options = ConvertOptions {
                use_headers: !no_headers,
                output_format: format.into(),
            };
            let created = api
                .convert(&to_send, options)
                .await
                .with_context(|| format!("no se pudo subir {}", to_send.name))?;

            println!("Tarea creada:");
            println!("  id: {}", created.task_id);
            println!("  estado: {}", created.status);
            if !created.message.is_empty() {
                println!("  mensaje: {}", created.message);
            }

            follow_task(&api, &created.task_id, poll.config()).await?;
            print_result(&api, &created.task_id).await?;

            if let Some(dest) = download {
                save_download(&api, &created.task_id, None, dest).await?;
            }
        }

        Commands::Status { id } => {
            let snap = api.task_status(&id).await?;
            println!("Tarea:");
            println!("  id: {}", id);
            println!("  estado: {}", snap.status);
            println!("  progreso: {:.0}%", snap.progress_percent());
            if let Some(ref msg) = snap.message {
                println!("  mensaje: {}", msg);
            }
            if let Some(ref sheet) = snap.current_sheet {
                println!("  hoja actual: {}", sheet);
            }
            if let Some(total) = snap.total_sheets {
                println!("  hojas: {}", total);
            }
            if let Some(ref err) = snap.error {
                println!("  error: {}", err);
            }
        }

        Commands::Watch { id, poll } => {
            follow_task(&api, &id, poll.config()).await?;
        }

        Commands::Result { id } => {
            print_result(&api, &id).await?;
        }

        Commands::Download { id, dest, file } => {
            save_download(&api, &id, file.as_deref(), dest).await?;
        }

        Commands::Health => {
            let health = api.health().await?;
            println!("servidor {}: {} (versión {})", api.base_url(), health.status, health.version);
        }
    }

    Ok(())
}

/// Sigue la tarea con la barra en la terminal. Sale con error en cualquier
/// estado terminal que no sea SUCCESS.
async fn follow_task(api: &ConverterClient, task_id: &str, config: PollConfig) -> Result<()> {
    let mut poller = ProgressPoller::new(task_id, config);
    let mut view = TerminalProgress::stderr();
    let mut location = None;

    let outcome = poller
        .run(api, &mut view, |path| location = Some(api.url(path)))
        .await;

    // la barra ya mostró el mensaje del error
    if let Err(err) = outcome {
        debug!(task_id, error = %err, "seguimiento terminado con error");
        bail!("la tarea {} no terminó", task_id);
    }
    view.finish();

    if let Some(url) = location {
        info!(task_id, url = %url, "resultado disponible");
        println!("Resultado: {}", url);
    }
    Ok(())
}

async fn print_result(api: &ConverterClient, task_id: &str) -> Result<()> {
    let result = api.task_result(task_id).await?;

    println!("Resultado de {} ({}):", result.original_filename, result.task_id);
    println!("  hojas: {}", result.total_sheets);
    if result.has_zip {
        println!("  zip disponible para descarga");
    }
    for sheet in &result.sheets {
        println!();
        println!(
            "== {} ({} filas x {} columnas)",
            sheet.sheet_name, sheet.row_count, sheet.column_count
        );
        println!("{}", sheet.content);
    }
    Ok(())
}

async fn save_download(
    api: &ConverterClient,
    task_id: &str,
    file: Option<&str>,
    dest: PathBuf,
) -> Result<()> {
    let written = api.download(task_id, file, &dest).await?;
    println!("Guardado {} ({} bytes)", dest.display(), written);
    Ok(())
}
