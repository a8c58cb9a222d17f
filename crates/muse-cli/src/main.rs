use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use tracing::{info, warn};

use muse_application::loading::status_line;
use muse_application::{ControllerDeps, SessionController};
use muse_core::Track;
use muse_core::notice::{Notice, Notifier};
use muse_execution::LocalSandboxLauncher;
use muse_infrastructure::{
    ConfigService, DownloadService, FileAndUrlResolver, MusePaths, SamplesRepository,
    SecretStorage,
};
use muse_interaction::OpenAIApiBackend;

mod commands;
mod helper;
mod logging;
mod render;

use commands::{Command, HELP};
use helper::CliHelper;

#[derive(Parser)]
#[command(name = "muse")]
#[command(about = "MUSE - iterative image and 3D object generation", long_about = None)]
struct Cli {
    /// Config directory (defaults to ~/.config/muse)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Samples file (defaults to <config dir>/samples.json)
    #[arg(long)]
    samples: Option<PathBuf>,

    /// Also write logs to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ===== Configuration =====
    let paths = MusePaths::new(cli.config_dir.as_deref())?;
    paths
        .ensure_dirs()
        .with_context(|| format!("creating {}", paths.config_dir().display()))?;
    let _log_guard = logging::init(&paths.logs_dir(), cli.verbose)?;

    let config = ConfigService::new(&paths).load_or_init();
    let secret_storage = SecretStorage::with_path(paths.secret_file());
    if secret_storage.ensure_template()? {
        println!(
            "{}",
            format!(
                "Created {}. Add your API key there.",
                secret_storage.path().display()
            )
            .yellow()
        );
    }
    let secret = match secret_storage.load() {
        Ok(secret) => Some(secret),
        Err(e) => {
            warn!(error = %e, "Failed to load secret.json");
            None
        }
    };
    let backend = OpenAIApiBackend::from_secret(secret.as_ref(), &config)?;

    let downloads_dir = MusePaths::downloads_dir(config.downloads.directory.as_deref())?;

    // ===== Session wiring =====
    let (notifier, mut notices) = Notifier::channel();
    let deps = ControllerDeps {
        backend: Arc::new(backend),
        resolver: Arc::new(FileAndUrlResolver::new()),
        launcher: Arc::new(LocalSandboxLauncher::headless()),
        downloads: Arc::new(DownloadService::new(
            downloads_dir,
            Duration::from_millis(config.downloads.revoke_delay_ms),
        )),
        notifier: notifier.clone(),
    };
    let (controller, events) = SessionController::new(&config, deps);
    let controller = Arc::new(controller);
    let _pump = controller.spawn_event_pump(events);

    let printer = tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            render::notice(&notice);
        }
    });

    let samples_path = cli.samples.unwrap_or_else(|| paths.samples_file());
    match SamplesRepository::new(samples_path).load().await {
        Ok(samples) => controller.set_samples(samples).await,
        Err(e) => {
            warn!(error = %e, "Failed to load samples");
            notifier.notify(Notice::warning("Samples unavailable", e.to_string()));
        }
    }

    {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            // Failure is logged by the controller and keeps an empty catalog.
            let _ = controller.refresh_models().await;
        });
    }

    info!(config = %paths.config_dir().display(), "Muse started");

    // ===== REPL =====
    let mut rl = Editor::new()?;
    rl.set_helper(Some(CliHelper));

    println!("{}", "=== Muse ===".bright_magenta().bold());
    println!(
        "{}",
        "Type a prompt, '/help' for commands, or 'quit' to exit.".bright_black()
    );
    println!();

    let mut active = Track::Image;

    loop {
        let prompt = format!("{active}> ");
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                match trimmed.parse::<Command>() {
                    Ok(Command::Quit) => {
                        println!("{}", "Goodbye!".bright_green());
                        break;
                    }
                    Ok(command) => run(&controller, &mut active, command).await,
                    Err(message) => println!("{}", message.yellow()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    drop(notifier);
    drop(controller);
    printer.abort();
    Ok(())
}

/// Starts a submission in the background; the outcome arrives as a notice.
fn spawn_submit(controller: &Arc<SessionController>, track: Track, prompt: Option<String>) {
    println!("{}", status_line(track).bright_black());
    let controller = Arc::clone(controller);
    tokio::spawn(async move {
        let _ = match prompt {
            Some(prompt) => controller.submit(track, &prompt).await,
            None => controller.submit_draft(track).await,
        };
    });
}

fn report(result: muse_core::Result<()>) {
    if let Err(e) = result {
        render::notice(&Notice::from_error(&e));
    }
}

async fn run(controller: &Arc<SessionController>, active: &mut Track, command: Command) {
    match command {
        Command::Generate { track, prompt } => spawn_submit(controller, track, Some(prompt)),
        Command::Prompt(prompt) => spawn_submit(controller, *active, Some(prompt)),
        Command::SubmitDraft => spawn_submit(controller, *active, None),
        Command::SwitchTrack(track) => {
            *active = track;
            println!("{}", format!("Active track: {track}").bright_black());
        }
        Command::Delete { track, index } => {
            // Failures are already reported through the notifier.
            if controller.delete_from(track, index).await.is_ok() {
                render::history(&*controller.state().await, track);
            }
        }
        Command::History(track) => {
            render::history(&*controller.state().await, track.unwrap_or(*active))
        }
        Command::Url(url) => {
            controller.set_image_url(url).await;
            println!("{}", "Image reference set".bright_black());
        }
        Command::Upload(path) => {
            if !std::path::Path::new(&path).is_file() {
                println!("{}", format!("No such file: {path}").yellow());
                return;
            }
            controller.set_upload(path).await;
            println!("{}", "Image reference set".bright_black());
        }
        Command::ClearReference => {
            controller.clear_image_reference().await;
            println!("{}", "Image reference cleared".bright_black());
        }
        Command::ListSamples => render::samples(&controller.state().await.samples),
        Command::SelectSample(index) => match controller.select_sample(index).await {
            Ok(sample) => {
                *active = Track::Image;
                println!(
                    "{}",
                    format!(
                        "Loaded '{}'. Edit with /image or send as is with /submit.",
                        sample.title
                    )
                    .bright_black()
                );
                println!("  {}", sample.prompt.green());
            }
            Err(e) => render::notice(&Notice::from_error(&e)),
        },
        Command::ListModels => match controller.refresh_models().await {
            Ok(options) => {
                let state = controller.state().await;
                render::models(&options, state.image.model.as_deref());
            }
            Err(e) => render::notice(&Notice::danger("Models unavailable", e.to_string())),
        },
        Command::SelectModel(model) => {
            if let Some(id) = &model {
                if !controller.state().await.catalog.contains(id) {
                    println!("{}", format!("'{id}' is not in the model list").yellow());
                }
            }
            controller.set_image_model(model).await;
        }
        Command::Dimensions(dimensions) => {
            controller.set_dimensions(dimensions).await;
            println!(
                "{}",
                format!(
                    "Target size {} x {} x {}",
                    dimensions.x, dimensions.y, dimensions.z
                )
                .bright_black()
            );
        }
        Command::ResetCamera => report(controller.reset_camera().await),
        Command::ToggleAutoRotate => match controller.toggle_auto_rotate().await {
            Ok(on) => println!("Auto-rotate {}", if on { "on" } else { "off" }),
            Err(e) => render::notice(&Notice::from_error(&e)),
        },
        Command::ToggleWireframe => match controller.toggle_wireframe().await {
            Ok(on) => println!("Wireframe {}", if on { "on" } else { "off" }),
            Err(e) => render::notice(&Notice::from_error(&e)),
        },
        Command::Export => report(controller.export_obj().await),
        Command::Status => render::status(&*controller.state().await, *active),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}
