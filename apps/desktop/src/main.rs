use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use client_core::{
    credential::mask_credential, load_settings, CompletionClient, LocalAssetLoader, ResultView,
    SessionController, Settings, SqliteCredentialStore,
};
use shared::domain::{ScriptRecord, MODEL_CATALOG};
use storage::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dramabench", about = "Generate drama script continuations with LLMs")]
struct Cli {
    /// Chat-completions endpoint.
    #[arg(long)]
    api_url: Option<String>,
    /// Prompt template path or URL.
    #[arg(long)]
    template: Option<String>,
    /// Script dataset (JSON Lines) path or URL.
    #[arg(long)]
    dataset: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and store an OpenRouter API key.
    Login { key: String },
    /// Remove the stored API key.
    Logout,
    /// List the scripts in the dataset.
    List,
    /// Print one script's details and context.
    Show { index: usize },
    /// Generate a continuation for one script.
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// 1-based script number as printed by `list`.
    #[arg(long, conflicts_with = "random")]
    index: Option<usize>,
    #[arg(long)]
    random: bool,
    #[arg(long)]
    model: Option<String>,
    #[arg(long, value_enum, default_value_t = ViewArg::Generated)]
    view: ViewArg,
    /// Use this key for one run without storing it.
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ViewArg {
    Generated,
    GroundTruth,
    Compare,
}

impl From<ViewArg> for ResultView {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::Generated => ResultView::Generated,
            ViewArg::GroundTruth => ResultView::GroundTruth,
            ViewArg::Compare => ResultView::Comparison,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }
    if let Some(template) = cli.template {
        settings.template_location = template;
    }
    if let Some(dataset) = cli.dataset {
        settings.dataset_location = dataset;
    }

    let mut controller = build_controller(&settings).await?;
    match cli.command {
        Command::Login { key } => {
            controller.save_credential(&key).await?;
            let stored = controller.state().api_key().unwrap_or_default();
            println!("API key saved successfully! ({})", mask_credential(stored));
        }
        Command::Logout => {
            controller.clear_credential().await?;
            println!("API key cleared");
        }
        Command::List => {
            load_session(&mut controller).await?;
            for (position, script) in controller.state().scripts().iter().enumerate() {
                println!(
                    "{:>3}. {}  [{} lines, {}]",
                    position + 1,
                    script.label(),
                    script.stats.total_lines,
                    script.stats.split_type
                );
            }
        }
        Command::Show { index } => {
            load_session(&mut controller).await?;
            let script = select_by_number(&mut controller, index)?;
            print_script(&script);
        }
        Command::Generate(args) => generate(&mut controller, args).await?,
    }

    Ok(())
}

async fn build_controller(settings: &Settings) -> Result<SessionController> {
    let database_url = Storage::sqlite_url_for_data_dir(&settings.data_dir);
    let credentials = SqliteCredentialStore::open(&database_url)
        .await
        .with_context(|| format!("failed to open credential storage at {database_url}"))?;
    Ok(SessionController::new(
        settings.default_model.clone(),
        Arc::new(credentials),
        Arc::new(LocalAssetLoader::from_settings(settings)),
        Arc::new(CompletionClient::from_settings(settings)),
    ))
}

/// Restores the credential and assets; any load alert is fatal on the command line.
async fn load_session(controller: &mut SessionController) -> Result<()> {
    controller.startup().await;
    let alerts = controller.state_mut().take_alerts();
    if !alerts.is_empty() {
        bail!("{}", alerts.join("; "));
    }
    Ok(())
}

fn select_by_number(controller: &mut SessionController, number: usize) -> Result<ScriptRecord> {
    let available = controller.state().scripts().len();
    let selected = controller
        .state_mut()
        .select_script(number.checked_sub(1))
        .cloned();
    match selected {
        Some(script) => Ok(script),
        None => bail!("no script number {number} ({available} available)"),
    }
}

async fn generate(controller: &mut SessionController, args: GenerateArgs) -> Result<()> {
    load_session(controller).await?;
    if let Some(key) = args.api_key.as_deref() {
        controller.state_mut().apply_credential(key)?;
    }

    let script = match (args.index, args.random) {
        (Some(number), _) => select_by_number(controller, number)?,
        (None, true) => {
            let mut rng = rand::thread_rng();
            controller.state_mut().select_random_script(&mut rng);
            match controller.state().current_script() {
                Some(script) => script.clone(),
                None => bail!("dataset is empty"),
            }
        }
        (None, false) => bail!("choose a script with --index <N> or --random"),
    };

    let model = args
        .model
        .unwrap_or_else(|| controller.state().selected_model().to_string());
    if !MODEL_CATALOG.iter().any(|option| option.id == model) {
        tracing::warn!(%model, "model is not in the built-in catalog");
    }
    eprintln!(
        "{}: {} ({})",
        script.label(),
        client_core::session::GENERATING_STATUS,
        shared::domain::model_display_name(&model)
    );

    let generated = controller.generate(&model).await?;
    let state = controller.state_mut();
    state.show_view(args.view.into());
    match state.result_view() {
        ResultView::Generated => println!("{generated}"),
        ResultView::GroundTruth => println!("{}", script.continuation),
        ResultView::Comparison => {
            println!("=== Generated ({}) ===", state.model_display_name());
            println!("{generated}");
            println!();
            println!("=== Ground Truth ===");
            println!("{}", script.continuation);
        }
    }
    Ok(())
}

fn print_script(script: &ScriptRecord) {
    println!("{}", script.label());
    if !script.description.is_empty() {
        println!("{}", script.description);
    }
    let stats = &script.stats;
    println!(
        "lines: {} total, {} context, {} continuation | split ratio {:.2} ({})",
        stats.total_lines,
        stats.context_lines,
        stats.continuation_lines,
        stats.split_ratio,
        stats.split_type
    );
    println!();
    println!("{}", script.context);
}
