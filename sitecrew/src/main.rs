//! sitecrew: run a simulated web studio against a local or hosted model.
//!
//!   sitecrew create --project bakery "A site for a small bakery"
//!   sitecrew add-page --project bakery "An about page"
//!   sitecrew round --project bakery "QA, please test the menu page"
//!   sitecrew status --project bakery
//!   sitecrew history --project bakery
//!
//! Model settings come from `~/.config/sitecrew/config.toml` and flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use sitecrew::command::CommandRunner;
use sitecrew::config::{Config, Overrides, Resolved};
use sitecrew::executor::ActionExecutor;
use sitecrew::image_gen::{ComfyUi, ImageBackend, ImageGenerator};
use sitecrew::journal::Journal;
use sitecrew::llm::{LlmClient, Provider};
use sitecrew::roster::{Preset, Roster};
use sitecrew::scheduler::SchedulerPolicy;
use sitecrew::store::ProjectFileStore;
use sitecrew::studio::{self, Session, Workflow};

#[derive(Parser)]
#[command(name = "sitecrew", about = "A simulated web studio of model-backed agents")]
struct Cli {
    /// Config file (default: ~/.config/sitecrew/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model wire format
    #[arg(long, global = true, value_enum)]
    provider: Option<Provider>,

    /// Model service base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Model name
    #[arg(long, global = true)]
    model: Option<String>,

    /// API key for the model service
    #[arg(long, global = true, env = "SITECREW_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Directory holding the projects
    #[arg(long, global = true)]
    projects_dir: Option<PathBuf>,

    /// Team preset
    #[arg(long, global = true, value_enum)]
    roster: Option<Preset>,

    /// Skip the image service and always write placeholders
    #[arg(long, global = true)]
    no_images: bool,

    /// Let agents run allow-listed commands
    #[arg(long, global = true)]
    allow_commands: bool,

    /// Show which directive keys were detected in each reply
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Request {
    /// Project name
    #[arg(long, short)]
    project: String,

    /// What the client wants
    request: String,
}

#[derive(Args)]
struct ProjectArg {
    /// Project name
    #[arg(long, short)]
    project: String,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new website from a description
    Create(Request),
    /// Add a page to an existing website
    AddPage(Request),
    /// Improve an existing page
    Improve(Request),
    /// Generate images and work them into the site
    Images(Request),
    /// Add a custom feature
    Feature(Request),
    /// Run a single conversation round
    Round {
        #[command(flatten)]
        req: Request,
        /// Passes over the active agents
        #[arg(long)]
        exchanges: Option<usize>,
    },
    /// Show project files and sizes
    Status(ProjectArg),
    /// Show the journal of past rounds
    History(ProjectArg),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitecrew=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let overrides = Overrides {
        provider: cli.provider,
        base_url: cli.base_url.clone(),
        model: cli.model.clone(),
        api_key: cli.api_key.clone(),
        projects_dir: cli.projects_dir.clone(),
        roster: cli.roster,
        no_images: cli.no_images,
        allow_commands: cli.allow_commands,
        debug: cli.debug,
    };
    let settings = Resolved::merge(&overrides, &config);

    tokio::fs::create_dir_all(&settings.projects_dir)
        .await
        .with_context(|| format!("Can't create {}", settings.projects_dir.display()))?;
    let journal_path = settings.projects_dir.join("sitecrew.db");

    match cli.command {
        Command::Create(req) => run_workflow(&settings, Workflow::Create, req).await,
        Command::AddPage(req) => run_workflow(&settings, Workflow::AddPage, req).await,
        Command::Improve(req) => run_workflow(&settings, Workflow::Improve, req).await,
        Command::Images(req) => run_workflow(&settings, Workflow::Images, req).await,
        Command::Feature(req) => run_workflow(&settings, Workflow::Feature, req).await,
        Command::Round { req, exchanges } => {
            let mut session = open_session(&settings, &req.project).await?;
            if let Some(n) = exchanges {
                session = session.with_max_exchanges(n);
            }
            session.run_round(&req.request).await;
            session.show_status().await;
            Ok(())
        }
        Command::Status(p) => {
            let root = studio::project_root(&settings.projects_dir, &p.project);
            if !root.is_dir() {
                anyhow::bail!("No project at {}", root.display());
            }
            let store = ProjectFileStore::open(&root).await?;
            let structure = store.structure().await?;
            let mut console = sitecrew::output::Console::stdout();
            console.file_tree(&structure);
            Ok(())
        }
        Command::History(p) => {
            let journal = Journal::open(&journal_path)?;
            let project = studio::project_slug(&p.project);
            for entry in journal.history(&project)? {
                let preview: String = entry.value.chars().take(120).collect();
                let preview = preview.replace('\n', " ");
                println!("[{}] {:<6} {}: {preview}", entry.created_at, entry.kind, entry.key);
            }
            if let Some((state, phase)) = journal.load_state(&project)? {
                println!(
                    "phase: {phase} | satisfaction: {:.1} | pressure: {:.1} | bugs: {} | stuck: {}",
                    state.satisfaction_level,
                    state.deadline_pressure,
                    state.bugs_found,
                    state.stuck_count
                );
            }
            Ok(())
        }
    }
}

async fn run_workflow(settings: &Resolved, workflow: Workflow, req: Request) -> Result<()> {
    let mut session = open_session(settings, &req.project).await?;
    session.run_workflow(workflow, &req.request).await;
    Ok(())
}

async fn open_session(settings: &Resolved, project: &str) -> Result<Session> {
    let name = studio::project_slug(project);
    let root = studio::project_root(&settings.projects_dir, project);

    let llm = LlmClient::new(settings.provider, &settings.base_url)
        .with_model(&settings.model)
        .with_api_key(settings.api_key.clone())
        .with_sampling(settings.temperature, settings.max_tokens)
        .with_timeout(settings.model_timeout);

    let images = image_generator(settings).await;
    let commands = settings.commands_enabled.then(|| {
        CommandRunner::new(&root, settings.allowed_commands.clone(), settings.command_timeout)
    });

    let roster = Roster::from_specs(&settings.agents, settings.roster);
    let policy = SchedulerPolicy {
        max_active: settings.max_active,
        crisis_threshold: settings.crisis_threshold,
        mediator_threshold: settings.mediator_threshold,
        ..SchedulerPolicy::default()
    };
    let journal = Journal::open(&settings.projects_dir.join("sitecrew.db"))?;

    tracing::info!(
        project = %name,
        root = %root.display(),
        model = %llm.model(),
        agents = roster.len(),
        "Opening project"
    );

    let session = Session::open(
        &name,
        &root,
        roster,
        Box::new(llm),
        ActionExecutor::new(images, commands),
    )
    .await
    .with_context(|| format!("Can't open project {}", root.display()))?
    .with_policy(policy)
    .with_max_exchanges(settings.max_exchanges)
    .with_debug(settings.debug)
    .with_journal(journal)?;
    Ok(session)
}

async fn image_generator(settings: &Resolved) -> ImageGenerator {
    let size = (settings.image_width, settings.image_height);
    if !settings.images_enabled {
        return ImageGenerator::disabled().with_size(size.0, size.1);
    }
    let comfy = ComfyUi::new(&settings.comfyui_url)
        .with_timeout(settings.image_timeout)
        .with_size(size.0, size.1)
        .with_steps(settings.image_steps);
    let backend: Option<Box<dyn ImageBackend>> = if comfy.is_available().await {
        println!("✅ ComfyUI detected and ready");
        Some(Box::new(comfy))
    } else {
        println!("⚠️ ComfyUI not detected, will use placeholder images");
        None
    };
    ImageGenerator::new(backend).with_size(size.0, size.1)
}
