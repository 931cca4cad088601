//! Data Lens AI command line tool.
//!
//! Drives the platform client from the terminal: sessions, projects and
//! blog moderation. Persisted session state lives under `~/.datalens`, so
//! a login survives across invocations.

mod config;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, Context};
use datalens_client::models::{BlogPostRequest, ProjectRequest};
use datalens_client::notify::Notifier;
use datalens_client::{ClientConfig, DataLensClient};

#[derive(Parser)]
#[command(name = "datalens")]
#[command(version, about = "Data Lens AI Command Line Tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Platform API base URL (overrides environment and config contexts)
    #[arg(long)]
    server_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account (requires email verification afterwards)
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Locale for account emails
        #[arg(long, default_value = "en")]
        locale: String,
    },
    /// Clear the stored session
    Logout,
    /// Show the current user
    Whoami,
    /// Confirm an email address with a verification token
    VerifyEmail {
        token: String,
    },
    /// Request a password reset email
    RequestPasswordReset {
        email: String,
    },
    /// Set a new password with a reset token
    ResetPassword {
        token: String,
        new_password: String,
    },
    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Manage blog content
    Blog {
        #[command(subcommand)]
        command: BlogCommands,
    },
    /// Manage named server contexts
    Context {
        #[command(subcommand)]
        command: ContextCommands,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// List projects (active only by default)
    List {
        /// Include archived projects
        #[arg(long)]
        all: bool,
    },
    /// Create a project
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Create the project as inactive
        #[arg(long)]
        inactive: bool,
    },
    /// Update a project
    Update {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Mark the project inactive
        #[arg(long)]
        inactive: bool,
    },
    /// Delete a project
    Delete {
        id: String,
    },
    /// Archive a project
    Archive {
        id: String,
    },
    /// Restore an archived project
    Restore {
        id: String,
    },
    /// Search projects by name
    Search {
        query: String,
    },
    /// Show aggregate project counts
    Stats,
    /// Count of your active projects
    Count,
    /// List Snowflake stages of a project
    Stages {
        id: String,
    },
    /// Select the project attached to subsequent requests
    Select {
        id: String,
    },
}

#[derive(Subcommand)]
enum BlogCommands {
    /// List published posts
    List {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
    },
    /// List your own posts
    Mine {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
    },
    /// List posts awaiting moderation (admin)
    Pending {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
    },
    /// Create a draft post
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        excerpt: Option<String>,
        /// Tags, can be repeated
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Delete a post
    Delete {
        id: String,
    },
    /// Submit a draft for approval
    Submit {
        id: String,
    },
    /// Approve a pending post (admin)
    Approve {
        id: String,
    },
    /// Reject a pending post (admin)
    Reject {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand)]
enum ContextCommands {
    /// Add a named server context
    Add {
        name: String,
        #[arg(long)]
        server_url: String,
    },
    /// Switch to a named context
    Use {
        name: String,
    },
    /// List configured contexts
    List,
}

/// Notifier that mirrors store events onto stderr, keeping stdout clean for
/// JSON output.
struct TermNotifier;

impl Notifier for TermNotifier {
    fn success(&self, message: &str) {
        eprintln!("{message}");
    }

    fn error(&self, message: &str) {
        eprintln!("error: {message}");
    }

    fn session_expired(&self) {
        eprintln!("Session expired. Run `datalens login` to continue.");
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Server URL precedence: flag > environment > selected context > default.
fn resolve_client_config(cli: &Cli, config: &Config) -> ClientConfig {
    let mut client_config = ClientConfig::from_env();
    if let Some(url) = &cli.server_url {
        client_config.base_url = url.clone();
    } else if std::env::var("DATALENS_API_URL").is_err() {
        if let Some((_, context)) = config.get_current_context() {
            client_config.base_url = context.server_url.clone();
        }
    }
    client_config
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,datalens_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    if let Commands::Context { command } = &cli.command {
        return run_context_command(command, &mut config);
    }

    let client_config = resolve_client_config(&cli, &config);
    tracing::debug!(base_url = %client_config.base_url, "resolved server URL");

    let client = DataLensClient::with_parts(
        &client_config,
        Arc::new(datalens_client::storage::FileStorage::new(
            &client_config.storage_dir,
        )),
        Arc::new(TermNotifier),
    );
    client.hydrate()?;

    match cli.command {
        Commands::Login { email, password } => {
            let user = client.session.login(&email, &password).await?;
            print_json(&user)?;
        }
        Commands::Register {
            email,
            password,
            locale,
        } => {
            client.session.register(&email, &password, &locale).await?;
        }
        Commands::Logout => {
            client.session.logout();
        }
        Commands::Whoami => {
            client.session.refresh_user().await?;
            match client.session.user() {
                Some(user) => print_json(&user)?,
                None => bail!("Not logged in. Run `datalens login` first."),
            }
        }
        Commands::VerifyEmail { token } => {
            client.session.verify_email(&token).await?;
        }
        Commands::RequestPasswordReset { email } => {
            client.session.request_password_reset(&email).await?;
        }
        Commands::ResetPassword {
            token,
            new_password,
        } => {
            client.session.reset_password(&token, &new_password).await?;
        }
        Commands::Project { command } => run_project_command(command, &client).await?,
        Commands::Blog { command } => run_blog_command(command, &client).await?,
        Commands::Context { .. } => unreachable!("handled before client construction"),
    }

    Ok(())
}

async fn run_project_command(command: ProjectCommands, client: &DataLensClient) -> Result<()> {
    match command {
        ProjectCommands::List { all } => {
            let projects = if all {
                client.projects.fetch_all().await?
            } else {
                client.projects.fetch_active().await?
            };
            print_json(&projects)?;
        }
        ProjectCommands::Create {
            name,
            description,
            inactive,
        } => {
            let project = client
                .projects
                .create(&ProjectRequest {
                    name,
                    description,
                    is_active: !inactive,
                })
                .await?;
            print_json(&project)?;
        }
        ProjectCommands::Update {
            id,
            name,
            description,
            inactive,
        } => {
            let project = client
                .projects
                .update(
                    &id,
                    &ProjectRequest {
                        name,
                        description,
                        is_active: !inactive,
                    },
                )
                .await?;
            print_json(&project)?;
        }
        ProjectCommands::Delete { id } => {
            client.projects.delete(&id).await?;
        }
        ProjectCommands::Archive { id } => {
            client.projects.archive(&id).await?;
        }
        ProjectCommands::Restore { id } => {
            client.projects.restore(&id).await?;
        }
        ProjectCommands::Search { query } => {
            let results = client.projects.search(&query).await?;
            print_json(&results)?;
        }
        ProjectCommands::Stats => {
            let stats = client.projects.fetch_stats().await?;
            println!("total:       {}", stats.total_projects);
            println!("active:      {}", stats.active_projects);
            println!("in progress: {}", stats.in_progress_projects);
            println!("completed:   {}", stats.completed_projects);
        }
        ProjectCommands::Count => {
            println!("{}", client.projects.active_count().await?);
        }
        ProjectCommands::Stages { id } => {
            let stages = client.projects.stages(&id).await?;
            print_json(&stages)?;
        }
        ProjectCommands::Select { id } => {
            let projects = client.projects.fetch_all().await?;
            match projects.into_iter().find(|p| p.id == id) {
                Some(project) => {
                    println!("Selected project {} ({})", project.name, project.id);
                    client.projects.set_current_project(Some(project));
                }
                None => bail!("No project with id {id}"),
            }
        }
    }
    Ok(())
}

async fn run_blog_command(command: BlogCommands, client: &DataLensClient) -> Result<()> {
    match command {
        BlogCommands::List { page, size } => {
            let listing = client.blog.fetch_published(page, size).await?;
            print_json(&listing.content)?;
        }
        BlogCommands::Mine { page, size } => {
            let listing = client.blog.fetch_mine(page, size).await?;
            print_json(&listing.content)?;
        }
        BlogCommands::Pending { page, size } => {
            let listing = client.blog.fetch_pending(page, size).await?;
            print_json(&listing.content)?;
        }
        BlogCommands::Create {
            title,
            content,
            excerpt,
            tags,
        } => {
            let post = client
                .blog
                .create(&BlogPostRequest {
                    title,
                    content,
                    excerpt,
                    tags,
                    featured_image_url: None,
                })
                .await?;
            print_json(&post)?;
        }
        BlogCommands::Delete { id } => {
            client.blog.delete(&id).await?;
        }
        BlogCommands::Submit { id } => {
            let post = client.blog.submit(&id).await?;
            print_json(&post)?;
        }
        BlogCommands::Approve { id } => {
            let post = client.blog.approve(&id).await?;
            print_json(&post)?;
        }
        BlogCommands::Reject { id, reason } => {
            let post = client.blog.reject(&id, reason.as_deref()).await?;
            print_json(&post)?;
        }
    }
    Ok(())
}

fn run_context_command(command: &ContextCommands, config: &mut Config) -> Result<()> {
    match command {
        ContextCommands::Add { name, server_url } => {
            config.contexts.insert(
                name.clone(),
                Context {
                    server_url: server_url.clone(),
                },
            );
            if config.current_context.is_none() {
                config.current_context = Some(name.clone());
            }
            config.save()?;
            println!("Added context {name}");
        }
        ContextCommands::Use { name } => {
            if !config.contexts.contains_key(name) {
                bail!("No context named {name}");
            }
            config.current_context = Some(name.clone());
            config.save()?;
            println!("Switched to context {name}");
        }
        ContextCommands::List => {
            let current = config.current_context.as_deref();
            for (name, context) in &config.contexts {
                let marker = if current == Some(name.as_str()) { "*" } else { " " };
                println!("{marker} {name}\t{}", context.server_url);
            }
        }
    }
    Ok(())
}
