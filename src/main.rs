use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use accountdeck_lib::{auth, db, http, listing, migrate, AppState, Config};

#[derive(Debug, Parser)]
#[command(name = "accountdeck", about = "App launcher and account directory", version)]
struct Cli {
    /// SQLite database file. Overrides ACCOUNTDECK_DB.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP server (the default).
    Serve(ServeArgs),
    /// Apply pending schema migrations and exit.
    Migrate,
    /// Print the grouped listing as JSON.
    Listing {
        #[arg(long)]
        pretty: bool,
    },
    /// Manage login users.
    #[command(subcommand)]
    User(UserCommand),
}

#[derive(Debug, Default, clap::Args)]
struct ServeArgs {
    /// Address to listen on. Overrides ACCOUNTDECK_BIND.
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Require login for management endpoints.
    #[arg(long, conflicts_with = "no_login")]
    login: bool,
    /// Leave management endpoints open.
    #[arg(long)]
    no_login: bool,
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    /// Create a user, prompting for the password.
    Add {
        username: String,
        #[arg(long)]
        admin: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = Config::from_env().context("read configuration")?;
    if let Some(path) = cli.db {
        config.db_path = path;
    }
    let _log_guard = accountdeck_lib::init_logging(&config).context("initialize logging")?;
    tracing::debug!(target: "accountdeck", event = "cli_start", git = accountdeck_lib::GIT_HASH);

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => serve(config, args).await,
        Commands::Migrate => run_migrate(&config).await,
        Commands::Listing { pretty } => print_listing(&config, pretty).await,
        Commands::User(UserCommand::Add { username, admin }) => {
            add_user(&config, &username, admin).await
        }
    }
}

async fn serve(mut config: Config, args: ServeArgs) -> Result<i32> {
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if args.login {
        config.login_enabled = true;
    } else if args.no_login {
        config.login_enabled = false;
    }

    let pool = db::open_store(&config).await?;
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("bind {}", config.bind))?;
    let state = AppState::new(pool.clone(), config);
    http::serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    pool.close().await;
    Ok(0)
}

async fn run_migrate(config: &Config) -> Result<i32> {
    let pool = db::open_sqlite_pool(config).await?;
    let applied = migrate::apply_migrations(&pool).await;
    pool.close().await;
    let applied = applied.context("apply migrations")?;
    if applied.is_empty() {
        println!("Schema is up to date ({}).", config.db_path.display());
    } else {
        for file in &applied {
            println!("applied {file}");
        }
        println!(
            "{} migration(s) applied to {}.",
            applied.len(),
            config.db_path.display()
        );
    }
    Ok(0)
}

async fn print_listing(config: &Config, pretty: bool) -> Result<i32> {
    let pool = db::open_store(config).await?;
    let result = listing::grouped_listing(&pool).await;
    pool.close().await;
    let listing = result.context("build grouped listing")?;
    let rendered = if pretty {
        serde_json::to_string_pretty(&listing)
    } else {
        serde_json::to_string(&listing)
    }
    .context("serialize listing")?;
    println!("{rendered}");
    Ok(0)
}

async fn add_user(config: &Config, username: &str, admin: bool) -> Result<i32> {
    let username = username.trim();
    if username.is_empty() {
        bail!("username must not be empty");
    }

    let pool = db::open_store(config).await?;
    let result = async {
        if auth::find_user_by_username(&pool, username).await?.is_some() {
            bail!("user `{username}` already exists");
        }
        let password = prompt_new_password()?;
        let user =
            auth::create_user(&pool, username, &password, admin, config.password_iterations)
                .await?;
        Ok::<_, anyhow::Error>(user)
    }
    .await;
    pool.close().await;

    let user = result?;
    println!(
        "Created {} `{}` (id {}) at {}.",
        if user.is_admin { "admin" } else { "user" },
        user.username,
        user.id,
        accountdeck_lib::time::to_rfc3339(user.created_at)
    );
    Ok(0)
}

fn prompt_new_password() -> Result<String> {
    let first = rpassword::prompt_password("Password: ").context("read password")?;
    if first.is_empty() {
        bail!("password must not be empty");
    }
    let second = rpassword::prompt_password("Repeat password: ").context("read password")?;
    if first != second {
        bail!("passwords do not match");
    }
    Ok(first)
}
