use docent::cli::{Cli, Commands, ConfigAction};
use docent::config::{expand_tilde, Config, ConfigValidator, Credentials};
use docent::error::{DocentError, Result};
use docent::pipeline::{ConfiguredPipelineFactory, SourceRef};
use docent::server::{ChatClient, ChatServer, SessionStatus};
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve { socket } => {
            let config = load_config(cli.config, cli.profile)?;
            block_on(cmd_serve(config, socket))?;
        }
        Commands::Chat { socket } => {
            let config = load_config(cli.config, cli.profile)?;
            block_on(cmd_chat(socket_path(&config, socket)))?;
        }
        Commands::Ask { question, socket } => {
            let config = load_config(cli.config, cli.profile)?;
            block_on(cmd_ask(socket_path(&config, socket), &question))?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "docent=debug" } else { "docent=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().map_err(|e| DocentError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;
    runtime.block_on(future)
}

fn socket_path(config: &Config, socket: Option<PathBuf>) -> PathBuf {
    expand_tilde(&socket.unwrap_or_else(|| config.server.socket_path.clone()))
}

async fn cmd_serve(config: Config, socket: Option<PathBuf>) -> Result<()> {
    let socket = socket_path(&config, socket);
    let credentials = Credentials::from_env(&config);
    tracing::debug!("Resolved credentials: {:?}", credentials);

    let query_timeout = config.query_timeout();
    let max_connections = config.server.max_connections;
    let factory = ConfiguredPipelineFactory::new(Arc::new(config), Arc::new(credentials));

    let mut server = ChatServer::new(socket, Arc::new(factory), max_connections, query_timeout);
    server.bind().await?;

    println!("✓ Docent is listening on {}", server.socket_path().display());
    println!("  Press Ctrl-C to stop");

    server.run_until_signal().await
}

async fn cmd_chat(socket: PathBuf) -> Result<()> {
    let mut client = ChatClient::connect(&socket).await?;
    match client.status() {
        SessionStatus::Ready { session_id } => {
            println!("✓ Session {} ready. Ask away; /exit or Ctrl-D quits.", session_id);
            println!("  Ctrl-C cancels a streaming answer; at the prompt it quits.");
        }
        SessionStatus::Failed { kind, message } => {
            eprintln!("⚠ Session failed to start ({:?}): {}", kind, message);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\n> ");
        flush_stdout();

        // Once ctrl_c() has been awaited the default SIGINT exit is gone,
        // so the prompt has to watch for it too
        let interrupt = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        let line = match next_input(&mut lines, interrupt).await? {
            Some(line) => line,
            None => {
                println!();
                break;
            }
        };

        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "/exit" || message == "/quit" {
            break;
        }

        let interrupt = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        match client.ask_until(message, print_token, interrupt).await {
            Ok(_) => {
                println!();
                print_sources(client.sources());
            }
            Err(DocentError::Cancelled) => println!("\n[cancelled]"),
            Err(e) => eprintln!("\n⚠ {}", e),
        }
    }

    client.end().await
}

/// Next input line, or `None` on end of input or when `interrupt` fires first
async fn next_input<R, I>(lines: &mut Lines<R>, interrupt: I) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = ()>,
{
    tokio::select! {
        line = lines.next_line() => line.map_err(|e| DocentError::Io {
            source: e,
            context: "Failed to read from stdin".to_string(),
        }),
        _ = interrupt => Ok(None),
    }
}

async fn cmd_ask(socket: PathBuf, question: &str) -> Result<()> {
    let mut client = ChatClient::connect(&socket).await?;
    if let SessionStatus::Failed { message, .. } = client.status() {
        return Err(DocentError::Server(format!("Session failed to start: {}", message)));
    }

    client.ask(question, print_token).await?;
    println!();

    client.end().await
}

fn print_token(token: &str) {
    print!("{}", token);
    flush_stdout();
}

fn print_sources(sources: &[SourceRef]) {
    if sources.is_empty() {
        return;
    }
    let listed: Vec<String> = sources
        .iter()
        .map(|s| format!("{} ({:.2})", s.file_name.as_deref().unwrap_or(&s.id), s.score))
        .collect();
    println!("  Sources: {}", listed.join(", "));
}

fn flush_stdout() {
    std::io::stdout().flush().ok();
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path, profile)?;
            let value = toml::Value::try_from(&config)?;

            let shown = match section {
                Some(section) => {
                    let table = value.get(&section).ok_or_else(|| {
                        DocentError::Config(format!("Unknown config section: {}", section))
                    })?;
                    let mut wrapper = toml::map::Map::new();
                    wrapper.insert(section, table.clone());
                    toml::to_string_pretty(&toml::Value::Table(wrapper))?
                }
                None => toml::to_string_pretty(&value)?,
            };

            println!("{}", shown);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let mut config = Config::load(&path)?;
            if let Some(profile) = profile {
                config.apply_profile(&profile)?;
                ConfigValidator::validate(&config)?;
            }

            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!(
                "  Providers: embedding={} llm={} rerank={}",
                config.embedding.provider, config.llm.provider, config.rerank.provider
            );

            let credentials = Credentials::from_env(&config);
            let checks = [
                (&config.embedding.provider, credentials.embedding_key(&config).err()),
                (&config.llm.provider, credentials.llm_key(&config).err()),
                (&config.rerank.provider, credentials.rerank_key(&config).err()),
            ];
            for (provider, missing) in checks {
                // Local models need no key
                if provider == "fastembed" {
                    continue;
                }
                if let Some(e) = missing {
                    println!("  ⚠ {}", e);
                }
            }
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| DocentError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("  Set GEMINI_API_KEY, GROQ_API_KEY and COHERE_API_KEY (or a .env file)");
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'docent config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}
