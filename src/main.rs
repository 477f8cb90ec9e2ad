use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use gmail_triage::config::{API_BASE_ENV, CLIENT_ID_ENV, DISCOVERY_URL_ENV};

const DEFAULT_INBOX_SIZE: u32 = 12;

#[derive(Debug, Parser)]
#[command(name = "gmail-triage", version, about = "Gmail inbox triage client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output structured JSON
    #[arg(long, global = true)]
    json: bool,

    /// OAuth client id of the Google Cloud web client
    #[arg(long, global = true, env = CLIENT_ID_ENV, hide_env_values = true)]
    client_id: Option<String>,

    /// Gmail REST base URL
    #[arg(long, global = true, env = API_BASE_ENV)]
    api_base: Option<String>,

    /// OpenID discovery document of the identity provider
    #[arg(long, global = true, env = DISCOVERY_URL_ENV)]
    discovery_url: Option<String>,

    /// Print the consent URL instead of opening a browser
    #[arg(long, global = true, default_value_t = false)]
    no_browser: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the consent flow and report success
    Connect,
    /// List inbox messages with sender and subject
    Inbox {
        #[arg(long, default_value_t = DEFAULT_INBOX_SIZE)]
        max: u32,
    },
    /// Print the readable body of one message
    Read { id: String },
    /// Reply inside the thread of a message
    Reply(ReplyArgs),
    /// Interactive session keeping one token across commands
    Shell,
}

#[derive(Debug, Args)]
struct ReplyArgs {
    /// Gmail message id being answered
    id: String,
    #[arg(long, conflicts_with = "body_file", required_unless_present = "body_file")]
    body: Option<String>,
    #[arg(long)]
    body_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::dispatch(cli).await
}

mod commands {
    use std::sync::Arc;

    use anyhow::{Context, Result};
    use tokio::io::{AsyncBufReadExt, BufReader};

    use gmail_triage::config::GmailConfig;
    use gmail_triage::gmail::{GmailClient, LoopbackIdentityProvider, ReplyRequest, TokenSession};
    use gmail_triage::output::{self, OutputFormat};

    use super::{Cli, Commands, ReplyArgs, DEFAULT_INBOX_SIZE};

    pub(super) struct App {
        client: GmailClient,
        session: TokenSession,
        format: OutputFormat,
    }

    pub async fn dispatch(cli: Cli) -> Result<()> {
        let app = build_app(&cli)?;
        match cli.command {
            Commands::Connect => handle_connect(&app).await,
            Commands::Inbox { max } => handle_inbox(&app, max).await,
            Commands::Read { id } => handle_read(&app, &id).await,
            Commands::Reply(args) => handle_reply(&app, args).await,
            Commands::Shell => handle_shell(&app).await,
        }
    }

    pub(super) fn build_app(cli: &Cli) -> Result<App> {
        let mut config = GmailConfig::new(cli.client_id.clone().unwrap_or_default());
        if let Some(api_base) = &cli.api_base {
            config = config.with_api_base(api_base.as_str());
        }
        if let Some(discovery_url) = &cli.discovery_url {
            config.discovery_url = discovery_url.clone();
        }
        config.validate().context("resolve gmail configuration")?;

        let mut provider = LoopbackIdentityProvider::new(&config);
        if cli.no_browser {
            provider = provider.without_browser();
        }

        Ok(App {
            client: GmailClient::new(&config),
            session: TokenSession::new(config, Arc::new(provider)),
            format: OutputFormat::from_json_flag(cli.json),
        })
    }

    async fn handle_connect(app: &App) -> Result<()> {
        app.session.connect().await.context("connect to gmail")?;
        println!("Connected to Gmail.");
        Ok(())
    }

    async fn handle_inbox(app: &App, max: u32) -> Result<()> {
        let items = app
            .client
            .list_inbox(&app.session, max)
            .await
            .context("list gmail inbox")?;
        println!("{}", output::format_inbox(app.format, &items)?);
        Ok(())
    }

    async fn handle_read(app: &App, id: &str) -> Result<()> {
        let text = app
            .client
            .get_message_text(&app.session, id)
            .await
            .with_context(|| format!("read gmail message {id}"))?;
        println!("{}", output::format_message_text(app.format, id, &text)?);
        Ok(())
    }

    async fn handle_reply(app: &App, args: ReplyArgs) -> Result<()> {
        let body = match (args.body, args.body_file) {
            (Some(body), _) => body,
            (None, Some(path)) => tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("read reply body from {path}"))?,
            (None, None) => anyhow::bail!("reply needs --body or --body-file"),
        };
        reply_to(app, &args.id, body).await
    }

    async fn reply_to(app: &App, id: &str, body: String) -> Result<()> {
        let original = app
            .client
            .get_message_metadata(&app.session, id)
            .await
            .with_context(|| format!("load gmail message {id}"))?;
        let request = ReplyRequest::from_item(&original, body);
        let sent = app
            .client
            .send_reply(&app.session, &request)
            .await
            .with_context(|| format!("reply to gmail message {id}"))?;
        println!("{}", output::format_sent(app.format, &sent)?);
        Ok(())
    }

    async fn handle_shell(app: &App) -> Result<()> {
        eprintln!(
            "commands: inbox [max] | read <id> | reply <id> <text> | disconnect | status | quit"
        );
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await.context("read shell input")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
            let rest = rest.trim();
            let outcome = match command {
                "inbox" => {
                    let max = if rest.is_empty() {
                        DEFAULT_INBOX_SIZE
                    } else {
                        match rest.parse() {
                            Ok(max) => max,
                            Err(_) => {
                                eprintln!("max must be a number");
                                continue;
                            }
                        }
                    };
                    handle_inbox(app, max).await
                }
                "read" if !rest.is_empty() => handle_read(app, rest).await,
                "reply" => match rest.split_once(' ') {
                    Some((id, text)) => reply_to(app, id, text.to_string()).await,
                    None => {
                        eprintln!("usage: reply <id> <text>");
                        continue;
                    }
                },
                "disconnect" => {
                    app.session.disconnect();
                    println!("Disconnected.");
                    Ok(())
                }
                "status" => {
                    let state = if app.session.is_connected() {
                        "connected"
                    } else {
                        "not connected"
                    };
                    println!("{state}");
                    Ok(())
                }
                "quit" | "exit" => break,
                _ => {
                    eprintln!("unknown command: {line}");
                    continue;
                }
            };

            if let Err(error) = outcome {
                eprintln!("error: {error:#}");
            }
        }

        Ok(())
    }
}
