//! autopost - Link social network accounts and publish to their pages

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use libautopost::logging::LoggingConfig;
use libautopost::service::CreatePageInput;
use libautopost::{
    AccessToken, AutopostError, AutopostService, CallbackParams, Config, PostData, Result,
    SocialNetworkAccount, SocialNetworkPage,
};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "autopost")]
#[command(version)]
#[command(about = "Link social network accounts and publish to their pages")]
#[command(long_about = "\
autopost - Link social network accounts and publish to their pages

DESCRIPTION:
    autopost stores one account per social network (VK, OK, FB), runs the
    OAuth flow for it, keeps the pages it may publish to and posts to them.
    Results are printed to stdout as JSON, diagnostics go to stderr.

USAGE EXAMPLES:
    # Link a VK application
    autopost account add VK --credentials '{\"app_id\":\"51234\",\"secure_key\":\"...\"}'

    # Print the URL the account owner must open
    autopost auth-url VK

    # Complete the redirect the provider sent back
    autopost callback 'http://localhost:8080/auth/get_token?socialNetwork=VK&code=abc'

    # Store every page the account administers under a project
    autopost pages fetch VK --save --project blog

    # Publish
    autopost post VK --project blog \"Hello\" --url https://example.com

CONFIGURATION:
    Configuration file: ~/.config/autopost/config.toml
    Database location: ~/.local/share/autopost/autopost.db

    Override with environment variables:
        AUTOPOST_CONFIG      - Path to config file (defaults apply if it is missing)
        AUTOPOST_LOG_FORMAT  - text, json or pretty
        AUTOPOST_LOG_LEVEL   - tracing filter directive

EXIT CODES:
    0 - Success
    1 - Internal or provider error
    2 - Invalid command line
    3 - Validation failed
    4 - Already exists
    5 - Not found
    6 - Provider request cancelled
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file; must exist when given
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage linked accounts
    #[command(subcommand)]
    Account(AccountCommand),

    /// Print the provider authorization URL
    AuthUrl {
        /// Social network name (VK, OK, FB)
        network: String,

        /// Credentials JSON to use instead of the stored account
        #[arg(long)]
        credentials: Option<String>,
    },

    /// Complete an OAuth redirect and store the access token
    Callback {
        /// Full callback URL or its query string
        redirect: String,
    },

    /// Manage publishing targets
    #[command(subcommand)]
    Pages(PagesCommand),

    /// Publish a post to the page stored for a project
    Post(PostArgs),
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    /// Link an account; credentials are read from stdin when not given
    Add {
        network: String,

        #[arg(long)]
        credentials: Option<String>,
    },

    /// Show the account of a network
    Show { network: String },

    /// List accounts
    List {
        /// Restrict to these networks
        #[arg(short, long)]
        network: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum PagesCommand {
    /// List the pages the account administers on the provider
    Fetch {
        network: String,

        /// Store the listed pages
        #[arg(long, requires = "project")]
        save: bool,

        #[arg(short, long)]
        project: Option<String>,
    },

    /// Store a page by hand
    Add {
        network: String,

        #[arg(short, long)]
        project: String,

        /// Provider-side page id
        #[arg(long)]
        page_id: String,

        #[arg(long, default_value = "")]
        name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        image: Option<String>,

        /// Page access token
        #[arg(long)]
        token: Option<String>,
    },

    /// List stored pages
    List {
        #[arg(short, long)]
        network: Option<String>,

        #[arg(short, long)]
        project: Option<String>,
    },
}

#[derive(Args, Debug)]
struct PostArgs {
    network: String,

    #[arg(short, long)]
    project: String,

    /// Post text (reads from stdin if not provided)
    text: Option<String>,

    /// Link appended to the text
    #[arg(long, default_value = "")]
    url: String,

    #[arg(long, default_value = "")]
    image: String,

    /// Accept the post without sending it to the provider
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = LoggingConfig::from_env(cli.verbose).try_init() {
        eprintln!("Error: {}", e);
        std::process::exit(AutopostError::from(e).exit_code());
    }

    if let Err(e) = run(cli).await {
        tracing::debug!("Command failed: {:?}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let service = AutopostService::from_config(&config).await?;
    let networks = service.social_networks();

    match cli.command {
        Commands::Account(AccountCommand::Add {
            network,
            credentials,
        }) => {
            let credentials = match credentials {
                Some(credentials) => credentials,
                None => read_stdin("credentials")?,
            };
            let account = networks.create_account(&network, &credentials).await?;
            print_json(&account_json(&account))
        }
        Commands::Account(AccountCommand::Show { network }) => {
            let account = networks.get_account(&network).await?;
            print_json(&account_json(&account))
        }
        Commands::Account(AccountCommand::List { network }) => {
            let filter: Vec<&str> = network.iter().map(String::as_str).collect();
            let accounts = networks.find_accounts(&filter).await?;
            print_json(&serde_json::Value::Array(
                accounts.iter().map(account_json).collect(),
            ))
        }
        Commands::AuthUrl {
            network,
            credentials,
        } => {
            let url = match credentials {
                Some(credentials) => networks.auth_url(&network, &credentials)?,
                None => networks.account_auth_url(&network).await?,
            };
            print_json(&serde_json::json!({ "url": url }))
        }
        Commands::Callback { redirect } => {
            let params = parse_redirect(&redirect)?;
            let account = networks.handle_auth_callback(&params).await?;
            print_json(&account_json(&account))
        }
        Commands::Pages(PagesCommand::Fetch {
            network,
            save,
            project,
        }) => {
            let account = networks.get_account(&network).await?;
            match project.filter(|_| save) {
                Some(project) => {
                    let imported = networks.import_pages(&account, &project).await?;
                    print_json(&to_json(&imported)?)
                }
                None => {
                    let pages = networks.pages_from_social_network(&account).await?;
                    print_json(&to_json(&pages)?)
                }
            }
        }
        Commands::Pages(PagesCommand::Add {
            network,
            project,
            page_id,
            name,
            description,
            image,
            token,
        }) => {
            let account = networks.get_account(&network).await?;
            let access_token = token.map(|token| {
                AccessToken::issued(account.social_network, token, Utc::now())
            });

            let input = CreatePageInput {
                account_id: account.id,
                project,
                page_id,
                name,
                description,
                preview_image: image,
                access_token,
            };

            let (id, created) = match networks.create_page(input).await {
                Ok(id) => (id, true),
                Err(AutopostError::PageAlreadyExists { page_id, message }) => {
                    tracing::info!("{}", message);
                    (page_id, false)
                }
                Err(e) => return Err(e),
            };
            print_json(&serde_json::json!({ "id": id, "created": created }))
        }
        Commands::Pages(PagesCommand::List { network, project }) => {
            let account_id = match network {
                Some(network) => Some(networks.get_account(&network).await?.id),
                None => None,
            };
            let pages = networks.find_pages(account_id, project.as_deref()).await?;
            print_json(&serde_json::Value::Array(
                pages.iter().map(page_json).collect(),
            ))
        }
        Commands::Post(args) => {
            let text = match args.text {
                Some(text) => text,
                None => read_stdin("post text")?,
            };
            let post = PostData {
                text,
                image: args.image,
                url: args.url,
            };

            if args.dry_run {
                networks
                    .create_post(&args.network, &args.project, &post)
                    .await?;
                return print_json(&serde_json::json!({ "accepted": true }));
            }

            let published = networks
                .publish_post(&args.network, &args.project, post)
                .await?;
            print_json(&to_json(&published)?)
        }
    }
}

/// Account summary without the stored credentials
fn account_json(account: &SocialNetworkAccount) -> serde_json::Value {
    serde_json::json!({
        "id": account.id,
        "socialNetwork": account.social_network,
        "authorized": account.access_token.is_some(),
        "expiresIn": account
            .access_token
            .as_ref()
            .map(|token| token.expires_in.as_str())
            .unwrap_or_default(),
    })
}

/// Stored page without its access token
fn page_json(page: &SocialNetworkPage) -> serde_json::Value {
    serde_json::json!({
        "id": page.id,
        "accountId": page.account_id,
        "project": page.project,
        "pageId": page.page_id,
        "pageInfo": page.page_info,
        "authorized": page.access_token.is_some(),
    })
}

/// Accept a full callback URL, a `?query` or a bare query string
fn parse_redirect(raw: &str) -> Result<CallbackParams> {
    let raw = raw.trim();
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return CallbackParams::from_callback_url(raw).map_err(|e| {
            AutopostError::validation(e.to_string(), "redirect", "url")
        });
    }

    let params = CallbackParams::from_query(raw.trim_start_matches('?'));
    if params.is_empty() {
        return Err(AutopostError::validation(
            "callback carries no parameters",
            "redirect",
            "required",
        ));
    }
    Ok(params)
}

fn read_stdin(what: &str) -> Result<String> {
    if atty::is(atty::Stream::Stdin) {
        return Err(AutopostError::validation(
            format!("no {} given and stdin is a terminal", what),
            what,
            "required",
        ));
    }

    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| AutopostError::Internal(format!("failed to read stdin: {}", e)))?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Err(AutopostError::validation(
            format!("{} must not be empty", what),
            what,
            "required",
        ));
    }
    Ok(trimmed.to_string())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| AutopostError::Internal(format!("cannot encode output: {}", e)))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|e| AutopostError::Internal(format!("cannot encode output: {}", e)))?;
    println!("{}", output);
    Ok(())
}
