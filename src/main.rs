//! Roost - command-line front end for the Roost client core
#![allow(clippy::uninlined_format_args)]

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use roost::api::{HttpTransport, Transport};
use roost::auth::{EncryptedFileStore, SettingsStore};
use roost::{Account, AccountAction, AccountRegistry, Config, Event};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    // RUST_LOG wins over the configured filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match parse_args()? {
        Command::Auth { instance } => auth_flow(&config, &instance).await,
        Command::Instance => instance_cli(&config).await,
        Command::Timeline { name, limit } => timeline_cli(config, &name, limit).await,
        Command::Notifications => notifications_cli(&config).await,
        Command::Action { action, acct, text } => action_cli(&config, action, &acct, &text).await,
        Command::Stream { name } => stream_cli(&config, &name).await,
        Command::Accounts => list_accounts(&config),
        Command::Logout => logout(&config),
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            print_version();
            Ok(())
        }
    }
}

/// CLI commands
enum Command {
    Auth {
        instance: String,
    },
    Instance,
    Timeline {
        name: String,
        limit: Option<usize>,
    },
    Notifications,
    Action {
        action: AccountAction,
        acct: String,
        text: String,
    },
    Stream {
        name: String,
    },
    Accounts,
    Logout,
    Help,
    Version,
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();

    let Some(command) = args.get(1) else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),

        "auth" => {
            let instance = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Missing instance\nExample: roost auth mastodon.social"))?
                .clone();
            Ok(Command::Auth { instance })
        }

        "instance" => Ok(Command::Instance),

        "timeline" | "tl" => {
            let name = args
                .get(2)
                .filter(|a| !a.starts_with('-'))
                .cloned()
                .unwrap_or_else(|| "home".to_string());
            let limit = args
                .iter()
                .position(|a| a == "--limit" || a == "-l")
                .and_then(|i| args.get(i + 1))
                .and_then(|s| s.parse().ok());
            Ok(Command::Timeline { name, limit })
        }

        "notifications" | "notifs" => Ok(Command::Notifications),

        "stream" => Ok(Command::Stream {
            name: args.get(2).cloned().unwrap_or_else(|| "user".to_string()),
        }),

        "accounts" => Ok(Command::Accounts),
        "logout" => Ok(Command::Logout),

        other => {
            let action = AccountAction::from_name(other).ok_or_else(|| {
                anyhow::anyhow!("Unknown command: {other}\nRun 'roost --help' for usage")
            })?;
            let acct = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Missing account, e.g. roost {other} alice@example.social"))?
                .clone();
            let text = args.get(3..).map(|rest| rest.join(" ")).unwrap_or_default();
            Ok(Command::Action { action, acct, text })
        }
    }
}

fn print_help() {
    let config_path = Config::default_path()
        .map_or_else(|_| "Unknown".to_string(), |p| p.display().to_string());

    println!(
        r#"🪺 Roost - fediverse client core

USAGE:
    roost [COMMAND]

COMMANDS:
    auth <instance>                    Log in to an instance
      Example:
        roost auth mastodon.social

    instance                           Show the instance's capabilities
    timeline [name] [OPTIONS]          Show a timeline
      Names: home, public, local, bookmarks, favourites, tag/<tag>
      Options:
        -l, --limit <n>                Number of posts
    notifications                      Show recent notifications
    stream [name]                      Follow a stream (user, public, ...)

    follow <acct>                      Follow an account
    unfollow <acct>                    Unfollow
    block <acct> / unblock <acct>      Block or unblock
    mute <acct> / unmute <acct>        Mute or unmute
    feature <acct> / unfeature <acct>  Feature on your profile
    note <acct> [text]                 Set (or clear) your private note

    accounts                           List logged-in accounts
    logout                             Log out of the selected account

OPTIONS:
    -h, --help                         Show this help message
    -v, --version                      Show version information

CONFIG:
    {}

HOMEPAGE:
    {}
"#,
        config_path,
        roost::REPO_URL
    );
}

fn print_version() {
    println!("roost {}", roost::VERSION);
}

fn open_registry(config: &Config) -> Result<(AccountRegistry, Arc<dyn Transport>)> {
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::from_config(config)?);
    let store: Arc<dyn SettingsStore> = Arc::new(EncryptedFileStore::open_default()?);
    let registry = AccountRegistry::load(store, &transport, config)?;
    Ok((registry, transport))
}

async fn selected_account(registry: &AccountRegistry) -> Result<Account> {
    let account = registry
        .selected()
        .ok_or_else(|| anyhow::anyhow!("No account configured. Run: roost auth <instance>"))?;
    if !account.validate_token().await? {
        anyhow::bail!(
            "The token for {} was rejected. Run: roost auth {}",
            account.settings_group_name(),
            account.instance_host()
        );
    }
    Ok(account)
}

async fn auth_flow(config: &Config, instance: &str) -> Result<()> {
    let (registry, transport) = open_registry(config)?;
    let account = Account::with_config(instance, transport, config.clone())?;
    registry.add_account(&account);

    println!("🔐 Registering with {}...", account.instance_uri());
    if !account
        .register_application(&config.client_name, &config.website, &config.additional_scopes)
        .await?
    {
        anyhow::bail!("{} did not issue client credentials", account.instance_uri());
    }
    println!("✓ App registered");

    let auth_url = account.authorize_url()?;
    println!("\n📋 Open this URL in your browser:\n\n  {}\n", auth_url);

    if let Err(e) = open::that(auth_url.as_str()) {
        tracing::debug!("could not open a browser: {e}");
    }

    println!("Paste the authorization code here:");
    let mut code = String::new();
    std::io::stdin().read_line(&mut code)?;

    if !account.set_token(code.trim()).await? {
        anyhow::bail!("The server rejected the new token");
    }

    println!("\n✓ Logged in as @{}", account.settings_group_name());
    println!("✓ Account saved");
    Ok(())
}

async fn instance_cli(config: &Config) -> Result<()> {
    let (registry, _) = open_registry(config)?;
    let account = registry
        .selected()
        .ok_or_else(|| anyhow::anyhow!("No account configured. Run: roost auth <instance>"))?;

    account.fetch_instance_metadata().await;
    let caps = account.capabilities();

    println!("{} ({})", caps.instance_name, account.instance_uri());
    println!("{}", "─".repeat(60));
    println!("Version:            {}", caps.version);
    println!("Max post length:    {}", caps.max_post_length);
    println!("Chars per URL:      {}", caps.characters_reserved_per_url);
    println!("Max poll options:   {}", caps.max_poll_options);
    println!("Content types:      {}", caps.content_types.mime_types().join(", "));
    println!("Local visibility:   {}", caps.supports_local_visibility);
    println!("Registrations open: {}", caps.registrations_open);
    if !caps.registration_message.is_empty() {
        println!("\n{}", caps.registration_message);
    }
    println!("\n{} custom emojis", account.custom_emojis().len());
    Ok(())
}

async fn timeline_cli(mut config: Config, name: &str, limit: Option<usize>) -> Result<()> {
    if let Some(limit) = limit {
        config.timeline_limit = limit;
    }
    let (registry, _) = open_registry(&config)?;
    let account = selected_account(&registry).await?;

    println!("\n📰 {} (@{})", name, account.settings_group_name());
    println!("{}", "─".repeat(60));

    for post in account.fetch_timeline(name, None).await? {
        print_post(&post);
    }
    Ok(())
}

fn print_post(post: &roost::Post) {
    let when = post
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();

    match &post.repeat_identity {
        Some(booster) => println!("\n🔁 @{} boosted @{} · {}", booster.acct(), post.author_identity.acct(), when),
        None => println!("\n@{} · {}", post.author_identity.acct(), when),
    }
    if !post.subject.is_empty() {
        println!("CW: {}", post.subject);
    }
    println!("{}", post.plain_text());
    println!(
        "♥ {}  🔁 {}  💬 {}",
        post.favourites_count, post.reblogs_count, post.replies_count
    );
}

async fn notifications_cli(config: &Config) -> Result<()> {
    let (registry, _) = open_registry(config)?;
    let account = selected_account(&registry).await?;

    for notification in account.fetch_notifications(None).await? {
        if !config.notifications.allows(notification.kind) {
            continue;
        }
        let kind = notification.kind.as_server_str().unwrap_or("unknown");
        println!("[{kind}] @{}", notification.identity.acct());
        if let Some(post) = &notification.post {
            println!("    {}", post.plain_text());
        }
    }
    if account.has_follow_requests() {
        println!("\nYou have pending follow requests.");
    }
    Ok(())
}

async fn action_cli(config: &Config, action: AccountAction, acct: &str, text: &str) -> Result<()> {
    let (registry, _) = open_registry(config)?;
    let account = selected_account(&registry).await?;
    let identity = account
        .lookup_account(acct)
        .await
        .with_context(|| format!("Could not find {acct}"))?;

    let relationship = match action {
        AccountAction::Follow => account.follow_account(&identity, true, false).await?,
        AccountAction::Unfollow => account.unfollow_account(&identity).await?,
        AccountAction::Block => account.block_account(&identity).await?,
        AccountAction::Unblock => account.unblock_account(&identity).await?,
        AccountAction::Mute => account.mute_account(&identity, true, 0).await?,
        AccountAction::Unmute => account.unmute_account(&identity).await?,
        AccountAction::Feature => account.feature_account(&identity).await?,
        AccountAction::Unfeature => account.unfeature_account(&identity).await?,
        AccountAction::Note => account.add_note(&identity, text).await?,
    };

    println!("✓ {action} @{}", identity.acct());
    println!(
        "  following: {}  followed by: {}  muting: {}  blocking: {}  featured: {}",
        relationship.following,
        relationship.followed_by,
        relationship.muting,
        relationship.blocking,
        relationship.endorsed
    );
    Ok(())
}

async fn stream_cli(config: &Config, name: &str) -> Result<()> {
    let (registry, _) = open_registry(config)?;
    let account = selected_account(&registry).await?;
    let mut events = account.subscribe();

    let handle = account.stream(name)?;
    println!("📡 Streaming {name} (Ctrl-C to stop)");

    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::TimelineFetched { posts, .. } => posts.iter().for_each(print_post),
                Event::Notification(n) => println!("\n🔔 {:?} from @{}", n.kind, n.identity.acct()),
                Event::PostDeleted { id } => println!("\n🗑  {id} was deleted"),
                Event::LoggedOut => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        () = handle.join() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    printer.abort();
    Ok(())
}

fn list_accounts(config: &Config) -> Result<()> {
    let (registry, _) = open_registry(config)?;
    let accounts = registry.accounts();

    if accounts.is_empty() {
        println!("No accounts configured.");
        println!("\nAdd an account with:");
        println!("  roost auth <instance>");
        return Ok(());
    }

    println!("Configured accounts:\n");

    let selected = registry.selected();
    for account in accounts {
        let marker = if selected.as_ref().is_some_and(|s| s.ptr_eq(&account)) {
            " (selected)"
        } else {
            ""
        };
        println!("  @{}{}", account.settings_group_name(), marker);
    }
    Ok(())
}

fn logout(config: &Config) -> Result<()> {
    let (registry, _) = open_registry(config)?;
    let account = registry
        .selected()
        .ok_or_else(|| anyhow::anyhow!("No account configured"))?;

    account.logout()?;
    println!("✓ Logged out of {}", account.settings_group_name());
    Ok(())
}
