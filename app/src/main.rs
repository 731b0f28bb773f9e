mod theme;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tether_core::{
    telemetry, ChatMessage, ClientConfig, ConnectionStatusPublisher, ConversationStore,
    HttpRequestChannel, MessageRouter, NoticeKind, NoticeSink, RequestTransport, Role,
    SettingsStore, TransportManager, TransportPreference,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "Tether", version, about = "Terminal chat client")]
struct Cli {
    /// Persistent channel endpoint.
    #[arg(long)]
    ws_url: Option<String>,
    /// Base URL of the fallback API.
    #[arg(long)]
    api_url: Option<String>,
    /// Skip the persistent channel and use one-shot requests only.
    #[arg(long)]
    request_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_from_env()?;
    let cli = Cli::parse();

    let mut config = ClientConfig::default();
    if let Some(ws_url) = cli.ws_url {
        config.ws_url = ws_url;
    }
    if let Some(api_url) = cli.api_url {
        config.api_base_url = api_url;
    }
    config.validate()?;

    let settings_store = SettingsStore::load_default().await;
    if cli.request_only {
        let mut settings = settings_store.current();
        settings.transport_preference = TransportPreference::RequestOnly;
        settings_store.save(settings).await;
    }

    let conversation = ConversationStore::new();
    let notices = NoticeSink::new();
    let transport = TransportManager::new(&config);
    let request = Arc::new(HttpRequestChannel::new(config.api_base_url.clone()));
    let router = MessageRouter::new(
        transport.clone(),
        request.clone(),
        settings_store.clone(),
        conversation.clone(),
        notices.clone(),
    );

    let theme = theme::load_theme().await;
    println!("Tether ({} theme) — type /help for commands.", theme.label());

    spawn_conversation_view(conversation.clone());
    spawn_status_view(&transport);
    spawn_typing_view(&router);

    match settings_store.current().transport_preference {
        TransportPreference::Persistent => {
            transport.set_auto_reconnect(true);
            transport.connect();
        }
        TransportPreference::RequestOnly => {
            transport.set_auto_reconnect(false);
        }
    }

    repl(router, settings_store, notices, request).await
}

async fn repl(
    router: MessageRouter,
    settings_store: SettingsStore,
    notices: NoticeSink,
    request: Arc<HttpRequestChannel>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if let Some(command) = input.strip_prefix('/') {
            if !handle_command(command, &router, &settings_store, &request).await {
                break;
            }
        } else if router.send(input).await.is_err() {
            print_notices(&notices);
        }
    }
    Ok(())
}

/// Returns false when the REPL should exit.
async fn handle_command(
    command: &str,
    router: &MessageRouter,
    settings_store: &SettingsStore,
    request: &HttpRequestChannel,
) -> bool {
    let mut parts = command.splitn(2, ' ');
    let name = parts.next().unwrap_or_default();
    let argument = parts.next().unwrap_or_default().trim();

    match name {
        "quit" | "exit" => return false,
        "help" => print_help(),
        "settings" => {
            let settings = settings_store.current();
            println!(
                "temperature={} max_length={} transport={}",
                settings.temperature,
                settings.max_length,
                match settings.transport_preference {
                    TransportPreference::Persistent => "persistent",
                    TransportPreference::RequestOnly => "request-only",
                }
            );
        }
        "temperature" => match argument.parse::<f32>() {
            Ok(value) => {
                let mut settings = settings_store.current();
                settings.temperature = value;
                router.update_settings(settings).await;
            }
            Err(_) => println!("usage: /temperature <number>"),
        },
        "max-length" => match argument.parse::<u32>() {
            Ok(value) if value > 0 => {
                let mut settings = settings_store.current();
                settings.max_length = value;
                router.update_settings(settings).await;
            }
            _ => println!("usage: /max-length <positive integer>"),
        },
        "transport" => {
            let preference = match argument {
                "persistent" => Some(TransportPreference::Persistent),
                "request-only" => Some(TransportPreference::RequestOnly),
                _ => None,
            };
            match preference {
                Some(preference) => {
                    let mut settings = settings_store.current();
                    settings.transport_preference = preference;
                    router.update_settings(settings).await;
                }
                None => println!("usage: /transport <persistent|request-only>"),
            }
        }
        "theme" => match theme::ThemeMode::parse(argument) {
            Some(mode) => {
                theme::save_theme(mode).await;
                println!("theme set to {}", mode.label());
            }
            None => println!("usage: /theme <dark|light>"),
        },
        "reset" => {
            if router.reset().await.is_ok() {
                println!("conversation cleared");
            }
        }
        "health" => match request.health().await {
            Ok(health) => println!("backend: {} {}", health.status, health.message),
            Err(err) => println!("backend unreachable: {err}"),
        },
        _ => println!("unknown command: /{name} — try /help"),
    }
    true
}

fn print_help() {
    println!("  /settings                      show current settings");
    println!("  /temperature <number>          set sampling temperature");
    println!("  /max-length <n>                set maximum reply length");
    println!("  /transport <persistent|request-only>");
    println!("  /theme <dark|light>");
    println!("  /reset                         clear the conversation");
    println!("  /health                        probe the backend");
    println!("  /quit                          exit");
}

fn print_notices(notices: &NoticeSink) {
    for notice in notices.active() {
        match notice.kind {
            NoticeKind::Error => eprintln!("! {}", notice.message),
            NoticeKind::Success => println!("✓ {}", notice.message),
        }
    }
}

/// Print assistant replies as they are appended. The user's own lines are
/// already on screen, so only the assistant side is echoed.
fn spawn_conversation_view(conversation: ConversationStore) {
    let mut revision = conversation.subscribe();
    tokio::spawn(async move {
        let mut printed = conversation.len();
        while revision.changed().await.is_ok() {
            let messages = conversation.messages();
            if messages.len() < printed {
                // reset() shrank the log
                printed = messages.len();
                continue;
            }
            for message in &messages[printed..] {
                print_message(message);
            }
            printed = messages.len();
        }
    });
}

fn print_message(message: &ChatMessage) {
    if message.role == Role::Assistant {
        println!("assistant> {}", message.content);
    }
}

fn spawn_status_view(transport: &TransportManager) {
    let mut publisher = ConnectionStatusPublisher::new(transport);
    tokio::spawn(async move {
        while let Some((state, channel)) = publisher.changed().await {
            tracing::info!(?state, ?channel, "connection status changed");
            println!("· {:?} (using {:?})", state, channel);
        }
    });
}

fn spawn_typing_view(router: &MessageRouter) {
    let mut typing = router.subscribe_typing();
    tokio::spawn(async move {
        while typing.changed().await.is_ok() {
            if *typing.borrow() {
                println!("… assistant is typing");
            }
        }
    });
}
