use async_trait::async_trait;
use clap::{Parser, Subcommand};
use lib::handler::RelayBot;
use lib::host::{Broadcaster, Replier};
use lib::inbound::InboundEvent;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "relaybot")]
#[command(about = "Messenger relay client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: RELAYBOT_CONFIG_PATH or ~/.relaybot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Relay a single message and print the reply, if any.
    Send {
        /// Config file path (default: RELAYBOT_CONFIG_PATH or ~/.relaybot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Room name the message came from
        #[arg(long, default_value = "console")]
        room: String,

        /// Sender name
        #[arg(long, default_value = "operator")]
        sender: String,

        /// Message text
        message: String,
    },

    /// Interactive console host: reads messages from stdin, prints replies,
    /// and runs the scheduled-message poll timer in the background.
    Run {
        /// Config file path (default: RELAYBOT_CONFIG_PATH or ~/.relaybot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Room name for entered messages
        #[arg(long, default_value = "console")]
        room: String,

        /// Sender name for entered messages
        #[arg(long, default_value = "operator")]
        sender: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("relaybot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Send {
            config,
            room,
            sender,
            message,
        }) => {
            if let Err(e) = run_send(config, room, sender, message).await {
                log::error!("send failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run {
            config,
            room,
            sender,
        }) => {
            if let Err(e) = run_console(config, room, sender).await {
                log::error!("run failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

/// Prints replies for the triggering message to stdout.
struct ConsoleReplier;

#[async_trait]
impl Replier for ConsoleReplier {
    async fn reply(&self, text: &str) -> Result<(), String> {
        println!("< {}", text);
        Ok(())
    }
}

/// Prints scheduled-message dispatches with their target room.
struct ConsoleBroadcaster;

#[async_trait]
impl Broadcaster for ConsoleBroadcaster {
    async fn send(&self, room: &str, text: &str) -> Result<(), String> {
        println!("[{}] {}", room, text);
        Ok(())
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let _dir = lib::init::init_config_dir(&path)?;
    println!(
        "initialized configuration at {}",
        path.parent()
            .unwrap_or(std::path::Path::new("."))
            .display()
    );
    Ok(())
}

async fn run_send(
    config_path: Option<std::path::PathBuf>,
    room: String,
    sender: String,
    message: String,
) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let bot = RelayBot::from_config(&config);
    let event = InboundEvent {
        room,
        sender,
        message,
        is_group_chat: false,
    };
    bot.handle(&event, &ConsoleReplier, &ConsoleBroadcaster).await;
    Ok(())
}

async fn run_console(
    config_path: Option<std::path::PathBuf>,
    room: String,
    sender: String,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, _) = lib::config::load_config(config_path)?;
    let bot = Arc::new(RelayBot::from_config(&config));

    let broadcaster: Arc<dyn Broadcaster> = Arc::new(ConsoleBroadcaster);
    let timer = bot.clone().start_poll_timer(broadcaster);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        let event = InboundEvent {
            room: room.clone(),
            sender: sender.clone(),
            message: input.to_string(),
            is_group_chat: false,
        };
        bot.handle(&event, &ConsoleReplier, &ConsoleBroadcaster).await;
    }

    bot.stop();
    timer.abort();
    Ok(())
}
