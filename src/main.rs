use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;

use sahayak::{
    Config, KdfParams, TerminalPresenter, WidgetConfig, ask_once, crypto, open_session,
    render::MarkdownHtml, seal_secret, transcript, unveil_credential,
};

#[derive(Parser)]
#[command(name = "sahayak", version, about = "Support chat client with a sealed API key")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    #[command(name = "chat")]
    Chat {
        /// Widget config path or URL (default from ~/.sahayak/config.toml)
        #[arg(long)]
        config: Option<String>,
        /// Write the session as HTML on exit
        #[arg(long)]
        transcript: Option<PathBuf>,
    },

    /// Send a single message and print the reply
    #[command(name = "ask")]
    Ask {
        message: String,
        #[arg(long)]
        config: Option<String>,
    },

    /// Seal an API key read from stdin for use in a widget config
    #[command(name = "encrypt")]
    Encrypt {
        #[arg(long)]
        password: String,
        /// Per-secret salt; also put it in the widget config as "salt"
        #[arg(long)]
        salt: Option<String>,
        #[arg(long, default_value_t = crypto::DEFAULT_ITERATIONS)]
        iterations: u32,
    },

    /// Check that the widget config's secret opens
    #[command(name = "decrypt")]
    Decrypt {
        #[arg(long)]
        config: Option<String>,
        /// Print the plaintext instead of its fingerprint
        #[arg(long)]
        reveal: bool,
    },

    /// View or modify settings (~/.sahayak/config.toml)
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current settings
    Show,
    /// Set a setting
    Set {
        /// endpoint, model, max_output_tokens, reasoning_effort, history_window, timeout_secs, widget_config
        key: String,
        value: String,
    },
    /// Reset settings to defaults
    Reset,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Chat { config, transcript } => {
            let settings = Config::load()?;
            let widget = WidgetConfig::load(config.as_deref().unwrap_or(&settings.widget_config))?;
            run_chat(&settings, &widget, transcript)?;
        }
        Commands::Ask { message, config } => {
            if message.trim().is_empty() {
                bail!("message must not be empty");
            }
            let settings = Config::load()?;
            let widget = WidgetConfig::load(config.as_deref().unwrap_or(&settings.widget_config))?;
            let mut session =
                open_session(&settings, &widget, TerminalPresenter::replies_only(std::io::stdout()))?;
            if !ask_once(&mut session, &message) {
                // fallback already shown; details are in the log
                drop(session);
                std::process::exit(1);
            }
        }
        Commands::Encrypt {
            password,
            salt,
            iterations,
        } => {
            let plain_text = read_stdin()?;
            let plain_text = plain_text.trim_end_matches(['\r', '\n']);
            if plain_text.is_empty() {
                bail!("nothing to encrypt on stdin");
            }
            let params = KdfParams::new(
                salt.as_deref().unwrap_or(crypto::LEGACY_SALT),
                iterations,
            );
            seal_secret(plain_text, &password, &params, std::io::stdout())?;
        }
        Commands::Decrypt { config, reveal } => {
            let settings = Config::load()?;
            let widget = WidgetConfig::load(config.as_deref().unwrap_or(&settings.widget_config))?;
            let credential = unveil_credential(&widget)?;
            if reveal {
                println!("{}", credential.expose());
            } else {
                println!("ok {}", credential.fingerprint());
            }
        }
        Commands::Config { action } => {
            handle_config(action)?;
        }
    }
    Ok(())
}

fn run_chat(settings: &Config, widget: &WidgetConfig, transcript_path: Option<PathBuf>) -> Result<()> {
    use dialoguer::{Input, Select, theme::ColorfulTheme};

    let theme = ColorfulTheme::default();
    let mut session = open_session(settings, widget, TerminalPresenter::new(std::io::stdout()))?;
    session.greet();

    if !widget.suggestions.is_empty() {
        println!("Suggestions (type /s to pick one):");
        for suggestion in &widget.suggestions {
            println!("  - {suggestion}");
        }
        println!();
    }

    loop {
        let line = match Input::<String>::with_theme(&theme)
            .with_prompt("आप")
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            // stdin closed
            Err(_) => break,
        };

        let message = match classify(&line) {
            ChatInput::Quit => break,
            ChatInput::Suggest if widget.suggestions.is_empty() => {
                println!("no suggestions configured");
                continue;
            }
            ChatInput::Suggest => {
                let picked = Select::with_theme(&theme)
                    .with_prompt("Suggestion")
                    .items(&widget.suggestions)
                    .default(0)
                    .interact_opt()?;
                match picked {
                    Some(idx) => widget.suggestions[idx].clone(),
                    None => continue,
                }
            }
            ChatInput::Send => line,
        };

        session.send(&message);
    }

    if let Some(path) = transcript_path {
        transcript::write_html(&path, session.organization(), session.history(), &MarkdownHtml)?;
        println!("transcript saved to {}", path.display());
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ChatInput {
    Quit,
    Suggest,
    Send,
}

fn classify(line: &str) -> ChatInput {
    match line.trim() {
        "/q" | "/quit" => ChatInput::Quit,
        "/s" => ChatInput::Suggest,
        _ => ChatInput::Send,
    }
}

fn handle_config(action: Option<ConfigAction>) -> Result<()> {
    match action {
        None | Some(ConfigAction::Show) => {
            let config = Config::load().unwrap_or_default();
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Some(ConfigAction::Set { key, value }) => {
            let mut config = Config::load().unwrap_or_default();
            config.set(&key, &value)?;
            let path = config.save()?;
            println!("saved to {}", path.display());
        }
        Some(ConfigAction::Reset) => {
            let config = Config::default();
            let path = config.save()?;
            println!("reset to defaults at {}", path.display());
        }
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
