use std::fs;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

use parley::chat::agents::AgentBook;
use parley::chat::client::ChatClient;
use parley::chat::settings::{self, ParleySettings, ResolvedSettings};
use parley::chat::transcript::{AudioClip, Role};
use parley::chat::{history, usage};
use parley::gateway::{self, GatewayState};
use parley::providers::gemini::{self, GeminiProvider, DEFAULT_GEMINI_IMAGE_MODEL};
use parley::providers::qwen::{
    self, QwenProvider, DEFAULT_QWEN_TTS_MODEL, DEFAULT_QWEN_TTS_VOICE,
};
use parley::providers::create_provider;
use parley::ProviderKind;

#[derive(Parser)]
#[command(name = "parley", about = "Multi-provider AI chat and gateway")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Talk to a provider from the terminal
    Chat {
        /// Provider to use
        #[arg(short, long, value_enum)]
        provider: Option<ProviderKind>,
        /// Model name (vendor-specific)
        #[arg(short, long)]
        model: Option<String>,
        /// Agent persona to apply
        #[arg(short, long)]
        agent: Option<String>,
    },
    /// Run the provider gateway
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        #[arg(long, default_value_t = 8383)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to parley.log in current directory
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Ok(log_file) = File::create("parley.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    let file_settings = match settings::load_settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("warning: {e} - continuing with defaults");
            ParleySettings::default()
        }
    };

    match args.command.unwrap_or(Command::Chat {
        provider: None,
        model: None,
        agent: None,
    }) {
        Command::Serve { bind, port } => {
            let resolved = settings::resolve(&file_settings, None, None, None);
            let addr: SocketAddr = format!("{bind}:{port}")
                .parse()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            log::info!("Parley gateway starting on {}", addr);
            gateway::serve(addr, GatewayState::new(Arc::new(resolved))).await
        }
        Command::Chat {
            provider,
            model,
            agent,
        } => {
            let resolved = settings::resolve(
                &file_settings,
                provider,
                model.as_deref(),
                agent.as_deref(),
            );
            log::info!(
                "Parley chat starting with provider: {}",
                resolved.provider
            );
            run_chat(resolved).await
        }
    }
}

// ============================================================================
// Chat Loop
// ============================================================================

enum CommandOutcome {
    Continue,
    Quit,
}

async fn run_chat(settings: ResolvedSettings) -> io::Result<()> {
    let book = AgentBook::new(&settings.agents);
    let agent = book.resolve(&settings.agent).clone();

    let provider = match create_provider(settings.provider, &settings) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(());
        }
    };

    let mut client = ChatClient::new(provider, &settings, agent);
    let mut conversation_id: Option<String> = None;

    println!(
        "parley - {} / {} (agent: {}). Type :help for commands.",
        client.provider_name(),
        client.model,
        client.agent_name()
    );

    let stdin = io::stdin();
    loop {
        print!("you> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix(':') {
            match run_command(command, &mut client, &book, &settings, &mut conversation_id).await
            {
                CommandOutcome::Continue => continue,
                CommandOutcome::Quit => break,
            }
        }

        match client.send(line).await {
            Ok(reply) => {
                let provider_name = reply
                    .provider
                    .clone()
                    .unwrap_or_else(|| "assistant".to_string());
                let tokens = reply.usage.map(|u| u.total_tokens as u64).unwrap_or(0);
                println!("{}> {}", provider_name, reply.content);

                usage::record_use(&provider_name, &client.model, tokens);
            }
            Err(e) => eprintln!("error: {e}"),
        }

        history::autosave(
            &mut conversation_id,
            &client.conversation,
            client.provider_name(),
            &client.model,
        );
    }

    history::autosave(
        &mut conversation_id,
        &client.conversation,
        client.provider_name(),
        &client.model,
    );
    Ok(())
}

async fn run_command(
    command: &str,
    client: &mut ChatClient,
    book: &AgentBook,
    settings: &ResolvedSettings,
    conversation_id: &mut Option<String>,
) -> CommandOutcome {
    let (name, rest) = match command.split_once(' ') {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match name {
        "quit" | "q" => return CommandOutcome::Quit,
        "help" => {
            println!(":quit           leave");
            println!(":new            start a fresh conversation");
            println!(":agents         list personas");
            println!(":agent <name>   switch persona");
            println!(":history        list saved conversations");
            println!(":image <prompt> generate an image (Gemini)");
            println!(":say [text]     speak text, or the last reply (Qwen TTS)");
        }
        "new" => {
            history::autosave(
                conversation_id,
                &client.conversation,
                client.provider_name(),
                &client.model,
            );
            *conversation_id = None;
            client.reset();
            println!("new conversation started");
        }
        "agents" => {
            for entry in book.entries() {
                let marker = if entry.name == client.agent_name() { "*" } else { " " };
                match &entry.description {
                    Some(desc) => println!("{} {} - {}", marker, entry.name, desc),
                    None => println!("{} {}", marker, entry.name),
                }
            }
        }
        "agent" => {
            if rest.is_empty() {
                println!("current agent: {}", client.agent_name());
            } else {
                client.set_agent(book.resolve(rest).clone());
                println!("agent: {}", client.agent_name());
            }
        }
        "history" => match history::load_index() {
            Ok(index) => {
                for meta in &index.conversations {
                    println!(
                        "{}  {} ({} messages, {}/{})",
                        meta.id, meta.title, meta.message_count, meta.provider, meta.model
                    );
                }
            }
            Err(e) => eprintln!("error: {e}"),
        },
        "image" => {
            if rest.is_empty() {
                eprintln!("usage: :image <prompt>");
            } else {
                generate_image(rest, settings).await;
            }
        }
        "say" => {
            speak(rest, client, settings).await;
        }
        other => eprintln!("unknown command :{other} - try :help"),
    }
    CommandOutcome::Continue
}

// ============================================================================
// Media Commands
// ============================================================================

fn media_dir() -> io::Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?;
    let dir = home.join(".parley").join("media");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

async fn generate_image(prompt: &str, settings: &ResolvedSettings) {
    let key = match &settings.gemini.api_key {
        Some(key) => key.clone(),
        None => {
            eprintln!("error: missing API key for gemini");
            return;
        }
    };
    let provider = GeminiProvider::new(key, settings.gemini.base_url.clone())
        .with_timeout(settings.media_timeout());

    let raw = match provider
        .generate_image(prompt, DEFAULT_GEMINI_IMAGE_MODEL)
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("error: {e}");
            return;
        }
    };

    let image = match gemini::extract_image(&raw) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("error: {e}");
            return;
        }
    };

    let extension = match image.mime.as_str() {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "bin",
    };

    let result = media_dir().and_then(|dir| {
        let path = dir.join(format!("{}.{}", uuid::Uuid::new_v4(), extension));
        fs::write(&path, &image.bytes)?;
        Ok(path)
    });
    match result {
        Ok(path) => println!("image saved: {}", path.display()),
        Err(e) => eprintln!("error: failed to save image: {e}"),
    }
}

/// Speaks `text`, or the most recent assistant reply when `text` is empty.
/// The resulting clip is attached to that reply's transcript entry.
async fn speak(text: &str, client: &mut ChatClient, settings: &ResolvedSettings) {
    let key = match &settings.qwen.api_key {
        Some(key) => key.clone(),
        None => {
            eprintln!("error: missing API key for qwen");
            return;
        }
    };

    let spoken = if text.is_empty() {
        match client
            .conversation
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
        {
            Some(message) => message.content.clone(),
            None => {
                eprintln!("nothing to speak yet");
                return;
            }
        }
    } else {
        text.to_string()
    };

    let provider = QwenProvider::new(key, settings.qwen.base_url.clone())
        .with_timeout(settings.media_timeout());

    let raw = match provider
        .synthesize_speech(&spoken, DEFAULT_QWEN_TTS_MODEL, DEFAULT_QWEN_TTS_VOICE)
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("error: {e}");
            return;
        }
    };

    match qwen::extract_audio_url(&raw) {
        Ok(url) => {
            println!("audio: {url}");
            if text.is_empty() {
                if let Some(message) = client
                    .conversation
                    .messages
                    .iter_mut()
                    .rev()
                    .find(|m| m.role == Role::Assistant)
                {
                    message.audio = Some(AudioClip {
                        location: url,
                        mime: "audio/wav".to_string(),
                    });
                }
            }
        }
        Err(e) => eprintln!("error: {e}"),
    }
}
