use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use pathsense::config::config_file_path;
use pathsense::navigation::{
    Coordinate, GeocodingService, NominatimGeocoder, OsrmRouter, Route, RoutingService,
};
use pathsense::speech::{AudioPlayback, TextToSpeech};
use pathsense::vision::{
    FileFrameSource, FrameSource, NarrationContext, OpenAiVisionClient, VisionLanguageModelClient,
    VisionRequest, strip_digits,
};
use pathsense::{Config, Daemon};

/// Pathsense - walking navigation assistant
#[derive(Parser)]
#[command(name = "pathsense", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long, env = "PATHSENSE_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (default: ~/.config/pathsense/config.toml)
    #[arg(short, long, env = "PATHSENSE_CONFIG")]
    config: Option<PathBuf>,

    /// Disable audio output (speech goes to the console)
    #[arg(long, env = "PATHSENSE_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Starting walking navigation to the central library.")]
        text: String,
    },
    /// Describe a photo the way a capture would
    Describe {
        /// JPEG image
        image: PathBuf,
        /// Destination being navigated to
        #[arg(long)]
        destination: Option<String>,
        /// Current instruction (requires --destination)
        #[arg(long, requires = "destination")]
        instruction: Option<String>,
        /// Road or place label
        #[arg(long)]
        location: Option<String>,
    },
    /// Print the walking route from a position to a destination
    Route {
        /// Start latitude
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        /// Start longitude
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
        /// Destination address or place name
        destination: String,
    },
    /// Print the config file location
    ConfigPath,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,pathsense=info",
        1 => "info,pathsense=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref(), cli.disable_voice)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&config, text).await,
            Command::Describe {
                image,
                destination,
                instruction,
                location,
            } => describe(&config, &image, destination, instruction, location).await,
            Command::Route {
                latitude,
                longitude,
                destination,
            } => route(&config, Coordinate::new(latitude, longitude), &destination).await,
            Command::ConfigPath => {
                config_path(cli.config.as_deref());
                Ok(())
            }
        };
    }

    tracing::info!(
        port = config.server.port,
        disable_voice = cli.disable_voice,
        "starting pathsense"
    );
    tracing::debug!(?config, "loaded configuration");

    Daemon::new(config).run().await?;
    Ok(())
}

fn openai_key(config: &Config) -> anyhow::Result<SecretString> {
    config
        .api_keys
        .openai
        .clone()
        .map(SecretString::from)
        .context("OPENAI_API_KEY is not set")
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;
    tokio::task::spawn_blocking(move || playback.play_tone(440.0, Duration::from_secs(2)))
        .await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test TTS output
async fn test_tts(config: &Config, text: String) -> anyhow::Result<()> {
    let tts = TextToSpeech::new(
        openai_key(config)?,
        config.speech.tts_voice.clone(),
        config.speech.tts_speed,
        config.speech.tts_model.clone(),
    )?;
    let playback = AudioPlayback::new()?;

    println!("Synthesizing: \"{text}\"");
    let audio = tts.synthesize(&text).await?;
    println!("Got {} bytes of audio, playing...", audio.len());

    tokio::task::spawn_blocking(move || playback.play_mp3(&audio, &AtomicBool::new(false)))
        .await??;

    println!("Done!");
    Ok(())
}

/// One-shot scene description of an image file
async fn describe(
    config: &Config,
    image: &Path,
    destination: Option<String>,
    instruction: Option<String>,
    location: Option<String>,
) -> anyhow::Result<()> {
    let client = OpenAiVisionClient::new(
        openai_key(config)?,
        config.vision.model.clone(),
        config.vision.request_timeout,
    )?;
    let frame = FileFrameSource::new(image).latest_frame().await?;

    let location = strip_digits(location.as_deref().unwrap_or_default());
    let context = match (destination, instruction) {
        (Some(destination), Some(instruction)) => NarrationContext::Contextual {
            location,
            destination,
            instruction,
            next_instruction: None,
        },
        _ => NarrationContext::General { location },
    };

    let request = VisionRequest {
        prompt: context.prompt(),
        image_data_uri: frame.data_uri(),
        max_tokens: config.vision.max_tokens,
    };

    let description = client.describe(&request).await?;
    println!("{description}");
    Ok(())
}

/// Geocode a destination and print the walking route to it
async fn route(config: &Config, origin: Coordinate, destination: &str) -> anyhow::Result<()> {
    anyhow::ensure!(origin.is_valid(), "start position {origin} is out of range");

    let geocoder = NominatimGeocoder::new(
        config.services.nominatim_url.clone(),
        config.services.timeout,
    )?;
    let router = OsrmRouter::new(config.services.osrm_url.clone(), config.services.timeout)?;

    let place = geocoder.forward(destination).await?;
    println!("{} ({})", place.label, place.coordinate);

    let plan = router.walking_route(origin, place.coordinate).await?;
    let route = Route::from_plan(destination, plan)?;

    let mut from = origin;
    for (i, step) in route.steps().iter().enumerate() {
        println!(
            "{:2}. {} ({:.0} m)",
            i + 1,
            step.instruction,
            from.distance_to(&step.waypoint)
        );
        from = step.waypoint;
    }

    Ok(())
}

fn config_path(explicit: Option<&Path>) {
    match explicit.map(Path::to_path_buf).or_else(config_file_path) {
        Some(path) => {
            let state = if path.exists() { "exists" } else { "not created" };
            println!("{} ({state})", path.display());
        }
        None => println!("no home directory, config file unsupported"),
    }
}
