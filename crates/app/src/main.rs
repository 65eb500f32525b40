use std::{path::PathBuf, process::ExitCode};

use audio_magic_core::{
    is_valid_remote_link, AppConfig, AudioFile, AudioMagicError, HttpProcessingService,
    MediaBackend, Orchestrator, PlaybackError, Presentation, ProcessingMode,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Process(args) => run_process(args).await,
        Commands::CheckLink { url } => run_check_link(&url),
    };
    report(result)
}

/// Prints the user-facing message of a failed command, once.
fn report(result: audio_magic_core::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("Error: {}", err.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run_process(args: ProcessArgs) -> audio_magic_core::Result<()> {
    let config = load_config(&args)?;
    tracing::info!(api_url = %config.service.api_url, "using processing service");

    let service = HttpProcessingService::new(&config.service)?;
    let mut orchestrator = Orchestrator::new(config);

    match (&args.file, &args.link) {
        (Some(path), None) => {
            let file = match &args.media_type {
                Some(media_type) => {
                    let size = std::fs::metadata(path)?.len();
                    AudioFile::with_media_type(path, size, media_type)
                }
                None => AudioFile::from_path(path)?,
            };
            orchestrator.select_local_file(Some(file))?;
        }
        (None, Some(link)) => orchestrator.set_remote_link(link)?,
        _ => return Err(AudioMagicError::msg("pass exactly one of --file or --link")),
    }
    orchestrator.select_mode(args.mode.into())?;

    println!("Processing...");
    let artifacts = orchestrator.submit(&service).await?.clone();

    if args.json {
        let json = serde_json::to_string_pretty(&artifacts)
            .map_err(|e| AudioMagicError::msg(format!("could not encode artifacts: {e}")))?;
        println!("{json}");
        return Ok(());
    }

    let preview = orchestrator
        .selector()
        .preview()
        .map(|preview| preview.url().to_string());
    let mut presentation = Presentation::from_artifacts(&artifacts, preview.as_deref());
    if let Some(tab) = &args.tab {
        if !presentation.select_tab(tab) {
            tracing::warn!(tab, "no such tab, showing the default one");
        }
    }
    print_presentation(&presentation);
    Ok(())
}

fn run_check_link(url: &str) -> audio_magic_core::Result<()> {
    if is_valid_remote_link(url) {
        println!("valid: {url}");
        Ok(())
    } else {
        Err(audio_magic_core::ValidationError::InvalidLink(url.to_string()).into())
    }
}

fn load_config(args: &ProcessArgs) -> audio_magic_core::Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    }
    .apply_env();

    if let Some(api_url) = &args.api_url {
        config.service.api_url = api_url.clone();
    }
    if let Some(timeout) = args.timeout {
        config.service.request_timeout_secs = timeout;
    }
    Ok(config)
}

fn print_presentation(presentation: &Presentation) {
    if presentation.has_tabs() {
        let titles: Vec<_> = presentation
            .tabs
            .iter()
            .enumerate()
            .map(|(index, tab)| {
                if presentation.active_tab == Some(index) {
                    format!("[{}]", tab.title)
                } else {
                    tab.title.clone()
                }
            })
            .collect();
        println!("Tabs: {}", titles.join(" | "));
    }

    for (clip, player) in presentation.players(|_| HeadlessBackend) {
        println!(
            "  {:<16} {:<6} {}  {}",
            clip.label,
            format!("{:?}", clip.kind),
            player.time_display(),
            clip.url
        );
    }
}

/// Backend for terminals, which cannot render media. Loading only records
/// the URL; playing is refused.
struct HeadlessBackend;

impl MediaBackend for HeadlessBackend {
    fn load(&mut self, url: &str) -> Result<(), PlaybackError> {
        tracing::debug!(url, "bound clip");
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        Err(PlaybackError::Play("no audio output in terminal mode".to_string()))
    }

    fn pause(&mut self) {}

    fn seek(&mut self, _seconds: f64) {}

    fn set_output_level(&mut self, _level: f32) {}
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Split songs into vocals and music, or make them meow", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit an audio file or YouTube link to the processing service.
    Process(ProcessArgs),
    /// Check whether a link would be accepted for processing.
    CheckLink {
        /// Link to check.
        url: String,
    },
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Local audio file to upload.
    #[arg(short, long, conflicts_with = "link")]
    file: Option<PathBuf>,
    /// Declared media type of the file, overriding the extension.
    #[arg(long, requires = "file")]
    media_type: Option<String>,
    /// YouTube link to process instead of a file.
    #[arg(short, long)]
    link: Option<String>,
    /// Processing mode.
    #[arg(short, long, value_enum)]
    mode: ModeArg,
    /// Base address of the processing service. Overrides `API_URL`.
    #[arg(long)]
    api_url: Option<String>,
    /// Request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Tab to show when the result is grouped into tabs.
    #[arg(long)]
    tab: Option<String>,
    /// Print the artifact set as JSON instead of the clip list.
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    VocalAndMusic,
    CatVersion,
}

impl From<ModeArg> for ProcessingMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::VocalAndMusic => ProcessingMode::VocalAndMusic,
            ModeArg::CatVersion => ProcessingMode::CatVersion,
        }
    }
}
