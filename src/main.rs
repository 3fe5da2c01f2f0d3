use clap::{Parser, Subcommand};
use pitch2midi::{validate_input, Config, PitchToMidi};
use std::path::PathBuf;

/// Pitch-to-MIDI Transcription
#[derive(Parser)]
#[command(name = "pitch2midi")]
#[command(about = "Transcribe a monophonic recording into a Standard MIDI File")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe a WAV file into a MIDI file
    Transcribe {
        /// Input audio file (WAV)
        input: PathBuf,

        /// Output MIDI file
        #[arg(short, long, default_value = "./output.mid")]
        output: PathBuf,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Tempo written to the file, in BPM
        #[arg(long)]
        tempo: Option<f32>,

        /// Reject pitch jumps larger than this many semitones (monophonic input)
        #[arg(long)]
        max_jump: Option<f32>,

        /// Shortest note kept, in frames
        #[arg(long)]
        min_note_frames: Option<usize>,

        /// Also write an analysis JSON next to the MIDI file
        #[arg(long)]
        analysis: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Quiet output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show default configuration
    ShowConfig,
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Transcribe {
            input,
            output,
            config,
            tempo,
            max_jump,
            min_note_frames,
            analysis,
            verbose,
            quiet,
        } => {
            if verbose && quiet {
                anyhow::bail!("Cannot specify both --verbose and --quiet");
            }
            init_logging(verbose, quiet);

            // Load configuration
            let mut config = if let Some(config_path) = config {
                pitch2midi::config::load_config(config_path)?
            } else {
                Config::default()
            };
            if let Some(bpm) = tempo {
                config.export.tempo_bpm = bpm;
            }
            if max_jump.is_some() {
                config.postprocess.max_semitone_jump = max_jump;
            }
            if let Some(frames) = min_note_frames {
                config.segment.min_note_frames = frames;
            }
            config.export.write_analysis |= analysis;

            validate_input(&input, &config)?;

            let processor = PitchToMidi::new(config);
            log::info!("Processing {}...", input.display());
            processor.process(&input, &output)?;
            log::info!("MIDI written to {}", output.display());
        }
        Commands::ValidateConfig { config } => {
            init_logging(false, false);
            let config = pitch2midi::config::load_config(config)?;
            println!("Configuration is valid");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::ShowConfig => {
            let config = Config::default();
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
    }

    Ok(())
}
