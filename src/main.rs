use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use hdi_gen::codegen::output::{check_unique_names, generate_file, load_model, write_artifacts};
use hdi_gen::{ArtifactPair, GeneratorConfig, Mode};

#[derive(Parser)]
#[command(name = "hdi-gen")]
#[command(about = "HDI server stub generator for HDF drivers", long_about = None)]
struct Cli {
    /// Input interface model file(s), JSON
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Accessor variant the stubs are generated for
    #[arg(long, value_enum, default_value_t = Mode::User)]
    mode: Mode,

    /// Directory user-mode stubs load implementation libraries from
    #[arg(long, default_value = "/vendor/lib")]
    lib_dir: String,

    /// Validate and render only (no files written)
    #[arg(long)]
    check: bool,

    /// Verbose output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> GeneratorConfig {
        GeneratorConfig {
            mode: self.mode,
            driver_lib_dir: self.lib_dir.clone(),
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = cli.config();

    // Render everything first; a failure anywhere writes nothing
    let mut pairs: Vec<ArtifactPair> = Vec::new();
    for file_path in &cli.files {
        tracing::info!(path = %file_path.display(), "processing");
        let model = load_model(file_path)
            .map_err(|e| format!("{}: {}", file_path.display(), e))?;
        let rendered = generate_file(&model, &config)
            .map_err(|e| format!("{}: {}", file_path.display(), e))?;
        pairs.extend(rendered);
    }
    check_unique_names(&pairs)?;

    if cli.check {
        for file_path in &cli.files {
            println!("✓ {} - OK", file_path.display());
        }
        return Ok(());
    }

    let written = write_artifacts(&pairs, &cli.output)?;
    for path in &written {
        println!("    → {}", path.display());
    }
    println!(
        "✓ Generated {} interface(s) ({} mode)",
        pairs.len(),
        config.mode
    );

    Ok(())
}
