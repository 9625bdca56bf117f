use artgal::build::{self, BuildMode, SitePaths};
use artgal::config::{self, Config};
use artgal::generate::{self, GenerateSettings, ImageProvider, JobPaths, Providers};
use artgal::generate::gemini::{GeminiClient, GeminiConcepts, GeminiImages};
use artgal::generate::gist::GistClient;
use artgal::{discover, output};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Shared path overrides for commands that touch the site.
#[derive(clap::Args, Clone)]
struct SiteArgs {
    /// Images directory (default: `site.images_dir` under the root)
    #[arg(long)]
    images: Option<PathBuf>,

    /// Template file (default: `site.template` under the root)
    #[arg(long)]
    template: Option<PathBuf>,
}

#[derive(Parser)]
#[command(name = "artgal")]
#[command(about = "Build and feed tooling for a static AI-art gallery")]
#[command(long_about = "\
Build and feed tooling for a static AI-art gallery

The gallery page carries two marker pairs. `build` replaces what sits between
them with the current image list and the gist feed URL; nothing else in the
file changes.

Site layout:

  site/
  ├── artgal.toml        # Optional config (see `artgal gen-config`)
  ├── art_styles.json    # {\"art_styles\": [...]} for `artgal generate`
  ├── index.html         # Template with injection markers
  └── images/            # jpg, jpeg, png, gif, svg, webp

Template markers (defaults):

  // IMAGES_LIST_START
  const images = [ ... ];     ← regenerated
  // IMAGES_LIST_END

  // GIST_URL_START
  const GIST_URL = '...';     ← regenerated when FISH_GIST_ID is set
  // GIST_URL_END

Environment:
  FISH_GIST_ID           gist id for the feed URL and for publishing prompts
  GIST_OWNER             feed URL owner (default: pappater)
  GEMINI_API_KEY         required by `generate`
  GEMINI_MODEL           text model override
  GIST_TOKEN             required by `generate`
  SKIP_IMAGE_GENERATION  `true` to publish the prompt only
  RUST_LOG               log filter (default: warn)")]
#[command(version)]
struct Cli {
    /// Site root directory
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the images a build would inject
    Scan(SiteArgs),
    /// Inject the image list and feed URL into the template
    Build(SiteArgs),
    /// Validate the template and report what a build would change
    Check(SiteArgs),
    /// Generate a new art concept, publish it, and render an image
    Generate {
        /// Publish the concept only
        #[arg(long)]
        skip_images: bool,
    },
    /// Print a stock artgal.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Scan(site) => {
            let config = config::load_config(&cli.root)?;
            let paths = resolve_paths(&cli.root, &config, &site);
            println!("==> Scanning {}", paths.images_dir.display());
            let images = discover::discover(&paths.images_dir)?;
            if images.is_empty() {
                log::warn!("no images found in {}", paths.images_dir.display());
            }
            for name in &images {
                println!("{}", name);
            }
        }
        Command::Build(site) => {
            let config = config::load_config(&cli.root)?;
            let paths = resolve_paths(&cli.root, &config, &site);
            println!("==> Building {}", paths.template.display());
            let report = build::build(&config, &paths, BuildMode::Write, env_lookup)?;
            output::print_build_output(&report);
            println!("==> Build complete");
        }
        Command::Check(site) => {
            let config = config::load_config(&cli.root)?;
            let paths = resolve_paths(&cli.root, &config, &site);
            println!("==> Checking {}", paths.template.display());
            let report = build::build(&config, &paths, BuildMode::Check, env_lookup)?;
            output::print_build_output(&report);
            println!("==> Template is valid");
        }
        Command::Generate { skip_images } => {
            let config = config::load_config(&cli.root)?;
            run_generate(&cli.root, &config, skip_images)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize `env_logger`; `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn resolve_paths(root: &Path, config: &Config, site: &SiteArgs) -> SitePaths {
    SitePaths::resolve(
        root,
        config,
        site.images.as_deref(),
        site.template.as_deref(),
    )
}

fn run_generate(
    root: &Path,
    config: &Config,
    skip_images: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("==> Art generation");
    let settings = GenerateSettings::from_env(&config.generate, &config.feed, env_lookup)?;

    let gemini = GeminiClient::new(settings.api_key.as_str())?;
    let concepts = GeminiConcepts {
        client: &gemini,
        model: settings.text_model.clone(),
    };
    let images = GeminiImages {
        client: &gemini,
        model: config.generate.image_model.clone(),
        kind: config.generate.image_provider,
    };
    let store = GistClient::new(settings.gist_token.as_str(), settings.gist_id.as_str())?;

    let image: Option<&dyn ImageProvider> = if skip_images || settings.skip_images {
        None
    } else {
        Some(&images)
    };
    let providers = Providers {
        concept: &concepts,
        image,
        store: &store,
    };
    let paths = JobPaths {
        styles_file: root.join(&config.generate.styles_file),
        images_dir: root.join(&config.site.images_dir),
    };

    let summary = generate::run(
        &paths,
        &providers,
        &settings.text_model,
        &mut rand::thread_rng(),
        chrono::Utc::now(),
        &mut |event: &generate::GenerateEvent| {
            for line in output::format_generate_event(event) {
                println!("{}", line);
            }
        },
    )?;

    println!("==> Art generation complete");
    output::print_generate_summary(&summary);
    Ok(())
}
