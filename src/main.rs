use clap::{Parser, Subcommand};
use pixiv_fetch::acquire::{AcquisitionPipeline, RunReport};
use pixiv_fetch::auth::{StaticToken, resolve_effective_mode};
use pixiv_fetch::config::{self, AppConfig};
use pixiv_fetch::filter;
use pixiv_fetch::gallery::{self, GalleryManifest, RunLock};
use pixiv_fetch::http::UreqFetch;
use pixiv_fetch::imaging::{self, BorderDetection, RustBackend};
use pixiv_fetch::output;
use pixiv_fetch::resolver::ExtensionResolver;
use pixiv_fetch::selection::SelectionLoop;
use pixiv_fetch::source::{AuthFeed, CandidateSource, RankingFeed};
use pixiv_fetch::storage::DownloadStore;
use pixiv_fetch::types::CancelToken;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

/// Exit code for failures worth retrying later (EX_TEMPFAIL).
const EXIT_RETRYABLE: u8 = 75;
const DOWNLOAD_DIRNAME: &str = "downloads";

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "pixiv-fetch")]
#[command(about = "Fetch full-resolution artworks from pixiv into a local gallery")]
#[command(long_about = "\
Fetch full-resolution artworks from pixiv into a local gallery

Each fetch picks artworks from a pixiv ranking or, with an access token, from
your follow feed, bookmarks, recommendations, an artist or a tag search. Only
artworks passing the [filter] settings that are not already in the gallery
are downloaded. Truncated downloads are discarded.

Data directory layout:

  pixiv-data/
  ├── config.toml          # Settings (optional, see gen-config)
  ├── gallery.json         # Fetched artworks and forgotten ids
  └── downloads/           # Image files, named by artwork id

With 'fetch --time-limit' a run that takes too long stops on its own. The
download in progress is discarded; artworks already saved are kept.

Exit codes:
  0   success
  75  temporary failure (network, missing token); retry later

Run 'pixiv-fetch gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory holding config.toml, gallery.json and downloads
    #[arg(long, default_value = "pixiv-data", global = true)]
    data_dir: PathBuf,

    /// Log filter decisions and HTTP probes
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download new artworks into the gallery
    Fetch {
        /// Number of artworks to fetch (overrides download.count)
        #[arg(long)]
        count: Option<u32>,
        /// Replace the gallery contents instead of adding to them
        #[arg(long)]
        clear: bool,
        /// Stop after this many seconds, keeping what was already saved
        #[arg(long, value_name = "SECS")]
        time_limit: Option<u64>,
    },
    /// Check that an image file is a complete PNG or JPEG
    Verify { file: PathBuf },
    /// Remove a uniform border from an image, saving it as PNG
    Crop { file: PathBuf },
    /// Remove an artwork from the gallery and never fetch it again
    Forget { id: u64 },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Fetch {
            count,
            clear,
            time_limit,
        } => {
            let config = config::load_config(&cli.data_dir)?;
            let count = count.map(config::validate_count).transpose()?;
            let cancel = CancelToken::new();
            if let Some(secs) = time_limit {
                cancel.cancel_after(Duration::from_secs(secs));
            }
            return fetch(&cli.data_dir, config, count, clear, &cancel);
        }
        Command::Verify { file } => {
            let verified = imaging::format::inspect_file(&file)?;
            let dimensions = verified
                .and_then(|_| imaging::get_dimensions(&RustBackend::new(), &file).ok());
            for line in output::format_inspection(&file, verified.as_ref(), dimensions) {
                println!("{}", line);
            }
            if verified.is_none() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Crop { file } => {
            let cropped =
                imaging::auto_crop(&RustBackend::new(), &file, BorderDetection::default())?;
            for line in output::format_crop(&file, cropped.as_deref()) {
                println!("{}", line);
            }
        }
        Command::Forget { id } => {
            let _lock = RunLock::acquire(&cli.data_dir)?;
            let mut gallery = GalleryManifest::load(&cli.data_dir)?;
            let removed = gallery.forget(id)?;
            for line in output::format_forget(id, removed.as_ref()) {
                println!("{}", line);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_logging(verbose: bool) {
    let mut clog = colog::default_builder();
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    clog.filter(None, level);
    clog.init();
}

fn fetch(
    data_dir: &Path,
    config: AppConfig,
    count: Option<u32>,
    clear: bool,
    cancel: &CancelToken,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let _lock = RunLock::acquire(data_dir)?;

    let tokens = StaticToken::new(config.auth.token.clone(), config.auth.token_env.clone());
    let effective = match resolve_effective_mode(
        config.catalog.mode,
        &tokens,
        config.catalog.auth_fail_action,
    ) {
        Ok(effective) => effective,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ExitCode::from(EXIT_RETRYABLE));
        }
    };
    if let Some(mode) = effective.persist_mode {
        config::set_update_mode(data_dir, mode)?;
    }
    let target = effective
        .count_override
        .or(count)
        .unwrap_or(config.download.count);

    let http = if config.catalog.network_bypass {
        UreqFetch::with_network_bypass(config.download.timeouts())
    } else {
        UreqFetch::new(config.download.timeouts())
    };
    let source: Box<dyn CandidateSource + '_> = match effective.mode.ranking_mode() {
        Some(ranking) => Box::new(RankingFeed::with_base_url(
            &http,
            ranking,
            config.catalog.ranking_url.clone(),
        )),
        None => {
            let (Some(feed_mode), Some(token)) = (
                config.catalog.auth_feed_mode(effective.mode),
                effective.token.clone(),
            ) else {
                return Err(format!("no feed for mode {:?}", effective.mode).into());
            };
            Box::new(AuthFeed::with_api_url(
                &http,
                token,
                feed_mode,
                config.catalog.api_url.clone(),
            ))
        }
    };
    let resolver = ExtensionResolver::new(
        &http,
        config.download.extensions.clone(),
        config.catalog.referer.clone(),
    );

    let mut gallery = GalleryManifest::load(data_dir)?;
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_acquire_event(&event) {
                println!("{}", line);
            }
        }
    });

    let result = {
        let selection = SelectionLoop::new(source, StdRng::from_entropy());
        let mut pipeline = AcquisitionPipeline::new(
            selection,
            resolver,
            &gallery,
            DownloadStore::new(data_dir.join(DOWNLOAD_DIRNAME)),
            RustBackend::new(),
        )
        .with_events(tx);
        if config.download.auto_crop {
            pipeline = pipeline.with_auto_crop(BorderDetection::default());
        }
        let criteria = filter::criteria_for_mode(&config.filter, effective.mode);
        pipeline.run(target, &criteria, cancel)
    };
    if printer.join().is_err() {
        log::warn!("Progress printer panicked");
    }
    let report: RunReport = match result {
        Ok(report) => report,
        Err(e) if e.is_retryable() => {
            eprintln!("{}", e);
            return Ok(ExitCode::from(EXIT_RETRYABLE));
        }
        Err(e) => return Err(e.into()),
    };

    let retryable = report.is_retryable();
    for line in output::format_run_summary(&report) {
        println!("{}", line);
    }
    if !report.artworks.is_empty() {
        gallery::publish(&mut gallery, report.artworks, clear)?;
    }

    Ok(if retryable {
        ExitCode::from(EXIT_RETRYABLE)
    } else {
        ExitCode::SUCCESS
    })
}
