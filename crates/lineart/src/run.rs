use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use artconfig::SessionConfig;
use artservice::{HttpRenderService, ResourceRef, ServiceConfig};
use session::{
    DecodingSurface, PreviewFrame, Session, SessionOptions, StreamOutcome, VideoJob,
};
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GlobalArgs, PreviewArgs};
use crate::paths::AppPaths;
use crate::script::{parse_script, ScriptStep};

pub async fn run(cli: Cli) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config = load_config(&paths, &cli.global).await?;
    tracing::debug!(
        config = %paths.config_dir().display(),
        data = %paths.data_dir().display(),
        service = %config.service.base_url,
        "resolved lineart paths"
    );

    if let Command::Where = cli.command {
        return print_where(&paths, &cli.global, &config);
    }

    let mut session = connect(&config)?;
    match cli.command {
        Command::Gallery { out } => {
            let dir = out.unwrap_or_else(|| paths.output_dir());
            run_gallery(&mut session, &dir).await
        }
        Command::Still { out } => run_still(&session, out, &paths).await,
        Command::Preview(args) => run_preview(&mut session, args).await,
        Command::Video { pick, out } => run_video(&mut session, pick, out, &paths).await,
        Command::Where => Ok(()),
    }
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn load_config(paths: &AppPaths, global: &GlobalArgs) -> Result<SessionConfig> {
    let (path, required) = match &global.config {
        Some(path) => (path.clone(), true),
        None => (paths.config_file(), false),
    };

    let mut config = if required || tokio::fs::try_exists(&path).await.unwrap_or(false) {
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read config {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded session config");
        SessionConfig::from_toml_str(&contents)
            .with_context(|| format!("invalid config {}", path.display()))?
    } else {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        SessionConfig::default()
    };

    if let Some(url) = &global.service_url {
        config = config
            .with_base_url(url.as_str())
            .context("invalid --service-url")?;
    }
    Ok(config)
}

fn connect(config: &SessionConfig) -> Result<Session<HttpRenderService>> {
    let service_config = ServiceConfig::new(&config.service.base_url)
        .context("invalid rendering service configuration")?
        .with_timeout(config.service.timeout);
    let service =
        HttpRenderService::new(service_config).context("failed to construct service client")?;
    Ok(Session::new(service, SessionOptions::from_config(config)))
}

fn print_where(paths: &AppPaths, global: &GlobalArgs, config: &SessionConfig) -> Result<()> {
    let config_file = global.config.clone().unwrap_or_else(|| paths.config_file());
    println!("Configuration:");
    println!("  config dir:  {}", paths.config_dir().display());
    println!(
        "  config file: {}{}",
        config_file.display(),
        if config_file.exists() { "" } else { " (missing)" }
    );
    println!("Output:");
    println!("  data dir:    {}", paths.data_dir().display());
    println!("  renders:     {}", paths.output_dir().display());
    println!("Rendering service:");
    println!("  base url:    {}", config.service.base_url);
    Ok(())
}

async fn run_gallery(session: &mut Session<HttpRenderService>, dir: &Path) -> Result<()> {
    let report = session.generate_gallery().await;
    if session.gallery().is_empty() {
        bail!(
            "gallery generation produced no artifacts ({} requests failed)",
            report.failures.len() + report.lost
        );
    }

    println!("Gallery batch {}:", report.batch);
    for item in session.gallery().items() {
        let target = dir.join(format!("gallery-{:02}", item.slot));
        let saved = save_resource(&item.artifact.image, &target).await?;
        let id = item
            .artifact
            .id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "(display only)".to_string());
        println!("  slot {:<2} id={:<16} {}", item.slot, id, saved.display());
    }
    for (request, err) in &report.failures {
        println!("  request {request} failed: {}", err.message());
    }
    if report.lost > 0 {
        println!("  {} requests ended without an answer", report.lost);
    }
    Ok(())
}

async fn run_still(
    session: &Session<HttpRenderService>,
    out: Option<PathBuf>,
    paths: &AppPaths,
) -> Result<()> {
    let still = session.generate_still().await?;
    let target = out.unwrap_or_else(|| paths.output_dir().join("still"));
    let saved = save_resource(&still, &target).await?;
    println!("{}", saved.display());
    Ok(())
}

async fn prepare_selection(session: &mut Session<HttpRenderService>, pick: usize) -> Result<()> {
    let report = session.generate_gallery().await;
    tracing::info!(
        received = report.received,
        requested = report.requested,
        "gallery generated"
    );
    let selection = session
        .select(pick)
        .with_context(|| format!("cannot select gallery slot {pick}"))?;
    println!("Selected slot {} (id {})", selection.slot, selection.id);
    Ok(())
}

async fn run_preview(session: &mut Session<HttpRenderService>, args: PreviewArgs) -> Result<()> {
    let steps = match &args.script {
        Some(path) => parse_script(&read_script(path).await?)?,
        None => Vec::new(),
    };
    prepare_selection(session, args.pick).await?;

    let (surface, frames) = DecodingSurface::channel(1);
    let writer = spawn_frame_writer(frames, args.out.clone());
    session.start_preview(surface)?;

    let deadline = async {
        match args.duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };
    let finished_early = tokio::select! {
        outcome = drive_script(&mut *session, &steps) => outcome,
        _ = deadline => {
            tracing::info!("preview duration elapsed");
            None
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            None
        }
    };

    session.stop_preview();
    let outcome = match finished_early {
        Some(outcome) => Some(outcome),
        None => session.preview_finished().await,
    };
    let written = writer.await.context("frame writer task failed")??;

    match outcome {
        Some(StreamOutcome::Failed { frames, message }) => {
            bail!("preview failed after {frames} frames: {message}")
        }
        Some(outcome) => {
            println!("Preview ended after {} frames", outcome.frames());
        }
        None => println!("Preview ended"),
    }
    if let Some(dir) = &args.out {
        println!("Wrote {written} frames to {}", dir.display());
    }
    Ok(())
}

/// Feeds script steps to the session. Resolves with the run's outcome if it
/// ends on its own, or `None` on an explicit `stop`.
async fn drive_script(
    session: &mut Session<HttpRenderService>,
    steps: &[ScriptStep],
) -> Option<StreamOutcome> {
    for step in steps {
        if !session.is_previewing() {
            break;
        }
        match step {
            ScriptStep::Pointer(event) => {
                let gyro = session.pointer(*event);
                tracing::debug!(x = gyro.x, y = gyro.y, "pointer");
            }
            ScriptStep::Wait(duration) => tokio::time::sleep(*duration).await,
            ScriptStep::Stop => return None,
        }
    }
    session.preview_finished().await
}

fn spawn_frame_writer(
    mut frames: tokio::sync::mpsc::Receiver<PreviewFrame>,
    out: Option<PathBuf>,
) -> JoinHandle<Result<u64>> {
    tokio::spawn(async move {
        if let Some(dir) = &out {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let mut written = 0u64;
        while let Some(frame) = frames.recv().await {
            tracing::debug!(
                sequence = frame.sequence,
                phase = frame.phase,
                "preview frame ready"
            );
            let Some(dir) = &out else {
                continue;
            };
            let path = dir.join(format!("frame-{:05}.png", frame.sequence));
            tokio::task::spawn_blocking(move || {
                frame
                    .image
                    .save(&path)
                    .with_context(|| format!("failed to write {}", path.display()))
            })
            .await
            .context("frame encoder task failed")??;
            written += 1;
        }
        Ok(written)
    })
}

async fn run_video(
    session: &mut Session<HttpRenderService>,
    pick: usize,
    out: Option<PathBuf>,
    paths: &AppPaths,
) -> Result<()> {
    prepare_selection(session, pick).await?;
    session.request_video()?;
    println!("Rendering video...");
    match session.wait_video().await {
        VideoJob::Succeeded(video) => {
            let target = out.unwrap_or_else(|| paths.output_dir().join("video"));
            let saved = save_resource(&video, &target).await?;
            println!("{}", saved.display());
            Ok(())
        }
        VideoJob::Failed(message) => bail!("video render failed: {message}"),
        VideoJob::Idle | VideoJob::Requesting => bail!("video render did not complete"),
    }
}

async fn read_script(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut contents = String::new();
        tokio::io::stdin()
            .read_to_string(&mut contents)
            .await
            .context("failed to read script from stdin")?;
        return Ok(contents);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read script {}", path.display()))
}

/// Writes a data-URL resource to `target`, adding the extension implied by its
/// media type when `target` has none.
async fn save_resource(resource: &ResourceRef, target: &Path) -> Result<PathBuf> {
    let data = resource
        .decode_data_url()
        .with_context(|| format!("cannot save resource {resource}"))?;
    let path = if target.extension().is_some() {
        target.to_path_buf()
    } else {
        target.with_extension(data.extension())
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    tokio::fs::write(&path, &data.bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = data.bytes.len(), mime = %data.mime, "saved resource");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn saves_data_urls_with_inferred_extension() {
        let root = TempDir::new().unwrap();
        let resource = ResourceRef::new("data:image/png;base64, aGVsbG8=");

        let saved = save_resource(&resource, &root.path().join("nested/still"))
            .await
            .unwrap();

        assert_eq!(saved, root.path().join("nested/still.png"));
        assert_eq!(std::fs::read(&saved).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn explicit_extension_is_kept() {
        let root = TempDir::new().unwrap();
        let resource = ResourceRef::new("data:video/mp4;base64,aGVsbG8=");
        let saved = save_resource(&resource, &root.path().join("clip.bin"))
            .await
            .unwrap();
        assert_eq!(saved, root.path().join("clip.bin"));
    }

    #[tokio::test]
    async fn non_data_urls_cannot_be_saved() {
        let root = TempDir::new().unwrap();
        let resource = ResourceRef::new("https://example.invalid/frame.png");
        assert!(save_resource(&resource, &root.path().join("x")).await.is_err());
    }
}
