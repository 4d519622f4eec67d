use anyhow::{bail, Context};
use clap::Parser;
use cloud_ai_demos::adapters::http::build_client;
use cloud_ai_demos::adapters::VideoIndexerClient;
use cloud_ai_demos::config::{ServicesConfig, TomlConfig};
use cloud_ai_demos::utils::{logger, validation::Validate};
use cloud_ai_demos::{CorrelationId, PollPolicy};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "video-indexer")]
#[command(about = "Upload a video, wait for indexing and print a summary of the insights")]
#[command(group = clap::ArgGroup::new("source").required(true).args(["video_url", "file"]))]
struct Args {
    /// Publicly reachable video URL
    video_url: Option<String>,

    /// Local video file to upload instead of a URL
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Display name for the uploaded video
    #[arg(short, long, default_value = "cloud-ai-demos video")]
    name: String,

    /// Optional TOML file with a [services.video] section
    #[arg(short, long, env = "DEMO_CONFIG")]
    config: Option<String>,

    /// Seconds between status checks
    #[arg(long, default_value = "10")]
    interval_secs: u64,

    /// Give up after this many status checks
    #[arg(long, default_value = "90")]
    max_attempts: u32,

    /// Print the insights as JSON instead of a text summary
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn none_if_empty(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join(", ")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);

    let mut services = ServicesConfig::from_env();
    if let Some(path) = &args.config {
        tracing::info!("📁 Loading configuration from: {}", path);
        let file = TomlConfig::from_file(path)
            .with_context(|| format!("failed to load config file '{}'", path))?;
        services = services.merge(file.services);
    }
    services.validate()?;

    let Some(settings) = services.video else {
        bail!("Video indexer is not configured; set VIDEO_INDEXER_ACCOUNT_ID and VIDEO_INDEXER_ACCESS_TOKEN");
    };

    let client = VideoIndexerClient::new(build_client(Duration::from_secs(60))?, settings);
    let policy = PollPolicy::new(Duration::from_secs(args.interval_secs), args.max_attempts);
    let correlation_id = CorrelationId::generate();

    let video_id = match (&args.file, &args.video_url) {
        (Some(path), _) => {
            println!("🎬 Indexing {} [{}]", path.display(), correlation_id);
            client
                .upload_file(path, &args.name, &correlation_id)
                .await
                .with_context(|| format!("failed to upload '{}'", path.display()))?
        }
        (None, Some(url)) => {
            println!("🎬 Indexing {} [{}]", url, correlation_id);
            client
                .upload_by_url(url, &args.name, &correlation_id)
                .await
                .with_context(|| format!("failed to upload '{}'", url))?
        }
        (None, None) => bail!("Provide a video URL or --file"),
    };

    let insights = client
        .wait_for_insights(&video_id, &policy, &correlation_id)
        .await
        .context("video indexing did not complete")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "video_id": video_id,
                "correlation_id": correlation_id,
                "insights": insights,
            }))?
        );
        return Ok(());
    }

    println!("\n✅ Video {} indexed. Insights summary:", video_id);
    println!("Faces:     {}", none_if_empty(&insights.faces));
    println!("Brands:    {}", none_if_empty(&insights.brands));
    println!("Locations: {}", none_if_empty(&insights.locations));
    println!("People:    {}", none_if_empty(&insights.people));
    println!("Topics:    {}", none_if_empty(&insights.topics));

    if !insights.transcript.is_empty() {
        println!("\nTranscript (first {} lines):", insights.transcript.len());
        for line in &insights.transcript {
            println!(
                "- [{}] {}",
                line.time.as_deref().unwrap_or("--:--"),
                line.text
            );
        }
    }

    Ok(())
}
