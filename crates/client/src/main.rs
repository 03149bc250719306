use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubedl_client::api::{is_youtube_url, HttpQueryApi};
use tubedl_client::driver::DownloadClient;
use tubedl_client::session::{MessageKind, Session, SessionState};

struct Args {
    url: String,
    server: String,
    dest: PathBuf,
    format_id: Option<String>,
    list_only: bool,
}

const USAGE: &str = "\
Usage: tubedl <url> [options]

Options:
  -f, --format <id>   Download the given format id (default: best offered)
  -d, --dest <dir>    Directory to save the file into (default: .)
  -l, --list          List available formats and exit
      --server <url>  Service base URL (default: $TUBEDL_SERVER or http://127.0.0.1:3000)
  -h, --help          Show this help";

fn parse_args() -> anyhow::Result<Args> {
    let mut url = None;
    let mut format_id = None;
    let mut list_only = false;
    let mut server = std::env::var("TUBEDL_SERVER")
        .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
    let mut dest = PathBuf::from(".");

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--server" => server = args.next().context("--server needs a value")?,
            "--dest" | "-d" => {
                dest = PathBuf::from(args.next().context("--dest needs a value")?)
            }
            "--format" | "-f" => format_id = Some(args.next().context("--format needs a value")?),
            "--list" | "-l" => list_only = true,
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other if url.is_none() && !other.starts_with('-') => url = Some(other.to_string()),
            other => anyhow::bail!("unexpected argument '{other}'\n\n{USAGE}"),
        }
    }

    Ok(Args {
        url: url.with_context(|| USAGE.to_string())?,
        server,
        dest,
        format_id,
        list_only,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tubedl_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args()?;

    if !is_youtube_url(&args.url) {
        anyhow::bail!("Please enter a valid YouTube URL");
    }

    let api = HttpQueryApi::new(&args.server);
    let mut client = DownloadClient::new(api, &args.dest);
    let session = client.session();

    client.fetch_info(&args.url).await?;

    print_video(&session).await;
    if args.list_only {
        return Ok(());
    }

    if let Some(wanted) = &args.format_id {
        let mut s = session.lock().await;
        let index = s
            .formats()
            .iter()
            .position(|f| f.format_id == *wanted)
            .with_context(|| format!("format '{wanted}' is not offered for this video"))?;
        s.select_format(index)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    }

    client.start_download().await?;
    let render = tokio::spawn(render_progress(Arc::clone(&session)));
    client.wait_for_poll_loop().await;
    render.abort();
    println!();

    let s = session.lock().await;
    match s.message(Instant::now()) {
        Some((text, MessageKind::Info)) => println!("{text}"),
        Some((text, MessageKind::Error)) => anyhow::bail!("{text}"),
        None => {}
    }
    Ok(())
}

async fn print_video(session: &Mutex<Session>) {
    let s = session.lock().await;
    println!("{}", s.title().unwrap_or("(untitled)"));
    for (index, format) in s.formats().iter().enumerate() {
        println!(
            "  [{index}] {:<6} {:>4}x{:<4} {:<5} {:>10}  (id {})",
            format.quality_label,
            format.width,
            format.height,
            format.ext,
            format.filesize_display(),
            format.format_id,
        );
    }
}

async fn render_progress(session: Arc<Mutex<Session>>) {
    use std::io::Write;

    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        ticker.tick().await;
        let mut s = session.lock().await;
        s.expire_message(Instant::now());
        match s.state() {
            SessionState::Polling => {
                print!("\rDownloading... {:>3}%", s.progress());
                let _ = std::io::stdout().flush();
            }
            SessionState::Completing => {
                print!("\rDownloading... 100%  retrieving file");
                let _ = std::io::stdout().flush();
            }
            _ => {}
        }
    }
}
