mod mcp;
mod page;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use vendorwatch_digest::summarize::DEFAULT_MODEL;
use vendorwatch_digest::{
    format_entries, format_state, load_state, page_channel, DigestOutcome, DigestService, Format,
    MailClient, Summarizer,
};
use vendorwatch_domain::KeyValueStore;
use vendorwatch_error::ErrorResponse;
use vendorwatch_google::{
    GmailClient, GmailConfig, GoogleTokenProvider, TokenSource, DEFAULT_GMAIL_BASE,
    GOOGLE_TOKEN_URL,
};
use vendorwatch_openai::{OpenAiAdapter, OpenAiConfig, DEFAULT_OPENAI_BASE};
use vendorwatch_store::{JsonFileStore, MemoryStore};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vendorwatch=info")),
        )
        .compact()
        .init();
}

fn load_token_source(interactive: bool) -> TokenSource {
    if let Ok(token) = env::var("GMAIL_ACCESS_TOKEN") {
        if !token.trim().is_empty() {
            info!("using GMAIL_ACCESS_TOKEN");
            return TokenSource::Static(token.trim().to_string());
        }
    }

    let refresh = (
        env::var("GOOGLE_CLIENT_ID"),
        env::var("GOOGLE_CLIENT_SECRET"),
        env::var("GOOGLE_REFRESH_TOKEN"),
    );
    if let (Ok(client_id), Ok(client_secret), Ok(refresh_token)) = refresh {
        info!("using google refresh token");
        return TokenSource::Refresh {
            client_id,
            client_secret,
            refresh_token,
            token_url: GOOGLE_TOKEN_URL.to_string(),
        };
    }

    if interactive {
        GoogleTokenProvider::interactive_if_terminal()
    } else {
        info!("gmail credentials not configured");
        TokenSource::Unavailable
    }
}

fn load_gmail_config() -> GmailConfig {
    GmailConfig {
        base_url: env::var("GMAIL_API_BASE").unwrap_or_else(|_| DEFAULT_GMAIL_BASE.to_string()),
    }
}

fn load_openai_config() -> Result<OpenAiConfig, String> {
    let api_key = env::var("OPENAI_API_KEY")
        .map_err(|_| "OPENAI_API_KEY env var not set".to_string())?;
    if api_key.trim().is_empty() {
        return Err("OPENAI_API_KEY is empty".to_string());
    }
    let base_url =
        env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_OPENAI_BASE.to_string());
    Ok(OpenAiConfig { api_key, base_url })
}

fn load_model() -> String {
    env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string())
}

fn load_data_dir() -> Option<PathBuf> {
    if let Ok(dir) = env::var("VENDORWATCH_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }
    env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".vendorwatch"))
}

fn load_page_path() -> Result<PathBuf, String> {
    env::var("VENDORWATCH_PAGE_HTML")
        .map(PathBuf::from)
        .map_err(|_| "VENDORWATCH_PAGE_HTML env var not set".to_string())
}

fn open_store() -> Arc<dyn KeyValueStore> {
    match load_data_dir() {
        Some(dir) => {
            let store = JsonFileStore::new(dir.join("store.json"));
            info!(path = %store.path().display(), "using file store");
            Arc::new(store)
        }
        None => {
            info!("no data directory, state will not be kept");
            Arc::new(MemoryStore::new())
        }
    }
}

fn build_service(interactive: bool) -> Result<DigestService, String> {
    let openai = load_openai_config()?;
    let tokens = Arc::new(GoogleTokenProvider::new(load_token_source(interactive)));
    let mail = MailClient::new(Arc::new(GmailClient::new(load_gmail_config())));
    let summarizer = Summarizer::new(Arc::new(OpenAiAdapter::new(openai)), load_model());
    let mut service = DigestService::new(tokens, mail, summarizer, open_store());

    match load_page_path() {
        Ok(path) => {
            let (bridge, responder, requests) = page_channel(8);
            let _worker = page::spawn_snapshot_worker(path.clone(), responder, requests);
            service = service.with_page(Arc::new(bridge));
            info!(path = %path.display(), "page snapshot configured");
        }
        Err(e) => info!("page not configured: {e}"),
    }

    Ok(service)
}

fn print_outcome(outcome: &DigestOutcome, show_emails: bool) {
    if show_emails && !outcome.entries.is_empty() {
        println!("{}", format_entries(&outcome.entries, Format::Compact));
        println!();
    }
    println!("{}", outcome.summary);
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

async fn run_track(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let email = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .ok_or("usage: vendorwatch track <vendor-email>")?;
    let service = build_service(true)?;

    match service.save_vendor_email(email).await {
        Ok(outcome) => {
            print_outcome(&outcome, args.iter().any(|a| a == "--emails"));
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", ErrorResponse::from(&e).to_compact());
            std::process::exit(2);
        }
    }
}

async fn run_summarize(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(true)?;
    let outcome = match flag_value(args, "--subject") {
        Some(subject) => service.summarize_subject(subject).await,
        None => service.summarize_active_page().await,
    };
    print_outcome(&outcome, args.iter().any(|a| a == "--emails"));
    Ok(())
}

async fn run_show(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let fmt = if args.iter().any(|a| a == "--json") {
        Format::Full
    } else {
        Format::Compact
    };
    let store = open_store();
    let state = load_state(store.as_ref()).await?;
    println!("{}", format_state(&state, fmt));
    Ok(())
}

async fn run_mcp_server() -> Result<(), Box<dyn std::error::Error>> {
    // stdin carries the protocol, so no interactive consent here
    let service = build_service(false)?;
    let server = mcp::McpServer::new(Arc::new(service));
    server.run().await?;
    Ok(())
}

fn print_help() {
    eprintln!("vendorwatch: summarize the latest email thread with a vendor");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  vendorwatch track <email> [--emails]       Save the vendor email and summarize its latest messages");
    eprintln!("  vendorwatch summarize [--subject <text>]   Summarize the thread on the open page (or by subject)");
    eprintln!("  vendorwatch show [--json]                  Show the saved vendor email and last summary");
    eprintln!("  vendorwatch mcp                            Start MCP server (stdio)");
    eprintln!("  vendorwatch help                           Show this help");
    eprintln!();
    eprintln!("Environment variables:");
    eprintln!("  GMAIL_ACCESS_TOKEN       Gmail API bearer token");
    eprintln!("  GOOGLE_CLIENT_ID         OAuth client id (with secret + refresh token)");
    eprintln!("  GOOGLE_CLIENT_SECRET     OAuth client secret");
    eprintln!("  GOOGLE_REFRESH_TOKEN     OAuth refresh token with gmail.readonly scope");
    eprintln!("  GMAIL_API_BASE           Gmail API base (default: {DEFAULT_GMAIL_BASE})");
    eprintln!("  OPENAI_API_KEY           Chat-completion API key (required)");
    eprintln!("  OPENAI_BASE_URL          Chat-completion base (default: {DEFAULT_OPENAI_BASE})");
    eprintln!("  OPENAI_MODEL             Model (default: {DEFAULT_MODEL})");
    eprintln!("  VENDORWATCH_DATA_DIR     Data directory (default: ~/.vendorwatch)");
    eprintln!("  VENDORWATCH_PAGE_HTML    HTML snapshot of the open mail page");
    eprintln!("  RUST_LOG                 Log level (default: vendorwatch=info)");
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let cmd = args.get(1).map(|s| s.as_str()).unwrap_or("help");
    let rest = args.get(2..).unwrap_or(&[]);

    let result = match cmd {
        "track" => run_track(rest).await,
        "summarize" => run_summarize(rest).await,
        "show" => run_show(rest).await,
        "mcp" => run_mcp_server().await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        unknown => {
            eprintln!("Unknown command: {unknown}");
            eprintln!("Run `vendorwatch help` for usage");
            return;
        }
    };

    if let Err(e) = result {
        error!(%e, "fatal error");
        std::process::exit(1);
    }
}
