use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use futures_util::{SinkExt, StreamExt};
use policy::{
    ClientFrame, DocumentState, ElementSignals, PageAgent, PageSignals, Policy, Request, ServerFrame, StyleReader,
    Transform,
};
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("timed out waiting for websocket frame")]
    Timeout,
    #[error("server returned {code}: {message}")]
    ServerError { code: String, message: String },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for CliError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WsConnect(Box::new(error))
    }
}

#[derive(Parser, Debug)]
#[command(name = "duskctl", about = "Dark-rendering policy control and page simulator")]
struct Cli {
    #[arg(long, env = "DUSKMODE_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    /// Print the stored policy.
    State,
    /// List attached pages and their badges.
    Pages,
    /// Set the global default.
    Global { toggle: Toggle },
    Site(SiteCommand),
    /// Run a simulated page that reacts to pushes.
    Page(PageArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        self == Self::On
    }
}

#[derive(Args, Debug)]
struct SiteCommand {
    #[command(subcommand)]
    command: SiteSubcommand,
}

#[derive(Subcommand, Debug)]
enum SiteSubcommand {
    /// Override the decision for one hostname.
    Set { hostname: String, toggle: Toggle },
    /// Drop the override for one hostname.
    Clear { hostname: String },
}

#[derive(Args, Debug)]
struct PageArgs {
    #[arg(long)]
    url: String,
    /// Page-level color-scheme declaration.
    #[arg(long)]
    declared_scheme: Option<String>,
    #[arg(long)]
    root_scheme: Option<String>,
    #[arg(long)]
    root_bg: Option<String>,
    #[arg(long)]
    body_bg: Option<String>,
    /// Exit after the initial render instead of waiting for pushes.
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let base_url = cli.base_url;

    match cli.command {
        Command::Ping => run_ping(&base_url).await,
        Command::State => print_json(&api_get(&base_url, "/api/state").await?),
        Command::Pages => print_json(&api_get(&base_url, "/api/pages").await?),
        Command::Global { toggle } => {
            ws_request(&base_url, Request::SetGlobalEnabled { enabled: toggle.enabled() }).await
        }
        Command::Site(site) => match site.command {
            SiteSubcommand::Set { hostname, toggle } => {
                ws_request(&base_url, Request::SetSiteEnabled { hostname, enabled: Some(toggle.enabled()) }).await
            }
            SiteSubcommand::Clear { hostname } => ws_request(&base_url, Request::RemoveSiteSetting { hostname }).await,
        },
        Command::Page(args) => run_page(&base_url, args).await,
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError {
            code: format!("HTTP {}", status.as_u16()),
            message: "health check failed".to_owned(),
        });
    }
    println!("ok");
    Ok(())
}

async fn api_get(base_url: &str, path: &str) -> Result<Value, CliError> {
    let url = format!("{}{path}", base_url.trim_end_matches('/'));
    let response = reqwest::Client::new().get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError { code: format!("HTTP {}", status.as_u16()), message: path.to_owned() });
    }
    Ok(response.json::<Value>().await?)
}

/// One request over a fresh connection; prints the resulting policy.
async fn ws_request(base_url: &str, request: Request) -> Result<(), CliError> {
    let mut stream = connect(base_url).await?;
    let policy = send_request(&mut stream, request).await?;
    print_policy(&policy)?;
    stream.close(None).await?;
    Ok(())
}

// =============================================================================
// SIMULATED PAGE
// =============================================================================

/// Prints transform changes instead of touching a real document.
struct ConsoleTransform {
    url: String,
}

impl Transform for ConsoleTransform {
    fn apply(&mut self) {
        println!("{}: inversion applied", self.url);
    }

    fn remove(&mut self) {
        println!("{}: inversion removed", self.url);
    }
}

/// Fixed style values supplied on the command line.
struct StaticStyles(PageSignals);

impl StyleReader for StaticStyles {
    fn signals(&self) -> PageSignals {
        self.0.clone()
    }
}

fn signals_from(args: &PageArgs) -> PageSignals {
    PageSignals {
        declared_scheme: args.declared_scheme.clone(),
        root: ElementSignals { color_scheme: args.root_scheme.clone(), background: args.root_bg.clone() },
        body: ElementSignals { color_scheme: None, background: args.body_bg.clone() },
    }
}

async fn run_page(base_url: &str, args: PageArgs) -> Result<(), CliError> {
    let styles = StaticStyles(signals_from(&args));
    let mut agent = PageAgent::new(&args.url, ConsoleTransform { url: args.url.clone() });
    let looks_dark = agent.looks_dark(&styles);
    eprintln!("{}: looks dark = {looks_dark}", args.url);

    let mut stream = connect(base_url).await?;
    let policy = send_request(&mut stream, Request::AttachPage { url: args.url.clone(), looks_dark: Some(looks_dark) })
        .await?;

    match agent.on_policy(policy, DocumentState::Ready, &styles) {
        Some(decision) => eprintln!("{}: initial decision enabled={decision}", args.url),
        None => eprintln!("{}: privileged page, never styled", args.url),
    }
    if args.once {
        stream.close(None).await?;
        return Ok(());
    }

    loop {
        let Some(frame) = recv_frame(&mut stream, None).await? else {
            return Ok(());
        };
        if let ServerFrame::Push { action } = frame {
            let state = agent.handle_push(action);
            eprintln!("{}: push {action:?} -> {state:?}", args.url);
        }
    }
}

// =============================================================================
// WEBSOCKET HELPERS
// =============================================================================

fn ws_url(base_url: &str) -> Result<String, CliError> {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/api/ws"));
    }
    if let Some(rest) = base.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/api/ws"));
    }

    Err(CliError::InvalidBaseUrl(base_url.to_owned()))
}

async fn connect(base_url: &str) -> Result<WsStream, CliError> {
    let (mut stream, _) = connect_async(ws_url(base_url)?).await?;
    loop {
        match recv_frame(&mut stream, Some(Duration::from_secs(5))).await? {
            Some(ServerFrame::Connected { .. }) => return Ok(stream),
            Some(_) => {}
            None => return Err(CliError::WsClosed),
        }
    }
}

async fn send_request(stream: &mut WsStream, request: Request) -> Result<Policy, CliError> {
    let frame = ClientFrame::new(request);
    let id = frame.id;
    stream.send(Message::Text(serde_json::to_string(&frame)?.into())).await?;
    wait_for_reply(stream, id).await
}

async fn wait_for_reply(stream: &mut WsStream, request_id: Uuid) -> Result<Policy, CliError> {
    loop {
        let Some(frame) = recv_frame(stream, Some(Duration::from_secs(15))).await? else {
            return Err(CliError::WsClosed);
        };
        if frame.parent_id() != Some(request_id) {
            continue;
        }
        match frame {
            ServerFrame::State { state, .. } => return Ok(state),
            ServerFrame::Error { code, message, .. } => return Err(CliError::ServerError { code, message }),
            ServerFrame::Connected { .. } | ServerFrame::Push { .. } => {}
        }
    }
}

/// Next server frame, or `None` once the server closes the socket.
async fn recv_frame(stream: &mut WsStream, timeout: Option<Duration>) -> Result<Option<ServerFrame>, CliError> {
    let fut = async {
        loop {
            let Some(message) = stream.next().await else {
                return Ok::<_, CliError>(None);
            };
            match message? {
                Message::Text(text) => return Ok(Some(serde_json::from_str::<ServerFrame>(&text)?)),
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| CliError::Timeout)?,
        None => fut.await,
    }
}

fn print_policy(policy: &Policy) -> Result<(), CliError> {
    print_json(&serde_json::to_value(policy)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
