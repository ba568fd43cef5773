use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc};
use techrad_core::{
    AppMessage, Bridge, ChannelLink, Config, FetchHandle, FileStore, FixedLocation,
    KeyValueStore, LocationProvider, NoLocation, Position, Query, provider::provider_from_config,
    settings,
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::mpsc::UnboundedReceiver,
    task::JoinHandle,
};
use tracing::{info, warn};

/// A host event read from stdin, one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    /// App (re)started.
    Ready,
    /// Wearable asked for fresh data.
    Refresh,
    /// Settings window closed with this payload.
    SettingsClosed(String),
    /// Settings window requested; print the form.
    ShowSettings,
}

impl Event {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        match name {
            "ready" => Some(Event::Ready),
            "refresh" | "appmessage" => Some(Event::Refresh),
            "settings" => Some(Event::SettingsClosed(rest.trim().to_string())),
            "page" => Some(Event::ShowSettings),
            _ => None,
        }
    }
}

pub fn open_store(data_dir: Option<PathBuf>) -> Result<Arc<dyn KeyValueStore>> {
    let path = match data_dir {
        Some(dir) => dir.join("storage.json"),
        None => Config::storage_file_path()?,
    };
    let store = FileStore::open(&path)?;
    info!(path = %store.path().display(), "Opened storage");
    Ok(Arc::new(store))
}

pub struct Host {
    bridge: Bridge,
    outbound: UnboundedReceiver<AppMessage>,
}

impl Host {
    pub fn new(config: &Config, data_dir: Option<PathBuf>, position: Option<Position>) -> Result<Self> {
        let store = open_store(data_dir)?;
        let provider = provider_from_config(config)?;
        let location: Arc<dyn LocationProvider> = match position.or(config.fixed_position()) {
            Some(position) => Arc::new(FixedLocation::new(position)),
            None => Arc::new(NoLocation),
        };

        let (link, outbound) = ChannelLink::pair();
        let bridge = Bridge::new(
            store,
            provider,
            location,
            Arc::new(link),
            config.bridge_options(),
        );

        Ok(Self { bridge, outbound })
    }

    /// Startup, then react to stdin events until EOF. In-flight fetches are allowed to finish.
    pub async fn run(self) -> Result<()> {
        self.run_with(BufReader::new(tokio::io::stdin())).await
    }

    async fn run_with<R: AsyncBufRead + Unpin>(self, input: R) -> Result<()> {
        let Host { bridge, outbound } = self;
        let printer = spawn_printer(outbound);
        let mut pending = Pending::default();

        pending.track(bridge.on_ready().await);

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read input")? {
            if line.trim().is_empty() {
                continue;
            }
            match Event::parse(&line) {
                Some(Event::Ready) => pending.track(bridge.on_ready().await),
                Some(Event::Refresh) => pending.track(bridge.on_app_message().await),
                Some(Event::SettingsClosed(payload)) => {
                    pending.track(bridge.on_settings_closed(&payload).await)
                }
                Some(Event::ShowSettings) => {
                    println!("{}", settings::render_page(&bridge.settings()))
                }
                None => warn!(line = %line.trim(), "Unknown event"),
            }
        }

        info!(fetches = pending.len(), "Input closed, waiting for in-flight fetches");
        pending.join_all().await;
        drop(bridge);
        printer.await.context("Printer task failed")?;
        Ok(())
    }

    /// Fetch for `query` (or the configured city / location) and wait for both responses.
    pub async fn fetch_once(self, query: Option<Query>) -> Result<()> {
        let Host { bridge, outbound } = self;
        let printer = spawn_printer(outbound);

        let handle = match query {
            Some(query) => Some(bridge.fetch_weather(query)),
            None => bridge.on_app_message().await,
        };
        if let Some(handle) = handle {
            handle.join().await;
        }

        drop(bridge);
        printer.await.context("Printer task failed")?;
        Ok(())
    }
}

/// Fetches started by the event loop that may still be writing to the store.
#[derive(Debug, Default)]
struct Pending {
    handles: Vec<FetchHandle>,
}

impl Pending {
    fn track(&mut self, handle: Option<FetchHandle>) {
        self.handles.retain(|h| !h.is_finished());
        self.handles.extend(handle);
    }

    fn len(&self) -> usize {
        self.handles.len()
    }

    async fn join_all(self) {
        for handle in self.handles {
            handle.join().await;
        }
    }
}

/// Writes each wearable message as one JSON line on stdout.
fn spawn_printer(mut outbound: UnboundedReceiver<AppMessage>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            match serde_json::to_string(&message) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "Failed to encode message"),
            }
        }
    })
}
