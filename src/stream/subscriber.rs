use std::fmt;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::config::StreamConfig;
use crate::error::{Context, Result};

use super::book::PriceBook;
use super::message::decode_message;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
    Failed(String),
}

impl ConnectionStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionStatus::Open)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => f.write_str("connecting"),
            ConnectionStatus::Open => f.write_str("live"),
            ConnectionStatus::Closed => f.write_str("disconnected"),
            ConnectionStatus::Failed(reason) => write!(f, "error: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Updated(String),
    Ignored,
}

/// Decode one text frame and fold it into the book.
pub fn process_frame(book: &mut PriceBook, text: &str) -> Result<FrameOutcome> {
    let Some(event) = decode_message(text)?.into_ticker() else {
        return Ok(FrameOutcome::Ignored);
    };

    match book.apply(&event)? {
        Some(snapshot) => Ok(FrameOutcome::Updated(snapshot.symbol.clone())),
        None => Ok(FrameOutcome::Ignored),
    }
}

/// Single multiplexed URL: `{endpoint}/btcusdt@miniTicker/ethusdt@miniTicker/...`.
pub fn stream_url(config: &StreamConfig) -> Result<Url> {
    let channels = config
        .pairs()
        .iter()
        .map(|pair| format!("{}@{}", pair.to_lowercase(), config.channel))
        .collect::<Vec<_>>()
        .join("/");
    let raw = format!("{}/{}", config.endpoint.trim_end_matches('/'), channels);
    let url = Url::parse(&raw).with_context(|| format!("Invalid stream URL: {raw}"))?;
    Ok(url)
}

/// Owns the live ticker connection. Dropping it stops the stream.
pub struct PriceSubscriber {
    prices: watch::Receiver<PriceBook>,
    status: watch::Receiver<ConnectionStatus>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PriceSubscriber {
    /// Seed placeholders for every tracked symbol and start the connection task.
    pub fn activate(config: &StreamConfig) -> Result<Self> {
        let url = stream_url(config)?;
        let (prices_tx, prices_rx) = watch::channel(PriceBook::from_config(config));
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run_connection(url, prices_tx, status_tx, shutdown_rx));

        Ok(Self {
            prices: prices_rx,
            status: status_rx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn prices(&self) -> watch::Receiver<PriceBook> {
        self.prices.clone()
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn snapshot(&self) -> PriceBook {
        self.prices.borrow().clone()
    }

    pub fn current_status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Close the socket and wait for the connection task to finish.
    pub async fn deactivate(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                warn!("Ticker stream did not stop in time; aborting");
                task.abort();
            }
        }
    }
}

impl Drop for PriceSubscriber {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn run_connection(
    url: Url,
    prices: watch::Sender<PriceBook>,
    status: watch::Sender<ConnectionStatus>,
    mut shutdown: oneshot::Receiver<()>,
) {
    info!("Connecting to {}...", url);

    let connected = tokio::select! {
        biased;
        _ = &mut shutdown => {
            info!("Ticker stream deactivated before connecting");
            status.send_replace(ConnectionStatus::Closed);
            return;
        }
        result = connect_async(url.as_str()) => result,
    };

    let ws_stream = match connected {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            error!("Ticker stream connection failed: {}", e);
            status.send_replace(ConnectionStatus::Failed(e.to_string()));
            return;
        }
    };

    info!("Ticker stream connected");
    status.send_replace(ConnectionStatus::Open);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Closing ticker stream");
                if let Err(e) = write.send(Message::Close(None)).await {
                    warn!("Failed to send close frame: {}", e);
                }
                break;
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    prices.send_if_modified(|book| match process_frame(book, text.as_str()) {
                        Ok(FrameOutcome::Updated(symbol)) => {
                            trace!("Ticker update for {}", symbol);
                            true
                        }
                        Ok(FrameOutcome::Ignored) => {
                            debug!("Ignoring ticker frame: {}", text.as_str());
                            false
                        }
                        Err(e) => {
                            warn!("Dropping ticker frame: {}", e);
                            false
                        }
                    });
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("Ticker stream closed by server: {:?}", frame);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Ticker stream error: {}", e);
                    status.send_replace(ConnectionStatus::Failed(e.to_string()));
                    return;
                }
                None => {
                    warn!("Ticker stream ended unexpectedly");
                    break;
                }
            }
        }
    }

    info!("Ticker stream disconnected");
    status.send_replace(ConnectionStatus::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;

    const WAIT: Duration = Duration::from_secs(5);
    const BTC_FRAME: &str = r#"{"stream":"btcusdt@miniTicker","data":{"e":"24hrMiniTicker","E":1700000000123,"s":"BTCUSDT","c":"36510.4216","o":"35000.0","h":"37000.009","l":"34800.1","v":"21543.12645","q":"786543210.55"}}"#;

    fn local_config(endpoint: String) -> StreamConfig {
        let mut config = Config::builtin().stream;
        config.endpoint = endpoint;
        config
    }

    #[test]
    fn joins_channels_into_one_path() {
        let url = stream_url(&Config::builtin().stream).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://stream.binance.com:9443/ws/btcusdt@miniTicker/ethusdt@miniTicker/xrpusdt@miniTicker/dogeusdt@miniTicker"
        );
    }

    #[test]
    fn frames_update_one_symbol_and_skip_noise() {
        let mut book = PriceBook::from_config(&Config::builtin().stream);
        let before = book.clone();

        assert_eq!(
            process_frame(&mut book, r#"{"result":null,"id":1}"#).unwrap(),
            FrameOutcome::Ignored
        );
        assert!(process_frame(&mut book, "garbage").is_err());
        assert_eq!(book, before);

        assert_eq!(
            process_frame(&mut book, BTC_FRAME).unwrap(),
            FrameOutcome::Updated("BTC".to_string())
        );
        assert_eq!(book.get("BTC").unwrap().price, "36510.42");
        assert_eq!(book.get("ETH"), before.get("ETH"));
    }

    #[tokio::test]
    async fn streams_updates_and_closes_on_deactivate() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(Message::Text(BTC_FRAME.to_string().into()))
                .await
                .unwrap();
            while let Some(msg) = ws.next().await {
                match msg {
                    Ok(Message::Close(_)) => return true,
                    Ok(_) => continue,
                    Err(_) => return false,
                }
            }
            false
        });

        let subscriber = PriceSubscriber::activate(&local_config(format!("ws://{addr}/ws"))).unwrap();
        assert_eq!(subscriber.snapshot().len(), 4);

        let mut prices = subscriber.prices();
        timeout(
            WAIT,
            prices.wait_for(|book| book.get("BTC").map(|s| s.price != "0.00").unwrap_or(false)),
        )
        .await
        .expect("timed out waiting for BTC update")
        .expect("price channel closed");

        let book = subscriber.snapshot();
        assert_eq!(book.get("BTC").unwrap().price, "36510.42");
        assert_eq!(book.get("ETH").unwrap().price, "0.00");
        assert!(subscriber.current_status().is_open());

        let mut status = subscriber.status();
        subscriber.deactivate().await;

        let saw_close = timeout(WAIT, server).await.unwrap().unwrap();
        assert!(saw_close, "server should receive a close frame");
        assert_eq!(*status.borrow_and_update(), ConnectionStatus::Closed);
    }

    #[tokio::test]
    async fn server_close_marks_stream_closed_and_keeps_last_prices() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(Message::Text(BTC_FRAME.to_string().into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let subscriber = PriceSubscriber::activate(&local_config(format!("ws://{addr}/ws"))).unwrap();
        let mut status = subscriber.status();

        timeout(WAIT, status.wait_for(|s| *s == ConnectionStatus::Closed))
            .await
            .expect("timed out waiting for close")
            .expect("status channel closed");
        timeout(WAIT, server).await.unwrap().unwrap();

        let book = subscriber.snapshot();
        assert_eq!(book.get("BTC").unwrap().price, "36510.42");
        assert_eq!(book.get("BTC").unwrap().high, "37000.01");
        assert_eq!(book.get("ETH").unwrap().price, "0.00");
        assert_eq!(subscriber.current_status(), ConnectionStatus::Closed);

        subscriber.deactivate().await;
    }

    #[tokio::test]
    async fn refused_connection_reports_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let subscriber = PriceSubscriber::activate(&local_config(format!("ws://{addr}/ws"))).unwrap();
        let mut status = subscriber.status();

        timeout(
            WAIT,
            status.wait_for(|s| matches!(s, ConnectionStatus::Failed(_))),
        )
        .await
        .expect("timed out waiting for failure")
        .expect("status channel closed");

        assert_eq!(subscriber.snapshot().get("BTC").unwrap().price, "0.00");
    }
}
