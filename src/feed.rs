use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::digits::parse_price;

/// How long a request waits for its matching response.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Keepalive interval; the venue drops idle connections after ~2 minutes.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Market-data event delivered to the session's consumer.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Bulk tick history for a symbol, oldest to newest.
    History { symbol: String, prices: Vec<Decimal> },
    /// One live price tick.
    Tick { symbol: String, price: Decimal },
    /// The socket closed; no further events will arrive.
    Closed,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// Shared handle to one venue WebSocket connection.
///
/// Outgoing messages go through a writer task; incoming messages are routed
/// by a reader task: `tick`/`history` streams to the feed channel, and
/// request/response messages to a `req_id`-keyed pending table, so several
/// in-flight requests never need listener choreography.
#[derive(Clone)]
pub struct Session {
    cmd_tx: mpsc::UnboundedSender<String>,
    pending: PendingMap,
    next_req_id: Arc<AtomicU64>,
}

/// Connect to the venue and spawn the reader/writer/keepalive tasks.
///
/// Market-data events are delivered on `feed_tx`; everything else is matched
/// to requests made through [`Session::request`].
pub async fn connect(url: &str, feed_tx: mpsc::UnboundedSender<FeedEvent>) -> Result<Session> {
    let (ws, _) = connect_async(url)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    let (mut write, mut read) = ws.split();

    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<String>();
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

    tokio::spawn(async move {
        while let Some(text) = cmd_rx.recv().await {
            if let Err(e) = write.send(Message::Text(text.into())).await {
                warn!("websocket write failed: {e}");
                break;
            }
        }
    });

    let keepalive_tx = cmd_tx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PING_INTERVAL);
        interval.tick().await; // first tick fires immediately
        loop {
            interval.tick().await;
            if keepalive_tx.send(json!({ "ping": 1 }).to_string()).is_err() {
                break;
            }
        }
    });

    let reader_pending = pending.clone();
    tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    route_message(text.as_str(), &feed_tx, &reader_pending);
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {} // ping/pong/binary
                Err(e) => {
                    warn!("websocket read error: {e}");
                    break;
                }
            }
        }
        let _ = feed_tx.send(FeedEvent::Closed);
    });

    Ok(Session {
        cmd_tx,
        pending,
        next_req_id: Arc::new(AtomicU64::new(1)),
    })
}

fn route_message(text: &str, feed_tx: &mpsc::UnboundedSender<FeedEvent>, pending: &PendingMap) {
    let parsed: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!("unparseable message from venue: {e}");
            return;
        }
    };
    let msg_type = parsed.get("msg_type").and_then(|v| v.as_str()).unwrap_or("");

    match msg_type {
        "tick" => {
            let tick = &parsed["tick"];
            let symbol = tick.get("symbol").and_then(|v| v.as_str()).unwrap_or("");
            match parse_price(&tick["quote"]) {
                Ok(price) if !symbol.is_empty() => {
                    let _ = feed_tx.send(FeedEvent::Tick {
                        symbol: symbol.to_string(),
                        price,
                    });
                }
                Ok(_) => warn!("tick without symbol dropped"),
                Err(e) => warn!(symbol, "tick with bad quote dropped: {e}"),
            }
        }
        "history" => {
            let symbol = parsed["echo_req"]
                .get("ticks_history")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let raw = parsed["history"]["prices"].as_array().cloned().unwrap_or_default();
            let mut prices = Vec::with_capacity(raw.len());
            for value in &raw {
                match parse_price(value) {
                    Ok(p) => prices.push(p),
                    Err(e) => {
                        warn!(%symbol, "history price dropped: {e}");
                    }
                }
            }
            debug!(%symbol, count = prices.len(), "history received");
            let _ = feed_tx.send(FeedEvent::History { symbol, prices });
        }
        "ping" => {}
        _ => {
            // Request/response traffic, matched by req_id. Error responses
            // are delivered too, so the requester can classify them.
            let req_id = parsed.get("req_id").and_then(|v| v.as_u64());
            if let Some(id) = req_id {
                let waiter = pending.lock().expect("pending table poisoned").remove(&id);
                if let Some(tx) = waiter {
                    let _ = tx.send(parsed);
                    return;
                }
            }
            if let Some(err) = parsed.get("error") {
                let message = err.get("message").and_then(|v| v.as_str()).unwrap_or("unknown");
                warn!(msg_type, "venue error: {message}");
            }
        }
    }
}

impl Session {
    /// Send a request and await the response matched by `req_id`.
    ///
    /// The returned value may carry an `error` object; callers inspect it.
    pub async fn request(&self, mut body: Value) -> Result<Value> {
        let id = self.next_req_id.fetch_add(1, Ordering::Relaxed);
        body["req_id"] = json!(id);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending table poisoned")
            .insert(id, tx);

        if self.cmd_tx.send(body.to_string()).is_err() {
            self.pending.lock().expect("pending table poisoned").remove(&id);
            anyhow::bail!("connection closed");
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => anyhow::bail!("connection closed while awaiting response"),
            Err(_) => {
                self.pending.lock().expect("pending table poisoned").remove(&id);
                anyhow::bail!("request timed out after {REQUEST_TIMEOUT:?}")
            }
        }
    }

    /// Fire-and-forget send, used for stream subscriptions.
    pub fn send(&self, body: Value) -> Result<()> {
        self.cmd_tx
            .send(body.to_string())
            .map_err(|_| anyhow::anyhow!("connection closed"))
    }

    /// Authorize the session with an API token.
    pub async fn authorize(&self, token: &str) -> Result<Value> {
        let resp = self.request(json!({ "authorize": token })).await?;
        if let Some(err) = resp.get("error") {
            let message = err.get("message").and_then(|v| v.as_str()).unwrap_or("unknown");
            anyhow::bail!("authorization failed: {message}");
        }
        Ok(resp["authorize"].clone())
    }

    /// Request historical ticks and subscribe to the live stream in one call.
    /// The history lands on the feed channel first, then live ticks follow.
    pub fn subscribe_ticks(&self, symbol: &str, count: usize) -> Result<()> {
        self.send(json!({
            "ticks_history": symbol,
            "count": count,
            "end": "latest",
            "style": "ticks",
            "subscribe": 1,
        }))
    }

    /// Query the current account balance.
    pub async fn balance(&self) -> Result<(f64, String)> {
        let resp = self.request(json!({ "balance": 1 })).await?;
        if let Some(err) = resp.get("error") {
            let message = err.get("message").and_then(|v| v.as_str()).unwrap_or("unknown");
            anyhow::bail!("balance query failed: {message}");
        }
        let balance = resp["balance"]["balance"].as_f64().unwrap_or(0.0);
        let currency = resp["balance"]["currency"]
            .as_str()
            .unwrap_or("")
            .to_string();
        Ok((balance, currency))
    }
}
