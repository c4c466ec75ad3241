//! Notification handler: local commands, relay round-trip, scheduled polls.
//!
//! One `RelayBot` per process. Every top-level operation (one inbound event,
//! one poll cycle) catches its own failures; nothing propagates to the host,
//! because an uncaught failure in a host-run callback disables the script.

use crate::commands::LocalCommand;
use crate::config::{resolve_poll_url, resolve_relay_url, Config, RelayMode};
use crate::host::{Broadcaster, Replier};
use crate::inbound::InboundEvent;
use crate::poll::{PollClient, SharedGate};
use crate::relay::{RelayClient, RelayExchange, RelayRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Relay client instance: owns the HTTP clients, the poll gate, and the
/// last-exchange/last-error slots backing /debug and /check-error.
pub struct RelayBot {
    relay: Option<RelayClient>,
    poll: Option<PollClient>,
    poll_interval: Duration,
    poll_on_message: bool,
    mode: RelayMode,
    gate: SharedGate,
    last_exchange: Mutex<Option<RelayExchange>>,
    last_error: Mutex<Option<String>>,
    running: AtomicBool,
}

impl RelayBot {
    pub fn from_config(config: &Config) -> Self {
        let mode = config.relay.mode;
        let relay = resolve_relay_url(config)
            .map(|url| RelayClient::new(url, config.relay.timeout(), mode));
        let poll = resolve_poll_url(config).map(|url| PollClient::new(url, config.poll.timeout()));
        Self {
            relay,
            poll,
            poll_interval: config.poll.interval(),
            poll_on_message: config.poll.on_message,
            mode,
            gate: SharedGate::new(),
            last_exchange: Mutex::new(None),
            last_error: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> RelayMode {
        self.mode
    }

    fn relay_url(&self) -> Option<&str> {
        self.relay.as_ref().map(|r| r.url())
    }

    /// Handle one inbound notification. At most one reply is emitted through
    /// `replier`; poll-triggered dispatches go through `broadcaster`.
    pub async fn handle(
        &self,
        event: &InboundEvent,
        replier: &dyn Replier,
        broadcaster: &dyn Broadcaster,
    ) {
        // Piggyback poll path for timer-less hosts. Best-effort: poll
        // failures must never affect the message response below.
        if self.poll_on_message {
            self.poll_scheduled(broadcaster).await;
        }

        if let Some(cmd) = LocalCommand::parse(&event.message) {
            let text = self.local_reply(cmd, event).await;
            self.deliver(replier, &text).await;
            return;
        }

        match self.relay_event(event).await {
            Ok(Some(text)) => self.deliver(replier, &text).await,
            Ok(None) => {
                if self.mode == RelayMode::Diagnostic {
                    self.deliver(replier, "no reply from server").await;
                }
            }
            Err(err) => {
                log::debug!("relay failed: {}", err);
                *self.last_error.lock().await = Some(err.clone());
                if self.mode == RelayMode::Diagnostic {
                    self.deliver(replier, &err).await;
                }
            }
        }
    }

    async fn relay_event(&self, event: &InboundEvent) -> Result<Option<String>, String> {
        let relay = self
            .relay
            .as_ref()
            .ok_or_else(|| "relay url not configured".to_string())?;
        let request = RelayRequest::from_event(event);
        let (result, exchange) = relay.relay(&request).await;
        if let Some(ex) = exchange {
            *self.last_exchange.lock().await = Some(ex);
        }
        match result {
            Ok(response) => Ok(response.reply_text().map(String::from)),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn local_reply(&self, cmd: LocalCommand, event: &InboundEvent) -> String {
        match cmd {
            LocalCommand::TestLocal => format!(
                "relay client online\nroom: {}\nsender: {}",
                event.room, event.sender
            ),
            LocalCommand::ServerAddress => format!(
                "relay server address:\n{}",
                self.relay_url().unwrap_or("(not configured)")
            ),
            LocalCommand::Debug => match self.last_exchange.lock().await.as_ref() {
                Some(ex) => format!(
                    "relay server address:\n{}\nstatus: {}\nresponse: {}",
                    self.relay_url().unwrap_or("(not configured)"),
                    ex.status.as_u16(),
                    ex.snippet
                ),
                None => "no relay call recorded yet".to_string(),
            },
            LocalCommand::CheckError => match self.last_error.lock().await.as_ref() {
                Some(e) => format!("last error: {}", e),
                None => "no error recorded".to_string(),
            },
        }
    }

    async fn deliver(&self, replier: &dyn Replier, text: &str) {
        if let Err(e) = replier.reply(text).await {
            log::debug!("reply failed: {}", e);
            *self.last_error.lock().await = Some(format!("reply failed: {}", e));
        }
    }

    /// Run one poll cycle if the cooldown allows it. All failures are
    /// swallowed; a degraded poll endpoint must never surface as chat noise.
    pub async fn poll_scheduled(&self, broadcaster: &dyn Broadcaster) {
        self.poll_at(Instant::now(), broadcaster).await;
    }

    /// Poll with an explicit clock reading (tests drive this directly).
    pub async fn poll_at(&self, now: Instant, broadcaster: &dyn Broadcaster) {
        let Some(poll) = self.poll.as_ref() else {
            return;
        };
        // The slot guard releases the gate on drop, so a panicking host hook
        // or a poll future dropped mid-request cannot wedge future polls.
        let Some(_slot) = self.gate.claim(now, self.poll_interval) else {
            return;
        };

        match poll.fetch().await {
            Ok(response) if response.success => {
                for msg in &response.messages {
                    if !msg.is_dispatchable() {
                        continue;
                    }
                    // Fire-and-forget: no acknowledgement, no retry.
                    if let Err(e) = broadcaster.send(&msg.room, &msg.message).await {
                        log::debug!("scheduled dispatch to {} failed: {}", msg.room, e);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => log::debug!("poll failed: {}", e),
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the poll timer task. The gate still applies, so the timer and
    /// the piggyback path compose. Returns a handle to await on shutdown.
    pub fn start_poll_timer(self: Arc<Self>, broadcaster: Arc<dyn Broadcaster>) -> JoinHandle<()> {
        if self.poll.is_none() {
            log::debug!("poll url not configured, timer not started");
            return tokio::spawn(async {});
        }
        self.running.store(true, Ordering::SeqCst);
        log::info!("starting scheduled-message poll timer");
        let interval = self.poll_interval;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            while self.running() {
                tick.tick().await;
                if !self.running() {
                    break;
                }
                self.poll_scheduled(broadcaster.as_ref()).await;
            }
            log::info!("poll timer stopped");
        })
    }

    /// Stop the poll timer loop after its current tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct RecordingReplier {
        replies: StdMutex<Vec<String>>,
    }

    impl RecordingReplier {
        fn new() -> Self {
            Self {
                replies: StdMutex::new(Vec::new()),
            }
        }

        fn replies(&self) -> Vec<String> {
            self.replies.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl Replier for RecordingReplier {
        async fn reply(&self, text: &str) -> Result<(), String> {
            self.replies.lock().expect("lock").push(text.to_string());
            Ok(())
        }
    }

    struct NullBroadcaster;

    #[async_trait]
    impl Broadcaster for NullBroadcaster {
        async fn send(&self, _room: &str, _text: &str) -> Result<(), String> {
            Ok(())
        }
    }

    fn event(message: &str) -> InboundEvent {
        InboundEvent {
            room: "dev".to_string(),
            sender: "jin".to_string(),
            message: message.to_string(),
            is_group_chat: false,
        }
    }

    fn bot_with_relay_url(url: &str) -> RelayBot {
        let mut config = Config::default();
        config.relay.url = Some(url.to_string());
        RelayBot::from_config(&config)
    }

    #[tokio::test]
    async fn test_local_replies_with_room_and_sender() {
        let bot = bot_with_relay_url("http://127.0.0.1:9/api/relay");
        let replier = RecordingReplier::new();
        bot.handle(&event("/test-local"), &replier, &NullBroadcaster)
            .await;
        let replies = replier.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("room: dev"));
        assert!(replies[0].contains("sender: jin"));
    }

    #[tokio::test]
    async fn server_address_echoes_relay_url() {
        let bot = bot_with_relay_url("http://127.0.0.1:9/api/relay");
        let replier = RecordingReplier::new();
        bot.handle(&event("/server-address"), &replier, &NullBroadcaster)
            .await;
        assert_eq!(
            replier.replies(),
            vec!["relay server address:\nhttp://127.0.0.1:9/api/relay".to_string()]
        );
    }

    #[tokio::test]
    async fn debug_before_any_relay_call() {
        let bot = bot_with_relay_url("http://127.0.0.1:9/api/relay");
        let replier = RecordingReplier::new();
        bot.handle(&event("/debug"), &replier, &NullBroadcaster)
            .await;
        assert_eq!(replier.replies(), vec!["no relay call recorded yet".to_string()]);
    }

    #[tokio::test]
    async fn check_error_before_any_failure() {
        let bot = bot_with_relay_url("http://127.0.0.1:9/api/relay");
        let replier = RecordingReplier::new();
        bot.handle(&event("/check-error"), &replier, &NullBroadcaster)
            .await;
        assert_eq!(replier.replies(), vec!["no error recorded".to_string()]);
    }

    #[tokio::test]
    async fn missing_relay_url_is_silent_in_production() {
        let bot = RelayBot::from_config(&Config::default());
        let replier = RecordingReplier::new();
        bot.handle(&event("hello"), &replier, &NullBroadcaster).await;
        assert!(replier.replies().is_empty());

        // but the failure is visible to /check-error
        bot.handle(&event("/check-error"), &replier, &NullBroadcaster)
            .await;
        assert_eq!(
            replier.replies(),
            vec!["last error: relay url not configured".to_string()]
        );
    }
}
