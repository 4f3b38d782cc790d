//! Client side of the realtime gateway.
//!
//! A [`ConnectionManager`] owns one socket per user session. A single driver
//! task runs the socket, the heartbeat and the reconnect sleeps; the manager
//! itself only touches shared state behind short locks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};
use url::Url;

use super::config::ClientConfig;
use super::reconnect::{Backoff, DisconnectReason};
use super::state::{ConnectionState, Session};
use crate::models::{ClientEvent, ServerEvent};
use crate::utils::ScopeGuard;
use crate::ws::RoomKey;

pub type SubscriptionId = u64;

/// Leaves its room when dropped.
pub type RoomGuard<'a> = ScopeGuard<Box<dyn FnOnce() + Send + 'a>>;

type Handler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Why a room is wanted: an explicit join, live guards, or both.
#[derive(Debug, Default)]
struct RoomIntent {
    joined: bool,
    holders: usize,
}

impl RoomIntent {
    fn wanted(&self) -> bool {
        self.joined || self.holders > 0
    }
}

#[derive(Debug, Clone, Copy)]
enum RoomChange {
    Join,
    Leave,
    Acquire,
    Release,
}

struct Shared {
    state: watch::Sender<ConnectionState>,
    attempts: AtomicU32,
    online: Mutex<BTreeSet<String>>,
    /// Desired rooms; a key is present only while it is wanted.
    rooms: Mutex<BTreeMap<RoomKey, RoomIntent>>,
    /// Present while a session is up.
    outbound: Mutex<Option<mpsc::UnboundedSender<ClientEvent>>>,
    handlers: Mutex<BTreeMap<SubscriptionId, Handler>>,
    next_id: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state,
            attempts: AtomicU32::new(0),
            online: Mutex::new(BTreeSet::new()),
            rooms: Mutex::new(BTreeMap::new()),
            outbound: Mutex::new(None),
            handlers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// `Closed` is terminal; every other transition goes through.
    fn set_state(&self, next: ConnectionState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == ConnectionState::Closed || *current == next {
                return false;
            }
            debug!("Connection state {} -> {}", current, next);
            *current = next;
            true
        })
    }

    fn send(&self, frame: ClientEvent) {
        if let Some(tx) = lock(&self.outbound).as_ref() {
            if tx.send(frame).is_err() {
                debug!("Session writer gone, frame dropped");
            }
        }
    }

    fn dispatch(&self, text: &str) {
        if self.current() == ConnectionState::Closed {
            return;
        }

        let event: ServerEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                debug!("Ignoring unrecognised gateway frame: {}", e);
                return;
            }
        };

        match &event {
            ServerEvent::UserOnline(presence) => {
                lock(&self.online).insert(presence.user_id.clone());
            }
            ServerEvent::UserOffline(presence) => {
                lock(&self.online).remove(&presence.user_id);
            }
            ServerEvent::UsersOnline(list) => {
                let mut online = lock(&self.online);
                online.clear();
                online.extend(list.user_ids.iter().cloned());
            }
            ServerEvent::Error(err) => warn!("Gateway reported an error: {}", err.message),
            _ => {}
        }

        // Handlers may subscribe or unsubscribe, so call them outside the lock
        let handlers: Vec<Handler> = lock(&self.handlers).values().cloned().collect();
        for handler in handlers {
            if self.current() == ConnectionState::Closed {
                break;
            }
            handler(&event);
        }
    }
}

/// Realtime connection for one user session.
pub struct ConnectionManager {
    config: ClientConfig,
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::new()),
            driver: Mutex::new(None),
        }
    }

    /// Start the driver task for `token`. Must be called inside a Tokio
    /// runtime. A no-op while a driver is running and after [`close`].
    ///
    /// [`close`]: ConnectionManager::close
    pub fn connect(&self, token: &str) {
        if self.shared.current() == ConnectionState::Closed {
            debug!("Connect ignored: manager is closed");
            return;
        }

        let mut driver = lock(&self.driver);
        if driver.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Connect ignored: already connected or connecting");
            return;
        }

        self.shared.attempts.store(0, Ordering::SeqCst);
        let handle = tokio::spawn(run_driver(self.config.clone(), self.shared.clone(), token.to_string()));
        *driver = Some(handle);
    }

    /// Follow the owning session: connect when authenticated, tear down on
    /// sign-out.
    pub fn on_session(&self, session: &Session) {
        match session {
            Session::Authenticated { access_token } => self.connect(access_token),
            Session::Unauthenticated => self.close(),
            Session::Loading => {}
        }
    }

    /// Tear down for good: no reconnects and no further callbacks.
    pub fn close(&self) {
        let was_closed = !self.shared.set_state(ConnectionState::Closed);
        if was_closed {
            return;
        }
        info!("Closing realtime connection");
        lock(&self.shared.handlers).clear();
        lock(&self.shared.outbound).take();
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.current()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Attempts made since the last successful connect.
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Sorted snapshot of the users the gateway reported online.
    pub fn online_users(&self) -> Vec<String> {
        lock(&self.shared.online).iter().cloned().collect()
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        lock(&self.shared.online).contains(user_id)
    }

    /// Rooms this manager wants to be in.
    pub fn rooms(&self) -> Vec<RoomKey> {
        lock(&self.shared.rooms).keys().cloned().collect()
    }

    pub fn join_hackathon(&self, hackathon_id: &str) {
        self.join(RoomKey::hackathon(hackathon_id));
    }

    pub fn leave_hackathon(&self, hackathon_id: &str) {
        self.leave(RoomKey::hackathon(hackathon_id));
    }

    pub fn join_team(&self, team_id: &str) {
        self.join(RoomKey::team(team_id));
    }

    pub fn leave_team(&self, team_id: &str) {
        self.leave(RoomKey::team(team_id));
    }

    pub fn join(&self, room: RoomKey) {
        self.update_room(room, RoomChange::Join);
    }

    pub fn leave(&self, room: RoomKey) {
        self.update_room(room, RoomChange::Leave);
    }

    /// Hold `room` until the returned guard is dropped. Guards are counted
    /// apart from `join`/`leave`, so the room stays while either wants it.
    pub fn enter_room(&self, room: RoomKey) -> RoomGuard<'_> {
        self.update_room(room.clone(), RoomChange::Acquire);
        ScopeGuard::new(Box::new(move || self.update_room(room, RoomChange::Release)))
    }

    /// A join frame goes out when a room becomes wanted and a leave frame
    /// when it stops being wanted. The rooms lock is held while sending so
    /// a session replaying joins never interleaves with this update.
    fn update_room(&self, room: RoomKey, change: RoomChange) {
        if !room.is_client_joinable() || room.id().is_empty() {
            warn!("Ignoring {:?} for room '{}'", change, room);
            return;
        }

        let mut rooms = lock(&self.shared.rooms);
        let intent = rooms.entry(room.clone()).or_default();
        let was_wanted = intent.wanted();
        match change {
            RoomChange::Join => intent.joined = true,
            RoomChange::Leave => intent.joined = false,
            RoomChange::Acquire => intent.holders += 1,
            RoomChange::Release => intent.holders = intent.holders.saturating_sub(1),
        }
        let wanted = intent.wanted();
        if !wanted {
            rooms.remove(&room);
        }

        let frame = match (was_wanted, wanted) {
            (false, true) => ClientEvent::join(&room),
            (true, false) => ClientEvent::leave(&room),
            _ => None,
        };
        if let Some(frame) = frame {
            self.shared.send(frame);
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.shared.handlers).insert(id, Arc::new(handler));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock(&self.shared.handlers).remove(&id).is_some()
    }

    /// Feed a raw gateway frame as if it arrived on the socket.
    #[cfg(test)]
    pub(crate) fn inject(&self, text: &str) {
        self.shared.dispatch(text);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

async fn wait_closed(rx: &mut watch::Receiver<ConnectionState>) {
    let _ = rx.wait_for(|state| *state == ConnectionState::Closed).await;
}

async fn run_driver(config: ClientConfig, shared: Arc<Shared>, token: String) {
    let url = match config.endpoint(&token) {
        Ok(url) => url,
        Err(e) => {
            error!("Cannot connect to the realtime gateway: {}", e);
            shared.set_state(ConnectionState::Disconnected);
            return;
        }
    };

    let mut closed = shared.state.subscribe();
    let mut backoff = Backoff::new(config.reconnect_policy());

    loop {
        let reason = run_session(&config, &shared, &url, &mut backoff, &mut closed).await;
        if reason == DisconnectReason::ClientClose {
            break;
        }

        let delay = backoff.next_delay(reason);
        shared.attempts.store(backoff.attempts(), Ordering::SeqCst);
        let Some(delay) = delay else {
            warn!("Realtime connection lost ({}), not reconnecting after {} attempts", reason, backoff.attempts());
            shared.set_state(ConnectionState::Disconnected);
            break;
        };

        info!("Realtime connection lost ({}), retry {} in {:?}", reason, backoff.attempts(), delay);
        shared.set_state(ConnectionState::Reconnecting);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = wait_closed(&mut closed) => break,
        }
    }

    debug!("Realtime driver stopped");
}

async fn run_session(
    config: &ClientConfig,
    shared: &Shared,
    url: &Url,
    backoff: &mut Backoff,
    closed: &mut watch::Receiver<ConnectionState>,
) -> DisconnectReason {
    shared.set_state(ConnectionState::Connecting);

    let connected = tokio::select! {
        res = connect_async(url.as_str()) => res,
        _ = wait_closed(closed) => return DisconnectReason::ClientClose,
    };
    let stream = match connected {
        Ok((stream, _)) => stream,
        Err(WsError::Http(resp)) if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
            warn!("Realtime gateway refused the session token ({})", resp.status());
            return DisconnectReason::Unauthorized;
        }
        Err(e) => {
            warn!("Realtime gateway connect failed: {}", e);
            return DisconnectReason::ConnectError;
        }
    };

    let (mut write, mut read) = stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ClientEvent>();

    {
        let rooms = lock(&shared.rooms);
        *lock(&shared.outbound) = Some(tx.clone());
        backoff.reset();
        shared.attempts.store(0, Ordering::SeqCst);
        shared.set_state(ConnectionState::Connected);
        for room in rooms.keys() {
            if let Some(frame) = ClientEvent::join(room) {
                let _ = tx.send(frame);
            }
        }
        info!("Connected to realtime gateway, rejoining {} rooms", rooms.len());
    }
    drop(tx);

    let every = config.heartbeat_interval();
    let mut heartbeat = interval_at(Instant::now() + every, every);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            _ = wait_closed(closed) => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "client disconnect".into(),
                };
                if let Err(e) = write.send(Message::Close(Some(frame))).await {
                    debug!("Failed to send close frame: {}", e);
                }
                break DisconnectReason::ClientClose;
            }
            Some(frame) = rx.recv() => {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode {}: {}", frame.event_name(), e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::text(text)).await {
                    warn!("Realtime send failed: {}", e);
                    break DisconnectReason::TransportError;
                }
            }
            _ = heartbeat.tick() => {
                shared.send(ClientEvent::Ping);
            }
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => shared.dispatch(text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    debug!("Gateway closed the session: {:?}", frame);
                    break DisconnectReason::ServerDisconnect;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Realtime transport error: {}", e);
                    break DisconnectReason::TransportError;
                }
                None => break DisconnectReason::TransportClose,
            },
        }
    };

    lock(&shared.outbound).take();
    reason
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{accept_async, WebSocketStream};

    type ServerSocket = WebSocketStream<TcpStream>;

    const WAIT: Duration = Duration::from_secs(5);

    /// Accepts WebSocket sessions and hands each one to the test.
    async fn gateway() -> (String, mpsc::UnboundedReceiver<ServerSocket>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(ws) = accept_async(stream).await {
                    if tx.send(ws).is_err() {
                        break;
                    }
                }
            }
        });
        (format!("http://{}", addr), rx)
    }

    fn config(url: &str) -> ClientConfig {
        ClientConfig {
            heartbeat_interval_ms: 60_000,
            reconnection_delay_ms: 10,
            reconnection_delay_max_ms: 50,
            server_disconnect_backoff_ms: 20,
            ..ClientConfig::with_url(url)
        }
    }

    async fn accept(sessions: &mut mpsc::UnboundedReceiver<ServerSocket>) -> ServerSocket {
        tokio::time::timeout(WAIT, sessions.recv()).await.expect("no session").unwrap()
    }

    async fn next_json(ws: &mut ServerSocket) -> Value {
        loop {
            let msg = tokio::time::timeout(WAIT, ws.next()).await.expect("no frame").unwrap().unwrap();
            if let Message::Text(text) = msg {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    async fn send_json(ws: &mut ServerSocket, value: Value) {
        ws.send(Message::text(value.to_string())).await.unwrap();
    }

    async fn wait_for_state(manager: &ConnectionManager, state: ConnectionState) {
        let mut rx = manager.state_changes();
        tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state)).await.expect("state not reached").unwrap();
    }

    async fn eventually(check: impl Fn() -> bool) {
        tokio::time::timeout(WAIT, async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not met");
    }

    #[tokio::test]
    async fn connect_reaches_connected_and_tracks_presence() {
        let (url, mut sessions) = gateway().await;
        let manager = ConnectionManager::new(config(&url));
        manager.connect("tok");
        let mut server = accept(&mut sessions).await;
        wait_for_state(&manager, ConnectionState::Connected).await;
        assert!(manager.is_connected());
        assert_eq!(manager.reconnect_attempts(), 0);

        send_json(&mut server, json!({"event": "users:online", "data": {"userIds": ["u2", "u1"]}})).await;
        send_json(&mut server, json!({"event": "user:offline", "data": {"userId": "u1"}})).await;
        send_json(&mut server, json!({"event": "user:online", "data": {"userId": "u3"}})).await;
        eventually(|| manager.online_users() == vec!["u2".to_string(), "u3".to_string()]).await;
        assert!(manager.is_online("u3"));
        assert!(!manager.is_online("u1"));

        send_json(&mut server, json!({"event": "users:online", "data": {"userIds": ["u9"]}})).await;
        eventually(|| manager.online_users() == vec!["u9".to_string()]).await;
    }

    #[tokio::test]
    async fn rooms_joined_before_connect_are_replayed() {
        let (url, mut sessions) = gateway().await;
        let manager = ConnectionManager::new(config(&url));
        manager.join_hackathon("h1");
        manager.join_team("t1");
        manager.connect("tok");

        let mut server = accept(&mut sessions).await;
        let frames = vec![next_json(&mut server).await, next_json(&mut server).await];
        assert!(frames.contains(&json!({"event": "join:hackathon", "data": {"hackathonId": "h1"}})));
        assert!(frames.contains(&json!({"event": "join:team", "data": {"teamId": "t1"}})));

        manager.leave_team("t1");
        assert_eq!(next_json(&mut server).await, json!({"event": "leave:team", "data": {"teamId": "t1"}}));
        assert_eq!(manager.rooms(), vec![RoomKey::hackathon("h1")]);
    }

    #[tokio::test]
    async fn shared_rooms_leave_on_last_holder() {
        let (url, mut sessions) = gateway().await;
        let manager = ConnectionManager::new(config(&url));
        manager.connect("tok");
        let mut server = accept(&mut sessions).await;
        wait_for_state(&manager, ConnectionState::Connected).await;

        let first = manager.enter_room(RoomKey::team("t1"));
        let second = manager.enter_room(RoomKey::team("t1"));
        assert_eq!(next_json(&mut server).await, json!({"event": "join:team", "data": {"teamId": "t1"}}));

        drop(first);
        assert_eq!(manager.rooms(), vec![RoomKey::team("t1")]);
        drop(second);
        assert_eq!(next_json(&mut server).await, json!({"event": "leave:team", "data": {"teamId": "t1"}}));
        assert!(manager.rooms().is_empty());
    }

    #[tokio::test]
    async fn repeated_joins_are_undone_by_one_leave() {
        let (url, mut sessions) = gateway().await;
        let manager = ConnectionManager::new(config(&url));
        manager.connect("tok");
        let mut server = accept(&mut sessions).await;
        wait_for_state(&manager, ConnectionState::Connected).await;

        manager.join_hackathon("h1");
        manager.join_hackathon("h1");
        manager.leave_hackathon("h1");
        assert!(manager.rooms().is_empty());
        assert_eq!(next_json(&mut server).await, json!({"event": "join:hackathon", "data": {"hackathonId": "h1"}}));
        assert_eq!(next_json(&mut server).await, json!({"event": "leave:hackathon", "data": {"hackathonId": "h1"}}));

        // A second leave has nothing to undo
        manager.leave_hackathon("h1");
        manager.join_team("t1");
        assert_eq!(next_json(&mut server).await, json!({"event": "join:team", "data": {"teamId": "t1"}}));
    }

    #[test]
    fn explicit_join_outlives_room_guards() {
        let manager = ConnectionManager::new(ClientConfig::default());
        let guard = manager.enter_room(RoomKey::team("t1"));
        manager.join_team("t1");
        drop(guard);
        assert_eq!(manager.rooms(), vec![RoomKey::team("t1")]);

        let guard = manager.enter_room(RoomKey::team("t1"));
        manager.leave_team("t1");
        assert_eq!(manager.rooms(), vec![RoomKey::team("t1")]);
        drop(guard);
        assert!(manager.rooms().is_empty());
    }

    #[tokio::test]
    async fn server_disconnect_reconnects_and_rejoins() {
        let (url, mut sessions) = gateway().await;
        let manager = ConnectionManager::new(config(&url));
        manager.join_team("t1");
        manager.connect("tok");

        let mut first = accept(&mut sessions).await;
        next_json(&mut first).await;
        first.close(None).await.unwrap();

        let mut second = accept(&mut sessions).await;
        assert_eq!(next_json(&mut second).await, json!({"event": "join:team", "data": {"teamId": "t1"}}));
        wait_for_state(&manager, ConnectionState::Connected).await;
        assert_eq!(manager.reconnect_attempts(), 0);
    }

    #[tokio::test]
    async fn unauthorized_handshake_is_not_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let manager = ConnectionManager::new(config(&url));
        manager.connect("expired");

        let (mut stream, _) = tokio::time::timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf).await.unwrap();
        stream
            .write_all(b"HTTP/1.1 401 Unauthorized\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await
            .unwrap();

        wait_for_state(&manager, ConnectionState::Disconnected).await;
        assert!(tokio::time::timeout(Duration::from_millis(200), listener.accept()).await.is_err());
        assert_eq!(manager.reconnect_attempts(), 0);
    }

    #[tokio::test]
    async fn gives_up_after_attempt_ceiling() {
        // Nothing listens on the port once the listener is dropped
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let manager = ConnectionManager::new(config(&url));
        manager.connect("tok");
        eventually(|| manager.reconnect_attempts() == 5 && manager.state() == ConnectionState::Disconnected).await;
    }

    #[tokio::test]
    async fn duplicate_connect_is_ignored() {
        let (url, mut sessions) = gateway().await;
        let manager = ConnectionManager::new(config(&url));
        manager.connect("tok");
        manager.connect("tok");
        let _server = accept(&mut sessions).await;
        wait_for_state(&manager, ConnectionState::Connected).await;
        manager.connect("tok");
        assert!(tokio::time::timeout(Duration::from_millis(200), sessions.recv()).await.is_err());
    }

    #[tokio::test]
    async fn heartbeat_pings_while_connected() {
        let (url, mut sessions) = gateway().await;
        let manager = ConnectionManager::new(ClientConfig {
            heartbeat_interval_ms: 30,
            ..config(&url)
        });
        manager.connect("tok");
        let mut server = accept(&mut sessions).await;
        assert_eq!(next_json(&mut server).await, json!({"event": "ping"}));
        assert_eq!(next_json(&mut server).await, json!({"event": "ping"}));
    }

    #[tokio::test]
    async fn heartbeat_stops_with_its_session() {
        let (url, mut sessions) = gateway().await;
        let manager = ConnectionManager::new(ClientConfig {
            heartbeat_interval_ms: 30,
            server_disconnect_backoff_ms: 200,
            ..config(&url)
        });
        manager.join_team("t1");
        manager.connect("tok");

        let mut first = accept(&mut sessions).await;
        assert_eq!(next_json(&mut first).await, json!({"event": "join:team", "data": {"teamId": "t1"}}));
        assert_eq!(next_json(&mut first).await, json!({"event": "ping"}));
        first.close(None).await.unwrap();
        wait_for_state(&manager, ConnectionState::Reconnecting).await;

        // Ticks during the backoff must not be queued for the next session
        let mut second = accept(&mut sessions).await;
        assert_eq!(next_json(&mut second).await, json!({"event": "join:team", "data": {"teamId": "t1"}}));
        assert_eq!(next_json(&mut second).await, json!({"event": "ping"}));

        manager.close();
        loop {
            match tokio::time::timeout(WAIT, second.next()).await.unwrap() {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(Message::Text(text))) if text.as_str().contains("ping") => continue,
                Some(Ok(other)) => panic!("unexpected frame {:?}", other),
            }
        }
        assert!(tokio::time::timeout(Duration::from_millis(100), second.next())
            .await
            .map_or(true, |msg| !matches!(msg, Some(Ok(Message::Text(_))))));
    }

    #[test]
    fn no_callbacks_after_close() {
        let manager = ConnectionManager::new(ClientConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        manager.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        manager.inject(r#"{"event":"pong"}"#);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        manager.close();
        manager.inject(r#"{"event":"pong"}"#);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_the_manager_releases_subscribers() {
        let (url, mut sessions) = gateway().await;
        let manager = ConnectionManager::new(config(&url));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        manager.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        manager.connect("tok");
        let mut server = accept(&mut sessions).await;
        send_json(&mut server, json!({"event": "pong"})).await;
        eventually(|| calls.load(Ordering::SeqCst) == 1).await;

        drop(manager);
        // The handler, and with it the counter clone, is gone
        assert_eq!(Arc::strong_count(&calls), 1);
        let _ = server.send(Message::text(json!({"event": "pong"}).to_string())).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn subscribers_see_events_until_unsubscribed() {
        let (url, mut sessions) = gateway().await;
        let manager = ConnectionManager::new(config(&url));
        let (seen_tx, mut seen) = mpsc::unbounded_channel();
        let id = manager.subscribe(move |event| {
            let _ = seen_tx.send(event.event_name());
        });
        manager.connect("tok");
        let mut server = accept(&mut sessions).await;

        send_json(&mut server, json!({"event": "leaderboard:update", "data": {"leaderboard": []}})).await;
        assert_eq!(tokio::time::timeout(WAIT, seen.recv()).await.unwrap(), Some("leaderboard:update"));

        assert!(manager.unsubscribe(id));
        assert!(!manager.unsubscribe(id));
        send_json(&mut server, json!({"event": "pong"})).await;
        assert!(tokio::time::timeout(Duration::from_millis(100), seen.recv()).await.unwrap_or(None).is_none());
    }

    #[tokio::test]
    async fn sign_out_closes_socket_for_good() {
        let (url, mut sessions) = gateway().await;
        let manager = ConnectionManager::new(config(&url));
        manager.on_session(&Session::Authenticated { access_token: "tok".into() });
        let mut server = accept(&mut sessions).await;
        wait_for_state(&manager, ConnectionState::Connected).await;

        manager.on_session(&Session::Unauthenticated);
        assert_eq!(manager.state(), ConnectionState::Closed);
        let msg = tokio::time::timeout(WAIT, server.next()).await.unwrap();
        assert!(matches!(msg, Some(Ok(Message::Close(_))) | None));

        manager.connect("tok");
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(tokio::time::timeout(Duration::from_millis(200), sessions.recv()).await.is_err());
    }

    #[tokio::test]
    async fn dropping_the_manager_closes_the_socket() {
        let (url, mut sessions) = gateway().await;
        let manager = ConnectionManager::new(config(&url));
        manager.connect("tok");
        let mut server = accept(&mut sessions).await;
        wait_for_state(&manager, ConnectionState::Connected).await;

        drop(manager);
        let msg = tokio::time::timeout(WAIT, server.next()).await.unwrap();
        assert!(matches!(msg, Some(Ok(Message::Close(_))) | None));
    }
}
