//! InputRouter: decides where captured input goes.
//!
//! The router is the heart of the host application. It owns the current
//! [`RoutingMode`] and, while a connection is up, a handle to that
//! connection's [`RemoteLink`].
//!
//! - **Local** – captured events stay on this machine; the router sends
//!   nothing.
//! - **Remote** – the capture backend withholds events from the local
//!   desktop and the router forwards each one: keys over the reliable
//!   stream (order and delivery matter), pointer events over datagrams
//!   (latency matters, an occasional lost delta does not).
//!
//! # Fail-safe
//!
//! Any send failure while in Remote mode drops the router straight back to
//! Local. Otherwise a dead link would leave the user unable to operate
//! either machine: the host's own desktop receives nothing while remote.
//! Every send is bounded by the router's send timeout, and one that stalls
//! counts as failed, so a peer that stops reading cannot hold the router.
//!
//! # Architecture
//!
//! The router depends only on the [`RemoteLink`] and [`CaptureControl`]
//! traits; both are injected, so every rule here is unit-testable without
//! sockets or OS hooks.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bridge_core::{
    current_timestamp_ms, EventType, InputPacket, ModifierFlags, MouseButton, SequenceCounter,
};
use bridge_net::{LinkError, RemoteLink, TransportError};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::infrastructure::input_capture::RawInputEvent;

/// Longest a single send to the client may take before it counts as failed.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(1000);

/// Which machine currently receives the user's physical input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingMode {
    #[default]
    Local,
    Remote,
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

/// Error type for the route-input use case.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no live connection to switch to")]
    NotConnected,
    #[error("send to client failed: {0}")]
    Link(#[from] LinkError),
}

/// User-visible events the router reports alongside its return values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterNotice {
    /// A switch to Remote was refused because no connection is live.
    SwitchRejected,
    /// The router left Remote mode without being asked to.
    FellBackToLocal { reason: String },
}

/// Toggles the capture backend between delivering input locally and
/// withholding it for the network.
#[cfg_attr(test, mockall::automock)]
pub trait CaptureControl: Send + Sync {
    fn set_remote_mode(&self, remote: bool);
}

enum ActiveLink {
    Disconnected,
    Connected(Arc<dyn RemoteLink>),
}

impl ActiveLink {
    fn live(&self) -> Option<&Arc<dyn RemoteLink>> {
        match self {
            Self::Connected(link) if link.is_live() => Some(link),
            _ => None,
        }
    }
}

/// Modifier keys and mouse buttons currently held on the host, stamped
/// onto every outgoing packet.
#[derive(Debug, Default, Clone, Copy)]
struct HeldState {
    shift: bool,
    ctrl: bool,
    alt: bool,
    win: bool,
    left: bool,
    right: bool,
    middle: bool,
}

impl HeldState {
    fn update(&mut self, event: &RawInputEvent) {
        match *event {
            RawInputEvent::KeyDown { vk_code } => self.update_key(vk_code, true),
            RawInputEvent::KeyUp { vk_code } => self.update_key(vk_code, false),
            RawInputEvent::MouseButtonDown { button } => self.update_button(button, true),
            RawInputEvent::MouseButtonUp { button } => self.update_button(button, false),
            RawInputEvent::MouseMove { .. } | RawInputEvent::MouseWheel { .. } => {}
        }
    }

    // Windows virtual-key codes: generic, left and right variants.
    fn update_key(&mut self, vk_code: i32, down: bool) {
        match vk_code {
            0x10 | 0xA0 | 0xA1 => self.shift = down,
            0x11 | 0xA2 | 0xA3 => self.ctrl = down,
            0x12 | 0xA4 | 0xA5 => self.alt = down,
            0x5B | 0x5C => self.win = down,
            _ => {}
        }
    }

    fn update_button(&mut self, button: MouseButton, down: bool) {
        match button {
            MouseButton::Left => self.left = down,
            MouseButton::Right => self.right = down,
            MouseButton::Middle => self.middle = down,
            MouseButton::X1 | MouseButton::X2 => {}
        }
    }

    fn flags(self) -> ModifierFlags {
        let mut bits = 0u16;
        for (held, bit) in [
            (self.shift, ModifierFlags::SHIFT),
            (self.ctrl, ModifierFlags::CTRL),
            (self.alt, ModifierFlags::ALT),
            (self.win, ModifierFlags::WIN),
            (self.left, ModifierFlags::LEFT_BUTTON),
            (self.right, ModifierFlags::RIGHT_BUTTON),
            (self.middle, ModifierFlags::MIDDLE_BUTTON),
        ] {
            if held {
                bits |= bit;
            }
        }
        ModifierFlags(bits)
    }
}

/// The Input Router.
pub struct InputRouter {
    mode: RoutingMode,
    link: ActiveLink,
    capture: Arc<dyn CaptureControl>,
    sequence: SequenceCounter,
    held: HeldState,
    send_timeout: Duration,
    mode_tx: watch::Sender<RoutingMode>,
    notices: mpsc::UnboundedSender<RouterNotice>,
}

impl InputRouter {
    /// Creates a router in Local mode with no connection, plus the receiver
    /// for its [`RouterNotice`]s.
    pub fn new(capture: Arc<dyn CaptureControl>) -> (Self, mpsc::UnboundedReceiver<RouterNotice>) {
        let (notices, notice_rx) = mpsc::unbounded_channel();
        let (mode_tx, _) = watch::channel(RoutingMode::Local);
        let router = Self {
            mode: RoutingMode::Local,
            link: ActiveLink::Disconnected,
            capture,
            sequence: SequenceCounter::new(),
            held: HeldState::default(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
            mode_tx,
            notices,
        };
        (router, notice_rx)
    }

    /// Replaces [`DEFAULT_SEND_TIMEOUT`].
    pub fn with_send_timeout(mut self, limit: Duration) -> Self {
        self.send_timeout = limit;
        self
    }

    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<RoutingMode> {
        self.mode_tx.subscribe()
    }

    /// `true` while a link is held and reports itself live.
    pub fn is_connected(&self) -> bool {
        self.link.live().is_some()
    }

    /// Hands the router the link of a freshly established connection.
    /// The router stays in its current (Local) mode until asked to switch.
    pub fn set_transports(&mut self, link: Arc<dyn RemoteLink>) {
        debug!("router received connection");
        self.link = ActiveLink::Connected(link);
    }

    /// Drops the connection handle and reverts to Local if necessary.
    pub fn handle_disconnect(&mut self) {
        self.link = ActiveLink::Disconnected;
        if self.mode == RoutingMode::Remote {
            self.fall_back_to_local("connection lost");
        }
    }

    /// Switches routing to `target`.
    ///
    /// Switching to Remote requires a live connection. The peer is told
    /// about every change with a SwitchNotify packet on the reliable stream.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::NotConnected`] when switching to Remote without
    /// a live connection (mode stays Local), and [`RouteError::Link`] when
    /// the SwitchNotify for a Remote switch cannot be sent (the router has
    /// then fallen back to Local).
    pub async fn switch_mode(&mut self, target: RoutingMode) -> Result<(), RouteError> {
        if target == self.mode {
            return Ok(());
        }

        if target == RoutingMode::Remote && self.link.live().is_none() {
            info!("switch to remote rejected: no live connection");
            self.notify(RouterNotice::SwitchRejected);
            return Err(RouteError::NotConnected);
        }

        self.apply_mode(target);
        let Some(link) = self.link.live().cloned() else {
            return Ok(());
        };

        let notice = InputPacket::switch_notify(target == RoutingMode::Remote)
            .with_timestamp(current_timestamp_ms());
        match bounded(self.send_timeout, link.send_reliable(&notice)).await {
            Ok(()) => Ok(()),
            Err(e) if target == RoutingMode::Remote => {
                self.fall_back_to_local(&format!("switch notify failed: {e}"));
                Err(e.into())
            }
            Err(e) => {
                // Already local; the peer will notice the dead link on its own.
                warn!(error = %e, "could not tell client about switch to local");
                Ok(())
            }
        }
    }

    /// Forces Local mode whatever the link state. Bound to a panic key in
    /// front ends; never fails.
    pub async fn emergency_release(&mut self) {
        warn!("emergency release: forcing local mode");
        let was_remote = self.mode == RoutingMode::Remote;
        self.apply_mode(RoutingMode::Local);
        // Repeat the capture toggle in case a previous call was lost.
        self.capture.set_remote_mode(false);
        if was_remote {
            if let Some(link) = self.link.live().cloned() {
                let notice = InputPacket::switch_notify(false).with_timestamp(current_timestamp_ms());
                if let Err(e) = bounded(self.send_timeout, link.send_reliable(&notice)).await {
                    debug!(error = %e, "switch notify after emergency release failed");
                }
            }
        }
    }

    /// Translates a captured event and routes it.
    ///
    /// # Errors
    ///
    /// See [`route`](Self::route).
    pub async fn handle_event(&mut self, event: RawInputEvent) -> Result<(), RouteError> {
        self.held.update(&event);
        let packet = event.to_packet().with_modifiers(self.held.flags());
        self.route(packet).await
    }

    /// Sends `packet` to the client if the router is in Remote mode.
    ///
    /// The packet is stamped with the next sequence number and the current
    /// time. Keys go over the reliable stream, pointer events over datagrams.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Link`] if the send fails; the router has then
    /// already fallen back to Local.
    pub async fn route(&mut self, packet: InputPacket) -> Result<(), RouteError> {
        if self.mode == RoutingMode::Local {
            return Ok(());
        }
        let link = match &self.link {
            ActiveLink::Connected(link) => Arc::clone(link),
            ActiveLink::Disconnected => {
                self.fall_back_to_local("no connection");
                return Err(RouteError::NotConnected);
            }
        };

        let packet = packet
            .with_sequence(self.sequence.next())
            .with_timestamp(current_timestamp_ms());
        let limit = self.send_timeout;
        let sent = match packet.event_type {
            t if t.is_keyboard() => bounded(limit, link.send_reliable(&packet)).await,
            t if t.is_pointer() => bounded(limit, link.send_datagram(&packet)).await,
            EventType::Heartbeat | EventType::SwitchNotify => {
                debug!(event = ?packet.event_type, "control packet is not routed from capture");
                return Ok(());
            }
            other => {
                debug!(event = ?other, "ignoring reserved event type");
                return Ok(());
            }
        };

        if let Err(e) = sent {
            self.fall_back_to_local(&format!("send failed: {e}"));
            return Err(e.into());
        }
        Ok(())
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    fn apply_mode(&mut self, mode: RoutingMode) {
        if self.mode != mode {
            info!(from = %self.mode, to = %mode, "routing mode changed");
        }
        self.mode = mode;
        self.capture.set_remote_mode(mode == RoutingMode::Remote);
        self.mode_tx.send_replace(mode);
    }

    fn fall_back_to_local(&mut self, reason: &str) {
        warn!(reason, "falling back to local input");
        self.apply_mode(RoutingMode::Local);
        self.notify(RouterNotice::FellBackToLocal {
            reason: reason.to_string(),
        });
    }

    fn notify(&self, notice: RouterNotice) {
        // Nobody listening is fine; notices are informational.
        let _ = self.notices.send(notice);
    }
}

/// Runs one send to the client, giving up after `limit`.
async fn bounded(
    limit: Duration,
    send: impl Future<Output = Result<(), LinkError>>,
) -> Result<(), LinkError> {
    match tokio::time::timeout(limit, send).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Stalled(limit).into()),
    }
}

/// Feeds captured events into the router until the capture channel closes
/// or `cancel` fires. Routing errors are logged; the router has already
/// made itself safe by then.
pub async fn run_capture_pump(
    router: Arc<Mutex<InputRouter>>,
    mut events: mpsc::UnboundedReceiver<RawInputEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        if let Err(e) = router.lock().await.handle_event(event).await {
            debug!(error = %e, "captured event not delivered");
        }
    }
    debug!("capture pump stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::predicate::eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    // ── Test doubles ──────────────────────────────────────────────────────────

    #[derive(Default)]
    struct RecordingLink {
        reliable: StdMutex<Vec<InputPacket>>,
        datagram: StdMutex<Vec<InputPacket>>,
        dead: AtomicBool,
        should_fail: AtomicBool,
        stalled: AtomicBool,
    }

    impl RecordingLink {
        fn reliable(&self) -> Vec<InputPacket> {
            self.reliable.lock().unwrap().clone()
        }

        fn datagram(&self) -> Vec<InputPacket> {
            self.datagram.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteLink for RecordingLink {
        fn is_live(&self) -> bool {
            !self.dead.load(Ordering::SeqCst)
        }

        async fn send_reliable(&self, packet: &InputPacket) -> Result<(), LinkError> {
            if self.stalled.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.should_fail.load(Ordering::SeqCst) {
                return Err(TransportError::Closed.into());
            }
            self.reliable.lock().unwrap().push(*packet);
            Ok(())
        }

        async fn send_datagram(&self, packet: &InputPacket) -> Result<(), LinkError> {
            if self.should_fail.load(Ordering::SeqCst) {
                return Err(TransportError::Closed.into());
            }
            self.datagram.lock().unwrap().push(*packet);
            Ok(())
        }
    }

    fn permissive_capture() -> Arc<dyn CaptureControl> {
        let mut capture = MockCaptureControl::new();
        capture.expect_set_remote_mode().return_const(());
        Arc::new(capture)
    }

    async fn remote_router() -> (
        InputRouter,
        Arc<RecordingLink>,
        mpsc::UnboundedReceiver<RouterNotice>,
    ) {
        let (mut router, notices) = InputRouter::new(permissive_capture());
        let link = Arc::new(RecordingLink::default());
        router.set_transports(link.clone());
        router
            .switch_mode(RoutingMode::Remote)
            .await
            .expect("switch to remote");
        (router, link, notices)
    }

    // ── Mode switching ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_switch_to_remote_without_connection_is_rejected() {
        // Arrange
        let mut capture = MockCaptureControl::new();
        capture.expect_set_remote_mode().never();
        let (mut router, mut notices) = InputRouter::new(Arc::new(capture));

        // Act
        let result = router.switch_mode(RoutingMode::Remote).await;

        // Assert
        assert!(matches!(result, Err(RouteError::NotConnected)));
        assert_eq!(router.mode(), RoutingMode::Local);
        assert_eq!(notices.try_recv().ok(), Some(RouterNotice::SwitchRejected));
    }

    #[tokio::test]
    async fn test_switch_to_remote_with_dead_link_is_rejected() {
        let (mut router, _notices) = InputRouter::new(permissive_capture());
        let link = Arc::new(RecordingLink::default());
        link.dead.store(true, Ordering::SeqCst);
        router.set_transports(link);

        let result = router.switch_mode(RoutingMode::Remote).await;

        assert!(matches!(result, Err(RouteError::NotConnected)));
        assert_eq!(router.mode(), RoutingMode::Local);
    }

    #[tokio::test]
    async fn test_switch_to_remote_toggles_capture_and_notifies_peer() {
        // Arrange
        let mut capture = MockCaptureControl::new();
        capture
            .expect_set_remote_mode()
            .with(eq(true))
            .times(1)
            .return_const(());
        let (mut router, _notices) = InputRouter::new(Arc::new(capture));
        let link = Arc::new(RecordingLink::default());
        router.set_transports(link.clone());
        let mut mode_rx = router.subscribe_mode();

        // Act
        router
            .switch_mode(RoutingMode::Remote)
            .await
            .expect("switch");

        // Assert
        assert_eq!(router.mode(), RoutingMode::Remote);
        assert_eq!(*mode_rx.borrow_and_update(), RoutingMode::Remote);
        let sent = link.reliable();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event_type, EventType::SwitchNotify);
        assert_eq!(sent[0].data1, 1);
        assert_eq!(sent[0].sequence, 0);
    }

    #[tokio::test]
    async fn test_failed_switch_notify_falls_back_to_local() {
        // Arrange
        let (mut router, mut notices) = InputRouter::new(permissive_capture());
        let link = Arc::new(RecordingLink::default());
        link.should_fail.store(true, Ordering::SeqCst);
        router.set_transports(link);

        // Act
        let result = router.switch_mode(RoutingMode::Remote).await;

        // Assert
        assert!(matches!(result, Err(RouteError::Link(_))));
        assert_eq!(router.mode(), RoutingMode::Local);
        assert!(matches!(
            notices.try_recv(),
            Ok(RouterNotice::FellBackToLocal { .. })
        ));
    }

    #[tokio::test]
    async fn test_switch_back_to_local_notifies_peer() {
        let (mut router, link, _notices) = remote_router().await;

        router.switch_mode(RoutingMode::Local).await.expect("switch");

        assert_eq!(router.mode(), RoutingMode::Local);
        let sent = link.reliable();
        assert_eq!(sent.last().map(|p| (p.event_type, p.data1)), Some((EventType::SwitchNotify, 0)));
    }

    // ── Routing ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_local_mode_sends_nothing() {
        let (mut router, _notices) = InputRouter::new(permissive_capture());
        let link = Arc::new(RecordingLink::default());
        router.set_transports(link.clone());

        router
            .handle_event(RawInputEvent::KeyDown { vk_code: 0x41 })
            .await
            .expect("route");

        assert!(link.reliable().is_empty());
        assert!(link.datagram().is_empty());
    }

    #[tokio::test]
    async fn test_keys_go_reliable_and_pointer_events_go_datagram() {
        // Arrange
        let (mut router, link, _notices) = remote_router().await;

        // Act
        for event in [
            RawInputEvent::KeyDown { vk_code: 0x41 },
            RawInputEvent::MouseMove { dx: 5, dy: -3 },
            RawInputEvent::MouseButtonDown { button: MouseButton::Left },
            RawInputEvent::MouseWheel { delta: 120 },
            RawInputEvent::KeyUp { vk_code: 0x41 },
        ] {
            router.handle_event(event).await.expect("route");
        }

        // Assert – the first reliable packet is the SwitchNotify
        let keys: Vec<_> = link.reliable().iter().skip(1).map(|p| p.event_type).collect();
        let pointer: Vec<_> = link.datagram().iter().map(|p| p.event_type).collect();
        assert_eq!(keys, vec![EventType::KeyDown, EventType::KeyUp]);
        assert_eq!(
            pointer,
            vec![
                EventType::MouseMove,
                EventType::MouseButtonDown,
                EventType::MouseScroll
            ]
        );
    }

    #[tokio::test]
    async fn test_routed_packets_carry_increasing_sequence_numbers() {
        let (mut router, link, _notices) = remote_router().await;

        for dx in 1..=3 {
            router
                .handle_event(RawInputEvent::MouseMove { dx, dy: 0 })
                .await
                .expect("route");
        }

        let sequences: Vec<u32> = link.datagram().iter().map(|p| p.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_held_modifiers_are_stamped_on_packets() {
        let (mut router, link, _notices) = remote_router().await;

        router
            .handle_event(RawInputEvent::KeyDown { vk_code: 0xA2 })
            .await
            .expect("ctrl down");
        router
            .handle_event(RawInputEvent::KeyDown { vk_code: 0x43 })
            .await
            .expect("c down");

        let c_down = link.reliable().last().copied().expect("packet");
        assert!(c_down.modifiers.ctrl());
        assert!(!c_down.modifiers.shift());
    }

    #[tokio::test]
    async fn test_send_failure_while_remote_falls_back_within_one_send() {
        // Arrange
        let (mut router, link, mut notices) = remote_router().await;
        link.should_fail.store(true, Ordering::SeqCst);

        // Act
        let result = router
            .handle_event(RawInputEvent::MouseMove { dx: 1, dy: 1 })
            .await;

        // Assert
        assert!(matches!(result, Err(RouteError::Link(_))));
        assert_eq!(router.mode(), RoutingMode::Local);
        assert!(matches!(
            notices.try_recv(),
            Ok(RouterNotice::FellBackToLocal { .. })
        ));
    }

    #[tokio::test]
    async fn test_stalled_key_send_counts_as_failure() {
        // Arrange – the client stopped reading; the send never completes
        let (router, link, mut notices) = remote_router().await;
        let mut router = router.with_send_timeout(Duration::from_millis(30));
        link.stalled.store(true, Ordering::SeqCst);

        // Act
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            router.handle_event(RawInputEvent::KeyDown { vk_code: 0x41 }),
        )
        .await
        .expect("send is bounded");

        // Assert
        assert!(matches!(
            result,
            Err(RouteError::Link(LinkError::Transport(TransportError::Stalled(_))))
        ));
        assert_eq!(router.mode(), RoutingMode::Local);
        assert!(matches!(
            notices.try_recv(),
            Ok(RouterNotice::FellBackToLocal { .. })
        ));
    }

    #[tokio::test]
    async fn test_stalled_pump_cannot_lock_out_switch_to_local() {
        // Arrange – the pump holds the router while its key send hangs
        let (router, link, _notices) = remote_router().await;
        let router = Arc::new(Mutex::new(
            router.with_send_timeout(Duration::from_millis(50)),
        ));
        link.stalled.store(true, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(run_capture_pump(
            Arc::clone(&router),
            rx,
            CancellationToken::new(),
        ));
        tx.send(RawInputEvent::KeyDown { vk_code: 0x41 }).expect("send");
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Act
        let switched = tokio::time::timeout(Duration::from_secs(1), async {
            router.lock().await.switch_mode(RoutingMode::Local).await
        })
        .await;

        // Assert
        assert!(matches!(switched, Ok(Ok(()))));
        assert_eq!(router.lock().await.mode(), RoutingMode::Local);
        drop(tx);
        pump.await.expect("pump ends");
    }

    // ── Disconnect and emergency release ──────────────────────────────────────

    #[tokio::test]
    async fn test_disconnect_while_remote_reverts_to_local_and_drops_link() {
        let (mut router, _link, _notices) = remote_router().await;

        router.handle_disconnect();

        assert_eq!(router.mode(), RoutingMode::Local);
        assert!(!router.is_connected());
        assert!(matches!(
            router.switch_mode(RoutingMode::Remote).await,
            Err(RouteError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_emergency_release_forces_local_even_when_link_is_dead() {
        // Arrange
        let (mut router, link, _notices) = remote_router().await;
        link.should_fail.store(true, Ordering::SeqCst);

        // Act
        router.emergency_release().await;

        // Assert
        assert_eq!(router.mode(), RoutingMode::Local);
    }

    #[tokio::test]
    async fn test_capture_pump_routes_until_channel_closes() {
        // Arrange
        let (router, link, _notices) = remote_router().await;
        let router = Arc::new(Mutex::new(router));
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(RawInputEvent::KeyDown { vk_code: 0x20 }).expect("send");
        tx.send(RawInputEvent::MouseMove { dx: 2, dy: 2 }).expect("send");
        drop(tx);

        // Act
        run_capture_pump(router, rx, CancellationToken::new()).await;

        // Assert
        assert_eq!(link.reliable().len(), 2);
        assert_eq!(link.datagram().len(), 1);
    }
}
