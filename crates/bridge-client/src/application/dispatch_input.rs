//! InputDispatcher: replays received packets as local input.
//!
//! This use case sits at the application layer and delegates the actual OS
//! call to an [`InputInjector`] trait object supplied by the infrastructure
//! layer.
//!
//! Besides forwarding, the dispatcher remembers which keys and mouse buttons
//! it has pressed and not yet released. When the connection drops, or the
//! host hands control back to itself, [`InputDispatcher::release_all`] lets
//! go of exactly those, so nothing stays stuck down on this machine.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bridge_core::{EventType, InputPacket, ModifierFlags, MouseButton};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Error type for input injection.
#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("platform error: {0}")]
    Platform(String),
    #[error("unknown mouse button code {0}")]
    UnknownButton(i32),
}

/// Synthesizes input on this machine.
///
/// One implementation per platform lives in the infrastructure layer. Key
/// codes are OS virtual-key codes exactly as the host captured them.
pub trait InputInjector: Send + Sync {
    fn key_down(&self, vk_code: i32, modifiers: ModifierFlags) -> Result<(), InjectionError>;

    fn key_up(&self, vk_code: i32, modifiers: ModifierFlags) -> Result<(), InjectionError>;

    /// Moves the pointer by a relative offset.
    fn mouse_move(&self, dx: i32, dy: i32) -> Result<(), InjectionError>;

    fn mouse_button(&self, button: MouseButton, pressed: bool) -> Result<(), InjectionError>;

    fn scroll(&self, delta: i32) -> Result<(), InjectionError>;
}

/// Keys and buttons currently pressed by this dispatcher.
#[derive(Debug, Default)]
struct Held {
    keys: BTreeSet<i32>,
    buttons: BTreeSet<MouseButton>,
}

pub struct InputDispatcher {
    injector: Arc<dyn InputInjector>,
    held: Mutex<Held>,
    controlled: watch::Sender<bool>,
}

impl InputDispatcher {
    pub fn new(injector: Arc<dyn InputInjector>) -> Self {
        let (controlled, _) = watch::channel(false);
        Self {
            injector,
            held: Mutex::new(Held::default()),
            controlled,
        }
    }

    /// `true` while the host has announced that it drives this machine.
    pub fn is_controlled(&self) -> bool {
        *self.controlled.borrow()
    }

    /// Watch channel for the "being controlled" indicator.
    pub fn subscribe_control(&self) -> watch::Receiver<bool> {
        self.controlled.subscribe()
    }

    /// Replays one packet.
    ///
    /// Heartbeats and handshake markers are not input and are ignored. A
    /// SwitchNotify updates the control indicator; losing control releases
    /// everything still held.
    ///
    /// # Errors
    ///
    /// Returns [`InjectionError`] if the platform call fails or a button
    /// code is unknown. Held-state is only updated on success.
    pub fn dispatch(&self, packet: &InputPacket) -> Result<(), InjectionError> {
        let modifiers = packet.modifiers;
        match packet.event_type {
            EventType::KeyDown => {
                let mut held = self.held();
                self.injector.key_down(packet.data1, modifiers)?;
                held.keys.insert(packet.data1);
            }
            EventType::KeyUp => {
                let mut held = self.held();
                self.injector.key_up(packet.data1, modifiers)?;
                held.keys.remove(&packet.data1);
            }
            EventType::MouseMove => self.injector.mouse_move(packet.data1, packet.data2)?,
            EventType::MouseButtonDown | EventType::MouseButtonUp => {
                let button = MouseButton::try_from(packet.data1)
                    .map_err(InjectionError::UnknownButton)?;
                let pressed = packet.event_type == EventType::MouseButtonDown;
                let mut held = self.held();
                self.injector.mouse_button(button, pressed)?;
                if pressed {
                    held.buttons.insert(button);
                } else {
                    held.buttons.remove(&button);
                }
            }
            EventType::MouseScroll => self.injector.scroll(packet.data1)?,
            EventType::SwitchNotify => self.set_controlled(packet.data1 != 0),
            EventType::Heartbeat | EventType::HandshakeRequest | EventType::HandshakeResponse => {
                debug!(event = ?packet.event_type, "not an input event");
            }
        }
        Ok(())
    }

    /// Releases every key and button this dispatcher still holds down.
    /// Returns how many releases were issued. Failures are logged.
    pub fn release_all(&self) -> usize {
        let held = std::mem::take(&mut *self.held());
        let count = held.keys.len() + held.buttons.len();
        if count == 0 {
            return 0;
        }
        info!(keys = held.keys.len(), buttons = held.buttons.len(), "releasing held input");

        for vk_code in held.keys {
            if let Err(e) = self.injector.key_up(vk_code, ModifierFlags::empty()) {
                warn!(vk_code, error = %e, "key release failed");
            }
        }
        for button in held.buttons {
            if let Err(e) = self.injector.mouse_button(button, false) {
                warn!(?button, error = %e, "button release failed");
            }
        }
        count
    }

    /// Drops control: releases held input and clears the indicator.
    pub fn reset(&self) {
        self.release_all();
        self.controlled.send_replace(false);
    }

    fn set_controlled(&self, controlled: bool) {
        let was = self.controlled.send_replace(controlled);
        if was != controlled {
            info!(controlled, "host changed input ownership");
        }
        if !controlled {
            self.release_all();
        }
    }

    fn held(&self) -> MutexGuard<'_, Held> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
