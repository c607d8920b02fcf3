//! Recording injector for tests.
//!
//! # Why a mock injector?
//!
//! Real injectors press keys and move the cursor on the machine running the
//! tests, and need a desktop session to do it. `MockInputInjector` only
//! records each call in order so assertions can inspect exactly what would
//! have been injected.
//!
//! Call [`MockInputInjector::set_failing`] to make every call return
//! [`InjectionError::Platform`] and exercise error paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use bridge_core::{ModifierFlags, MouseButton};

use crate::application::dispatch_input::{InjectionError, InputInjector};

/// One recorded injector call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injected {
    KeyDown(i32, ModifierFlags),
    KeyUp(i32, ModifierFlags),
    Move(i32, i32),
    Button(MouseButton, bool),
    Scroll(i32),
}

#[derive(Debug, Default)]
pub struct MockInputInjector {
    events: Mutex<Vec<Injected>>,
    failing: AtomicBool,
}

impl MockInputInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything injected so far, oldest first.
    pub fn events(&self) -> Vec<Injected> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, event: Injected) -> Result<(), InjectionError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(InjectionError::Platform("mock failure".into()));
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

impl InputInjector for MockInputInjector {
    fn key_down(&self, vk_code: i32, modifiers: ModifierFlags) -> Result<(), InjectionError> {
        self.record(Injected::KeyDown(vk_code, modifiers))
    }

    fn key_up(&self, vk_code: i32, modifiers: ModifierFlags) -> Result<(), InjectionError> {
        self.record(Injected::KeyUp(vk_code, modifiers))
    }

    fn mouse_move(&self, dx: i32, dy: i32) -> Result<(), InjectionError> {
        self.record(Injected::Move(dx, dy))
    }

    fn mouse_button(&self, button: MouseButton, pressed: bool) -> Result<(), InjectionError> {
        self.record(Injected::Button(button, pressed))
    }

    fn scroll(&self, delta: i32) -> Result<(), InjectionError> {
        self.record(Injected::Scroll(delta))
    }
}
