//! Injector that reports events instead of synthesizing them.

use bridge_core::{ModifierFlags, MouseButton};
use tracing::info;

use crate::application::dispatch_input::{InjectionError, InputInjector};

#[derive(Debug, Default)]
pub struct LoggingInjector;

impl LoggingInjector {
    pub fn new() -> Self {
        Self
    }
}

impl InputInjector for LoggingInjector {
    fn key_down(&self, vk_code: i32, modifiers: ModifierFlags) -> Result<(), InjectionError> {
        info!(vk_code, modifiers = modifiers.0, "key down");
        Ok(())
    }

    fn key_up(&self, vk_code: i32, modifiers: ModifierFlags) -> Result<(), InjectionError> {
        info!(vk_code, modifiers = modifiers.0, "key up");
        Ok(())
    }

    fn mouse_move(&self, dx: i32, dy: i32) -> Result<(), InjectionError> {
        info!(dx, dy, "pointer moved");
        Ok(())
    }

    fn mouse_button(&self, button: MouseButton, pressed: bool) -> Result<(), InjectionError> {
        info!(?button, pressed, "mouse button");
        Ok(())
    }

    fn scroll(&self, delta: i32) -> Result<(), InjectionError> {
        info!(delta, "wheel");
        Ok(())
    }
}
