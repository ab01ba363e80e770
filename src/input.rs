use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Pixels of trackpad scroll treated as one wheel line.
const PIXELS_PER_LINE: f32 = 120.0;

/// Pointer and keyboard state accumulated between two frames.
///
/// Positions and deltas are in physical window pixels.
#[derive(Default)]
pub struct Input {
    keys_pressed: HashSet<KeyCode>,
    buttons_down: HashSet<MouseButton>,
    buttons_pressed: HashSet<MouseButton>,
    buttons_released: HashSet<MouseButton>,
    cursor: Option<Vec2>,
    cursor_delta: Vec2,
    scroll_lines: f32,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-frame state once the frame has consumed it.
    pub fn end_frame(&mut self) {
        self.keys_pressed.clear();
        self.buttons_pressed.clear();
        self.buttons_released.clear();
        self.cursor_delta = Vec2::ZERO;
        self.scroll_lines = 0.0;
    }

    /// Fold a window event into the current state.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state == ElementState::Pressed && !event.repeat {
                        self.keys_pressed.insert(key);
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => self.press(*button),
                ElementState::Released => self.release(*button),
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.move_cursor(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.scroll_lines += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
                };
            }
            WindowEvent::Focused(false) => {
                // Releases that happen outside the window never arrive
                let held: Vec<MouseButton> = self.buttons_down.iter().copied().collect();
                for button in held {
                    self.release(button);
                }
            }
            _ => {}
        }
    }

    pub(crate) fn press(&mut self, button: MouseButton) {
        if self.buttons_down.insert(button) {
            self.buttons_pressed.insert(button);
        }
    }

    pub(crate) fn release(&mut self, button: MouseButton) {
        if self.buttons_down.remove(&button) {
            self.buttons_released.insert(button);
        }
    }

    pub(crate) fn move_cursor(&mut self, position: Vec2) {
        if let Some(previous) = self.cursor {
            self.cursor_delta += position - previous;
        }
        self.cursor = Some(position);
    }

    pub(crate) fn scroll(&mut self, lines: f32) {
        self.scroll_lines += lines;
    }

    pub(crate) fn press_key(&mut self, key: KeyCode) {
        self.keys_pressed.insert(key);
    }

    /// True if the key went down this frame.
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn mouse_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    /// True if the button went down this frame.
    pub fn mouse_pressed(&self, button: MouseButton) -> bool {
        self.buttons_pressed.contains(&button)
    }

    /// True if the button went up this frame.
    pub fn mouse_released(&self, button: MouseButton) -> bool {
        self.buttons_released.contains(&button)
    }

    /// Cursor position, or `None` while the cursor is outside the window.
    pub fn cursor(&self) -> Option<Vec2> {
        self.cursor
    }

    pub fn cursor_delta(&self) -> Vec2 {
        self.cursor_delta
    }

    /// Wheel movement this frame in lines, positive when scrolling away from the user.
    pub fn scroll_lines(&self) -> f32 {
        self.scroll_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_cursor_sample_has_no_delta() {
        let mut input = Input::new();
        input.move_cursor(Vec2::new(10.0, 10.0));
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
        input.move_cursor(Vec2::new(15.0, 7.0));
        assert_eq!(input.cursor_delta(), Vec2::new(5.0, -3.0));
    }

    #[test]
    fn press_and_release_are_edge_triggered() {
        let mut input = Input::new();
        input.press(MouseButton::Left);
        input.press(MouseButton::Left);
        assert!(input.mouse_pressed(MouseButton::Left));
        input.end_frame();
        assert!(!input.mouse_pressed(MouseButton::Left));
        assert!(input.mouse_down(MouseButton::Left));
        input.release(MouseButton::Left);
        assert!(input.mouse_released(MouseButton::Left));
        assert!(!input.mouse_down(MouseButton::Left));
    }

    #[test]
    fn end_frame_clears_deltas() {
        let mut input = Input::new();
        input.move_cursor(Vec2::ZERO);
        input.move_cursor(Vec2::ONE);
        input.scroll(2.0);
        input.end_frame();
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
        assert_eq!(input.scroll_lines(), 0.0);
        assert_eq!(input.cursor(), Some(Vec2::ONE));
    }
}
