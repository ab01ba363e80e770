//! Debug panel for the moon light and the music.
//!
//! The panel sits in the top-right corner, collapses when its title is
//! clicked and is hidden and shown with `H`. Sliders are bound to
//! [`SceneLights`] fields through plain getter and setter functions.
//!
//! Layout is computed in logical pixels and scaled to physical pixels when
//! drawn or hit-tested.

use glam::Vec2;
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use crate::assets::{Assets, FontId};
use crate::draw2d::{Color, Draw2d};
use crate::input::Input;
use crate::lighting::SceneLights;

const PANEL_WIDTH: f32 = 245.0;
const PANEL_MARGIN: f32 = 15.0;
const ROW_HEIGHT: f32 = 24.0;
const PADDING: f32 = 6.0;
const LABEL_FRACTION: f32 = 0.4;
const NUMBER_WIDTH: f32 = 48.0;
const TITLE: &str = "Controls";

/// Something a panel button asks the viewer to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelAction {
    PlayAudio,
    StopAudio,
}

/// A numeric slider bound to one light parameter.
#[derive(Clone, Copy, Debug)]
pub struct SliderBinding {
    pub label: &'static str,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    get: fn(&SceneLights) -> f32,
    set: fn(&mut SceneLights, f32),
}

impl SliderBinding {
    pub fn get(&self, lights: &SceneLights) -> f32 {
        (self.get)(lights)
    }

    /// Write `value` clamped to the slider range.
    pub fn set(&self, lights: &mut SceneLights, value: f32) {
        (self.set)(lights, value.clamp(self.min, self.max));
    }

    /// Round to the nearest step, then clamp.
    pub fn snap(&self, value: f32) -> f32 {
        if self.step <= 0.0 {
            return value.clamp(self.min, self.max);
        }
        ((value / self.step).round() * self.step).clamp(self.min, self.max)
    }

    /// Position of the current value along the track, 0 to 1.
    fn fraction(&self, lights: &SceneLights) -> f32 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((self.get(lights) - self.min) / span).clamp(0.0, 1.0)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Control {
    Button {
        label: &'static str,
        action: PanelAction,
    },
    Slider(SliderBinding),
}

impl Control {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Button { label, .. } => *label,
            Self::Slider(s) => s.label,
        }
    }
}

/// What the panel did with this frame's input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PanelResponse {
    /// The pointer belongs to the panel and must not reach the camera.
    pub captured: bool,
    pub action: Option<PanelAction>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Row {
    Title,
    Control(usize),
}

/// Panel rectangle in logical pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
struct PanelRect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl PanelRect {
    fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }

    fn track(&self) -> (f32, f32) {
        let start = self.x + self.width * LABEL_FRACTION;
        let end = self.x + self.width - PADDING - NUMBER_WIDTH - PADDING;
        (start, (end - start).max(1.0))
    }
}

pub struct DebugPanel {
    controls: Vec<Control>,
    collapsed: bool,
    hidden: bool,
    dragging: Option<usize>,
    hovered: Option<usize>,
}

impl Default for DebugPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugPanel {
    /// Music buttons plus moon intensity and position sliders.
    pub fn new() -> Self {
        let axis = |label: &'static str,
                    get: fn(&SceneLights) -> f32,
                    set: fn(&mut SceneLights, f32)| {
            Control::Slider(SliderBinding {
                label,
                min: -5.0,
                max: 5.0,
                step: 0.001,
                get,
                set,
            })
        };
        let controls = vec![
            Control::Button {
                label: "Play Audio",
                action: PanelAction::PlayAudio,
            },
            Control::Button {
                label: "Stop Audio",
                action: PanelAction::StopAudio,
            },
            Control::Slider(SliderBinding {
                label: "intensity",
                min: 0.0,
                max: 10.0,
                step: 0.001,
                get: |l| l.moon.intensity,
                set: |l, v| l.moon.intensity = v,
            }),
            axis("x", |l| l.moon.position.x, |l, v| l.moon.position.x = v),
            axis("y", |l| l.moon.position.y, |l, v| l.moon.position.y = v),
            axis("z", |l| l.moon.position.z, |l, v| l.moon.position.z = v),
        ];
        Self {
            controls,
            collapsed: false,
            hidden: false,
            dragging: None,
            hovered: None,
        }
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    /// Slider with the given label.
    pub fn slider(&self, label: &str) -> Option<&SliderBinding> {
        self.controls.iter().find_map(|c| match c {
            Control::Slider(s) if s.label == label => Some(s),
            _ => None,
        })
    }

    /// Set a slider by label, clamped to its range. Returns false for unknown labels.
    pub fn set(&self, lights: &mut SceneLights, label: &str, value: f32) -> bool {
        match self.slider(label) {
            Some(slider) => {
                slider.set(lights, value);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, lights: &SceneLights, label: &str) -> Option<f32> {
        self.slider(label).map(|s| s.get(lights))
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn toggle_hidden(&mut self) {
        self.hidden = !self.hidden;
        self.dragging = None;
    }

    pub fn toggle_collapsed(&mut self) {
        self.collapsed = !self.collapsed;
        self.dragging = None;
    }

    fn rect(&self, viewport_width: f32) -> PanelRect {
        let rows = if self.collapsed {
            1
        } else {
            1 + self.controls.len()
        };
        PanelRect {
            x: (viewport_width - PANEL_WIDTH - PANEL_MARGIN).max(0.0),
            y: 0.0,
            width: PANEL_WIDTH,
            height: rows as f32 * ROW_HEIGHT,
        }
    }

    fn row_at(&self, rect: &PanelRect, p: Vec2) -> Option<Row> {
        if !rect.contains(p) {
            return None;
        }
        match ((p.y - rect.y) / ROW_HEIGHT) as usize {
            0 => Some(Row::Title),
            n if n <= self.controls.len() => Some(Row::Control(n - 1)),
            _ => None,
        }
    }

    fn drag_to(&self, index: usize, rect: &PanelRect, x: f32, lights: &mut SceneLights) {
        if let Some(Control::Slider(slider)) = self.controls.get(index) {
            let (start, width) = rect.track();
            let t = ((x - start) / width).clamp(0.0, 1.0);
            let value = slider.snap(slider.min + t * (slider.max - slider.min));
            slider.set(lights, value);
        }
    }

    /// Handle this frame's pointer and keyboard input.
    ///
    /// `scale` converts physical input pixels to logical layout pixels;
    /// `viewport_width` is in logical pixels.
    pub fn handle_input(
        &mut self,
        input: &Input,
        scale: f32,
        viewport_width: f32,
        lights: &mut SceneLights,
    ) -> PanelResponse {
        if input.key_pressed(KeyCode::KeyH) {
            self.toggle_hidden();
        }
        let mut response = PanelResponse::default();
        if self.hidden {
            self.hovered = None;
            return response;
        }

        let rect = self.rect(viewport_width);
        let cursor = input.cursor().map(|c| c / scale.max(f32::EPSILON));
        let row = cursor.and_then(|p| self.row_at(&rect, p));
        self.hovered = match row {
            Some(Row::Control(i)) => Some(i),
            _ => None,
        };

        if let Some(index) = self.dragging {
            response.captured = true;
            if input.mouse_down(MouseButton::Left) {
                if let Some(p) = cursor {
                    self.drag_to(index, &rect, p.x, lights);
                }
            } else {
                self.dragging = None;
            }
            return response;
        }

        let Some(row) = row else {
            return response;
        };
        response.captured = true;

        if input.mouse_pressed(MouseButton::Left) {
            match row {
                Row::Title => self.toggle_collapsed(),
                Row::Control(i) => match self.controls[i] {
                    Control::Button { action, .. } => response.action = Some(action),
                    Control::Slider(_) => {
                        self.dragging = Some(i);
                        if let Some(p) = cursor {
                            self.drag_to(i, &rect, p.x, lights);
                        }
                    }
                },
            }
        }
        response
    }

    /// Queue the panel into `draw`. `scale` maps logical to physical pixels.
    pub fn draw(
        &self,
        draw: &mut Draw2d,
        assets: &Assets,
        font: Option<FontId>,
        lights: &SceneLights,
        viewport_width: f32,
        scale: f32,
    ) {
        if self.hidden {
            return;
        }
        let rect = self.rect(viewport_width);
        let s = |v: f32| v * scale;
        let text_y = |row: usize| {
            let size = font
                .and_then(|f| assets.font(f))
                .map_or(0.0, |f| f.size());
            s(rect.y + row as f32 * ROW_HEIGHT) + (s(ROW_HEIGHT) - size) * 0.5
        };

        draw.rect(s(rect.x), s(rect.y), s(rect.width), s(rect.height), Color::PANEL_BG);
        draw.rect(
            s(rect.x),
            s(rect.y + ROW_HEIGHT - 1.0),
            s(rect.width),
            s(1.0),
            Color::PANEL_WIDGET,
        );
        if let Some(font) = font {
            let marker = if self.collapsed { "+ " } else { "- " };
            draw.text(
                assets,
                font,
                s(rect.x + PADDING),
                text_y(0),
                &format!("{marker}{TITLE}"),
                Color::PANEL_TEXT,
            );
        }
        if self.collapsed {
            return;
        }

        for (i, control) in self.controls.iter().enumerate() {
            let row_y = rect.y + (i + 1) as f32 * ROW_HEIGHT;
            let inner_y = row_y + 3.0;
            let inner_h = ROW_HEIGHT - 6.0;
            let active = self.hovered == Some(i) || self.dragging == Some(i);

            match control {
                Control::Button { label, .. } => {
                    let bg = if active {
                        Color::PANEL_ACCENT.with_alpha(0.35)
                    } else {
                        Color::PANEL_WIDGET
                    };
                    draw.rect(
                        s(rect.x + PADDING),
                        s(inner_y),
                        s(rect.width - 2.0 * PADDING),
                        s(inner_h),
                        bg,
                    );
                    if let Some(font) = font {
                        draw.text(
                            assets,
                            font,
                            s(rect.x + 2.0 * PADDING),
                            text_y(i + 1),
                            label,
                            Color::PANEL_TEXT,
                        );
                    }
                }
                Control::Slider(slider) => {
                    let (track_x, track_w) = rect.track();
                    draw.rect(s(track_x), s(inner_y), s(track_w), s(inner_h), Color::PANEL_WIDGET);
                    draw.rect(
                        s(track_x),
                        s(inner_y),
                        s(track_w * slider.fraction(lights)),
                        s(inner_h),
                        Color::PANEL_ACCENT,
                    );
                    if active {
                        draw.outline(s(track_x), s(inner_y), s(track_w), s(inner_h), Color::WHITE);
                    }
                    let number_x = rect.x + rect.width - PADDING - NUMBER_WIDTH;
                    draw.rect(
                        s(number_x),
                        s(inner_y),
                        s(NUMBER_WIDTH),
                        s(inner_h),
                        Color::PANEL_WIDGET,
                    );
                    if let Some(font) = font {
                        draw.text(
                            assets,
                            font,
                            s(rect.x + PADDING),
                            text_y(i + 1),
                            slider.label,
                            Color::PANEL_TEXT,
                        );
                        draw.text(
                            assets,
                            font,
                            s(number_x + 3.0),
                            text_y(i + 1),
                            &format!("{:.3}", slider.get(lights)),
                            Color::PANEL_ACCENT,
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT_WIDTH: f32 = 1280.0;

    fn row_center(panel: &DebugPanel, row: usize) -> Vec2 {
        let rect = panel.rect(VIEWPORT_WIDTH);
        Vec2::new(
            rect.x + rect.width * 0.5,
            rect.y + (row as f32 + 0.5) * ROW_HEIGHT,
        )
    }

    fn click(panel: &mut DebugPanel, lights: &mut SceneLights, at: Vec2) -> PanelResponse {
        let mut input = Input::new();
        input.move_cursor(at);
        input.press(MouseButton::Left);
        panel.handle_input(&input, 1.0, VIEWPORT_WIDTH, lights)
    }

    #[test]
    fn has_the_moon_and_music_controls() {
        let panel = DebugPanel::new();
        let labels: Vec<_> = panel.controls().iter().map(Control::label).collect();
        assert_eq!(
            labels,
            ["Play Audio", "Stop Audio", "intensity", "x", "y", "z"]
        );
        let intensity = panel.slider("intensity").expect("intensity slider");
        assert_eq!((intensity.min, intensity.max, intensity.step), (0.0, 10.0, 0.001));
    }

    #[test]
    fn set_writes_exact_values_and_clamps() {
        let panel = DebugPanel::new();
        let mut lights = SceneLights::default();
        assert!(panel.set(&mut lights, "intensity", 3.3));
        assert_eq!(lights.moon.intensity, 3.3);
        assert_eq!(panel.get(&lights, "intensity"), Some(3.3));
        panel.set(&mut lights, "y", 12.0);
        assert_eq!(lights.moon.position.y, 5.0);
        panel.set(&mut lights, "intensity", -1.0);
        assert_eq!(lights.moon.intensity, 0.0);
        assert!(!panel.set(&mut lights, "w", 1.0));
    }

    #[test]
    fn snap_rounds_to_step() {
        let panel = DebugPanel::new();
        let x = panel.slider("x").expect("x slider");
        assert!((x.snap(1.23456) - 1.235).abs() < 1e-6);
        assert_eq!(x.snap(9.0), 5.0);
    }

    #[test]
    fn buttons_report_actions() {
        let mut panel = DebugPanel::new();
        let mut lights = SceneLights::default();
        let at = row_center(&panel, 1);
        let response = click(&mut panel, &mut lights, at);
        assert_eq!(
            response,
            PanelResponse {
                captured: true,
                action: Some(PanelAction::PlayAudio)
            }
        );
        let at = row_center(&panel, 2);
        let response = click(&mut panel, &mut lights, at);
        assert_eq!(response.action, Some(PanelAction::StopAudio));
    }

    #[test]
    fn dragging_a_slider_sets_a_snapped_value() {
        let mut panel = DebugPanel::new();
        let mut lights = SceneLights::default();
        let rect = panel.rect(VIEWPORT_WIDTH);
        let (track_x, track_w) = rect.track();
        let y = row_center(&panel, 3).y;

        // Press at the far left of the intensity track, then drag to the middle
        let mut input = Input::new();
        input.move_cursor(Vec2::new(track_x, y));
        input.press(MouseButton::Left);
        panel.handle_input(&input, 1.0, VIEWPORT_WIDTH, &mut lights);
        assert_eq!(lights.moon.intensity, 0.0);

        input.end_frame();
        // Dragging outside the panel keeps the capture
        input.move_cursor(Vec2::new(track_x + track_w * 0.5, y + 200.0));
        let response = panel.handle_input(&input, 1.0, VIEWPORT_WIDTH, &mut lights);
        assert!(response.captured);
        assert!((lights.moon.intensity - 5.0).abs() < 1e-3);

        input.end_frame();
        input.release(MouseButton::Left);
        panel.handle_input(&input, 1.0, VIEWPORT_WIDTH, &mut lights);
        input.end_frame();
        input.move_cursor(Vec2::new(10.0, 400.0));
        let response = panel.handle_input(&input, 1.0, VIEWPORT_WIDTH, &mut lights);
        assert!(!response.captured);
    }

    #[test]
    fn title_click_collapses() {
        let mut panel = DebugPanel::new();
        let mut lights = SceneLights::default();
        let below_title = row_center(&panel, 1);
        let title = row_center(&panel, 0);
        click(&mut panel, &mut lights, title);
        assert!(panel.is_collapsed());
        let response = click(&mut panel, &mut lights, below_title);
        assert!(!response.captured);
        assert_eq!(response.action, None);
    }

    #[test]
    fn h_hides_and_releases_the_pointer() {
        let mut panel = DebugPanel::new();
        let mut lights = SceneLights::default();
        let mut input = Input::new();
        input.press_key(KeyCode::KeyH);
        input.move_cursor(row_center(&panel, 1));
        input.press(MouseButton::Left);
        let response = panel.handle_input(&input, 1.0, VIEWPORT_WIDTH, &mut lights);
        assert!(panel.is_hidden());
        assert_eq!(response, PanelResponse::default());
    }

    #[test]
    fn hit_testing_uses_logical_pixels() {
        let mut panel = DebugPanel::new();
        let mut lights = SceneLights::default();
        let mut input = Input::new();
        input.move_cursor(row_center(&panel, 1) * 2.0);
        input.press(MouseButton::Left);
        let response = panel.handle_input(&input, 2.0, VIEWPORT_WIDTH, &mut lights);
        assert_eq!(response.action, Some(PanelAction::PlayAudio));
    }
}
