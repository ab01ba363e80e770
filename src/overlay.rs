use std::time::Duration;

use crate::draw2d::{Color, Draw2d};

/// Full-window cover shown until the model is in the scene.
///
/// Opaque while loading; once [`start_fade`](Self::start_fade) is called it
/// fades linearly to transparent over the fade duration and then hides. A
/// failed load never starts the fade, so the cover stays up.
#[derive(Clone, Debug)]
pub struct LoadingOverlay {
    color: Color,
    fade: Duration,
    /// Seconds since the fade started.
    fading: Option<f32>,
    visible: bool,
}

impl LoadingOverlay {
    pub fn new(color: Color, fade: Duration) -> Self {
        Self {
            color,
            fade,
            fading: None,
            visible: true,
        }
    }

    /// Begin fading out. Repeated calls keep the first start.
    pub fn start_fade(&mut self) {
        if self.fading.is_none() && self.visible {
            self.fading = Some(0.0);
        }
    }

    pub fn is_fading(&self) -> bool {
        self.fading.is_some()
    }

    pub fn update(&mut self, delta: f32) {
        let Some(t) = &mut self.fading else {
            return;
        };
        *t += delta;
        if *t >= self.fade.as_secs_f32() {
            self.fading = None;
            self.visible = false;
        }
    }

    pub fn opacity(&self) -> f32 {
        if !self.visible {
            return 0.0;
        }
        match self.fading {
            None => 1.0,
            Some(t) => {
                let total = self.fade.as_secs_f32();
                if total <= 0.0 {
                    0.0
                } else {
                    (1.0 - t / total).clamp(0.0, 1.0)
                }
            }
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Cover `width` x `height` physical pixels.
    pub fn draw(&self, draw: &mut Draw2d, width: f32, height: f32) {
        if self.visible {
            draw.rect(0.0, 0.0, width, height, self.color.with_alpha(self.opacity()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay() -> LoadingOverlay {
        LoadingOverlay::new(Color::BLACK, Duration::from_secs(2))
    }

    #[test]
    fn stays_opaque_until_fade_starts() {
        let mut o = overlay();
        for _ in 0..100 {
            o.update(0.1);
        }
        assert!(o.is_visible());
        assert_eq!(o.opacity(), 1.0);
    }

    #[test]
    fn fades_then_hides_after_two_seconds() {
        let mut o = overlay();
        o.start_fade();
        o.update(1.0);
        assert!((o.opacity() - 0.5).abs() < 1e-6);
        o.start_fade();
        o.update(0.999);
        assert!(o.is_visible());
        o.update(0.002);
        assert!(!o.is_visible());
        assert_eq!(o.opacity(), 0.0);
    }

    #[test]
    fn zero_fade_hides_on_next_update() {
        let mut o = LoadingOverlay::new(Color::BLACK, Duration::ZERO);
        o.start_fade();
        o.update(0.0);
        assert!(!o.is_visible());
    }
}
