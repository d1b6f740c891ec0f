use crate::color::Rgba;
use glam::{DAffine2, DVec2};
use std::f64::consts::TAU;

/// 2D drawing surface with an HTML-canvas style transform stack.
///
/// Shape coordinates are in the current local frame.
pub(crate) trait Surface {
    fn width(&self) -> f64;
    fn height(&self) -> f64;
    fn resize(&mut self, width: f64, height: f64);
    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, x: f64, y: f64);
    fn rotate(&mut self, radians: f64);
    fn fill_disc(&mut self, cx: f64, cy: f64, radius: f64, color: Rgba);
    fn stroke_circle(&mut self, cx: f64, cy: f64, radius: f64, color: Rgba);
}

/// RGBA pixel buffer sized in braille sub-pixels (2×4 per terminal cell).
pub(crate) struct BrailleCanvas {
    pub(crate) w: u32,
    pub(crate) h: u32,
    pub(crate) px: Vec<Rgba>,
    transform: DAffine2,
    stack: Vec<DAffine2>,
}

impl BrailleCanvas {
    pub(crate) fn new(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            px: vec![Rgba::default(); (w as usize) * (h as usize)],
            transform: DAffine2::IDENTITY,
            stack: Vec::new(),
        }
    }

    /// Canvas covering `cols`×`rows` terminal cells.
    pub(crate) fn for_cells(cols: u16, rows: u16) -> Self {
        Self::new(cols as u32 * 2, rows as u32 * 4)
    }

    pub(crate) fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }

    pub(crate) fn pixel(&self, x: u32, y: u32) -> Rgba {
        self.px[self.idx(x, y)]
    }

    fn to_device(&self, x: f64, y: f64) -> DVec2 {
        self.transform.transform_point2(DVec2::new(x, y))
    }

    fn blend_over(&mut self, x: i64, y: i64, src: Rgba) {
        if x < 0 || y < 0 || x >= self.w as i64 || y >= self.h as i64 {
            return;
        }
        let i = self.idx(x as u32, y as u32);
        let dst = self.px[i];

        let sa = src.a as f32 / 255.0;
        let da = dst.a as f32 / 255.0;

        let out_a = sa + da * (1.0 - sa);
        if out_a <= 1e-6 {
            self.px[i] = Rgba::default();
            return;
        }

        let blend = |sc: u8, dc: u8| -> u8 {
            let sc = sc as f32 / 255.0;
            let dc = dc as f32 / 255.0;
            let out = (sc * sa + dc * da * (1.0 - sa)) / out_a;
            (out.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        };

        self.px[i] = Rgba {
            r: blend(src.r, dst.r),
            g: blend(src.g, dst.g),
            b: blend(src.b, dst.b),
            a: (out_a.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        };
    }
}

impl Surface for BrailleCanvas {
    fn width(&self) -> f64 {
        self.w as f64
    }

    fn height(&self) -> f64 {
        self.h as f64
    }

    fn resize(&mut self, width: f64, height: f64) {
        *self = BrailleCanvas::new(width.max(0.0) as u32, height.max(0.0) as u32);
    }

    // Device space, like `clearRect` on a canvas with an identity transform.
    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let x0 = x.max(0.0) as u32;
        let y0 = y.max(0.0) as u32;
        let x1 = ((x + w).max(0.0) as u32).min(self.w);
        let y1 = ((y + h).max(0.0) as u32).min(self.h);
        for yy in y0..y1 {
            for xx in x0..x1 {
                let i = self.idx(xx, yy);
                self.px[i] = Rgba::default();
            }
        }
    }

    fn save(&mut self) {
        self.stack.push(self.transform);
    }

    fn restore(&mut self) {
        if let Some(t) = self.stack.pop() {
            self.transform = t;
        }
    }

    fn translate(&mut self, x: f64, y: f64) {
        self.transform = self.transform * DAffine2::from_translation(DVec2::new(x, y));
    }

    fn rotate(&mut self, radians: f64) {
        self.transform = self.transform * DAffine2::from_angle(radians);
    }

    fn fill_disc(&mut self, cx: f64, cy: f64, radius: f64, color: Rgba) {
        let c = self.to_device(cx, cy);
        // rotation and translation only, so the radius survives the transform
        let r = radius.max(0.5);
        let r2 = r * r;
        // only the part of the bounding box that lands on the canvas
        let x0 = ((c.x - r).floor() as i64).max(0);
        let y0 = ((c.y - r).floor() as i64).max(0);
        let x1 = ((c.x + r).ceil() as i64).min(self.w as i64 - 1);
        let y1 = ((c.y + r).ceil() as i64).min(self.h as i64 - 1);
        if x0 > x1 || y0 > y1 {
            return;
        }
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f64 + 0.5 - c.x;
                let dy = y as f64 + 0.5 - c.y;
                if dx * dx + dy * dy <= r2 {
                    self.blend_over(x, y, color);
                }
            }
        }
    }

    fn stroke_circle(&mut self, cx: f64, cy: f64, radius: f64, color: Rgba) {
        let c = self.to_device(cx, cy);
        if radius <= 0.0 {
            self.blend_over(c.x.floor() as i64, c.y.floor() as i64, color);
            return;
        }
        let steps = (TAU * radius).ceil().max(8.0) as usize;
        let mut last: Option<(i64, i64)> = None;
        for s in 0..steps {
            let a = TAU * (s as f64 / steps as f64);
            let x = (c.x + radius * a.cos()).floor() as i64;
            let y = (c.y + radius * a.sin()).floor() as i64;
            // translucent strokes would darken where samples land twice
            if last == Some((x, y)) {
                continue;
            }
            last = Some((x, y));
            self.blend_over(x, y, color);
        }
    }
}
