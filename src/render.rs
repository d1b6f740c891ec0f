use crate::body::{BodyId, System};
use crate::canvas::Surface;
use crate::color::Rgba;
use tracing::{debug, info};

const ORBIT_SOLID: Rgba = Rgba::rgb(0, 0, 0);
const FALLBACK_SCALE: f64 = 1.0;

/// Paints a body tree onto a surface, auto-scaled so the outermost
/// top-level orbit fits the viewport.
pub(crate) struct Renderer {
    scale: f64,
    orbit_overlay: Rgba,
}

impl Renderer {
    pub(crate) fn new(orbit_overlay_alpha: f64) -> Self {
        Self {
            scale: FALLBACK_SCALE,
            orbit_overlay: Rgba::rgb(255, 255, 255).with_opacity(orbit_overlay_alpha),
        }
    }

    pub(crate) fn scale(&self) -> f64 {
        self.scale
    }

    pub(crate) fn draw<S: Surface>(&mut self, system: &System, surface: &mut S) {
        surface.clear_rect(0.0, 0.0, surface.width(), surface.height());
        let center_x = surface.width() / 2.0;
        let center_y = surface.height() / 2.0;
        self.scale = fit_scale(system, center_x.min(center_y));
        self.draw_body(system, system.root(), surface, center_x, center_y);
    }

    /// Canvas resized: redraw once at the new size, model untouched.
    pub(crate) fn resize<S: Surface>(&mut self, system: &System, surface: &mut S, width: f64, height: f64) {
        surface.resize(width, height);
        self.draw(system, surface);
        info!(width, height, scale = self.scale, "canvas resized");
    }

    fn draw_body<S: Surface>(&self, system: &System, id: BodyId, surface: &mut S, origin_x: f64, origin_y: f64) {
        let body = system.body(id);
        surface.save();
        surface.translate(origin_x, origin_y);
        surface.fill_disc(0.0, 0.0, body.radius * self.scale, body.color);

        for child in system.children_by_distance(id) {
            let ring = system.body(child).distance * self.scale;
            surface.stroke_circle(0.0, 0.0, ring, ORBIT_SOLID);
            surface.stroke_circle(0.0, 0.0, ring, self.orbit_overlay);

            surface.save();
            surface.rotate(system.body(child).angle);
            surface.translate(ring, 0.0);
            self.draw_body(system, child, surface, 0.0, 0.0);
            surface.restore();
        }

        surface.restore();
    }
}

/// Pixels per distance unit so the reach body sits on the viewport edge.
pub(crate) fn fit_scale(system: &System, half_extent: f64) -> f64 {
    let Some(reach) = system.reach_body(system.root()) else {
        return FALLBACK_SCALE;
    };
    let reach = system.body(reach);
    let scale = half_extent / (reach.distance + reach.radius);
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        debug!(half_extent, reach = %reach.name, "degenerate viewport, using fallback scale");
        FALLBACK_SCALE
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::body::BodySpec;
    use approx::assert_relative_eq;

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum Op {
        Resize(f64, f64),
        Clear(f64, f64, f64, f64),
        Save,
        Restore,
        Translate(f64, f64),
        Rotate(f64),
        Disc(f64, Rgba),
        Circle(f64, Rgba),
    }

    /// Surface that records every primitive instead of painting.
    pub(crate) struct Recorder {
        pub(crate) w: f64,
        pub(crate) h: f64,
        pub(crate) ops: Vec<Op>,
    }

    impl Recorder {
        pub(crate) fn new(w: f64, h: f64) -> Self {
            Self { w, h, ops: Vec::new() }
        }

        pub(crate) fn clears(&self) -> usize {
            self.ops.iter().filter(|op| matches!(op, Op::Clear(..))).count()
        }

        fn discs(&self) -> Vec<Rgba> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    Op::Disc(_, c) => Some(*c),
                    _ => None,
                })
                .collect()
        }
    }

    impl Surface for Recorder {
        fn width(&self) -> f64 {
            self.w
        }
        fn height(&self) -> f64 {
            self.h
        }
        fn resize(&mut self, width: f64, height: f64) {
            self.w = width;
            self.h = height;
            self.ops.push(Op::Resize(width, height));
        }
        fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
            self.ops.push(Op::Clear(x, y, w, h));
        }
        fn save(&mut self) {
            self.ops.push(Op::Save);
        }
        fn restore(&mut self) {
            self.ops.push(Op::Restore);
        }
        fn translate(&mut self, x: f64, y: f64) {
            self.ops.push(Op::Translate(x, y));
        }
        fn rotate(&mut self, radians: f64) {
            self.ops.push(Op::Rotate(radians));
        }
        fn fill_disc(&mut self, _cx: f64, _cy: f64, radius: f64, color: Rgba) {
            self.ops.push(Op::Disc(radius, color));
        }
        fn stroke_circle(&mut self, _cx: f64, _cy: f64, radius: f64, color: Rgba) {
            self.ops.push(Op::Circle(radius, color));
        }
    }

    /// Colour tag so tests can tell bodies apart by their disc.
    fn tag(i: u8) -> Rgba {
        Rgba::rgb(i, 0, 0)
    }

    #[test]
    fn scale_fits_reach_body() {
        let system = System::default_solar();
        let mut r = Renderer::new(0.25);
        let mut s = Recorder::new(800.0, 600.0);
        r.draw(&system, &mut s);
        assert_relative_eq!(r.scale(), 300.0 / (400.0 + 12.0));
        assert_relative_eq!(r.scale(), 0.7282, epsilon = 1e-4);
    }

    #[test]
    fn draws_children_in_distance_order() {
        let mut spec = BodySpec::new("root", 0.0, 5.0, tag(0));
        for d in [30u8, 5, 10, 20, 15, 25] {
            spec = spec.with_child(BodySpec::new("p", d as f64, 1.0, tag(d)));
        }
        let system = System::from_spec(&spec);
        let mut s = Recorder::new(100.0, 100.0);
        Renderer::new(0.1).draw(&system, &mut s);
        let order: Vec<u8> = s.discs().iter().skip(1).map(|c| c.r).collect();
        assert_eq!(order, vec![5, 10, 15, 20, 25, 30]);
    }

    #[test]
    fn draw_is_a_pure_function_of_state() {
        let mut system = System::default_solar();
        system.update_all(3.7, 40.0);
        let mut r = Renderer::new(0.25);
        let mut s = Recorder::new(640.0, 480.0);
        r.draw(&system, &mut s);
        let first = std::mem::take(&mut s.ops);
        r.draw(&system, &mut s);
        assert_eq!(first, s.ops);
    }

    #[test]
    fn transform_stack_is_balanced_and_nested() {
        let system = System::default_solar();
        let mut s = Recorder::new(640.0, 480.0);
        Renderer::new(0.25).draw(&system, &mut s);
        let mut depth = 0i32;
        let mut max_depth = 0;
        for op in &s.ops {
            match op {
                Op::Save => depth += 1,
                Op::Restore => depth -= 1,
                _ => {}
            }
            assert!(depth >= 0);
            max_depth = max_depth.max(depth);
        }
        assert_eq!(depth, 0);
        // root frame, planet orbit, planet frame, moon orbit, moon frame
        assert_eq!(max_depth, 5);
    }

    #[test]
    fn child_frame_is_rotate_then_translate() {
        let mut system = System::from_spec(
            &BodySpec::new("Sun", 0.0, 20.0, tag(1)).with_child(BodySpec::new("Earth", 150.0, 10.0, tag(2))),
        );
        system.update_all(1.0, 100.0);
        let angle = system.body(system.find("Earth").unwrap()).angle;
        let mut r = Renderer::new(0.25);
        let mut s = Recorder::new(400.0, 400.0);
        r.draw(&system, &mut s);
        let scale = 200.0 / 160.0;
        let overlay = Rgba::rgb(255, 255, 255).with_opacity(0.25);
        assert_eq!(
            s.ops,
            vec![
                Op::Clear(0.0, 0.0, 400.0, 400.0),
                Op::Save,
                Op::Translate(200.0, 200.0),
                Op::Disc(20.0 * scale, tag(1)),
                Op::Circle(150.0 * scale, ORBIT_SOLID),
                Op::Circle(150.0 * scale, overlay),
                Op::Save,
                Op::Rotate(angle),
                Op::Translate(150.0 * scale, 0.0),
                Op::Save,
                Op::Translate(0.0, 0.0),
                Op::Disc(10.0 * scale, tag(2)),
                Op::Restore,
                Op::Restore,
                Op::Restore,
            ]
        );
    }

    #[test]
    fn giant_star_frame_stays_cheap() {
        let star = Rgba::rgb(255, 200, 0);
        let system = System::from_spec(
            &BodySpec::new("Giant", 0.0, 2000.0, star)
                .with_child(BodySpec::new("speck", 10.0, 1.0, tag(1))),
        );
        let mut r = Renderer::new(0.25);
        let mut canvas = crate::canvas::BrailleCanvas::for_cells(80, 23);
        let start = std::time::Instant::now();
        r.draw(&system, &mut canvas);
        assert!(start.elapsed().as_millis() < 1000, "took {:?}", start.elapsed());
        assert_relative_eq!(r.scale(), 46.0 / 11.0);
        assert_eq!(canvas.pixel(80, 46), star);
    }

    #[test]
    fn lone_root_uses_fallback_scale() {
        let system = System::from_spec(&BodySpec::new("alone", 0.0, 7.0, tag(9)));
        let mut r = Renderer::new(0.25);
        let mut s = Recorder::new(300.0, 200.0);
        r.draw(&system, &mut s);
        assert_eq!(r.scale(), 1.0);
        assert_eq!(s.discs().len(), 1);
        assert!(s.ops.contains(&Op::Disc(7.0, tag(9))));
    }

    #[test]
    fn empty_viewport_never_yields_nan() {
        let system = System::default_solar();
        let mut r = Renderer::new(0.25);
        let mut s = Recorder::new(0.0, 0.0);
        r.draw(&system, &mut s);
        assert_eq!(r.scale(), 1.0);
        for op in &s.ops {
            if let Op::Disc(radius, _) | Op::Circle(radius, _) = op {
                assert!(radius.is_finite());
            }
        }
    }

    #[test]
    fn zero_distance_moon_gets_a_point_orbit() {
        let system = System::from_spec(
            &BodySpec::new("a", 0.0, 4.0, tag(1))
                .with_child(BodySpec::new("b", 100.0, 2.0, tag(2)).with_child(BodySpec::new("c", 0.0, 1.0, tag(3)))),
        );
        let mut s = Recorder::new(200.0, 200.0);
        Renderer::new(0.25).draw(&system, &mut s);
        assert!(s.ops.contains(&Op::Circle(0.0, ORBIT_SOLID)));
        assert_eq!(s.discs().len(), 3);
    }

    #[test]
    fn resize_redraws_once_and_keeps_angles() {
        let mut system = System::default_solar();
        system.update_all(2.0, 50.0);
        let before: Vec<f64> = system.ids().map(|id| system.body(id).angle).collect();

        let mut r = Renderer::new(0.25);
        let mut s = Recorder::new(800.0, 600.0);
        r.draw(&system, &mut s);
        s.ops.clear();

        r.resize(&system, &mut s, 400.0, 1000.0);
        assert_eq!(s.ops[0], Op::Resize(400.0, 1000.0));
        assert_eq!(s.clears(), 1);
        assert_relative_eq!(r.scale(), 200.0 / 412.0);
        let after: Vec<f64> = system.ids().map(|id| system.body(id).angle).collect();
        assert_eq!(before, after);
    }
}
