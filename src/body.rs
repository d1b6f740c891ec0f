use crate::color::Rgba;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct BodyId(usize);

/// One node of the orbital tree.
///
/// `parent` never owns anything; it only answers "do I revolve".
#[derive(Clone, Debug)]
pub(crate) struct Body {
    pub(crate) name: String,
    pub(crate) distance: f64,
    pub(crate) period: f64,
    pub(crate) radius: f64,
    pub(crate) angle: f64,
    pub(crate) color: Rgba,
    pub(crate) parent: Option<BodyId>,
    pub(crate) children: Vec<BodyId>,
}

impl Body {
    pub(crate) fn new(name: impl Into<String>, distance: f64, radius: f64, color: Rgba) -> Self {
        let name = name.into();
        assert!(
            distance.is_finite() && distance >= 0.0,
            "body {name:?}: distance must be finite and non-negative, got {distance}"
        );
        assert!(
            radius.is_finite() && radius > 0.0,
            "body {name:?}: radius must be finite and positive, got {radius}"
        );
        Self {
            name,
            distance,
            period: distance.powf(1.5),
            radius,
            angle: 0.0,
            color,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Declarative description of a subtree, as found in config files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct BodySpec {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) distance: f64,
    pub(crate) radius: f64,
    pub(crate) color: Rgba,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) children: Vec<BodySpec>,
}

impl BodySpec {
    pub(crate) fn new(name: &str, distance: f64, radius: f64, color: Rgba) -> Self {
        Self {
            name: name.to_string(),
            distance,
            radius,
            color,
            children: Vec::new(),
        }
    }

    pub(crate) fn with_child(mut self, child: BodySpec) -> Self {
        self.children.push(child);
        self
    }
}

/// Arena that owns every body; the first body added is the root.
#[derive(Clone, Debug)]
pub(crate) struct System {
    bodies: Vec<Body>,
}

impl System {
    pub(crate) fn new(root: Body) -> Self {
        Self { bodies: vec![root] }
    }

    pub(crate) fn root(&self) -> BodyId {
        BodyId(0)
    }

    pub(crate) fn body(&self, id: BodyId) -> &Body {
        &self.bodies[id.0]
    }

    pub(crate) fn len(&self) -> usize {
        self.bodies.len()
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = BodyId> {
        (0..self.bodies.len()).map(BodyId)
    }

    #[cfg(test)]
    pub(crate) fn find(&self, name: &str) -> Option<BodyId> {
        self.bodies.iter().position(|b| b.name == name).map(BodyId)
    }

    /// Adds a detached body; it does nothing until attached.
    pub(crate) fn add(&mut self, body: Body) -> BodyId {
        self.bodies.push(body);
        BodyId(self.bodies.len() - 1)
    }

    pub(crate) fn attach(&mut self, parent: BodyId, child: BodyId) {
        assert_ne!(child, self.root(), "the root cannot orbit anything");
        assert!(
            self.bodies[child.0].parent.is_none(),
            "body {:?} is already attached",
            self.bodies[child.0].name
        );
        assert!(
            !self.is_ancestor_or_self(child, parent),
            "attaching {:?} under {:?} would create a cycle",
            self.bodies[child.0].name,
            self.bodies[parent.0].name
        );
        self.bodies[child.0].parent = Some(parent);
        self.bodies[parent.0].children.push(child);
    }

    fn is_ancestor_or_self(&self, candidate: BodyId, mut of: BodyId) -> bool {
        loop {
            if of == candidate {
                return true;
            }
            match self.bodies[of.0].parent {
                Some(p) => of = p,
                None => return false,
            }
        }
    }

    /// Advances `id` and its whole subtree by `delta_time` seconds.
    pub(crate) fn update(&mut self, id: BodyId, delta_time: f64, speed_factor: f64) {
        let body = &mut self.bodies[id.0];
        // distance 0 below the root has period 0 and sits still
        if body.parent.is_some() && body.period > 0.0 {
            body.angle += (PI / body.period) * delta_time * speed_factor;
        }
        for i in 0..self.bodies[id.0].children.len() {
            let child = self.bodies[id.0].children[i];
            self.update(child, delta_time, speed_factor);
        }
    }

    pub(crate) fn update_all(&mut self, delta_time: f64, speed_factor: f64) {
        self.update(self.root(), delta_time, speed_factor);
    }

    /// Children in ascending distance; ties keep insertion order.
    pub(crate) fn children_by_distance(&self, id: BodyId) -> Vec<BodyId> {
        let mut kids = self.bodies[id.0].children.clone();
        kids.sort_by(|a, b| self.bodies[a.0].distance.total_cmp(&self.bodies[b.0].distance));
        kids
    }

    /// Immediate child with the largest distance, first one on ties.
    ///
    /// A parent whose children all sit at distance 0 still reports its first
    /// child, so the viewport is fitted to that child's radius rather than
    /// to the parent's own.
    pub(crate) fn reach_body(&self, id: BodyId) -> Option<BodyId> {
        let mut best: Option<BodyId> = None;
        for &c in &self.bodies[id.0].children {
            match best {
                Some(b) if self.bodies[c.0].distance <= self.bodies[b.0].distance => {}
                _ => best = Some(c),
            }
        }
        best
    }

    /// Radial thickness reserved by this body and everything orbiting it.
    pub(crate) fn space_needed(&self, id: BodyId) -> f64 {
        self.bodies[id.0].radius + self.descendant_diameters(id)
    }

    fn descendant_diameters(&self, id: BodyId) -> f64 {
        self.bodies[id.0]
            .children
            .iter()
            .map(|&c| self.bodies[c.0].radius * 2.0 + self.descendant_diameters(c))
            .sum()
    }

    pub(crate) fn from_spec(spec: &BodySpec) -> Self {
        let mut system = System::new(Body::new(&spec.name, spec.distance, spec.radius, spec.color));
        let root = system.root();
        system.attach_specs(root, &spec.children);
        system.report_layout();
        system
    }

    fn attach_specs(&mut self, parent: BodyId, specs: &[BodySpec]) {
        for s in specs {
            let id = self.add(Body::new(&s.name, s.distance, s.radius, s.color));
            self.attach(parent, id);
            self.attach_specs(id, &s.children);
        }
    }

    /// Logs reserved thickness per subtree and flags sibling orbits too close to fit.
    fn report_layout(&self) {
        for id in self.ids() {
            let kids = self.children_by_distance(id);
            if id == self.root() {
                for &k in &kids {
                    debug!(
                        body = %self.body(k).name,
                        distance = self.body(k).distance,
                        space_needed = self.space_needed(k),
                        "subtree extent"
                    );
                }
            }
            for pair in kids.windows(2) {
                let (inner, outer) = (self.body(pair[0]), self.body(pair[1]));
                let gap = outer.distance - inner.distance;
                let needed = self.space_needed(pair[0]) + self.space_needed(pair[1]);
                if gap < needed {
                    warn!(
                        parent = %self.body(id).name,
                        inner = %inner.name,
                        outer = %outer.name,
                        gap,
                        needed,
                        "sibling orbits overlap"
                    );
                }
            }
        }
    }

    pub(crate) fn to_spec(&self) -> BodySpec {
        self.spec_of(self.root())
    }

    fn spec_of(&self, id: BodyId) -> BodySpec {
        let b = self.body(id);
        BodySpec {
            name: b.name.clone(),
            distance: b.distance,
            radius: b.radius,
            color: b.color,
            children: b.children.iter().map(|&c| self.spec_of(c)).collect(),
        }
    }

    pub(crate) fn default_solar() -> Self {
        System::from_spec(&default_solar_spec())
    }
}

pub(crate) fn default_solar_spec() -> BodySpec {
    let gray = Rgba::rgb(128, 128, 128);
    let orange = Rgba::rgb(255, 165, 0);
    BodySpec::new("Sun", 0.0, 20.0, Rgba::rgb(255, 255, 0))
        .with_child(
            BodySpec::new("Earth", 150.0, 10.0, Rgba::rgb(0, 0, 255))
                .with_child(BodySpec::new("Moon", 20.0, 3.0, gray)),
        )
        .with_child(BodySpec::new("Mercury", 50.0, 5.0, gray))
        .with_child(BodySpec::new("Venus", 100.0, 8.0, orange))
        .with_child(BodySpec::new("Mars", 200.0, 7.0, Rgba::rgb(255, 0, 0)))
        .with_child(
            BodySpec::new("Jupiter", 300.0, 15.0, orange)
                .with_child(BodySpec::new("Io", 20.0, 3.0, gray))
                .with_child(BodySpec::new("Europa", 30.0, 3.0, gray))
                .with_child(BodySpec::new("Ganymede", 40.0, 3.0, gray))
                .with_child(BodySpec::new("Callisto", 50.0, 3.0, gray)),
        )
        .with_child(BodySpec::new("Saturn", 400.0, 12.0, orange))
}
