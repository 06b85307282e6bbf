use std::ops::ControlFlow;

use crate::model::*;

/// Any node of the document tree.
#[derive(Debug, Clone, Copy)]
pub enum Element<'a> {
    Robot(&'a Robot),
    Link(&'a Link),
    Joint(&'a Joint),
    Inertial(&'a Inertial),
    Visual(&'a Visual),
    Collision(&'a Collision),
    Geometry(&'a Geometry),
    Cuboid(&'a Cuboid),
    Cylinder(&'a Cylinder),
    Sphere(&'a Sphere),
    Mesh(&'a Mesh),
    Material(&'a Material),
    Texture(&'a Texture),
    Limit(&'a Limit),
    Dynamics(&'a Dynamics),
    Mimic(&'a Mimic),
    Calibration(&'a Calibration),
    SafetyController(&'a SafetyController),
    Transmission(&'a Transmission),
    TransmissionJoint(&'a TransmissionJoint),
    Actuator(&'a Actuator),
}

fn number(key: &'static str, value: Option<f64>) -> Option<(&'static str, String)> {
    value.map(|v| (key, v.to_string()))
}

// space separated, the way the xml attribute reads
fn numbers<'v>(
    key: &'static str,
    values: impl IntoIterator<Item = &'v f64>,
) -> (&'static str, String) {
    let text = values
        .into_iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    (key, text)
}

// text equality, or the same list of numbers ("1.0" matches "1")
fn same_value(field: &str, query: &str) -> bool {
    if field == query {
        return true;
    }
    let parse = |s: &str| {
        s.split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
    };
    match (parse(field), parse(query)) {
        (Ok(a), Ok(b)) => !a.is_empty() && a == b,
        _ => false,
    }
}

impl<'a> Element<'a> {
    pub fn children(&self) -> Vec<Element<'a>> {
        match *self {
            Element::Robot(r) => r
                .materials
                .iter()
                .map(Element::Material)
                .chain(r.links().iter().map(Element::Link))
                .chain(r.joints().iter().map(Element::Joint))
                .chain(r.transmissions.iter().map(Element::Transmission))
                .collect(),
            Element::Link(l) => l
                .inertial
                .iter()
                .map(Element::Inertial)
                .chain(l.visuals.iter().map(Element::Visual))
                .chain(l.collisions.iter().map(Element::Collision))
                .collect(),
            Element::Joint(j) => {
                let mut children = Vec::new();
                children.extend(j.limit.as_ref().map(Element::Limit));
                children.extend(j.dynamics.as_ref().map(Element::Dynamics));
                children.extend(j.mimic.as_ref().map(Element::Mimic));
                children.extend(j.calibration.as_ref().map(Element::Calibration));
                children.extend(j.safety_controller.as_ref().map(Element::SafetyController));
                children
            }
            Element::Visual(v) => v
                .geometry
                .iter()
                .map(Element::Geometry)
                .chain(v.material.iter().map(Element::Material))
                .collect(),
            Element::Collision(c) => c.geometry.iter().map(Element::Geometry).collect(),
            Element::Geometry(g) => {
                let mut children = Vec::new();
                children.extend(g.cuboid.as_ref().map(Element::Cuboid));
                children.extend(g.cylinder.as_ref().map(Element::Cylinder));
                children.extend(g.sphere.as_ref().map(Element::Sphere));
                children.extend(g.mesh.as_ref().map(Element::Mesh));
                children
            }
            Element::Material(m) => m.texture.iter().map(Element::Texture).collect(),
            Element::Transmission(t) => t
                .joints
                .iter()
                .map(Element::TransmissionJoint)
                .chain(t.actuators.iter().map(Element::Actuator))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Attributes of this node, stringified. Numbers use `f64`'s `Display`,
    /// vectors (`size`, `rgba`, `axis`) are space separated.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match *self {
            Element::Robot(r) => vec![("name", r.name.clone())],
            Element::Link(l) => vec![("name", l.name.clone())],
            Element::Joint(j) => {
                let mut fields = vec![
                    ("name", j.name.clone()),
                    ("parent", j.parent.clone()),
                    ("child", j.child.clone()),
                    numbers("axis", j.axis.iter()),
                ];
                if let Some(t) = &j.joint_type {
                    fields.push(("type", t.to_string()));
                }
                fields
            }
            Element::Inertial(i) => number("mass", i.mass).into_iter().collect(),
            Element::Visual(v) => v.name.iter().map(|n| ("name", n.clone())).collect(),
            Element::Collision(c) => c.name.iter().map(|n| ("name", n.clone())).collect(),
            Element::Cylinder(c) => [number("radius", c.radius), number("length", c.length)]
                .into_iter()
                .flatten()
                .collect(),
            Element::Sphere(s) => number("radius", s.radius).into_iter().collect(),
            Element::Mesh(m) => vec![("filename", m.filename.clone())],
            Element::Material(m) => {
                let mut fields = m.name.iter().map(|n| ("name", n.clone())).collect::<Vec<_>>();
                fields.extend(m.color.as_ref().map(|c| numbers("rgba", c.rgba.iter())));
                fields
            }
            Element::Texture(t) => vec![("filename", t.filename.clone())],
            Element::Limit(l) => [
                number("effort", l.effort),
                number("velocity", l.velocity),
                number("lower", l.lower),
                number("upper", l.upper),
            ]
            .into_iter()
            .flatten()
            .collect(),
            Element::Dynamics(d) => [number("damping", d.damping), number("friction", d.friction)]
                .into_iter()
                .flatten()
                .collect(),
            Element::Mimic(m) => vec![
                ("joint", m.joint.clone()),
                ("multiplier", m.multiplier.to_string()),
                ("offset", m.offset.to_string()),
            ],
            Element::Calibration(c) => [number("rising", c.rising), number("falling", c.falling)]
                .into_iter()
                .flatten()
                .collect(),
            Element::SafetyController(s) => [
                number("soft_lower_limit", s.soft_lower_limit),
                number("soft_upper_limit", s.soft_upper_limit),
                number("k_position", s.k_position),
                number("k_velocity", s.k_velocity),
            ]
            .into_iter()
            .flatten()
            .collect(),
            Element::Transmission(t) => {
                let mut fields = vec![("name", t.name.clone())];
                fields.extend(t.kind.iter().map(|k| ("type", k.clone())));
                fields
            }
            Element::TransmissionJoint(j) => vec![("name", j.name.clone())],
            Element::Actuator(a) => {
                let mut fields = vec![("name", a.name.clone())];
                fields.extend(number("mechanical_reduction", a.mechanical_reduction));
                fields
            }
            Element::Cuboid(c) => c.size.iter().map(|s| numbers("size", s.iter())).collect(),
            Element::Geometry(_) => Vec::new(),
        }
    }
}

pub trait Visitor {
    fn visit(&mut self, element: Element<'_>) -> ControlFlow<()>;
}

/// Pre-order walk; stops as soon as the visitor breaks.
pub fn walk<V: Visitor + ?Sized>(element: Element<'_>, visitor: &mut V) -> ControlFlow<()> {
    visitor.visit(element)?;
    for child in element.children() {
        walk(child, visitor)?;
    }
    ControlFlow::Continue(())
}

struct Contains<'k> {
    key: &'k str,
    value: &'k str,
}

impl Visitor for Contains<'_> {
    fn visit(&mut self, element: Element<'_>) -> ControlFlow<()> {
        if element
            .fields()
            .iter()
            .any(|(k, v)| *k == self.key && same_value(v, self.value))
        {
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }
}

impl Robot {
    /// Whether any node of the tree has attribute `key` equal to `value`.
    /// Numeric values compare as numbers, so `"1.0"` matches a multiplier of 1.
    pub fn contains(&self, key: &str, value: &str) -> bool {
        walk(Element::Robot(self), &mut Contains { key, value }).is_break()
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{Vector3, Vector4};

    use super::*;

    fn sample() -> Robot {
        let mut robot = Robot::new("bot");
        let mut base = Link::new("base");
        base.visuals.push(Visual::new(Geometry::from_mesh(
            "package://bot/meshes/base.stl",
            None,
        )));
        robot.push_link(base);
        robot.push_link(Link::new("finger"));
        let mut joint = Joint::new("grip", JointType::Prismatic, "base", "finger");
        joint.mimic = Some(Mimic::new("other"));
        robot.push_joint(joint);
        robot
    }

    #[test]
    fn contains_test() {
        let robot = sample();
        assert!(robot.contains("name", "bot"));
        assert!(robot.contains("name", "finger"));
        assert!(robot.contains("type", "prismatic"));
        assert!(robot.contains("filename", "package://bot/meshes/base.stl"));
        assert!(robot.contains("joint", "other"));
        assert!(robot.contains("multiplier", "1"));
        assert!(!robot.contains("name", "elbow"));
        assert!(!robot.contains("type", "bot"));
    }

    #[test]
    fn contains_numeric_test() {
        let mut robot = sample();
        let mut link = Link::new("box");
        let mut visual = Visual::new(Geometry::from_cuboid(Vector3::new(0.1, 0.2, 0.3)));
        visual.material = Some(Material {
            name: Some("red".into()),
            color: Some(Color {
                rgba: Vector4::new(1.0, 0.0, 0.0, 1.0),
            }),
            texture: None,
        });
        link.visuals.push(visual);
        robot.push_link(link);

        assert!(robot.contains("multiplier", "1.0"));
        assert!(robot.contains("offset", "0.000"));
        assert!(robot.contains("size", "0.1 0.2 0.3"));
        assert!(robot.contains("rgba", "1 0 0 1"));
        assert!(robot.contains("axis", "1.0 0 0"));
        assert!(!robot.contains("size", "0.1 0.2"));
        assert!(!robot.contains("multiplier", "2"));
        assert!(!robot.contains("name", "1.0"));
    }

    struct Counter(usize);

    impl Visitor for Counter {
        fn visit(&mut self, _: Element<'_>) -> ControlFlow<()> {
            self.0 += 1;
            ControlFlow::Continue(())
        }
    }

    #[test]
    fn walk_visits_every_node_test() {
        let mut counter = Counter(0);
        let flow = walk(Element::Robot(&sample()), &mut counter);
        assert!(flow.is_continue());
        // robot, 2 links, visual, geometry, mesh, joint, mimic
        assert_eq!(counter.0, 8);
    }
}
