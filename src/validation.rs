use std::fmt;
use std::ops::ControlFlow;

use hashbrown::HashSet;

use crate::model::{Geometry, Joint, JointType, Limit, Robot};
use crate::visit::{walk, Element, Visitor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Incomplete,
    InvalidAttributeValue,
    BrokenReference,
    Malformed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Default policy: any diagnostic makes the document invalid.
pub fn strict(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.is_empty()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    pub diagnostics: Vec<Diagnostic>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        strict(&self.diagnostics)
    }

    pub fn is_valid_with<F>(&self, policy: F) -> bool
    where
        F: FnOnce(&[Diagnostic]) -> bool,
    {
        policy(&self.diagnostics)
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }
}

// never fails, callers judge the collected diagnostics with a policy
pub fn validate(robot: &Robot) -> Validation {
    let mut validator = Validator {
        robot,
        diagnostics: Vec::new(),
    };
    // the validator never breaks out of the walk
    let _ = walk(Element::Robot(robot), &mut validator);
    Validation {
        diagnostics: validator.diagnostics,
    }
}

struct Validator<'r> {
    robot: &'r Robot,
    diagnostics: Vec<Diagnostic>,
}

impl Validator<'_> {
    fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(kind, message));
    }

    fn require(&mut self, value: &str, message: &str) {
        if value.is_empty() {
            self.report(DiagnosticKind::Incomplete, message);
        }
    }

    fn robot(&mut self, robot: &Robot) {
        self.require(&robot.name, "the <robot> tag misses a 'name' attribute");

        let mut seen = HashSet::new();
        for link in robot.links() {
            if !seen.insert(link.name.as_str()) {
                self.report(
                    DiagnosticKind::Malformed,
                    format!("duplicate link name '{}'", link.name),
                );
            }
        }
        let mut seen = HashSet::new();
        for joint in robot.joints() {
            if !seen.insert(joint.name.as_str()) {
                self.report(
                    DiagnosticKind::Malformed,
                    format!("duplicate joint name '{}'", joint.name),
                );
            }
        }

        if !robot.links().is_empty() && robot.base_link().is_none() {
            self.report(
                DiagnosticKind::Malformed,
                "no base link: every link is the child of some joint",
            );
        }
    }

    fn geometry(&mut self, geometry: Option<&Geometry>, owner: &str) {
        let Some(geometry) = geometry else {
            self.report(
                DiagnosticKind::Incomplete,
                format!("<geometry> of a <{owner}> is missing"),
            );
            return;
        };
        match geometry.variant_count() {
            0 => self.report(
                DiagnosticKind::Incomplete,
                "one of <sphere>, <cylinder>, <box>, <mesh> needs to be defined as a child of <geometry>",
            ),
            1 => {}
            _ => self.report(
                DiagnosticKind::Malformed,
                "too many of <sphere>, <cylinder>, <box>, <mesh> defined as a child of <geometry>, only one allowed",
            ),
        }
    }

    fn joint(&mut self, joint: &Joint) {
        self.require(&joint.name, "the <joint> tag misses a 'name' attribute");

        match &joint.joint_type {
            None => self.report(
                DiagnosticKind::Incomplete,
                format!("joint '{}' misses a 'type' attribute", joint.name),
            ),
            Some(JointType::Unknown(t)) => self.report(
                DiagnosticKind::InvalidAttributeValue,
                format!(
                    "joint '{}' has type '{}', allowed values are [{}]",
                    joint.name,
                    t,
                    JointType::ALLOWED.join(", ")
                ),
            ),
            Some(_) => {}
        }

        self.require(&joint.parent, "the <parent> of a <joint> is missing");
        self.require(&joint.child, "the <child> of a <joint> is missing");
        for (role, link) in [("parent", &joint.parent), ("child", &joint.child)] {
            if !link.is_empty() && self.robot.link(link).is_none() {
                self.report(
                    DiagnosticKind::BrokenReference,
                    format!("{role} link '{link}' of joint '{}' does not exist", joint.name),
                );
            }
        }

        if joint.is_type(&JointType::Revolute) || joint.is_type(&JointType::Prismatic) {
            match &joint.limit {
                None => self.report(
                    DiagnosticKind::Incomplete,
                    format!(
                        "the <limit> of (prismatic, revolute) joint '{}' is missing",
                        joint.name
                    ),
                ),
                Some(limit) => self.limit(limit, &joint.name),
            }
        }

        if let Some(mimic) = &joint.mimic {
            if mimic.joint.is_empty() {
                self.report(
                    DiagnosticKind::Incomplete,
                    format!("<mimic> of joint '{}' misses a 'joint' attribute", joint.name),
                );
            } else if mimic.joint == joint.name {
                self.report(
                    DiagnosticKind::BrokenReference,
                    format!("joint '{}' mimics itself", joint.name),
                );
            } else if self.robot.joint(&mimic.joint).is_none() {
                self.report(
                    DiagnosticKind::BrokenReference,
                    format!(
                        "joint '{}' mimics unknown joint '{}'",
                        joint.name, mimic.joint
                    ),
                );
            }
        }
    }

    fn limit(&mut self, limit: &Limit, joint: &str) {
        if limit.effort.is_none() {
            self.report(
                DiagnosticKind::Incomplete,
                format!("<limit> of joint '{joint}' is missing attribute 'effort'"),
            );
        }
        if limit.velocity.is_none() {
            self.report(
                DiagnosticKind::Incomplete,
                format!("<limit> of joint '{joint}' is missing attribute 'velocity'"),
            );
        }
    }
}

impl Visitor for Validator<'_> {
    fn visit(&mut self, element: Element<'_>) -> ControlFlow<()> {
        match element {
            Element::Robot(r) => self.robot(r),
            Element::Link(l) => self.require(&l.name, "the <link> tag misses a 'name' attribute"),
            Element::Visual(v) => self.geometry(v.geometry.as_ref(), "visual"),
            Element::Collision(c) => self.geometry(c.geometry.as_ref(), "collision"),
            Element::Joint(j) => self.joint(j),
            Element::Cuboid(b) if b.size.is_none() => {
                self.report(DiagnosticKind::Incomplete, "<box> misses a 'size' attribute")
            }
            Element::Sphere(s) if s.radius.is_none() => {
                self.report(DiagnosticKind::Incomplete, "<sphere> misses a 'radius' attribute")
            }
            Element::Cylinder(c) if c.radius.is_none() || c.length.is_none() => self.report(
                DiagnosticKind::Incomplete,
                "<cylinder> needs both 'radius' and 'length'",
            ),
            Element::Mesh(m) => self.require(&m.filename, "<mesh> misses a 'filename' attribute"),
            Element::Texture(t) => {
                self.require(&t.filename, "<texture> misses a 'filename' attribute")
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }
}
