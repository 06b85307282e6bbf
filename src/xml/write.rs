use std::fmt::Display;
use std::io::Write;

use nalgebra::Vector3;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{Result, UrdfError};
use crate::model::*;
use crate::resolver::ResolveFilename;
use crate::transform::{is_identity, to_xyz_rpy};

type Attributes<'a> = Vec<(&'a str, String)>;

fn write_error(e: impl Display) -> UrdfError {
    UrdfError::Write(std::io::Error::other(e.to_string()))
}

fn join(values: impl IntoIterator<Item = f64>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn push_number<'a>(attributes: &mut Attributes<'a>, key: &'a str, value: Option<f64>) {
    if let Some(v) = value {
        attributes.push((key, v.to_string()));
    }
}

/// Serializes robots; mesh filenames go through `resolver` on the way out.
pub(crate) struct RobotWriter<'r, W: Write> {
    writer: Writer<W>,
    resolver: &'r dyn ResolveFilename,
}

impl<'r, W: Write> RobotWriter<'r, W> {
    pub fn new(out: W, resolver: &'r dyn ResolveFilename) -> Self {
        Self {
            writer: Writer::new_with_indent(out, b' ', 2),
            resolver,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer.write_event(event).map_err(write_error)
    }

    fn start(&mut self, tag: &str, attributes: &Attributes<'_>) -> Result<()> {
        let mut element = BytesStart::new(tag);
        for (k, v) in attributes {
            element.push_attribute((*k, v.as_str()));
        }
        self.event(Event::Start(element))
    }

    fn end(&mut self, tag: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(tag)))
    }

    fn empty(&mut self, tag: &str, attributes: &Attributes<'_>) -> Result<()> {
        let mut element = BytesStart::new(tag);
        for (k, v) in attributes {
            element.push_attribute((*k, v.as_str()));
        }
        self.event(Event::Empty(element))
    }

    fn text_element(&mut self, tag: &str, text: &str) -> Result<()> {
        self.start(tag, &Vec::new())?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(tag)
    }

    pub fn write_robot(&mut self, robot: &Robot) -> Result<()> {
        self.event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        self.start("robot", &vec![("name", robot.name.clone())])?;
        for material in &robot.materials {
            self.write_material(material)?;
        }
        for link in robot.links() {
            self.write_link(link)?;
        }
        for joint in robot.joints() {
            self.write_joint(joint)?;
        }
        for transmission in &robot.transmissions {
            self.write_transmission(transmission)?;
        }
        self.end("robot")
    }

    fn write_origin(&mut self, origin: &Transform) -> Result<()> {
        if is_identity(origin) {
            return Ok(());
        }
        let (xyz, rpy) = to_xyz_rpy(origin);
        self.empty(
            "origin",
            &vec![("xyz", join(xyz.iter().copied())), ("rpy", join(rpy.iter().copied()))],
        )
    }

    fn write_link(&mut self, link: &Link) -> Result<()> {
        self.start("link", &vec![("name", link.name.clone())])?;
        if let Some(inertial) = &link.inertial {
            self.write_inertial(inertial)?;
        }
        for visual in &link.visuals {
            self.write_visual(visual)?;
        }
        for collision in &link.collisions {
            self.write_collision(collision)?;
        }
        self.end("link")
    }

    fn write_inertial(&mut self, inertial: &Inertial) -> Result<()> {
        self.start("inertial", &Vec::new())?;
        self.write_origin(&inertial.origin)?;
        if let Some(mass) = inertial.mass {
            self.empty("mass", &vec![("value", mass.to_string())])?;
        }
        if let Some(i) = &inertial.inertia {
            self.empty(
                "inertia",
                &vec![
                    ("ixx", i[(0, 0)].to_string()),
                    ("ixy", i[(0, 1)].to_string()),
                    ("ixz", i[(0, 2)].to_string()),
                    ("iyy", i[(1, 1)].to_string()),
                    ("iyz", i[(1, 2)].to_string()),
                    ("izz", i[(2, 2)].to_string()),
                ],
            )?;
        }
        self.end("inertial")
    }

    fn write_visual(&mut self, visual: &Visual) -> Result<()> {
        let attributes = visual
            .name
            .iter()
            .map(|n| ("name", n.clone()))
            .collect::<Vec<_>>();
        self.start("visual", &attributes)?;
        self.write_origin(&visual.origin)?;
        if let Some(geometry) = &visual.geometry {
            self.write_geometry(geometry)?;
        }
        if let Some(material) = &visual.material {
            self.write_material(material)?;
        }
        self.end("visual")
    }

    fn write_collision(&mut self, collision: &Collision) -> Result<()> {
        let attributes = collision
            .name
            .iter()
            .map(|n| ("name", n.clone()))
            .collect::<Vec<_>>();
        self.start("collision", &attributes)?;
        self.write_origin(&collision.origin)?;
        if let Some(geometry) = &collision.geometry {
            self.write_geometry(geometry)?;
        }
        self.end("collision")
    }

    fn write_geometry(&mut self, geometry: &Geometry) -> Result<()> {
        self.start("geometry", &Vec::new())?;
        if let Some(cuboid) = &geometry.cuboid {
            let attributes = cuboid
                .size
                .iter()
                .map(|s| ("size", join(s.iter().copied())))
                .collect();
            self.empty("box", &attributes)?;
        }
        if let Some(cylinder) = &geometry.cylinder {
            let mut attributes = Vec::new();
            push_number(&mut attributes, "radius", cylinder.radius);
            push_number(&mut attributes, "length", cylinder.length);
            self.empty("cylinder", &attributes)?;
        }
        if let Some(sphere) = &geometry.sphere {
            let mut attributes = Vec::new();
            push_number(&mut attributes, "radius", sphere.radius);
            self.empty("sphere", &attributes)?;
        }
        if let Some(mesh) = &geometry.mesh {
            self.write_mesh(mesh)?;
        }
        self.end("geometry")
    }

    fn write_mesh(&mut self, mesh: &Mesh) -> Result<()> {
        let mut attributes = Vec::new();
        if !mesh.filename.is_empty() {
            let filename = self.resolver.resolve(&mesh.filename);
            attributes.push(("filename", filename.to_string_lossy().into_owned()));
        }
        match mesh.scale {
            Some(MeshScale::Uniform(s)) => attributes.push(("scale", s.to_string())),
            Some(MeshScale::PerAxis(v)) => attributes.push(("scale", join(v.iter().copied()))),
            None => {}
        }
        self.empty("mesh", &attributes)
    }

    fn write_material(&mut self, material: &Material) -> Result<()> {
        let attributes = material
            .name
            .iter()
            .map(|n| ("name", n.clone()))
            .collect::<Vec<_>>();
        if material.color.is_none() && material.texture.is_none() {
            return self.empty("material", &attributes);
        }
        self.start("material", &attributes)?;
        if let Some(color) = &material.color {
            self.empty("color", &vec![("rgba", join(color.rgba.iter().copied()))])?;
        }
        if let Some(texture) = &material.texture {
            self.empty("texture", &vec![("filename", texture.filename.clone())])?;
        }
        self.end("material")
    }

    fn write_joint(&mut self, joint: &Joint) -> Result<()> {
        let mut attributes = vec![("name", joint.name.clone())];
        if let Some(t) = &joint.joint_type {
            attributes.push(("type", t.to_string()));
        }
        self.start("joint", &attributes)?;
        self.empty("parent", &vec![("link", joint.parent.clone())])?;
        self.empty("child", &vec![("link", joint.child.clone())])?;
        self.write_origin(&joint.origin)?;
        self.write_axis(&joint.axis)?;

        if let Some(limit) = &joint.limit {
            let mut attributes = Vec::new();
            push_number(&mut attributes, "effort", limit.effort);
            push_number(&mut attributes, "velocity", limit.velocity);
            push_number(&mut attributes, "lower", limit.lower);
            push_number(&mut attributes, "upper", limit.upper);
            self.empty("limit", &attributes)?;
        }
        if let Some(dynamics) = &joint.dynamics {
            let mut attributes = Vec::new();
            push_number(&mut attributes, "damping", dynamics.damping);
            push_number(&mut attributes, "friction", dynamics.friction);
            self.empty("dynamics", &attributes)?;
        }
        if let Some(mimic) = &joint.mimic {
            self.empty(
                "mimic",
                &vec![
                    ("joint", mimic.joint.clone()),
                    ("multiplier", mimic.multiplier.to_string()),
                    ("offset", mimic.offset.to_string()),
                ],
            )?;
        }
        if let Some(calibration) = &joint.calibration {
            let mut attributes = Vec::new();
            push_number(&mut attributes, "rising", calibration.rising);
            push_number(&mut attributes, "falling", calibration.falling);
            self.empty("calibration", &attributes)?;
        }
        if let Some(safety) = &joint.safety_controller {
            let mut attributes = Vec::new();
            push_number(&mut attributes, "soft_lower_limit", safety.soft_lower_limit);
            push_number(&mut attributes, "soft_upper_limit", safety.soft_upper_limit);
            push_number(&mut attributes, "k_position", safety.k_position);
            push_number(&mut attributes, "k_velocity", safety.k_velocity);
            self.empty("safety_controller", &attributes)?;
        }
        self.end("joint")
    }

    fn write_axis(&mut self, axis: &Vector3<f64>) -> Result<()> {
        self.empty("axis", &vec![("xyz", join(axis.iter().copied()))])
    }

    fn write_transmission(&mut self, transmission: &Transmission) -> Result<()> {
        self.start("transmission", &vec![("name", transmission.name.clone())])?;
        if let Some(kind) = &transmission.kind {
            self.text_element("type", kind)?;
        }
        for joint in &transmission.joints {
            self.start("joint", &vec![("name", joint.name.clone())])?;
            for h in &joint.hardware_interfaces {
                self.text_element("hardwareInterface", h)?;
            }
            self.end("joint")?;
        }
        for actuator in &transmission.actuators {
            self.start("actuator", &vec![("name", actuator.name.clone())])?;
            if let Some(reduction) = actuator.mechanical_reduction {
                self.text_element("mechanicalReduction", &reduction.to_string())?;
            }
            for h in &actuator.hardware_interfaces {
                self.text_element("hardwareInterface", h)?;
            }
            self.end("actuator")?;
        }
        self.end("transmission")
    }
}
