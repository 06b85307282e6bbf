use std::fmt;

use hashbrown::HashMap;
use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};

/// Homogeneous 4x4 transform.
pub type Transform = Matrix4<f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct Robot {
    pub name: String,
    links: Vec<Link>,
    joints: Vec<Joint>,
    // name -> index into links/joints, first declaration wins
    link_index: HashMap<String, usize>,
    joint_index: HashMap<String, usize>,
    pub materials: Vec<Material>,
    pub transmissions: Vec<Transmission>,
}

impl Robot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            links: Vec::new(),
            joints: Vec::new(),
            link_index: HashMap::new(),
            joint_index: HashMap::new(),
            materials: Vec::new(),
            transmissions: Vec::new(),
        }
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn link(&self, name: &str) -> Option<&Link> {
        self.link_index.get(name).map(|&i| &self.links[i])
    }

    pub fn joint(&self, name: &str) -> Option<&Joint> {
        self.joint_index.get(name).map(|&i| &self.joints[i])
    }

    /// Mutable access to a link. Renaming through this handle leaves the
    /// index stale; use [`Robot::remove_link`] and [`Robot::push_link`].
    pub fn link_mut(&mut self, name: &str) -> Option<&mut Link> {
        self.link_index.get(name).map(|&i| &mut self.links[i])
    }

    pub fn joint_mut(&mut self, name: &str) -> Option<&mut Joint> {
        self.joint_index.get(name).map(|&i| &mut self.joints[i])
    }

    pub fn link_index(&self, name: &str) -> Option<usize> {
        self.link_index.get(name).copied()
    }

    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joint_index.get(name).copied()
    }

    pub fn push_link(&mut self, link: Link) {
        self.link_index
            .entry(link.name.clone())
            .or_insert(self.links.len());
        self.links.push(link);
    }

    pub fn push_joint(&mut self, joint: Joint) {
        self.joint_index
            .entry(joint.name.clone())
            .or_insert(self.joints.len());
        self.joints.push(joint);
    }

    /// Removes a link. Joints referring to it are left in place.
    pub fn remove_link(&mut self, name: &str) -> Option<Link> {
        let index = self.link_index(name)?;
        let link = self.links.remove(index);
        self.reindex();
        Some(link)
    }

    pub fn remove_joint(&mut self, name: &str) -> Option<Joint> {
        let index = self.joint_index(name)?;
        let joint = self.joints.remove(index);
        self.reindex();
        Some(joint)
    }

    pub fn joint_names(&self) -> Vec<&str> {
        self.joints.iter().map(|j| j.name.as_str()).collect()
    }

    fn reindex(&mut self) {
        self.link_index.clear();
        for (i, link) in self.links.iter().enumerate() {
            self.link_index.entry(link.name.clone()).or_insert(i);
        }
        self.joint_index.clear();
        for (i, joint) in self.joints.iter().enumerate() {
            self.joint_index.entry(joint.name.clone()).or_insert(i);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub name: String,
    pub inertial: Option<Inertial>,
    pub visuals: Vec<Visual>,
    pub collisions: Vec<Collision>,
}

impl Link {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inertial: None,
            visuals: Vec::new(),
            collisions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inertial {
    pub origin: Transform,
    pub mass: Option<f64>,
    pub inertia: Option<Matrix3<f64>>,
}

impl Default for Inertial {
    fn default() -> Self {
        Self {
            origin: Transform::identity(),
            mass: None,
            inertia: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Visual {
    pub name: Option<String>,
    pub origin: Transform,
    pub geometry: Option<Geometry>,
    pub material: Option<Material>,
}

impl Visual {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            name: None,
            origin: Transform::identity(),
            geometry: Some(geometry),
            material: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    pub name: Option<String>,
    pub origin: Transform,
    pub geometry: Option<Geometry>,
}

impl Collision {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            name: None,
            origin: Transform::identity(),
            geometry: Some(geometry),
        }
    }
}

/// Shape of a visual or collision element.
///
/// Exactly one variant should be populated. The reader accepts zero or
/// several and leaves it to the validator to complain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    /// `<box>`
    pub cuboid: Option<Cuboid>,
    pub cylinder: Option<Cylinder>,
    pub sphere: Option<Sphere>,
    pub mesh: Option<Mesh>,
}

/// Borrowed view of the populated geometry variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape<'a> {
    Cuboid(&'a Cuboid),
    Cylinder(&'a Cylinder),
    Sphere(&'a Sphere),
    Mesh(&'a Mesh),
}

impl Geometry {
    pub fn from_cuboid(size: Vector3<f64>) -> Self {
        Self {
            cuboid: Some(Cuboid { size: Some(size) }),
            ..Default::default()
        }
    }

    pub fn from_sphere(radius: f64) -> Self {
        Self {
            sphere: Some(Sphere {
                radius: Some(radius),
            }),
            ..Default::default()
        }
    }

    pub fn from_cylinder(radius: f64, length: f64) -> Self {
        Self {
            cylinder: Some(Cylinder {
                radius: Some(radius),
                length: Some(length),
            }),
            ..Default::default()
        }
    }

    pub fn from_mesh(filename: impl Into<String>, scale: Option<MeshScale>) -> Self {
        Self {
            mesh: Some(Mesh {
                filename: filename.into(),
                scale,
            }),
            ..Default::default()
        }
    }

    /// Number of populated variants.
    pub fn variant_count(&self) -> usize {
        [
            self.cuboid.is_some(),
            self.cylinder.is_some(),
            self.sphere.is_some(),
            self.mesh.is_some(),
        ]
        .iter()
        .filter(|&&set| set)
        .count()
    }

    /// The first populated variant, in `box`, `cylinder`, `sphere`, `mesh` order.
    pub fn shape(&self) -> Option<Shape<'_>> {
        if let Some(c) = &self.cuboid {
            Some(Shape::Cuboid(c))
        } else if let Some(c) = &self.cylinder {
            Some(Shape::Cylinder(c))
        } else if let Some(s) = &self.sphere {
            Some(Shape::Sphere(s))
        } else {
            self.mesh.as_ref().map(Shape::Mesh)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cuboid {
    pub size: Option<Vector3<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cylinder {
    pub radius: Option<f64>,
    pub length: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sphere {
    pub radius: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Asset reference as written in the document; empty when absent.
    pub filename: String,
    pub scale: Option<MeshScale>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeshScale {
    Uniform(f64),
    PerAxis(Vector3<f64>),
}

impl MeshScale {
    pub fn is_uniform(&self) -> bool {
        match self {
            MeshScale::Uniform(_) => true,
            MeshScale::PerAxis(v) => v.x == v.y && v.y == v.z,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub color: Option<Color>,
    pub texture: Option<Texture>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Color {
    pub rgba: Vector4<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JointType {
    Revolute,
    Continuous,
    Prismatic,
    Fixed,
    Floating,
    Planar,
    /// A `type` attribute outside the allowed set, kept verbatim.
    Unknown(String),
}

impl JointType {
    pub const ALLOWED: [&'static str; 6] = [
        "revolute",
        "continuous",
        "prismatic",
        "fixed",
        "floating",
        "planar",
    ];

    pub fn parse(s: &str) -> Self {
        match s {
            "revolute" => JointType::Revolute,
            "continuous" => JointType::Continuous,
            "prismatic" => JointType::Prismatic,
            "fixed" => JointType::Fixed,
            "floating" => JointType::Floating,
            "planar" => JointType::Planar,
            other => JointType::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JointType::Revolute => "revolute",
            JointType::Continuous => "continuous",
            JointType::Prismatic => "prismatic",
            JointType::Fixed => "fixed",
            JointType::Floating => "floating",
            JointType::Planar => "planar",
            JointType::Unknown(s) => s,
        }
    }

    /// Degrees of freedom of the configuration slot for this type.
    pub fn dof(&self) -> usize {
        match self {
            JointType::Floating => 6,
            JointType::Planar => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for JointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    /// `None` when the document has no `type` attribute.
    pub joint_type: Option<JointType>,
    pub parent: String,
    pub child: String,
    pub origin: Transform,
    pub axis: Vector3<f64>,
    pub limit: Option<Limit>,
    pub dynamics: Option<Dynamics>,
    pub mimic: Option<Mimic>,
    pub calibration: Option<Calibration>,
    pub safety_controller: Option<SafetyController>,
}

impl Joint {
    pub fn new(
        name: impl Into<String>,
        joint_type: JointType,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            joint_type: Some(joint_type),
            parent: parent.into(),
            child: child.into(),
            origin: Transform::identity(),
            axis: Vector3::x(),
            limit: None,
            dynamics: None,
            mimic: None,
            calibration: None,
            safety_controller: None,
        }
    }

    pub fn is_type(&self, joint_type: &JointType) -> bool {
        self.joint_type.as_ref() == Some(joint_type)
    }

    /// Neither fixed nor driven by another joint.
    pub fn is_actuated(&self) -> bool {
        self.mimic.is_none() && !self.is_type(&JointType::Fixed)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Limit {
    pub effort: Option<f64>,
    pub velocity: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dynamics {
    pub damping: Option<f64>,
    pub friction: Option<f64>,
}

/// `q = multiplier * q(joint) + offset`
#[derive(Debug, Clone, PartialEq)]
pub struct Mimic {
    pub joint: String,
    pub multiplier: f64,
    pub offset: f64,
}

impl Mimic {
    pub fn new(joint: impl Into<String>) -> Self {
        Self {
            joint: joint.into(),
            multiplier: 1.0,
            offset: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Calibration {
    pub rising: Option<f64>,
    pub falling: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafetyController {
    pub soft_lower_limit: Option<f64>,
    pub soft_upper_limit: Option<f64>,
    pub k_position: Option<f64>,
    pub k_velocity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transmission {
    pub name: String,
    pub kind: Option<String>,
    pub joints: Vec<TransmissionJoint>,
    pub actuators: Vec<Actuator>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransmissionJoint {
    pub name: String,
    pub hardware_interfaces: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Actuator {
    pub name: String,
    pub mechanical_reduction: Option<f64>,
    pub hardware_interfaces: Vec<String>,
}
