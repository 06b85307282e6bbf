use std::ops::Index;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::error::{Result, UrdfError};
use crate::model::{Joint, JointType, Robot, Transform};
use crate::scene::SceneGraph;
use crate::transform::{rotation, translation};

/// Value of one joint slot: a scalar for one-dof joints, a vector for
/// floating (6) and planar (2) joints.
#[derive(Debug, Clone, PartialEq)]
pub enum JointValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl JointValue {
    fn zeros(dof: usize) -> Self {
        if dof == 1 {
            JointValue::Scalar(0.0)
        } else {
            JointValue::Vector(vec![0.0; dof])
        }
    }

    /// The scalar value; for a vector slot its first component.
    pub fn scalar(&self) -> f64 {
        match self {
            JointValue::Scalar(q) => *q,
            JointValue::Vector(v) => v.first().copied().unwrap_or(0.0),
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        match self {
            JointValue::Scalar(q) => std::slice::from_ref(q),
            JointValue::Vector(v) => v,
        }
    }
}

impl From<f64> for JointValue {
    fn from(q: f64) -> Self {
        JointValue::Scalar(q)
    }
}

impl From<Vec<f64>> for JointValue {
    fn from(v: Vec<f64>) -> Self {
        JointValue::Vector(v)
    }
}

/// One slot per joint, in joint declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    values: Vec<JointValue>,
}

impl Configuration {
    pub fn values(&self) -> &[JointValue] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&JointValue> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All slots concatenated.
    pub fn flatten(&self) -> Vec<f64> {
        self.values
            .iter()
            .flat_map(|v| v.as_slice().iter().copied())
            .collect()
    }
}

impl Index<usize> for Configuration {
    type Output = JointValue;

    fn index(&self, index: usize) -> &JointValue {
        &self.values[index]
    }
}

impl From<Vec<JointValue>> for Configuration {
    fn from(values: Vec<JointValue>) -> Self {
        Self { values }
    }
}

/// Input accepted by [`Kinematics::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationInput {
    /// Joint name to value.
    Named(Vec<(String, JointValue)>),
    /// One value for every joint, or one for every actuated joint.
    Dense(Vec<JointValue>),
}

impl From<Vec<f64>> for ConfigurationInput {
    fn from(values: Vec<f64>) -> Self {
        ConfigurationInput::Dense(values.into_iter().map(JointValue::Scalar).collect())
    }
}

impl From<&[f64]> for ConfigurationInput {
    fn from(values: &[f64]) -> Self {
        values.to_vec().into()
    }
}

impl<const N: usize> From<[f64; N]> for ConfigurationInput {
    fn from(values: [f64; N]) -> Self {
        values.to_vec().into()
    }
}

impl From<Vec<JointValue>> for ConfigurationInput {
    fn from(values: Vec<JointValue>) -> Self {
        ConfigurationInput::Dense(values)
    }
}

impl From<std::collections::HashMap<String, f64>> for ConfigurationInput {
    fn from(map: std::collections::HashMap<String, f64>) -> Self {
        ConfigurationInput::Named(
            map.into_iter()
                .map(|(name, q)| (name, JointValue::Scalar(q)))
                .collect(),
        )
    }
}

impl From<Vec<(&str, f64)>> for ConfigurationInput {
    fn from(pairs: Vec<(&str, f64)>) -> Self {
        ConfigurationInput::Named(
            pairs
                .into_iter()
                .map(|(name, q)| (name.to_string(), JointValue::Scalar(q)))
                .collect(),
        )
    }
}

/// Local transform of a joint, to be applied as the `parent -> child` edge
/// of a scene graph.
#[derive(Debug, Clone, PartialEq)]
pub struct JointTransform {
    pub joint: String,
    pub parent: String,
    pub child: String,
    pub transform: Transform,
}

/// Pushes joint transforms into a scene graph, in order.
pub fn apply_transforms<G: SceneGraph + ?Sized>(scene: &mut G, transforms: &[JointTransform]) {
    for t in transforms {
        scene.update(&t.parent, &t.child, t.transform);
    }
}

/// `origin` followed by the motion the joint value describes.
///
/// Revolute joints rotate about their axis, prismatic and continuous joints
/// translate along it. Fixed, floating and planar joints are not
/// parameterized here and yield their origin.
pub fn joint_transform(joint: &Joint, q: f64) -> Transform {
    match joint.joint_type {
        Some(JointType::Revolute) => joint.origin * rotation(&joint.axis, q),
        Some(JointType::Prismatic) | Some(JointType::Continuous) => {
            joint.origin * translation(&(joint.axis * q))
        }
        _ => joint.origin,
    }
}

/// Midpoint of the limits for revolute/prismatic joints, zero everywhere
/// else; mimic joints are resolved from their targets afterwards.
pub fn default_configuration(robot: &Robot) -> Configuration {
    let mut values = robot.joints().iter().map(default_value).collect::<Vec<_>>();
    for index in mimic_order(robot) {
        if let Some(q) = mimic_value(robot, index, &values) {
            values[index] = JointValue::Scalar(q);
        }
    }
    Configuration { values }
}

fn default_value(joint: &Joint) -> JointValue {
    if joint.mimic.is_some() {
        return JointValue::Scalar(0.0);
    }
    match &joint.joint_type {
        Some(JointType::Revolute) | Some(JointType::Prismatic) => {
            let q = joint
                .limit
                .as_ref()
                .map(|limit| {
                    let lower = limit.lower.unwrap_or(0.0);
                    let upper = limit.upper.unwrap_or(0.0);
                    lower + 0.5 * (upper - lower)
                })
                .unwrap_or(0.0);
            JointValue::Scalar(q)
        }
        Some(t) => JointValue::zeros(t.dof()),
        None => JointValue::Scalar(0.0),
    }
}

// mimic joints ordered so that a mimic driven by another mimic comes after it
fn mimic_order(robot: &Robot) -> Vec<usize> {
    let mimics = robot
        .joints()
        .iter()
        .enumerate()
        .filter(|(_, j)| j.mimic.is_some())
        .map(|(i, _)| i)
        .collect::<Vec<_>>();

    let mut graph = DiGraphMap::<usize, ()>::new();
    for &index in &mimics {
        graph.add_node(index);
    }
    for &index in &mimics {
        let target = robot.joints()[index]
            .mimic
            .as_ref()
            .and_then(|m| robot.joint_index(&m.joint));
        if let Some(target) = target {
            if target != index && graph.contains_node(target) {
                graph.add_edge(target, index, ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(order) => order,
        Err(cycle) => {
            warn!(
                "mimic joints form a cycle through '{}', evaluating in declaration order",
                robot.joints()[cycle.node_id()].name
            );
            mimics
        }
    }
}

fn mimic_value(robot: &Robot, index: usize, values: &[JointValue]) -> Option<f64> {
    let joint = &robot.joints()[index];
    let mimic = joint.mimic.as_ref()?;
    match robot.joint_index(&mimic.joint) {
        Some(target) if target != index => {
            Some(mimic.multiplier * values[target].scalar() + mimic.offset)
        }
        _ => {
            warn!(
                "joint '{}' mimics unknown joint '{}', keeping its value",
                joint.name, mimic.joint
            );
            None
        }
    }
}

/// Configuration state of one robot.
///
/// Holds the configuration vector and what is derived from the joint list.
/// Rebuild it when joints are added, removed or retyped.
#[derive(Debug, Clone)]
pub struct Kinematics {
    cfg: Configuration,
    actuated: Vec<usize>,
    mimic_order: Vec<usize>,
}

impl Kinematics {
    pub fn new(robot: &Robot) -> Self {
        Self {
            cfg: default_configuration(robot),
            actuated: robot
                .joints()
                .iter()
                .enumerate()
                .filter(|(_, j)| j.is_actuated())
                .map(|(i, _)| i)
                .collect(),
            mimic_order: mimic_order(robot),
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.cfg
    }

    /// Indices of joints that are neither fixed nor mimic-driven.
    pub fn actuated_joint_indices(&self) -> &[usize] {
        &self.actuated
    }

    /// Sets joint values and returns the resulting local transforms.
    ///
    /// The touched joints come first, followed by every mimic joint,
    /// re-evaluated against the updated vector. Nothing is changed when the
    /// input is rejected.
    pub fn update(
        &mut self,
        robot: &Robot,
        input: ConfigurationInput,
    ) -> Result<Vec<JointTransform>> {
        let joints = robot.joints();
        let updates = match input {
            ConfigurationInput::Named(pairs) => pairs
                .into_iter()
                .map(|(name, value)| {
                    let index = robot.joint_index(&name).ok_or_else(|| {
                        UrdfError::BrokenReference(format!("no joint named '{name}'"))
                    })?;
                    Ok((index, checked(&joints[index], value)?))
                })
                .collect::<Result<Vec<_>>>()?,
            ConfigurationInput::Dense(values) => {
                let indices = if values.len() == joints.len() {
                    (0..joints.len()).collect::<Vec<_>>()
                } else if values.len() == self.actuated.len() {
                    self.actuated.clone()
                } else {
                    return Err(UrdfError::DimensionMismatch {
                        got: values.len(),
                        total: joints.len(),
                        actuated: self.actuated.len(),
                    });
                };
                indices
                    .into_iter()
                    .zip(values)
                    .map(|(index, value)| Ok((index, checked(&joints[index], value)?)))
                    .collect::<Result<Vec<_>>>()?
            }
        };

        let mut transforms = Vec::with_capacity(updates.len() + self.mimic_order.len());
        for (index, value) in updates {
            // mimic joints follow their target, whatever was passed
            if joints[index].mimic.is_some() {
                continue;
            }
            transforms.push(transform_of(&joints[index], value.scalar()));
            self.cfg.values[index] = value;
        }
        for &index in &self.mimic_order {
            if let Some(q) = mimic_value(robot, index, &self.cfg.values) {
                self.cfg.values[index] = JointValue::Scalar(q);
            }
            transforms.push(transform_of(&joints[index], self.cfg.values[index].scalar()));
        }
        Ok(transforms)
    }

    /// Local transforms of every joint at the current configuration.
    pub fn transforms(&self, robot: &Robot) -> Vec<JointTransform> {
        robot
            .joints()
            .iter()
            .zip(self.cfg.values())
            .map(|(joint, value)| transform_of(joint, value.scalar()))
            .collect()
    }
}

fn transform_of(joint: &Joint, q: f64) -> JointTransform {
    JointTransform {
        joint: joint.name.clone(),
        parent: joint.parent.clone(),
        child: joint.child.clone(),
        transform: joint_transform(joint, q),
    }
}

// one-dof slots take a scalar (or a one-element vector), floating and
// planar slots a vector of their dof or a scalar, widened with zeros
fn checked(joint: &Joint, value: JointValue) -> Result<JointValue> {
    let dof = if joint.mimic.is_some() {
        1
    } else {
        joint.joint_type.as_ref().map(JointType::dof).unwrap_or(1)
    };
    match value {
        JointValue::Scalar(q) if dof == 1 => Ok(JointValue::Scalar(q)),
        JointValue::Vector(v) if dof == 1 && v.len() == 1 => Ok(JointValue::Scalar(v[0])),
        JointValue::Vector(v) if dof > 1 && v.len() == dof => Ok(JointValue::Vector(v)),
        JointValue::Scalar(q) => {
            let mut v = vec![0.0; dof];
            v[0] = q;
            Ok(JointValue::Vector(v))
        }
        value => Err(UrdfError::InvalidConfiguration(format!(
            "joint '{}' takes {dof} value(s), got {}",
            joint.name,
            value.as_slice().len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use approx::assert_relative_eq;
    use nalgebra::{Vector3, Vector4};

    use super::*;
    use crate::model::{Limit, Link, Mimic};

    fn limited(name: &str, t: JointType, parent: &str, child: &str, lower: f64, upper: f64) -> Joint {
        let mut joint = Joint::new(name, t, parent, child);
        joint.limit = Some(Limit {
            effort: Some(1.0),
            velocity: Some(1.0),
            lower: Some(lower),
            upper: Some(upper),
        });
        joint
    }

    fn mimic(name: &str, target: &str, parent: &str, child: &str, multiplier: f64, offset: f64) -> Joint {
        let mut joint = limited(name, JointType::Revolute, parent, child, -1.0, 1.0);
        joint.mimic = Some(Mimic {
            joint: target.to_string(),
            multiplier,
            offset,
        });
        joint
    }

    // j0 drives m1, m1 drives m2; m2 is declared before m1
    fn arm() -> Robot {
        let mut robot = Robot::new("arm");
        for name in ["base", "l0", "l1", "l2", "l3", "tool"] {
            robot.push_link(Link::new(name));
        }
        robot.push_joint(limited("j0", JointType::Revolute, "base", "l0", -1.0, 2.0));
        robot.push_joint(mimic("m2", "m1", "l0", "l1", 2.0, 0.5));
        robot.push_joint(mimic("m1", "j0", "l1", "l2", -1.0, 0.1));
        robot.push_joint(limited("slide", JointType::Prismatic, "l2", "l3", 0.0, 0.4));
        robot.push_joint(Joint::new("flange", JointType::Fixed, "l3", "tool"));
        robot
    }

    fn assert_mimics_hold(robot: &Robot, cfg: &Configuration) {
        for (i, joint) in robot.joints().iter().enumerate() {
            if let Some(m) = &joint.mimic {
                let target = robot.joint_index(&m.joint).unwrap();
                assert_relative_eq!(
                    cfg[i].scalar(),
                    m.multiplier * cfg[target].scalar() + m.offset,
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn default_configuration_test() {
        let robot = arm();
        let cfg = default_configuration(&robot);
        assert_eq!(cfg.len(), 5);
        assert_relative_eq!(cfg[0].scalar(), 0.5);
        assert_relative_eq!(cfg[3].scalar(), 0.2);
        assert_eq!(cfg[4], JointValue::Scalar(0.0));
        assert_mimics_hold(&robot, &cfg);
        assert_eq!(cfg, default_configuration(&robot));
    }

    #[test]
    fn default_configuration_shapes_test() {
        let mut robot = Robot::new("shapes");
        for name in ["a", "b", "c", "d"] {
            robot.push_link(Link::new(name));
        }
        robot.push_joint(Joint::new("free", JointType::Floating, "a", "b"));
        robot.push_joint(Joint::new("plane", JointType::Planar, "b", "c"));
        // no limit: zero
        robot.push_joint(Joint::new("hinge", JointType::Revolute, "c", "d"));
        let cfg = default_configuration(&robot);
        assert_eq!(cfg[0], JointValue::Vector(vec![0.0; 6]));
        assert_eq!(cfg[1], JointValue::Vector(vec![0.0; 2]));
        assert_eq!(cfg[2], JointValue::Scalar(0.0));
        assert_eq!(cfg.flatten().len(), 9);
    }

    #[test]
    fn dense_update_test() {
        let robot = arm();
        let mut kin = Kinematics::new(&robot);
        assert_eq!(kin.actuated_joint_indices(), &[0, 3]);

        // actuated joints only
        let transforms = kin.update(&robot, [0.3, 0.1].into()).unwrap();
        assert_relative_eq!(kin.configuration()[0].scalar(), 0.3);
        assert_relative_eq!(kin.configuration()[3].scalar(), 0.1);
        assert_mimics_hold(&robot, kin.configuration());
        // two touched joints, then both mimic joints
        assert_eq!(transforms.len(), 4);
        assert_eq!(transforms[0].joint, "j0");

        // every joint; values given for mimic joints are overridden
        kin.update(&robot, vec![0.7, 9.0, 9.0, 0.2, 0.0].into()).unwrap();
        assert_relative_eq!(kin.configuration()[0].scalar(), 0.7);
        assert_mimics_hold(&robot, kin.configuration());
    }

    #[test]
    fn mimic_chain_test() {
        let robot = arm();
        let mut kin = Kinematics::new(&robot);
        kin.update(&robot, vec![("j0", 1.0)].into()).unwrap();
        let m1 = -1.0 * 1.0 + 0.1;
        assert_relative_eq!(kin.configuration()[2].scalar(), m1);
        assert_relative_eq!(kin.configuration()[1].scalar(), 2.0 * m1 + 0.5);
    }

    #[test]
    fn dimension_mismatch_test() {
        let robot = arm();
        let mut kin = Kinematics::new(&robot);
        let before = kin.configuration().clone();
        let err = kin.update(&robot, [0.1, 0.2, 0.3].into()).unwrap_err();
        assert!(matches!(
            err,
            UrdfError::DimensionMismatch {
                got: 3,
                total: 5,
                actuated: 2
            }
        ));
        assert_eq!(kin.configuration(), &before);
    }

    #[test]
    fn named_update_test() {
        let robot = arm();
        let mut kin = Kinematics::new(&robot);
        let mut map = std::collections::HashMap::new();
        map.insert("slide".to_string(), 0.35);
        let transforms = kin.update(&robot, map.into()).unwrap();
        assert_relative_eq!(kin.configuration()[3].scalar(), 0.35);
        assert_eq!(transforms.len(), 3);

        let err = kin.update(&robot, vec![("elbow", 0.0)].into()).unwrap_err();
        assert!(matches!(err, UrdfError::BrokenReference(_)));
    }

    #[test]
    fn arity_test() {
        let mut robot = Robot::new("free");
        robot.push_link(Link::new("world"));
        robot.push_link(Link::new("body"));
        robot.push_joint(Joint::new("free", JointType::Floating, "world", "body"));
        let mut kin = Kinematics::new(&robot);

        let err = kin
            .update(&robot, ConfigurationInput::Named(vec![("free".into(), vec![1.0; 3].into())]))
            .unwrap_err();
        assert!(matches!(err, UrdfError::InvalidConfiguration(_)));

        // a scalar fills the first component
        kin.update(&robot, vec![("free", 0.5)].into()).unwrap();
        assert_eq!(
            kin.configuration()[0],
            JointValue::Vector(vec![0.5, 0.0, 0.0, 0.0, 0.0, 0.0])
        );

        let input = ConfigurationInput::Named(vec![("free".into(), vec![1.0; 6].into())]);
        kin.update(&robot, input).unwrap();
        assert_eq!(kin.configuration()[0], JointValue::Vector(vec![1.0; 6]));
    }

    #[test]
    fn mimic_cycle_terminates_test() {
        let mut robot = Robot::new("cycle");
        for name in ["a", "b", "c"] {
            robot.push_link(Link::new(name));
        }
        robot.push_joint(mimic("x", "y", "a", "b", 1.0, 1.0));
        robot.push_joint(mimic("y", "x", "b", "c", 1.0, 1.0));
        let mut kin = Kinematics::new(&robot);
        assert!(kin.actuated_joint_indices().is_empty());
        let transforms = kin.update(&robot, Vec::<f64>::new().into()).unwrap();
        assert_eq!(transforms.len(), 2);
    }

    #[test]
    fn unknown_mimic_target_test() {
        let mut robot = Robot::new("dangling");
        robot.push_link(Link::new("a"));
        robot.push_link(Link::new("b"));
        robot.push_joint(mimic("m", "ghost", "a", "b", 2.0, 1.0));
        let mut kin = Kinematics::new(&robot);
        kin.update(&robot, Vec::<f64>::new().into()).unwrap();
        assert_eq!(kin.configuration()[0], JointValue::Scalar(0.0));
    }

    #[test]
    fn joint_transform_test() {
        let mut joint = Joint::new("j", JointType::Revolute, "a", "b");
        joint.axis = Vector3::z();
        joint.origin = translation(&Vector3::new(0.0, 0.0, 1.0));
        let p = joint_transform(&joint, FRAC_PI_2) * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p, Vector4::new(0.0, 1.0, 1.0, 1.0), epsilon = 1e-12);

        joint.joint_type = Some(JointType::Prismatic);
        let p = joint_transform(&joint, 0.5) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p, Vector4::new(0.0, 0.0, 1.5, 1.0), epsilon = 1e-12);

        // continuous joints translate like prismatic ones
        joint.joint_type = Some(JointType::Continuous);
        let p = joint_transform(&joint, 0.5) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p, Vector4::new(0.0, 0.0, 1.5, 1.0), epsilon = 1e-12);

        for t in [JointType::Fixed, JointType::Floating, JointType::Planar] {
            joint.joint_type = Some(t);
            assert_eq!(joint_transform(&joint, 0.5), joint.origin);
        }
    }
}
