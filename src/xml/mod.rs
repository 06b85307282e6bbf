use std::io::{Read, Write};

use crate::error::{Result, UrdfError};
use crate::model::Robot;
use crate::resolver::ResolveFilename;

mod read;
mod tree;
mod write;

/// Parses a robot description.
///
/// Documents that are not well-formed are recovered as far as possible.
/// Only a missing `robot`, `link` or `joint` name, or a joint without
/// parent/child link, fails the parse; everything else is left for
/// [`crate::validate`].
pub fn from_str(text: &str) -> Result<Robot> {
    read::parse_robot(&tree::parse_document(text)?)
}

pub fn from_reader<R: Read>(mut reader: R) -> Result<Robot> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| UrdfError::io("<reader>", e))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| UrdfError::Malformed(format!("document is not valid UTF-8: {e}")))?;
    from_str(&text)
}

pub fn to_writer<W: Write>(robot: &Robot, resolver: &dyn ResolveFilename, out: W) -> Result<W> {
    let mut writer = write::RobotWriter::new(out, resolver);
    writer.write_robot(robot)?;
    Ok(writer.into_inner())
}

pub fn to_string(robot: &Robot, resolver: &dyn ResolveFilename) -> Result<String> {
    let bytes = to_writer(robot, resolver, Vec::new())?;
    String::from_utf8(bytes).map_err(|e| UrdfError::Write(std::io::Error::other(e)))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    use super::*;
    use crate::model::*;
    use crate::resolver::Identity;
    use crate::transform::from_xyz_rpy;

    const DOC: &str = r#"<?xml version="1.0"?>
<robot name="gripper">
  <material name="steel"><color rgba="0.7 0.7 0.7 1"/></material>
  <link name="base">
    <inertial>
      <origin xyz="0 0 0.05" rpy="0 0 0"/>
      <mass value="0.8"/>
      <inertia ixx="0.01" ixy="0" ixz="0" iyy="0.01" iyz="0" izz="0.02"/>
    </inertial>
    <visual name="shell">
      <origin xyz="0 0 0.1" rpy="0.1 0.2 0.3"/>
      <geometry><mesh filename="package://gripper/meshes/base.stl" scale="0.001 0.001 0.001"/></geometry>
      <material name="steel"><texture filename="steel.png"/></material>
    </visual>
    <collision><geometry><cylinder radius="0.04" length="0.1"/></geometry></collision>
  </link>
  <link name="left"><visual><geometry><box size="0.01 0.02 0.05"/></geometry></visual></link>
  <link name="right"><collision><geometry><sphere radius="0.01"/></geometry></collision></link>
  <joint name="left_slide" type="prismatic">
    <parent link="base"/><child link="left"/>
    <origin xyz="0.02 0 0.1" rpy="0 0 3.14159"/>
    <axis xyz="0 1 0"/>
    <limit effort="20" velocity="0.1" lower="0" upper="0.04"/>
    <dynamics damping="0.5"/>
    <safety_controller soft_lower_limit="0.001" soft_upper_limit="0.039" k_velocity="10"/>
  </joint>
  <joint name="right_slide" type="prismatic">
    <parent link="base"/><child link="right"/>
    <axis xyz="0 -1 0"/>
    <limit effort="20" velocity="0.1" lower="0" upper="0.04"/>
    <mimic joint="left_slide" multiplier="1" offset="0.001"/>
    <calibration rising="0.01"/>
  </joint>
  <transmission name="left_tr">
    <type>transmission_interface/SimpleTransmission</type>
    <joint name="left_slide"><hardwareInterface>PositionJointInterface</hardwareInterface></joint>
    <actuator name="left_motor"><mechanicalReduction>1</mechanicalReduction></actuator>
  </transmission>
</robot>
"#;

    fn assert_transform_close(a: &Transform, b: &Transform) {
        assert_relative_eq!(a, b, epsilon = 1e-12);
    }

    // origins may differ in the last bits after a trip through rpy
    fn assert_robots_close(a: &Robot, b: &Robot) {
        let strip = |r: &Robot| {
            let mut r = r.clone();
            for name in r.joint_names().iter().map(|s| s.to_string()).collect::<Vec<_>>() {
                r.joint_mut(&name).unwrap().origin = Transform::identity();
            }
            let names = r.links().iter().map(|l| l.name.clone()).collect::<Vec<_>>();
            for name in names {
                let link = r.link_mut(&name).unwrap();
                link.visuals.iter_mut().for_each(|v| v.origin = Transform::identity());
                link.collisions.iter_mut().for_each(|c| c.origin = Transform::identity());
                link.inertial.iter_mut().for_each(|i| i.origin = Transform::identity());
            }
            r
        };
        assert_eq!(strip(a), strip(b));
        for (ja, jb) in a.joints().iter().zip(b.joints()) {
            assert_transform_close(&ja.origin, &jb.origin);
        }
        for (la, lb) in a.links().iter().zip(b.links()) {
            for (va, vb) in la.visuals.iter().zip(&lb.visuals) {
                assert_transform_close(&va.origin, &vb.origin);
            }
            if let (Some(ia), Some(ib)) = (&la.inertial, &lb.inertial) {
                assert_transform_close(&ia.origin, &ib.origin);
            }
        }
    }

    #[test]
    fn round_trip_test() {
        let first = from_str(DOC).unwrap();
        let xml = to_string(&first, &Identity).unwrap();
        let second = from_str(&xml).unwrap();
        assert_robots_close(&first, &second);
        assert_eq!(second.joints().len(), 2);
        assert_eq!(second.transmissions.len(), 1);
        assert_eq!(second.materials[0].name.as_deref(), Some("steel"));
    }

    #[test]
    fn round_trip_is_stable_test() {
        let first = from_str(DOC).unwrap();
        let once = to_string(&first, &Identity).unwrap();
        let twice = to_string(&from_str(&once).unwrap(), &Identity).unwrap();
        let a = from_str(&once).unwrap();
        let b = from_str(&twice).unwrap();
        assert_robots_close(&a, &b);
    }

    #[test]
    fn parsed_values_test() {
        let robot = from_str(DOC).unwrap();
        let visual = &robot.link("base").unwrap().visuals[0];
        assert_transform_close(
            &visual.origin,
            &from_xyz_rpy(&Vector3::new(0., 0., 0.1), &Vector3::new(0.1, 0.2, 0.3)),
        );
        let right = robot.joint("right_slide").unwrap();
        assert_eq!(right.axis, Vector3::new(0., -1., 0.));
        assert_eq!(right.mimic.as_ref().unwrap().offset, 0.001);
        assert_eq!(right.calibration.as_ref().unwrap().rising, Some(0.01));
        assert_eq!(robot.base_link(), Some("base"));
    }

    #[test]
    fn from_reader_test() {
        let robot = from_reader(DOC.as_bytes()).unwrap();
        assert_eq!(robot.name, "gripper");
        assert!(matches!(
            from_reader(&[0xff, 0xfe, 0x00][..]),
            Err(UrdfError::Malformed(_))
        ));
    }

    #[test]
    fn readable_by_urdf_rs_test() {
        let robot = from_str(DOC).unwrap();
        let xml = to_string(&robot, &Identity).unwrap();
        let other = urdf_rs::read_from_string(&xml).unwrap();
        assert_eq!(other.name, "gripper");
        assert_eq!(other.links.len(), 3);
        assert_eq!(other.joints.len(), 2);
        assert_eq!(other.joints[0].joint_type, urdf_rs::JointType::Prismatic);
        assert_eq!(other.joints[1].child.link, "right");
    }
}
