use nalgebra::{Matrix3, Vector3, Vector4};

use super::tree::XmlElement;
use crate::error::{Result, UrdfError};
use crate::model::*;
use crate::transform::from_xyz_rpy;

pub(crate) fn parse_robot(element: &XmlElement) -> Result<Robot> {
    if element.tag != "robot" {
        return Err(UrdfError::Malformed(format!(
            "expected a <robot> root element, found <{}>",
            element.tag
        )));
    }
    let mut robot = Robot::new(required(element, "name")?);

    for child in &element.children {
        match child.tag.as_str() {
            "link" => robot.push_link(parse_link(child)?),
            "joint" => robot.push_joint(parse_joint(child)?),
            "material" => robot.materials.push(parse_material(child)?),
            "transmission" => robot.transmissions.push(parse_transmission(child)?),
            // gazebo and friends
            _ => {}
        }
    }

    Ok(robot)
}

fn parse_link(element: &XmlElement) -> Result<Link> {
    let mut link = Link::new(required(element, "name")?);
    link.inertial = element.child("inertial").map(parse_inertial).transpose()?;
    link.visuals = element
        .children_named("visual")
        .map(parse_visual)
        .collect::<Result<_>>()?;
    link.collisions = element
        .children_named("collision")
        .map(parse_collision)
        .collect::<Result<_>>()?;
    Ok(link)
}

fn parse_inertial(element: &XmlElement) -> Result<Inertial> {
    let mass = match element.child("mass") {
        Some(m) => Some(float(m, "value")?.unwrap_or(1.0)),
        None => None,
    };
    let inertia = element.child("inertia").map(parse_inertia).transpose()?;
    Ok(Inertial {
        origin: parse_origin(element.child("origin"))?,
        mass,
        inertia,
    })
}

fn parse_inertia(element: &XmlElement) -> Result<Matrix3<f64>> {
    let get = |name, default| -> Result<f64> { Ok(float(element, name)?.unwrap_or(default)) };
    let (ixx, ixy, ixz) = (get("ixx", 1.0)?, get("ixy", 0.0)?, get("ixz", 0.0)?);
    let (iyy, iyz, izz) = (get("iyy", 1.0)?, get("iyz", 0.0)?, get("izz", 1.0)?);
    Ok(Matrix3::new(ixx, ixy, ixz, ixy, iyy, iyz, ixz, iyz, izz))
}

fn parse_visual(element: &XmlElement) -> Result<Visual> {
    Ok(Visual {
        name: element.attr("name").map(str::to_string),
        origin: parse_origin(element.child("origin"))?,
        geometry: element.child("geometry").map(parse_geometry).transpose()?,
        material: element.child("material").map(parse_material).transpose()?,
    })
}

fn parse_collision(element: &XmlElement) -> Result<Collision> {
    Ok(Collision {
        name: element.attr("name").map(str::to_string),
        origin: parse_origin(element.child("origin"))?,
        geometry: element.child("geometry").map(parse_geometry).transpose()?,
    })
}

// every shape child is read; arity is the validator's business
fn parse_geometry(element: &XmlElement) -> Result<Geometry> {
    let mut geometry = Geometry::default();
    for shape in &element.children {
        match shape.tag.as_str() {
            "box" => {
                geometry.cuboid = Some(Cuboid {
                    size: vector3(shape, "size")?,
                })
            }
            "cylinder" => {
                geometry.cylinder = Some(Cylinder {
                    radius: float(shape, "radius")?,
                    length: float(shape, "length")?,
                })
            }
            "sphere" => {
                geometry.sphere = Some(Sphere {
                    radius: float(shape, "radius")?,
                })
            }
            "mesh" => geometry.mesh = Some(parse_mesh(shape)?),
            other => {
                return Err(UrdfError::UnsupportedFeature(format!(
                    "unknown geometry tag <{other}>"
                )))
            }
        }
    }
    Ok(geometry)
}

fn parse_mesh(element: &XmlElement) -> Result<Mesh> {
    let scale = match element.attr("scale") {
        None => None,
        Some(s) => {
            let values = floats(s, "scale", "mesh")?;
            match values.as_slice() {
                [] => None,
                [uniform] => Some(MeshScale::Uniform(*uniform)),
                [x, y, z] => Some(MeshScale::PerAxis(Vector3::new(*x, *y, *z))),
                _ => {
                    return Err(UrdfError::invalid_attribute(
                        "scale",
                        "mesh",
                        format!("expected 1 or 3 values, got {}", values.len()),
                    ))
                }
            }
        }
    };
    Ok(Mesh {
        filename: element.attr("filename").unwrap_or_default().to_string(),
        scale,
    })
}

fn parse_material(element: &XmlElement) -> Result<Material> {
    let color = match element.child("color") {
        Some(c) => {
            let rgba = floats(c.attr("rgba").unwrap_or("1 1 1 1"), "rgba", "color")?;
            let rgba: [f64; 4] = rgba.try_into().map_err(|v: Vec<f64>| {
                UrdfError::invalid_attribute(
                    "rgba",
                    "color",
                    format!("expected 4 values, got {}", v.len()),
                )
            })?;
            Some(Color {
                rgba: Vector4::from(rgba),
            })
        }
        None => None,
    };
    Ok(Material {
        name: element.attr("name").map(str::to_string),
        color,
        texture: element.child("texture").map(|t| Texture {
            filename: t.attr("filename").unwrap_or_default().to_string(),
        }),
    })
}

fn parse_origin(element: Option<&XmlElement>) -> Result<Transform> {
    let Some(element) = element else {
        return Ok(Transform::identity());
    };
    let xyz = vector3(element, "xyz")?.unwrap_or_else(Vector3::zeros);
    let rpy = vector3(element, "rpy")?.unwrap_or_else(Vector3::zeros);
    Ok(from_xyz_rpy(&xyz, &rpy))
}

fn parse_joint(element: &XmlElement) -> Result<Joint> {
    let name = required(element, "name")?;
    let link_of = |tag: &str| -> Result<String> {
        element
            .child(tag)
            .ok_or_else(|| {
                UrdfError::Malformed(format!("joint '{name}' misses its <{tag}> element"))
            })
            .and_then(|e| required(e, "link"))
    };
    let parent = link_of("parent")?;
    let child = link_of("child")?;

    let axis = match element.child("axis") {
        Some(a) => vector3(a, "xyz")?.unwrap_or_else(Vector3::x),
        None => Vector3::x(),
    };

    Ok(Joint {
        joint_type: element.attr("type").map(JointType::parse),
        parent,
        child,
        origin: parse_origin(element.child("origin"))?,
        axis,
        limit: element.child("limit").map(parse_limit).transpose()?,
        dynamics: element.child("dynamics").map(parse_dynamics).transpose()?,
        mimic: element.child("mimic").map(parse_mimic).transpose()?,
        calibration: element.child("calibration").map(parse_calibration).transpose()?,
        safety_controller: element
            .child("safety_controller")
            .map(parse_safety_controller)
            .transpose()?,
        name,
    })
}

fn parse_limit(element: &XmlElement) -> Result<Limit> {
    Ok(Limit {
        effort: float(element, "effort")?,
        velocity: float(element, "velocity")?,
        lower: float(element, "lower")?,
        upper: float(element, "upper")?,
    })
}

fn parse_dynamics(element: &XmlElement) -> Result<Dynamics> {
    Ok(Dynamics {
        damping: float(element, "damping")?,
        friction: float(element, "friction")?,
    })
}

fn parse_mimic(element: &XmlElement) -> Result<Mimic> {
    Ok(Mimic {
        joint: element.attr("joint").unwrap_or_default().to_string(),
        multiplier: float(element, "multiplier")?.unwrap_or(1.0),
        offset: float(element, "offset")?.unwrap_or(0.0),
    })
}

fn parse_calibration(element: &XmlElement) -> Result<Calibration> {
    Ok(Calibration {
        rising: float(element, "rising")?,
        falling: float(element, "falling")?,
    })
}

fn parse_safety_controller(element: &XmlElement) -> Result<SafetyController> {
    Ok(SafetyController {
        soft_lower_limit: float(element, "soft_lower_limit")?,
        soft_upper_limit: float(element, "soft_upper_limit")?,
        k_position: float(element, "k_position")?,
        k_velocity: float(element, "k_velocity")?,
    })
}

fn parse_transmission(element: &XmlElement) -> Result<Transmission> {
    let kind = element
        .attr("type")
        .map(str::to_string)
        .or_else(|| element.child("type").map(|t| t.text().to_string()));
    let joints = element
        .children_named("joint")
        .map(|j| TransmissionJoint {
            name: j.attr("name").unwrap_or_default().to_string(),
            hardware_interfaces: hardware_interfaces(j),
        })
        .collect();
    let actuators = element
        .children_named("actuator")
        .map(|a| -> Result<Actuator> {
            let mechanical_reduction = match a.child("mechanicalReduction") {
                Some(r) => Some(parse_float(r.text(), "mechanicalReduction", "actuator")?),
                None => None,
            };
            Ok(Actuator {
                name: a.attr("name").unwrap_or_default().to_string(),
                mechanical_reduction,
                hardware_interfaces: hardware_interfaces(a),
            })
        })
        .collect::<Result<_>>()?;
    Ok(Transmission {
        name: element.attr("name").unwrap_or_default().to_string(),
        kind,
        joints,
        actuators,
    })
}

fn hardware_interfaces(element: &XmlElement) -> Vec<String> {
    element
        .children
        .iter()
        .filter(|c| c.tag == "hardwareInterface" || c.tag == "hardware_interface")
        .map(|c| c.text().to_string())
        .collect()
}

// attributes the tree cannot be indexed without
fn required(element: &XmlElement, attribute: &str) -> Result<String> {
    element
        .attr(attribute)
        .map(str::to_string)
        .ok_or_else(|| UrdfError::missing_attribute(attribute, &element.tag))
}

fn parse_float(s: &str, attribute: &str, element: &str) -> Result<f64> {
    s.trim().parse().map_err(|_| {
        UrdfError::invalid_attribute(attribute, element, format!("'{s}' is not a number"))
    })
}

fn floats(s: &str, attribute: &str, element: &str) -> Result<Vec<f64>> {
    s.split_whitespace()
        .map(|v| parse_float(v, attribute, element))
        .collect()
}

fn float(element: &XmlElement, attribute: &str) -> Result<Option<f64>> {
    element
        .attr(attribute)
        .map(|s| parse_float(s, attribute, &element.tag))
        .transpose()
}

fn vector3(element: &XmlElement, attribute: &str) -> Result<Option<Vector3<f64>>> {
    let Some(s) = element.attr(attribute) else {
        return Ok(None);
    };
    match floats(s, attribute, &element.tag)?.as_slice() {
        [x, y, z] => Ok(Some(Vector3::new(*x, *y, *z))),
        values => Err(UrdfError::invalid_attribute(
            attribute,
            &element.tag,
            format!("expected 3 values, got {}", values.len()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use approx::assert_relative_eq;

    use super::*;
    use crate::transform::to_xyz_rpy;
    use crate::xml::tree::parse_document;

    fn parse(text: &str) -> Result<Robot> {
        parse_robot(&parse_document(text)?)
    }

    #[test]
    fn parse_defaults_test() {
        let robot = parse(
            r#"<robot name="r">
                <link name="a"/>
                <link name="b"/>
                <joint name="j" type="revolute">
                    <parent link="a"/>
                    <child link="b"/>
                    <mimic joint="k"/>
                </joint>
            </robot>"#,
        )
        .unwrap();
        let joint = robot.joint("j").unwrap();
        assert_eq!(joint.joint_type, Some(JointType::Revolute));
        assert_eq!(joint.axis, Vector3::x());
        assert_eq!(joint.origin, Transform::identity());
        assert!(joint.limit.is_none());
        let mimic = joint.mimic.as_ref().unwrap();
        assert_eq!((mimic.multiplier, mimic.offset), (1.0, 0.0));
    }

    #[test]
    fn parse_origin_test() {
        let robot = parse(
            r#"<robot name="r">
                <link name="a"/><link name="b"/>
                <joint name="j" type="fixed">
                    <origin xyz="1 2 3" rpy="0 0 1.5707963267948966"/>
                    <parent link="a"/><child link="b"/>
                </joint>
            </robot>"#,
        )
        .unwrap();
        let (xyz, rpy) = to_xyz_rpy(&robot.joint("j").unwrap().origin);
        assert_relative_eq!(xyz, Vector3::new(1., 2., 3.));
        assert_relative_eq!(rpy, Vector3::new(0., 0., FRAC_PI_2), epsilon = 1e-12);
    }

    #[test]
    fn missing_load_bearing_attributes_test() {
        for text in [
            r#"<robot><link name="a"/></robot>"#,
            r#"<robot name="r"><link/></robot>"#,
            r#"<robot name="r"><joint type="fixed"><parent link="a"/><child link="b"/></joint></robot>"#,
            r#"<robot name="r"><joint name="j" type="fixed"><child link="b"/></joint></robot>"#,
            r#"<robot name="r"><joint name="j" type="fixed"><parent link="a"/><child/></joint></robot>"#,
        ] {
            assert!(matches!(parse(text), Err(UrdfError::Malformed(_))), "{text}");
        }
    }

    #[test]
    fn missing_optional_attributes_test() {
        // no type, empty mesh filename, no limit attributes: all deferred
        let robot = parse(
            r#"<robot name="r">
                <link name="a">
                    <visual><geometry><mesh/></geometry></visual>
                    <collision><geometry><box/></geometry></collision>
                </link>
                <link name="b"/>
                <joint name="j"><parent link="a"/><child link="b"/><limit/></joint>
            </robot>"#,
        )
        .unwrap();
        let link = robot.link("a").unwrap();
        assert_eq!(link.visuals[0].geometry.as_ref().unwrap().mesh.as_ref().unwrap().filename, "");
        assert_eq!(link.collisions[0].geometry.as_ref().unwrap().cuboid, Some(Cuboid { size: None }));
        let joint = robot.joint("j").unwrap();
        assert!(joint.joint_type.is_none());
        assert_eq!(joint.limit, Some(Limit::default()));
    }

    #[test]
    fn geometry_test() {
        let robot = parse(
            r#"<robot name="r">
                <link name="a">
                    <visual name="v">
                        <geometry><mesh filename="package://p/m.dae" scale="0.001"/></geometry>
                        <material name="red"><color rgba="1 0 0 1"/></material>
                    </visual>
                    <visual><geometry><mesh filename="m.stl" scale="1 2 3"/></geometry></visual>
                    <visual><geometry><cylinder radius="0.1" length="2"/><sphere radius="1"/></geometry></visual>
                    <visual><geometry/></visual>
                </link>
            </robot>"#,
        )
        .unwrap();
        let visuals = &robot.link("a").unwrap().visuals;
        assert_eq!(visuals[0].name.as_deref(), Some("v"));
        let mesh = visuals[0].geometry.as_ref().unwrap().mesh.as_ref().unwrap();
        assert_eq!(mesh.scale, Some(MeshScale::Uniform(0.001)));
        let material = visuals[0].material.as_ref().unwrap();
        assert_eq!(material.name.as_deref(), Some("red"));
        assert_eq!(material.color.as_ref().unwrap().rgba, Vector4::new(1., 0., 0., 1.));
        let mesh = visuals[1].geometry.as_ref().unwrap().mesh.as_ref().unwrap();
        assert_eq!(mesh.scale, Some(MeshScale::PerAxis(Vector3::new(1., 2., 3.))));
        assert_eq!(visuals[2].geometry.as_ref().unwrap().variant_count(), 2);
        assert_eq!(visuals[3].geometry.as_ref().unwrap().variant_count(), 0);
    }

    #[test]
    fn unknown_geometry_test() {
        let err = parse(
            r#"<robot name="r"><link name="a"><visual><geometry><capsule radius="1"/></geometry></visual></link></robot>"#,
        )
        .unwrap_err();
        assert!(matches!(err, UrdfError::UnsupportedFeature(_)));
    }

    #[test]
    fn invalid_numbers_test() {
        let err = parse(
            r#"<robot name="r"><link name="a"><visual><origin xyz="1 2"/><geometry><sphere radius="1"/></geometry></visual></link></robot>"#,
        )
        .unwrap_err();
        assert!(matches!(err, UrdfError::InvalidAttributeValue { .. }));

        let err = parse(
            r#"<robot name="r"><link name="a"><visual><geometry><sphere radius="big"/></geometry></visual></link></robot>"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("'big' is not a number"));
    }

    #[test]
    fn inertial_defaults_test() {
        let robot = parse(
            r#"<robot name="r"><link name="a"><inertial><mass/><inertia ixy="0.5"/></inertial></link></robot>"#,
        )
        .unwrap();
        let inertial = robot.link("a").unwrap().inertial.as_ref().unwrap();
        assert_eq!(inertial.mass, Some(1.0));
        let i = inertial.inertia.unwrap();
        assert_eq!(i, Matrix3::new(1., 0.5, 0., 0.5, 1., 0., 0., 0., 1.));
    }

    #[test]
    fn transmission_test() {
        let robot = parse(
            r#"<robot name="r">
                <transmission name="t1">
                    <type>transmission_interface/SimpleTransmission</type>
                    <joint name="j1"><hardwareInterface>EffortJointInterface</hardwareInterface></joint>
                    <actuator name="m1">
                        <mechanicalReduction>50</mechanicalReduction>
                        <hardwareInterface>EffortJointInterface</hardwareInterface>
                    </actuator>
                </transmission>
            </robot>"#,
        )
        .unwrap();
        let t = &robot.transmissions[0];
        assert_eq!(t.kind.as_deref(), Some("transmission_interface/SimpleTransmission"));
        assert_eq!(t.joints[0].hardware_interfaces, vec!["EffortJointInterface"]);
        assert_eq!(t.actuators[0].mechanical_reduction, Some(50.0));
    }

    #[test]
    fn wrong_root_test() {
        assert!(matches!(parse("<model name=\"x\"/>"), Err(UrdfError::Malformed(_))));
    }
}
