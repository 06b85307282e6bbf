use tracing::warn;

use crate::graph::KinematicGraph;
use crate::model::{JointType, Robot, Transform};
use crate::scene::SceneGraph;

/// Splits `robot` at every joint of `joint_type`.
///
/// Each such joint's child link becomes the root of a new robot holding
/// the links reachable from it and the joints between them. Those links and
/// joints are removed from a copy of `robot`, together with the joint that
/// connected them. The result starts with that residual copy paired with
/// the identity, followed by each extracted robot paired with the world
/// transform (taken from `world`) of its root link.
pub fn split_along_joints<G: SceneGraph + ?Sized>(
    robot: &Robot,
    joint_type: &JointType,
    world: &G,
) -> Vec<(Transform, Robot)> {
    let graph = KinematicGraph::new(robot);
    let mut residual = robot.clone();
    let mut parts = Vec::new();

    for joint in robot.joints().iter().filter(|j| j.is_type(joint_type)) {
        let Some(root) = robot.link_index(&joint.child) else {
            warn!(
                "joint '{}' has no child link '{}', not splitting",
                joint.name, joint.child
            );
            continue;
        };
        let reachable = graph.successors(root);

        let mut part = Robot::new(joint.child.clone());
        part.materials = robot.materials.clone();
        for (index, link) in robot.links().iter().enumerate() {
            if reachable.contains(&index) {
                part.push_link(link.clone());
            }
        }
        let inside = |name: &str| {
            robot
                .link_index(name)
                .is_some_and(|i| reachable.contains(&i))
        };
        for j in robot.joints() {
            if inside(&j.parent) && inside(&j.child) {
                part.push_joint(j.clone());
            }
        }

        // nested splits may have removed these already
        for j in part.joints() {
            residual.remove_joint(&j.name);
        }
        for l in part.links() {
            residual.remove_link(&l.name);
        }
        let connecting = residual
            .joints()
            .iter()
            .find(|j| j.child == joint.child)
            .map(|j| j.name.clone());
        if let Some(name) = connecting {
            residual.remove_joint(&name);
        }

        let transform = world.get(&joint.child).unwrap_or_else(|| {
            warn!("no world transform for '{}', using identity", joint.child);
            Transform::identity()
        });
        parts.push((transform, part));
    }

    let mut result = Vec::with_capacity(parts.len() + 1);
    result.push((Transform::identity(), residual));
    result.extend(parts);
    result
}
