use std::path::PathBuf;

use hashbrown::{HashMap, HashSet};
use nalgebra::Vector3;
use tracing::{debug, warn};

use crate::kinematics::{apply_transforms, JointTransform};
use crate::model::{Geometry, MeshScale, Robot, Shape, Transform};
use crate::resolver::ResolveFilename;

/// Graph of named frames connected by local transforms.
pub trait SceneGraph {
    /// Sets the transform of the `parent -> child` edge.
    fn update(&mut self, parent: &str, child: &str, transform: Transform);

    /// Transform of `node` relative to the base frame.
    fn get(&self, node: &str) -> Option<Transform>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeometrySource {
    Cuboid(Vector3<f64>),
    Sphere(f64),
    Cylinder { radius: f64, length: f64 },
    /// A mesh file that exists on disk, with the scale it was declared with.
    Mesh {
        path: PathBuf,
        scale: Option<MeshScale>,
    },
}

/// A geometry attached to a link frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneGeometry {
    pub link: String,
    /// Pose relative to the link frame.
    pub origin: Transform,
    pub source: GeometrySource,
}

#[derive(Debug, Clone)]
pub struct Scene {
    base_frame: String,
    nodes: Vec<String>,
    node_set: HashSet<String>,
    // child -> (parent, local transform)
    edges: HashMap<String, (String, Transform)>,
    geometry: Vec<SceneGeometry>,
}

impl Scene {
    pub fn new(base_frame: impl Into<String>) -> Self {
        let base_frame = base_frame.into();
        Self {
            nodes: vec![base_frame.clone()],
            node_set: HashSet::from([base_frame.clone()]),
            base_frame,
            edges: HashMap::new(),
            geometry: Vec::new(),
        }
    }

    /// Builds the scene of `robot` with the given joint transforms.
    ///
    /// `collision` selects the collision elements instead of the visual
    /// ones; meshes are only attached when `load_meshes` is set and their
    /// resolved path exists.
    pub fn from_robot(
        robot: &Robot,
        transforms: &[JointTransform],
        resolver: &dyn ResolveFilename,
        collision: bool,
        load_meshes: bool,
    ) -> Self {
        let mut scene = Scene::new(robot.base_link().unwrap_or_default());
        apply_transforms(&mut scene, transforms);

        for link in robot.links() {
            scene.add_node(&link.name);

            let elements = if collision {
                link.collisions
                    .iter()
                    .map(|c| (c.origin, c.geometry.as_ref()))
                    .collect::<Vec<_>>()
            } else {
                link.visuals
                    .iter()
                    .map(|v| (v.origin, v.geometry.as_ref()))
                    .collect::<Vec<_>>()
            };
            for (origin, geometry) in elements {
                let source = geometry.and_then(|g| geometry_source(g, resolver, load_meshes));
                if let Some(source) = source {
                    scene.add_geometry(SceneGeometry {
                        link: link.name.clone(),
                        origin,
                        source,
                    });
                }
            }
        }
        scene
    }

    pub fn base_frame(&self) -> &str {
        &self.base_frame
    }

    pub fn add_node(&mut self, name: &str) {
        if self.node_set.insert(name.to_string()) {
            self.nodes.push(name.to_string());
        }
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.node_set.contains(name)
    }

    /// Registered frames in insertion order, base frame first.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn add_geometry(&mut self, geometry: SceneGeometry) {
        self.add_node(&geometry.link);
        self.geometry.push(geometry);
    }

    pub fn geometry(&self) -> &[SceneGeometry] {
        &self.geometry
    }

    /// Parent frame and local transform of `child`.
    pub fn edge(&self, child: &str) -> Option<(&str, &Transform)> {
        self.edges.get(child).map(|(p, t)| (p.as_str(), t))
    }

    /// Transform of `frame_to` expressed in `frame_from`.
    pub fn relative(&self, frame_to: &str, frame_from: &str) -> Option<Transform> {
        let to = self.get(frame_to)?;
        let from = self.get(frame_from)?;
        Some(from.try_inverse()? * to)
    }
}

impl SceneGraph for Scene {
    fn update(&mut self, parent: &str, child: &str, transform: Transform) {
        self.add_node(parent);
        self.add_node(child);
        self.edges
            .insert(child.to_string(), (parent.to_string(), transform));
    }

    // global = parent global * relative, walked up to the base frame
    fn get(&self, node: &str) -> Option<Transform> {
        let mut global = Transform::identity();
        let mut current = node;
        // each edge is used at most once, a cycle never reaches the base
        for _ in 0..=self.edges.len() {
            if current == self.base_frame {
                return Some(global);
            }
            let (parent, relative) = self.edges.get(current)?;
            global = relative * global;
            current = parent.as_str();
        }
        None
    }
}

fn geometry_source(
    geometry: &Geometry,
    resolver: &dyn ResolveFilename,
    load_meshes: bool,
) -> Option<GeometrySource> {
    match geometry.shape()? {
        Shape::Cuboid(c) => c.size.map(GeometrySource::Cuboid),
        Shape::Sphere(s) => s.radius.map(GeometrySource::Sphere),
        Shape::Cylinder(c) => Some(GeometrySource::Cylinder {
            radius: c.radius?,
            length: c.length?,
        }),
        Shape::Mesh(mesh) if load_meshes => {
            let path = resolver.resolve(&mesh.filename);
            if !path.is_file() {
                warn!("can't find {}", path.display());
                return None;
            }
            debug!("loading {} as {}", mesh.filename, path.display());
            if let Some(scale) = mesh.scale.filter(|s| !s.is_uniform()) {
                warn!("mesh {} has a non-uniform scale {scale:?}", mesh.filename);
            }
            Some(GeometrySource::Mesh {
                path,
                scale: mesh.scale,
            })
        }
        Shape::Mesh(_) => None,
    }
}
