use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, UrdfError};
use crate::kinematics::{
    apply_transforms, default_configuration, Configuration, ConfigurationInput, Kinematics,
};
use crate::model::{Joint, JointType, Robot, Transform};
use crate::resolver::{default_resolver, ResolveFilename, Resolver};
use crate::scene::Scene;
use crate::split;
use crate::validation::{self, Diagnostic};
use crate::xml;

/// Construction options of a [`Urdf`].
#[derive(Clone)]
pub struct UrdfOptions {
    /// Keep a scene of the visual elements up to date.
    pub build_scene_graph: bool,
    /// Keep a second scene of the collision elements up to date.
    pub build_collision_scene_graph: bool,
    /// Attach mesh files to the visual scene.
    pub load_meshes: bool,
    /// Attach mesh files to the collision scene.
    pub load_collision_meshes: bool,
    /// Replaces the default resolver built from `mesh_dir`.
    pub filename_resolver: Option<Resolver>,
    /// Root directory for mesh references. Loading from a path defaults it
    /// to the directory of the document.
    pub mesh_dir: Option<PathBuf>,
}

impl Default for UrdfOptions {
    fn default() -> Self {
        Self {
            build_scene_graph: true,
            build_collision_scene_graph: false,
            load_meshes: true,
            load_collision_meshes: false,
            filename_resolver: None,
            mesh_dir: None,
        }
    }
}

impl UrdfOptions {
    pub fn with_scene_graph(mut self, build: bool) -> Self {
        self.build_scene_graph = build;
        self
    }

    pub fn with_collision_scene_graph(mut self, build: bool) -> Self {
        self.build_collision_scene_graph = build;
        self
    }

    pub fn with_meshes(mut self, load: bool) -> Self {
        self.load_meshes = load;
        self
    }

    pub fn with_collision_meshes(mut self, load: bool) -> Self {
        self.load_collision_meshes = load;
        self
    }

    pub fn with_filename_resolver(mut self, resolver: impl ResolveFilename + 'static) -> Self {
        self.filename_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_mesh_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mesh_dir = Some(dir.into());
        self
    }
}

impl fmt::Debug for UrdfOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrdfOptions")
            .field("build_scene_graph", &self.build_scene_graph)
            .field("build_collision_scene_graph", &self.build_collision_scene_graph)
            .field("load_meshes", &self.load_meshes)
            .field("load_collision_meshes", &self.load_collision_meshes)
            .field("filename_resolver", &self.filename_resolver.is_some())
            .field("mesh_dir", &self.mesh_dir)
            .finish()
    }
}

/// A loaded robot description together with its configuration state.
pub struct Urdf {
    robot: Robot,
    options: UrdfOptions,
    resolver: Resolver,
    kinematics: Kinematics,
    scene: Option<Scene>,
    collision_scene: Option<Scene>,
    errors: Vec<Diagnostic>,
}

impl Urdf {
    pub fn new(robot: Robot, options: UrdfOptions) -> Self {
        let resolver = match &options.filename_resolver {
            Some(resolver) => resolver.clone(),
            None => Arc::new(default_resolver(
                options.mesh_dir.clone().unwrap_or_default(),
            )) as Resolver,
        };
        let kinematics = Kinematics::new(&robot);
        let mut urdf = Self {
            robot,
            options,
            resolver,
            kinematics,
            scene: None,
            collision_scene: None,
            errors: Vec::new(),
        };
        urdf.build_scenes();
        urdf
    }

    /// Loads a document from a file. `mesh_dir` defaults to the file's
    /// directory.
    pub fn load(path: impl AsRef<Path>, mut options: UrdfOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(UrdfError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a file"),
            ));
        }
        if options.mesh_dir.is_none() {
            options.mesh_dir = path.parent().map(Path::to_path_buf);
        }
        let mut text = String::new();
        File::open(path)
            .and_then(|mut file| file.read_to_string(&mut text))
            .map_err(|e| UrdfError::io(path, e))?;
        Self::from_xml_str(&text, options)
    }

    pub fn load_from_reader<R: Read>(reader: R, options: UrdfOptions) -> Result<Self> {
        Ok(Self::new(xml::from_reader(reader)?, options))
    }

    pub fn from_xml_str(text: &str, options: UrdfOptions) -> Result<Self> {
        Ok(Self::new(xml::from_str(text)?, options))
    }

    pub fn robot(&self) -> &Robot {
        &self.robot
    }

    pub fn into_robot(self) -> Robot {
        self.robot
    }

    /// Edits the robot in place. The configuration is reset to its default
    /// and the scenes are rebuilt afterwards.
    pub fn modify_robot<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Robot),
    {
        f(&mut self.robot);
        self.kinematics = Kinematics::new(&self.robot);
        self.build_scenes();
    }

    pub fn options(&self) -> &UrdfOptions {
        &self.options
    }

    pub fn filename_resolver(&self) -> &dyn ResolveFilename {
        self.resolver.as_ref()
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn collision_scene(&self) -> Option<&Scene> {
        self.collision_scene.as_ref()
    }

    pub fn joint_names(&self) -> Vec<&str> {
        self.robot.joint_names()
    }

    pub fn actuated_joint_indices(&self) -> &[usize] {
        self.kinematics.actuated_joint_indices()
    }

    pub fn actuated_joints(&self) -> Vec<&Joint> {
        self.actuated_joint_indices()
            .iter()
            .map(|&i| &self.robot.joints()[i])
            .collect()
    }

    pub fn actuated_joint_names(&self) -> Vec<&str> {
        self.actuated_joints()
            .into_iter()
            .map(|j| j.name.as_str())
            .collect()
    }

    pub fn num_actuated_joints(&self) -> usize {
        self.actuated_joint_indices().len()
    }

    /// Current configuration, one slot per joint.
    pub fn cfg(&self) -> &Configuration {
        self.kinematics.configuration()
    }

    pub fn base_link(&self) -> Option<&str> {
        self.robot.base_link()
    }

    /// Diagnostics of the last validation.
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Validates with the strict policy: any diagnostic fails.
    pub fn validate(&mut self) -> bool {
        self.validate_with(validation::strict)
    }

    pub fn validate_with<F>(&mut self, policy: F) -> bool
    where
        F: FnOnce(&[Diagnostic]) -> bool,
    {
        self.errors = validation::validate(&self.robot).diagnostics;
        policy(&self.errors)
    }

    /// Whether every mesh reference resolves to an existing file.
    pub fn validate_filenames(&self) -> bool {
        self.robot.links().iter().all(|link| {
            link.visuals
                .iter()
                .filter_map(|v| v.geometry.as_ref())
                .chain(link.collisions.iter().filter_map(|c| c.geometry.as_ref()))
                .filter_map(|g| g.mesh.as_ref())
                .all(|mesh| self.resolver.resolve(&mesh.filename).is_file())
        })
    }

    /// Sets joint values and moves the scenes accordingly.
    pub fn update_configuration(&mut self, input: impl Into<ConfigurationInput>) -> Result<()> {
        let transforms = self.kinematics.update(&self.robot, input.into())?;
        if let Some(scene) = self.scene.as_mut() {
            apply_transforms(scene, &transforms);
        }
        if let Some(scene) = self.collision_scene.as_mut() {
            apply_transforms(scene, &transforms);
        }
        Ok(())
    }

    pub fn default_configuration(&self) -> Configuration {
        default_configuration(&self.robot)
    }

    /// Transform of `frame_to` relative to `frame_from`, the base link when
    /// `None`.
    pub fn get_transform(
        &self,
        frame_to: &str,
        frame_from: Option<&str>,
        collision: bool,
    ) -> Result<Transform> {
        let scene = if collision {
            self.collision_scene
                .as_ref()
                .ok_or(UrdfError::SceneUnavailable("collision"))?
        } else {
            self.scene
                .as_ref()
                .ok_or(UrdfError::SceneUnavailable("visual"))?
        };
        let frame_from = frame_from.unwrap_or(scene.base_frame());
        scene.relative(frame_to, frame_from).ok_or_else(|| {
            UrdfError::BrokenReference(format!(
                "no transform from '{frame_from}' to '{frame_to}'"
            ))
        })
    }

    /// Splits the robot at every joint of `joint_type`; see
    /// [`crate::split_along_joints`]. The parts share this handle's resolver
    /// and are built without scenes.
    pub fn split_along_joints(&self, joint_type: &JointType) -> Vec<(Transform, Urdf)> {
        let parts = match &self.scene {
            Some(scene) => split::split_along_joints(&self.robot, joint_type, scene),
            None => {
                let scene = Scene::from_robot(
                    &self.robot,
                    &self.kinematics.transforms(&self.robot),
                    self.resolver.as_ref(),
                    false,
                    false,
                );
                split::split_along_joints(&self.robot, joint_type, &scene)
            }
        };
        let options = UrdfOptions {
            build_scene_graph: false,
            build_collision_scene_graph: false,
            load_meshes: false,
            load_collision_meshes: false,
            filename_resolver: Some(self.resolver.clone()),
            mesh_dir: self.options.mesh_dir.clone(),
        };
        parts
            .into_iter()
            .map(|(transform, robot)| (transform, Urdf::new(robot, options.clone())))
            .collect()
    }

    /// Serializes the robot. Mesh references are written as the resolver
    /// maps them.
    pub fn write_xml_string(&self) -> Result<String> {
        xml::to_string(&self.robot, self.resolver.as_ref())
    }

    pub fn write_xml<W: Write>(&self, out: W) -> Result<()> {
        xml::to_writer(&self.robot, self.resolver.as_ref(), out)?;
        Ok(())
    }

    pub fn write_xml_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| UrdfError::io(path, e))?;
        let mut out = xml::to_writer(&self.robot, self.resolver.as_ref(), BufWriter::new(file))?;
        out.flush().map_err(|e| UrdfError::io(path, e))
    }

    /// Like [`Urdf::write_xml_file`], but refuses to write a document the
    /// policy rejects.
    pub fn write_xml_file_validated<F>(&self, path: impl AsRef<Path>, policy: F) -> Result<()>
    where
        F: FnOnce(&[Diagnostic]) -> bool,
    {
        let validation = validation::validate(&self.robot);
        if !validation.is_valid_with(policy) {
            return Err(UrdfError::SaveValidationFailure(validation.diagnostics));
        }
        self.write_xml_file(path)
    }

    fn build_scenes(&mut self) {
        let transforms = self.kinematics.transforms(&self.robot);
        self.scene = self.options.build_scene_graph.then(|| {
            Scene::from_robot(
                &self.robot,
                &transforms,
                self.resolver.as_ref(),
                false,
                self.options.load_meshes,
            )
        });
        self.collision_scene = self.options.build_collision_scene_graph.then(|| {
            Scene::from_robot(
                &self.robot,
                &transforms,
                self.resolver.as_ref(),
                true,
                self.options.load_collision_meshes,
            )
        });
    }
}

impl fmt::Debug for Urdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Urdf")
            .field("robot", &self.robot.name)
            .field("links", &self.robot.links().len())
            .field("joints", &self.robot.joints().len())
            .field("options", &self.options)
            .finish()
    }
}
