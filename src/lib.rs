mod error;
mod graph;
pub mod kinematics;
mod model;
pub mod resolver;
pub mod scene;
mod split;
pub mod transform;
mod urdf;
pub mod validation;
pub mod visit;
pub mod xml;

pub use error::{Result, UrdfError};
pub use graph::KinematicGraph;
pub use kinematics::{Configuration, ConfigurationInput, JointTransform, JointValue, Kinematics};
pub use model::*;
pub use resolver::{ResolveFilename, Resolver};
pub use scene::{Scene, SceneGraph};
pub use split::split_along_joints;
pub use urdf::{Urdf, UrdfOptions};
pub use validation::{validate, Diagnostic, DiagnosticKind, Validation};
