use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

const DIRECTIVE: &str = "://";
const PACKAGE_DIRECTIVE: &str = "package:";

// maps an asset reference such as `package://bot/meshes/base.stl`
// to a path a mesh loader can open
pub trait ResolveFilename: Send + Sync {
    fn resolve(&self, reference: &str) -> PathBuf;
}

impl<F> ResolveFilename for F
where
    F: Fn(&str) -> PathBuf + Send + Sync,
{
    fn resolve(&self, reference: &str) -> PathBuf {
        self(reference)
    }
}

pub type Resolver = Arc<dyn ResolveFilename>;

#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl ResolveFilename for Identity {
    fn resolve(&self, reference: &str) -> PathBuf {
        PathBuf::from(reference)
    }
}

// strips anything up to and including `://`
#[derive(Debug, Clone, Copy, Default)]
pub struct StripDirective;

impl ResolveFilename for StripDirective {
    fn resolve(&self, reference: &str) -> PathBuf {
        PathBuf::from(strip_directive(reference))
    }
}

/// Removes `package://` together with the package name that follows it.
/// Other directives are stripped like [`StripDirective`] does.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripPackageDirective;

impl ResolveFilename for StripPackageDirective {
    fn resolve(&self, reference: &str) -> PathBuf {
        PathBuf::from(strip_package_directive(reference))
    }
}

#[derive(Debug, Clone)]
pub struct AddPrefix(pub String);

impl ResolveFilename for AddPrefix {
    fn resolve(&self, reference: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", self.0, reference))
    }
}

/// Rebases absolute references below `dir` to be relative to it.
#[derive(Debug, Clone)]
pub struct AbsoluteToRelative(pub PathBuf);

impl ResolveFilename for AbsoluteToRelative {
    fn resolve(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        match path.strip_prefix(&self.0) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => path.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelativeTo(pub PathBuf);

impl ResolveFilename for RelativeTo {
    fn resolve(&self, reference: &str) -> PathBuf {
        self.0.join(strip_package_directive(reference))
    }
}

/// Like [`RelativeTo`], but against the ancestor of `dir` that is
/// `level + 1` directories up.
#[derive(Debug, Clone)]
pub struct AncestorRelative {
    pub dir: PathBuf,
    pub level: usize,
}

impl ResolveFilename for AncestorRelative {
    fn resolve(&self, reference: &str) -> PathBuf {
        ancestor(&self.dir, self.level + 1).join(strip_package_directive(reference))
    }
}

/// Meta resolver: the first candidate whose result is an existing file wins.
/// Falls back to the unresolved reference.
pub struct FirstExisting {
    candidates: Vec<Resolver>,
}

impl FirstExisting {
    pub fn new(candidates: Vec<Resolver>) -> Self {
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl fmt::Debug for FirstExisting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirstExisting")
            .field("candidates", &self.candidates.len())
            .finish()
    }
}

impl ResolveFilename for FirstExisting {
    fn resolve(&self, reference: &str) -> PathBuf {
        for candidate in &self.candidates {
            let path = candidate.resolve(reference);
            debug!("checking filename: {}", path.display());
            if path.is_file() {
                return path;
            }
        }
        warn!("unable to resolve filename: {reference}");
        PathBuf::from(reference)
    }
}

pub fn ancestor_resolvers(dir: &Path) -> Vec<Resolver> {
    (0..dir.components().count())
        .map(|level| {
            Arc::new(AncestorRelative {
                dir: dir.to_path_buf(),
                level,
            }) as Resolver
        })
        .collect()
}

/// Resolver used when none is configured: `mesh_dir` first, then each of
/// its ancestors.
pub fn default_resolver(mesh_dir: impl AsRef<Path>) -> FirstExisting {
    let mesh_dir = mesh_dir.as_ref();
    let mut candidates: Vec<Resolver> = vec![Arc::new(RelativeTo(mesh_dir.to_path_buf()))];
    candidates.extend(ancestor_resolvers(mesh_dir));
    FirstExisting::new(candidates)
}

fn strip_directive(reference: &str) -> &str {
    reference.rsplit(DIRECTIVE).next().unwrap_or(reference)
}

fn strip_package_directive(reference: &str) -> String {
    if reference.starts_with(PACKAGE_DIRECTIVE) {
        let rest = strip_directive(reference);
        return rest.split('/').skip(1).collect::<Vec<_>>().join("/");
    }
    strip_directive(reference).to_string()
}

fn ancestor(dir: &Path, levels: usize) -> &Path {
    let mut current = dir;
    for _ in 0..levels {
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    current
}
