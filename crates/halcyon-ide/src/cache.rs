//! Single-slot artifact cache
//!
//! Holds the artifact compiled from the text currently loaded in the editor,
//! or nothing. Edits invalidate eagerly, so a held artifact is never stale.

use tracing::debug;

use crate::compiler::{CompilerGateway, Diagnostic};
use crate::types::Artifact;

/// Result of a cache lookup that produced an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cached {
    /// The held artifact was returned without compiling
    Hit(Artifact),
    /// The gateway was invoked and its artifact stored
    Compiled(Artifact),
}

impl Cached {
    pub fn artifact(&self) -> &Artifact {
        match self {
            Cached::Hit(artifact) | Cached::Compiled(artifact) => artifact,
        }
    }

    pub fn into_artifact(self) -> Artifact {
        match self {
            Cached::Hit(artifact) | Cached::Compiled(artifact) => artifact,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Cached::Hit(_))
    }
}

#[derive(Debug, Default)]
pub struct ArtifactCache {
    artifact: Option<Artifact>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the held artifact, if any
    pub fn invalidate(&mut self) {
        if self.artifact.take().is_some() {
            debug!("artifact invalidated");
        }
    }

    pub fn get(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.artifact.is_none()
    }

    /// Return the held artifact, or compile `source` and hold the result
    ///
    /// On failure the cache is left empty and the diagnostic is returned.
    pub fn get_or_compile(
        &mut self,
        gateway: &mut CompilerGateway,
        source: &str,
    ) -> Result<Cached, Diagnostic> {
        if let Some(artifact) = &self.artifact {
            debug!("artifact cache hit");
            return Ok(Cached::Hit(artifact.clone()));
        }

        debug!("artifact cache miss");
        match gateway.compile(source) {
            Ok(artifact) => {
                self.artifact = Some(artifact.clone());
                Ok(Cached::Compiled(artifact))
            }
            Err(diagnostic) => {
                self.artifact = None;
                Err(diagnostic)
            }
        }
    }
}
