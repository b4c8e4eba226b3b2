use crate::config::ValidateConfig;
use crate::constants::ExecutionMode;
use crate::docker::DockerHubClient;
use crate::files::FileReader;
use crate::graph::ContentGraph;
use crate::model::CompliantPolicies;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read-only run state handed to every validator.
pub struct ValidationContext<'a> {
    pub config: &'a ValidateConfig,
    pub reader: &'a FileReader,
    pub mode: ExecutionMode,
    graph: Option<Arc<ContentGraph>>,
    docker: Option<Arc<dyn DockerHubClient>>,
    policies: Option<CompliantPolicies>,
    deleted_files: Vec<PathBuf>,
    scope: Vec<PathBuf>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(config: &'a ValidateConfig, reader: &'a FileReader, mode: ExecutionMode) -> Self {
        Self {
            config,
            reader,
            mode,
            graph: None,
            docker: None,
            policies: None,
            deleted_files: Vec::new(),
            scope: Vec::new(),
        }
    }

    pub fn with_graph(mut self, graph: Arc<ContentGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_docker(mut self, docker: Arc<dyn DockerHubClient>) -> Self {
        self.docker = Some(docker);
        self
    }

    pub fn with_policies(mut self, policies: CompliantPolicies) -> Self {
        self.policies = Some(policies);
        self
    }

    pub fn with_deleted_files(mut self, deleted: Vec<PathBuf>) -> Self {
        self.deleted_files = deleted;
        self
    }

    /// Descriptor paths under validation; graph rules restrict to them unless
    /// every file is validated.
    pub fn with_scope(mut self, scope: Vec<PathBuf>) -> Self {
        self.scope = scope;
        self
    }

    /// `None` when no selected rule asked for the graph.
    pub fn graph(&self) -> Option<&ContentGraph> {
        self.graph.as_deref()
    }

    /// `None` when docker checks are disabled.
    pub fn docker(&self) -> Option<&dyn DockerHubClient> {
        self.docker.as_deref()
    }

    pub fn policies(&self) -> Option<&CompliantPolicies> {
        self.policies.as_ref()
    }

    pub fn deleted_files(&self) -> &[PathBuf] {
        &self.deleted_files
    }

    pub fn validate_all_files(&self) -> bool {
        self.mode == ExecutionMode::AllFiles
    }

    pub fn in_scope(&self, path: &Path) -> bool {
        self.validate_all_files() || self.scope.iter().any(|scoped| scoped == path)
    }
}
