//! Process-wide services shared by every translation batch

use crate::config::TandemConfig;
use crate::context::ContextAssembler;
use crate::error::Result;
use crate::glossary::Glossary;
use crate::quality::{AcceptAll, QualityCheck};
use crate::translator::Translator;
use std::path::Path;
use std::sync::Arc;
use tandem_snapshots::{SledSnapshotStore, SnapshotStore};
use tandem_status::StatusTree;
use tracing::info;

/// Explicit replacement for global singletons: one snapshot store and one
/// status tree per process, handed to every batch by reference
#[derive(Clone)]
pub struct AppContext {
    pub config: TandemConfig,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub tree: Arc<StatusTree>,
    pub translator: Arc<dyn Translator>,
    pub quality: Arc<dyn QualityCheck>,
    pub glossary: Glossary,
}

impl AppContext {
    pub fn new(
        config: TandemConfig,
        snapshots: Arc<dyn SnapshotStore>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            config,
            snapshots,
            tree: Arc::new(StatusTree::new()),
            translator,
            quality: Arc::new(AcceptAll),
            glossary: Glossary::default(),
        }
    }

    /// Context backed by a sled snapshot store under `dir`
    pub fn open_durable(
        config: TandemConfig,
        dir: &Path,
        translator: Arc<dyn Translator>,
    ) -> Result<Self> {
        config.validate()?;
        let store = SledSnapshotStore::open(dir, config.snapshots.clone())?;
        info!(
            dir = %dir.display(),
            provider = translator.provider_name(),
            "opened snapshot store"
        );
        Ok(Self::new(config, Arc::new(store), translator))
    }

    pub fn with_quality(mut self, quality: Arc<dyn QualityCheck>) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_glossary(mut self, glossary: Glossary) -> Self {
        self.glossary = glossary;
        self
    }

    /// Share an existing tree, e.g. one already observed by a UI
    pub fn with_tree(mut self, tree: Arc<StatusTree>) -> Self {
        self.tree = tree;
        self
    }

    pub fn assembler(&self) -> ContextAssembler {
        ContextAssembler::new(self.config.context.window)
    }

    /// Drop tree listeners and state. The snapshot store is left as is.
    pub fn dispose(&self) {
        self.tree.dispose();
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("provider", &self.translator.provider_name())
            .field("glossary_terms", &self.glossary.len())
            .finish_non_exhaustive()
    }
}
