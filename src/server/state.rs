use axum::extract::FromRef;

use crate::library::LibraryStore;
use crate::media::MediaTools;
use crate::pipeline::{GroupingManager, MediaLayout, SchedulerHandle};
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedLibraryStore = Arc<dyn LibraryStore>;
pub type GuardedMediaTools = Arc<dyn MediaTools>;
pub type GuardedGroupingManager = Arc<GroupingManager>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub store: GuardedLibraryStore,
    pub layout: MediaLayout,
    pub tools: GuardedMediaTools,
    pub grouping: GuardedGroupingManager,
    pub scheduler: SchedulerHandle,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedLibraryStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for GuardedMediaTools {
    fn from_ref(input: &ServerState) -> Self {
        input.tools.clone()
    }
}

impl FromRef<ServerState> for GuardedGroupingManager {
    fn from_ref(input: &ServerState) -> Self {
        input.grouping.clone()
    }
}

impl FromRef<ServerState> for MediaLayout {
    fn from_ref(input: &ServerState) -> Self {
        input.layout.clone()
    }
}

impl FromRef<ServerState> for SchedulerHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.scheduler.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
