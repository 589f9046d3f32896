use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use blob_store::{BlobStorageConfig, ContainerStore};

use crate::{
    config::ServerConfig,
    routes::{create_routes, RouteState},
};

/// In-process test harness: an in-memory container store behind the real
/// router.
pub struct TestService {
    pub router: Router,
    pub container_store: Arc<ContainerStore>,
}

impl TestService {
    pub fn new() -> Result<Self> {
        Self::with_resource_segment("contentfiles")
    }

    pub fn with_resource_segment(resource_segment: &str) -> Result<Self> {
        let config = ServerConfig {
            resource_segment: resource_segment.to_string(),
            blob_storage: BlobStorageConfig {
                path: Some("memory:///".to_string()),
                public_url_base: None,
            },
            ..Default::default()
        };
        let container_store = Arc::new(ContainerStore::new(config.blob_storage.clone())?);
        let router = create_routes(RouteState {
            container_store: container_store.clone(),
            resource_segment: config.resource_segment.clone(),
        });
        Ok(Self {
            router,
            container_store,
        })
    }
}
