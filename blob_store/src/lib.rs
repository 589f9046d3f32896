use std::{env, sync::Arc};

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};
use object_store::{
    aws::AmazonS3ConfigKey,
    azure::AzureConfigKey,
    parse_url_opts,
    path::Path,
    ObjectStore,
    ObjectStoreScheme,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;
use url::Url;

/// Marker object whose presence defines the container. Its JSON body records
/// the container's public-access policy.
const CONTAINER_MARKER: &str = ".container";

/// Key prefix under a container holding blob bytes.
const BLOB_PREFIX: &str = "blobs";

/// Key prefix under a container holding per-blob metadata sidecars.
const META_PREFIX: &str = "meta";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    /// Storage URL, e.g. `file:///var/lib/content-files`, `memory:///`,
    /// `s3://bucket/prefix` or `az://container/prefix`.
    pub path: Option<String>,
    /// Base URL used to build direct blob URIs. Defaults to `path`.
    pub public_url_base: Option<String>,
}

impl BlobStorageConfig {
    pub fn new(path: &str, public_url_base: Option<String>) -> Self {
        BlobStorageConfig {
            path: Some(format!("file://{}", path)),
            public_url_base,
        }
    }
}

impl Default for BlobStorageConfig {
    fn default() -> Self {
        let blob_store_path = format!(
            "file://{}",
            env::current_dir()
                .unwrap()
                .join("content_files_storage/blobs")
                .to_str()
                .unwrap()
        );
        BlobStorageConfig {
            path: Some(blob_store_path),
            public_url_base: None,
        }
    }
}

/// Checks a container name against the backend's character rules: lowercase
/// letters, digits and hyphens, no leading or trailing hyphen, no consecutive
/// hyphens. Length limits are enforced separately by the caller.
pub fn validate_container_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return false;
    }
    if name.starts_with('-') || name.ends_with('-') {
        return false;
    }
    if name.contains("--") {
        return false;
    }
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ContainerMeta {
    public_access: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMeta {
    pub content_type: String,
    pub size_bytes: u64,
    pub sha256_hash: String,
}

#[derive(Debug, Clone)]
pub struct PutResult {
    pub url: String,
    pub size_bytes: u64,
    pub sha256_hash: String,
}

pub struct BlobDownload {
    pub content_type: String,
    pub size_bytes: u64,
    pub stream: BoxStream<'static, Result<Bytes>>,
}

/// Container/blob facade over an `ObjectStore`.
///
/// The object store has no first-class container entity, so containers are
/// mapped onto the flat key space: a `.container` marker object defines
/// existence and records the public-read policy, blob bytes live under
/// `{container}/blobs/` and a JSON sidecar under `{container}/meta/` carries
/// each blob's content type, size and sha256.
#[derive(Clone)]
pub struct ContainerStore {
    object_store: Arc<dyn ObjectStore>,
    root: Path,
    base_url: String,
}

impl ContainerStore {
    pub fn new(config: BlobStorageConfig) -> Result<Self> {
        let url_str = config
            .path
            .clone()
            .ok_or_else(|| anyhow!("blob storage path is not configured"))?;
        let url = url_str
            .parse::<Url>()
            .with_context(|| format!("invalid blob storage url: {}", url_str))?;
        let (scheme, _) = ObjectStoreScheme::parse(&url)?;
        let (object_store, root) = parse_url_opts(&url, env_store_opts(&scheme))?;
        let base_url = config
            .public_url_base
            .unwrap_or(url_str)
            .trim_end_matches('/')
            .to_string();
        info!("using blob store path: {}", url);
        Ok(Self {
            object_store: Arc::new(object_store),
            root,
            base_url,
        })
    }

    /// Direct URI of a blob, used as the Location header for blobs created in
    /// publicly readable containers.
    pub fn blob_url(&self, container: &str, file_name: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url, container, BLOB_PREFIX, file_name
        )
    }

    pub async fn container_exists(&self, container: &str) -> Result<bool> {
        self.exists(&self.marker_path(container)).await
    }

    pub async fn create_container_if_absent(&self, container: &str) -> Result<()> {
        let marker = self.marker_path(container);
        if self.exists(&marker).await? {
            return Ok(());
        }
        let body = serde_json::to_vec(&ContainerMeta::default())?;
        self.object_store.put(&marker, Bytes::from(body).into()).await?;
        info!("created container {}", container);
        Ok(())
    }

    /// Enables anonymous read access on the container's blobs by rewriting
    /// the marker object.
    pub async fn set_public_read(&self, container: &str) -> Result<()> {
        let body = serde_json::to_vec(&ContainerMeta {
            public_access: true,
        })?;
        self.object_store
            .put(&self.marker_path(container), Bytes::from(body).into())
            .await?;
        Ok(())
    }

    pub async fn container_is_public(&self, container: &str) -> Result<bool> {
        match self.object_store.get(&self.marker_path(container)).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                let meta: ContainerMeta = serde_json::from_slice(&bytes)?;
                Ok(meta.public_access)
            }
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn blob_exists(&self, container: &str, file_name: &str) -> Result<bool> {
        self.exists(&self.blob_path(container, file_name)).await
    }

    /// Uploads a blob, overwriting any existing object of the same name, and
    /// records its content type in the metadata sidecar.
    pub async fn put_blob(
        &self,
        container: &str,
        file_name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<PutResult> {
        let mut hasher = Sha256::new();
        hasher.update(&data);
        let sha256_hash = format!("{:x}", hasher.finalize());
        let size_bytes = data.len() as u64;

        self.object_store
            .put(&self.blob_path(container, file_name), data.into())
            .await?;
        let meta = BlobMeta {
            content_type: content_type.to_string(),
            size_bytes,
            sha256_hash: sha256_hash.clone(),
        };
        self.object_store
            .put(
                &self.meta_path(container, file_name),
                Bytes::from(serde_json::to_vec(&meta)?).into(),
            )
            .await?;

        Ok(PutResult {
            url: self.blob_url(container, file_name),
            size_bytes,
            sha256_hash,
        })
    }

    pub async fn get_blob(&self, container: &str, file_name: &str) -> Result<BlobDownload> {
        let meta = self.read_blob_meta(container, file_name).await?;
        let path = self.blob_path(container, file_name);
        let get_result = self
            .object_store
            .get(&path)
            .await
            .map_err(|e| anyhow!("can't get object {:?}: {:?}", path, e))?;

        let size_bytes = get_result.meta.size;
        let content_type = meta
            .map(|m| m.content_type)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let (tx, rx) = mpsc::unbounded_channel();
        let location = path.to_string();
        tokio::spawn(async move {
            let mut stream = get_result.into_stream();
            while let Some(chunk) = stream.next().await {
                let _ = tx.send(
                    chunk.map_err(|e| {
                        anyhow!("error reading object {:?}: {:?}", location.clone(), e)
                    }),
                );
            }
        });

        Ok(BlobDownload {
            content_type,
            size_bytes,
            stream: Box::pin(UnboundedReceiverStream::new(rx)),
        })
    }

    pub async fn delete_blob(&self, container: &str, file_name: &str) -> Result<()> {
        self.object_store
            .delete(&self.blob_path(container, file_name))
            .await?;
        match self
            .object_store
            .delete(&self.meta_path(container, file_name))
            .await
        {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Flat, non-recursive enumeration of the blob names in a container. The
    /// marker and metadata sidecars are not part of the listing.
    pub async fn list_blobs(&self, container: &str) -> Result<Vec<String>> {
        let prefix = self.root.child(container).child(BLOB_PREFIX);
        let mut stream = self.object_store.list(Some(&prefix));
        let mut names = Vec::new();
        while let Some(meta) = stream.next().await {
            let meta = meta?;
            if let Some(name) = meta.location.filename() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    pub async fn read_bytes(&self, container: &str, file_name: &str) -> Result<Bytes> {
        let get_result = self
            .object_store
            .get(&self.blob_path(container, file_name))
            .await?;
        Ok(get_result.bytes().await?)
    }

    async fn read_blob_meta(&self, container: &str, file_name: &str) -> Result<Option<BlobMeta>> {
        match self
            .object_store
            .get(&self.meta_path(container, file_name))
            .await
        {
            Ok(result) => {
                let bytes = result.bytes().await?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        match self.object_store.head(path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn marker_path(&self, container: &str) -> Path {
        self.root.child(container).child(CONTAINER_MARKER)
    }

    fn blob_path(&self, container: &str, file_name: &str) -> Path {
        self.root.child(container).child(BLOB_PREFIX).child(file_name)
    }

    fn meta_path(&self, container: &str, file_name: &str) -> Path {
        self.root.child(container).child(META_PREFIX).child(file_name)
    }
}

/// Credentials for s3/azure stores come from the process environment, the
/// same way the object store builders read them, restricted to keys the
/// builder understands.
fn env_store_opts(scheme: &ObjectStoreScheme) -> Vec<(String, String)> {
    match scheme {
        ObjectStoreScheme::AmazonS3 => env::vars()
            .filter_map(|(key, value)| {
                if !key.starts_with("AWS_") {
                    return None;
                }
                let key = key.to_ascii_lowercase();
                key.parse::<AmazonS3ConfigKey>().ok().map(|_| (key, value))
            })
            .collect(),
        ObjectStoreScheme::MicrosoftAzure => env::vars()
            .filter_map(|(key, value)| {
                if !key.starts_with("AZURE_") {
                    return None;
                }
                let key = key.to_ascii_lowercase();
                key.parse::<AzureConfigKey>().ok().map(|_| (key, value))
            })
            .collect(),
        _ => Vec::new(),
    }
}
