use crate::domain::ports::PackageIndex;
use crate::launcher::entry::AppRef;
use crate::launcher::manifest::{DependencyManifest, ResolvedDependency};
use crate::utils::error::{IngestError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const LOCK_FILE: &str = "image.json";
pub const APP_DIR: &str = "app";

/// Inputs of the build step.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub root: PathBuf,
    pub manifest: String,
    pub app_ref: AppRef,
}

impl BuildContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifest: "dependencies.txt".to_string(),
            app_ref: AppRef::default(),
        }
    }

    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = manifest.into();
        self
    }

    pub fn with_app(mut self, app_ref: AppRef) -> Self {
        self.app_ref = app_ref;
        self
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.manifest)
    }

    pub fn entry_path(&self) -> PathBuf {
        self.root.join(self.app_ref.entry_file_name())
    }
}

/// Contents of `image.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLock {
    pub runtime: String,
    pub app_ref: String,
    pub entry_path: String,
    pub dependencies: Vec<ResolvedDependency>,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Image {
    root: PathBuf,
    lock: ImageLock,
    app_ref: AppRef,
}

impl Image {
    /// Opens an image produced by [`build_image`].
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let invalid = |message: String| IngestError::InvalidImageError {
            path: root.display().to_string(),
            message,
        };

        let bytes = std::fs::read(root.join(LOCK_FILE))
            .map_err(|e| invalid(format!("cannot read {}: {}", LOCK_FILE, e)))?;
        let lock: ImageLock = serde_json::from_slice(&bytes)
            .map_err(|e| invalid(format!("malformed {}: {}", LOCK_FILE, e)))?;
        let app_ref: AppRef = lock.app_ref.parse().map_err(|e: IngestError| invalid(e.to_string()))?;

        Ok(Self { root, lock, app_ref })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lock(&self) -> &ImageLock {
        &self.lock
    }

    pub fn app_ref(&self) -> &AppRef {
        &self.app_ref
    }

    pub fn entry_path(&self) -> PathBuf {
        self.root.join(&self.lock.entry_path)
    }
}

fn runtime_id() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Build step. Every dependency is resolved before anything is written, and
/// the image directory only appears once it is complete.
pub async fn build_image(
    context: &BuildContext,
    index: &dyn PackageIndex,
    out: &Path,
) -> Result<Image> {
    let entry_source = context.entry_path();
    if !tokio::fs::try_exists(&entry_source).await.unwrap_or(false) {
        return Err(IngestError::MissingEntryFileError {
            path: entry_source.display().to_string(),
        });
    }

    // 只覆蓋先前建置的 image, 其他既有路徑一律拒絕
    if tokio::fs::try_exists(out).await.unwrap_or(false) && !is_image_dir(out).await {
        return Err(IngestError::InvalidImageError {
            path: out.display().to_string(),
            message: format!(
                "output path exists and has no {}; refusing to replace it",
                LOCK_FILE
            ),
        });
    }

    let manifest = DependencyManifest::from_file(context.manifest_path())?;
    tracing::info!(
        manifest = %context.manifest_path().display(),
        requirements = manifest.len(),
        "📦 Resolving dependencies"
    );
    let dependencies = manifest.resolve(index).await?;

    let lock = ImageLock {
        runtime: runtime_id(),
        app_ref: context.app_ref.to_string(),
        entry_path: format!("{}/{}", APP_DIR, context.app_ref.entry_file_name()),
        dependencies,
        built_at: Utc::now(),
    };

    // 先寫入暫存目錄, 完成後再換上
    let staging = staging_dir(out);
    let installed = match write_image(&staging, &entry_source, &lock).await {
        Ok(()) => swap_into_place(&staging, out).await,
        Err(e) => Err(e),
    };
    if let Err(e) = installed {
        let _ = tokio::fs::remove_dir_all(&staging).await;
        return Err(e);
    }

    tracing::info!(image = %out.display(), app = %context.app_ref, "✅ Image built");
    Image::open(out)
}

async fn is_image_dir(path: &Path) -> bool {
    tokio::fs::metadata(path.join(LOCK_FILE))
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

async fn swap_into_place(staging: &Path, out: &Path) -> Result<()> {
    if is_image_dir(out).await {
        tokio::fs::remove_dir_all(out).await?;
    }
    tokio::fs::rename(staging, out).await?;
    Ok(())
}

fn staging_dir(out: &Path) -> PathBuf {
    let name = out
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    out.with_file_name(format!(".{}.partial-{}", name, uuid::Uuid::new_v4()))
}

async fn write_image(staging: &Path, entry_source: &Path, lock: &ImageLock) -> Result<()> {
    let app_dir = staging.join(APP_DIR);
    tokio::fs::create_dir_all(&app_dir).await?;

    let entry_target = staging.join(&lock.entry_path);
    tokio::fs::copy(entry_source, &entry_target).await?;

    let lock_bytes = serde_json::to_vec_pretty(lock)?;
    tokio::fs::write(staging.join(LOCK_FILE), lock_bytes).await?;
    Ok(())
}
