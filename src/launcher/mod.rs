//! Build-then-start launcher.
//!
//! The build step resolves the dependency manifest and stages the entry file
//! into an image directory. The start step loads the application object the
//! image names and binds it on the configured address.

pub mod entry;
pub mod image;
pub mod manifest;
pub mod probe;
pub mod server;

use crate::app::registry::AppRegistry;
use crate::domain::ports::PackageIndex;
use crate::utils::error::Result;
use entry::AppRef;
use image::{build_image, BuildContext, Image};
use server::Server;
use std::net::SocketAddr;
use std::path::Path;

pub const DEFAULT_PORT: u16 = 8080;

pub struct Launcher {
    registry: AppRegistry,
}

impl Launcher {
    pub fn new(registry: AppRegistry) -> Self {
        Self { registry }
    }

    pub async fn build(
        &self,
        context: &BuildContext,
        index: &dyn PackageIndex,
        out: &Path,
    ) -> Result<Image> {
        build_image(context, index, out).await
    }

    /// Start step: load the image's application, then bind.
    pub async fn start(&self, image: &Image, addr: SocketAddr) -> Result<Server> {
        tracing::info!(
            image = %image.root().display(),
            runtime = %image.lock().runtime,
            dependencies = image.lock().dependencies.len(),
            "Starting image"
        );
        self.start_entry(image.app_ref(), &image.entry_path(), addr)
            .await
    }

    /// Loads `<dir>/<module>.toml` directly, without a built image.
    pub async fn serve_dir(&self, dir: &Path, app_ref: &AppRef, addr: SocketAddr) -> Result<Server> {
        let entry_path = dir.join(app_ref.entry_file_name());
        self.start_entry(app_ref, &entry_path, addr).await
    }

    async fn start_entry(&self, app_ref: &AppRef, entry_path: &Path, addr: SocketAddr) -> Result<Server> {
        let router = self.registry.load(app_ref, entry_path)?;
        Server::bind(addr, router, app_ref.clone()).await
    }
}

impl Default for Launcher {
    fn default() -> Self {
        Self::new(AppRegistry::default())
    }
}
