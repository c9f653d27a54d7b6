use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use visit_ingest::adapters::{HttpIndex, LocalIndex};
use visit_ingest::config::{CliConfig, Command};
use visit_ingest::domain::ports::PackageIndex;
use visit_ingest::launcher::image::{BuildContext, Image};
use visit_ingest::launcher::probe::wait_until_accepting;
use visit_ingest::utils::logger;
use visit_ingest::{IngestError, Launcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.log_json {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting visit-ingest");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    let launcher = Launcher::default();

    let outcome = match config.command {
        Command::Build {
            context,
            manifest,
            app,
            index,
            out,
        } => {
            let index = open_index(&index)?;
            let context = BuildContext::new(context)
                .with_manifest(manifest)
                .with_app(app);
            launcher
                .build(&context, index.as_ref(), &out)
                .await
                .map(|image| {
                    println!("✅ Image written to {}", image.root().display());
                })
        }
        Command::Start { image, bind } => match Image::open(&image) {
            Ok(image) => match launcher.start(&image, bind.addr()).await {
                Ok(server) => server.run().await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        },
        Command::Serve { dir, app, bind } => {
            match launcher.serve_dir(&dir, &app, bind.addr()).await {
                Ok(server) => server.run().await,
                Err(e) => Err(e),
            }
        }
        Command::Probe {
            addr,
            timeout_seconds,
        } => wait_until_accepting(addr, Duration::from_secs(timeout_seconds))
            .await
            .map(|elapsed| {
                println!("✅ {} accepting connections after {:?}", addr, elapsed);
            }),
    };

    if let Err(e) = outcome {
        exit_with(e);
    }

    Ok(())
}

fn open_index(index: &str) -> anyhow::Result<Arc<dyn PackageIndex>> {
    if index.starts_with("http://") || index.starts_with("https://") {
        let index = HttpIndex::new(reqwest::Client::new(), index)
            .with_context(|| format!("invalid package index URL {}", index))?;
        Ok(Arc::new(index))
    } else {
        let index = LocalIndex::from_file(index)
            .with_context(|| format!("cannot read package index {}", index))?;
        Ok(Arc::new(index))
    }
}

fn exit_with(e: IngestError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼, 啟動類錯誤一律非零
    std::process::exit(e.exit_code().max(1));
}
