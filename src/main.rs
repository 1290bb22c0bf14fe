use anyhow::{Context, Result};
use clap::Parser;
use cuckatoo_panel::config::{Args, Config};
use cuckatoo_panel::error::SessionError;
use cuckatoo_panel::logging::formatter::format_duration;
use cuckatoo_panel::logging::{init_logging, LogConfig};
use cuckatoo_panel::{ControlPanel, ProcessEngine, SessionEvent, NAME, VERSION};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 加载配置，文件不存在时使用默认值
    let mut config = Config::load_or_default(&args.config)?;
    if let Some(level) = &args.log_level {
        config.general.log_level = level.clone();
    }

    // 初始化日志系统，guard 保留到退出
    let _log_guard = init_logging(LogConfig {
        level: config.general.log_level.clone(),
        file_path: config
            .general
            .log_file
            .as_ref()
            .map(|path| path.display().to_string()),
        ..LogConfig::default()
    })
    .context("Failed to initialize logging")?;

    info!("🚀 Starting {} v{}", NAME, VERSION);
    info!("📋 Configuration: {}", args.config);

    let engine = ProcessEngine::new(config.engine.program.clone())
        .with_stop_signal(config.engine.stop_signal);
    let panel = Arc::new(ControlPanel::from_config(&config, Arc::new(engine)));

    // 恢复设置，命令行参数优先
    let connection = args.apply(panel.initialize());

    let mut events = panel.session().subscribe();
    let started = Instant::now();

    if let Err(e) = panel.start(connection) {
        error!("❌ Failed to start miner: {}", e);
        if !args.no_save {
            panel.suspend();
        }
        return Err(e.into());
    }
    info!("✅ Miner started");

    let mut stdout = tokio::io::stdout();
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Error waiting for signal: {}", e);
                }
                info!("🛑 Received shutdown signal");

                match panel.stop() {
                    Ok(()) => {}
                    Err(SessionError::InvalidState { state, .. }) => {
                        warn!("Miner is already {}", state);
                    }
                    Err(e) => error!("Failed to stop miner: {}", e),
                }
            }
            event = events.recv() => match event {
                Ok(SessionEvent::Output { chunk, .. }) => {
                    stdout.write_all(chunk.as_bytes()).await?;
                    stdout.flush().await?;
                }
                Ok(SessionEvent::RunFinished { run_id, success }) => {
                    info!(%run_id, success, "Miner run finished");
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Output display skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    // 回收后台线程
    let waiter = panel.clone();
    tokio::task::spawn_blocking(move || waiter.session().wait_idle())
        .await
        .context("Failed to wait for miner worker")?;

    if args.no_save {
        info!("Skipping settings save");
    } else {
        panel.suspend();
    }

    info!("👋 Miner stopped after {}", format_duration(started.elapsed()));
    Ok(())
}
