use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use touchd::config::TouchdConfig;
use touchd::event_model::event::{ABS_MT_POSITION_X, ABS_MT_POSITION_Y};
use touchd::input_devices::{DeviceCapabilities, discover};
use touchd::touch_driver::{TouchEngine, gesture};

#[derive(Parser, Debug)]
#[command(name = "touchd", version, about = "Userspace touchscreen virtualizer")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 逻辑显示宽度, 覆盖配置文件
    #[arg(long, requires = "height")]
    width: Option<i32>,

    #[arg(long, requires = "width")]
    height: Option<i32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 列出所有符合条件的触摸屏
    List,
    /// 开始转发, 直到 Ctrl-C
    Run,
    /// 用合成触点滑动一次
    Swipe { x1: i32, y1: i32, x2: i32, y2: i32 },
}

fn describe(caps: &DeviceCapabilities) -> String {
    let axis = |code| caps.axis(code).copied().unwrap_or_default();
    let (x, y) = (axis(ABS_MT_POSITION_X), axis(ABS_MT_POSITION_Y));
    format!(
        "{}\t{:?}\t{:04x}:{:04x}\tslots={}\tx=[{}, {}]\ty=[{}, {}]",
        caps.path.display(),
        caps.name,
        caps.identity.vendor,
        caps.identity.product,
        caps.slot_count,
        x.minimum,
        x.maximum,
        y.minimum,
        y.maximum,
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = TouchdConfig::load(args.config.as_deref())?;
    let backend = config.backend();

    if let Command::List = args.command {
        let devices = discover(&backend, true).with_context(|| {
            format!("failed to scan {}", backend.input_dir.display())
        })?;
        for caps in &devices {
            println!("{}", describe(caps));
        }
        if devices.is_empty() {
            bail!("no multitouch touchscreen found");
        }
        return Ok(());
    }

    let engine = TouchEngine::new(backend, config.engine());
    if let (Some(width), Some(height)) = (args.width, args.height) {
        engine.set_display_resolution(width, height)?;
    }

    engine.start().await.context("failed to start touch engine")?;
    let result = match args.command {
        Command::Run => {
            info!("forwarding touches, press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("failed to wait for Ctrl-C")
        }
        Command::Swipe { x1, y1, x2, y2 } => {
            if engine.display_resolution().is_none() {
                Err(anyhow::anyhow!(
                    "swipe needs a display resolution (--width/--height or `display` in config)"
                ))
            } else {
                gesture::swipe(&engine, (x1, y1), (x2, y2), &config.swipe).await;
                Ok(())
            }
        }
        Command::List => Ok(()),
    };
    engine.stop().await;
    result
}
