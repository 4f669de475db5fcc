//! Runs one chapter of the Vulkan walkthrough. Each chapter builds on the previous ones and stops after its own step,
//! the windowed chapters keep running until the window is closed.
//!
//! ```text
//! chapters swapchain --validation --width 800 --height 600
//! ```

use anyhow::Result;
use clap::{Parser, ValueEnum};
use vkstart::{context::ContextConfig, window::WindowDesc};

mod chapter;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Chapter {
    /// Create and destroy a Vulkan instance
    Instance,
    /// List all physical devices and create a logical device on the first one
    Devices,
    /// Open a window and wait until it is closed
    Window,
    /// Create a surface for a window and select its format
    Surface,
    /// Create a swapchain and prepare its images for rendering
    Swapchain,
}

#[derive(Parser, Debug)]
#[command(name = "chapters")]
#[command(about = "Runs one chapter of the Vulkan walkthrough.", long_about = None)]
struct Args {
    #[arg(value_enum)]
    chapter: Chapter,

    /// Enables the Khronos validation layer
    #[arg(long)]
    validation: bool,

    /// Prefer discrete GPUs over the first device reported
    #[arg(long)]
    prefer_discrete: bool,

    #[arg(long, default_value_t = String::from(WindowDesc::DEFAULT_TITLE))]
    title: String,

    #[arg(long, default_value_t = WindowDesc::DEFAULT_WIDTH)]
    width: u32,

    #[arg(long, default_value_t = WindowDesc::DEFAULT_HEIGHT)]
    height: u32,

    #[arg(long, default_value_t = log::LevelFilter::Info)]
    log_level: log::LevelFilter,
}

fn main() -> Result<()> {
    let args = Args::parse();

    simple_logger::SimpleLogger::new()
        .with_level(args.log_level)
        .init()?;

    let config = ContextConfig {
        validation: args.validation,
        prefer_discrete: args.prefer_discrete,
        ..Default::default()
    };
    let window = WindowDesc {
        title: args.title,
        width: args.width,
        height: args.height,
    };

    match args.chapter {
        Chapter::Instance => chapter::instance(&config),
        Chapter::Devices => chapter::devices(&config),
        Chapter::Window => chapter::window(&window),
        Chapter::Surface => chapter::surface(&config, &window),
        Chapter::Swapchain => chapter::swapchain(&config, &window),
    }
}
