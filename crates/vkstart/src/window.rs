//! # Window system
//!
//! The context only needs a handle that can be turned into a Vulkan surface. [WindowSystem] abstracts over whatever
//! creates that handle and keeps it alive until the user closes it. With the `winit` feature [WinitWindowSystem] provides
//! an implementation based on [winit](https://crates.io/crates/winit).
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::WindowError;

///Title, and inner size in logical pixels, of a window that should be created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowDesc {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl WindowDesc {
    pub const DEFAULT_TITLE: &'static str = "Vulkan Example";
    pub const DEFAULT_WIDTH: u32 = 1280;
    pub const DEFAULT_HEIGHT: u32 = 720;

    pub fn extent(&self) -> ash::vk::Extent2D {
        ash::vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }
}

impl Default for WindowDesc {
    fn default() -> Self {
        WindowDesc {
            title: Self::DEFAULT_TITLE.to_owned(),
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
        }
    }
}

///Something that can create a single native window and run until it is closed.
pub trait WindowSystem {
    type Window: HasWindowHandle + HasDisplayHandle;

    ///Creates a visible, focused window according to `desc`.
    fn create_window(&mut self, desc: &WindowDesc) -> Result<Self::Window, WindowError>;
    ///Blocks until the user requested `window` to be closed.
    fn wait_for_close(self, window: &Self::Window) -> Result<(), WindowError>;
}

#[cfg(feature = "winit")]
pub use winit_system::WinitWindowSystem;

#[cfg(feature = "winit")]
mod winit_system {
    use winit::{
        application::ApplicationHandler,
        dpi::{LogicalSize, PhysicalPosition},
        event::WindowEvent,
        event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
        window::{Window, WindowId},
    };

    use super::{WindowDesc, WindowSystem};
    use crate::error::WindowError;

    pub struct WinitWindowSystem {
        event_loop: EventLoop<()>,
    }

    impl WinitWindowSystem {
        pub fn new() -> Result<Self, WindowError> {
            let event_loop = EventLoop::new().map_err(|e| WindowError::EventLoop(e.to_string()))?;
            Ok(WinitWindowSystem { event_loop })
        }
    }

    struct CloseHandler {
        window: WindowId,
    }

    impl ApplicationHandler for CloseHandler {
        fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

        fn window_event(
            &mut self,
            event_loop: &ActiveEventLoop,
            window_id: WindowId,
            event: WindowEvent,
        ) {
            if window_id == self.window && matches!(event, WindowEvent::CloseRequested) {
                #[cfg(feature = "logging")]
                log::info!("Close requested, leaving event loop");
                event_loop.exit();
            }
        }
    }

    impl WindowSystem for WinitWindowSystem {
        type Window = Window;

        fn create_window(&mut self, desc: &WindowDesc) -> Result<Window, WindowError> {
            let attributes = Window::default_attributes()
                .with_title(desc.title.clone())
                .with_inner_size(LogicalSize::new(desc.width, desc.height))
                .with_visible(true);

            //The window has to exist before the event loop runs, since the surface is created right away.
            #[allow(deprecated)]
            let window = self
                .event_loop
                .create_window(attributes)
                .map_err(|e| WindowError::Creation(e.to_string()))?;

            if let Some(monitor) = window.current_monitor() {
                let monitor_size = monitor.size();
                let monitor_pos = monitor.position();
                let window_size = window.outer_size();
                window.set_outer_position(PhysicalPosition::new(
                    monitor_pos.x + (monitor_size.width as i32 - window_size.width as i32) / 2,
                    monitor_pos.y + (monitor_size.height as i32 - window_size.height as i32) / 2,
                ));
            }
            window.focus_window();

            #[cfg(feature = "logging")]
            log::info!(
                "Created window \"{}\" with {}x{}",
                desc.title,
                desc.width,
                desc.height
            );

            Ok(window)
        }

        fn wait_for_close(self, window: &Window) -> Result<(), WindowError> {
            self.event_loop.set_control_flow(ControlFlow::Wait);
            let mut handler = CloseHandler { window: window.id() };
            self.event_loop
                .run_app(&mut handler)
                .map_err(|e| WindowError::EventLoop(e.to_string()))
        }
    }
}
