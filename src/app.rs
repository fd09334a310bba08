//! SDL2 and OpenGL application management.
//!
//! This module defines the [`App`] struct which encapsulates the SDL2
//! and OpenGL context necessary for creating a windowed application.

use std::sync::Arc;

use log::info;
use satframe::config::WindowConfig;
use satframe::{Error, Result};

/// The [`App`] struct encapsulates the SDL2 and OpenGL context.
pub struct App {
    pub sdl: sdl2::Sdl,
    pub video_subsystem: sdl2::VideoSubsystem,
    pub window: sdl2::video::Window,
    pub gl_context: sdl2::video::GLContext,
    pub gl: Arc<glow::Context>,
    pub event_pump: sdl2::EventPump,
}

impl App {
    /// Opens a window with an OpenGL 3.3 core context.
    /// The configured size is ignored when `fullscreen` is set.
    pub fn new(config: &WindowConfig) -> Result<Self> {
        let sdl = sdl2::init().map_err(Error::Window)?;
        let video_subsystem = sdl.video().map_err(Error::Window)?;
        let gl_attr = video_subsystem.gl_attr();
        gl_attr.set_context_profile(sdl2::video::GLProfile::Core);
        gl_attr.set_context_version(3, 3);

        let (width, height) = if config.fullscreen {
            let mode = video_subsystem
                .current_display_mode(0)
                .map_err(Error::Window)?;
            (mode.w as u32, mode.h as u32)
        } else {
            (config.width, config.height)
        };
        let mut window = video_subsystem
            .window(&config.title, width, height)
            .opengl()
            .resizable()
            .build()
            .map_err(|e| Error::Window(e.to_string()))?;
        window
            .set_fullscreen(if config.fullscreen {
                sdl2::video::FullscreenType::Desktop
            } else {
                sdl2::video::FullscreenType::Off
            })
            .map_err(Error::Window)?;

        let gl_context = window.gl_create_context().map_err(Error::Window)?;
        window.gl_make_current(&gl_context).map_err(Error::Window)?;
        let gl = unsafe {
            glow::Context::from_loader_function(|s| {
                video_subsystem.gl_get_proc_address(s) as *const _
            })
        };
        video_subsystem
            .gl_set_swap_interval(sdl2::video::SwapInterval::VSync)
            .map_err(Error::Window)?;
        let event_pump = sdl.event_pump().map_err(Error::Window)?;
        info!("Window open: {width} x {height}");

        Ok(Self {
            sdl,
            video_subsystem,
            window,
            gl_context,
            gl: Arc::new(gl),
            event_pump,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        self.window.drawable_size()
    }
}
