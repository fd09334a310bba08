//! Demo: renders a lit sphere into an offscreen target, shrinks it into a
//! small "TV" target and composites both onto the window.
//!
//! Keys 1-7 switch shading presets, T cycles toon ramps, Escape quits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use glam::{Vec3, Vec4};
use glow::HasContext;
use image::{DynamicImage, Rgba, RgbaImage};
use log::{error, info, warn};
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;

use satframe::abs::*;
use satframe::config::FrameworkConfig;
use satframe::error::FramebufferError;
use satframe::light::Light;
use satframe::shading::{self, ShadingToggles, ShadingUniforms, TOON_RAMP_UNIT};
use satframe::{Result, logging};

use crate::app::App;

mod app;

const LIGHT_SLOT: u32 = 3;
const TV_SIZE: u32 = 128;

macro_rules! shader_program {
    ($gpu:expr, $name:literal) => {
        ShaderProgram::new(
            $gpu,
            include_str!(concat!("shaders/", $name, "/vert.glsl")),
            include_str!(concat!("shaders/", $name, "/frag.glsl")),
        )
    };
}

fn main() {
    if let Err(e) = run() {
        error!("{e}");
        eprintln!("satframe-demo: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config_path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => FrameworkConfig::default_path()?,
    };
    let config = FrameworkConfig::load(&config_path)?;
    logging::init(&config.log)?;
    info!("Using config {}", config_path.display());

    let mut app = App::new(&config.window)?;
    unsafe {
        app.gl.clear_color(0.0, 0.0, 0.0, 1.0);
    }
    let gpu: Arc<dyn Gpu> = app.gl.clone();
    let ctx = RenderContext::new(&gpu)?;

    let (width, height) = app.size();
    let mut scene = Framebuffer::new(&ctx);
    config.framebuffer.apply(&mut scene);
    scene.add_depth_target()?;
    scene.add_color_target(ColorFormat::Rgb8)?;
    scene.init_with_size(&ctx, width, height)?;

    let mut tv = Framebuffer::new(&ctx);
    config.framebuffer.apply(&mut tv);
    tv.add_depth_target()?;
    tv.add_color_target(ColorFormat::Rgb8)?;
    tv.init_with_size(&ctx, TV_SIZE, TV_SIZE)?;

    let scene_shader = shader_program!(&gpu, "scene")?;
    scene_shader.bind();
    scene_shader.bind_block("Light", LIGHT_SLOT);
    scene_shader.bind_block("Toon", shading::TOON_SLOT);
    scene_shader.bind_block("Rim", shading::RIM_SLOT);
    scene_shader.bind_block("Ambient", shading::AMBIENT_SLOT);
    scene_shader.bind_block("Specular", shading::SPECULAR_SLOT);
    scene_shader.set_i32("u_toon_ramp", TOON_RAMP_UNIT as i32);

    let passthrough = shader_program!(&gpu, "passthrough")?;
    passthrough.bind();
    passthrough.set_i32("u_scene", 0);
    passthrough.unbind();

    let toon_ramps = load_toon_ramps(&gpu, &config)?;
    let mut toggles = ShadingToggles::default();
    let mut shading_uniforms = ShadingUniforms::new(&gpu)?;

    let mut light = Light {
        color: Vec4::new(1.0, 0.95, 0.85, 1.0),
        atten_linear: 0.1,
        atten_quadratic: 0.05,
        ..Light::default()
    };
    let light_buffer = Light::create_buffer(&gpu)?;
    light_buffer.bind(LIGHT_SLOT);

    let start = Instant::now();
    let mut last_time = Instant::now();

    'running: loop {
        for event in app.event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'running,
                Event::KeyDown {
                    keycode: Some(key),
                    repeat: false,
                    ..
                } => {
                    if let Some(preset) = preset_key(key) {
                        toggles.apply_preset(preset);
                    } else if key == Keycode::T {
                        toggles.cycle_toon_ramp(toon_ramps.len());
                    }
                }
                Event::Window {
                    win_event: WindowEvent::Resized(w, h),
                    ..
                } => {
                    let (w, h) = (w.max(1) as u32, h.max(1) as u32);
                    if let Err(e) = scene.reshape(&ctx, w, h) {
                        error!("Failed to resize scene target: {e}");
                    }
                }
                _ => {}
            }
        }

        let dt = last_time.elapsed().as_secs_f32().min(2.0);
        last_time = Instant::now();
        let t = start.elapsed().as_secs_f32();

        light.transform.position = Vec3::new(t.cos() * 2.0, t.sin() * 1.2, 1.5);
        light.update(dt);
        light.position = light.transform.world_position().extend(1.0);
        light.upload(&light_buffer);
        shading_uniforms.sync(&toggles);

        if let Some(ramp) = toon_ramps.get(toggles.toon_ramp) {
            ramp.bind_to_unit(TOON_RAMP_UNIT);
        }

        let frame = Frame {
            ctx: &ctx,
            scene: &scene,
            tv: &tv,
            scene_shader: &scene_shader,
            passthrough: &passthrough,
        };
        if let Err(e) = frame.draw(app.size()) {
            warn!("Skipping frame: {e}");
        }

        app.window.gl_swap_window();
    }

    info!("Shutting down");
    Ok(())
}

struct Frame<'a> {
    ctx: &'a RenderContext,
    scene: &'a Framebuffer,
    tv: &'a Framebuffer,
    scene_shader: &'a ShaderProgram,
    passthrough: &'a ShaderProgram,
}

impl Frame<'_> {
    fn draw(&self, (width, height): (u32, u32)) -> std::result::Result<(), FramebufferError> {
        let gpu = self.ctx.gpu();

        self.scene.clear();
        self.scene_shader.bind();
        self.scene.render_to_fsq(self.ctx)?;

        self.tv.clear();
        self.passthrough.bind();
        self.scene.bind_color_as_texture(0, 0)?;
        self.tv.render_to_fsq(self.ctx)?;

        gpu.viewport(0, 0, width as i32, height as i32);
        gpu.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        self.ctx.draw_fsq();
        self.scene.unbind_texture(0);
        self.passthrough.unbind();

        self.tv.backbuffer();
        Ok(())
    }
}

fn preset_key(key: Keycode) -> Option<u8> {
    match key {
        Keycode::Num1 => Some(1),
        Keycode::Num2 => Some(2),
        Keycode::Num3 => Some(3),
        Keycode::Num4 => Some(4),
        Keycode::Num5 => Some(5),
        Keycode::Num6 => Some(6),
        Keycode::Num7 => Some(7),
        _ => None,
    }
}

/// Loads the toon ramps from the asset directory with the configured
/// sampling policy, or builds a three-band ramp when none are found.
fn load_toon_ramps(gpu: &Arc<dyn Gpu>, config: &FrameworkConfig) -> Result<Vec<Texture>> {
    let textures = &config.textures;
    let mut ramps = Vec::new();
    for name in ["toonramp1.png", "toonramp2.png"] {
        let mut ramp = Texture::new(gpu);
        textures.apply(&mut ramp);
        ramp.set_wrap_parameters(TextureWrap::ClampToEdge);
        match ramp.load(textures.resolve(name), textures.generate_mipmaps) {
            Ok(()) => ramps.push(ramp),
            Err(e) => warn!("Skipping toon ramp {name}: {e}"),
        }
    }

    if ramps.is_empty() {
        let bands = RgbaImage::from_fn(64, 1, |x, _| {
            let v = match x {
                0..16 => 40,
                16..40 => 140,
                _ => 255,
            };
            Rgba([v, v, v, 255])
        });
        let mut ramp = Texture::new(gpu);
        ramp.set_filter_parameters(TextureFilter::Nearest, TextureFilter::Nearest);
        ramp.set_wrap_parameters(TextureWrap::ClampToEdge);
        ramp.load_image(&DynamicImage::ImageRgba8(bands), false)?;
        ramps.push(ramp);
    }
    Ok(ramps)
}
