use std::error::Error;
use std::ffi::c_void;
use std::fmt::Display;
use std::path::Path;

use anyhow::Context as _;
use log::info;
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::{Keycode, Scancode};
use sdl2::mouse;
use sdl2::video::{GLProfile, SwapInterval};

mod config;
mod logging;
mod renderer;

use config::Config;
use logging::{init_logging, LoggingConfig};
use renderer::{CameraKey, Context, GlDevice, MouseButton};

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());
    let config = Config::load(Path::new(config::DEFAULT_PATH))?;

    let sdl_context = sdl2::init().map_err(SdlErr)?;
    let video_subsystem = sdl_context.video().map_err(SdlErr)?;
    let gl_attr = video_subsystem.gl_attr();
    gl_attr.set_context_profile(GLProfile::Core);
    gl_attr.set_context_version(3, 3);
    gl_attr.set_depth_size(24);
    gl_attr.set_stencil_size(8);
    let window = video_subsystem
        .window(&config.window.title, config.window.width, config.window.height)
        .resizable()
        .opengl()
        .build()?;
    let _gl_context = window.gl_create_context().map_err(SdlErr)?;
    let interval = if config.window.vsync {
        SwapInterval::VSync
    } else {
        SwapInterval::Immediate
    };
    video_subsystem.gl_set_swap_interval(interval).map_err(SdlErr)?;
    let mut event_pump = sdl_context.event_pump().map_err(SdlErr)?;

    let device = GlDevice::load(|s| video_subsystem.gl_get_proc_address(s) as *const c_void);
    let (width, height) = window.drawable_size();
    let mut context = Context::create(device, &config, width, height)
        .context("failed to set up the scene")?;
    info!("controls: hold the right mouse button to look around, WASD/QE to move");

    'running: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'running,
                Event::Window {
                    win_event: WindowEvent::SizeChanged(..),
                    ..
                } => {
                    let (width, height) = window.drawable_size();
                    context.reshape(width, height)?;
                }
                Event::MouseMotion { x, y, .. } => context.mouse_move(x as f64, y as f64),
                Event::MouseButtonDown {
                    mouse_btn, x, y, ..
                } => {
                    if let Some(button) = mouse_button(mouse_btn) {
                        context.mouse_button(button, true, x as f64, y as f64);
                    }
                }
                Event::MouseButtonUp {
                    mouse_btn, x, y, ..
                } => {
                    if let Some(button) = mouse_button(mouse_btn) {
                        context.mouse_button(button, false, x as f64, y as f64);
                    }
                }
                Event::KeyDown {
                    keycode: Some(keycode),
                    repeat: false,
                    ..
                } => toggle(&mut context, keycode),
                _ => {}
            }
        }

        let keyboard = event_pump.keyboard_state();
        context.process_input(|key| keyboard.is_scancode_pressed(scancode(key)));
        context.render();
        window.gl_swap_window();
    }

    Ok(())
}

fn scancode(key: CameraKey) -> Scancode {
    match key {
        CameraKey::Forward => Scancode::W,
        CameraKey::Backward => Scancode::S,
        CameraKey::Left => Scancode::A,
        CameraKey::Right => Scancode::D,
        CameraKey::Up => Scancode::E,
        CameraKey::Down => Scancode::Q,
    }
}

fn mouse_button(button: mouse::MouseButton) -> Option<MouseButton> {
    match button {
        mouse::MouseButton::Left => Some(MouseButton::Left),
        mouse::MouseButton::Middle => Some(MouseButton::Middle),
        mouse::MouseButton::Right => Some(MouseButton::Right),
        _ => None,
    }
}

/// Function keys flip the scene's switches.
fn toggle(context: &mut Context<GlDevice>, keycode: Keycode) {
    match keycode {
        Keycode::F1 => {
            let tunables = context.tunables_mut();
            tunables.use_ssao = !tunables.use_ssao;
            info!("ssao: {}", tunables.use_ssao);
        }
        Keycode::F2 => {
            let tunables = context.tunables_mut();
            tunables.blend = !tunables.blend;
            info!("blending: {}", tunables.blend);
        }
        Keycode::F3 => {
            let tunables = context.tunables_mut();
            tunables.gamma = if tunables.gamma == 1.0 { 2.2 } else { 1.0 };
            info!("gamma: {}", tunables.gamma);
        }
        Keycode::F4 => {
            let light = context.light_mut();
            light.directional = !light.directional;
            info!("directional light: {}", light.directional);
        }
        Keycode::F5 => {
            let tunables = context.tunables_mut();
            tunables.ssao_radius = if tunables.ssao_radius < 1.0 { 1.0 } else { 0.5 };
            info!("ssao radius: {}", tunables.ssao_radius);
        }
        Keycode::F6 => {
            let tunables = context.tunables_mut();
            tunables.outline_size = if tunables.outline_size > 1.05 { 1.05 } else { 1.1 };
            info!("outline size: {}", tunables.outline_size);
        }
        Keycode::Home => {
            let camera = context.camera_mut();
            camera.yaw = 0.0;
            camera.pitch = -20.0;
        }
        _ => {}
    }
}

#[derive(Debug)]
pub struct SdlErr(String);
impl Display for SdlErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sdl error: {}", self.0)
    }
}
impl Error for SdlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
