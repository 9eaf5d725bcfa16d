use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use gifreel::{Args, GifPlayer};
use log::{debug, error, info, warn};
use pixels::{Pixels, SurfaceTexture};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

const TITLE: &str = "gifreel";
/// Window size until the first frame arrives.
const INITIAL_SIZE: (u32, u32) = (320, 240);

#[derive(thiserror::Error, Debug)]
enum ViewerError {
    #[error("window error: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("pixels error: {0}")]
    Pixels(#[from] pixels::Error),
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (args, unrecognized) = Args::parse(&args);
    for arg in &unrecognized {
        warn!("unrecognized argument: {arg}");
    }
    if args.config.source.is_none() {
        eprintln!(
            "usage: gifreel [--delay MS] [--size WxH] [--paused] [--once] [--frame-delays] <url|file>"
        );
        std::process::exit(2);
    }

    if let Err(err) = run(args) {
        error!("{err}");
        std::process::exit(1);
    }
}

fn new_pixels(window: &Window, width: u32, height: u32) -> Result<Pixels, pixels::Error> {
    let size = window.inner_size();
    let surface_texture = SurfaceTexture::new(size.width, size.height, window);
    Pixels::new(width, height, surface_texture)
}

fn run(args: Args) -> Result<(), ViewerError> {
    let (width, height) = args.config.canvas_size.unwrap_or(INITIAL_SIZE);

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title(TITLE)
        .with_inner_size(LogicalSize::new(width as f64, height as f64))
        .build(&event_loop)?;
    let mut pixels = new_pixels(&window, width, height)?;
    let mut buffer_size = (width, height);

    let mut player: GifPlayer = GifPlayer::new(args.config);
    if args.paused {
        player.pause();
    }

    let dirty = Rc::new(Cell::new(false));
    let flag = dirty.clone();
    player.on_frame_change(move |change| {
        debug!("frame {}/{}", change.current_index + 1, change.total_frames);
        flag.set(true);
    });
    player.on_loop_complete(|iteration, total| {
        info!("finished loop {iteration} of {total} frames");
    });
    player.load(|| debug!("load finished"));

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        match event {
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => {
                player.stop_parsing_gif();
                *control_flow = ControlFlow::Exit;
            }
            Event::WindowEvent {
                event:
                    WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                state: ElementState::Pressed,
                                virtual_keycode: Some(key),
                                ..
                            },
                        ..
                    },
                ..
            } => match key {
                VirtualKeyCode::Escape => {
                    player.stop_parsing_gif();
                    *control_flow = ControlFlow::Exit;
                }
                VirtualKeyCode::Space => {
                    if player.is_playing() {
                        player.pause();
                    } else {
                        player.play();
                    }
                    info!("playing: {}", player.is_playing());
                }
                _ => {}
            },
            Event::WindowEvent {
                event: WindowEvent::Resized(size),
                ..
            } => {
                pixels.resize_surface(size.width, size.height);
            }
            Event::MainEventsCleared => window.request_redraw(),
            Event::RedrawRequested(_) => {
                // one poll per refresh
                player.tick(Instant::now());

                if dirty.replace(false) {
                    if let Some(image) = player.image() {
                        let size = (image.width, image.height);
                        if size != buffer_size {
                            info!("canvas is {}x{}", size.0, size.1);
                            window.set_inner_size(LogicalSize::new(size.0 as f64, size.1 as f64));
                            pixels.resize_buffer(size.0, size.1);
                            buffer_size = size;
                        }

                        let frame = pixels.frame_mut();
                        if frame.len() == image.data.len() {
                            frame.copy_from_slice(&image.data);
                        }
                    }
                }

                if let Err(err) = pixels.render() {
                    error!("pixels.render() failed: {err}");
                    player.stop_parsing_gif();
                    *control_flow = ControlFlow::Exit;
                }
            }
            _ => {}
        }
    });
}
