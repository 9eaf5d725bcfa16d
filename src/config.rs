use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use log::error;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

/// Where the GIF bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Url(String),
    Path(PathBuf),
}

impl Source {
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            Self::Url(s.to_owned())
        } else {
            Self::Path(PathBuf::from(s))
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    pub source: Option<Source>,
    /// Time between frames.
    pub delay: Duration,
    /// Start playing as soon as frames are loaded.
    pub render_gif: bool,
    /// Size of the composite surface; the GIF's logical screen when unset.
    pub canvas_size: Option<(u32, u32)>,
    /// Stop stepping after the first completed loop.
    pub run_once: bool,
    /// Wait each frame's own delay instead of `delay` when it has one.
    pub use_frame_delays: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            source: None,
            delay: DEFAULT_DELAY,
            render_gif: true,
            canvas_size: None,
            run_once: false,
            use_frame_delays: false,
        }
    }
}

/// Command line options of the viewer.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub config: PlayerConfig,
    pub paused: bool,
}

impl Args {
    // parse arguments, return set of unrecognized args
    pub fn parse(args: &[String]) -> (Self, BTreeSet<String>) {
        let mut unrecognized_args = BTreeSet::new();
        let mut res = Args::default();

        let mut i = 0;
        let len = args.len();
        while i < len {
            let arg = &args[i];

            if arg == "--delay" {
                i += 1;
                match args.get(i).map(|ms| ms.parse::<u64>()) {
                    Some(Ok(ms)) => res.config.delay = Duration::from_millis(ms),
                    Some(Err(err)) => error!("failed to parse --delay: {err}"),
                    None => error!("delay argument missing?"),
                }
            } else if arg == "--size" {
                i += 1;
                let Some(size) = args.get(i) else {
                    error!("size argument missing?");
                    continue;
                };
                match parse_size(size) {
                    Some(size) => res.config.canvas_size = Some(size),
                    None => error!("failed to parse --size '{size}', expected WIDTHxHEIGHT"),
                }
            } else if arg == "--paused" {
                res.paused = true;
            } else if arg == "--once" {
                res.config.run_once = true;
            } else if arg == "--frame-delays" {
                res.config.use_frame_delays = true;
            } else if arg.starts_with("--") || res.config.source.is_some() {
                unrecognized_args.insert(arg.clone());
            } else {
                res.config.source = Some(Source::parse(arg));
            }

            i += 1;
        }

        (res, unrecognized_args)
    }
}

fn parse_size(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}
