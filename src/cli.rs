use std::path::PathBuf;

use clap::Parser;

use crate::image_index::Orientation;
use crate::ui::state::NavMode;

pub const HELP_KEYS: &str = "\
Key Bindings:
  Esc / q       : Quit
  Up / Down     : Previous / next image (row in free scroll)
  Wheel / drag  : Scroll
  0-9           : Type a postcode to jump to it
  m             : Cycle mode (free scroll, snap to image, images only)
  o             : Toggle landscape / portrait images
  f             : Toggle fullscreen
  i             : Toggle info overlay
  ?             : Toggle help overlay
";

#[derive(Parser, Debug)]
#[command(
    name = "postcode-gallery",
    about = "An endless scrolling rolodex of postcodes with matching photographs",
    after_help = HELP_KEYS
)]
pub struct Cli {
    /// Postcode list (postcode,suburb,state per line). Defaults to the built-in list.
    #[arg(short, long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Image asset root; photos under a `portrait` directory are portrait.
    #[arg(short, long, value_name = "DIR", default_value = "assets/images")]
    pub assets: PathBuf,

    /// Follow symbolic links while scanning the asset root
    #[arg(long)]
    pub follow_links: bool,

    /// Password for the gallery gate
    #[arg(
        long,
        env = "POSTCODE_GALLERY_PASSWORD",
        default_value = "postcodes",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub password: String,

    /// Navigation mode at startup
    #[arg(long, value_enum, default_value_t = NavMode::FreeScroll)]
    pub mode: NavMode,

    /// Image orientation at startup
    #[arg(long, value_enum, default_value_t = Orientation::Landscape)]
    pub orientation: Orientation,

    /// Start with touch timings (immediate jumps, short settle) until the mouse moves
    #[arg(long)]
    pub touch: bool,

    /// Memory budget for image cache (e.g. 512MB, 2GB). Default: 10% of RAM.
    #[arg(short, long)]
    pub memory: Option<String>,

    /// Scroll distance per record, in pixels
    #[arg(long, default_value_t = 15.0)]
    pub step: f64,

    /// Print every record with its resolved images and exit
    #[arg(long)]
    pub list: bool,
}

/// Parse sizes like `512MB`, `2GB` or a bare number of megabytes.
pub fn parse_memory_budget(s: &str) -> Option<u64> {
    const MB: f64 = 1024.0 * 1024.0;
    let s = s.trim().to_uppercase();
    let (num, unit) = if let Some(num) = s.strip_suffix("GB") {
        (num, 1024.0 * MB)
    } else if let Some(num) = s.strip_suffix("MB") {
        (num, MB)
    } else {
        (s.as_str(), MB)
    };
    let value: f64 = num.trim().parse().ok()?;
    (value.is_finite() && value > 0.0).then(|| (value * unit) as u64)
}

pub fn default_memory_budget() -> u64 {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    sys.total_memory() / 10
}
