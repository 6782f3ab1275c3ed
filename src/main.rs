use std::process::ExitCode;

use wgpu_portals::error::AppError;
use wgpu_portals::settings::RenderSettings;

fn headless_frames() -> Option<u32> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--headless" {
            return Some(args.next().and_then(|n| n.parse().ok()).unwrap_or(1));
        }
    }
    None
}

fn run_headless(frames: u32) -> Result<(), AppError> {
    wgpu_portals::init_logging();
    let settings = RenderSettings::load();
    let stats = wgpu_portals::run_headless(&settings, frames)?;
    for (index, frame) in stats.iter().enumerate() {
        println!(
            "frame {index}: {} passes, {} draws ({} shadow), {} binds ({} skipped)",
            frame.passes,
            frame.draw_calls,
            frame.shadow_draw_calls,
            frame.technique_binds,
            frame.skipped_binds
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let result = match headless_frames() {
        Some(frames) => run_headless(frames),
        None => wgpu_portals::run(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Application error: {err}");
            ExitCode::FAILURE
        }
    }
}
