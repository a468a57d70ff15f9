//! Headless CHIP-8 runner.
//!
//! Loads a ROM, runs frames at an uncapped rate and writes the final
//! save state. Display and keypad belong to a real frontend; this tool
//! exists for smoke-testing ROMs and dumping machine state.

use anyhow::{Context, Result};
use clap::Parser;
use emu_chip8::Chip8System;
use emu_core::System;
use std::fs;
use std::fs::File;
use std::io::Write;

#[derive(Parser)]
struct Args {
    /// Path to a CHIP-8 / SuperChip-8 ROM
    rom: String,

    /// Number of frames to run (9 cycles per frame)
    #[arg(long, default_value_t = 600)]
    frames: u32,

    /// Dump save-state to this file as JSON
    #[arg(long)]
    save: Option<String>,

    /// Trace every executed opcode (needs RUST_LOG=debug)
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Suppress the run summary
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let rom = fs::read(&args.rom).with_context(|| format!("reading {}", args.rom))?;

    let mut sys = Chip8System::default();
    sys.mount("ROM", &rom)
        .with_context(|| format!("mounting {}", args.rom))?;
    sys.set_debug(args.debug);

    let mut frames_run = 0;
    for _ in 0..args.frames {
        sys.step_frame()?;
        frames_run += 1;
        if sys.exit_requested() {
            break;
        }
    }

    if !args.quiet {
        let frame = sys.framebuffer();
        let lit = frame.pixels.iter().filter(|&&p| p == 1).count();
        println!(
            "Ran {} frames ({} cycles), {}x{} display, {} pixels lit{}{}",
            frames_run,
            sys.cycles(),
            frame.width,
            frame.height,
            lit,
            if sys.exit_requested() { ", exited" } else { "" },
            if sys.awaiting_key() {
                ", awaiting key"
            } else {
                ""
            },
        );
    }

    if let Some(path) = &args.save {
        let state = sys.save_state();
        let mut f = File::create(path)?;
        write!(f, "{}", serde_json::to_string_pretty(&state)?)?;
    }

    Ok(())
}
