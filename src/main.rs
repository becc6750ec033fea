use std::io;
use std::thread;

use anyhow::{anyhow, Context};
use clap::Parser;
use log::{error, info};

use chipvm::cli::Args;
use chipvm::display;
use chipvm::memory::read_rom;
use chipvm::window::Screen;
use chipvm::{Emulator, Headless, State};

fn main() {
    env_logger::init();

    if let Err(e) = run(Args::parse()) {
        error!("{e:#}");
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let rom = read_rom(args.program_path()?)?;

    if !args.is_display() {
        let mut emu = Emulator::new(Headless, args.config());
        emu.load_rom(&rom)?;
        emu.run(&mut io::stdout().lock())?;
        return Ok(());
    }

    let (client, server) = display::channel();
    let mut emu = Emulator::new(client, args.config());
    emu.load_rom(&rom)?;
    let screen = Screen::new(server, args.keymap()).context("failed to open display")?;

    // the window has to stay on this thread, so the machine gets its own
    let machine = thread::spawn(move || emu.run(&mut io::sink()));
    screen.show()?;

    let state: State = machine
        .join()
        .map_err(|_| anyhow!("interpreter thread panicked"))??;
    info!("finished in state {state:?}");
    Ok(())
}
