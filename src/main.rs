use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::error;

use mcdos::shell::{create_image, login, Shell};
use mcdos::{init_logger, level_for, FileDisk, FileSystem};

#[derive(Parser)]
#[command(name = "mcdos", about = "A tiny multi-user filesystem living in a disk image")]
struct Args {
    /// Disk image path, created interactively when missing
    image: PathBuf,

    /// Log to stderr, repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(level_for(args.verbose));

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();

    if !args.image.exists() {
        return match create_image(&args.image, &mut input, &mut out) {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                error!("[main] formatting {} failed: {}", args.image.display(), e);
                eprintln!("mcdos: {}", e);
                let _ = std::fs::remove_file(&args.image);
                ExitCode::FAILURE
            }
        };
    }

    let image = args.image.display().to_string();
    let result = FileDisk::open(&args.image)
        .and_then(|disk| FileSystem::mount(Arc::new(disk)))
        .and_then(|fs| login(&fs, &image, &mut input, &mut out))
        .and_then(|session| Shell::new(session, &image).run(&mut input, &mut out));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("[main] session ended: {}", e);
            eprintln!("mcdos: {}", e);
            ExitCode::FAILURE
        }
    }
}
