//! tau-emu: functional emulator for the TAU fp32 tensor co-processor

use std::path::Path;

use tau_emu::config::Config;
use tau_emu::testing::{self, JobDump};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let mut rest = args[1..].iter().map(|s| s.as_str());

    match rest.next() {
        Some("gen-vectors") => {
            let dir = rest
                .next()
                .map(str::to_string)
                .unwrap_or_else(|| Config::get().vector_dir());
            println!("Generating test vectors into {}", dir);
            testing::run_suite(Path::new(&dir))?;
            Ok(())
        }

        Some("show-job") => {
            let path = match rest.next() {
                Some(p) => p,
                None => {
                    eprintln!("usage: tau-emu show-job FILE");
                    std::process::exit(2);
                }
            };
            let text = std::fs::read_to_string(path)?;
            let dump = JobDump::parse(&text)?;
            print!("{}", dump);
            Ok(())
        }

        Some("config") => {
            if let Some(path) = Config::user_config_path() {
                println!("User config path: {}", path.display());
            }
            println!();
            print!("{}", Config::sample());
            Ok(())
        }

        _ => {
            eprintln!("tau-emu - TAU tensor co-processor emulator");
            eprintln!();
            eprintln!("usage:");
            eprintln!("  tau-emu gen-vectors [OUTDIR]   generate the RTL test-vector suite");
            eprintln!("  tau-emu show-job FILE          decode and print a job dump");
            eprintln!("  tau-emu config                 print config path and a sample file");
            std::process::exit(2);
        }
    }
}
