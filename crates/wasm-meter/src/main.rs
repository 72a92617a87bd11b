use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use wasm_meter::{
    inspect, load_cost_table, meter_wasm, roundtrip, MeterOptions, MeteringOptions, RegisterType,
};

/// wasm-meter: inject gas metering into WebAssembly modules.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Print debug diagnostics (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Instrument a module with calls to a metering import
    Meter {
        /// Input WebAssembly binary (.wasm)
        input: PathBuf,

        /// Output file for the metered module (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// JSON cost table (the bundled table if omitted)
        #[arg(long)]
        cost_table: Option<PathBuf>,

        /// Import module name of the metering function
        #[arg(long, default_value = "metering")]
        module: String,

        /// Import field name of the metering function
        #[arg(long, default_value = "usegas")]
        field: String,

        /// Type of the cost argument: i32, i64, f32 or f64
        #[arg(long, default_value = "i64")]
        register_type: RegisterType,
    },

    /// Decode and re-encode a module, checking the bytes are unchanged
    Roundtrip {
        /// Input WebAssembly binary (.wasm)
        input: PathBuf,
    },

    /// List the sections of a module
    Inspect {
        /// Input WebAssembly binary (.wasm)
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Meter {
            input,
            output,
            cost_table,
            module,
            field,
            register_type,
        } => {
            eprintln!("wasm-meter: metering {}", input.display());
            let wasm = read_wasm(&input)?;

            let cost_model = match cost_table {
                Some(path) => Some(load_cost_table(&path)?),
                None => None,
            };
            let options = MeterOptions {
                metering: MeteringOptions {
                    module_name: module,
                    field_name: field,
                    register_type,
                },
                cost_model,
            };

            let (metered, gas) = meter_wasm(&wasm, &options).context("metering failed")?;

            if let Some(output_path) = output {
                fs::write(&output_path, &metered)
                    .with_context(|| format!("failed to write {}", output_path.display()))?;
                eprintln!("wasm-meter: wrote {}", output_path.display());
            } else {
                std::io::stdout()
                    .write_all(&metered)
                    .context("failed to write to stdout")?;
            }
            eprintln!("wasm-meter: total gas {gas}");
        }
        Command::Roundtrip { input } => {
            let wasm = read_wasm(&input)?;
            let encoded = roundtrip(&wasm).context("round trip failed")?;
            if encoded != wasm {
                let offset = wasm
                    .iter()
                    .zip(&encoded)
                    .position(|(a, b)| a != b)
                    .unwrap_or(wasm.len().min(encoded.len()));
                bail!(
                    "{}: re-encoded module differs at byte {offset} ({} bytes in, {} bytes out)",
                    input.display(),
                    wasm.len(),
                    encoded.len()
                );
            }
            eprintln!("wasm-meter: {} round-trips ({} bytes)", input.display(), wasm.len());
        }
        Command::Inspect { input } => {
            let wasm = read_wasm(&input)?;
            for section in inspect(&wasm)? {
                println!("{section}");
            }
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn read_wasm(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}
