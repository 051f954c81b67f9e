//! flashstore CLI
//!
//! Inspect and edit a file-backed flash region from the host.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use flashstore::flash::{FileFlash, RegionDriver};
use flashstore::{Backend, Config, KvStore, Result, Status, StoreError};
use tracing_subscriber::{fmt, EnvFilter};

/// flashstore CLI
#[derive(Parser, Debug)]
#[command(name = "flashstore-cli")]
#[command(about = "Key-value store and image tool for a flash region image")]
#[command(version)]
struct Args {
    /// Flash image file
    #[arg(short, long, default_value = "./flashstore.img")]
    image: PathBuf,

    /// Region size in KB
    #[arg(short, long, default_value = "80")]
    region_kb: usize,

    /// Erase sector size in KB
    #[arg(short, long, default_value = "16")]
    sector_kb: usize,

    /// Compact automatically instead of reporting "sweep required"
    #[arg(long)]
    auto_sweep: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Remove a key
    Rm {
        /// The key to remove
        key: String,
    },

    /// List all keys
    Keys,

    /// Print the number of entries
    Len,

    /// Erase the whole region
    Clear,

    /// Compact the store log
    Sweep,

    /// Program a file into the region as a raw image
    ImageWrite {
        /// File to program
        file: PathBuf,
    },

    /// Print the region header and verify the checksum
    ImageInfo,

    /// Write the verified image payload to stdout
    ImageDump,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,flashstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .image_path(&args.image)
        .region_size(args.region_kb * 1024)
        .sector_size(args.sector_kb * 1024)
        .auto_sweep(args.auto_sweep)
        .build();

    match run(&args.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let status = e.status();
            tracing::error!("{} (status {})", e, status.code());
            ExitCode::from(status_exit_code(status))
        }
    }
}

fn run(command: &Commands, config: &Config) -> Result<()> {
    match command {
        Commands::ImageWrite { file } => {
            let payload = std::fs::read(file)?;
            let mut driver = open_region(config)?;
            driver.begin_program()?;
            driver.program(&payload)?;
            driver.end_program()?;
            println!(
                "programmed {} bytes, checksum {:#010x}",
                driver.data_size(),
                driver.checksum()
            );
        }
        Commands::ImageInfo => {
            let driver = open_region(config)?;
            println!("capacity: {}", driver.capacity());
            if driver.is_erased() {
                println!("state:    erased");
                return Ok(());
            }
            println!("size:     {}", driver.data_size());
            println!("checksum: {:#010x}", driver.checksum());
            driver.verify()?;
            println!("verify:   ok");
        }
        Commands::ImageDump => {
            use std::io::Write;

            let driver = open_region(config)?;
            if let Some(payload) = driver.image()? {
                std::io::stdout().write_all(payload)?;
            }
        }
        Commands::Clear => {
            // Through the driver so a damaged region can always be wiped
            open_region(config)?.clear()?;
            println!("OK");
        }
        kv => run_kv(kv, config)?,
    }
    Ok(())
}

fn run_kv(command: &Commands, config: &Config) -> Result<()> {
    let mut store = Backend::open(config)?;

    match command {
        Commands::Get { key } => {
            let value = store.get_item(key)?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Commands::Set { key, value } => {
            store.set_item(key, value.as_bytes())?;
            println!("OK");
        }
        Commands::Rm { key } => {
            store.remove_item(key)?;
            println!("OK");
        }
        Commands::Keys => {
            for i in 0..store.length()? {
                println!("{}", store.key_at(i)?);
            }
        }
        Commands::Len => println!("{}", store.length()?),
        Commands::Sweep => {
            store.sweep()?;
            println!("OK");
        }
        other => {
            return Err(StoreError::Config(format!(
                "{:?} is not a store command",
                other
            )))
        }
    }
    Ok(())
}

fn open_region(config: &Config) -> Result<RegionDriver<FileFlash>> {
    config.validate()?;
    let device = FileFlash::open(
        &config.image_path,
        config.region_size,
        config.sector_size,
        config.write_size,
    )?;
    RegionDriver::new(device)
}

/// Exit codes follow the status table (1 = error, 2 = sweep, ...)
fn status_exit_code(status: Status) -> u8 {
    status.code().unsigned_abs().min(u8::MAX as u32) as u8
}
