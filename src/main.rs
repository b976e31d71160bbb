use std::env;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};

use hybrid_assembly_pipelines::cli::parse;
use hybrid_assembly_pipelines::config::defs::RunConfig;
use hybrid_assembly_pipelines::pipelines::hybrid_assembly;
use hybrid_assembly_pipelines::utils::system::{physical_cores, thread_advisory};


#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n Hybrid Assembly\n-------------\n");

    let dir = env::current_dir()?;

    let run_config = match RunConfig::from_args(&args, &dir) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Pipeline failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
            std::process::exit(1);
        }
    };
    if let Some(warning) = thread_advisory(run_config.threads, physical_cores()) {
        warn!("{}", warning);
    }

    match hybrid_assembly::run(run_config).await {
        Ok(final_fasta) => {
            info!("Final assembly written to {}", final_fasta.display());
        }
        Err(e) => {
            error!("Pipeline failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
            std::process::exit(1);
        }
    }

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}
