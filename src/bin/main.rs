use std::error::Error;
use std::process::ExitCode;

use hive_daemon::cli::Cli;
use hive_daemon::config::{HiveSpecLoader, HiveSpecLoaderFile};
use hive_daemon::event::{self, EVENT_CHANNEL_CAPACITY};
use hive_daemon::logging::Logging;
use hive_daemon::machine::MachineMeta;
use hive_daemon::sequence;
use hive_daemon::store::{MessageBatcher, MongoStore};
use hive_daemon::supervisor::Supervisor;
use tracing::{info, warn};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // the subscriber may not be installed yet, so plain stderr
            eprintln!("hive-daemon: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    // a `.env` in the working directory may carry MONGODB_URI
    let _ = dotenvy::dotenv();
    Logging::try_init()?;

    let cli = Cli::init_hive_cli();
    let spec = HiveSpecLoaderFile::new(cli.spec_path()).load()?;
    info!(
        hive = %spec.metadata.name,
        processes = spec.spec.processes.len(),
        replicas = spec.replica_count(),
        "loaded hive spec"
    );

    // fail on unallocatable sequences before anything is started
    sequence::validate_allocation(&spec)?;

    let machine = MachineMeta::snapshot();
    let store = MongoStore::from_env()?;

    let (publisher, consumer) = event::channel(EVENT_CHANNEL_CAPACITY);
    let batcher = MessageBatcher::new(store, spec.clone(), machine).start(consumer)?;

    let supervisor = Supervisor::new(spec, publisher);
    supervisor.install_signal_handler()?;
    supervisor.run()?;

    info!("draining pending messages");
    if batcher.flush() {
        batcher.join();
    } else {
        warn!("flush did not complete in time, residual messages are lost");
    }
    Ok(())
}
