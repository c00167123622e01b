use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;

use rgs::config::Config;
use rgs::distribute::{make_slab, share_config};
use rgs::error::Error;
use rgs::message::comm::Communicator;
use rgs::message::local::LocalCommunicator;
use rgs::message::tcp::TcpCommunicator;
use rgs::solver::{Relaxation, Solver};

#[derive(Debug, Parser)]
#[clap(version = "0.1", author = "J. Zrake <jzrake@clemson.edu>")]
#[clap(about = "Run the gas solver on a grid split across ranks")]
struct Opts {
    /// Rank of this process in the peer list
    #[clap(short, long, default_value = "0")]
    rank: usize,

    /// Listen address of every rank, in rank order, comma separated
    #[clap(short, long, value_delimiter = ',')]
    peers: Vec<SocketAddr>,

    /// Run this many ranks as threads of one process instead
    #[clap(long)]
    local: Option<usize>,

    /// Named run preset (more_bigger, debug_1)
    #[clap(long, default_value = "more_bigger")]
    preset: String,

    /// Read the run configuration from a CBOR file instead of a preset
    #[clap(long)]
    config_file: Option<PathBuf>,

    #[clap(long)]
    width: Option<usize>,

    #[clap(long)]
    height: Option<usize>,

    #[clap(long)]
    iterations: Option<usize>,

    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

impl Opts {
    fn resolve_config(&self) -> Result<Config, Error> {
        let mut config = match &self.config_file {
            Some(path) => Config::load(path)?,
            None => Config::preset(&self.preset)?,
        };
        if let Some(width) = self.width {
            config.grid_size.0 = width;
        }
        if let Some(height) = self.height {
            config.grid_size.1 = height;
        }
        if let Some(iterations) = self.iterations {
            config.max_iteration = iterations;
        }
        config.validate()?;
        Ok(config)
    }
}

fn run_rank<C: Communicator>(comm: &C, opts: &Opts) -> Result<(), Error> {
    let config = if comm.is_coordinator() {
        info!("starting with {} ranks", comm.size());
        Some(opts.resolve_config()?)
    } else {
        None
    };
    let config = share_config(comm, config)?;
    let slab = make_slab(comm, &config)?;

    Solver::new(comm, &config, slab, Relaxation).run()
}

fn run(opts: &Opts) -> Result<(), Error> {
    if let Some(size) = opts.local {
        if size == 0 {
            return Err(Error::Config("--local needs at least one rank".into()));
        }
        return LocalCommunicator::run_group(size, |comm| run_rank(&comm, opts))
            .into_iter()
            .collect();
    }

    if opts.peers.len() <= 1 {
        let comm = LocalCommunicator::group(1).remove(0);
        return run_rank(&comm, opts);
    }

    let comm = TcpCommunicator::bind(opts.rank, opts.peers.clone())?;
    run_rank(&comm, opts)
}

fn main() {
    let opts = Opts::parse();

    if let Err(e) = SimpleLogger::new().with_level(opts.log_level).init() {
        eprintln!("could not install logger: {}", e);
    }

    if let Err(e) = run(&opts) {
        error!("{}", e);
        process::exit(1);
    }
}
