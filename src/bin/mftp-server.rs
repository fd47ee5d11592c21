//! this binary starts the mftp server
//! to see the list of options, type: `mftp-server --help`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

use clap::{arg_enum, crate_version, value_t, App, Arg};
use mftp::{
    DiskRecorder, FtpError, FtpServer, NaiveThreadPool, RayonThreadPool, Result, SessionOptions,
    SharedQueueThreadPool, ThreadPool,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

arg_enum! {
    #[allow(non_camel_case_types)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Pool {
        naive,
        shared,
        rayon
    }
}

const DEFAULT_ADDRESS: &str = "0.0.0.0:2121";
const DEFAULT_THREADS: &str = "8";
const DEFAULT_MAX_LINE: &str = "8192";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    addr: SocketAddr,
    dir: PathBuf,
    pool: Pool,
    threads: u32,
    max_line: usize,
    idle_timeout: Option<Duration>,
}

impl Opt {
    /// validates the raw command line values
    /// returns `Ok<Opt>` if everything is valid
    /// # Errors
    /// returns [`FtpError::Parsing`] if one of the parameters is invalid
    ///
    fn build(
        addr: &str,
        dir: &str,
        pool: Pool,
        threads: &str,
        max_line: &str,
        idle_timeout: Option<&str>,
    ) -> Result<Opt> {
        let addr: SocketAddr = addr.parse().map_err(|_| {
            FtpError::Parsing(format!("could not parse {} into an IP address and port", &addr))
        })?;
        let threads: u32 = threads
            .parse()
            .ok()
            .filter(|t| *t > 0)
            .ok_or_else(|| FtpError::Parsing(format!("invalid thread count: {}", threads)))?;
        let max_line: usize = max_line
            .parse()
            .ok()
            .filter(|m| *m > 0)
            .ok_or_else(|| FtpError::Parsing(format!("invalid line limit: {}", max_line)))?;
        let idle_timeout = match idle_timeout {
            None => None,
            Some(secs) => {
                let secs: u64 = secs
                    .parse()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| FtpError::Parsing(format!("invalid idle timeout: {}", secs)))?;
                Some(Duration::from_secs(secs))
            }
        };

        Ok(Opt {
            addr,
            dir: PathBuf::from(dir),
            pool,
            threads,
            max_line,
            idle_timeout,
        })
    }
}

fn main() {
    let matches = App::new("mftp-server")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("a multi-threaded mini file-transfer server")
        .arg(Arg::with_name("addr")
            .long("addr")
            .value_name("IP_ADDR:PORT")
            .help("sets the IP_ADDR:PORT that the server listens on")
            .default_value(DEFAULT_ADDRESS))
        .arg(Arg::with_name("dir")
            .long("dir")
            .value_name("PATH")
            .help("working directory for uploaded files, events.log and state.json")
            .default_value("."))
        .arg(Arg::with_name("pool")
            .long("pool")
            .value_name("POOL")
            .help("worker pool: 'naive' (a thread per connection), 'shared' or 'rayon'")
            .possible_values(&Pool::variants())
            .default_value("naive"))
        .arg(Arg::with_name("threads")
            .long("threads")
            .value_name("N")
            .help("number of workers for the 'shared' and 'rayon' pools")
            .default_value(DEFAULT_THREADS))
        .arg(Arg::with_name("max-line")
            .long("max-line")
            .value_name("BYTES")
            .help("longest accepted command line")
            .default_value(DEFAULT_MAX_LINE))
        .arg(Arg::with_name("idle-timeout")
            .long("idle-timeout")
            .value_name("SECS")
            .help("close connections that send no command for this many seconds"))
        .arg(Arg::with_name("log-level")
            .long("log-level")
            .value_name("LEVEL")
            .help("most verbose level written to stderr")
            .possible_values(&LOG_LEVELS)
            .default_value("info"))
        .get_matches();

    // set up a tracing subscriber to log to STDERR
    let level = match value_t!(matches, "log-level", Level) {
        Ok(level) => level,
        Err(err) => err.exit(),
    };
    subscriber_config(level);

    // validate command line options, store them in Opt
    let pool = value_t!(matches, "pool", Pool).unwrap_or(Pool::naive);
    let opt = Opt::build(
        matches.value_of("addr").unwrap_or(DEFAULT_ADDRESS),
        matches.value_of("dir").unwrap_or("."),
        pool,
        matches.value_of("threads").unwrap_or(DEFAULT_THREADS),
        matches.value_of("max-line").unwrap_or(DEFAULT_MAX_LINE),
        matches.value_of("idle-timeout"),
    );
    let opt = match opt {
        Ok(opt) => opt,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };

    // start the server
    if let Err(e) = run(opt) {
        eprintln!("{}", e);
        exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    info!("mftp-server {}", env!("CARGO_PKG_VERSION"));
    info!("Worker pool: {} ({} threads)", opt.pool, opt.threads);
    info!("Working directory: {:?}", opt.dir);

    match opt.pool {
        Pool::naive => run_with_pool(NaiveThreadPool::new(opt.threads)?, opt),
        Pool::shared => run_with_pool(SharedQueueThreadPool::new(opt.threads)?, opt),
        Pool::rayon => run_with_pool(RayonThreadPool::new(opt.threads)?, opt),
    }
}

fn run_with_pool<P: ThreadPool>(pool: P, opt: Opt) -> Result<()> {
    let recorder = DiskRecorder::open(&opt.dir)?;
    let options = SessionOptions {
        root: opt.dir.clone(),
        max_line: opt.max_line,
        idle_timeout: opt.idle_timeout,
    };
    let server = FtpServer::bind(opt.addr, recorder, pool, options)?;

    // SIGINT stops accepting, sessions in flight run to their end
    let shutdown = server.shutdown_handle()?;
    ctrlc::set_handler(move || {
        info!("interrupt received, shutting down");
        shutdown.shutdown();
    })
    .map_err(|e| FtpError::StringErr(format!("could not install the interrupt handler: {}", e)))?;

    server.run()
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config(level: Level) {
    let subscriber = FmtSubscriber::builder()
        // all spans/events at `level` or more severe are written out
        .with_max_level(level)
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        // completes the builder.
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("could not install the log subscriber: {}", e);
    }
}
