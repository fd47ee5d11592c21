//! The mftp-client executable supports the following command line arguments:
//!
//! `mftp-client hello <NAME> [--addr IP-PORT]`
//!
//!     Greet the server and print its welcome line.
//!
//! `mftp-client list [--addr IP-PORT]`
//!
//!     Print the server's directory listing.
//!
//! `mftp-client put <LOCAL> <REMOTE> [--addr IP-PORT]`
//!
//!     Upload the file LOCAL and store it on the server as REMOTE.
//!
//! `mftp-client get <REMOTE> <LOCAL> [--addr IP-PORT]`
//!
//!     Download REMOTE from the server into the file LOCAL.
//!
//! --addr accepts an IP address, either v4 or v6, and a port number, with the format IP:PORT.
//! If --addr is not specified then connect on 127.0.0.1:2121.
//! Print an error and return a non-zero exit code on server error, or if IP-PORT does not
//! parse as an address.

use std::fs::File;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::exit;

use clap::{crate_version, App, AppSettings, Arg, ArgMatches, SubCommand};
use mftp::{FtpClient, FtpError, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDRESS: &str = "127.0.0.1:2121";

/// the operation requested on the command line
#[derive(Debug)]
enum Action {
    Hello(String),
    List,
    Put { local: PathBuf, remote: String },
    Get { remote: String, local: PathBuf },
}

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    /// the server's ip:port
    addr: SocketAddr,
    action: Action,
}

impl Opt {
    /// validates the `addr` parameter is a valid IP address and PORT
    /// returns `Ok<Opt>` if everything is valid
    /// # Errors
    /// returns [`FtpError::Parsing`] if one of the parameters is invalid
    ///
    fn build(addr: &str, action: Action) -> Result<Opt> {
        let addr: SocketAddr = addr.parse().map_err(|_| {
            FtpError::Parsing(format!("could not parse {} into an IP address and port", &addr))
        })?;

        Ok(Opt { addr, action })
    }
}

fn main() {
    // configure a subscriber that will log messages to STDERR
    subscriber_config();

    let matches = App::new("mftp-client")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("client for the mftp mini file-transfer server")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommands(vec![
            SubCommand::with_name("hello")
                .about("Greet the server")
                .arg(Arg::with_name("NAME").required(true).index(1)),
            SubCommand::with_name("list")
                .about("Print the directory listing"),
            SubCommand::with_name("put")
                .about("Upload a local file")
                .arg(Arg::with_name("LOCAL").required(true).index(1))
                .arg(Arg::with_name("REMOTE").required(true).index(2)),
            SubCommand::with_name("get")
                .about("Download a remote file")
                .arg(Arg::with_name("REMOTE").required(true).index(1))
                .arg(Arg::with_name("LOCAL").required(true).index(2)),
        ])
        .arg(Arg::with_name("addr")
            .long("addr")
            .value_name("IP_ADDR:PORT")
            .help("sets the IP_ADDR:PORT of the server to connect to")
            .default_value(DEFAULT_ADDRESS)
            .global(true))
        .get_matches();

    // parse commands into an Opt struct, then run it
    if let Err(e) = parse_options(&matches).and_then(run) {
        eprintln!("{}", e);
        exit(1);
    }
}

/// runs the requested action on an [`FtpClient`]
/// `opt` contains the server address and the action to execute
fn run(opt: Opt) -> Result<()> {
    let mut client = FtpClient::connect(opt.addr)?;
    match opt.action {
        Action::Hello(name) => {
            println!("{}", client.hello(Some(&name))?);
        }
        Action::List => {
            for name in client.list()? {
                println!("{}", name);
            }
        }
        Action::Put { local, remote } => {
            let mut file = File::open(&local)?;
            let size = file.metadata()?.len();
            client.put_from(&remote, &mut file, size)?;
            println!("PUT complete: {} ({} bytes)", remote, size);
        }
        Action::Get { remote, local } => {
            // the local file is only created once the server has the remote one
            let size = client.get_with(&remote, |_| Ok(File::create(&local)?))?;
            println!("GET complete: {:?} ({} bytes)", local, size);
        }
    }
    client.quit()?;
    Ok(())
}

/// parses the matches from the command line into an [`Opt`] struct
fn parse_options(matches: &ArgMatches) -> Result<Opt> {
    let addr = matches.value_of("addr").unwrap_or(DEFAULT_ADDRESS);
    let arg = |args: &ArgMatches, name: &str| -> Result<String> {
        args.value_of(name)
            .map(String::from)
            .ok_or_else(|| FtpError::Parsing(format!("missing argument {}", name)))
    };
    let action = match matches.subcommand() {
        ("hello", Some(args)) => Action::Hello(arg(args, "NAME")?),
        ("list", Some(_)) => Action::List,
        ("put", Some(args)) => Action::Put {
            local: PathBuf::from(arg(args, "LOCAL")?),
            remote: arg(args, "REMOTE")?,
        },
        ("get", Some(args)) => Action::Get {
            remote: arg(args, "REMOTE")?,
            local: PathBuf::from(arg(args, "LOCAL")?),
        },
        (other, _) => return Err(FtpError::Parsing(format!("unknown command: {}", other))),
    };
    // subcommand arguments shadow the global default
    let addr = matches
        .subcommand()
        .1
        .and_then(|args| args.value_of("addr"))
        .unwrap_or(addr);
    Opt::build(addr, action)
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config() {
    let subscriber = FmtSubscriber::builder()
        // the client only reports problems
        .with_max_level(Level::WARN)
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        // completes the builder.
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("could not install the log subscriber: {}", e);
    }
}
