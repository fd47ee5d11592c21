//! Parsing of client command lines, and the replies the server sends back.
use std::fmt;

/// The request "commands" a client can send, parsed from a single line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// end the session
    Quit,
    /// greet the server, `name` defaults to `guest`
    Hello {
        /// the name to welcome
        name: String,
    },
    /// request the (fixed) directory listing
    List,
    /// upload `size` bytes into `file`; the payload follows the `150` reply
    Put {
        /// target file name
        file: String,
        /// declared payload size
        size: u64,
    },
    /// a `PUT` line with a missing or unacceptable filename or size
    BadPut,
    /// download `file`
    Get {
        /// requested file name
        file: String,
    },
    /// anything else, carrying the raw line
    Unknown(String),
}

impl Command {
    /// parses a line (already stripped of `\r` and `\n`) into a `Command`.
    /// Commands are case sensitive.
    pub fn parse(line: &str) -> Command {
        if line == "QUIT" {
            Command::Quit
        } else if line.starts_with("HELLO") {
            let name = line
                .get(6..)
                .filter(|name| !name.is_empty())
                .unwrap_or("guest");
            Command::Hello {
                name: name.to_string(),
            }
        } else if line == "LIST" {
            Command::List
        } else if line.starts_with("PUT ") {
            let mut tokens = line.split_whitespace().skip(1);
            let file = tokens.next().unwrap_or_default();
            let size = tokens.next().and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
            if size == 0 || !is_plain_file_name(file) {
                Command::BadPut
            } else {
                Command::Put {
                    file: file.to_string(),
                    size,
                }
            }
        } else if line.starts_with("GET ") {
            let file = line.split_whitespace().nth(1).unwrap_or_default();
            Command::Get {
                file: file.to_string(),
            }
        } else {
            Command::Unknown(line.to_string())
        }
    }
}

/// true if `name` refers to an entry directly inside the working directory: non-empty,
/// no path separators, and not one of the special `.`/`..` entries
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(|c: char| c == '/' || c == '\\')
}

/// The replies the server sends. `Display` renders the reply without its final `\r\n`,
/// [`Reply::to_wire`] adds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `200 WELCOME <name>`
    Welcome(String),
    /// the fixed, multi-line directory listing block
    Listing,
    /// `150 Ready to receive`
    ReadyToReceive,
    /// `226 Transfer complete`
    TransferComplete,
    /// `426 Connection closed; transfer incomplete`
    TransferIncomplete,
    /// `500 PUT usage: PUT <filename> <size>`
    PutUsage,
    /// `550 File not found`
    FileNotFound,
    /// `550 Cannot create file`
    CannotCreate,
    /// `SIZE <n>`, announces a download payload
    Size(u64),
    /// `221 Goodbye`
    Goodbye,
    /// `500 Unknown command`
    UnknownCommand,
}

/// the file names of the stub directory listing
pub const LISTING: [&str; 2] = ["file1.txt", "file2.png"];

impl Reply {
    /// the reply as sent on the wire, terminated by `\r\n`
    pub fn to_wire(&self) -> String {
        format!("{}\r\n", self)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Welcome(name) => write!(f, "200 WELCOME {}", name),
            Reply::Listing => {
                write!(f, "150 Here comes the directory listing")?;
                for name in LISTING.iter() {
                    write!(f, "\r\n{}", name)?;
                }
                write!(f, "\r\n{}", Reply::TransferComplete)
            }
            Reply::ReadyToReceive => f.write_str("150 Ready to receive"),
            Reply::TransferComplete => f.write_str("226 Transfer complete"),
            Reply::TransferIncomplete => f.write_str("426 Connection closed; transfer incomplete"),
            Reply::PutUsage => f.write_str("500 PUT usage: PUT <filename> <size>"),
            Reply::FileNotFound => f.write_str("550 File not found"),
            Reply::CannotCreate => f.write_str("550 Cannot create file"),
            Reply::Size(n) => write!(f, "SIZE {}", n),
            Reply::Goodbye => f.write_str("221 Goodbye"),
            Reply::UnknownCommand => f.write_str("500 Unknown command"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hello_names() {
        assert_eq!(Command::parse("HELLO alice"), Command::Hello { name: "alice".into() });
        assert_eq!(Command::parse("HELLO"), Command::Hello { name: "guest".into() });
        assert_eq!(Command::parse("HELLO "), Command::Hello { name: "guest".into() });
        assert_eq!(
            Command::parse("HELLO two words"),
            Command::Hello { name: "two words".into() }
        );
    }

    #[test]
    fn commands_are_case_sensitive() {
        assert_eq!(Command::parse("quit"), Command::Unknown("quit".into()));
        assert_eq!(Command::parse("List"), Command::Unknown("List".into()));
        assert_eq!(Command::parse("QUIT "), Command::Unknown("QUIT ".into()));
    }

    #[test]
    fn parses_put() {
        assert_eq!(
            Command::parse("PUT hello.bin 5"),
            Command::Put { file: "hello.bin".into(), size: 5 }
        );
        assert_eq!(
            Command::parse("PUT  spaced.bin   12 extra"),
            Command::Put { file: "spaced.bin".into(), size: 12 }
        );
    }

    #[test]
    fn rejects_bad_put() {
        assert_eq!(Command::parse("PUT "), Command::BadPut);
        assert_eq!(Command::parse("PUT a.bin"), Command::BadPut);
        assert_eq!(Command::parse("PUT a.bin 0"), Command::BadPut);
        assert_eq!(Command::parse("PUT a.bin lots"), Command::BadPut);
        assert_eq!(Command::parse("PUT a.bin -3"), Command::BadPut);
        assert_eq!(Command::parse("PUT ../etc/passwd 3"), Command::BadPut);
        assert_eq!(Command::parse("PUT dir\\x 3"), Command::BadPut);
        assert_eq!(Command::parse("PUT .. 3"), Command::BadPut);
        // without the trailing space it is not a PUT at all
        assert_eq!(Command::parse("PUT"), Command::Unknown("PUT".into()));
    }

    #[test]
    fn parses_get() {
        assert_eq!(Command::parse("GET payload"), Command::Get { file: "payload".into() });
        assert_eq!(Command::parse("GET "), Command::Get { file: "".into() });
    }

    #[test]
    fn renders_replies() {
        assert_eq!(Reply::Welcome("bob".into()).to_wire(), "200 WELCOME bob\r\n");
        assert_eq!(Reply::Size(7).to_wire(), "SIZE 7\r\n");
        assert_eq!(
            Reply::Listing.to_wire(),
            "150 Here comes the directory listing\r\nfile1.txt\r\nfile2.png\r\n226 Transfer complete\r\n"
        );
        assert_eq!(
            Reply::TransferIncomplete.to_wire(),
            "426 Connection closed; transfer incomplete\r\n"
        );
    }
}
