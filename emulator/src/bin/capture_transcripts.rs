use std::io;
use std::path::PathBuf;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, SessionConfig};

const SCENARIOS: &[(&str, &[&str])] = &[
    (
        "link",
        &[
            "status",
            "shoot",
            ":connect",
            ":connect",
            "status",
            "shoot now",
            ":disconnect",
            "shoot",
            ":log",
        ],
    ),
    (
        "interval",
        &[
            ":connect",
            "shoot every 5",
            ":advance 16",
            "status",
            "shoot after 3s",
            ":advance 4",
            "shoot every 0",
            "cancel",
            ":log",
        ],
    ),
    (
        "button",
        &[
            ":press",
            ":release",
            ":connect",
            ":press",
            ":advance 2",
            ":release",
            "help",
            "help shoot",
            "help focus",
            ":log",
        ],
    ),
];

fn main() -> io::Result<()> {
    for (name, script) in SCENARIOS {
        record(name, script)?;
    }
    Ok(())
}

fn record(name: &str, script: &[&str]) -> io::Result<()> {
    let config = SessionConfig {
        transcript: PathBuf::from(format!("transcripts/emulator-{name}.log")),
        ..SessionConfig::default()
    };
    let mut session = Session::new(&config)?;
    session.boot()?;
    for line in script {
        let _ = session.handle_line(line)?;
    }
    Ok(())
}
