use std::io;
use std::path::Path;

use rover_core::config::ControlConfig;

#[allow(dead_code)]
#[path = "../script.rs"]
mod script;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::Session;

const MANUAL_DRIVE: &[&str] = &[
    "pulse mode 1000",
    "pulse steer 1350",
    "pulse drive 1900",
    "tick 10",
    "status",
    "pulse steer 1800",
    "tick 40",
    "status",
    "pulse drive 1000",
    "tick 10",
    "status",
];

const AUTONOMOUS: &[&str] = &[
    "pulse mode 1000",
    "send fL",
    "tick",
    "send aLf",
    "tick",
    "status",
    "send b",
    "tick 5",
    "status",
    "pulse mode 2000",
    "tick 5",
    "status",
];

fn main() -> io::Result<()> {
    record(Path::new("transcripts/manual-drive.log"), MANUAL_DRIVE)?;
    record(Path::new("transcripts/autonomous.log"), AUTONOMOUS)?;
    Ok(())
}

fn record(path: &Path, script: &[&str]) -> io::Result<()> {
    let mut session = Session::new(ControlConfig::DEFAULT)
        .map_err(|err| io::Error::other(err.to_string()))?
        .with_transcript(path)?;
    for line in script {
        session.handle_line(line)?;
    }
    println!("wrote {}", path.display());
    Ok(())
}
