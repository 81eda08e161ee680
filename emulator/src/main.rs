mod live;
mod script;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use rover_core::config::ControlConfig;
use session::{Flow, Session};

const USAGE: &str = "Usage: rover-emulator [--live] [--debug] [--transcript <path>]";

#[derive(Debug, Default)]
struct Options {
    live: bool,
    debug_frames: bool,
    transcript: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let mut session = Session::new(ControlConfig::DEFAULT)
        .unwrap_or_else(|err| {
            eprintln!("invalid configuration: {err}");
            process::exit(2);
        })
        .with_debug_frames(options.debug_frames);
    if let Some(path) = &options.transcript {
        session = session.with_transcript(path)?;
    }

    if options.live {
        return live::run(&mut session);
    }

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "Rover Controller Emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let (flow, responses) = session.handle_line(&line)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
        if flow == Flow::Exit {
            break;
        }
    }

    Ok(())
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options::default();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--live" {
            options.live = true;
        } else if arg == "--debug" {
            options.debug_frames = true;
        } else if let Some(value) = arg.strip_prefix("--transcript=") {
            options.transcript = Some(PathBuf::from(value));
        } else if arg == "--transcript" {
            let value = args
                .next()
                .ok_or_else(|| "Expected value after --transcript".to_string())?;
            options.transcript = Some(PathBuf::from(value));
        } else {
            return Err(format!("Unknown argument `{arg}`"));
        }
    }
    Ok(options)
}
