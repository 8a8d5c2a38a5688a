mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use crossterm::style::{Color, Stylize, style};
use shutter_core::hid::ConsumerKey;
use shutter_core::indicator::Rgb;

use session::{Output, OutputKind, Session, SessionConfig};

const USAGE: &str =
    "Usage: shutter-emulator [--transcript <path>] [--tick-ms <n>] [--key <volume-up|volume-down>]";

fn main() -> io::Result<()> {
    let config = parse_config(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(&config)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Shutter remote emulator ready. Type `help` for console commands, `:help` for simulation controls, or `exit` to quit."
    )?;
    for output in session.boot()? {
        writeln!(writer, "{}", render(&output))?;
    }

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for output in session.handle_line(trimmed)? {
            writeln!(writer, "{}", render(&output))?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn render(output: &Output) -> String {
    let color = match output.kind {
        OutputKind::Reply { ok: true } => Color::Green,
        OutputKind::Reply { ok: false } | OutputKind::Error => Color::Red,
        OutputKind::Pulse(Rgb { r, g, b }) => Color::Rgb { r, g, b },
        OutputKind::Report => Color::Cyan,
        OutputKind::Link => Color::Blue,
        OutputKind::Telemetry | OutputKind::Info => Color::DarkGrey,
    };
    style(&output.text).with(color).to_string()
}

fn parse_config<I>(mut args: I) -> Result<SessionConfig, String>
where
    I: Iterator<Item = String>,
{
    let mut config = SessionConfig::default();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--transcript" => config.transcript = PathBuf::from(value()?),
            "--tick-ms" => {
                let raw = value()?;
                let millis = raw
                    .parse::<u64>()
                    .ok()
                    .filter(|millis| *millis > 0)
                    .ok_or_else(|| format!("Invalid tick `{raw}`; expected a positive integer"))?;
                config.tick = Duration::from_millis(millis);
            }
            "--key" => {
                let raw = value()?;
                config.shutter.key = parse_key(&raw)?;
            }
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    Ok(config)
}

fn parse_key(tag: &str) -> Result<ConsumerKey, String> {
    if tag.eq_ignore_ascii_case("volume-up") {
        Ok(ConsumerKey::VolumeUp)
    } else if tag.eq_ignore_ascii_case("volume-down") {
        Ok(ConsumerKey::VolumeDown)
    } else {
        Err(format!("Unknown key `{tag}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> impl Iterator<Item = String> {
        line.split_whitespace()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn defaults_without_flags() {
        let config = parse_config(args("")).expect("defaults");
        assert_eq!(config.tick, session::DEFAULT_TICK);
        assert_eq!(config.shutter.key, ConsumerKey::VolumeDown);
    }

    #[test]
    fn flags_accept_both_spellings() {
        let config =
            parse_config(args("--tick-ms=20 --transcript /tmp/x.log --key volume-up"))
                .expect("flags");
        assert_eq!(config.tick, Duration::from_millis(20));
        assert_eq!(config.transcript, PathBuf::from("/tmp/x.log"));
        assert_eq!(config.shutter.key, ConsumerKey::VolumeUp);
    }

    #[test]
    fn bad_flags_are_rejected() {
        assert!(parse_config(args("--tick-ms 0")).is_err());
        assert!(parse_config(args("--tick-ms")).is_err());
        assert!(parse_config(args("--key shutter")).is_err());
        assert!(parse_config(args("--verbose")).is_err());
    }
}
