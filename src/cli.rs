//! Hand-rolled argument parsing shared by both binaries.
//!
//! Recognised: `-h/--help`, `-f/--config <PATH>`, `-v` (repeatable, or
//! `-vv`…), `--verbose`. Unknown arguments are ignored.

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub help: bool,
    pub config_path: Option<String>,
    /// Level forced by `-v` flags; `None` means "use config".
    pub log_level: Option<&'static str>,
}

pub fn parse_from<I>(args: I) -> Result<CliArgs, String>
where
    I: IntoIterator<Item = String>,
{
    let mut out = CliArgs::default();
    let mut verbosity = 0u8;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => out.help = true,
            "-f" | "--config" => match iter.next() {
                Some(path) => out.config_path = Some(path),
                None => return Err("-f/--config requires a path argument".into()),
            },
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    out.log_level = level_for_verbosity(verbosity);
    Ok(out)
}

/// Map a `-v` count to a level string. Zero means "use config".
///
///   -v      → warn
///   -vv     → info
///   -vvv    → debug
///   -vvvv+  → trace
pub fn level_for_verbosity(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Parse `std::env::args()`; print usage and exit on `-h` or a bad argument.
pub fn parse_or_exit(program: &str, about: &str) -> CliArgs {
    match parse_from(std::env::args().skip(1)) {
        Ok(args) if args.help => {
            println!("{about}");
            println!();
            println!("Usage: {program} [OPTIONS]");
            println!();
            println!("Options:");
            println!("  -h, --help                 Print help");
            println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
            println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
            std::process::exit(0);
        }
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
