use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Gui,
    /// Run one job and exit. Started by the GUI, not by hand.
    Worker { log: PathBuf, job: String },
    Help,
    Version,
}

impl Invocation {
    pub fn parse() -> Result<Self, String> {
        Self::parse_from(std::env::args().skip(1))
    }

    pub fn parse_from<I: IntoIterator<Item = String>>(args: I) -> Result<Self, String> {
        let mut args = args.into_iter();
        let mut worker = false;
        let mut log: Option<PathBuf> = None;
        let mut job: Option<String> = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Invocation::Help),
                "--version" | "-v" => return Ok(Invocation::Version),
                "--worker" => worker = true,
                "--log" => {
                    log = Some(args.next().ok_or("--log needs a path")?.into());
                }
                "--job" => {
                    job = Some(args.next().ok_or("--job needs a JSON descriptor")?);
                }
                other => return Err(format!("Unknown argument: {}", other)),
            }
        }

        if !worker {
            if log.is_some() || job.is_some() {
                return Err("--log and --job are only valid with --worker".to_string());
            }
            return Ok(Invocation::Gui);
        }
        match (log, job) {
            (Some(log), Some(job)) => Ok(Invocation::Worker { log, job }),
            _ => Err("--worker needs both --log and --job".to_string()),
        }
    }
}

pub fn print_help() {
    println!("mff-auto {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("USAGE:");
    println!("    mff-auto [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    (no flags)                 Launch the GUI");
    println!("    --worker --log P --job J   Run one job descriptor J, logging to P");
    println!("    --help, -h                 Show this help message");
    println!("    --version, -v              Show version information");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Invocation, String> {
        Invocation::parse_from(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_no_arguments_is_gui() {
        assert_eq!(parse(&[]), Ok(Invocation::Gui));
    }

    #[test]
    fn test_worker_arguments() {
        let parsed = parse(&["--worker", "--log", "logs/a.log", "--job", "{\"mode_id\":\"X\"}"]);
        assert_eq!(
            parsed,
            Ok(Invocation::Worker {
                log: PathBuf::from("logs/a.log"),
                job: "{\"mode_id\":\"X\"}".to_string()
            })
        );
        // Order does not matter.
        assert!(matches!(
            parse(&["--job", "{}", "--log", "x.log", "--worker"]),
            Ok(Invocation::Worker { .. })
        ));
    }

    #[test]
    fn test_incomplete_or_unknown() {
        assert!(parse(&["--worker", "--log", "a.log"]).is_err());
        assert!(parse(&["--log"]).is_err());
        assert!(parse(&["--job", "{}"]).is_err());
        assert!(parse(&["--frobnicate"]).is_err());
        assert_eq!(parse(&["-h", "--bogus"]), Ok(Invocation::Help));
    }
}
