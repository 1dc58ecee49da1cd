use std::path::Path;

const USAGE: &str = "\
Usage: roadkill-installer [--settings <file>] [--verbose] <command>

Commands:
  --answers <file.toml> [--lang <code>]   run the install wizard non-interactively
  --status                                show whether the site is installed
  --reset                                 mark the site not installed (keeps settings)
  --languages                             list supported languages";

/// Value of `--flag value` or `--flag=value`.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let prefix = format!("{}=", flag);
    args.iter().enumerate().find_map(|(i, a)| {
        if a == flag {
            args.get(i + 1).map(String::as_str)
        } else {
            a.strip_prefix(&prefix)
        }
    })
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return;
    }

    if args.iter().any(|a| a == "--languages") {
        if let Err(e) = roadkill_installer::print_languages(&mut std::io::stdout()) {
            eprintln!("Installer error: {}", e);
            std::process::exit(roadkill_installer::EXIT_FAILED);
        }
        return;
    }

    let settings = match roadkill_installer::load_settings(flag_value(&args, "--settings").map(Path::new)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Installer error: {:#}", e);
            std::process::exit(roadkill_installer::EXIT_FAILED);
        }
    };

    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    if let Err(e) = roadkill_installer::init_logging(&settings, verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let code = if args.iter().any(|a| a == "--status") {
        roadkill_installer::run_status(&settings).await
    } else if args.iter().any(|a| a == "--reset") {
        roadkill_installer::run_reset(&settings).await
    } else if let Some(answers) = flag_value(&args, "--answers") {
        roadkill_installer::run_answers(&settings, Path::new(answers), flag_value(&args, "--lang"))
            .await
    } else {
        eprintln!("{}", USAGE);
        roadkill_installer::EXIT_USAGE
    };

    log::logger().flush();
    std::process::exit(code);
}
