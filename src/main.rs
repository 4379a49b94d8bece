use clap::Parser as _;
use markstone::{HtmlRenderer, Options, parse_with_options};
use std::io::{self, Read};
use std::process::ExitCode;

/// Compile Markdown read from stdin to HTML on stdout
#[derive(clap::Parser)]
#[command(name = "markstone", version, about)]
struct Cli {
    /// Print the block tree as JSON instead of HTML
    #[arg(long)]
    ast: bool,

    /// Options as a JSON object, e.g. '{"indent_width": 4}'
    #[arg(long, value_name = "JSON")]
    options: Option<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli, &mut io::stdin()) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

/// Read the whole document from `input` and produce what goes to stdout
fn run(cli: &Cli, input: &mut impl Read) -> Result<String, String> {
    let options = match cli.options.as_deref() {
        Some(json) => Options::from_json(json).map_err(|err| format!("invalid --options: {}", err))?,
        None => Options::default(),
    };

    let mut text = String::new();
    input
        .read_to_string(&mut text)
        .map_err(|err| format!("failed to read stdin: {}", err))?;

    let doc = parse_with_options(&text, &options).map_err(|err| err.to_string())?;

    if cli.ast {
        let json = serde_json::to_string_pretty(&doc).map_err(|err| err.to_string())?;
        Ok(format!("{}\n", json))
    } else {
        Ok(HtmlRenderer::with_options(&options).render(&doc))
    }
}
