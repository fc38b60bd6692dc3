mod cli;

use confmix::combined::{CombinedView, KeySource};
use confmix::combiner::OverrideCombiner;
use confmix::node::Node;
use confmix::provider::ConfigBuilder;
use confmix::source::{same_source, shared, Configuration, SharedSource};
use confmix::sources::FileSource;
use confmix::value::Value;
use std::path::Path;
use std::rc::Rc;

const DEFAULT_DEFINITION: &str = "confmix.hcl";

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("CONFMIX_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = load(&cli.input).and_then(|view| match cli.command {
        cli::Command::Get(get_cli) => get(&view, get_cli),
        cli::Command::Source(source_cli) => source(&view, source_cli),
        cli::Command::Dump(dump_cli) => dump(&view, dump_cli),
        cli::Command::Keys => keys(&view),
    });

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

fn load(input: &cli::InputArgs) -> anyhow::Result<CombinedView> {
    if !input.files.is_empty() {
        let mut view = CombinedView::with_combiner(Rc::new(OverrideCombiner::new()));
        for file_path in &input.files {
            let source: SharedSource = shared(FileSource::load(file_path, None)?);
            let name = file_path.display().to_string();
            view.add_source(source, Some(&name), None)?;
        }
        return Ok(view);
    }

    let definition = input
        .definition
        .as_deref()
        .unwrap_or(Path::new(DEFAULT_DEFINITION));
    Ok(ConfigBuilder::default().load_file(definition)?)
}

fn get(view: &CombinedView, cli: cli::KeyCommand) -> anyhow::Result<()> {
    let Some(value) = view.get(&cli.key)? else {
        anyhow::bail!("Key {:?} is not defined", cli.key);
    };
    output(&cli.output, &value)
}

fn source(view: &CombinedView, cli: cli::KeyCommand) -> anyhow::Result<()> {
    match view.get_source(&cli.key)? {
        None => anyhow::bail!("Key {:?} is not defined", cli.key),
        Some(KeySource::Combined) => println!("(combined)"),
        Some(KeySource::Source(source)) => {
            let name = view
                .registrations()
                .iter()
                .enumerate()
                .find(|(_, registration)| same_source(registration.source(), &source))
                .map(|(index, registration)| match registration.name() {
                    Some(name) => name.to_string(),
                    None => format!("#{index}"),
                });
            println!("{}", name.unwrap_or_default());
        }
    }
    Ok(())
}

fn dump(view: &CombinedView, cli: cli::DumpCommand) -> anyhow::Result<()> {
    let value = view
        .with_root(Node::to_value)?
        .unwrap_or_else(|| Value::Object(Default::default()));
    output(&cli.output, &value)
}

fn keys(view: &CombinedView) -> anyhow::Result<()> {
    for key in view.keys()? {
        println!("{key}");
    }
    Ok(())
}

fn output(output: &cli::OutputArgs, value: &Value) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => {
            serde_json::to_writer_pretty(std::io::stdout(), value)?;
            println!();
        }
    };

    Ok(())
}
