use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use midi_router::config::{load_routes, DEFAULT_ROUTES_PATH};
use midi_router::midi::MidiBackend;
use midi_router::routing::{Matcher, SubstringMatcher};
use midi_router::topology::{BackendSource, CommandSource, TopologySource};

#[derive(Parser)]
#[command(name = "midi-ports")]
#[command(about = "Inspect MIDI devices and preview route file resolution", long_about = None)]
struct Cli {
    /// Client name announced to the MIDI subsystem
    #[arg(long, default_value = "midi-ports")]
    client_name: String,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List live input and output devices
    List,
    /// Print a topology snapshot
    Snapshot {
        /// External tool to run instead of enumerating ports
        #[arg(trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// Parse a route file and show which devices each endpoint would match
    Check {
        #[arg(default_value = DEFAULT_ROUTES_PATH)]
        routes: PathBuf,
    },
}

#[derive(Serialize)]
struct DeviceList {
    inputs: Vec<String>,
    outputs: Vec<String>,
}

#[derive(Serialize)]
struct EndpointPreview {
    id: String,
    match_key: String,
    input: Option<String>,
    output: Option<String>,
    destinations: Vec<String>,
}

#[derive(Serialize)]
struct CheckReport {
    endpoints: Vec<EndpointPreview>,
    warnings: Vec<String>,
}

fn backend(client_name: &str) -> Result<Arc<dyn MidiBackend>, Box<dyn std::error::Error>> {
    #[cfg(feature = "midi-io")]
    {
        Ok(Arc::new(midi_router::midi::MidirBackend::new(client_name)))
    }
    #[cfg(not(feature = "midi-io"))]
    {
        let _ = client_name;
        Err("built without hardware MIDI support".into())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let backend = backend(&cli.client_name)?;

    match cli.command {
        Commands::List => {
            let list = DeviceList {
                inputs: backend.input_names()?,
                outputs: backend.output_names()?,
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                println!("Inputs:");
                for name in &list.inputs {
                    println!("  {}", name);
                }
                println!("Outputs:");
                for name in &list.outputs {
                    println!("  {}", name);
                }
            }
        }
        Commands::Snapshot { command } => {
            let source: Box<dyn TopologySource> = if command.is_empty() {
                Box::new(BackendSource::new(backend))
            } else {
                Box::new(CommandSource::new(&command)?)
            };
            print!("{}", source.snapshot()?);
        }
        Commands::Check { routes } => {
            let config = load_routes(&routes)?;
            let inputs = backend.input_names()?;
            let outputs = backend.output_names()?;

            let endpoints: Vec<EndpointPreview> = config
                .definitions
                .iter()
                .map(|d| {
                    let matcher = SubstringMatcher::new(d.match_key.as_str());
                    EndpointPreview {
                        id: d.id.clone(),
                        match_key: d.match_key.clone(),
                        input: matcher.first_match(&inputs).map(|i| inputs[i].clone()),
                        output: matcher.first_match(&outputs).map(|i| outputs[i].clone()),
                        destinations: config
                            .routes
                            .destinations(&d.id)
                            .map(|set| set.iter().cloned().collect())
                            .unwrap_or_default(),
                    }
                })
                .collect();
            let report = CheckReport {
                endpoints,
                warnings: config.warnings.iter().map(|w| w.to_string()).collect(),
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_check(&report);
            }
        }
    }

    Ok(())
}

fn print_check(report: &CheckReport) {
    for endpoint in &report.endpoints {
        println!(
            "{} = {}\n  input:  {}\n  output: {}",
            endpoint.id,
            endpoint.match_key,
            endpoint.input.as_deref().unwrap_or("-"),
            endpoint.output.as_deref().unwrap_or("-"),
        );
        if !endpoint.destinations.is_empty() {
            println!("  routes: {}", endpoint.destinations.join(", "));
        }
    }
    if !report.warnings.is_empty() {
        eprintln!("Warnings:");
        for warning in &report.warnings {
            eprintln!("  {}", warning);
        }
    }
}
