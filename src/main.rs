// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use leadflow_rs::config::Settings;
use leadflow_rs::services::Services;
use leadflow_rs::workflow::state::Seed;
use leadflow_rs::workflow::RunEvent;
use leadflow_rs::ResearchWorkflow;
use std::fs;
use std::path::PathBuf;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional YAML settings file; environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Research one contact and print the final state as JSON
    Run {
        /// Seed record as a JSON file; the flags below fill in anything it leaves out
        #[arg(short, long)]
        seed: Option<PathBuf>,

        /// Contact name
        #[arg(short, long)]
        name: Option<String>,

        /// Company name
        #[arg(long)]
        company: Option<String>,

        /// Company website
        #[arg(long)]
        website: Option<String>,

        /// Contact's profile URL, skips the profile search
        #[arg(long)]
        profile_url: Option<String>,

        /// Owner recorded on stored documents and outreach
        #[arg(short, long, default_value = "cli")]
        owner: String,

        /// Print progress events to stderr
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print the workflow topology as YAML
    Graph,
}

fn fill(slot: &mut String, value: Option<String>) {
    if let Some(v) = value {
        *slot = v;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_ref())?;

    match args.command {
        Commands::Run {
            seed,
            name,
            company,
            website,
            profile_url,
            owner,
            verbose,
        } => {
            let mut record = match seed {
                Some(path) => serde_json::from_str::<Seed>(&fs::read_to_string(path)?)?,
                None => Seed::default(),
            };
            fill(&mut record.name, name);
            fill(&mut record.company_name, company);
            fill(&mut record.company_website, website);
            fill(&mut record.profile_url, profile_url);

            let workflow = ResearchWorkflow::new(&Services::from_settings(&settings)?)?;

            let state = if verbose {
                let (tx, mut rx) = mpsc::channel::<RunEvent>(64);
                let printer = tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        eprintln!("{:?}", event);
                    }
                });
                let state = workflow.run_with_events(record, &owner, tx).await?;
                printer.await?;
                state
            } else {
                workflow.run(record, &owner).await?
            };

            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Commands::Graph => {
            let workflow = ResearchWorkflow::new(&Services::without_model(&settings))?;
            print!("{}", serde_yaml::to_string(&workflow.graph().describe())?);
        }
    }

    Ok(())
}
