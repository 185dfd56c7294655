use clap::Parser;
use kube::CustomResourceExt;
use team_sync::{config::Settings, crds::GroupSync};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
enum Args {
    /// Run the operator
    Run(Settings),
    /// Print the GroupSync CRD
    Crds,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args {
        Args::Crds => {
            println!("{}", serde_yaml::to_string(&GroupSync::crd())?);
        }
        Args::Run(settings) => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .init();

            team_sync::run(settings).await?;
        }
    };

    Ok(())
}
