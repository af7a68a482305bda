use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = aimdb_api::Args::parse();

	aimdb_api::run(args).await
}
