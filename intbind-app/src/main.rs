mod app;
pub use app::App;

use intbind_engine::TrialConfig;

fn main() -> anyhow::Result<()> {
    // Optional first argument: path to a JSON trial configuration.
    let config: TrialConfig = match std::env::args().nth(1) {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(&path)?)?,
        None => TrialConfig::default(),
    };

    let app = App::new(config)?;
    app.run()?;

    Ok(())
}
