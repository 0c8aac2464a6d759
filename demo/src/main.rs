//! Headless tour of the engine: pans down the Amazon from Manaus towards Belém, logging what
//! the renderer would be given at each stop.

use std::thread;
use std::time::Duration;

use tilekit::sources::{OpenStreetMap, TileSource};
use tilekit::{EngineOptions, HttpFetch, HttpOptions, TileEngine, Viewport, Zoom, lat_lon};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let source = OpenStreetMap;
    let attribution = source.attribution();
    log::info!("Tiles: {} ({}).", attribution.text, attribution.url);

    let mut engine = TileEngine::new(
        HttpFetch::new(source, HttpOptions::default()),
        EngineOptions::default(),
    );

    let route = [
        (-3.10, -60.20), // Manaus
        (-3.05, -59.60),
        (-2.75, -58.20),
        (-2.55, -56.70), // Juruti
        (-2.00, -54.50),
        (-1.45, -48.50), // Belém
    ];

    for (lat, lon) in route {
        let viewport = Viewport::new(lat_lon(lat, lon), Zoom::try_from(6.)?, 2, 256);

        // Give the fetches a moment to land, applying completions as they come.
        for _ in 0..10 {
            engine.render(&viewport)?;
            thread::sleep(Duration::from_millis(100));
        }

        let total = engine.active_tiles().count();
        let with_payload = engine
            .active_tiles()
            .filter(|tile| tile.payload.is_some())
            .count();
        log::info!(
            "({lat}, {lon}): {with_payload}/{total} tiles resident, {} fetches in flight.",
            engine.stats().in_progress
        );
    }

    Ok(())
}
