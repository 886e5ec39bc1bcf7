//! Producer serving one frame per consumer request
//!
//! Run `frame_consumer` in another terminal, or pass a TOML config:
//! `cargo run --example frame_producer -- producer.toml`

use pixshm::{
    ConfigLoader, ElementType, Keyword, ProducerConfig, Region, WaitStatus, init_tracing,
    init_tracing_with_level,
};
use std::path::Path;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (service_name, mut region) = match std::env::args().nth(1) {
        Some(path) => {
            let config = ProducerConfig::load(Path::new(&path))?;
            config.shared.validate()?;
            init_tracing_with_level(config.shared.log_level);
            let region = Region::open_or_create_from_config(&config.region)?;
            (config.shared.service_name, region)
        }
        None => {
            init_tracing();
            let schema = [
                Keyword::new("EXPTIME", 1.5, "exposure time [s]"),
                Keyword::new("FRAMEID", 0, "frame counter"),
            ];
            let region = Region::open_or_create("frame0", 100, ElementType::Float, &schema)?;
            ("frame-producer".to_string(), region)
        }
    };
    let _span = tracing::info_span!("producer", service = %service_name).entered();

    println!("Serving region '{}' ({} bytes)", region.name(), region.size());
    println!("{}", region.info()?.to_json_pretty()?);

    let mut frame_id: i64 = 0;
    loop {
        if region.producer_wait_for_request_timeout(Duration::from_secs(1))? == WaitStatus::TimedOut
        {
            continue;
        }

        frame_id += 1;
        {
            let mut guard = region.lock()?;
            if let Some(keyword) = guard.find_keyword_mut("FRAMEID") {
                keyword.set_value(frame_id);
            }
            if let Some(samples) = guard.samples_as_mut::<f32>() {
                for (i, s) in samples.iter_mut().enumerate() {
                    *s = (frame_id as f32) + i as f32 * 0.01;
                }
            }
            guard.unlock()?;
        }
        region.producer_request_done()?;
        tracing::debug!("Served frame {}", frame_id);
        println!("✓ Served frame {}", frame_id);
    }
}
