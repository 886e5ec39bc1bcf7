//! Consumer requesting frames from a running producer

use pixshm::{Region, ShmError, WaitStatus, init_tracing};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let name = std::env::args().nth(1).unwrap_or_else(|| "frame0".to_string());
    let region = match Region::attach(&name) {
        Ok(region) => region,
        Err(ShmError::NotFound { name }) => {
            eprintln!("Region '{}' not found - start frame_producer first", name);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for _ in 0..5 {
        region.consumer_request_start()?;
        match region.consumer_wait_for_ready_timeout(Duration::from_secs(2))? {
            WaitStatus::Signaled => {
                for keyword in region.keywords() {
                    println!("  {:<15} = {:?}", keyword.name(), keyword.value());
                }
                if let Some(samples) = region.samples_as::<f32>() {
                    println!("  samples[0..4] = {:?}", &samples[..samples.len().min(4)]);
                }
            }
            WaitStatus::TimedOut => println!("✗ No frame within 2s"),
        }
    }
    Ok(())
}
