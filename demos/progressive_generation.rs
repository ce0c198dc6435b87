//! Submit a prompt and follow it through to completion.
//!
//! Reads `WEIGHTS_UNOFFICIAL_ENDPOINT` and `WEIGHTS_API_KEY` from the
//! environment, defaulting to `http://localhost:3000`.
//!
//! ```sh
//! cargo run --example progressive_generation
//! ```

use std::time::Duration;
use weights_rs::{PollOptions, WeightsClient};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let client = WeightsClient::from_env();
    println!("Using endpoint: {}", client.endpoint());

    let options = PollOptions::default().with_deadline(Duration::from_secs(300));
    let snapshot = client
        .generate_progressive_with(
            "a cat wearing a tiny hat, digital art",
            None,
            options,
            |update| println!("  {} -> {:?}", update.image_id, update.status),
        )
        .await?;

    println!("Done: {:?}", snapshot.status);
    if let Some(modified) = snapshot.last_modified_date {
        println!("Last modified: {}", modified);
    }

    Ok(())
}
