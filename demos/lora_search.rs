//! Search for Lora models and print the remaining quota.
//!
//! ```sh
//! cargo run --example lora_search
//! ```

use weights_rs::WeightsClient;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let client = WeightsClient::from_env();

    let hits = client.search_loras("watercolor").await?;
    if hits.is_empty() {
        println!("No Loras matched");
    } else {
        for lora in &hits {
            println!("{}  {}", lora.id, lora.name);
        }
    }

    let quota = client.get_quota().await?;
    println!("Quota: {}", quota);

    Ok(())
}
