#[tokio::main]
async fn main() {
    if let Err(e) = bloodscan_lib::run().await {
        eprintln!("bloodscan: {e}");
        std::process::exit(1);
    }
}
