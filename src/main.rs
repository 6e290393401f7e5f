fn main() {
    println!("🚨 Main binary moved to API server!");
    println!("To start the system, run:");
    println!("   cargo run -p api_server");
    println!();
    println!("The API server exposes the dashboard endpoints:");
    println!("   • Market insight and wash trade charts");
    println!("   • Marketplace health scores and rewards");
    println!("   • Wallet portfolios, scores and token image lookups");
    println!();
    println!("See README or API documentation for endpoint details.");
}
